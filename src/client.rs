//! Shared fake client: action log, reactor chains and object tracker

use crate::action::{Action, Request};
use crate::api::FakeApi;
use crate::label_selector::LabelSelector;
use crate::reactor::{ReactionContext, Reactor, WatchReactor};
use crate::resource::{ResourceRegistry, GVK, GVR};
use crate::seldon::SeldonDeployment;
use crate::tracker::{EventReceiver, ObjectTracker};
use crate::{Error, Result};
use kube::Resource;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub(crate) struct State {
    pub(crate) actions: Vec<Action>,
    pub(crate) reactors: Vec<Reactor>,
    pub(crate) watch_reactors: Vec<WatchReactor>,
    pub(crate) tracker: ObjectTracker,
    pub(crate) registry: ResourceRegistry,
}

impl State {
    pub(crate) fn new(tracker: ObjectTracker) -> Self {
        let mut registry = ResourceRegistry::new();
        registry.register_resource::<SeldonDeployment>();
        Self {
            actions: Vec::new(),
            reactors: Vec::new(),
            watch_reactors: Vec::new(),
            tracker,
            registry,
        }
    }
}

/// In-memory stand-in for an API server, shared by every facade built on it
///
/// Cloning is cheap and yields a handle to the same store. All actions are
/// serialized by one lock covering the action log, the reactor chains and
/// the object table.
#[derive(Clone)]
pub struct FakeClient {
    state: Arc<Mutex<State>>,
}

impl FakeClient {
    /// Empty store with `SeldonDeployment` registered
    pub fn new() -> Self {
        Self::from_state(State::new(ObjectTracker::new()))
    }

    pub(crate) fn from_state(state: State) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Facade for `SeldonDeployment` objects in `namespace`
    pub fn seldon_deployments(&self, namespace: &str) -> FakeApi<SeldonDeployment> {
        FakeApi::namespaced(self.clone(), namespace)
    }

    /// Every action received so far, in call order
    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().actions.clone()
    }

    pub fn clear_actions(&self) {
        self.state.lock().actions.clear();
    }

    /// Run `reactor` before all reactors registered so far
    pub fn prepend_reactor(&self, reactor: Reactor) {
        self.state.lock().reactors.insert(0, reactor);
    }

    /// Run `reactor` after all reactors registered so far
    pub fn add_reactor(&self, reactor: Reactor) {
        self.state.lock().reactors.push(reactor);
    }

    pub fn prepend_watch_reactor(&self, reactor: WatchReactor) {
        self.state.lock().watch_reactors.insert(0, reactor);
    }

    pub fn add_watch_reactor(&self, reactor: WatchReactor) {
        self.state.lock().watch_reactors.push(reactor);
    }

    /// Make `K` known to the store so HTTP routing and seeding can resolve it
    pub fn register<K: Resource<DynamicType = ()>>(&self) {
        self.state.lock().registry.register_resource::<K>();
    }

    pub(crate) fn kind_for(&self, gvr: &GVR) -> Result<GVK> {
        self.state.lock().registry.kind_for(gvr).cloned()
    }

    /// Inspect the object table without recording an action
    pub fn with_tracker<R>(&self, f: impl FnOnce(&ObjectTracker) -> R) -> R {
        f(&self.state.lock().tracker)
    }

    /// Record `action`, then answer it from the reactor chain or the tracker
    ///
    /// Object verbs answer with the stored object and List with a list
    /// object; Delete and DeleteCollection answer with `Value::Null`.
    pub fn invokes(&self, action: Action) -> Result<Value> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        debug!(
            verb = %action.verb(),
            resource = %action.resource,
            namespace = %action.namespace,
            name = ?action.name(),
            "Invoking action"
        );
        state.actions.push(action.clone());

        let ctx = ReactionContext {
            action: &action,
            tracker: &state.tracker,
        };
        for reactor in state.reactors.iter().filter(|r| r.handles(&action)) {
            if let Some(value) = reactor.react(&ctx)? {
                debug!(verb = %action.verb(), "Action answered by reactor");
                return Ok(value);
            }
        }

        object_reaction(&mut state.tracker, &action)
    }

    /// Record a watch action and open its event stream
    pub fn invokes_watch(&self, action: Action) -> Result<EventReceiver> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        debug!(
            resource = %action.resource,
            namespace = %action.namespace,
            "Invoking watch"
        );
        state.actions.push(action.clone());

        let ctx = ReactionContext {
            action: &action,
            tracker: &state.tracker,
        };
        for reactor in state.watch_reactors.iter().filter(|r| r.handles(&action)) {
            if let Some(events) = reactor.react(&ctx)? {
                let (sender, receiver) = mpsc::channel(events.len().max(1));
                for event in events {
                    sender.try_send(event).map_err(|e| {
                        Error::Internal(format!("failed to queue watch event: {}", e))
                    })?;
                }
                return Ok(receiver);
            }
        }

        match &action.request {
            Request::Watch { .. } => {
                Ok(state.tracker.watch(&action.resource, &action.namespace))
            }
            _ => Err(Error::InvalidRequest(format!(
                "{} is not a watch action",
                action.verb()
            ))),
        }
    }
}

impl fmt::Debug for FakeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("FakeClient");
        // Reactors may format a captured client while the lock is held
        match self.state.try_lock() {
            Some(state) => out
                .field("actions", &state.actions.len())
                .field("reactors", &state.reactors.len())
                .field("watch_reactors", &state.watch_reactors.len())
                .field("resource_version", &state.tracker.resource_version())
                .field("watchers", &state.tracker.watcher_count())
                .finish(),
            None => out.finish_non_exhaustive(),
        }
    }
}

impl Default for FakeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Default store semantics for each verb
fn object_reaction(tracker: &mut ObjectTracker, action: &Action) -> Result<Value> {
    let resource = &action.resource;
    let namespace = action.namespace.as_str();
    let subresource = action.subresource.as_deref();

    match &action.request {
        Request::Get { name } => tracker.get(resource, namespace, name),
        Request::List { kind, .. } => {
            let items = tracker.list(resource, namespace);
            Ok(list_object(kind, tracker.resource_version(), items))
        }
        Request::Watch { .. } => Err(Error::InvalidRequest(
            "watch actions are answered by invokes_watch".to_string(),
        )),
        Request::Create { object } => tracker.create(resource, object.clone(), namespace),
        Request::Update { object } => {
            tracker.update(resource, object.clone(), namespace, subresource)
        }
        Request::Delete { name } => tracker.delete(resource, namespace, name).map(|_| Value::Null),
        Request::DeleteCollection { restrictions } => {
            let selector = LabelSelector::from_optional(restrictions.labels.as_deref())?;
            tracker.delete_collection(resource, namespace, &selector);
            Ok(Value::Null)
        }
        Request::Patch {
            name,
            patch_type,
            payload,
        } => tracker.patch(resource, namespace, name, *patch_type, payload, subresource),
    }
}

fn list_object(kind: &GVK, resource_version: u64, items: Vec<Value>) -> Value {
    json!({
        "apiVersion": kind.api_version(),
        "kind": kind.list_kind(),
        "metadata": {
            "resourceVersion": resource_version.to_string(),
        },
        "items": items,
    })
}
