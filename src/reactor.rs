//! Reactors for customizing how a fake client answers actions
//!
//! Reactors run in registration order ahead of the object tracker. Each
//! one can answer an action itself, inject an error, or let the next
//! reactor (and finally the tracker) handle it.
//!
//! # Example
//! ```
//! use seldon_fake_client::reactor::Reactor;
//! use seldon_fake_client::{Error, Verb};
//!
//! let fail_creates = Reactor::new(|_ctx| Err(Error::Injected("quota exceeded".into())))
//!     .verb(Verb::Create)
//!     .resource("seldondeployments");
//! ```

use crate::action::{Action, Verb};
use crate::tracker::ObjectTracker;
use crate::Result;
use kube::core::WatchEvent;
use serde_json::Value;
use std::sync::Arc;

/// What a reactor gets to look at
///
/// The tracker is read-only; reactors run while the client is locked and
/// must not call back into it.
pub struct ReactionContext<'a> {
    pub action: &'a Action,
    pub tracker: &'a ObjectTracker,
}

/// Return `Ok(Some(value))` to answer, `Ok(None)` to pass, or `Err(e)` to fail the action.
pub type ReactionFunc = Arc<dyn Fn(&ReactionContext) -> Result<Option<Value>> + Send + Sync>;

/// Like [`ReactionFunc`], answering a watch with a fixed list of events.
pub type WatchReactionFunc =
    Arc<dyn Fn(&ReactionContext) -> Result<Option<Vec<WatchEvent<Value>>>> + Send + Sync>;

/// Which actions a reactor applies to; `None` matches anything
#[derive(Debug, Clone, Default)]
struct Filter {
    verb: Option<Verb>,
    resource: Option<String>,
}

impl Filter {
    fn handles(&self, action: &Action) -> bool {
        self.verb.is_none_or(|verb| verb == action.verb())
            && self
                .resource
                .as_deref()
                .is_none_or(|resource| resource == action.resource.resource)
    }
}

#[derive(Clone)]
pub struct Reactor {
    filter: Filter,
    func: ReactionFunc,
}

impl Reactor {
    /// A reactor consulted for every action
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ReactionContext) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        Self {
            filter: Filter::default(),
            func: Arc::new(f),
        }
    }

    /// Only react to `verb`
    pub fn verb(mut self, verb: Verb) -> Self {
        self.filter.verb = Some(verb);
        self
    }

    /// Only react to actions on the plural resource name `resource`
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.filter.resource = Some(resource.into());
        self
    }

    pub fn handles(&self, action: &Action) -> bool {
        self.filter.handles(action)
    }

    pub(crate) fn react(&self, ctx: &ReactionContext) -> Result<Option<Value>> {
        (self.func)(ctx)
    }
}

#[derive(Clone)]
pub struct WatchReactor {
    resource: Option<String>,
    func: WatchReactionFunc,
}

impl WatchReactor {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ReactionContext) -> Result<Option<Vec<WatchEvent<Value>>>> + Send + Sync + 'static,
    {
        Self {
            resource: None,
            func: Arc::new(f),
        }
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn handles(&self, action: &Action) -> bool {
        action.verb() == Verb::Watch
            && self
                .resource
                .as_deref()
                .is_none_or(|resource| resource == action.resource.resource)
    }

    pub(crate) fn react(&self, ctx: &ReactionContext) -> Result<Option<Vec<WatchEvent<Value>>>> {
        (self.func)(ctx)
    }
}
