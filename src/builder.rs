//! Builder for constructing fake clients with various options

use crate::client::{FakeClient, State};
use crate::reactor::{Reactor, WatchReactor};
use crate::resource::{GVK, GVR};
use crate::tracker::{ObjectTracker, DEFAULT_WATCH_BUFFER};
use crate::{Error, Result};
use kube::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_NAMESPACE: &str = "default";

/// Builder for creating fake clients
///
/// Provides a fluent API for constructing fake clients with various options:
/// - Initial objects, typed, raw or loaded from YAML fixtures
/// - Additional resource kinds and status subresources
/// - Reactors consulted ahead of the object tracker
/// - Watch buffer size
///
/// `SeldonDeployment` is always registered.
///
/// # Example
///
/// ```rust
/// use seldon_fake_client::{ClientBuilder, SeldonDeployment, SeldonDeploymentSpec};
///
/// let client = ClientBuilder::new()
///     .with_object(SeldonDeployment::new("iris", SeldonDeploymentSpec::default()))
///     .with_status_subresource::<SeldonDeployment>()
///     .build()
///     .unwrap();
///
/// assert!(client.actions().is_empty());
/// ```
pub struct ClientBuilder {
    initial_objects: Vec<Value>,
    errors: Vec<Error>,
    resources: Vec<(GVR, GVK)>,
    with_status_subresource: Vec<GVR>,
    reactors: Vec<Reactor>,
    watch_reactors: Vec<WatchReactor>,
    fixture_dir: Option<PathBuf>,
    watch_buffer: usize,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            initial_objects: Vec::new(),
            errors: Vec::new(),
            resources: Vec::new(),
            with_status_subresource: Vec::new(),
            reactors: Vec::new(),
            watch_reactors: Vec::new(),
            fixture_dir: None,
            watch_buffer: DEFAULT_WATCH_BUFFER,
        }
    }

    /// Seed the store with `obj` when the client is built
    ///
    /// Seeded objects are not recorded as actions. An object without a
    /// namespace lands in `default`.
    pub fn with_object<K>(mut self, obj: K) -> Self
    where
        K: Resource + Serialize,
    {
        match serde_json::to_value(&obj) {
            Ok(value) => self.initial_objects.push(value),
            Err(e) => self.errors.push(e.into()),
        }
        self
    }

    pub fn with_objects<K>(mut self, objects: Vec<K>) -> Self
    where
        K: Resource + Serialize,
    {
        for obj in objects {
            self = self.with_object(obj);
        }
        self
    }

    /// Seed raw JSON objects; each needs `apiVersion`, `kind` and `metadata.name`
    pub fn with_runtime_objects(mut self, objects: Vec<Value>) -> Self {
        self.initial_objects.extend(objects);
        self
    }

    /// Register an additional resource kind
    pub fn with_resource<K: Resource<DynamicType = ()>>(mut self) -> Self {
        self.resources.push((GVR::of::<K>(), GVK::of::<K>()));
        self
    }

    /// Serve `status` of `K` as a subresource
    ///
    /// When enabled:
    /// - regular updates and patches keep the stored status
    /// - status updates and patches change nothing but the status
    pub fn with_status_subresource<K: Resource<DynamicType = ()>>(mut self) -> Self {
        self.with_status_subresource.push(GVR::of::<K>());
        self
    }

    /// Append a reactor to the chain
    pub fn with_reactor(mut self, reactor: Reactor) -> Self {
        self.reactors.push(reactor);
        self
    }

    pub fn with_watch_reactor(mut self, reactor: WatchReactor) -> Self {
        self.watch_reactors.push(reactor);
        self
    }

    /// Events a watcher may leave unread before it is cut off
    pub fn with_watch_buffer(mut self, capacity: usize) -> Self {
        self.watch_buffer = capacity;
        self
    }

    /// Base directory for `load_fixture` paths
    pub fn with_fixture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixture_dir = Some(dir.into());
        self
    }

    /// Load objects from a YAML fixture file
    ///
    /// Supports single and multi-document YAML (separated by `---`). The path
    /// is relative to the fixture directory when one was set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the YAML cannot be
    /// parsed.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use seldon_fake_client::ClientBuilder;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = ClientBuilder::new()
    ///     .with_fixture_dir("fixtures")
    ///     .load_fixture("seldondeployments.yaml")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_fixture(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let fixture_path = match &self.fixture_dir {
            Some(dir) => dir.join(path),
            None => path.as_ref().to_path_buf(),
        };

        let content = std::fs::read_to_string(&fixture_path).map_err(|e| {
            Error::Internal(format!(
                "Failed to read fixture file {:?}: {}",
                fixture_path, e
            ))
        })?;

        for document in serde_yaml::Deserializer::from_str(&content) {
            let value = Value::deserialize(document)?;
            // Skip empty documents, e.g. a trailing `---`
            if value.is_null() {
                continue;
            }
            self.initial_objects.push(value);
        }

        debug!("Loaded fixture {:?}", fixture_path);
        Ok(self)
    }

    pub fn load_fixtures<P>(mut self, paths: impl IntoIterator<Item = P>) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        for path in paths {
            self = self.load_fixture(path)?;
        }
        Ok(self)
    }

    /// Build the fake client
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while configuring the builder, or
    /// an error if an initial object is of an unregistered kind or lacks a
    /// name.
    pub fn build(mut self) -> Result<FakeClient> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }

        let mut state = State::new(ObjectTracker::with_watch_buffer(self.watch_buffer));
        for (gvr, gvk) in self.resources {
            state.registry.register(gvr, gvk);
        }
        for gvr in self.with_status_subresource {
            state.tracker.add_status_subresource(gvr);
        }
        state.reactors = self.reactors;
        state.watch_reactors = self.watch_reactors;

        for object in self.initial_objects {
            let gvk = GVK::from_object(&object)?;
            let gvr = state.registry.resource_for(&gvk)?.clone();
            let namespace = object
                .get("metadata")
                .and_then(|m| m.get("namespace"))
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_NAMESPACE)
                .to_string();

            state.tracker.add(&gvr, object, &namespace)?;
        }

        debug!(
            "Built fake client at resource version {}",
            state.tracker.resource_version()
        );
        Ok(FakeClient::from_state(state))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
