//! In-memory object table with watch fan-out
//!
//! The tracker is not synchronized on its own; the owning client guards it
//! with the same lock as the action log.

use crate::label_selector::LabelSelector;
use crate::patch::PatchType;
use crate::resource::GVR;
use crate::utils::{derive_uid, extract_metadata, extract_name, labels_of, reconcile_namespace};
use crate::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::WatchEvent;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

/// Events a subscriber may have queued before it is considered stuck
pub const DEFAULT_WATCH_BUFFER: usize = 100;

/// Subscription end of a watch
pub type EventReceiver = mpsc::Receiver<WatchEvent<Value>>;

const STATUS: &str = "status";

type ObjectsByName = BTreeMap<String, Value>;
type ObjectsByNamespace = BTreeMap<String, ObjectsByName>;
type ObjectStorage = BTreeMap<GVR, ObjectsByNamespace>;

struct Watcher {
    resource: GVR,
    namespace: String,
    sender: mpsc::Sender<WatchEvent<Value>>,
}

impl Watcher {
    fn observes(&self, resource: &GVR, namespace: &str) -> bool {
        self.resource == *resource && (self.namespace.is_empty() || self.namespace == namespace)
    }
}

pub struct ObjectTracker {
    objects: ObjectStorage,
    watchers: Vec<Watcher>,
    with_status_subresource: BTreeSet<GVR>,
    resource_version: u64,
    watch_buffer: usize,
}

impl ObjectTracker {
    pub fn new() -> Self {
        Self::with_watch_buffer(DEFAULT_WATCH_BUFFER)
    }

    pub fn with_watch_buffer(watch_buffer: usize) -> Self {
        Self {
            objects: BTreeMap::new(),
            watchers: Vec::new(),
            with_status_subresource: BTreeSet::new(),
            resource_version: 0,
            watch_buffer: watch_buffer.max(1),
        }
    }

    /// Serve `status` of this resource as a subresource
    ///
    /// Plain updates and patches then keep the stored status, and status
    /// writes only ever change the status.
    pub fn add_status_subresource(&mut self, gvr: GVR) {
        self.with_status_subresource.insert(gvr);
    }

    pub fn has_status_subresource(&self, gvr: &GVR) -> bool {
        self.with_status_subresource.contains(gvr)
    }

    /// Last resource version handed out by this tracker
    pub fn resource_version(&self) -> u64 {
        self.resource_version
    }

    /// Live watch subscriptions
    pub fn watcher_count(&self) -> usize {
        self.watchers.iter().filter(|w| !w.sender.is_closed()).count()
    }

    /// Insert or replace an object without create semantics, used for seeding
    pub fn add(&mut self, gvr: &GVR, mut object: Value, namespace: &str) -> Result<Value> {
        trace!("Adding object: {} in namespace: {}", gvr, namespace);

        let mut meta = extract_metadata(&object)?;
        let name = extract_name(&meta)?;
        reconcile_namespace(&mut meta, namespace)?;

        if meta.resource_version.as_deref().is_none_or(str::is_empty) {
            meta.resource_version = Some(self.next_resource_version().to_string());
        }
        if meta.uid.is_none() {
            meta.uid = Some(derive_uid(&gvr.resource, namespace, &name, self.resource_version));
        }
        object["metadata"] = serde_json::to_value(&meta)?;

        let previous = self
            .objects
            .entry(gvr.clone())
            .or_default()
            .entry(namespace.to_string())
            .or_default()
            .insert(name.clone(), object.clone());

        let event = match previous {
            Some(_) => WatchEvent::Modified(object.clone()),
            None => WatchEvent::Added(object.clone()),
        };
        self.emit(gvr, namespace, event);

        debug!("Added object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn create(&mut self, gvr: &GVR, mut object: Value, namespace: &str) -> Result<Value> {
        trace!("Creating object: {} in namespace: {}", gvr, namespace);

        let mut meta = extract_metadata(&object)?;
        let name = extract_name(&meta)?;
        reconcile_namespace(&mut meta, namespace)?;

        if self.lookup(gvr, namespace, &name).is_some() {
            return Err(Error::AlreadyExists {
                kind: gvr.resource.clone(),
                name,
                namespace: namespace.to_string(),
            });
        }

        if meta
            .resource_version
            .as_ref()
            .is_some_and(|rv| !rv.is_empty())
        {
            return Err(Error::InvalidRequest(
                "resourceVersion can not be set for Create requests".to_string(),
            ));
        }

        let resource_version = self.next_resource_version();
        meta.resource_version = Some(resource_version.to_string());
        if meta.uid.is_none() {
            meta.uid = Some(derive_uid(&gvr.resource, namespace, &name, resource_version));
        }
        meta.deletion_timestamp = None;
        object["metadata"] = serde_json::to_value(&meta)?;

        self.objects
            .entry(gvr.clone())
            .or_default()
            .entry(namespace.to_string())
            .or_default()
            .insert(name.clone(), object.clone());
        self.emit(gvr, namespace, WatchEvent::Added(object.clone()));

        debug!("Created object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn get(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        trace!("Getting object: {} {}/{}", gvr, namespace, name);

        self.lookup(gvr, namespace, name)
            .cloned()
            .ok_or_else(|| Error::not_found(&gvr.resource, namespace, name))
    }

    /// Replace a stored object; resource versions are not compared
    pub fn update(
        &mut self,
        gvr: &GVR,
        object: Value,
        namespace: &str,
        subresource: Option<&str>,
    ) -> Result<Value> {
        trace!("Updating object: {} in namespace: {}", gvr, namespace);

        let mut meta = extract_metadata(&object)?;
        let name = extract_name(&meta)?;
        reconcile_namespace(&mut meta, namespace)?;

        let existing = self.get(gvr, namespace, &name)?;
        let mut incoming = object;
        incoming["metadata"] = serde_json::to_value(&meta)?;

        let merged = self.scope_to_subresource(gvr, &existing, incoming, subresource);
        self.replace(gvr, namespace, &name, &existing, merged)
    }

    /// Apply a patch to a stored object and persist the result
    pub fn patch(
        &mut self,
        gvr: &GVR,
        namespace: &str,
        name: &str,
        patch_type: PatchType,
        payload: &[u8],
        subresource: Option<&str>,
    ) -> Result<Value> {
        trace!(
            "Patching object: {} {}/{} with {}",
            gvr,
            namespace,
            name,
            patch_type
        );

        let existing = self.get(gvr, namespace, name)?;
        let mut patched = existing.clone();
        patch_type.apply(&mut patched, payload)?;

        let meta = extract_metadata(&patched)?;
        if meta.name.as_deref() != Some(name) {
            return Err(Error::InvalidRequest(
                "metadata.name can not be changed by a patch".to_string(),
            ));
        }
        let patched_namespace = meta.namespace.as_deref().unwrap_or_default();
        if patched_namespace != namespace {
            return Err(Error::InvalidRequest(
                "metadata.namespace can not be changed by a patch".to_string(),
            ));
        }

        let merged = self.scope_to_subresource(gvr, &existing, patched, subresource);
        self.replace(gvr, namespace, name, &existing, merged)
    }

    pub fn delete(&mut self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        trace!("Deleting object: {} {}/{}", gvr, namespace, name);

        let removed = self
            .objects
            .get_mut(gvr)
            .and_then(|namespaces| namespaces.get_mut(namespace))
            .and_then(|objects| objects.remove(name))
            .ok_or_else(|| Error::not_found(&gvr.resource, namespace, name))?;
        self.emit(gvr, namespace, WatchEvent::Deleted(removed.clone()));

        debug!("Deleted object: {}/{}", namespace, name);
        Ok(removed)
    }

    /// Remove every object in scope whose labels satisfy `selector`
    pub fn delete_collection(
        &mut self,
        gvr: &GVR,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Vec<Value> {
        trace!(
            "Deleting collection: {} in namespace: {:?} matching {:?}",
            gvr,
            namespace,
            selector.to_string()
        );

        let mut removed = Vec::new();
        if let Some(namespaces) = self.objects.get_mut(gvr) {
            for (ns, objects) in namespaces.iter_mut() {
                if !namespace.is_empty() && ns != namespace {
                    continue;
                }
                let doomed: Vec<String> = objects
                    .iter()
                    .filter(|(_, object)| selector.matches(&labels_of(object)))
                    .map(|(name, _)| name.clone())
                    .collect();
                for name in doomed {
                    if let Some(object) = objects.remove(&name) {
                        removed.push((ns.clone(), object));
                    }
                }
            }
        }

        for (ns, object) in &removed {
            self.emit(gvr, ns, WatchEvent::Deleted(object.clone()));
        }

        debug!("Deleted {} objects of {}", removed.len(), gvr);
        removed.into_iter().map(|(_, object)| object).collect()
    }

    /// Every object of `gvr` in `namespace`, or in all namespaces when empty
    ///
    /// Ordered by namespace, then name.
    pub fn list(&self, gvr: &GVR, namespace: &str) -> Vec<Value> {
        trace!("Listing objects: {} in namespace: {:?}", gvr, namespace);

        let Some(namespaces) = self.objects.get(gvr) else {
            return Vec::new();
        };

        namespaces
            .iter()
            .filter(|(ns, _)| namespace.is_empty() || ns.as_str() == namespace)
            .flat_map(|(_, objects)| objects.values().cloned())
            .collect()
    }

    /// Subscribe to subsequent mutations of `gvr` in `namespace`
    pub fn watch(&mut self, gvr: &GVR, namespace: &str) -> EventReceiver {
        trace!("Watching objects: {} in namespace: {:?}", gvr, namespace);

        let (sender, receiver) = mpsc::channel(self.watch_buffer);
        self.watchers.push(Watcher {
            resource: gvr.clone(),
            namespace: namespace.to_string(),
            sender,
        });
        receiver
    }

    fn lookup(&self, gvr: &GVR, namespace: &str, name: &str) -> Option<&Value> {
        self.objects.get(gvr)?.get(namespace)?.get(name)
    }

    fn next_resource_version(&mut self) -> u64 {
        self.resource_version += 1;
        self.resource_version
    }

    /// Restrict a write to the fields the addressed (sub)resource owns
    fn scope_to_subresource(
        &self,
        gvr: &GVR,
        existing: &Value,
        mut incoming: Value,
        subresource: Option<&str>,
    ) -> Value {
        match subresource {
            Some(STATUS) => {
                let mut merged = existing.clone();
                copy_field(&mut merged, &incoming, STATUS);
                merged
            }
            _ if self.has_status_subresource(gvr) => {
                copy_field(&mut incoming, existing, STATUS);
                incoming
            }
            _ => incoming,
        }
    }

    fn replace(
        &mut self,
        gvr: &GVR,
        namespace: &str,
        name: &str,
        existing: &Value,
        mut object: Value,
    ) -> Result<Value> {
        let existing_meta = extract_metadata(existing)?;
        let mut meta: ObjectMeta = extract_metadata(&object)?;
        meta.uid = existing_meta.uid;
        meta.creation_timestamp = existing_meta.creation_timestamp;
        meta.resource_version = Some(self.next_resource_version().to_string());
        object["metadata"] = serde_json::to_value(&meta)?;

        let slot = self
            .objects
            .get_mut(gvr)
            .and_then(|namespaces| namespaces.get_mut(namespace))
            .and_then(|objects| objects.get_mut(name))
            .ok_or_else(|| Error::not_found(&gvr.resource, namespace, name))?;
        *slot = object.clone();
        self.emit(gvr, namespace, WatchEvent::Modified(object.clone()));

        debug!("Updated object: {}/{}", namespace, name);
        Ok(object)
    }

    /// Deliver an event without ever blocking the writer
    ///
    /// Subscribers whose buffer is full are cut off, which ends their stream.
    fn emit(&mut self, gvr: &GVR, namespace: &str, event: WatchEvent<Value>) {
        self.watchers.retain(|watcher| {
            if !watcher.observes(gvr, namespace) {
                return !watcher.sender.is_closed();
            }
            match watcher.sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Dropping watcher on {} in namespace {:?}: buffer full",
                        gvr, watcher.namespace
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
    }
}

impl Default for ObjectTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_field(target: &mut Value, source: &Value, field: &str) {
    let Some(target) = target.as_object_mut() else {
        return;
    };
    match source.get(field) {
        Some(value) => {
            target.insert(field.to_string(), value.clone());
        }
        None => {
            target.remove(field);
        }
    }
}
