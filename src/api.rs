//! Typed, namespace-scoped facade over a [`FakeClient`]

use crate::action::Action;
use crate::client::FakeClient;
use crate::label_selector::LabelSelector;
use crate::patch::PatchType;
use crate::resource::{KindScope, GVK, GVR};
use crate::watch::WatchStream;
use crate::{Error, Result};
use bytes::Bytes;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{
    DeleteParams, GetParams, ListParams, ObjectList, PatchParams, PostParams, WatchParams,
};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;

/// Client for one resource kind, bound to one namespace or to the whole cluster
///
/// Mirrors the verb surface of `kube::Api<K>`, but every call is recorded
/// on the shared [`FakeClient`] and answered from memory.
///
/// # Example
///
/// ```rust
/// use seldon_fake_client::{FakeApi, FakeClient, SeldonDeployment, SeldonDeploymentSpec};
/// use kube::api::{GetParams, PostParams};
///
/// let client = FakeClient::new();
/// let deployments: FakeApi<SeldonDeployment> = FakeApi::namespaced(client.clone(), "default");
///
/// let sdep = SeldonDeployment::new("iris", SeldonDeploymentSpec::default());
/// deployments.create(&PostParams::default(), &sdep).unwrap();
///
/// let fetched = deployments.get("iris", &GetParams::default()).unwrap();
/// assert_eq!(fetched.metadata.namespace.as_deref(), Some("default"));
/// assert_eq!(client.actions().len(), 2);
/// ```
pub struct FakeApi<K> {
    client: FakeClient,
    namespace: String,
    resource: GVR,
    kind: GVK,
    namespaced_kind: bool,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for FakeApi<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            namespace: self.namespace.clone(),
            resource: self.resource.clone(),
            kind: self.kind.clone(),
            namespaced_kind: self.namespaced_kind,
            _kind: PhantomData,
        }
    }
}

impl<K> FakeApi<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned,
{
    /// Facade over objects of `K` in `namespace`
    pub fn namespaced(client: FakeClient, namespace: &str) -> Self
    where
        K: Resource<Scope = NamespaceResourceScope>,
    {
        Self::scoped(client, namespace, true)
    }

    /// Cluster-wide facade: lists and watches span every namespace
    ///
    /// For a namespaced kind, writes through this facade are rejected since
    /// they would not name a namespace.
    pub fn all(client: FakeClient) -> Self
    where
        K::Scope: KindScope,
    {
        Self::scoped(client, "", <K::Scope as KindScope>::is_namespaced())
    }

    fn scoped(client: FakeClient, namespace: &str, namespaced_kind: bool) -> Self {
        client.register::<K>();
        Self {
            client,
            namespace: namespace.to_string(),
            resource: GVR::of::<K>(),
            kind: GVK::of::<K>(),
            namespaced_kind,
            _kind: PhantomData,
        }
    }

    /// Bound namespace, `None` for a cluster-wide facade
    pub fn namespace(&self) -> Option<&str> {
        (!self.namespace.is_empty()).then_some(self.namespace.as_str())
    }

    pub fn resource(&self) -> &GVR {
        &self.resource
    }

    pub fn get(&self, name: &str, _params: &GetParams) -> Result<K> {
        let value = self
            .client
            .invokes(Action::get(self.resource.clone(), &self.namespace, name))?;
        self.cast(value)
    }

    /// List objects in scope whose labels satisfy the label selector
    ///
    /// The field selector is recorded on the action but not enforced.
    pub fn list(&self, params: &ListParams) -> Result<ObjectList<K>> {
        let value = self.client.invokes(Action::list(
            self.resource.clone(),
            self.kind.clone(),
            &self.namespace,
            params,
        ))?;
        let mut list: ObjectList<K> = self.cast(value)?;

        let selector = LabelSelector::from_optional(params.label_selector.as_deref())?;
        list.items.retain(|item| selector.matches(item.labels()));
        Ok(list)
    }

    /// Stream of subsequent mutations in scope
    ///
    /// Unlike [`FakeApi::list`], no label filtering is applied to events.
    pub fn watch(&self, params: &WatchParams) -> Result<WatchStream<K>> {
        let receiver = self
            .client
            .invokes_watch(Action::watch(self.resource.clone(), &self.namespace, params))?;
        Ok(WatchStream::new(receiver))
    }

    pub fn create(&self, _params: &PostParams, object: &K) -> Result<K> {
        self.require_namespace("create")?;
        let value = serde_json::to_value(object)?;
        let created = self
            .client
            .invokes(Action::create(self.resource.clone(), &self.namespace, value))?;
        self.cast(created)
    }

    pub fn update(&self, _params: &PostParams, object: &K) -> Result<K> {
        self.require_namespace("update")?;
        let value = serde_json::to_value(object)?;
        let updated = self
            .client
            .invokes(Action::update(self.resource.clone(), &self.namespace, value))?;
        self.cast(updated)
    }

    /// Replace only the status of the stored object
    pub fn update_status(&self, _params: &PostParams, object: &K) -> Result<K> {
        self.require_namespace("update")?;
        let value = serde_json::to_value(object)?;
        let action = Action::update(self.resource.clone(), &self.namespace, value)
            .with_subresource("status");
        let updated = self.client.invokes(action)?;
        self.cast(updated)
    }

    pub fn delete(&self, name: &str, _params: &DeleteParams) -> Result<()> {
        self.client
            .invokes(Action::delete(self.resource.clone(), &self.namespace, name))?;
        Ok(())
    }

    /// Delete every object in scope matching the label selector of `list_params`
    pub fn delete_collection(
        &self,
        _params: &DeleteParams,
        list_params: &ListParams,
    ) -> Result<()> {
        self.client.invokes(Action::delete_collection(
            self.resource.clone(),
            &self.namespace,
            list_params,
        ))?;
        Ok(())
    }

    /// Apply a raw patch; `subresources` address e.g. `["status"]`
    pub fn patch(
        &self,
        name: &str,
        patch_type: PatchType,
        payload: impl Into<Bytes>,
        _params: &PatchParams,
        subresources: &[&str],
    ) -> Result<K> {
        self.require_namespace("patch")?;
        let mut action = Action::patch(
            self.resource.clone(),
            &self.namespace,
            name,
            patch_type,
            payload,
        );
        if !subresources.is_empty() {
            action = action.with_subresource(subresources.join("/"));
        }
        let patched = self.client.invokes(action)?;
        self.cast(patched)
    }

    fn require_namespace(&self, verb: &str) -> Result<()> {
        if self.namespaced_kind && self.namespace.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "cannot {} a namespaced {} without a namespace",
                verb, self.kind.kind
            )));
        }
        Ok(())
    }

    fn cast<T: DeserializeOwned>(&self, value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|source| Error::TypeMismatch {
            kind: self.kind.kind.clone(),
            source,
        })
    }
}
