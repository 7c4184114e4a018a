//! Resource identities and the registry of kinds known to a fake client

use crate::{Error, Result};
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope, SubResourceScope};
use kube::Resource;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Whether objects of a `Resource::Scope` live inside a namespace
pub trait KindScope {
    fn is_namespaced() -> bool;
}

impl KindScope for NamespaceResourceScope {
    fn is_namespaced() -> bool {
        true
    }
}

impl KindScope for ClusterResourceScope {
    fn is_namespaced() -> bool {
        false
    }
}

impl KindScope for SubResourceScope {
    fn is_namespaced() -> bool {
        false
    }
}

/// Dispatch key of a resource kind: group, version and plural resource name
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GVR {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GVR {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// Identity of `K` as declared by its `Resource` implementation
    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self::new(K::group(&()), K::version(&()), K::plural(&()))
    }
}

impl fmt::Display for GVR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// Typing key of a resource kind, used for lists and watches
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GVK {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GVK {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self::new(K::group(&()), K::version(&()), K::kind(&()))
    }

    /// Read `apiVersion` and `kind` off a serialized object
    pub fn from_object(value: &Value) -> Result<Self> {
        let api_version = value
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidRequest("Missing apiVersion".to_string()))?;
        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidRequest("Missing kind".to_string()))?;

        Ok(match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        })
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn list_kind(&self) -> String {
        format!("{}List", self.kind)
    }
}

/// Kinds the fake client knows how to serve
///
/// A real API server only answers for installed resources, so objects of
/// unregistered kinds are refused when seeding or routing HTTP requests.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    kinds: BTreeMap<GVR, GVK>,
    resources: BTreeMap<GVK, GVR>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, gvr: GVR, gvk: GVK) {
        self.resources.insert(gvk.clone(), gvr.clone());
        self.kinds.insert(gvr, gvk);
    }

    pub fn register_resource<K: Resource<DynamicType = ()>>(&mut self) {
        self.register(GVR::of::<K>(), GVK::of::<K>());
    }

    pub fn kind_for(&self, gvr: &GVR) -> Result<&GVK> {
        self.kinds.get(gvr).ok_or_else(|| Error::UnknownResource {
            resource: gvr.to_string(),
        })
    }

    pub fn resource_for(&self, gvk: &GVK) -> Result<&GVR> {
        self.resources
            .get(gvk)
            .ok_or_else(|| Error::UnknownResource {
                resource: format!("{} (kind {})", gvk.api_version(), gvk.kind),
            })
    }
}
