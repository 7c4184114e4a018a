//! Recorded descriptions of verb invocations
//!
//! Every call made through a fake client is reduced to one [`Action`] and
//! appended to the client's action log before it is applied, so tests can
//! assert on exactly what a controller asked for.

use crate::patch::PatchType;
use crate::resource::{GVK, GVR};
use bytes::Bytes;
use kube::api::{ListParams, WatchParams};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Watch,
    Create,
    Update,
    Delete,
    DeleteCollection,
    Patch,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Watch => "watch",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::DeleteCollection => "deletecollection",
            Verb::Patch => "patch",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selectors and resource version carried by list-like calls
///
/// Only the label selector is acted upon; the field selector and resource
/// version are recorded for assertions but never enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRestrictions {
    pub labels: Option<String>,
    pub fields: Option<String>,
    pub resource_version: Option<String>,
}

impl From<&ListParams> for ListRestrictions {
    fn from(params: &ListParams) -> Self {
        Self {
            labels: params.label_selector.clone(),
            fields: params.field_selector.clone(),
            resource_version: params.resource_version.clone(),
        }
    }
}

impl From<&WatchParams> for ListRestrictions {
    fn from(params: &WatchParams) -> Self {
        Self {
            labels: params.label_selector.clone(),
            fields: params.field_selector.clone(),
            resource_version: None,
        }
    }
}

/// Verb specific part of an action
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Get {
        name: String,
    },
    List {
        kind: GVK,
        restrictions: ListRestrictions,
    },
    Watch {
        restrictions: ListRestrictions,
    },
    Create {
        object: Value,
    },
    Update {
        object: Value,
    },
    Delete {
        name: String,
    },
    DeleteCollection {
        restrictions: ListRestrictions,
    },
    Patch {
        name: String,
        patch_type: PatchType,
        payload: Bytes,
    },
}

/// One verb invocation against a resource in a namespace
///
/// An empty namespace addresses cluster-scoped objects, or every namespace
/// for list, watch and delete-collection calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub resource: GVR,
    pub namespace: String,
    pub subresource: Option<String>,
    pub request: Request,
}

impl Action {
    fn new(resource: GVR, namespace: &str, request: Request) -> Self {
        Self {
            resource,
            namespace: namespace.to_string(),
            subresource: None,
            request,
        }
    }

    pub fn get(resource: GVR, namespace: &str, name: &str) -> Self {
        Self::new(
            resource,
            namespace,
            Request::Get {
                name: name.to_string(),
            },
        )
    }

    pub fn list(resource: GVR, kind: GVK, namespace: &str, params: &ListParams) -> Self {
        Self::new(
            resource,
            namespace,
            Request::List {
                kind,
                restrictions: params.into(),
            },
        )
    }

    pub fn watch(resource: GVR, namespace: &str, params: &WatchParams) -> Self {
        Self::new(
            resource,
            namespace,
            Request::Watch {
                restrictions: params.into(),
            },
        )
    }

    pub fn create(resource: GVR, namespace: &str, object: Value) -> Self {
        Self::new(resource, namespace, Request::Create { object })
    }

    pub fn update(resource: GVR, namespace: &str, object: Value) -> Self {
        Self::new(resource, namespace, Request::Update { object })
    }

    pub fn delete(resource: GVR, namespace: &str, name: &str) -> Self {
        Self::new(
            resource,
            namespace,
            Request::Delete {
                name: name.to_string(),
            },
        )
    }

    pub fn delete_collection(resource: GVR, namespace: &str, params: &ListParams) -> Self {
        Self::new(
            resource,
            namespace,
            Request::DeleteCollection {
                restrictions: params.into(),
            },
        )
    }

    pub fn patch(
        resource: GVR,
        namespace: &str,
        name: &str,
        patch_type: PatchType,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::new(
            resource,
            namespace,
            Request::Patch {
                name: name.to_string(),
                patch_type,
                payload: payload.into(),
            },
        )
    }

    /// Address a subresource such as `status`
    pub fn with_subresource(mut self, subresource: impl Into<String>) -> Self {
        self.subresource = Some(subresource.into());
        self
    }

    pub fn verb(&self) -> Verb {
        match self.request {
            Request::Get { .. } => Verb::Get,
            Request::List { .. } => Verb::List,
            Request::Watch { .. } => Verb::Watch,
            Request::Create { .. } => Verb::Create,
            Request::Update { .. } => Verb::Update,
            Request::Delete { .. } => Verb::Delete,
            Request::DeleteCollection { .. } => Verb::DeleteCollection,
            Request::Patch { .. } => Verb::Patch,
        }
    }

    /// Target name, read from the object for create and update
    pub fn name(&self) -> Option<&str> {
        match &self.request {
            Request::Get { name } | Request::Delete { name } | Request::Patch { name, .. } => {
                Some(name.as_str())
            }
            Request::Create { object } | Request::Update { object } => object
                .get("metadata")
                .and_then(|m| m.get("name"))
                .and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn object(&self) -> Option<&Value> {
        match &self.request {
            Request::Create { object } | Request::Update { object } => Some(object),
            _ => None,
        }
    }

    pub fn restrictions(&self) -> Option<&ListRestrictions> {
        match &self.request {
            Request::List { restrictions, .. }
            | Request::Watch { restrictions }
            | Request::DeleteCollection { restrictions } => Some(restrictions),
            _ => None,
        }
    }

    /// Whether this action is `verb` on the plural `resource`
    pub fn matches(&self, verb: Verb, resource: &str) -> bool {
        self.verb() == verb && self.resource.resource == resource
    }
}
