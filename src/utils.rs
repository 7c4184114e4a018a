use crate::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;
use uuid::Uuid;

pub fn extract_metadata(object: &Value) -> Result<ObjectMeta> {
    let meta = object
        .get("metadata")
        .ok_or_else(|| Error::InvalidRequest("Object missing metadata field".to_string()))?;

    serde_json::from_value(meta.clone())
        .map_err(|e| Error::InvalidRequest(format!("Failed to parse metadata: {}", e)))
}

pub fn extract_name(meta: &ObjectMeta) -> Result<String> {
    meta.name
        .clone()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::InvalidRequest("Object name is required".to_string()))
}

/// The namespace an object lands in when sent to `namespace`
///
/// An object may omit its namespace; if it carries one it has to agree
/// with the request.
pub fn reconcile_namespace(meta: &mut ObjectMeta, namespace: &str) -> Result<()> {
    match meta.namespace.as_deref() {
        None | Some("") => {}
        Some(ns) if ns == namespace => {}
        Some(ns) => {
            return Err(Error::InvalidRequest(format!(
                "the namespace of the object ({}) does not match the namespace on the request ({})",
                ns, namespace
            )))
        }
    }
    meta.namespace = (!namespace.is_empty()).then(|| namespace.to_string());
    Ok(())
}

/// Stable uid for an object, so identical call sequences produce identical objects
pub fn derive_uid(resource: &str, namespace: &str, name: &str, resource_version: u64) -> String {
    let seed = format!("{}/{}/{}/{}", resource, namespace, name, resource_version);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string()
}

pub fn labels_of(object: &Value) -> std::collections::BTreeMap<String, String> {
    object
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
