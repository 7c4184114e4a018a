//! Patch formats accepted by the Patch verb

use crate::{Error, Result};
use serde_json::Value;
use std::fmt;

/// Patch encodings, keyed by the content type a client sends them with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchType {
    /// RFC 6902 JSON Patch - application/json-patch+json
    Json,
    /// RFC 7386 JSON Merge Patch - application/merge-patch+json
    Merge,
    /// Kubernetes Strategic Merge Patch - application/strategic-merge-patch+json
    StrategicMerge,
    /// Server-Side Apply - application/apply-patch+yaml
    Apply,
}

impl PatchType {
    pub fn content_type(&self) -> &'static str {
        match self {
            PatchType::Json => "application/json-patch+json",
            PatchType::Merge => "application/merge-patch+json",
            PatchType::StrategicMerge => "application/strategic-merge-patch+json",
            PatchType::Apply => "application/apply-patch+yaml",
        }
    }

    /// Strategic merge is what the API server assumes when no content type is given
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.contains("application/json-patch+json") => PatchType::Json,
            Some(ct) if ct.contains("application/merge-patch+json") => PatchType::Merge,
            Some(ct) if ct.contains("application/apply-patch+yaml") => PatchType::Apply,
            _ => PatchType::StrategicMerge,
        }
    }

    /// Apply `payload` to `target` in place
    ///
    /// Strategic merge and apply need schema knowledge to merge lists by key;
    /// both are treated as a JSON merge patch here.
    pub fn apply(&self, target: &mut Value, payload: &[u8]) -> Result<()> {
        match self {
            PatchType::Json => {
                let operations: json_patch::Patch = serde_json::from_slice(payload)
                    .map_err(|e| malformed(*self, e.to_string()))?;
                json_patch::patch(target, &operations)?;
            }
            PatchType::Merge | PatchType::StrategicMerge => {
                let document: Value = serde_json::from_slice(payload)
                    .map_err(|e| malformed(*self, e.to_string()))?;
                json_patch::merge(target, &document);
            }
            PatchType::Apply => {
                let document: Value = serde_yaml::from_slice(payload)
                    .map_err(|e| malformed(*self, e.to_string()))?;
                json_patch::merge(target, &document);
            }
        }
        Ok(())
    }
}

impl fmt::Display for PatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_type())
    }
}

fn malformed(patch_type: PatchType, reason: String) -> Error {
    Error::InvalidRequest(format!("malformed {} payload: {}", patch_type, reason))
}
