//! Capability manifests and their fingerprints.

use serde::{Deserialize, Serialize};

/// Delimiter used when joining sorted names into a fingerprint.
const FINGERPRINT_DELIMITER: &str = ",";

/// The actions and workflows a webhook worker advertises on its health endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityManifest {
    pub actions: Vec<String>,
    pub workflows: Vec<String>,
}

/// Wire shape of the health response. Missing or `null` lists are empty.
#[derive(Deserialize)]
struct ManifestBody {
    #[serde(default)]
    actions: Option<Vec<String>>,
    #[serde(default)]
    workflows: Option<Vec<String>>,
}

impl CapabilityManifest {
    pub fn new<A, W>(actions: A, workflows: W) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        W: IntoIterator,
        W::Item: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            workflows: workflows.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a health endpoint response body.
    ///
    /// The body must be a JSON object; serde would otherwise accept a
    /// two-element array as the same struct.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom(
                "health response must be a JSON object",
            ));
        }
        let body: ManifestBody = serde_json::from_value(value)?;
        Ok(Self {
            actions: body.actions.unwrap_or_default(),
            workflows: body.workflows.unwrap_or_default(),
        })
    }

    /// Fingerprint both capability sets.
    pub fn fingerprint(&self) -> ManifestFingerprint {
        ManifestFingerprint {
            actions: fingerprint(&self.actions),
            workflows: fingerprint(&self.workflows),
        }
    }
}

/// Fingerprints of a manifest's action set and workflow set, compared
/// across polls to detect capability drift.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestFingerprint {
    pub actions: String,
    pub workflows: String,
}

/// Canonical fingerprint of a collection of names: sorted, then joined
/// with a comma.
///
/// Order does not matter, duplicates do. Names are not escaped, so a
/// name containing a comma can collide with two separate names
/// (`["a,b"]` and `["a", "b"]` produce the same fingerprint).
pub fn fingerprint<S: AsRef<str>>(items: &[S]) -> String {
    let mut sorted: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.join(FINGERPRINT_DELIMITER)
}
