//! History payload parsing for finished jobs.
//!
//! The service's `/history/{prompt_id}` endpoint answers `{}` while a
//! job is still queued or executing, and `{"<prompt_id>": {...}}` once
//! it has finished (successfully or not). This module deserializes the
//! finished entry into typed artifact references and surfaces recorded
//! execution errors.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::Deserialize;

/// History record for one finished prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    /// Outputs keyed by the id of the node that produced them.
    #[serde(default)]
    pub outputs: BTreeMap<String, NodeOutput>,
    #[serde(default)]
    pub status: Option<HistoryStatus>,
}

/// Output payload of a single node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ArtifactRef>,
}

/// Reference to one stored artifact, addressable via the `/view` endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArtifactRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Storage category on the service side, usually `"output"`.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "output".to_string()
}

/// Completion status block of a history entry.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    /// Raw status messages, pairs of `["<name>", {...}]`.
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

impl HistoryEntry {
    /// All artifact references in deterministic order: producing node id
    /// first (lexicographic), then declaration order within the node.
    pub fn ordered_artifacts(&self) -> Vec<&ArtifactRef> {
        self.outputs
            .values()
            .flat_map(|output| output.images.iter())
            .collect()
    }

    /// The recorded execution error, if the service marked this entry failed.
    ///
    /// Prefers the `exception_message` carried by an `execution_error`
    /// status message; falls back to a generic description.
    pub fn error_message(&self) -> Option<String> {
        let status = self.status.as_ref()?;
        if status.status_str.as_deref() != Some("error") {
            return None;
        }
        let detail = status.messages.iter().find_map(|message| {
            let pair = message.as_array()?;
            if pair.first()?.as_str()? != "execution_error" {
                return None;
            }
            pair.get(1)?
                .get("exception_message")?
                .as_str()
                .map(str::to_string)
        });
        Some(detail.unwrap_or_else(|| "execution failed without detail".to_string()))
    }
}

/// Parse a `/history/{prompt_id}` response body.
///
/// Returns `Ok(None)` while the job has no history record yet, the
/// parsed entry once it does, and `Err` when the body is not the
/// expected object shape.
pub fn parse_history(
    prompt_id: &str,
    value: &serde_json::Value,
) -> Result<Option<HistoryEntry>, serde_json::Error> {
    if !value.is_object() {
        return Err(serde_json::Error::custom("history response is not an object"));
    }
    match value.get(prompt_id) {
        None => Ok(None),
        Some(entry) => serde_json::from_value(entry.clone()).map(Some),
    }
}
