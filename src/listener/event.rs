use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Object type tag carried by dictionary change events
pub const DICTIONARY_OBJECT_TYPE: &str = "DICTIONARY";

/// Known dictionary statuses. Kept as plain strings on the wire so unknown
/// values can be skipped instead of failing the whole batch.
pub mod dictionary_status {
    pub const ADDED: &str = "ADDED";
    pub const UPDATED: &str = "UPDATED";
    pub const DELETED: &str = "DELETED";
    pub const CREATED: &str = "CREATED";
}

/// One change notification for a named content dictionary.
///
/// Delivered in ordered batches: each push message carries a JSON array of
/// events whose order reflects emission order at the source. No ordering is
/// guaranteed across batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryChangeEvent {
    #[serde(rename = "objectType")]
    pub object_type: String,
    pub status: String,
    /// Opaque dictionary payload
    pub dictionary: Value,
}
