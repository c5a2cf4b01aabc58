//! The converter contract every native schema implements.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::Document;
use crate::error::TileLabelError;

/// Bidirectional mapping between a native schema and the exchange
/// [`Document`].
///
/// `to_exchange` skips individual malformed entries (logging a warning) and
/// only fails when the payload as a whole is structurally unusable.
/// `from_exchange` drops whatever the native schema cannot represent instead
/// of failing; `build_conversion_report` in the `conversion` module
/// describes those drops ahead of time.
pub trait FormatConverter {
    /// The native, deserialized representation of the schema.
    type Native;

    /// Short schema name used in errors and logs.
    fn name(&self) -> &'static str;

    fn to_exchange(&self, native: &Self::Native) -> Result<Document, TileLabelError>;

    fn from_exchange(&self, document: &Document) -> Result<Self::Native, TileLabelError>;
}

/// A list element that either matched its schema or was kept verbatim.
///
/// Native list fields use this so that one bad entry does not fail the
/// whole payload at deserialization time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry<T> {
    Parsed(T),
    Malformed(Value),
}

impl<T> Entry<T> {
    pub fn parsed(&self) -> Option<&T> {
        match self {
            Entry::Parsed(value) => Some(value),
            Entry::Malformed(_) => None,
        }
    }
}

/// Deserializes a native payload after checking its top-level shape.
///
/// A payload that is not a JSON object, or lacks one of `required` keys, is
/// a [`TileLabelError::SchemaInvalid`]; so is any remaining type mismatch
/// outside the lenient [`Entry`] lists.
pub(crate) fn native_from_value<T: DeserializeOwned>(
    value: Value,
    format: &'static str,
    path: &Path,
    required: &[&str],
) -> Result<T, TileLabelError> {
    let invalid = |message: String| TileLabelError::SchemaInvalid {
        format,
        path: path.to_path_buf(),
        message,
    };

    let Some(object) = value.as_object() else {
        return Err(invalid("expected a JSON object at the top level".to_string()));
    };
    for key in required {
        if !object.contains_key(*key) {
            return Err(invalid(format!("missing required key '{key}'")));
        }
    }

    serde_json::from_value(value).map_err(|source| invalid(source.to_string()))
}

/// Short, single-line rendering of a rejected entry for log messages.
pub(crate) fn describe_malformed(value: &Value) -> String {
    const MAX_LEN: usize = 120;
    let mut rendered = value.to_string();
    if rendered.len() > MAX_LEN {
        let mut cut = MAX_LEN;
        while !rendered.is_char_boundary(cut) {
            cut -= 1;
        }
        rendered.truncate(cut);
        rendered.push_str("...");
    }
    rendered
}
