use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A single container metadata entry, written as `-metadata key=value`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    pub key: String,
    pub value: String,
}

impl MetadataField {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The `key=value` argument handed to the transcoder.
    pub fn as_arg(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

/// Ordered metadata fields. Setting an existing key replaces its value but
/// keeps its position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataSet {
    fields: Vec<MetadataField>,
}

impl MetadataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields<I>(fields: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = MetadataField>,
    {
        let mut set = Self::new();
        for field in fields {
            set.insert(field.key, field.value)?;
        }
        Ok(set)
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), PipelineError> {
        let key = key.into();
        let value = value.into();
        validate_key(&key)?;

        match self.fields.iter_mut().find(|f| f.key == key) {
            Some(existing) => existing.value = value,
            None => self.fields.push(MetadataField { key, value }),
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetadataField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'a> IntoIterator for &'a MetadataSet {
    type Item = &'a MetadataField;
    type IntoIter = std::slice::Iter<'a, MetadataField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

// The transcoder splits `key=value` on the first '=', so keys cannot carry one.
fn validate_key(key: &str) -> Result<(), PipelineError> {
    if key.trim().is_empty() {
        return Err(PipelineError::InvalidMetadata(
            "metadata key must not be empty".to_string(),
        ));
    }
    if key.contains('=') || key.chars().any(char::is_control) {
        return Err(PipelineError::InvalidMetadata(format!(
            "metadata key {:?} contains invalid characters",
            key
        )));
    }
    Ok(())
}
