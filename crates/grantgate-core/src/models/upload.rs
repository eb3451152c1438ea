use serde::{Deserialize, Serialize};

use super::{AssetCategory, UploadMetadata};

/// Raw upload request as received from the surrounding service.
///
/// `file_name` is expected to be sanitised already. `category` is optional: when the
/// caller declares one it must agree with the category of the batch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Caller-supplied correlation id for this object
    pub identifier: String,
    pub file_name: String,
    pub content_type: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<AssetCategory>,
}

impl UploadRequest {
    pub fn new(
        identifier: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            is_public: false,
            category: None,
        }
    }

    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    pub fn with_category(mut self, category: AssetCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// Upload request decorated with its category metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRequest {
    pub identifier: String,
    pub file_name: String,
    pub is_public: bool,
    pub category: AssetCategory,
    pub metadata: UploadMetadata,
}

impl EnrichedRequest {
    pub fn content_type(&self) -> &str {
        self.metadata.content_type()
    }
}
