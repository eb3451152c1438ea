//! Category constraint blocks sent to the grant authority.
//!
//! Each upload descriptor carries exactly one metadata block. The block is modelled as
//! [`UploadMetadata`], a tagged union whose variant serialises under the wire key the
//! authority expects (`imageMetadata`, `videoMetadata` or `documentMetadata`).

use serde::{Deserialize, Serialize};

/// Size and dimension bounds for image uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConstraint {
    pub min_size: u64,
    pub max_size: u64,
    pub min_width: u64,
    pub max_width: u64,
    pub min_height: u64,
    pub max_height: u64,
    pub content_type: String,
}

/// Size and duration bounds for video uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraint {
    pub min_size: u64,
    pub max_size: u64,
    /// Maximum duration in seconds
    #[serde(rename = "duration")]
    pub max_duration: u64,
    pub content_type: String,
}

/// Size bounds for documents and bulk-action spreadsheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentConstraint {
    pub min_size: u64,
    pub max_size: u64,
    pub content_type: String,
}

/// Category-specific metadata block attached to one upload descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadMetadata {
    #[serde(rename = "imageMetadata")]
    Image(ImageConstraint),
    #[serde(rename = "videoMetadata")]
    Video(VideoConstraint),
    #[serde(rename = "documentMetadata")]
    Document(DocumentConstraint),
}

impl UploadMetadata {
    pub fn content_type(&self) -> &str {
        match self {
            UploadMetadata::Image(c) => &c.content_type,
            UploadMetadata::Video(c) => &c.content_type,
            UploadMetadata::Document(c) => &c.content_type,
        }
    }

    pub fn min_size(&self) -> u64 {
        match self {
            UploadMetadata::Image(c) => c.min_size,
            UploadMetadata::Video(c) => c.min_size,
            UploadMetadata::Document(c) => c.min_size,
        }
    }

    pub fn max_size(&self) -> u64 {
        match self {
            UploadMetadata::Image(c) => c.max_size,
            UploadMetadata::Video(c) => c.max_size,
            UploadMetadata::Document(c) => c.max_size,
        }
    }

    fn set_content_type(&mut self, content_type: &str) {
        let slot = match self {
            UploadMetadata::Image(c) => &mut c.content_type,
            UploadMetadata::Video(c) => &mut c.content_type,
            UploadMetadata::Document(c) => &mut c.content_type,
        };
        *slot = content_type.to_string();
    }
}

/// Immutable per-category constraint template.
///
/// Templates are only ever read; [`ConstraintTemplate::instantiate`] hands out a copy
/// whose `contentType` is the one field allowed to differ from the template.
#[derive(Debug, PartialEq, Eq)]
pub struct ConstraintTemplate(UploadMetadata);

impl ConstraintTemplate {
    pub(crate) const fn new(metadata: UploadMetadata) -> Self {
        Self(metadata)
    }

    pub fn metadata(&self) -> &UploadMetadata {
        &self.0
    }

    /// Clone the template and stamp the negotiated content type onto the copy.
    pub fn instantiate(&self, content_type: &str) -> UploadMetadata {
        let mut metadata = self.0.clone();
        metadata.set_content_type(content_type);
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_serializes_under_single_wire_key() {
        let meta = UploadMetadata::Video(VideoConstraint {
            min_size: 1,
            max_size: 10,
            max_duration: 120,
            content_type: "video/mp4".to_string(),
        });
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            value,
            json!({
                "videoMetadata": {
                    "minSize": 1,
                    "maxSize": 10,
                    "duration": 120,
                    "contentType": "video/mp4"
                }
            })
        );
    }

    #[test]
    fn instantiate_only_touches_content_type() {
        let template = ConstraintTemplate::new(UploadMetadata::Document(DocumentConstraint {
            min_size: 1,
            max_size: 2_000_000,
            content_type: String::new(),
        }));
        let copy = template.instantiate("application/pdf");
        assert_eq!(copy.content_type(), "application/pdf");
        assert_eq!(copy.max_size(), 2_000_000);
        assert_eq!(template.metadata().content_type(), "");
    }
}
