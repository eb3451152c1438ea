//! Constraint catalog
//!
//! Static mapping from [`AssetCategory`] to its constraint template and legal content
//! types. The catalog is total over the closed category enum, so a lookup can never fail
//! at request time.

use crate::models::{
    AssetCategory, ConstraintTemplate, DocumentConstraint, ImageConstraint, UploadMetadata,
    VideoConstraint,
};

/// The only content type accepted for bulk-action uploads.
pub const SPREADSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const IMAGE_JPG: &str = "image/jpg";
pub const IMAGE_JPEG: &str = "image/jpeg";
pub const IMAGE_PNG: &str = "image/png";
pub const VIDEO_MP4: &str = "video/mp4";
pub const VIDEO_MOV: &str = "video/mov";
pub const DOCUMENT_PDF: &str = "application/pdf";

const IMAGE_CONTENT_TYPES: &[&str] = &[IMAGE_JPG, IMAGE_JPEG, IMAGE_PNG];
const VIDEO_CONTENT_TYPES: &[&str] = &[VIDEO_MP4, VIDEO_MOV];
const DOCUMENT_CONTENT_TYPES: &[&str] = &[DOCUMENT_PDF];
const BULK_ACTION_CONTENT_TYPES: &[&str] = &[SPREADSHEET_CONTENT_TYPE];

static IMAGE_TEMPLATE: ConstraintTemplate =
    ConstraintTemplate::new(UploadMetadata::Image(ImageConstraint {
        min_size: 1,
        max_size: 40_000_000,
        min_width: 1,
        max_width: 2048,
        min_height: 1,
        max_height: 2048,
        content_type: String::new(),
    }));

static VIDEO_TEMPLATE: ConstraintTemplate =
    ConstraintTemplate::new(UploadMetadata::Video(VideoConstraint {
        min_size: 1,
        max_size: 50_000_000,
        max_duration: 120,
        content_type: String::new(),
    }));

static DOCUMENT_TEMPLATE: ConstraintTemplate =
    ConstraintTemplate::new(UploadMetadata::Document(DocumentConstraint {
        min_size: 1,
        max_size: 2_000_000,
        content_type: String::new(),
    }));

static BULK_ACTION_TEMPLATE: ConstraintTemplate =
    ConstraintTemplate::new(UploadMetadata::Document(DocumentConstraint {
        min_size: 1,
        max_size: 50_000_000,
        content_type: String::new(),
    }));

/// Constraint template for a category.
pub fn constraints_for(category: AssetCategory) -> &'static ConstraintTemplate {
    match category {
        AssetCategory::Image => &IMAGE_TEMPLATE,
        AssetCategory::Video => &VIDEO_TEMPLATE,
        AssetCategory::Document => &DOCUMENT_TEMPLATE,
        AssetCategory::BulkAction => &BULK_ACTION_TEMPLATE,
    }
}

/// Content types legal for a category.
pub fn allowed_content_types(category: AssetCategory) -> &'static [&'static str] {
    match category {
        AssetCategory::Image => IMAGE_CONTENT_TYPES,
        AssetCategory::Video => VIDEO_CONTENT_TYPES,
        AssetCategory::Document => DOCUMENT_CONTENT_TYPES,
        AssetCategory::BulkAction => BULK_ACTION_CONTENT_TYPES,
    }
}

pub fn is_allowed(category: AssetCategory, content_type: &str) -> bool {
    allowed_content_types(category).contains(&content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_template_and_types() {
        for category in AssetCategory::ALL {
            let template = constraints_for(category);
            assert_eq!(template.metadata().content_type(), "");
            assert!(template.metadata().min_size() >= 1);
            assert!(!allowed_content_types(category).is_empty());
        }
    }

    #[test]
    fn image_template_bounds() {
        match constraints_for(AssetCategory::Image).metadata() {
            UploadMetadata::Image(c) => {
                assert_eq!((c.min_size, c.max_size), (1, 40_000_000));
                assert_eq!((c.min_width, c.max_width), (1, 2048));
                assert_eq!((c.min_height, c.max_height), (1, 2048));
            }
            other => panic!("unexpected image template: {:?}", other),
        }
    }

    #[test]
    fn bulk_action_uses_document_block_and_spreadsheet_only() {
        assert!(matches!(
            constraints_for(AssetCategory::BulkAction).metadata(),
            UploadMetadata::Document(DocumentConstraint { max_size: 50_000_000, .. })
        ));
        assert_eq!(
            allowed_content_types(AssetCategory::BulkAction),
            &[SPREADSHEET_CONTENT_TYPE]
        );
        assert!(!is_allowed(AssetCategory::BulkAction, DOCUMENT_PDF));
    }

    #[test]
    fn video_template_carries_duration() {
        match constraints_for(AssetCategory::Video).metadata() {
            UploadMetadata::Video(c) => assert_eq!(c.max_duration, 120),
            other => panic!("unexpected video template: {:?}", other),
        }
        assert!(is_allowed(AssetCategory::Video, VIDEO_MOV));
        assert!(!is_allowed(AssetCategory::Video, IMAGE_PNG));
    }
}
