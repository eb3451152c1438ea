use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GrantError;

/// Asset category of an upload batch.
///
/// The category picks the constraint template and the set of legal content types.
/// One batch call carries exactly one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetCategory {
    Image,
    Video,
    Document,
    BulkAction,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::Image,
        AssetCategory::Video,
        AssetCategory::Document,
        AssetCategory::BulkAction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Image => "IMAGE",
            AssetCategory::Video => "VIDEO",
            AssetCategory::Document => "DOCUMENT",
            AssetCategory::BulkAction => "BULK_ACTION",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = GrantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "IMAGE" => Ok(AssetCategory::Image),
            "VIDEO" => Ok(AssetCategory::Video),
            "DOCUMENT" => Ok(AssetCategory::Document),
            "BULK_ACTION" | "BULKACTION" => Ok(AssetCategory::BulkAction),
            other => Err(GrantError::InvalidRequest(format!(
                "Unknown asset category: {}",
                other
            ))),
        }
    }
}
