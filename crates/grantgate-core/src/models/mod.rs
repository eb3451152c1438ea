//! Domain models for upload and download grants.

pub mod category;
pub mod constraint;
pub mod grant;
pub mod status;
pub mod upload;

pub use category::AssetCategory;
pub use constraint::{
    ConstraintTemplate, DocumentConstraint, ImageConstraint, UploadMetadata, VideoConstraint,
};
pub use grant::{DownloadGrant, ObjectId, ResolvedDownload, SignedGrant};
pub use status::{TokenStatus, UploadStatus};
pub use upload::{EnrichedRequest, UploadRequest};
