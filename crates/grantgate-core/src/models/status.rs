use serde::{Deserialize, Serialize};
use std::fmt;

/// Upload lifecycle as tracked by the status authority.
///
/// `INITIATE_UPLOAD → UPLOAD_ON_METADATA_VALIDATION → UPLOAD_ON_MALWARE_SCANNING →
/// {UPLOAD_SUCCESS | UPLOAD_VALIDATION_FAILED | UPLOAD_VIRUS_DETECTED}`.
/// Grantgate only reads this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    InitiateUpload,
    UploadOnMetadataValidation,
    UploadOnMalwareScanning,
    UploadSuccess,
    UploadValidationFailed,
    UploadVirusDetected,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::InitiateUpload => "INITIATE_UPLOAD",
            UploadStatus::UploadOnMetadataValidation => "UPLOAD_ON_METADATA_VALIDATION",
            UploadStatus::UploadOnMalwareScanning => "UPLOAD_ON_MALWARE_SCANNING",
            UploadStatus::UploadSuccess => "UPLOAD_SUCCESS",
            UploadStatus::UploadValidationFailed => "UPLOAD_VALIDATION_FAILED",
            UploadStatus::UploadVirusDetected => "UPLOAD_VIRUS_DETECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::UploadSuccess
                | UploadStatus::UploadValidationFailed
                | UploadStatus::UploadVirusDetected
        )
    }

    /// The only state that admits a download grant.
    pub fn is_success(&self) -> bool {
        matches!(self, UploadStatus::UploadSuccess)
    }

    /// Terminal failure; the object will never become downloadable.
    pub fn is_denied(&self) -> bool {
        matches!(
            self,
            UploadStatus::UploadValidationFailed | UploadStatus::UploadVirusDetected
        )
    }

    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one upload token as reported by the status authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStatus {
    pub token: String,
    pub status: UploadStatus,
}

impl TokenStatus {
    pub fn new(token: impl Into<String>, status: UploadStatus) -> Self {
        Self {
            token: token.into(),
            status,
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.token, self.status)
    }
}
