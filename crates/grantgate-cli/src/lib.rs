use std::path::Path;

use anyhow::{anyhow, Context};
use grantgate_core::catalog::{
    DOCUMENT_PDF, IMAGE_JPEG, IMAGE_JPG, IMAGE_PNG, SPREADSHEET_CONTENT_TYPE, VIDEO_MOV, VIDEO_MP4,
};
use grantgate_core::UploadRequest;

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Content type implied by a file extension, for the types the catalog knows.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" => Some(IMAGE_JPG),
        "jpeg" => Some(IMAGE_JPEG),
        "png" => Some(IMAGE_PNG),
        "mp4" => Some(VIDEO_MP4),
        "mov" => Some(VIDEO_MOV),
        "pdf" => Some(DOCUMENT_PDF),
        "xlsx" => Some(SPREADSHEET_CONTENT_TYPE),
        _ => None,
    }
}

/// Upload request for a local file; the file name doubles as the identifier.
pub fn upload_request_for_path(
    path: &Path,
    content_type: Option<&str>,
    public: bool,
) -> anyhow::Result<UploadRequest> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))?;
    let content_type = match content_type {
        Some(ct) => ct,
        None => content_type_for_path(path).with_context(|| {
            format!(
                "Cannot infer content type of {}; pass --content-type",
                path.display()
            )
        })?,
    };

    let request = UploadRequest::new(file_name, file_name, content_type);
    Ok(if public { request.public() } else { request })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extension_mapping_is_case_insensitive() {
        assert_eq!(
            content_type_for_path(Path::new("a/b/photo.PNG")),
            Some("image/png")
        );
        assert_eq!(
            content_type_for_path(Path::new("report.xlsx")),
            Some(SPREADSHEET_CONTENT_TYPE)
        );
        assert_eq!(content_type_for_path(Path::new("anim.gif")), None);
        assert_eq!(content_type_for_path(Path::new("README")), None);
    }

    #[test]
    fn request_uses_file_name_as_identifier() {
        let request =
            upload_request_for_path(&PathBuf::from("/tmp/cover.jpg"), None, true).unwrap();
        assert_eq!(request.identifier, "cover.jpg");
        assert_eq!(request.content_type, "image/jpg");
        assert!(request.is_public);
    }

    #[test]
    fn explicit_content_type_wins() {
        let request =
            upload_request_for_path(Path::new("blob.bin"), Some("application/pdf"), false)
                .unwrap();
        assert_eq!(request.content_type, "application/pdf");
        assert!(upload_request_for_path(Path::new("blob.bin"), None, false).is_err());
    }
}
