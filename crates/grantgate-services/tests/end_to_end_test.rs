use std::sync::Arc;

use grantgate_client::HttpAuthority;
use grantgate_core::{
    AssetCategory, CorrelationId, GrantError, GrantGateConfig, UploadRequest, VerificationMode,
};
use grantgate_services::test_helpers::{signed_token, signing_jwks};
use grantgate_services::GrantService;
use mockito::{Matcher, ServerGuard};
use serde_json::json;

fn config(url: &str) -> GrantGateConfig {
    let mut config = GrantGateConfig::new(url);
    config.service_name = "catalog".to_string();
    config.retry.max_attempts = 1;
    config
}

async fn connect(server: &ServerGuard) -> Result<GrantService, GrantError> {
    let config = config(&server.url());
    let authority = Arc::new(HttpAuthority::from_config(&config)?);
    GrantService::connect(&config, authority).await
}

async fn mock_jwks(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("GET", "/.well-known/jwks")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::to_string(&signing_jwks()).unwrap())
        .create_async()
        .await
}

#[tokio::test]
async fn upload_then_download_against_http_authority() {
    let mut server = mockito::Server::new_async().await;
    let jwks = mock_jwks(&mut server).await;
    let bound = signed_token("obj-cover");

    let bulk = server
        .mock("POST", "/upload/bulkRequest")
        .match_header("Request-ID", "flow-1")
        .match_body(Matcher::Regex(r#""serviceName":"catalog""#.to_string()))
        .with_status(200)
        .with_body(
            json!({
                "message": "ok",
                "data": [{
                    "identifier": "cover",
                    "signedUrl": "https://storage.example.com/put/cover",
                    "jwtToken": bound,
                    "expiry": 4_000_000_000_i64
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let check = server
        .mock("POST", "/upload/check")
        .match_body(Matcher::Json(json!({ "tokens": ["obj-cover"] })))
        .with_status(200)
        .with_body(
            json!({
                "message": "ok",
                "data": [{ "token": "obj-cover", "status": "UPLOAD_SUCCESS" }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let download = server
        .mock("POST", "/download/request")
        .match_body(Matcher::Json(
            json!({ "tokens": ["obj-cover"], "expiryInSeconds": 10000 }),
        ))
        .with_status(200)
        .with_body(
            json!({
                "message": "ok",
                "data": [{
                    "token": "obj-cover",
                    "signedUrl": "",
                    "expiry": 4_000_000_000_i64,
                    "publicUrl": "https://cdn.example.com/cover"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let service = connect(&server).await.unwrap();
    let issued = service
        .issue_upload_grants(
            &CorrelationId::new("flow-1"),
            AssetCategory::Image,
            &[UploadRequest::new("cover", "cover.png", "image/png").public()],
        )
        .await
        .unwrap()
        .issued;
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].object_id.as_str(), "obj-cover");

    let downloads = service
        .issue_download_grant(
            &CorrelationId::new("flow-2"),
            &[issued[0].grant.bound_token.clone()],
        )
        .await
        .unwrap();
    assert_eq!(downloads[0].url, "https://cdn.example.com/cover");
    assert!(downloads[0].is_public);

    jwks.assert_async().await;
    bulk.assert_async().await;
    check.assert_async().await;
    download.assert_async().await;
}

#[tokio::test]
async fn key_set_fetch_failure_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/.well-known/jwks")
        .with_status(500)
        .with_body(
            json!({ "errors": [{ "reqId": "x", "code": "INTERNAL", "message": "boom" }] })
                .to_string(),
        )
        .create_async()
        .await;

    let err = match connect(&server).await {
        Ok(_) => panic!("service must not start without a key set"),
        Err(e) => e,
    };
    assert!(matches!(err, GrantError::UpstreamRejected { ref code, .. } if code == "INTERNAL"));
}

#[tokio::test]
async fn not_ready_download_makes_no_download_request() {
    let mut server = mockito::Server::new_async().await;
    let _jwks = mock_jwks(&mut server).await;
    let _mock = server
        .mock("POST", "/upload/check")
        .with_status(200)
        .with_body(
            json!({
                "message": "ok",
                "data": [{ "token": "obj-late", "status": "UPLOAD_ON_MALWARE_SCANNING" }]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let download = server
        .mock("POST", "/download/request")
        .expect(0)
        .create_async()
        .await;

    let service = connect(&server).await.unwrap();
    let err = service
        .issue_download_grant(&CorrelationId::nil(), &[signed_token("obj-late")])
        .await
        .unwrap_err();

    assert!(matches!(err, GrantError::NotReady { .. }));
    download.assert_async().await;
}

#[tokio::test]
async fn pass_through_mode_skips_key_fetch() {
    let server = mockito::Server::new_async().await;
    let mut config = config(&server.url());
    config.verification_mode = VerificationMode::PassThrough;
    let authority = Arc::new(HttpAuthority::from_config(&config).unwrap());

    let service = GrantService::connect(&config, authority).await.unwrap();
    assert!(service.verifier().is_pass_through());
    let id = service
        .verify_token(&signed_token("obj-any"))
        .await
        .unwrap();
    assert_eq!(id.as_str(), "obj-any");
}
