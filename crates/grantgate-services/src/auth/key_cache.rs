//! Public-key set cache with whole-set rotation.
//!
//! Readers take an `Arc<KeySet>` snapshot and never observe a partially rotated set;
//! `refresh` builds the new set completely before swapping it in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use grantgate_client::{GrantAuthority, Jwks};
use grantgate_core::{CorrelationId, GrantError, GrantResult, UpstreamCall};
use tokio::sync::RwLock;

use super::jwks::KeySet;

enum KeySource {
    Authority(Arc<dyn GrantAuthority>),
    File(PathBuf),
    Fixed,
}

pub struct KeySetCache {
    source: KeySource,
    current: RwLock<Arc<KeySet>>,
}

impl KeySetCache {
    /// Fetch the authority's key set. A failure here is fatal to startup.
    pub async fn fetch(
        authority: Arc<dyn GrantAuthority>,
        correlation_id: &CorrelationId,
    ) -> GrantResult<Self> {
        let set = load_from_authority(authority.as_ref(), correlation_id).await?;
        tracing::info!(
            key_count = set.len(),
            key_ids = ?set.key_ids(),
            "Loaded upstream public key set"
        );
        Ok(Self {
            source: KeySource::Authority(authority),
            current: RwLock::new(Arc::new(set)),
        })
    }

    /// Load a JWKS document from disk.
    pub async fn from_file(path: impl AsRef<Path>) -> GrantResult<Self> {
        let path = path.as_ref().to_path_buf();
        let set = load_from_file(&path).await?;
        tracing::info!(
            key_count = set.len(),
            path = %path.display(),
            "Loaded static public key set"
        );
        Ok(Self {
            source: KeySource::File(path),
            current: RwLock::new(Arc::new(set)),
        })
    }

    /// Wrap an in-memory JWKS document. `refresh` is a no-op for such a cache.
    pub fn from_jwks(jwks: &Jwks) -> GrantResult<Self> {
        Ok(Self {
            source: KeySource::Fixed,
            current: RwLock::new(Arc::new(KeySet::from_jwks(jwks)?)),
        })
    }

    pub async fn current_key_set(&self) -> Arc<KeySet> {
        self.current.read().await.clone()
    }

    /// Reload the key set from its source and swap it in atomically.
    ///
    /// On failure the previous set stays active.
    pub async fn refresh(&self, correlation_id: &CorrelationId) -> GrantResult<()> {
        let set = match &self.source {
            KeySource::Authority(authority) => {
                load_from_authority(authority.as_ref(), correlation_id).await?
            }
            KeySource::File(path) => load_from_file(path).await?,
            KeySource::Fixed => return Ok(()),
        };

        let key_ids = set.key_ids();
        *self.current.write().await = Arc::new(set);
        tracing::info!(
            correlation_id = %correlation_id,
            key_ids = ?key_ids,
            "Rotated public key set"
        );
        Ok(())
    }
}

async fn load_from_authority(
    authority: &dyn GrantAuthority,
    correlation_id: &CorrelationId,
) -> GrantResult<KeySet> {
    let jwks = authority.fetch_key_set(correlation_id).await?;
    KeySet::from_jwks(&jwks).map_err(|e| {
        GrantError::decode_failure(UpstreamCall::Jwks, correlation_id, e.to_string())
    })
}

async fn load_from_file(path: &Path) -> GrantResult<KeySet> {
    let raw = tokio::fs::read(path).await.map_err(|e| {
        GrantError::Configuration(format!("Failed to read JWKS file {}: {}", path.display(), e))
    })?;
    let jwks: Jwks = serde_json::from_slice(&raw).map_err(|e| {
        GrantError::Configuration(format!("Failed to parse JWKS file {}: {}", path.display(), e))
    })?;
    KeySet::from_jwks(&jwks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{foreign_jwks, signing_jwks, FakeAuthority, SIGNING_KEY_ID};

    #[tokio::test]
    async fn fetch_loads_the_authority_set() {
        let authority = Arc::new(FakeAuthority::new());
        let cache = KeySetCache::fetch(authority.clone(), &CorrelationId::nil())
            .await
            .unwrap();
        let set = cache.current_key_set().await;
        assert!(set.select(Some(SIGNING_KEY_ID)).is_some());
        assert_eq!(authority.key_set_fetches(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_fatal() {
        let authority = Arc::new(FakeAuthority::new());
        authority.fail_key_set();
        let result = KeySetCache::fetch(authority, &CorrelationId::nil()).await;
        assert!(matches!(
            result,
            Err(GrantError::UpstreamUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn refresh_swaps_the_whole_set() {
        let authority = Arc::new(FakeAuthority::new());
        let cache = KeySetCache::fetch(authority.clone(), &CorrelationId::nil())
            .await
            .unwrap();
        let before = cache.current_key_set().await;

        authority.set_key_set(foreign_jwks());
        cache.refresh(&CorrelationId::new("rotate-1")).await.unwrap();
        let after = cache.current_key_set().await;

        assert!(before.select(Some(SIGNING_KEY_ID)).is_some());
        assert!(after.select(Some(SIGNING_KEY_ID)).is_none());
        assert_eq!(after.len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_set() {
        let authority = Arc::new(FakeAuthority::new());
        let cache = KeySetCache::fetch(authority.clone(), &CorrelationId::nil())
            .await
            .unwrap();

        authority.fail_key_set();
        assert!(cache.refresh(&CorrelationId::nil()).await.is_err());
        assert!(cache
            .current_key_set()
            .await
            .select(Some(SIGNING_KEY_ID))
            .is_some());
    }

    #[tokio::test]
    async fn static_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jwks.json");
        tokio::fs::write(&path, serde_json::to_vec(&signing_jwks()).unwrap())
            .await
            .unwrap();

        let cache = KeySetCache::from_file(&path).await.unwrap();
        assert_eq!(cache.current_key_set().await.len(), 1);
        cache.refresh(&CorrelationId::nil()).await.unwrap();

        assert!(KeySetCache::from_file(dir.path().join("missing.json")).await.is_err());
    }
}
