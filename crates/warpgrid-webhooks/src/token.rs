//! Signing-key credential issuer.
//!
//! Tokens are `{issued_at}.{hex(sha256(key, tenant, purpose, issued_at))}`.
//! They identify the tenant and purpose to whoever holds the same key;
//! verification, expiry and revocation happen on the worker side.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use warpgrid_health::BoxFuture;

use crate::collab::CredentialIssuer;
use crate::error::{WebhookError, WebhookResult};

/// Issues tenant tokens derived from a shared signing key.
#[derive(Clone)]
pub struct SigningKeyIssuer {
    key: Vec<u8>,
}

impl SigningKeyIssuer {
    pub fn new(key: impl Into<Vec<u8>>) -> WebhookResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(WebhookError::Config("signing key must not be empty".into()));
        }
        Ok(Self { key })
    }

    /// Issue a token for `tenant_id` and `purpose` at `issued_at` (unix seconds).
    pub fn issue(&self, tenant_id: &str, purpose: &str, issued_at: u64) -> anyhow::Result<String> {
        anyhow::ensure!(!tenant_id.is_empty(), "tenant id must not be empty");
        Ok(format!(
            "{issued_at}.{}",
            self.digest(tenant_id, purpose, issued_at)
        ))
    }

    fn digest(&self, tenant_id: &str, purpose: &str, issued_at: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.key);
        hasher.update([0u8]);
        hasher.update(tenant_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(purpose.as_bytes());
        hasher.update([0u8]);
        hasher.update(issued_at.to_be_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for SigningKeyIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyIssuer")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl CredentialIssuer for SigningKeyIssuer {
    fn generate_tenant_token<'a>(
        &'a self,
        tenant_id: &'a str,
        purpose: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move { self.issue(tenant_id, purpose, epoch_secs()) })
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            SigningKeyIssuer::new(Vec::new()),
            Err(WebhookError::Config(_))
        ));
    }

    #[test]
    fn token_binds_tenant_purpose_and_time() {
        let issuer = SigningKeyIssuer::new("k1").unwrap();
        let token = issuer.issue("t1", "webhook-worker", 1000).unwrap();
        let (issued_at, digest) = token.split_once('.').unwrap();
        assert_eq!(issued_at, "1000");
        assert_eq!(digest.len(), 64);

        assert_eq!(token, issuer.issue("t1", "webhook-worker", 1000).unwrap());
        assert_ne!(token, issuer.issue("t2", "webhook-worker", 1000).unwrap());
        assert_ne!(token, issuer.issue("t1", "other", 1000).unwrap());
        assert_ne!(token, issuer.issue("t1", "webhook-worker", 1001).unwrap());
    }

    #[test]
    fn token_depends_on_key() {
        let a = SigningKeyIssuer::new("k1").unwrap();
        let b = SigningKeyIssuer::new("k2").unwrap();
        assert_ne!(a.issue("t1", "p", 1).unwrap(), b.issue("t1", "p", 1).unwrap());
    }

    #[test]
    fn debug_redacts_key() {
        let issuer = SigningKeyIssuer::new("super-secret").unwrap();
        assert!(!format!("{issuer:?}").contains("super-secret"));
    }

    #[tokio::test]
    async fn issuer_trait_rejects_empty_tenant() {
        let issuer = SigningKeyIssuer::new("k").unwrap();
        assert!(issuer.generate_tenant_token("", "p").await.is_err());
        let token = issuer.generate_tenant_token("t1", "p").await.unwrap();
        let (issued_at, _) = token.split_once('.').unwrap();
        assert_eq!(token, issuer.issue("t1", "p", issued_at.parse().unwrap()).unwrap());
    }
}
