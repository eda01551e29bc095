//! The CID lookup flow: validate, verify captcha, consult cache, call getcid.

use std::sync::Arc;

use keystone_common::constants::{CID_CACHE_TTL_SECS, messages};
use keystone_common::{CidResponse, IdentifierPolicy, LookupRequest, RelayError, UpstreamReply, is_cid};

use crate::captcha::{CaptchaVerifier, SiteVerifyRequest};
use crate::lookup::LookupApi;
use crate::store::CidCache;

/// Settings the handler needs at request time
#[derive(Clone)]
pub struct RelaySettings {
    pub turnstile_secret: Option<String>,
    pub getcid_token: Option<String>,
    pub identifier_policy: IdentifierPolicy,
    pub cache_ttl_secs: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            turnstile_secret: None,
            getcid_token: None,
            identifier_policy: IdentifierPolicy::default(),
            cache_ttl_secs: CID_CACHE_TTL_SECS,
        }
    }
}

/// Relay between the browser, Turnstile, and getcid
pub struct CidService {
    settings: RelaySettings,
    verifier: Arc<dyn CaptchaVerifier>,
    lookup: Arc<dyn LookupApi>,
    cache: Option<Arc<dyn CidCache>>,
}

impl CidService {
    pub fn new(
        settings: RelaySettings,
        verifier: Arc<dyn CaptchaVerifier>,
        lookup: Arc<dyn LookupApi>,
        cache: Option<Arc<dyn CidCache>>,
    ) -> Self {
        Self {
            settings,
            verifier,
            lookup,
            cache,
        }
    }

    pub fn cache(&self) -> Option<&Arc<dyn CidCache>> {
        self.cache.as_ref()
    }

    /// Run one lookup. Every check short-circuits in order, and nothing
    /// leaves the process before the request and config checks pass.
    pub async fn handle(
        &self,
        request: LookupRequest,
        client_ip: Option<String>,
    ) -> Result<CidResponse, RelayError> {
        let iid = request.identifier;

        if !self.settings.identifier_policy.accepts(&iid) {
            return Err(RelayError::InvalidInput(
                self.settings.identifier_policy.rejection_message(),
            ));
        }
        if request.captcha_token.is_empty() {
            return Err(RelayError::InvalidInput(messages::CAPTCHA_MISSING.to_string()));
        }

        let Some(secret) = self.settings.turnstile_secret.as_deref() else {
            tracing::error!("Turnstile secret is not configured");
            return Err(RelayError::Misconfigured(
                messages::TURNSTILE_UNCONFIGURED.to_string(),
            ));
        };
        let Some(token) = self.settings.getcid_token.as_deref() else {
            tracing::warn!("getcid token is not configured yet");
            return Err(RelayError::Unprovisioned(
                messages::GETCID_UNPROVISIONED.to_string(),
            ));
        };

        if let Some(cid) = self.cached_cid(&iid).await {
            tracing::info!(iid = %iid, "Served CID from cache");
            return Ok(CidResponse { cid, cached: true });
        }

        let verdict = self
            .verifier
            .verify(&SiteVerifyRequest {
                secret: secret.to_string(),
                response: request.captcha_token,
                remoteip: client_ip,
            })
            .await?;
        if !verdict.success {
            return Err(RelayError::CaptchaRejected);
        }

        let raw = self.lookup.fetch(&iid, token).await?;

        match UpstreamReply::classify(&raw) {
            UpstreamReply::Empty => {
                tracing::warn!(iid = %iid, "getcid returned an empty body");
                Err(RelayError::UpstreamEmpty)
            }
            UpstreamReply::Cid(cid) => {
                self.store_cid(&iid, &cid).await;
                tracing::info!(iid = %iid, "CID obtained from getcid");
                Ok(CidResponse { cid, cached: false })
            }
            UpstreamReply::Error { message, kind } => {
                tracing::info!(iid = %iid, kind = ?kind, message = %message, "getcid refused lookup");
                Err(RelayError::Upstream { message, kind })
            }
        }
    }

    /// Cache read; failures and malformed entries count as a miss
    async fn cached_cid(&self, iid: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match cache.get(iid).await {
            Ok(Some(value)) if is_cid(&value) => Some(value),
            Ok(Some(_)) => {
                tracing::warn!(iid = %iid, "Ignoring non-numeric cache entry");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(iid = %iid, error = %e, "Cache read failed");
                None
            }
        }
    }

    async fn store_cid(&self, iid: &str, cid: &str) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(e) = cache.put(iid, cid, self.settings.cache_ttl_secs).await {
            tracing::warn!(iid = %iid, error = %e, "Cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCache, FakeLookup, FakeVerifier, settings};
    use keystone_common::UpstreamErrorKind;

    const IID: &str = "111111111222222222333333333444444444555555555666666666777777777";

    fn request(id: &str, token: &str) -> LookupRequest {
        LookupRequest::from_json(&serde_json::json!({"id": id, "tsToken": token}))
    }

    struct Harness {
        verifier: Arc<FakeVerifier>,
        lookup: Arc<FakeLookup>,
        cache: Arc<FakeCache>,
        service: CidService,
    }

    fn harness(verifier: FakeVerifier, lookup: FakeLookup) -> Harness {
        let verifier = Arc::new(verifier);
        let lookup = Arc::new(lookup);
        let cache = Arc::new(FakeCache::default());
        let service = CidService::new(
            settings(),
            verifier.clone(),
            lookup.clone(),
            Some(cache.clone()),
        );
        Harness {
            verifier,
            lookup,
            cache,
            service,
        }
    }

    #[tokio::test]
    async fn test_identifier_is_normalized_before_use() {
        let h = harness(FakeVerifier::accepting(), FakeLookup::replying("123456789"));
        let dashed: String = IID
            .as_bytes()
            .chunks(7)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("-");

        let res = h.service.handle(request(&dashed, "tok"), None).await.unwrap();

        assert_eq!(res.cid, "123456789");
        assert_eq!(h.lookup.calls(), vec![(IID.to_string(), "getcid-token".to_string())]);
        assert_eq!(
            h.cache.puts(),
            vec![(IID.to_string(), "123456789".to_string(), CID_CACHE_TTL_SECS)]
        );
    }

    #[tokio::test]
    async fn test_bad_length_rejected_without_network() {
        let h = harness(FakeVerifier::accepting(), FakeLookup::replying("1"));

        let err = h.service.handle(request("12345", "tok"), None).await.unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "Wrong IID. Must be 63 digits.");
        assert_eq!(h.verifier.call_count(), 0);
        assert!(h.lookup.calls().is_empty());
        assert_eq!(h.cache.get_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_token_rejected_without_network() {
        let h = harness(FakeVerifier::accepting(), FakeLookup::replying("1"));

        let err = h.service.handle(request(IID, "   "), None).await.unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "Please complete the captcha.");
        assert_eq!(h.verifier.call_count(), 0);
        assert!(h.lookup.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_secrets() {
        let verifier = Arc::new(FakeVerifier::accepting());
        let lookup = Arc::new(FakeLookup::replying("1"));

        let no_secret = CidService::new(
            RelaySettings {
                turnstile_secret: None,
                ..settings()
            },
            verifier.clone(),
            lookup.clone(),
            None,
        );
        let err = no_secret.handle(request(IID, "tok"), None).await.unwrap_err();
        assert_eq!(err.status_code(), 500);

        let no_token = CidService::new(
            RelaySettings {
                getcid_token: None,
                ..settings()
            },
            verifier.clone(),
            lookup.clone(),
            None,
        );
        let err = no_token.handle(request(IID, "tok"), None).await.unwrap_err();
        assert_eq!(err.status_code(), 503);

        assert_eq!(verifier.call_count(), 0);
        assert!(lookup.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_captcha_and_lookup() {
        let h = harness(FakeVerifier::accepting(), FakeLookup::replying("999"));
        h.cache.seed(IID, "424242");

        let res = h.service.handle(request(IID, "tok"), None).await.unwrap();

        assert_eq!(
            res,
            CidResponse {
                cid: "424242".to_string(),
                cached: true
            }
        );
        assert_eq!(h.verifier.call_count(), 0);
        assert!(h.lookup.calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_numeric_cache_entry_is_ignored() {
        let h = harness(FakeVerifier::accepting(), FakeLookup::replying("555"));
        h.cache.seed(IID, "garbage");

        let res = h.service.handle(request(IID, "tok"), None).await.unwrap();

        assert_eq!(res.cid, "555");
        assert!(!res.cached);
    }

    #[tokio::test]
    async fn test_cache_failures_do_not_fail_request() {
        let verifier = Arc::new(FakeVerifier::accepting());
        let lookup = Arc::new(FakeLookup::replying("777"));
        let cache = Arc::new(FakeCache::failing());
        let service = CidService::new(settings(), verifier, lookup.clone(), Some(cache));

        let res = service.handle(request(IID, "tok"), None).await.unwrap();

        assert_eq!(res.cid, "777");
        assert_eq!(lookup.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_works_without_cache() {
        let lookup = Arc::new(FakeLookup::replying("777"));
        let service = CidService::new(
            settings(),
            Arc::new(FakeVerifier::accepting()),
            lookup.clone(),
            None,
        );

        let first = service.handle(request(IID, "tok"), None).await.unwrap();
        let second = service.handle(request(IID, "tok"), None).await.unwrap();

        assert!(!first.cached && !second.cached);
        assert_eq!(lookup.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_captcha_rejection_skips_lookup() {
        let h = harness(FakeVerifier::rejecting(), FakeLookup::replying("123"));

        let err = h
            .service
            .handle(request(IID, "tok"), Some("203.0.113.5".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 403);
        assert!(h.lookup.calls().is_empty());
        assert!(h.cache.puts().is_empty());
    }

    #[tokio::test]
    async fn test_verifier_receives_documented_fields() {
        let h = harness(FakeVerifier::accepting(), FakeLookup::replying("123"));

        h.service
            .handle(request(IID, " tok "), Some("203.0.113.5".to_string()))
            .await
            .unwrap();

        let seen = h.verifier.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0],
            SiteVerifyRequest {
                secret: "turnstile-secret".to_string(),
                response: "tok".to_string(),
                remoteip: Some("203.0.113.5".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_remoteip_omitted_when_unknown() {
        let h = harness(FakeVerifier::accepting(), FakeLookup::replying("123"));

        h.service.handle(request(IID, "tok"), None).await.unwrap();

        assert_eq!(h.verifier.requests()[0].remoteip, None);
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_original_text() {
        let h = harness(FakeVerifier::accepting(), FakeLookup::replying("Wrong IID supplied\n"));

        let err = h.service.handle(request(IID, "tok"), None).await.unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "Wrong IID supplied");
        assert!(matches!(
            err,
            RelayError::Upstream {
                kind: UpstreamErrorKind::Identifier,
                ..
            }
        ));
        assert!(h.cache.puts().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_unknown_upstream_replies() {
        let h = harness(FakeVerifier::accepting(), FakeLookup::replying("   "));
        let err = h.service.handle(request(IID, "tok"), None).await.unwrap_err();
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.public_message(), "Empty response from getcid.");

        let h = harness(
            FakeVerifier::accepting(),
            FakeLookup::replying("unexpected failure xyz"),
        );
        let err = h.service.handle(request(IID, "tok"), None).await.unwrap_err();
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.public_message(), "unexpected failure xyz");
        assert!(h.cache.puts().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_generic() {
        let h = harness(FakeVerifier::accepting(), FakeLookup::failing());

        let err = h.service.handle(request(IID, "tok"), None).await.unwrap_err();

        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Server error");
    }

    #[tokio::test]
    async fn test_repeat_request_served_from_cache() {
        let h = harness(FakeVerifier::accepting(), FakeLookup::replying("123456789"));

        let first = h.service.handle(request(IID, "tok"), None).await.unwrap();
        let second = h.service.handle(request(IID, "tok"), None).await.unwrap();

        assert_eq!(
            first,
            CidResponse {
                cid: "123456789".to_string(),
                cached: false
            }
        );
        assert_eq!(
            second,
            CidResponse {
                cid: "123456789".to_string(),
                cached: true
            }
        );
        assert_eq!(h.lookup.calls().len(), 1);
        assert_eq!(h.verifier.call_count(), 1);
    }
}
