//! Recording fakes for the outbound collaborators.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use keystone_common::{IdentifierPolicy, RelayError};

use crate::captcha::{CaptchaVerifier, SiteVerifyRequest, SiteVerifyResponse};
use crate::lookup::LookupApi;
use crate::service::RelaySettings;
use crate::store::CidCache;

pub fn settings() -> RelaySettings {
    RelaySettings {
        turnstile_secret: Some("turnstile-secret".to_string()),
        getcid_token: Some("getcid-token".to_string()),
        identifier_policy: IdentifierPolicy::default(),
        ..Default::default()
    }
}

pub struct FakeVerifier {
    success: bool,
    seen: Mutex<Vec<SiteVerifyRequest>>,
}

impl FakeVerifier {
    pub fn accepting() -> Self {
        Self {
            success: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            success: false,
            ..Self::accepting()
        }
    }

    pub fn requests(&self) -> Vec<SiteVerifyRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl CaptchaVerifier for FakeVerifier {
    async fn verify(&self, request: &SiteVerifyRequest) -> Result<SiteVerifyResponse, RelayError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(SiteVerifyResponse {
            success: self.success,
            error_codes: Vec::new(),
        })
    }
}

pub struct FakeLookup {
    reply: Option<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeLookup {
    pub fn replying(body: &str) -> Self {
        Self {
            reply: Some(body.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails at the transport level
    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LookupApi for FakeLookup {
    async fn fetch(&self, iid: &str, token: &str) -> Result<String, RelayError> {
        self.calls
            .lock()
            .unwrap()
            .push((iid.to_string(), token.to_string()));
        self.reply
            .clone()
            .ok_or_else(|| RelayError::Internal("connection reset".to_string()))
    }
}

#[derive(Default)]
pub struct FakeCache {
    failing: bool,
    entries: Mutex<HashMap<String, String>>,
    gets: Mutex<usize>,
    puts: Mutex<Vec<(String, String, u64)>>,
}

impl FakeCache {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn get_count(&self) -> usize {
        *self.gets.lock().unwrap()
    }

    pub fn puts(&self) -> Vec<(String, String, u64)> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CidCache for FakeCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        *self.gets.lock().unwrap() += 1;
        if self.failing {
            return Err(anyhow!("cache unavailable"));
        }
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        if self.failing {
            return Err(anyhow!("cache unavailable"));
        }
        self.puts
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string(), ttl_secs));
        self.seed(key, value);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        if self.failing {
            Err(anyhow!("cache unavailable"))
        } else {
            Ok(())
        }
    }
}
