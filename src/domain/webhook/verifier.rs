//! Provider webhook signature verification.
//!
//! HMAC-SHA256 over `"{t}.{raw body}"`, with a tolerance window on `t` to
//! bound replays.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::{SignatureFailure, WebhookError};
use super::provider_event::ProviderEvent;
use crate::domain::foundation::Timestamp;

/// Default maximum age of a signed event.
pub const DEFAULT_MAX_AGE_SECS: i64 = 300;

/// Default allowance for provider clocks running ahead of ours.
pub const DEFAULT_MAX_FUTURE_SECS: i64 = 60;

/// Parsed components of the signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    /// Every `v1` entry; more than one appears while secrets are rotated.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses `t=<unix>,v1=<hex>[,v1=<hex>...]`. Unknown keys are ignored.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let malformed = || WebhookError::signature(SignatureFailure::MalformedHeader);

        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=').ok_or_else(malformed)?;
            match key {
                "t" => timestamp = Some(value.parse().map_err(|_| malformed())?),
                "v1" => v1_signatures.push(hex::decode(value).map_err(|_| malformed())?),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(malformed)?;
        if v1_signatures.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifies provider webhook signatures.
pub struct WebhookVerifier {
    secret: Secret<String>,
    max_age_secs: i64,
    max_future_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: Secret<String>) -> Self {
        Self {
            secret,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            max_future_secs: DEFAULT_MAX_FUTURE_SECS,
        }
    }

    pub fn with_tolerance(mut self, max_age_secs: i64, max_future_secs: i64) -> Self {
        self.max_age_secs = max_age_secs;
        self.max_future_secs = max_future_secs;
        self
    }

    /// Verifies the signature at time `now` and parses the event.
    ///
    /// # Errors
    ///
    /// - `SignatureInvalid` for a missing or bad header, a timestamp outside
    ///   the tolerance window, or a signature mismatch
    /// - `MalformedPayload` if an authentic body is not a provider event
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
        now: Timestamp,
    ) -> Result<ProviderEvent, WebhookError> {
        let header = signature_header
            .ok_or(WebhookError::signature(SignatureFailure::MissingHeader))?;
        let header = SignatureHeader::parse(header)?;

        self.validate_timestamp(header.timestamp, now)?;

        let expected = self.compute_signature(header.timestamp, payload)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));
        if !matched {
            return Err(WebhookError::signature(SignatureFailure::Mismatch));
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
    }

    /// Builds a header value signing `payload` at `timestamp`.
    ///
    /// Used to replay captured payloads and in tests.
    pub fn signature_header_for(&self, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
        let signature = self.compute_signature(timestamp, payload)?;
        Ok(format!("t={},v1={}", timestamp, hex::encode(signature)))
    }

    fn validate_timestamp(&self, timestamp: i64, now: Timestamp) -> Result<(), WebhookError> {
        // The header is unauthenticated here; `t` may sit anywhere in i64.
        let Some(age) = now.as_unix_secs().checked_sub(timestamp) else {
            let reason = if timestamp < 0 {
                SignatureFailure::TimestampTooOld
            } else {
                SignatureFailure::TimestampInFuture
            };
            return Err(WebhookError::signature(reason));
        };
        if age > self.max_age_secs {
            return Err(WebhookError::signature(SignatureFailure::TimestampTooOld));
        }
        if age < self.max_future_secs.saturating_neg() {
            return Err(WebhookError::signature(SignatureFailure::TimestampInFuture));
        }
        Ok(())
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::signature(SignatureFailure::Mismatch))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
