use chrono::{DateTime, Utc};
use fomo_core::InterfaceError;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

const SIGNATURE_VERSION: &str = "v0";
const MAX_REQUEST_AGE_SECS: u64 = 60 * 5;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("request timestamp is not a unix timestamp")]
    InvalidTimestamp,
    #[error("request timestamp is outside the accepted window")]
    Expired,
    #[error("request signature does not match")]
    Mismatch,
}

impl SignatureError {
    pub fn to_interface_error(&self) -> InterfaceError {
        InterfaceError::unauthorized(self.to_string())
    }
}

/// Verifies Slack's `v0` request signatures.
///
/// The signed payload is `v0:<timestamp>:<raw body>`; the header carries
/// `v0=<hex hmac-sha256>`. Requests whose timestamp is more than five minutes
/// away from the local clock are refused to limit replays.
pub struct SignatureVerifier {
    signing_secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(signing_secret: SecretString) -> Self {
        Self { signing_secret }
    }

    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        self.verify_at(timestamp, signature, body, Utc::now())
    }

    pub fn verify_at(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?.trim();
        let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?.trim();

        let issued_at: i64 = timestamp.parse().map_err(|_| SignatureError::InvalidTimestamp)?;
        if now.timestamp().abs_diff(issued_at) > MAX_REQUEST_AGE_SECS {
            return Err(SignatureError::Expired);
        }

        let expected = signature
            .strip_prefix("v0=")
            .and_then(|hex_sig| hex::decode(hex_sig).ok())
            .ok_or(SignatureError::Mismatch)?;

        let mut mac = HmacSha256::new_from_slice(self.signing_secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use hmac::Mac;
    use secrecy::SecretString;

    use super::{HmacSha256, SignatureError, SignatureVerifier};

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const TIMESTAMP: i64 = 1_531_420_618;

    fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac");
        mac.update(format!("v0:{timestamp}:").as_bytes());
        mac.update(body);
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SecretString::from(SECRET.to_owned()))
    }

    fn at(seconds: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).single().expect("timestamp")
    }

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"type":"url_verification","challenge":"C123"}"#;
        let signature = sign(SECRET, &TIMESTAMP.to_string(), body);

        verifier()
            .verify_at(Some(&TIMESTAMP.to_string()), Some(&signature), body, at(TIMESTAMP + 30))
            .expect("valid signature");
    }

    #[test]
    fn rejects_tampered_body() {
        let signature = sign(SECRET, &TIMESTAMP.to_string(), b"original");

        let error = verifier()
            .verify_at(Some(&TIMESTAMP.to_string()), Some(&signature), b"tampered", at(TIMESTAMP))
            .expect_err("tampered");

        assert_eq!(error, SignatureError::Mismatch);
    }

    #[test]
    fn rejects_wrong_secret() {
        let signature = sign("another-secret", &TIMESTAMP.to_string(), b"body");

        let error = verifier()
            .verify_at(Some(&TIMESTAMP.to_string()), Some(&signature), b"body", at(TIMESTAMP))
            .expect_err("wrong secret");

        assert_eq!(error, SignatureError::Mismatch);
    }

    #[test]
    fn rejects_stale_requests() {
        let signature = sign(SECRET, &TIMESTAMP.to_string(), b"body");

        let error = verifier()
            .verify_at(
                Some(&TIMESTAMP.to_string()),
                Some(&signature),
                b"body",
                at(TIMESTAMP + 60 * 5 + 1),
            )
            .expect_err("stale");

        assert_eq!(error, SignatureError::Expired);
    }

    #[test]
    fn rejects_missing_headers_and_bad_encoding() {
        let verifier = verifier();
        let now = at(TIMESTAMP);

        assert_eq!(
            verifier.verify_at(None, Some("v0=00"), b"", now),
            Err(SignatureError::MissingHeader("x-slack-request-timestamp"))
        );
        assert_eq!(
            verifier.verify_at(Some("1531420618"), None, b"", now),
            Err(SignatureError::MissingHeader("x-slack-signature"))
        );
        assert_eq!(
            verifier.verify_at(Some("yesterday"), Some("v0=00"), b"", now),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            verifier.verify_at(Some("1531420618"), Some("v0=not-hex"), b"", now),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verifier.verify_at(Some("1531420618"), Some("sha256=00"), b"", now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn failures_map_to_unauthorized() {
        assert_eq!(SignatureError::Mismatch.to_interface_error().status_code(), 401);
    }
}
