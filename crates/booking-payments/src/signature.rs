//! Webhook signature verification.
//!
//! Every scheme is an HMAC-SHA256 over the raw request bytes exactly as they
//! arrived. Never verify against re-serialized JSON: key order and whitespace
//! change, and alternate serializations of one object would all verify.
//!
//! Comparison goes through [`Mac::verify_slice`], which is constant time.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Stripe's default replay window
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Header carrying a Stripe signature
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Header carrying a Square signature
pub const SQUARE_SIGNATURE_HEADER: &str = "x-square-hmacsha256-signature";

/// How the provider signs its webhooks
#[derive(Clone)]
pub enum SignatureScheme {
    /// `t=<unix>,v1=<hex>` over `"<t>.<body>"`
    Stripe { secret: String, tolerance_secs: i64 },

    /// base64 over `notification_url + body`
    Square {
        signature_key: String,
        notification_url: String,
    },

    /// Accept everything. Compiled in only with the `unverified-webhooks`
    /// feature.
    #[cfg(feature = "unverified-webhooks")]
    Unverified,
}

impl SignatureScheme {
    pub fn stripe(secret: impl Into<String>) -> Self {
        Self::Stripe {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn square(signature_key: impl Into<String>, notification_url: impl Into<String>) -> Self {
        Self::Square {
            signature_key: signature_key.into(),
            notification_url: notification_url.into(),
        }
    }
}

impl std::fmt::Debug for SignatureScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stripe { tolerance_secs, .. } => f
                .debug_struct("Stripe")
                .field("tolerance_secs", tolerance_secs)
                .finish_non_exhaustive(),
            Self::Square { notification_url, .. } => f
                .debug_struct("Square")
                .field("notification_url", notification_url)
                .finish_non_exhaustive(),
            #[cfg(feature = "unverified-webhooks")]
            Self::Unverified => f.write_str("Unverified"),
        }
    }
}

/// Verifies that a webhook really comes from the payment provider
#[derive(Clone, Debug)]
pub struct WebhookAuthenticator {
    scheme: SignatureScheme,
}

fn new_mac(secret: &str) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::Config("invalid webhook secret".into()))
}

/// Parse `t=...,v1=...[,v1=...]`
fn parse_stripe_header(header: &str) -> Result<(i64, Vec<&str>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    match timestamp {
        Some(t) if !signatures.is_empty() => Ok((t, signatures)),
        _ => Err(PaymentError::Authentication("malformed signature header".into())),
    }
}

impl WebhookAuthenticator {
    /// Build an authenticator, refusing empty secrets
    pub fn new(scheme: SignatureScheme) -> Result<Self> {
        let secret = match &scheme {
            SignatureScheme::Stripe { secret, .. } => Some(secret),
            SignatureScheme::Square { signature_key, .. } => Some(signature_key),
            #[cfg(feature = "unverified-webhooks")]
            SignatureScheme::Unverified => None,
        };
        if secret.is_some_and(|s| s.trim().is_empty()) {
            return Err(PaymentError::Config("webhook secret is empty".into()));
        }

        #[cfg(feature = "unverified-webhooks")]
        if matches!(scheme, SignatureScheme::Unverified) {
            tracing::warn!("Webhook signature verification is DISABLED (unverified-webhooks build)");
        }

        Ok(Self { scheme })
    }

    /// Request header the provider puts its signature in
    pub const fn header_name(&self) -> &'static str {
        match &self.scheme {
            SignatureScheme::Stripe { .. } => STRIPE_SIGNATURE_HEADER,
            SignatureScheme::Square { .. } => SQUARE_SIGNATURE_HEADER,
            #[cfg(feature = "unverified-webhooks")]
            SignatureScheme::Unverified => STRIPE_SIGNATURE_HEADER,
        }
    }

    /// Verify `signature` over the raw `body`
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        self.verify_at(body, signature, chrono::Utc::now().timestamp())
    }

    /// [`verify`](Self::verify) with an explicit clock
    pub fn verify_at(&self, body: &[u8], signature: Option<&str>, now: i64) -> Result<()> {
        #[cfg(feature = "unverified-webhooks")]
        if matches!(self.scheme, SignatureScheme::Unverified) {
            return Ok(());
        }

        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PaymentError::Authentication("missing signature header".into()))?;

        match &self.scheme {
            SignatureScheme::Stripe {
                secret,
                tolerance_secs,
            } => {
                let (timestamp, candidates) = parse_stripe_header(signature)?;
                if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
                    return Err(PaymentError::Authentication(
                        "timestamp outside tolerance window".into(),
                    ));
                }

                let mut mac = new_mac(secret)?;
                mac.update(timestamp.to_string().as_bytes());
                mac.update(b".");
                mac.update(body);

                let matched = candidates.iter().any(|candidate| {
                    hex::decode(candidate)
                        .is_ok_and(|expected| mac.clone().verify_slice(&expected).is_ok())
                });
                if matched {
                    Ok(())
                } else {
                    Err(PaymentError::Authentication("signature mismatch".into()))
                }
            }

            SignatureScheme::Square {
                signature_key,
                notification_url,
            } => {
                let expected = BASE64
                    .decode(signature)
                    .map_err(|_| PaymentError::Authentication("signature is not base64".into()))?;

                let mut mac = new_mac(signature_key)?;
                mac.update(notification_url.as_bytes());
                mac.update(body);
                mac.verify_slice(&expected)
                    .map_err(|_| PaymentError::Authentication("signature mismatch".into()))
            }

            #[cfg(feature = "unverified-webhooks")]
            SignatureScheme::Unverified => Ok(()),
        }
    }

    /// Produce the header value the provider would send for `body`.
    ///
    /// For replaying captured webhooks against a local server.
    pub fn sign(&self, body: &[u8], timestamp: i64) -> Result<String> {
        match &self.scheme {
            SignatureScheme::Stripe { secret, .. } => {
                let mut mac = new_mac(secret)?;
                mac.update(timestamp.to_string().as_bytes());
                mac.update(b".");
                mac.update(body);
                Ok(format!(
                    "t={timestamp},v1={}",
                    hex::encode(mac.finalize().into_bytes())
                ))
            }
            SignatureScheme::Square {
                signature_key,
                notification_url,
            } => {
                let mut mac = new_mac(signature_key)?;
                mac.update(notification_url.as_bytes());
                mac.update(body);
                Ok(BASE64.encode(mac.finalize().into_bytes()))
            }
            #[cfg(feature = "unverified-webhooks")]
            SignatureScheme::Unverified => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"type":"checkout.session.completed","data":{"object":{"id":"S1"}}}"#;
    const NOW: i64 = 1_717_250_000;

    fn stripe() -> WebhookAuthenticator {
        WebhookAuthenticator::new(SignatureScheme::stripe("whsec_test123secret456")).unwrap()
    }

    fn square() -> WebhookAuthenticator {
        WebhookAuthenticator::new(SignatureScheme::square(
            "sq-signature-key",
            "https://rides.example/api/payment-confirmation",
        ))
        .unwrap()
    }

    #[test]
    fn test_stripe_valid_signature() {
        let auth = stripe();
        let header = auth.sign(BODY, NOW).unwrap();
        assert!(auth.verify_at(BODY, Some(&header), NOW + 10).is_ok());
    }

    #[test]
    fn test_stripe_signature_from_other_secret() {
        let other = WebhookAuthenticator::new(SignatureScheme::stripe("wrong_secret")).unwrap();
        let header = other.sign(BODY, NOW).unwrap();

        let err = stripe().verify_at(BODY, Some(&header), NOW).unwrap_err();
        assert!(matches!(err, PaymentError::Authentication(_)));
    }

    #[test]
    fn test_stripe_tampered_body() {
        let auth = stripe();
        let header = auth.sign(BODY, NOW).unwrap();
        let tampered = br#"{"type":"checkout.session.completed","data":{"object":{"id":"S2"}}}"#;

        assert!(auth.verify_at(tampered, Some(&header), NOW).is_err());
    }

    #[test]
    fn test_stripe_reserialized_body_is_rejected() {
        let auth = stripe();
        let raw = br#"{"type": "payment.created",  "data": {}}"#;
        let header = auth.sign(raw, NOW).unwrap();

        let value: serde_json::Value = serde_json::from_slice(raw).unwrap();
        let reserialized = serde_json::to_vec(&value).unwrap();

        assert!(auth.verify_at(raw, Some(&header), NOW).is_ok());
        assert!(auth.verify_at(&reserialized, Some(&header), NOW).is_err());
    }

    #[test]
    fn test_stripe_expired_timestamp() {
        let auth = stripe();
        let header = auth.sign(BODY, NOW).unwrap();

        let err = auth
            .verify_at(BODY, Some(&header), NOW + DEFAULT_TOLERANCE_SECS + 1)
            .unwrap_err();
        assert!(matches!(err, PaymentError::Authentication(msg) if msg.contains("tolerance")));
    }

    #[test]
    fn test_stripe_accepts_any_matching_v1() {
        let auth = stripe();
        let good = auth.sign(BODY, NOW).unwrap();
        let v1 = good.split_once("v1=").unwrap().1;
        let header = format!("t={NOW},v1=deadbeef,v1={v1}");

        assert!(auth.verify_at(BODY, Some(&header), NOW).is_ok());
    }

    #[test]
    fn test_stripe_malformed_header() {
        let auth = stripe();
        for header in ["invalid", "t=abc,v1=00", "t=1717250000", "v1=00"] {
            assert!(auth.verify_at(BODY, Some(header), NOW).is_err(), "{header}");
        }
    }

    #[test]
    fn test_stripe_extreme_timestamps_are_rejected() {
        let auth = stripe();
        for header in [
            "t=-9223372036854775808,v1=00",
            "t=9223372036854775807,v1=00",
        ] {
            assert!(
                matches!(
                    auth.verify_at(BODY, Some(header), NOW),
                    Err(PaymentError::Authentication(_))
                ),
                "{header}"
            );
        }
        assert!(matches!(
            auth.verify_at(BODY, Some("t=0,v1=00"), i64::MIN),
            Err(PaymentError::Authentication(_))
        ));
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            stripe().verify_at(BODY, None, NOW),
            Err(PaymentError::Authentication(_))
        ));
        assert!(matches!(
            square().verify_at(BODY, Some("  "), NOW),
            Err(PaymentError::Authentication(_))
        ));
    }

    #[test]
    fn test_square_round_trip() {
        let auth = square();
        let header = auth.sign(BODY, 0).unwrap();

        assert!(auth.verify_at(BODY, Some(&header), NOW).is_ok());
        assert!(auth.verify_at(b"{}", Some(&header), NOW).is_err());
        assert!(auth.verify_at(BODY, Some("not base64!"), NOW).is_err());
    }

    #[test]
    fn test_square_signature_binds_notification_url() {
        let elsewhere = WebhookAuthenticator::new(SignatureScheme::square(
            "sq-signature-key",
            "https://attacker.example/hook",
        ))
        .unwrap();
        let header = elsewhere.sign(BODY, 0).unwrap();

        assert!(square().verify_at(BODY, Some(&header), NOW).is_err());
    }

    #[test]
    fn test_empty_secret_is_config_error() {
        assert!(matches!(
            WebhookAuthenticator::new(SignatureScheme::stripe("")),
            Err(PaymentError::Config(_))
        ));
    }

    #[test]
    fn test_header_names() {
        assert_eq!(stripe().header_name(), "stripe-signature");
        assert_eq!(square().header_name(), "x-square-hmacsha256-signature");
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", stripe());
        assert!(!rendered.contains("whsec_test123secret456"));
    }
}
