//! Signature algorithm and verification for BraidPay webhooks.
//!
//! The provider signs every webhook with HMAC-SHA256 keyed by the shared
//! webhook secret.  Only the destination address and the amount are covered:
//!
//! ```text
//! X-Webhook-Signature: hex(HMAC-SHA256(secret, "{toAddress}{amount}"))
//! ```
//!
//! The amount is rendered the way the provider's JavaScript turns a number
//! into a string: trailing fractional zeros dropped (`10.00` signs as `"10"`),
//! and exponent notation below `1e-6` or from `1e21` up (`0.0000001` signs as
//! `"1e-7"`).  Amounts only ever arrive as JSON numbers, see
//! [`WebhookPayload`](crate::objects::WebhookPayload).  Every other payload
//! field is unsigned metadata.
//!
//! When the provider also sends `X-Webhook-Timestamp` (unix seconds), the
//! timestamp is checked against a tolerance window before the HMAC.

use rust_decimal::Decimal;

/// Header name carrying the hex HMAC signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Optional header carrying the unix timestamp the notification was sent at.
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

/// Default replay window for timestamped notifications (in seconds).
pub const DEFAULT_TIMESTAMP_TOLERANCE: i64 = 15 * 60;

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("signature timestamp outside tolerance window")]
    Expired,
    #[error("invalid timestamp header")]
    InvalidTimestamp,
}

/// Build the signed message for a notification: `{to_address}{amount}`.
pub fn signing_message(to_address: &str, amount: Decimal) -> String {
    format!("{to_address}{}", render_amount(amount))
}

/// Render `amount` as JavaScript's `String(number)` would.
pub fn render_amount(amount: Decimal) -> String {
    let amount = amount.normalize();
    if amount.is_zero() {
        return "0".to_string();
    }
    let digits = amount.mantissa().unsigned_abs().to_string();
    let exponent = digits.len() as i64 - 1 - i64::from(amount.scale());
    if (-6..21).contains(&exponent) {
        return amount.to_string();
    }

    let sign = if amount.is_sign_negative() { "-" } else { "" };
    let (lead, rest) = digits.split_at(1);
    let rest = rest.trim_end_matches('0');
    let fraction = if rest.is_empty() {
        String::new()
    } else {
        format!(".{rest}")
    };
    let exponent_sign = if exponent > 0 { "+" } else { "" };
    format!("{sign}{lead}{fraction}e{exponent_sign}{exponent}")
}

/// Compute the lowercase hex signature the provider sends for the given
/// destination address and amount.
pub fn sign(secret: &[u8], to_address: &str, amount: Decimal) -> String {
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
    let tag = ring::hmac::sign(&key, signing_message(to_address, amount).as_bytes());
    hex::encode(tag.as_ref())
}

/// Verify a webhook signature.
///
/// Returns `false` for any mismatch.  This never errors: an unusable
/// signature (wrong length, non-ASCII) is logged and rejected.
pub fn verify_signature(secret: &[u8], to_address: &str, amount: Decimal, signature: &str) -> bool {
    if !signature.is_ascii() {
        tracing::warn!("Webhook signature contains non-ASCII characters");
        return false;
    }
    let expected = sign(secret, to_address, amount);
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

/// Verify a webhook signature that may carry a send timestamp.
///
/// When `timestamp` is present and differs from `now` by more than
/// `tolerance` seconds (in either direction) the notification is rejected
/// before the HMAC is computed.
pub fn verify_signature_at(
    secret: &[u8],
    to_address: &str,
    amount: Decimal,
    signature: &str,
    timestamp: Option<i64>,
    tolerance: i64,
    now: i64,
) -> bool {
    if let Some(timestamp) = timestamp {
        if check_timestamp(timestamp, tolerance, now).is_err() {
            tracing::warn!(timestamp, now, tolerance, "Webhook timestamp outside tolerance");
            return false;
        }
    }
    verify_signature(secret, to_address, amount, signature)
}

/// Check that `timestamp` lies within `tolerance` seconds of `now`.
pub fn check_timestamp(timestamp: i64, tolerance: i64, now: i64) -> Result<(), SignatureError> {
    if now.abs_diff(timestamp) > tolerance.unsigned_abs() {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

/// Parse an `X-Webhook-Timestamp` header value.
pub fn parse_timestamp_header(value: &str) -> Result<i64, SignatureError> {
    value
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Length-checked equality that inspects every byte regardless of where the
/// first difference is.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::distr::Alphanumeric;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn random_string(rng: &mut impl Rng, len: usize) -> String {
        rng.sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    #[test]
    fn test_known_vector() {
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, b"s3cr3t");
        let expected = hex::encode(ring::hmac::sign(&key, b"0xABC10").as_ref());

        assert_eq!(sign(b"s3cr3t", "0xABC", dec("10")), expected);
        assert!(verify_signature(b"s3cr3t", "0xABC", dec("10"), &expected));
    }

    #[test]
    fn test_amount_is_normalized() {
        assert_eq!(signing_message("0xABC", dec("10")), "0xABC10");
        assert_eq!(signing_message("0xABC", dec("10.00")), "0xABC10");
        assert_eq!(signing_message("0xABC", dec("10.50")), "0xABC10.5");
        assert_eq!(signing_message("0xABC", dec("0.000001")), "0xABC0.000001");
    }

    #[test]
    fn test_amount_renders_like_javascript_numbers() {
        assert_eq!(render_amount(dec("0")), "0");
        assert_eq!(render_amount(dec("0.00")), "0");
        assert_eq!(render_amount(dec("0.1")), "0.1");
        assert_eq!(render_amount(dec("123.456")), "123.456");
        assert_eq!(render_amount(dec("-2.50")), "-2.5");
        assert_eq!(render_amount(dec("0.0000001")), "1e-7");
        assert_eq!(render_amount(dec("0.00000015")), "1.5e-7");
        assert_eq!(render_amount(dec("-0.0000001")), "-1e-7");
        assert_eq!(render_amount(dec("100000000000000000000")), "100000000000000000000");
        assert_eq!(render_amount(dec("1000000000000000000000")), "1e+21");
        assert_eq!(render_amount(dec("1250000000000000000000")), "1.25e+21");
        assert_eq!(signing_message("0xABC", dec("0.0000001")), "0xABC1e-7");
    }

    #[test]
    fn test_sign_then_verify_random_inputs() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let secret_len = rng.random_range(1..64);
            let secret = random_string(&mut rng, secret_len);
            let address = format!("0x{}", random_string(&mut rng, 40));
            let amount = Decimal::new(rng.random_range(0..10_000_000_000i64), rng.random_range(0..8));
            let signature = sign(secret.as_bytes(), &address, amount);
            assert!(
                verify_signature(secret.as_bytes(), &address, amount, &signature),
                "secret={secret} address={address} amount={amount}"
            );
        }
    }

    #[test]
    fn test_every_single_bit_flip_is_rejected() {
        let signature = sign(b"s3cr3t", "0xABC", dec("10"));
        let bytes = signature.as_bytes();
        for index in 0..bytes.len() {
            for bit in 0..8 {
                let mut mutated = bytes.to_vec();
                mutated[index] ^= 1 << bit;
                let mutated = String::from_utf8_lossy(&mutated).into_owned();
                assert!(
                    !verify_signature(b"s3cr3t", "0xABC", dec("10"), &mutated),
                    "flip of bit {bit} at byte {index} was accepted"
                );
            }
        }
    }

    #[test]
    fn test_uppercase_and_truncated_signatures_are_rejected() {
        let signature = sign(b"s3cr3t", "0xABC", dec("10"));
        assert!(!verify_signature(b"s3cr3t", "0xABC", dec("10"), &signature.to_uppercase()));
        assert!(!verify_signature(b"s3cr3t", "0xABC", dec("10"), &signature[..63]));
        assert!(!verify_signature(b"s3cr3t", "0xABC", dec("10"), ""));
    }

    #[test]
    fn test_wrong_secret_address_or_amount() {
        let signature = sign(b"s3cr3t", "0xABC", dec("10"));
        assert!(!verify_signature(b"other", "0xABC", dec("10"), &signature));
        assert!(!verify_signature(b"s3cr3t", "0xABD", dec("10"), &signature));
        assert!(!verify_signature(b"s3cr3t", "0xABC", dec("10.01"), &signature));
    }

    #[test]
    fn test_colon_separated_format_is_not_accepted() {
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, b"s3cr3t");
        let colon = hex::encode(ring::hmac::sign(&key, b"0xABC:10").as_ref());
        assert!(!verify_signature(b"s3cr3t", "0xABC", dec("10"), &colon));
    }

    #[test]
    fn test_timestamp_window() {
        let signature = sign(b"s3cr3t", "0xABC", dec("10"));
        let now = 1_700_000_000;
        let tol = DEFAULT_TIMESTAMP_TOLERANCE;

        assert!(verify_signature_at(b"s3cr3t", "0xABC", dec("10"), &signature, None, tol, now));
        assert!(verify_signature_at(b"s3cr3t", "0xABC", dec("10"), &signature, Some(now - tol), tol, now));
        assert!(verify_signature_at(b"s3cr3t", "0xABC", dec("10"), &signature, Some(now + tol), tol, now));
        assert!(!verify_signature_at(b"s3cr3t", "0xABC", dec("10"), &signature, Some(now - tol - 1), tol, now));
        assert!(!verify_signature_at(b"s3cr3t", "0xABC", dec("10"), &signature, Some(now + tol + 1), tol, now));
    }

    #[test]
    fn test_parse_timestamp_header() {
        assert_eq!(parse_timestamp_header(" 1700000000 ").unwrap(), 1_700_000_000);
        assert!(matches!(
            parse_timestamp_header("yesterday"),
            Err(SignatureError::InvalidTimestamp)
        ));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
