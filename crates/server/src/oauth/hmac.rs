//! HMAC verification for OAuth callbacks and compliance webhooks.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify the HMAC signature on an OAuth callback's query string.
///
/// The message is every query parameter except `hmac` and `signature`,
/// sorted alphabetically by key and joined as `key=value` pairs with `&`.
/// The expected digest is hex-encoded.
#[must_use]
pub fn verify_callback_hmac(
    params: &[(String, String)],
    provided_hmac: &str,
    client_secret: &str,
) -> bool {
    let mut pairs: Vec<&(String, String)> = params
        .iter()
        .filter(|(key, _)| key != "hmac" && key != "signature")
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let message = pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let Ok(mut mac) = HmacSha256::new_from_slice(client_secret.as_bytes()) else {
        return false;
    };
    mac.update(message.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    // Both sides are fixed-length hex digests of the same width, so this
    // comparison does not leak length information.
    constant_time_eq(computed.as_bytes(), provided_hmac.as_bytes())
}

/// Verify the base64 HMAC header on a webhook body.
///
/// Compliance webhooks sign the raw request body with HMAC-SHA256 and carry
/// the digest base64-encoded in a header.
#[must_use]
pub fn verify_webhook_hmac(body: &[u8], provided_hmac: &str, client_secret: &str) -> bool {
    let Ok(provided) = BASE64.decode(provided_hmac) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(client_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    constant_time_eq(&mac.finalize().into_bytes(), &provided)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "hush";

    fn sign_query(params: &[(String, String)]) -> String {
        let mut pairs: Vec<_> = params
            .iter()
            .filter(|(key, _)| key != "hmac" && key != "signature")
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let message = pairs
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn params() -> Vec<(String, String)> {
        vec![
            ("shop".to_string(), "demo.myshopify.com".to_string()),
            ("code".to_string(), "abc123".to_string()),
            ("timestamp".to_string(), "1700000000".to_string()),
            ("state".to_string(), "xyz".to_string()),
        ]
    }

    #[test]
    fn test_callback_hmac_accepts_valid_signature() {
        let params = params();
        let digest = sign_query(&params);
        assert!(verify_callback_hmac(&params, &digest, SECRET));
    }

    #[test]
    fn test_callback_hmac_rejects_tampered_params() {
        let mut params = params();
        let digest = sign_query(&params);
        params[0].1 = "evil.myshopify.com".to_string();
        assert!(!verify_callback_hmac(&params, &digest, SECRET));
    }

    #[test]
    fn test_callback_hmac_ignores_hmac_and_signature_keys() {
        let mut params = params();
        let digest = sign_query(&params);
        params.push(("hmac".to_string(), digest.clone()));
        params.push(("signature".to_string(), "legacy".to_string()));
        assert!(verify_callback_hmac(&params, &digest, SECRET));
    }

    #[test]
    fn test_webhook_hmac_roundtrip() {
        let body = br#"{"shop_id":42}"#;
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        let header = BASE64.encode(mac.finalize().into_bytes());

        assert!(verify_webhook_hmac(body, &header, SECRET));
        assert!(!verify_webhook_hmac(b"{}", &header, SECRET));
        assert!(!verify_webhook_hmac(body, "not-base64!!!", SECRET));
    }
}
