use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the request-body signature.
pub const SIGNATURE_HEADER: &str = "HashSHA256";

type HmacSha256 = Hmac<Sha256>;

/// Lowercase-hex HMAC-SHA256 of `body` under `key`.
///
/// The signature covers the bytes actually sent on the wire, so callers
/// must sign after compression.
pub fn signature(key: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `provided` against the signature of `body`; exact string equality.
pub fn verify(key: &str, body: &[u8], provided: &str) -> bool {
    signature(key, body) == provided
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_lowercase_hex() {
        let sig = signature("secret", b"payload");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn verify_accepts_matching_signature() {
        let body = b"[{\"id\":\"c\",\"type\":\"counter\",\"delta\":5}]";
        let sig = signature("secret", body);
        assert!(verify("secret", body, &sig));
    }

    #[test]
    fn single_byte_mutation_flips_verification() {
        let body = b"payload".to_vec();
        let sig = signature("secret", &body);
        let mut tampered = body.clone();
        tampered[0] ^= 0x01;
        assert!(!verify("secret", &tampered, &sig));
    }

    #[test]
    fn different_key_fails() {
        let sig = signature("secret", b"payload");
        assert!(!verify("other", b"payload", &sig));
    }
}
