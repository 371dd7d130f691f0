//! Request Signing
//!
//! HMAC signing and nonce generation shared by every adapter that calls
//! private endpoints. Exchanges differ only in hash, secret encoding,
//! signature encoding, and what goes into the signed message; those are
//! parameters here, not separate implementations.
//!
//! # Example
//!
//! ```rust
//! use crypto_exporter::infrastructure::signing::{
//!     HmacAlgorithm, RequestSigner, SecretEncoding, SignatureEncoding, canonical_message,
//! };
//!
//! assert_eq!(canonical_message("1000", "GET", "/orders", ""), "1000GET/orders");
//!
//! let signer = RequestSigner::new(
//!     "abc",
//!     SecretEncoding::Raw,
//!     HmacAlgorithm::Sha256,
//!     SignatureEncoding::Hex,
//! )
//! .unwrap();
//! let first = signer.sign_request("1000", "GET", "/orders", "");
//! assert_eq!(first, signer.sign_request("1000", "GET", "/orders", ""));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

/// Hash function used inside the HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmacAlgorithm {
    /// HMAC-SHA256.
    Sha256,
    /// HMAC-SHA384.
    Sha384,
    /// HMAC-SHA512.
    Sha512,
}

/// How the configured secret maps to key bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEncoding {
    /// The secret's UTF-8 bytes are the key.
    Raw,
    /// The secret is standard base64.
    Base64,
    /// The secret is hexadecimal.
    Hex,
}

/// How the MAC is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureEncoding {
    /// Standard base64.
    Base64,
    /// Lowercase hexadecimal.
    Hex,
    /// Uppercase hexadecimal.
    HexUpper,
}

/// Signing errors.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The secret could not be decoded with the expected encoding.
    #[error("invalid API secret: {0}")]
    InvalidSecret(String),
}

/// Canonical signing string: `timestamp + method + path + body`.
#[must_use]
pub fn canonical_message(timestamp: &str, method: &str, path: &str, body: &str) -> String {
    let mut message = String::with_capacity(timestamp.len() + method.len() + path.len() + body.len());
    message.push_str(timestamp);
    message.push_str(method);
    message.push_str(path);
    message.push_str(body);
    message
}

/// HMAC request signer.
///
/// Pure: identical inputs always produce identical signatures.
#[derive(Clone)]
pub struct RequestSigner {
    key: Vec<u8>,
    algorithm: HmacAlgorithm,
    output: SignatureEncoding,
}

impl RequestSigner {
    /// Create a signer, decoding the secret.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::InvalidSecret` if the secret is not valid for
    /// its encoding.
    pub fn new(
        secret: &str,
        encoding: SecretEncoding,
        algorithm: HmacAlgorithm,
        output: SignatureEncoding,
    ) -> Result<Self, SigningError> {
        let key = match encoding {
            SecretEncoding::Raw => secret.as_bytes().to_vec(),
            SecretEncoding::Base64 => STANDARD
                .decode(secret.trim())
                .map_err(|e| SigningError::InvalidSecret(format!("base64: {e}")))?,
            SecretEncoding::Hex => hex::decode(secret.trim())
                .map_err(|e| SigningError::InvalidSecret(format!("hex: {e}")))?,
        };

        Ok(Self {
            key,
            algorithm,
            output,
        })
    }

    /// Sign arbitrary bytes.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> String {
        let mac = self.mac(message);
        match self.output {
            SignatureEncoding::Base64 => STANDARD.encode(mac),
            SignatureEncoding::Hex => hex::encode(mac),
            SignatureEncoding::HexUpper => hex::encode_upper(mac),
        }
    }

    /// Sign the canonical `timestamp + method + path + body` string.
    #[must_use]
    pub fn sign_request(&self, timestamp: &str, method: &str, path: &str, body: &str) -> String {
        self.sign(canonical_message(timestamp, method, path, body).as_bytes())
    }

    /// Raw MAC bytes.
    fn mac(&self, message: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length, so construction cannot fail.
        let result = match self.algorithm {
            HmacAlgorithm::Sha256 => Hmac::<Sha256>::new_from_slice(&self.key).map(|mut mac| {
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }),
            HmacAlgorithm::Sha384 => Hmac::<Sha384>::new_from_slice(&self.key).map(|mut mac| {
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }),
            HmacAlgorithm::Sha512 => Hmac::<Sha512>::new_from_slice(&self.key).map(|mut mac| {
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }),
        };
        result.unwrap_or_default()
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field("output", &self.output)
            .finish()
    }
}

/// Compact HS256 JSON Web Token over the given claims.
#[must_use]
pub fn jwt_hs256(claims: &serde_json::Value, secret: &str) -> String {
    const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(HEADER),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );

    let signature = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map(|mut mac| {
            mac.update(signing_input.as_bytes());
            mac.finalize().into_bytes().to_vec()
        })
        .unwrap_or_default();

    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature))
}

// =============================================================================
// Nonces
// =============================================================================

/// Resolution of generated nonces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceUnit {
    /// Unix seconds.
    Seconds,
    /// Unix milliseconds.
    Millis,
}

/// Strictly increasing nonce generator.
///
/// Follows the wall clock, but never hands out the same value twice even
/// when called faster than the clock ticks or when the clock steps back.
#[derive(Debug)]
pub struct NonceSource {
    unit: NonceUnit,
    last: AtomicU64,
}

impl NonceSource {
    /// Create a nonce source.
    #[must_use]
    pub const fn new(unit: NonceUnit) -> Self {
        Self {
            unit,
            last: AtomicU64::new(0),
        }
    }

    /// Next nonce from the current time.
    pub fn next(&self) -> u64 {
        let now = chrono::Utc::now();
        let now = match self.unit {
            NonceUnit::Seconds => now.timestamp(),
            NonceUnit::Millis => now.timestamp_millis(),
        };
        self.next_at(u64::try_from(now).unwrap_or_default())
    }

    /// Next nonce given the current clock reading.
    pub fn next_at(&self, now: u64) -> u64 {
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current.saturating_add(1));
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    const FOX: &str = "The quick brown fox jumps over the lazy dog";

    fn signer(secret: &str, algorithm: HmacAlgorithm, output: SignatureEncoding) -> RequestSigner {
        RequestSigner::new(secret, SecretEncoding::Raw, algorithm, output).unwrap()
    }

    #[test]
    fn canonical_message_concatenates() {
        assert_eq!(canonical_message("1000", "GET", "/orders", ""), "1000GET/orders");
        assert_eq!(
            canonical_message("1000", "POST", "/orders", r#"{"size":1}"#),
            r#"1000POST/orders{"size":1}"#
        );
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = signer("abc", HmacAlgorithm::Sha256, SignatureEncoding::Base64);
        let first = signer.sign_request("1000", "GET", "/orders", "");
        let second = signer.sign_request("1000", "GET", "/orders", "");
        assert_eq!(first, second);
        assert_ne!(first, signer.sign_request("1001", "GET", "/orders", ""));
    }

    #[test]
    fn hmac_sha256_known_vector() {
        let signer = signer("key", HmacAlgorithm::Sha256, SignatureEncoding::Hex);
        assert_eq!(
            signer.sign(FOX.as_bytes()),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn hmac_sha512_known_vector() {
        let signer = signer("key", HmacAlgorithm::Sha512, SignatureEncoding::Hex);
        assert_eq!(
            signer.sign(FOX.as_bytes()),
            "b42af09057bac1e2d41708e48a902e09b5ff7f12ab428a4fe86653c73dd248fb\
             82f948a549f7b791a5b41915ee4d1ec3935357e4e2317250d0372afa2ebeeb3a"
        );
    }

    #[test]
    fn binance_documented_signature() {
        let signer = signer(
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
            HmacAlgorithm::Sha256,
            SignatureEncoding::Hex,
        );
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            signer.sign(query.as_bytes()),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn sha384_hex_length() {
        let signer = signer("key", HmacAlgorithm::Sha384, SignatureEncoding::Hex);
        assert_eq!(signer.sign(FOX.as_bytes()).len(), 96);
    }

    #[test]
    fn secret_encodings_decode_to_same_key() {
        let raw = signer("secret", HmacAlgorithm::Sha256, SignatureEncoding::Base64);
        let b64 = RequestSigner::new(
            "c2VjcmV0",
            SecretEncoding::Base64,
            HmacAlgorithm::Sha256,
            SignatureEncoding::Base64,
        )
        .unwrap();
        let hexed = RequestSigner::new(
            "736563726574",
            SecretEncoding::Hex,
            HmacAlgorithm::Sha256,
            SignatureEncoding::Base64,
        )
        .unwrap();

        let message = canonical_message("1000", "GET", "/accounts", "");
        assert_eq!(raw.sign(message.as_bytes()), b64.sign(message.as_bytes()));
        assert_eq!(raw.sign(message.as_bytes()), hexed.sign(message.as_bytes()));
    }

    #[test]
    fn invalid_secret_is_rejected() {
        let result = RequestSigner::new(
            "not base64!",
            SecretEncoding::Base64,
            HmacAlgorithm::Sha256,
            SignatureEncoding::Base64,
        );
        assert!(matches!(result, Err(SigningError::InvalidSecret(_))));
    }

    #[test]
    fn hex_upper_output() {
        let lower = signer("key", HmacAlgorithm::Sha256, SignatureEncoding::Hex);
        let upper = signer("key", HmacAlgorithm::Sha256, SignatureEncoding::HexUpper);
        assert_eq!(
            upper.sign(FOX.as_bytes()),
            lower.sign(FOX.as_bytes()).to_uppercase()
        );
    }

    #[test]
    fn debug_hides_key() {
        let signer = signer("super-secret", HmacAlgorithm::Sha256, SignatureEncoding::Hex);
        assert!(!format!("{signer:?}").contains("super-secret"));
    }

    #[test]
    fn jwt_has_three_segments() {
        let token = jwt_hs256(&serde_json::json!({"path": "/accounts/balance", "nonce": 1}), "s3cret");
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9");

        let signer = signer("s3cret", HmacAlgorithm::Sha256, SignatureEncoding::Hex);
        let expected = hex::encode(URL_SAFE_NO_PAD.decode(parts[2]).unwrap());
        assert_eq!(signer.sign(format!("{}.{}", parts[0], parts[1]).as_bytes()), expected);
    }

    #[test]
    fn nonce_strictly_increases() {
        let nonces = NonceSource::new(NonceUnit::Seconds);
        assert_eq!(nonces.next_at(100), 100);
        assert_eq!(nonces.next_at(100), 101);
        assert_eq!(nonces.next_at(50), 102);
        assert_eq!(nonces.next_at(500), 500);
    }

    #[test]
    fn nonce_follows_clock() {
        let nonces = NonceSource::new(NonceUnit::Millis);
        let first = nonces.next();
        let second = nonces.next();
        assert!(second > first);
        assert!(first > 1_500_000_000_000);
    }

    #[test]
    fn nonce_unique_across_threads() {
        let nonces = Arc::new(NonceSource::new(NonceUnit::Millis));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let nonces = Arc::clone(&nonces);
                std::thread::spawn(move || (0..250).map(|_| nonces.next_at(42)).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for nonce in handle.join().unwrap() {
                assert!(seen.insert(nonce), "duplicate nonce {nonce}");
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
