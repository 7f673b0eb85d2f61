//! Message-integrity hashing
//!
//! HMAC-SHA256 keyed with the configured secret, hex encoded.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the lowercase hex HMAC-SHA256 of `text` under `key`.
///
/// Deterministic for fixed inputs; any change to either input changes the
/// output.
pub fn hash_value(text: &str, key: &str) -> String {
    // HMAC accepts keys of any length, including empty
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(text.as_bytes());
    const_hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_value_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            hash_value("what do ya want for nothing?", "Jefe"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hash_value_is_lowercase_hex() {
        let hash = hash_value("hello", "secret");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    proptest! {
        #[test]
        fn prop_hash_value_deterministic(text in ".*", key in ".*") {
            prop_assert_eq!(hash_value(&text, &key), hash_value(&text, &key));
        }

        #[test]
        fn prop_hash_value_changes_with_text(text in "[a-z]{1,32}", key in "[a-z]{1,32}") {
            let altered = format!("{}x", text);
            prop_assert_ne!(hash_value(&text, &key), hash_value(&altered, &key));
        }

        #[test]
        fn prop_hash_value_changes_with_key(text in "[a-z]{1,32}", key in "[a-z]{1,32}") {
            let altered = format!("{}x", key);
            prop_assert_ne!(hash_value(&text, &key), hash_value(&text, &altered));
        }
    }
}
