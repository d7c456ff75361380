//! Salted password hashing used by the server side
//!
//! `hash = BASE64(SHA256(utf8(password + salt)))`

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a generated salt
const SALT_LENGTH: usize = 32;

const SALT_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random alphanumeric salt
pub fn generate_salt() -> String {
    let mut rng = rand::thread_rng();
    (0..SALT_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..SALT_CHARSET.len());
            SALT_CHARSET[idx] as char
        })
        .collect()
}

/// Hash `password` with `salt`
pub fn generate_password_hash(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Check `password` against a stored hash
pub fn validate_password(password: &str, salt: &str, password_hash: &str) -> bool {
    generate_password_hash(password, salt) == password_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // sha256("abc") with an empty salt
        assert_eq!(
            generate_password_hash("abc", ""),
            "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
        );
    }

    #[test]
    fn test_salt_is_concatenated() {
        assert_eq!(
            generate_password_hash("pass", "word"),
            generate_password_hash("passw", "ord")
        );
        assert_ne!(
            generate_password_hash("secret", "salt-a"),
            generate_password_hash("secret", "salt-b")
        );
    }

    #[test]
    fn test_validate_password() {
        let salt = generate_salt();
        let hash = generate_password_hash("hunter22", &salt);
        assert!(validate_password("hunter22", &salt, &hash));
        assert!(!validate_password("hunter23", &salt, &hash));
    }

    #[test]
    fn test_salt_format() {
        let salt = generate_salt();
        assert_eq!(salt.len(), SALT_LENGTH);
        assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(salt, generate_salt());
    }
}
