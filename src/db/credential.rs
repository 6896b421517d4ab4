use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

use super::DatabaseError;

const GENERATED_PASSWORD_LEN: usize = 20;

/// Argon2id PHC string with a fresh random salt.
pub fn hash_credential(password: &str) -> Result<String, DatabaseError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DatabaseError::Credential(e.to_string()))
}

/// Recomputes the hash with the stored salt and parameters and compares.
pub fn verify_credential(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_password_gets_distinct_salts() {
        let first = hash_credential("correct horse").expect("hash");
        let second = hash_credential("correct horse").expect("hash");

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_credential("correct horse", &first));
        assert!(verify_credential("correct horse", &second));
    }

    #[test]
    fn wrong_password_or_garbage_hash_fails() {
        let hash = hash_credential("battery staple").expect("hash");

        assert!(!verify_credential("battery stapler", &hash));
        assert!(!verify_credential("battery staple", "not-a-phc-string"));
    }

    #[test]
    fn generated_passwords_are_alphanumeric() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LEN);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, generate_password());
    }
}
