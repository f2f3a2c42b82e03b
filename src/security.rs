use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

use crate::error::PasswordError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Password hashing and complexity rules for admin accounts.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    params: Params,
}

impl PasswordPolicy {
    /// `cost` is the argon2id time cost; memory and parallelism stay at the crate defaults.
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        let params = Params::new(Params::DEFAULT_M_COST, cost, Params::DEFAULT_P_COST, None)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        Ok(Self { params })
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Salted argon2id PHC string. Panics if the OS entropy source fails.
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    /// Cost parameters are taken from the stored hash, so hashes made under an
    /// older cost keep verifying.
    pub fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;
        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(_) => Err(PasswordError::InvalidHash),
        }
    }

    pub fn validate_complexity(&self, plaintext: &str) -> Result<(), PasswordError> {
        validate_complexity(plaintext)
    }
}

/// At least 8 characters with an upper, a lower, a digit and a symbol.
pub fn validate_complexity(plaintext: &str) -> Result<(), PasswordError> {
    if plaintext.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordError::WeakPassword("password must be at least 8 characters"));
    }

    let (mut upper, mut lower, mut digit, mut symbol) = (false, false, false, false);
    for c in plaintext.chars() {
        if c.is_uppercase() {
            upper = true;
        } else if c.is_lowercase() {
            lower = true;
        } else if c.is_numeric() {
            digit = true;
        } else if !c.is_whitespace() && !c.is_control() {
            symbol = true;
        }
    }

    if !(upper && lower && digit && symbol) {
        return Err(PasswordError::WeakPassword(
            "password must contain upper and lower case letters, a digit and a symbol",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PasswordPolicy {
        PasswordPolicy::new(1).expect("params")
    }

    #[test]
    fn hash_then_verify() {
        let p = policy();
        let hash = p.hash("Longenough1!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(p.verify("Longenough1!", &hash).unwrap());
        assert!(!p.verify("Longenough1?", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let p = policy();
        assert_ne!(p.hash("Longenough1!").unwrap(), p.hash("Longenough1!").unwrap());
    }

    #[test]
    fn verify_uses_cost_from_stored_hash() {
        let old = PasswordPolicy::new(2).unwrap().hash("Longenough1!").unwrap();
        assert!(policy().verify("Longenough1!", &old).unwrap());
    }

    #[test]
    fn malformed_hash_is_invalid_hash() {
        let err = policy().verify("whatever", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, PasswordError::InvalidHash));
    }

    #[test]
    fn complexity_rules() {
        assert!(matches!(validate_complexity("short1!"), Err(PasswordError::WeakPassword(_))));
        assert!(validate_complexity("Longenough1!").is_ok());
        assert!(validate_complexity("alllowercase1!").is_err());
        assert!(validate_complexity("ALLUPPERCASE1!").is_err());
        assert!(validate_complexity("NoDigitsHere!").is_err());
        assert!(validate_complexity("NoSymbols123").is_err());
    }
}
