//! Password hashing. bcrypt is intentionally slow; callers run these on a
//! blocking worker so the KDF never stalls the request runtime.

pub use bcrypt::BcryptError;

pub fn hash(password: &str) -> Result<String, BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

pub fn verify(password: &str, hash: &str) -> Result<bool, BcryptError> {
    bcrypt::verify(password, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hashed = hash("Passw0rd!").unwrap();
        assert!(verify("Passw0rd!", &hashed).unwrap());
        assert!(!verify("passw0rd!", &hashed).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash("Passw0rd!").unwrap(), hash("Passw0rd!").unwrap());
    }
}
