use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::borrow::Cow;
use std::sync::OnceLock;
use validator::ValidationError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash a password using Argon2id with a random salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against a stored hash.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Password verification failed"))
}

/// Hash of a password nobody knows, built with the same parameters as real
/// hashes. `None` only if hashing itself is broken.
fn dummy_hash() -> Option<&'static PasswordHashString> {
    static DUMMY: OnceLock<Option<PasswordHashString>> = OnceLock::new();
    DUMMY
        .get_or_init(|| {
            let secret = SaltString::generate(&mut OsRng);
            hash_password(&Password::new(secret.as_str().to_string())).ok()
        })
        .as_ref()
}

/// Spend the same work as `verify_password` when there is no stored hash to
/// check, so a missing account answers no faster than a wrong password.
pub fn verify_against_dummy(password: &Password) {
    if let Some(hash) = dummy_hash() {
        let _ = verify_password(password, hash);
    }
}

/// Short built-in list of the most common passwords, compared after trimming
/// and lowercasing. It only covers the top of public breach lists.
const COMMON_PASSWORDS: &[&str] = &[
    "123456", "123456789", "12345678", "password", "qwerty", "qwerty123", "qwertyuiop",
    "1q2w3e4r", "1q2w3e4r5t", "111111", "123123", "abc123", "abcd1234", "password1",
    "password123", "passw0rd", "p@ssw0rd", "iloveyou", "admin", "admin123", "administrator",
    "welcome", "welcome1", "welcome123", "letmein", "monkey", "dragon", "football",
    "baseball", "sunshine", "princess", "master", "trustno1", "superman", "starwars",
    "whatever", "shadow", "michael", "jennifer", "computer", "internet", "freedom",
    "changeme", "default", "secret", "asdfghjkl", "zaq12wsx", "1qaz2wsx", "qazwsx",
    "aa123456", "000000", "987654321", "login", "access", "hello123", "test1234",
];

fn policy_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut row = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                row[j + 1] = prev[j] + 1;
                if row[j + 1] > best.2 {
                    best = (i + 1 - row[j + 1], j + 1 - row[j + 1], row[j + 1]);
                }
            }
        }
        prev = row;
    }
    best
}

/// Characters covered by recursively matched common blocks.
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, k) = longest_match(a, b);
    if k == 0 {
        return 0;
    }
    k + matched_chars(&a[..i], &b[..j]) + matched_chars(&a[i + k..], &b[j + k..])
}

/// Similarity in 0..=1, 1 for identical strings.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    (2 * matched_chars(&a, &b)) as f64 / (a.len() + b.len()) as f64
}

fn too_similar(password: &str, attribute: &str) -> bool {
    let password = password.to_lowercase();
    let attribute = attribute.to_lowercase();
    if attribute.is_empty() {
        return false;
    }
    std::iter::once(attribute.as_str())
        .chain(attribute.split(|c: char| !c.is_alphanumeric()))
        .filter(|part| part.chars().count() >= 3)
        .any(|part| similarity(&password, part) >= 0.7)
}

/// Password rules applied at signup and when an administrator sets a
/// password. `personal` holds values the password must not resemble, such as
/// the email and full name.
pub fn password_policy_errors(password: &str, personal: &[&str]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(policy_error(
            "password_too_short",
            "This password is too short. It must contain at least 8 characters.",
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push(policy_error(
            "password_entirely_numeric",
            "This password is entirely numeric.",
        ));
    }
    if COMMON_PASSWORDS.contains(&password.trim().to_lowercase().as_str()) {
        errors.push(policy_error(
            "password_too_common",
            "This password is too common.",
        ));
    }
    if personal.iter().any(|value| too_similar(password, value)) {
        errors.push(policy_error(
            "password_too_similar",
            "The password is too similar to your personal information.",
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(password: &str, personal: &[&str]) -> Vec<String> {
        password_policy_errors(password, personal)
            .into_iter()
            .map(|e| e.code.to_string())
            .collect()
    }

    #[test]
    fn test_hash_password() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");
        assert!(hash.as_str().starts_with("$argon2"));
    }

    #[test]
    fn test_verify_password() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");
        assert!(verify_password(&password, &hash).is_ok());

        let wrong_password = Password::new("wrongPassword".to_string());
        assert!(verify_password(&wrong_password, &hash).is_err());
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash1 = hash_password(&password).expect("Failed to hash password");
        let hash2 = hash_password(&password).expect("Failed to hash password");
        assert_ne!(hash1.as_str(), hash2.as_str());
    }

    #[test]
    fn dummy_hash_uses_the_real_parameters() {
        let dummy = PasswordHash::new(dummy_hash().unwrap().as_str()).unwrap();
        let real_hash = hash_password(&Password::new("mySecurePassword123".to_string())).unwrap();
        let real = PasswordHash::new(real_hash.as_str()).unwrap();
        assert_eq!(dummy.algorithm, real.algorithm);
        assert_eq!(dummy.version, real.version);
        assert_eq!(dummy.params, real.params);
        assert!(verify_password(&Password::new(String::new()), dummy_hash().unwrap()).is_err());
    }

    #[test]
    fn debug_hides_the_password() {
        let password = Password::new("hunter22".to_string());
        assert_eq!(format!("{:?}", password), "Password(***)");
    }

    #[test]
    fn policy_accepts_a_reasonable_password() {
        assert!(codes("Tr4ining!Harbor", &["sara@example.com", "Sara Ali"]).is_empty());
    }

    #[test]
    fn policy_rejects_short_numeric_and_common() {
        assert_eq!(
            codes("1234567", &[]),
            vec!["password_too_short", "password_entirely_numeric"]
        );
        assert_eq!(codes("Password1", &[]), vec!["password_too_common"]);
    }

    #[test]
    fn every_listed_common_password_is_refused_in_any_case() {
        for common in COMMON_PASSWORDS {
            let shouted = format!(" {} ", common.to_uppercase());
            assert!(
                codes(&shouted, &[]).contains(&"password_too_common".to_string()),
                "{common} accepted"
            );
        }
    }

    #[test]
    fn policy_rejects_passwords_close_to_personal_data() {
        assert_eq!(
            codes("saraali2024", &["sara.ali@example.com", "Sara Ali"]),
            vec!["password_too_similar"]
        );
        assert_eq!(
            codes("Alexandria9", &["x@example.com", "Alexandria Omar"]),
            vec!["password_too_similar"]
        );
    }
}
