pub mod password;
pub mod validation;

pub use password::{
    hash_password, password_policy_errors, verify_against_dummy, verify_password, Password,
    PasswordHashString,
};
pub use validation::ValidatedForm;
