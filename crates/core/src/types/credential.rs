//! Account credentials handed from registration to sign-in.

use secrecy::{ExposeSecret, SecretString};

use crate::Email;

/// A freshly chosen email/password pair.
///
/// Lives only for the duration of one checkout attempt. The password is a
/// [`SecretString`], so `Debug` output never contains it, and it is zeroized
/// on drop. `Credentials` deliberately does not implement `Serialize`.
#[derive(Debug, Clone)]
pub struct Credentials {
    email: Email,
    password: SecretString,
}

impl Credentials {
    /// Create a new credential pair.
    #[must_use]
    pub const fn new(email: Email, password: SecretString) -> Self {
        Self { email, password }
    }

    /// The account email.
    #[must_use]
    pub const fn email(&self) -> &Email {
        &self.email
    }

    /// The account password.
    #[must_use]
    pub const fn password(&self) -> &SecretString {
        &self.password
    }

    /// Returns `true` if both halves are present.
    ///
    /// The email is non-empty by construction; the password may still be
    /// blank if it came from an unvalidated source.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.password.expose_secret().is_empty()
    }
}
