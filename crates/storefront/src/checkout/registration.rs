//! Guest user form and account registration lifecycle.
//!
//! The coordinator owns the form values and reacts to the registration
//! intent raised by the pay action. It never talks to the payment side
//! directly: a successful registration is announced by writing the relay and
//! then setting `userRegister = success` on the bus.

use std::fmt;
use std::sync::Arc;

use guestpay_core::{CheckoutSession, Credentials, Email, EmailError, OperationStatus, UpdateKey};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::CheckoutTimings;
use super::api::{AccountError, CheckoutApi, RegisterAccountInput};
use super::context::AttemptContext;

/// Minimum password length when the shopper opts into an account.
pub const MIN_PASSWORD_LENGTH: usize = 8;

const REQUIRED: &str = "This field is required";
const INVALID_EMAIL: &str = "Invalid email address";
const PASSWORD_TOO_SHORT: &str = "Password must be at least 8 characters";

/// Values of the guest user form.
#[derive(Debug, Clone)]
pub struct GuestUserForm {
    pub email: String,
    pub password: SecretString,
    pub create_account: bool,
}

/// Inline field errors of the guest user form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl FormErrors {
    /// Returns `true` if no field has an error.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = [("email", &self.email), ("password", &self.password)]
            .into_iter()
            .filter_map(|(field, error)| error.as_ref().map(|e| format!("{field}: {e}")))
            .collect();
        write!(f, "{}", fields.join(", "))
    }
}

impl std::error::Error for FormErrors {}

/// A form that passed validation.
#[derive(Debug, Clone)]
pub struct ValidForm {
    pub email: Email,
    pub password: SecretString,
}

impl GuestUserForm {
    /// Validate the form.
    ///
    /// The email must be present and well formed. The password is only
    /// checked when the shopper opted into an account: it must then be
    /// present and at least [`MIN_PASSWORD_LENGTH`] characters long.
    ///
    /// # Errors
    ///
    /// Returns the inline errors for every invalid field.
    pub fn validate(&self) -> Result<ValidForm, FormErrors> {
        let mut errors = FormErrors::default();

        let email = match Email::parse(self.email.trim()) {
            Ok(email) => Some(email),
            Err(EmailError::Empty) => {
                errors.email = Some(REQUIRED.to_owned());
                None
            }
            Err(_) => {
                errors.email = Some(INVALID_EMAIL.to_owned());
                None
            }
        };

        if self.create_account {
            let length = self.password.expose_secret().chars().count();
            if length == 0 {
                errors.password = Some(REQUIRED.to_owned());
            } else if length < MIN_PASSWORD_LENGTH {
                errors.password = Some(PASSWORD_TOO_SHORT.to_owned());
            }
        }

        match email {
            Some(email) if errors.is_empty() => Ok(ValidForm {
                email,
                password: self.password.clone(),
            }),
            _ => Err(errors),
        }
    }
}

/// How a registration submission ended.
#[derive(Debug, Clone)]
pub enum RegistrationOutcome {
    /// The account was created and the credentials handed to the relay.
    Registered,
    /// An account with this email already exists; payment may proceed.
    AlreadyExists,
    /// The form failed validation and nothing was submitted.
    Invalid(FormErrors),
    /// The backend rejected the registration for a reason other than a
    /// conflict. The shopper may correct the form and pay again.
    Rejected(Vec<AccountError>),
    /// The registration request itself failed.
    Failed(String),
    /// The attempt context went away before anything was submitted.
    Abandoned,
}

/// Drives the guest user form of one checkout attempt.
pub struct RegistrationCoordinator {
    api: Arc<dyn CheckoutApi>,
    context: AttemptContext,
    checkout: CheckoutSession,
    redirect_url: Url,
    timings: CheckoutTimings,
    form: GuestUserForm,
    errors: FormErrors,
}

impl RegistrationCoordinator {
    /// Create the coordinator.
    ///
    /// The form email starts as `initial_email`, falling back to the email
    /// already stored on the checkout.
    #[must_use]
    pub fn new(
        api: Arc<dyn CheckoutApi>,
        context: AttemptContext,
        checkout: CheckoutSession,
        redirect_url: Url,
        timings: CheckoutTimings,
        initial_email: Option<&str>,
    ) -> Self {
        let email = initial_email
            .filter(|email| !email.is_empty())
            .map(str::to_owned)
            .or_else(|| checkout.email.as_ref().map(ToString::to_string))
            .unwrap_or_default();

        Self {
            api,
            context,
            checkout,
            redirect_url,
            timings,
            form: GuestUserForm {
                email,
                password: SecretString::from(String::new()),
                create_account: false,
            },
            errors: FormErrors::default(),
        }
    }

    /// Current form values.
    #[must_use]
    pub const fn form(&self) -> &GuestUserForm {
        &self.form
    }

    /// Inline errors from the last validation.
    #[must_use]
    pub const fn errors(&self) -> &FormErrors {
        &self.errors
    }

    /// Whether registration already reached a terminal outcome.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.context.intent().disabled
    }

    /// Set the chosen password.
    pub fn set_password(&mut self, password: SecretString) {
        self.form.password = password;
    }

    /// Toggle the "create an account" opt-in.
    pub fn set_create_account(&mut self, create_account: bool) {
        self.form.create_account = create_account;
        self.context
            .update_intent(|intent| intent.create_account = create_account);
    }

    /// Handle an edit of the email field.
    ///
    /// A new email re-enables registration. If the email is well formed the
    /// checkout email update is marked as loading and pushed to the checkout.
    #[instrument(skip(self), fields(attempt = %self.context.id(), checkout_id = %self.checkout.id))]
    pub async fn change_email(&mut self, email: &str) {
        self.form.email = email.trim().to_owned();
        self.context.update_intent(|intent| intent.disabled = false);

        let email = match Email::parse(&self.form.email) {
            Ok(email) => {
                self.errors.email = None;
                email
            }
            Err(err) => {
                debug!(error = %err, "email not valid yet, skipping checkout update");
                self.errors.email = Some(if matches!(err, EmailError::Empty) {
                    REQUIRED.to_owned()
                } else {
                    INVALID_EMAIL.to_owned()
                });
                return;
            }
        };

        let bus = self.context.bus();
        bus.restart(UpdateKey::CheckoutEmailUpdate);

        let status = match self.api.update_checkout_email(&self.checkout.id, &email).await {
            Ok(errors) if errors.is_empty() => OperationStatus::Success,
            Ok(errors) => {
                warn!(?errors, "checkout email update rejected");
                OperationStatus::Error
            }
            Err(e) => {
                warn!(error = %e, "checkout email update failed");
                OperationStatus::Error
            }
        };
        self.publish(UpdateKey::CheckoutEmailUpdate, status);
    }

    /// Validate the form and record the inline errors.
    ///
    /// # Errors
    ///
    /// Returns the field errors if the form is invalid.
    pub fn validate(&mut self) -> Result<ValidForm, FormErrors> {
        let result = self.form.validate();
        self.errors = result.as_ref().err().cloned().unwrap_or_default();
        result
    }

    /// React to the current registration intent.
    ///
    /// Does nothing unless registration was requested, the shopper is not
    /// signed in, opted into an account, and registration is not disabled.
    /// Otherwise consumes the intent and submits the form.
    pub async fn tick(&mut self) -> Option<RegistrationOutcome> {
        let intent = self.context.intent();
        if !intent.should_register
            || self.checkout.authenticated
            || !intent.create_account
            || intent.disabled
        {
            return None;
        }

        self.context
            .update_intent(|intent| intent.should_register = false);

        match self.validate() {
            Ok(form) => Some(self.submit(form).await),
            Err(errors) => {
                info!(%errors, "registration form invalid, not submitting");
                Some(RegistrationOutcome::Invalid(errors))
            }
        }
    }

    /// Follow intent changes and validation requests until a submission
    /// produces an outcome.
    ///
    /// Run one coordinator task per pay action. After a
    /// [`RegistrationOutcome::Rejected`] the form stays enabled, so a later
    /// run resubmits.
    pub async fn run(mut self) -> RegistrationOutcome {
        let mut intent = self.context.subscribe_intent();
        let mut validation = self.context.subscribe_validation();

        loop {
            if let Some(outcome) = self.tick().await {
                return outcome;
            }

            tokio::select! {
                changed = intent.changed() => {
                    if changed.is_err() {
                        return RegistrationOutcome::Abandoned;
                    }
                }
                changed = validation.changed() => {
                    if changed.is_err() {
                        return RegistrationOutcome::Abandoned;
                    }
                    if let Err(errors) = self.validate() {
                        debug!(%errors, "guest user form failed validation");
                    }
                }
            }
        }
    }

    #[instrument(
        skip(self, form),
        fields(attempt = %self.context.id(), checkout_id = %self.checkout.id, email = %form.email)
    )]
    async fn submit(&mut self, form: ValidForm) -> RegistrationOutcome {
        let input = RegisterAccountInput {
            email: form.email,
            password: form.password,
            channel: self.checkout.channel.clone(),
            redirect_url: self.redirect_url.clone(),
        };

        // `userRegister` stays loading while the request is in flight.
        self.context.bus().restart(UpdateKey::UserRegister);
        let result = self.api.register_account(&input).await;

        match result {
            Err(e) => {
                error!(error = %e, "account registration request failed");
                self.publish(UpdateKey::UserRegister, OperationStatus::Error);
                RegistrationOutcome::Failed(e.to_string())
            }
            Ok(errors) if errors.iter().any(AccountError::is_conflict) => {
                self.context.update_intent(|intent| intent.disabled = true);
                info!("account already exists, continuing checkout without new credentials");
                self.signal_registered().await;
                RegistrationOutcome::AlreadyExists
            }
            Ok(errors) if !errors.is_empty() => {
                let codes: Vec<_> = errors.iter().map(|e| e.code).collect();
                warn!(?codes, "account registration rejected");
                self.publish(UpdateKey::UserRegister, OperationStatus::Error);
                RegistrationOutcome::Rejected(errors)
            }
            Ok(_) => {
                self.context.update_intent(|intent| intent.disabled = true);
                self.context
                    .relay()
                    .set(Credentials::new(input.email, input.password));
                info!("account registered, credentials handed to payment");
                self.signal_registered().await;
                RegistrationOutcome::Registered
            }
        }
    }

    /// Announce a registration that unblocks payment.
    ///
    /// Any relay write happens before this is called, so it is visible to
    /// the payment side before `userRegister = success` is published. The
    /// signal delay is a pause between the two and not what orders them.
    async fn signal_registered(&self) {
        tokio::time::sleep(self.timings.signal_delay).await;
        self.publish(UpdateKey::UserRegister, OperationStatus::Success);
    }

    fn publish(&self, key: UpdateKey, status: OperationStatus) {
        if let Err(e) = self.context.bus().set_status(key, status) {
            warn!(error = %e, "ignoring out-of-order status update");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(email: &str, password: &str, create_account: bool) -> GuestUserForm {
        GuestUserForm {
            email: email.to_owned(),
            password: SecretString::from(password),
            create_account,
        }
    }

    #[test]
    fn test_guest_checkout_has_no_password_constraint() {
        assert!(form("new@x.com", "", false).validate().is_ok());
        assert!(form("new@x.com", "short", false).validate().is_ok());
    }

    #[test]
    fn test_account_requires_long_password() {
        let errors = form("new@x.com", "short", true).validate().unwrap_err();
        assert_eq!(errors.password.as_deref(), Some(PASSWORD_TOO_SHORT));
        assert!(errors.email.is_none());

        let errors = form("new@x.com", "", true).validate().unwrap_err();
        assert_eq!(errors.password.as_deref(), Some(REQUIRED));

        let valid = form("new@x.com", "longenough", true).validate().unwrap();
        assert_eq!(valid.email.as_str(), "new@x.com");
        assert_eq!(valid.password.expose_secret(), "longenough");
    }

    #[test]
    fn test_password_length_counts_characters() {
        assert!(form("new@x.com", "pässwörd", true).validate().is_ok());
        assert!(form("new@x.com", "ääääääá", true).validate().is_err());
    }

    #[test]
    fn test_email_errors() {
        let errors = form("", "longenough", true).validate().unwrap_err();
        assert_eq!(errors.email.as_deref(), Some(REQUIRED));

        let errors = form("nope", "longenough", false).validate().unwrap_err();
        assert_eq!(errors.email.as_deref(), Some(INVALID_EMAIL));
    }

    #[test]
    fn test_email_is_trimmed() {
        let valid = form("  new@x.com ", "", false).validate().unwrap();
        assert_eq!(valid.email.as_str(), "new@x.com");
    }

    #[test]
    fn test_form_errors_display() {
        let errors = FormErrors {
            email: Some(INVALID_EMAIL.to_owned()),
            password: Some(PASSWORD_TOO_SHORT.to_owned()),
        };
        assert_eq!(
            errors.to_string(),
            "email: Invalid email address, password: Password must be at least 8 characters"
        );
    }
}
