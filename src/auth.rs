//! Sign-in, two-step sign-up, email verification and logout.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::AuthApi;
use crate::error::{ApiError, FieldErrors};
use crate::models::Session;
use crate::session::SessionStore;

pub const MIN_PASSWORD_LEN: usize = 6;
/// How long the verification success screen stays up before going to sign-in.
pub const VERIFIED_REDIRECT_DELAY: Duration = Duration::from_secs(4);

pub const AFTER_SIGN_IN: &str = "/movies";
pub const AFTER_SIGN_UP: &str = "/verificationpending";
pub const AFTER_LOGOUT: &str = "/";
pub const SIGN_IN_PATH: &str = "/signin";

const NETWORK_MESSAGE: &str = "Network error. Please check your connection and try again.";

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignInForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Why a form submission did not go through.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormFailure {
    /// Inline field messages; nothing was sent.
    Invalid { fields: FieldErrors },
    /// The backend or the network refused; shown above the form.
    Form { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpAccepted {
    pub email: String,
    pub redirect: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verifying,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationView {
    pub status: VerificationStatus,
    pub message: String,
    pub redirect: Option<&'static str>,
    pub redirect_after_secs: Option<u64>,
}

impl VerificationView {
    pub fn pending() -> Self {
        Self {
            status: VerificationStatus::Verifying,
            message: "Verifying your email...".to_string(),
            redirect: None,
            redirect_after_secs: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Error,
            message: message.into(),
            redirect: None,
            redirect_after_secs: None,
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

pub fn validate_sign_in(form: &SignInForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, &form.email);
    if form.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.into_result()
}

/// First sign-up step: name and email.
pub fn validate_profile_step(form: &SignUpForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if form.name.trim().is_empty() {
        errors.add("name", "Name is required");
    }
    check_email(&mut errors, &form.email);
    errors.into_result()
}

/// Second sign-up step: password and its confirmation.
pub fn validate_password_step(form: &SignUpForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if form.password.is_empty() {
        errors.add("password", "Password is required");
    } else if form.password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", "Password must be at least 6 characters");
    }
    if form.confirm_password.is_empty() {
        errors.add("confirmPassword", "Please confirm your password");
    } else if form.confirm_password != form.password {
        errors.add("confirmPassword", "Passwords do not match");
    }
    errors.into_result()
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.add("email", "Please enter a valid email address");
    }
}

fn form_failure(err: &ApiError, fallback: &str) -> FormFailure {
    let message = match err {
        ApiError::Rejected { message } if !message.trim().is_empty() => message.clone(),
        ApiError::Network(_) | ApiError::Timeout => NETWORK_MESSAGE.to_string(),
        _ => fallback.to_string(),
    };
    FormFailure::Form { message }
}

pub struct AuthController {
    api: Arc<dyn AuthApi>,
    session: SessionStore,
}

impl AuthController {
    pub fn new(api: Arc<dyn AuthApi>, session: SessionStore) -> Self {
        Self { api, session }
    }

    pub async fn sign_in(&self, form: &SignInForm) -> Result<Session, FormFailure> {
        validate_sign_in(form).map_err(|fields| FormFailure::Invalid { fields })?;

        let session = self
            .api
            .sign_in(form.email.trim(), &form.password)
            .await
            .map_err(|e| {
                warn!("Sign-in failed: {}", e);
                form_failure(&e, "Invalid email or password. Please try again.")
            })?;

        if let Err(e) = self.session.save(&session) {
            warn!("Could not persist session: {:?}", e);
            return Err(FormFailure::Form {
                message: "Could not save your session. Please try again.".to_string(),
            });
        }
        info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Validates both steps and creates the account. The user is not signed
    /// in; they are sent to wait for the verification email instead.
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<SignUpAccepted, FormFailure> {
        validate_profile_step(form).map_err(|fields| FormFailure::Invalid { fields })?;
        validate_password_step(form).map_err(|fields| FormFailure::Invalid { fields })?;

        let email = form.email.trim();
        self.api
            .sign_up(form.name.trim(), email, &form.password)
            .await
            .map_err(|e| {
                warn!("Sign-up failed: {}", e);
                form_failure(&e, "Something went wrong. Please try again.")
            })?;
        info!("Account created, awaiting email verification");
        Ok(SignUpAccepted {
            email: email.to_string(),
            redirect: AFTER_SIGN_UP,
        })
    }

    pub async fn verify_email(&self, token: Option<&str>) -> VerificationView {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return VerificationView::failed("No verification token provided.");
        };
        match self.api.verify_email(token).await {
            Ok(true) => {
                info!("Email verified");
                VerificationView {
                    status: VerificationStatus::Success,
                    message: "Your email has been successfully verified! You will be redirected to login."
                        .to_string(),
                    redirect: Some(SIGN_IN_PATH),
                    redirect_after_secs: Some(VERIFIED_REDIRECT_DELAY.as_secs()),
                }
            }
            Ok(false) => VerificationView::failed(
                "Verification failed. Please try again or contact support.",
            ),
            Err(ApiError::Rejected { message }) if !message.trim().is_empty() => {
                VerificationView::failed(format!("Verification failed: {message}"))
            }
            Err(e) => {
                warn!("Email verification failed: {}", e);
                VerificationView::failed(
                    "Verification failed. Please try again or contact support.",
                )
            }
        }
    }

    pub async fn resend_verification(&self, email: &str) -> Result<(), FormFailure> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, email);
        errors
            .into_result()
            .map_err(|fields| FormFailure::Invalid { fields })?;
        self.api
            .resend_verification(email.trim())
            .await
            .map_err(|e| form_failure(&e, "Could not resend the verification email."))
    }

    pub fn logout(&self) -> anyhow::Result<&'static str> {
        self.session.clear()?;
        Ok(AFTER_LOGOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example@x.io"));
    }

    #[test]
    fn sign_in_needs_email_and_password() {
        let errors = validate_sign_in(&SignInForm::default()).unwrap_err();
        assert_eq!(errors.get("email"), Some("Email is required"));
        assert_eq!(errors.get("password"), Some("Password is required"));

        let form = SignInForm {
            email: "nope".into(),
            password: "x".into(),
        };
        let errors = validate_sign_in(&form).unwrap_err();
        assert_eq!(errors.get("email"), Some("Please enter a valid email address"));
        assert!(errors.get("password").is_none());
    }

    #[test]
    fn password_step_rules() {
        let mut form = SignUpForm {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "12345".into(),
            confirm_password: "12345".into(),
        };
        let errors = validate_password_step(&form).unwrap_err();
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 6 characters")
        );

        form.password = "123456".into();
        form.confirm_password = "654321".into();
        let errors = validate_password_step(&form).unwrap_err();
        assert_eq!(errors.get("confirmPassword"), Some("Passwords do not match"));

        form.confirm_password = "123456".into();
        assert!(validate_password_step(&form).is_ok());
        assert!(validate_profile_step(&form).is_ok());
    }
}
