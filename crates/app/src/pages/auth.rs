//! Sign-in / sign-up form.

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};
use url::Url;

use guia_comercial_core::Email;

use super::{FormError, NavigationRequest};
use crate::error::add_breadcrumb;
use crate::navigation::PageKind;
use crate::supabase::{Backend, SignUpRequest};

/// Which form is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Signed in; go to the dashboard.
    Navigate(NavigationRequest),
    /// Account created; the user must confirm by email. No navigation.
    ConfirmationPending,
    /// Rejected; the message is in [`AuthPage::error`].
    Failed,
}

/// Auth page state.
#[derive(Debug, Clone)]
pub struct AuthPage {
    mode: AuthMode,
    email: String,
    password: SecretString,
    nombre: String,
    error: Option<String>,
    confirmation_sent_to: Option<String>,
    redirect_to: Url,
}

impl AuthPage {
    /// Empty sign-in form. Confirmation emails link back to `redirect_to`.
    #[must_use]
    pub fn new(redirect_to: Url) -> Self {
        Self {
            mode: AuthMode::SignIn,
            email: String::new(),
            password: SecretString::from(String::new()),
            nombre: String::new(),
            error: None,
            confirmation_sent_to: None,
            redirect_to,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Switch between sign-in and sign-up, clearing any error.
    pub fn set_mode(&mut self, mode: AuthMode) {
        self.mode = mode;
        self.error = None;
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn set_password(&mut self, password: SecretString) {
        self.password = password;
    }

    pub fn set_nombre(&mut self, nombre: impl Into<String>) {
        self.nombre = nombre.into();
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn nombre(&self) -> &str {
        &self.nombre
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Address the confirmation email went to, once sign-up succeeded.
    #[must_use]
    pub fn confirmation_sent_to(&self) -> Option<&str> {
        self.confirmation_sent_to.as_deref()
    }

    /// Label of the submit button.
    #[must_use]
    pub const fn submit_label(&self) -> &'static str {
        match self.mode {
            AuthMode::SignIn => "Ingresar",
            AuthMode::SignUp => "Registrarse",
        }
    }

    fn validate(&self) -> Result<Email, FormError> {
        let email = Email::parse(&self.email)?;
        if self.password.expose_secret().is_empty() {
            return Err(FormError::MissingPassword);
        }
        if self.mode == AuthMode::SignUp && self.nombre.trim().is_empty() {
            return Err(FormError::MissingNombre);
        }
        Ok(email)
    }

    /// Submit the current form.
    ///
    /// Validation failures and backend rejections end up in
    /// [`AuthPage::error`] without navigating.
    #[instrument(skip_all, fields(mode = ?self.mode))]
    pub async fn submit(&mut self, backend: &dyn Backend) -> AuthOutcome {
        self.error = None;

        let email = match self.validate() {
            Ok(email) => email,
            Err(e) => {
                self.error = Some(e.to_string());
                return AuthOutcome::Failed;
            }
        };

        match self.mode {
            AuthMode::SignIn => self.sign_in(backend, &email).await,
            AuthMode::SignUp => self.sign_up(backend, email).await,
        }
    }

    async fn sign_in(&mut self, backend: &dyn Backend, email: &Email) -> AuthOutcome {
        match backend.sign_in_with_password(email, &self.password).await {
            Ok(_) => {
                add_breadcrumb("auth", "Signed in", None);
                AuthOutcome::Navigate(NavigationRequest::to(PageKind::Dashboard))
            }
            Err(e) => {
                warn!(error = %e, "Sign-in rejected");
                self.error = Some(e.to_string());
                AuthOutcome::Failed
            }
        }
    }

    async fn sign_up(&mut self, backend: &dyn Backend, email: Email) -> AuthOutcome {
        let request = SignUpRequest {
            email,
            password: self.password.clone(),
            nombre: self.nombre.trim().to_string(),
            redirect_to: self.redirect_to.clone(),
        };
        match backend.sign_up(&request).await {
            Ok(outcome) => {
                info!(
                    needs_confirmation = outcome.needs_confirmation(),
                    "Account created"
                );
                add_breadcrumb("auth", "Signed up", None);
                self.confirmation_sent_to = Some(request.email.into_inner());
                AuthOutcome::ConfirmationPending
            }
            Err(e) => {
                warn!(error = %e, "Sign-up rejected");
                self.error = Some(e.to_string());
                AuthOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use guia_comercial_core::UserId;

    fn page() -> AuthPage {
        AuthPage::new(Url::parse("com.guiacomercial.miapp://auth-callback").unwrap())
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn test_sign_in_navigates_to_dashboard() {
        let backend = FakeBackend::new().with_account("ana@example.com", "secreto", UserId::random());
        let mut page = page();
        page.set_email("ana@example.com");
        page.set_password(secret("secreto"));

        let outcome = page.submit(&backend).await;
        assert_eq!(
            outcome,
            AuthOutcome::Navigate(NavigationRequest::to(PageKind::Dashboard))
        );
        assert!(backend.session().is_some());
    }

    #[tokio::test]
    async fn test_sign_in_shows_backend_message() {
        let backend = FakeBackend::new();
        let mut page = page();
        page.set_email("ana@example.com");
        page.set_password(secret("wrong"));

        assert_eq!(page.submit(&backend).await, AuthOutcome::Failed);
        assert_eq!(page.error(), Some("Invalid login credentials"));
    }

    #[tokio::test]
    async fn test_sign_up_shows_confirmation_and_stays() {
        let backend = FakeBackend::new();
        let mut page = page();
        page.set_mode(AuthMode::SignUp);
        page.set_nombre("  Ana Pérez ");
        page.set_email("ana@example.com");
        page.set_password(secret("secreto"));

        assert_eq!(page.submit(&backend).await, AuthOutcome::ConfirmationPending);
        assert_eq!(page.confirmation_sent_to(), Some("ana@example.com"));
        assert_eq!(
            backend.sign_ups(),
            vec![("ana@example.com".to_string(), "Ana Pérez".to_string())]
        );
        assert!(backend.session().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_requires_nombre() {
        let backend = FakeBackend::new();
        let mut page = page();
        page.set_mode(AuthMode::SignUp);
        page.set_email("ana@example.com");
        page.set_password(secret("secreto"));

        assert_eq!(page.submit(&backend).await, AuthOutcome::Failed);
        assert_eq!(page.error(), Some("Por favor ingresa tu nombre completo."));
        assert!(backend.sign_ups().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_email_blocks_submission() {
        let backend = FakeBackend::new();
        let mut page = page();
        page.set_email("not-an-email");
        page.set_password(secret("secreto"));

        assert_eq!(page.submit(&backend).await, AuthOutcome::Failed);
        assert!(page.error().is_some());
    }

    #[test]
    fn test_mode_toggle_and_labels() {
        let mut page = page();
        assert_eq!(page.submit_label(), "Ingresar");
        page.set_mode(AuthMode::SignUp);
        assert_eq!(page.submit_label(), "Registrarse");
        assert_eq!(page.mode(), AuthMode::SignUp);
    }
}
