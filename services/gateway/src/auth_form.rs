//! Sign-in / sign-up modal state.
//!
//! The form is headless: it owns the inputs, mode, in-flight flag and error
//! message, and produces a [`FormView`] for whatever renders it. Visibility
//! belongs to the caller, which passes the open flag in and receives
//! `on_close` when a submission succeeds.

use crate::error::GatewayError;
use crate::gateway::Gateway;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shown when a failure carries no message
pub const FALLBACK_ERROR: &str = "操作失败，请稍后重试";

/// Which action the form submits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

impl AuthMode {
    pub fn toggled(self) -> Self {
        match self {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        }
    }
}

/// Callbacks the form delegates to
#[async_trait]
pub trait AuthCallbacks: Send + Sync {
    async fn on_sign_in(&self, email: &str, password: &str) -> Result<(), GatewayError>;

    async fn on_sign_up(&self, email: &str, password: &str) -> Result<(), GatewayError>;

    /// Close the modal
    fn on_close(&self);
}

/// Outcome of a submit call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing happened: modal closed, a field empty, or already submitting
    Ignored,
    /// The callback succeeded and the modal was asked to close
    Completed,
    /// The callback failed; the message is shown in the form
    Failed(String),
}

/// Form state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub email: String,
    pub password: String,
    pub mode: AuthMode,
    pub submitting: bool,
    pub error_message: String,
}

/// Everything a renderer needs to draw the open modal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    pub title: &'static str,
    pub email: String,
    pub password: String,
    pub submit_label: &'static str,
    pub submit_disabled: bool,
    pub error_message: Option<String>,
    pub toggle_prompt: &'static str,
    pub toggle_label: &'static str,
}

/// Credential form
///
/// Cloning yields another handle to the same state, so a renderer can keep
/// reading the view while a submission is in flight.
#[derive(Clone, Default)]
pub struct CredentialForm {
    state: Arc<Mutex<FormState>>,
}

impl CredentialForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_email(&self, email: impl Into<String>) {
        self.state.lock().email = email.into();
    }

    pub fn set_password(&self, password: impl Into<String>) {
        self.state.lock().password = password.into();
    }

    /// Switch between sign-in and sign-up; inputs are kept
    pub fn toggle_mode(&self) {
        let mut state = self.state.lock();
        state.mode = state.mode.toggled();
    }

    /// Snapshot of the current state
    pub fn state(&self) -> FormState {
        self.state.lock().clone()
    }

    /// Render model, or `None` when the modal is closed
    pub fn view(&self, is_open: bool) -> Option<FormView> {
        if !is_open {
            return None;
        }

        let state = self.state.lock();
        let (title, action, toggle_prompt, toggle_label) = match state.mode {
            AuthMode::SignIn => ("登录账号", "登录", "还没有账号？", "去注册"),
            AuthMode::SignUp => ("注册账号", "注册", "已有账号？", "去登录"),
        };

        Some(FormView {
            title,
            email: state.email.clone(),
            password: state.password.clone(),
            submit_label: if state.submitting { "处理中..." } else { action },
            submit_disabled: state.submitting,
            error_message: (!state.error_message.is_empty()).then(|| state.error_message.clone()),
            toggle_prompt,
            toggle_label,
        })
    }

    /// Submit the form through `callbacks`
    pub async fn submit(&self, is_open: bool, callbacks: &dyn AuthCallbacks) -> SubmitOutcome {
        let (email, password, mode) = {
            let mut state = self.state.lock();
            if !is_open || state.submitting || state.email.is_empty() || state.password.is_empty()
            {
                return SubmitOutcome::Ignored;
            }
            state.submitting = true;
            state.error_message.clear();
            (state.email.clone(), state.password.clone(), state.mode)
        };

        debug!(?mode, "Submitting credentials");

        let result = match mode {
            AuthMode::SignIn => callbacks.on_sign_in(&email, &password).await,
            AuthMode::SignUp => callbacks.on_sign_up(&email, &password).await,
        };

        let outcome = match result {
            Ok(()) => {
                callbacks.on_close();
                SubmitOutcome::Completed
            }
            Err(e) => {
                let message = e.message();
                let message = if message.trim().is_empty() {
                    FALLBACK_ERROR.to_string()
                } else {
                    message
                };
                warn!(?mode, error = %message, "Credential submission failed");
                self.state.lock().error_message = message.clone();
                SubmitOutcome::Failed(message)
            }
        };

        self.state.lock().submitting = false;
        outcome
    }
}

/// [`AuthCallbacks`] backed by a [`Gateway`]
pub struct GatewayCallbacks<C>
where
    C: Fn() + Send + Sync + 'static,
{
    gateway: Arc<Gateway>,
    close: C,
}

impl<C> GatewayCallbacks<C>
where
    C: Fn() + Send + Sync + 'static,
{
    pub fn new(gateway: Arc<Gateway>, close: C) -> Self {
        Self { gateway, close }
    }
}

#[async_trait]
impl<C> AuthCallbacks for GatewayCallbacks<C>
where
    C: Fn() + Send + Sync + 'static,
{
    async fn on_sign_in(&self, email: &str, password: &str) -> Result<(), GatewayError> {
        self.gateway.sign_in_with_email(email, password).await?;
        Ok(())
    }

    async fn on_sign_up(&self, email: &str, password: &str) -> Result<(), GatewayError> {
        self.gateway.sign_up_with_email(email, password).await?;
        Ok(())
    }

    fn on_close(&self) {
        (self.close)()
    }
}
