//! Client for the hosted backend platform.
//!
//! [`Platform`] is the surface the gateway needs from the platform SDK:
//! auth, blob storage and a row table. [`RestPlatform`] implements it over
//! the platform's REST endpoints:
//!
//! ```text
//! /auth/v1/token?grant_type=...   sign in, refresh
//! /auth/v1/signup                 sign up
//! /auth/v1/logout                 sign out
//! /storage/v1/object/{bucket}/..  upload, remove, public URLs
//! /rest/v1/{table}                upsert, select, delete
//! ```

use crate::config::PlatformConfig;
use crate::error::{GatewayError, Result};
use crate::session::{AuthChangeEvent, AuthListener, Session, SessionStore, Subscription};
use crate::upload::UploadFile;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Equality filter on a table column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }
}

/// Sort order for a select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Row selection: all columns, equality filters, optional ordering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowQuery {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl RowQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }
}

/// Options sent with an object upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Cache-Control max-age in seconds
    pub cache_control_secs: u64,
    pub content_type: String,
    /// Overwrite an existing object at the same path
    pub upsert: bool,
}

/// Operations the gateway needs from the backend platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Platform: Send + Sync {
    /// Current session, refreshed when close to expiry
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Register a listener for session transitions
    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Option<Session>>;

    /// Create an account; `None` when the platform requires confirmation first
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>>;

    async fn sign_out(&self) -> Result<()>;

    /// Store an object at `path` in `bucket`
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        file: &UploadFile,
        options: &UploadOptions,
    ) -> Result<()>;

    /// Public URL of an object; no request is made
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Remove objects from `bucket`
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()>;

    /// Insert or update a row keyed by its primary key
    async fn upsert(&self, table: &str, row: Value) -> Result<()>;

    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>>;

    /// Delete the rows matching every filter
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()>;
}

/// [`Platform`] over the platform's REST API
pub struct RestPlatform {
    http: Client,
    base_url: String,
    anon_key: String,
    sessions: SessionStore,
    refresh_margin: Duration,
}

impl RestPlatform {
    /// Create a client for the platform at `base_url`
    pub fn new(base_url: &str, anon_key: &str, config: &PlatformConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {e}")))?;

        let base_url = base_url.trim_end_matches('/').to_string();

        info!(base_url = %base_url, "Platform client initialized");

        Ok(Self {
            http,
            base_url,
            anon_key: anon_key.to_string(),
            sessions: SessionStore::new(),
            refresh_margin: config.refresh_margin(),
        })
    }

    /// Session store backing this client
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Attach the API key and a bearer token
    ///
    /// The bearer is the session token, refreshed first when close to expiry,
    /// else the anon key.
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let bearer = match self.get_session().await? {
            Some(session) => session.access_token,
            None => self.anon_key.clone(),
        };

        Ok(self.authorize_with(request, &bearer))
    }

    fn authorize_with(&self, request: RequestBuilder, bearer: &str) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status, &body))
    }

    async fn token_request(&self, grant_type: &str, body: Value) -> Result<Session> {
        let request = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let response = self.send(self.authorize_with(request, &self.anon_key)).await?;

        let session: Session = response.json().await?;
        Ok(session.with_resolved_expiry())
    }

    /// Exchange the refresh token for a new session
    ///
    /// A refresh token the platform rejects ends the session: it is cleared,
    /// listeners see `SignedOut` and `None` is returned.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<Option<Session>> {
        let Some(current) = self.sessions.current() else {
            return Ok(None);
        };

        let refreshed = self
            .token_request(
                "refresh_token",
                serde_json::json!({ "refresh_token": current.refresh_token }),
            )
            .await;

        let session = match refreshed {
            Ok(session) => session,
            Err(GatewayError::Platform {
                status, message, ..
            }) if (400..500).contains(&status) => {
                warn!(status, error = %message, "Refresh token rejected, signing out");
                self.sessions.set(AuthChangeEvent::SignedOut, None);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        debug!(user_id = %session.user.id, "Session refreshed");
        self.sessions
            .set(AuthChangeEvent::TokenRefreshed, Some(session.clone()));

        Ok(Some(session))
    }
}

#[async_trait]
impl Platform for RestPlatform {
    async fn get_session(&self) -> Result<Option<Session>> {
        match self.sessions.current() {
            Some(session) if session.expires_within(self.refresh_margin) => {
                self.refresh_session().await
            }
            current => Ok(current),
        }
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        self.sessions.subscribe(listener)
    }

    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>> {
        let session = self
            .token_request(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;

        info!(user_id = %session.user.id, "Signed in");
        self.sessions
            .set(AuthChangeEvent::SignedIn, Some(session.clone()));

        Ok(Some(session))
    }

    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let request = self
            .http
            .post(self.auth_url("signup"))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let response = self.send(self.authorize_with(request, &self.anon_key)).await?;
        let body: Value = response.json().await?;

        // Without auto-confirm the platform answers with the bare user
        if body.get("access_token").is_none() {
            info!("Signed up, confirmation pending");
            return Ok(None);
        }

        let session = serde_json::from_value::<Session>(body)
            .map_err(|e| GatewayError::Decode(e.to_string()))?
            .with_resolved_expiry();

        info!(user_id = %session.user.id, "Signed up");
        self.sessions
            .set(AuthChangeEvent::SignedIn, Some(session.clone()));

        Ok(Some(session))
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.sessions.current() {
            let request = self.http.post(self.auth_url("logout"));
            match self
                .send(self.authorize_with(request, &session.access_token))
                .await
            {
                Ok(_) => {}
                // The session is already gone on the platform side
                Err(GatewayError::Platform { status, .. })
                    if matches!(status, 401 | 403 | 404) =>
                {
                    warn!(status, "Session already invalid during sign out");
                }
                Err(e) => return Err(e),
            }
        }

        self.sessions.set(AuthChangeEvent::SignedOut, None);
        info!("Signed out");
        Ok(())
    }

    #[instrument(skip(self, file, options), fields(size_bytes = file.data.len()))]
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        file: &UploadFile,
        options: &UploadOptions,
    ) -> Result<()> {
        let request = self
            .http
            .post(self.storage_url(&format!("object/{}/{}", bucket, encode_path(path))))
            .header("cache-control", format!("max-age={}", options.cache_control_secs))
            .header("content-type", &options.content_type)
            .header("x-upsert", options.upsert.to_string())
            .body(file.data.clone());

        self.send(self.authorize(request).await?).await?;

        debug!(bucket = %bucket, path = %path, "Object uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.storage_url(&format!("object/public/{}/{}", bucket, encode_path(path)))
    }

    #[instrument(skip(self))]
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let request = self
            .http
            .delete(self.storage_url(&format!("object/{}", bucket)))
            .json(&serde_json::json!({ "prefixes": paths }));

        self.send(self.authorize(request).await?).await?;

        debug!(bucket = %bucket, count = paths.len(), "Objects removed");
        Ok(())
    }

    #[instrument(skip(self, row))]
    async fn upsert(&self, table: &str, row: Value) -> Result<()> {
        let request = self
            .http
            .post(self.rest_url(table))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);

        self.send(self.authorize(request).await?).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>> {
        let request = self
            .http
            .get(self.rest_url(table))
            .query(&select_params(query));

        let response = self.send(self.authorize(request).await?).await?;
        let rows: Vec<Value> = response.json().await?;

        debug!(table = %table, rows = rows.len(), "Rows selected");
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        let request = self
            .http
            .delete(self.rest_url(table))
            .query(&filter_params(filters));

        self.send(self.authorize(request).await?).await?;
        Ok(())
    }
}

/// Percent-encode each segment of an object path, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
        .collect()
}

fn select_params(query: &RowQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(&query.filters));

    if let Some(ref order) = query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }

    params
}

/// Map an error response into a [`GatewayError::Platform`]
///
/// Auth answers with `msg` or `error_description`, the table API with
/// `message`, storage with `message` and `error`.
fn error_from_body(status: StatusCode, body: &str) -> GatewayError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let field = |keys: &[&str]| -> Option<String> {
        let value = parsed.as_ref()?;
        keys.iter()
            .find_map(|k| value.get(*k).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    let message = field(&["msg", "message", "error_description", "error"])
        .or_else(|| {
            let raw = body.trim();
            (!raw.is_empty() && parsed.is_none()).then(|| raw.to_string())
        })
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));

    GatewayError::Platform {
        status: status.as_u16(),
        code: field(&["error_code", "code", "error"]),
        message,
    }
}
