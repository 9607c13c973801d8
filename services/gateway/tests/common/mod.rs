//! In-memory platform used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use clipdeck_gateway::error::Result;
use clipdeck_gateway::{
    AuthChangeEvent, AuthListener, Filter, GatewayError, Platform, RowQuery, Session,
    SessionStore, Subscription, UploadFile, UploadOptions, User,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Calls observed by the platform, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SignIn(String),
    SignUp(String),
    SignOut,
    Upload(String),
    Remove(Vec<String>),
    Upsert(String),
    Select(String),
    Delete(String),
}

#[derive(Default)]
pub struct InMemoryPlatform {
    pub sessions: SessionStore,
    pub objects: Mutex<HashMap<String, UploadFile>>,
    pub rows: Mutex<Vec<Value>>,
    pub calls: Mutex<Vec<Call>>,
    pub fail_remove: Mutex<Option<GatewayError>>,
    pub password: Mutex<Option<String>>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn session_for(email: &str) -> Session {
        Session {
            access_token: format!("token-{email}"),
            refresh_token: "refresh".to_string(),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            expires_at: None,
            user: User {
                id: format!("user-{email}"),
                email: Some(email.to_string()),
            },
        }
        .with_resolved_expiry()
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    match row.get(&filter.column) {
        Some(Value::String(s)) => *s == filter.value,
        Some(other) => other.to_string() == filter.value,
        None => false,
    }
}

#[async_trait]
impl Platform for InMemoryPlatform {
    async fn get_session(&self) -> Result<Option<Session>> {
        Ok(self.sessions.current())
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        self.sessions.subscribe(listener)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Option<Session>> {
        self.record(Call::SignIn(email.to_string()));

        let expected = self.password.lock().clone();
        if expected.as_deref() != Some(password) {
            return Err(GatewayError::platform(400, "Invalid login credentials"));
        }

        let session = Self::session_for(email);
        self.sessions
            .set(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        self.record(Call::SignUp(email.to_string()));
        *self.password.lock() = Some(password.to_string());

        let session = Self::session_for(email);
        self.sessions
            .set(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<()> {
        self.record(Call::SignOut);
        self.sessions.set(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        file: &UploadFile,
        options: &UploadOptions,
    ) -> Result<()> {
        self.record(Call::Upload(path.to_string()));

        let key = format!("{bucket}/{path}");
        let mut objects = self.objects.lock();
        if objects.contains_key(&key) && !options.upsert {
            return Err(GatewayError::platform(409, "The resource already exists"));
        }
        objects.insert(key, file.clone());
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://public/{bucket}/{path}")
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        self.record(Call::Remove(paths.to_vec()));

        if let Some(err) = self.fail_remove.lock().clone() {
            return Err(err);
        }

        let mut objects = self.objects.lock();
        for path in paths {
            objects.remove(&format!("{bucket}/{path}"));
        }
        Ok(())
    }

    async fn upsert(&self, table: &str, row: Value) -> Result<()> {
        self.record(Call::Upsert(table.to_string()));

        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|r| r["id"] == row["id"]) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
        Ok(())
    }

    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>> {
        self.record(Call::Select(table.to_string()));

        let mut rows: Vec<Value> = self
            .rows
            .lock()
            .iter()
            .filter(|row| query.filters.iter().all(|f| matches(row, f)))
            .cloned()
            .collect();

        if let Some(ref order) = query.order {
            rows.sort_by(|a, b| {
                let a = a[&order.column].as_str().unwrap_or_default();
                let b = b[&order.column].as_str().unwrap_or_default();
                if order.ascending {
                    a.cmp(b)
                } else {
                    b.cmp(a)
                }
            });
        }

        Ok(rows)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        self.record(Call::Delete(table.to_string()));
        self.rows
            .lock()
            .retain(|row| !filters.iter().all(|f| matches(row, f)));
        Ok(())
    }
}
