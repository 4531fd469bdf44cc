use std::collections::HashMap;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppError, AppResult, AppState};

/// A verified identity, as produced by the external session service.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub active: bool,
}

/// Narrow contract over the external session store: maps an opaque bearer
/// credential to a principal, or `None` when the credential is unknown.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> AppResult<Option<Principal>>;
}

/// Production resolver: asks the session service over HTTP.
pub struct HttpSessions {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct SessionData {
    user_id: Uuid,
    email: String,
    #[serde(default)]
    is_active: bool,
}

#[async_trait]
impl SessionResolver for HttpSessions {
    async fn resolve(&self, token: &str) -> AppResult<Option<Principal>> {
        let resp = self
            .client
            .get(format!("{}/sessions/{token}", self.base_url))
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let data: SessionData = resp
            .error_for_status()
            .map_err(anyhow::Error::from)?
            .json()
            .await
            .map_err(anyhow::Error::from)?;

        Ok(Some(Principal {
            user_id: data.user_id,
            email: data.email,
            active: data.is_active,
        }))
    }
}

/// Fixed token table, for tests and local development.
#[derive(Default, Clone)]
pub struct StaticSessions {
    sessions: HashMap<String, Principal>,
}

impl StaticSessions {
    pub fn with(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.sessions.insert(token.into(), principal);
        self
    }
}

#[async_trait]
impl SessionResolver for StaticSessions {
    async fn resolve(&self, token: &str) -> AppResult<Option<Principal>> {
        Ok(self.sessions.get(token).cloned())
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let mut parts = header?.splitn(2, ' ');
    let scheme = parts.next()?;
    let token = parts.next()?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = extract_bearer(header).ok_or(AppError::NotAuthenticated)?;

        match state.sessions.resolve(token).await? {
            Some(principal) if principal.active => Ok(principal),
            _ => Err(AppError::SessionExpired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(Some("bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(Some("Basic abc")), None);
        assert_eq!(extract_bearer(Some("Bearer")), None);
        assert_eq!(extract_bearer(None), None);
    }

    #[tokio::test]
    async fn static_sessions_resolve() {
        let sessions = StaticSessions::default().with(
            "tok",
            Principal {
                user_id: Uuid::now_v7(),
                email: "a@example.com".to_owned(),
                active: true,
            },
        );
        assert!(sessions.resolve("tok").await.unwrap().is_some());
        assert!(sessions.resolve("nope").await.unwrap().is_none());
    }
}
