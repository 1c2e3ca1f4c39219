//! HTTP client for the session API.
//!
//! Used by the console when it runs against `rv serve` instead of opening the
//! database itself. The base URL comes from `RV_API`
//! (default: `http://127.0.0.1:8000/api/v1`).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::DEFAULT_API_URL;
use crate::models::*;
use crate::orchestrator::{SessionStore, StoreError};

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error: {0}")]
    Server(String),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    /// Handle response, converting HTTP errors to ClientError.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(error_for(status, response).await)
        }
    }

    /// Handle response that may return empty body (204 No Content).
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<(), ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(error_for(status, response).await)
        }
    }

    // ============================================================
    // Target operations
    // ============================================================

    pub async fn random_target(&self) -> Result<Target, ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/targets/random")
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn get_target(&self, id: &str) -> Result<Target, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/targets/{}", id))
            .send()
            .await?;
        self.handle_response(response).await
    }

    // ============================================================
    // Session operations
    // ============================================================

    pub async fn create_session(&self, target_id: &str) -> Result<Session, ClientError> {
        let input = CreateSessionInput {
            target_id: target_id.to_string(),
        };
        let response = self
            .request(reqwest::Method::POST, "/sessions")
            .json(&input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn get_session(&self, id: i64) -> Result<Session, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/sessions/{}", id))
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn list_sessions(&self, unfinished_only: bool) -> Result<Vec<Session>, ClientError> {
        let mut request = self.request(reqwest::Method::GET, "/sessions");
        if unfinished_only {
            request = request.query(&[("status", "unfinished")]);
        }
        let response = request.send().await?;
        self.handle_response(response).await
    }

    pub async fn unfinished_session(&self) -> Result<Option<Session>, ClientError> {
        let response = self
            .request(reqwest::Method::GET, "/sessions/unfinished")
            .send()
            .await?;
        match self.handle_response(response).await {
            Ok(session) => Ok(Some(session)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn append_note(&self, id: i64, stage: u8, text: &str) -> Result<(), ClientError> {
        let input = AppendNoteInput {
            stage,
            text: text.to_string(),
        };
        let response = self
            .request(reqwest::Method::POST, &format!("/sessions/{}/note", id))
            .json(&input)
            .send()
            .await?;
        self.handle_empty_response(response).await
    }

    pub async fn finish_session(&self, id: i64) -> Result<FinishStatus, ClientError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/sessions/{}/finish", id))
            .send()
            .await?;
        let body: FinishResponse = self.handle_response(response).await?;
        Ok(body.status)
    }
}

async fn error_for(status: StatusCode, response: reqwest::Response) -> ClientError {
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(body),
        StatusCode::BAD_REQUEST => ClientError::BadRequest(body),
        _ => ClientError::Server(format!("{}: {}", status, body)),
    }
}

#[async_trait]
impl SessionStore for ApiClient {
    async fn find_unfinished_session(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.unfinished_session().await?)
    }

    async fn new_target(&self) -> Result<Target, StoreError> {
        Ok(self.random_target().await?)
    }

    async fn create_session(&self, target_id: &str) -> Result<Session, StoreError> {
        Ok(ApiClient::create_session(self, target_id).await?)
    }

    async fn load_session(&self, id: i64) -> Result<Session, StoreError> {
        match ApiClient::get_session(self, id).await {
            Ok(session) => Ok(session),
            Err(ClientError::NotFound(_)) => Err(StoreError::SessionNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn append_note(&self, id: i64, stage: u8, text: &str) -> Result<(), StoreError> {
        match ApiClient::append_note(self, id, stage, text).await {
            Ok(()) => Ok(()),
            Err(ClientError::NotFound(_)) => Err(StoreError::SessionNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn lock_and_score(&self, id: i64) -> Result<FinishStatus, StoreError> {
        Ok(self.finish_session(id).await?)
    }
}
