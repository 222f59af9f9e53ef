use reqwest::{Client, Response, StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    config::with_trailing_slash,
    documents::Document,
    domain::BoardError,
    session::{SESSION_COOKIE, Session, cookie_value},
};

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Dashboard side of the relay. Holds no credentials of its own; every call
/// takes the [`Session`] explicitly.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: with_trailing_slash(base_url.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, BoardError> {
        let url = format!("{}login", self.base_url);
        debug!("Logging in through {url}");
        let response = self
            .http
            .post(&url)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        let response = check(response).await?;

        let session_id = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| cookie_value(v, SESSION_COOKIE))
            .map(str::to_string);
        let body: TokenBody = response.json().await?;

        info!("Logged in as {username}");
        let mut session = Session::new(body.token);
        session.session_id = session_id;
        Ok(session)
    }

    pub async fn fetch_documents(&self, session: &Session) -> Result<Vec<Document>, BoardError> {
        let url = format!("{}documents", self.base_url);
        debug!("Fetching documents from {url}");
        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, session.authorization())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let documents: Vec<Document> = check(response).await?.json().await?;
        info!("Fetched {} documents", documents.len());
        Ok(documents)
    }

    /// Best effort; the local session is dropped regardless.
    pub async fn logout(&self, session: &Session) -> Result<(), BoardError> {
        let url = format!("{}logout", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, session.authorization())
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, BoardError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());
    warn!("Relay answered {status}: {message}");

    Err(match status {
        StatusCode::UNAUTHORIZED => BoardError::Authentication,
        StatusCode::BAD_REQUEST => BoardError::MissingCredentials(message),
        _ => BoardError::Upstream(message),
    })
}
