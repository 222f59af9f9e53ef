use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, error, warn};

use super::error::RelayError;
use crate::{
    config::ServiceAccount,
    documents::{Document, Listing},
    session::{cookie_value, token_header},
};

const TOKEN_PATH: &str = "auth/token/obtain/";
const METADATA_TYPES_PATH: &str = "metadata_types/";
const UPSTREAM_SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObtainedToken {
    pub token: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: u64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub completion: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataTypeInfo {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
}

/// Thin client over the Mayan EDMS REST API. Every call after login carries
/// `Authorization: Token <t>`.
#[derive(Debug, Clone)]
pub struct MayanClient {
    http: Client,
    base_url: String,
    documents_path: String,
}

impl MayanClient {
    pub fn new(base_url: impl Into<String>, documents_path: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            documents_path: documents_path.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn obtain_token(&self, username: &str, password: &str) -> Result<ObtainedToken, RelayError> {
        let url = self.url(TOKEN_PATH);
        debug!("Requesting token from {url}");

        let response = self
            .http
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&Credentials { username, password })
            .send()
            .await
            .map_err(|e| {
                error!("Token request to {url} failed: {e}");
                RelayError::Upstream("Internal server error.".into())
            })?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("Upstream rejected credentials for {username}");
                return Err(RelayError::Authentication);
            }
            status if !status.is_success() => {
                error!("Token request answered {status}");
                return Err(RelayError::Upstream("Internal server error.".into()));
            }
            _ => {}
        }

        let session_id = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| cookie_value(value, UPSTREAM_SESSION_COOKIE))
            .map(str::to_string);

        let body: TokenBody = response.json().await.map_err(|e| {
            error!("Token response was not understood: {e}");
            RelayError::Upstream("Internal server error.".into())
        })?;

        Ok(ObtainedToken {
            token: body.token,
            session_id,
        })
    }

    pub async fn obtain_service_token(&self, account: &ServiceAccount) -> Result<String, RelayError> {
        Ok(self
            .obtain_token(&account.username, &account.password)
            .await?
            .token)
    }

    pub async fn documents(&self, token: &str) -> Result<Vec<Document>, RelayError> {
        let listing: Listing<Document> = self.get(&self.documents_path, token).await?;
        Ok(listing.into_items())
    }

    pub async fn workflow_state_documents(
        &self,
        token: &str,
        template: u64,
        state: u64,
    ) -> Result<Vec<Document>, RelayError> {
        let path = format!("workflow_templates/{template}/states/{state}/documents/");
        let listing: Listing<Document> = self.get(&path, token).await?;
        Ok(listing.into_items())
    }

    pub async fn workflow_states(&self, token: &str, template: u64) -> Result<Vec<WorkflowState>, RelayError> {
        let path = format!("workflow_templates/{template}/states/");
        let listing: Listing<WorkflowState> = self.get(&path, token).await?;
        Ok(listing.into_items())
    }

    pub async fn metadata_types(&self, token: &str) -> Result<Vec<MetadataTypeInfo>, RelayError> {
        let listing: Listing<MetadataTypeInfo> = self.get(METADATA_TYPES_PATH, token).await?;
        Ok(listing.into_items())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, RelayError> {
        let url = self.url(path);
        debug!("GET {url}");
        let request = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, token_header(token))
            .header(header::ACCEPT, "application/json");
        send_json(request, &url).await
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder, url: &str) -> Result<T, RelayError> {
    let failed = || RelayError::Upstream("Failed to fetch documents from Mayan API.".into());

    let response = request.send().await.map_err(|e| {
        error!("Request to {url} failed: {e}");
        failed()
    })?;

    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!("Upstream refused the token for {url}");
            return Err(RelayError::Authentication);
        }
        status if !status.is_success() => {
            error!("{url} answered {status}");
            return Err(failed());
        }
        _ => {}
    }

    response.json().await.map_err(|e| {
        error!("Response from {url} was not understood: {e}");
        failed()
    })
}
