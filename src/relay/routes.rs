use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
    },
    response::{AppendHeaders, IntoResponse, Response},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::{
    error::RelayError,
    mayan::{MetadataTypeInfo, WorkflowState},
    query::DocumentQuery,
    state::RelayState,
};
use crate::{
    documents::Document,
    session::{
        AUTH_COOKIE, SESSION_COOKIE, clear_cookie, cookie_value, set_cookie,
        token_from_authorization,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// The caller's token: `Authorization` header first, then the cookie.
pub fn caller_token(headers: &HeaderMap) -> Result<String, RelayError> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(token_from_authorization);
    let from_cookie = || {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| cookie_value(v, AUTH_COOKIE))
    };

    from_header
        .or_else(from_cookie)
        .map(str::to_string)
        .ok_or_else(|| RelayError::MissingCredentials("Unauthorized: missing token.".into()))
}

pub async fn login_handler(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(payload) = payload?;
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(RelayError::BadRequest(
            "Username and password are required.".into(),
        ));
    }

    let obtained = state
        .mayan
        .obtain_token(&payload.username, &payload.password)
        .await?;
    info!(username = %payload.username, "Login accepted");

    let mut cookies = vec![(SET_COOKIE, set_cookie(AUTH_COOKIE, &obtained.token))];
    if let Some(session_id) = &obtained.session_id {
        cookies.push((SET_COOKIE, set_cookie(SESSION_COOKIE, session_id)));
    }

    Ok((
        StatusCode::OK,
        AppendHeaders(cookies),
        Json(LoginResponse {
            token: obtained.token,
        }),
    )
        .into_response())
}

pub async fn logout_handler() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        AppendHeaders([
            (SET_COOKIE, clear_cookie(AUTH_COOKIE)),
            (SET_COOKIE, clear_cookie(SESSION_COOKIE)),
        ]),
    )
}

pub async fn documents_handler(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    query: Result<Query<DocumentQuery>, QueryRejection>,
) -> Result<Json<Vec<Document>>, RelayError> {
    let Query(query) = query?;
    let token = caller_token(&headers)?;
    let documents = state.mayan.documents(&token).await?;
    filtered(&state, &query, documents)
}

pub async fn workflow_documents_handler(
    State(state): State<Arc<RelayState>>,
    path: Result<Path<(u64, u64)>, PathRejection>,
    headers: HeaderMap,
    query: Result<Query<DocumentQuery>, QueryRejection>,
) -> Result<Json<Vec<Document>>, RelayError> {
    let Path((template, workflow_state)) = path?;
    let Query(query) = query?;
    let token = caller_token(&headers)?;
    let documents = state
        .mayan
        .workflow_state_documents(&token, template, workflow_state)
        .await?;
    filtered(&state, &query, documents)
}

pub async fn workflow_states_handler(
    State(state): State<Arc<RelayState>>,
    path: Result<Path<u64>, PathRejection>,
    headers: HeaderMap,
) -> Result<Json<Vec<WorkflowState>>, RelayError> {
    let Path(template) = path?;
    let token = caller_token(&headers)?;
    Ok(Json(state.mayan.workflow_states(&token, template).await?))
}

pub async fn last_state_documents_handler(
    State(state): State<Arc<RelayState>>,
    path: Result<Path<u64>, PathRejection>,
    headers: HeaderMap,
    query: Result<Query<DocumentQuery>, QueryRejection>,
) -> Result<Json<Vec<Document>>, RelayError> {
    let Path(template) = path?;
    let Query(query) = query?;
    let token = caller_token(&headers)?;
    let states = state.mayan.workflow_states(&token, template).await?;
    let Some(last) = states.iter().max_by_key(|s| s.id) else {
        info!("Workflow template {template} has no states");
        return Ok(Json(Vec::new()));
    };

    let documents = state
        .mayan
        .workflow_state_documents(&token, template, last.id)
        .await?;
    filtered(&state, &query, documents)
}

pub async fn metadata_types_handler(
    State(state): State<Arc<RelayState>>,
) -> Result<Json<Vec<MetadataTypeInfo>>, RelayError> {
    let account = state.config.service_account.as_ref().ok_or_else(|| {
        RelayError::MissingCredentials("Service account is not configured.".into())
    })?;
    let token = state.mayan.obtain_service_token(account).await?;
    Ok(Json(state.mayan.metadata_types(&token).await?))
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn filtered(
    state: &RelayState,
    query: &DocumentQuery,
    documents: Vec<Document>,
) -> Result<Json<Vec<Document>>, RelayError> {
    let today = Local::now().date_naive();
    Ok(Json(query.apply(documents, &state.expiry, today)?))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("authToken=from-cookie"));
        assert_eq!(caller_token(&headers).unwrap(), "from-header");

        headers.remove(AUTHORIZATION);
        assert_eq!(caller_token(&headers).unwrap(), "from-cookie");

        headers.remove(COOKIE);
        assert!(matches!(
            caller_token(&headers),
            Err(RelayError::MissingCredentials(_))
        ));
    }
}
