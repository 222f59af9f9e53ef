use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

use crate::domain::{BoardConfig, BoardError};

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceAccount {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub mayan_url: String,
    pub documents_path: String,
    pub service_account: Option<ServiceAccount>,
    /// Metadata labels tried in order for the `status` filter.
    pub expiry_fields: Vec<String>,
}

impl RelayConfig {
    pub fn load() -> Result<Self, BoardError> {
        Self::load_with(|key| env::var(key).ok())
    }

    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BoardError> {
        let service_account = match (var(&lookup, "MAYAN_USERNAME"), var(&lookup, "MAYAN_PASSWORD")) {
            (Some(username), Some(password)) => Some(ServiceAccount { username, password }),
            (None, None) => None,
            _ => {
                warn!("Only one of MAYAN_USERNAME / MAYAN_PASSWORD is set, ignoring service account");
                None
            }
        };

        Ok(Self {
            port: try_load(&lookup, "RELAY_PORT", "5000")?,
            mayan_url: with_trailing_slash(try_load(&lookup, "MAYAN_URL", "http://localhost/api/v4/")?),
            documents_path: try_load(&lookup, "MAYAN_DOCUMENTS_PATH", "documents_with_metadata/")?,
            service_account,
            expiry_fields: expiry_fields(&lookup),
        })
    }
}

/// `RELAY_EXPIRY_FIELDS` is a comma separated list of metadata labels.
fn expiry_fields(lookup: &impl Fn(&str) -> Option<String>) -> Vec<String> {
    let fields: Vec<String> = var(lookup, "RELAY_EXPIRY_FIELDS")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    if fields.is_empty() {
        let defaults = BoardConfig::default().expiry_fields;
        info!("RELAY_EXPIRY_FIELDS not set, using default: {}", defaults.join(","));
        defaults
    } else {
        fields
    }
}

pub fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

fn var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, BoardError>
where
    T::Err: Display,
{
    var(lookup, key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| BoardError::Config(format!("Invalid {key} value: {e}")))
}
