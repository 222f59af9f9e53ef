use std::sync::Arc;

use super::mayan::MayanClient;
use crate::{config::RelayConfig, expiry::ExpiryPolicy};

pub struct RelayState {
    pub config: RelayConfig,
    pub mayan: MayanClient,
    pub expiry: ExpiryPolicy,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Arc<Self> {
        let mayan = MayanClient::new(config.mayan_url.clone(), config.documents_path.clone());
        let expiry = ExpiryPolicy::new(config.expiry_fields.clone());

        Arc::new(Self {
            config,
            mayan,
            expiry,
        })
    }
}
