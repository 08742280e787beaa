pub mod chat_api;

use std::sync::Arc;

use crate::domain::models::BackendBox;
use crate::domain::models::ChatEndpoint;

pub struct BackendManager {}

impl BackendManager {
    pub fn get(endpoint: ChatEndpoint) -> BackendBox {
        tracing::debug!(endpoint = %endpoint, "Using chat API backend");
        let backend = chat_api::ChatApi::default();
        return Arc::new(backend.with_endpoint(endpoint));
    }
}
