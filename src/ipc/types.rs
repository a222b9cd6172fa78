use serde::Deserialize;

use crate::api::ApiClient;
use crate::modal::ModalEngine;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub engine: Option<ModalEngine>,
    pub api: Option<Box<dyn ApiClient>>,
    pub backend_label: Option<&'static str>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            engine: None,
            api: None,
            backend_label: None,
        }
    }

    pub fn install_http_backend(&mut self, base_url: &str) -> Result<(), crate::api::ApiError> {
        let client = crate::api::HttpApiClient::new(base_url)?;
        self.api = Some(Box::new(client));
        self.backend_label = Some("http");
        Ok(())
    }
}
