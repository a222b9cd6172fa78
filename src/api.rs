use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http status {0}")]
    Status(u16),
    #[error("transport: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status(404))
    }
}

/// The back-end seam. The engine only ever sees these four reads; tests and
/// the host install either the blocking HTTP client or a canned stub.
pub trait ApiClient {
    fn fetch_student(&self, id: &str) -> Result<serde_json::Value, ApiError>;
    fn fetch_company(&self, id: &str) -> Result<serde_json::Value, ApiError>;
    fn fetch_class(&self, id: &str) -> Result<serde_json::Value, ApiError>;
    fn fetch_attendance(
        &self,
        student_id: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<serde_json::Value, ApiError>;
}

pub fn student_path(id: &str) -> String {
    format!("/api/users/{}", id)
}

pub fn company_path(id: &str) -> String {
    format!("/api/companies/{}", id)
}

pub fn class_path(id: &str) -> String {
    format!("/api/classes/{}", id)
}

pub fn attendance_path(student_id: &str, start_date: Option<&str>, end_date: Option<&str>) -> String {
    format!(
        "/api/students/{}/attendance?start_date={}&end_date={}",
        student_id,
        start_date.unwrap_or(""),
        end_date.unwrap_or("")
    )
}

pub struct HttpApiClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn get_json(&self, path_and_query: &str) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        resp.json::<serde_json::Value>()
            .map_err(|e| ApiError::Transport(e.to_string()))
    }
}

impl ApiClient for HttpApiClient {
    fn fetch_student(&self, id: &str) -> Result<serde_json::Value, ApiError> {
        self.get_json(&student_path(id))
    }

    fn fetch_company(&self, id: &str) -> Result<serde_json::Value, ApiError> {
        self.get_json(&company_path(id))
    }

    fn fetch_class(&self, id: &str) -> Result<serde_json::Value, ApiError> {
        self.get_json(&class_path(id))
    }

    fn fetch_attendance(
        &self,
        student_id: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        self.get_json(&attendance_path(student_id, start_date, end_date))
    }
}

/// Canned responses keyed by exact path-and-query. A route value is either
/// the body itself or `{"status": N, "body": ...}`; missing routes resolve
/// to a 404.
pub struct StubApiClient {
    routes: HashMap<String, serde_json::Value>,
}

impl StubApiClient {
    pub fn from_routes(routes: &serde_json::Value) -> Result<Self, String> {
        let Some(map) = routes.as_object() else {
            return Err("routes must be an object".to_string());
        };
        Ok(Self {
            routes: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
    }

    fn lookup(&self, key: &str) -> Result<serde_json::Value, ApiError> {
        let Some(entry) = self.routes.get(key) else {
            return Err(ApiError::Status(404));
        };
        if let Some(obj) = entry.as_object() {
            if let Some(status) = obj.get("status").and_then(|v| v.as_u64()) {
                if !(200..300).contains(&status) {
                    return Err(ApiError::Status(status as u16));
                }
                return Ok(obj.get("body").cloned().unwrap_or(serde_json::Value::Null));
            }
        }
        Ok(entry.clone())
    }
}

impl ApiClient for StubApiClient {
    fn fetch_student(&self, id: &str) -> Result<serde_json::Value, ApiError> {
        self.lookup(&student_path(id))
    }

    fn fetch_company(&self, id: &str) -> Result<serde_json::Value, ApiError> {
        self.lookup(&company_path(id))
    }

    fn fetch_class(&self, id: &str) -> Result<serde_json::Value, ApiError> {
        self.lookup(&class_path(id))
    }

    fn fetch_attendance(
        &self,
        student_id: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        self.lookup(&attendance_path(student_id, start_date, end_date))
    }
}
