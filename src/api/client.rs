//! HTTP client for the Aplite backend.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::*;
use super::{AdminApi, DirectoryApi, OnboardingApi};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::onboarding::model::{FormationDocType, LocalFile, OnboardingState};

/// Header carrying the admin key on review endpoints.
const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// Backend client: one per process, cheap to share behind an `Arc`.
pub struct ApliteClient {
    base_url: String,
    token: Option<SecretString>,
    admin_key: Option<SecretString>,
    client: reqwest::Client,
}

impl ApliteClient {
    /// Build a client from configuration.
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::RequestFailed {
                endpoint: config.api_url.clone(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            admin_key: config.admin_key.clone(),
            client,
        })
    }

    /// Client with default settings pointed at `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            admin_key: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_admin_key(mut self, admin_key: SecretString) -> Self {
        self.admin_key = Some(admin_key);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn user_request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    fn admin_request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let key = self.admin_key.as_ref().ok_or(ApiError::MissingAdminKey)?;
        Ok(self
            .client
            .request(method, self.url(path))
            .header(ADMIN_KEY_HEADER, key.expose_secret()))
    }

    /// Send and turn non-2xx responses into `ApiError::Status`.
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let resp = request.send().await.map_err(|e| ApiError::RequestFailed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        if status.is_success() {
            debug!(endpoint, status = status.as_u16(), "Backend request ok");
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let detail = error_detail(&body);
        warn!(endpoint, status = status.as_u16(), detail = %detail, "Backend request failed");
        Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            detail,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let resp = self.send(endpoint, request).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Pull a readable message out of an error body.
///
/// The backend answers `{"detail": "..."}`, or `{"detail": [{"msg": ...}]}`
/// for validation failures.
pub fn error_detail(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().chars().take(200).collect();
    };
    match value.get("detail") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    }
}

fn file_part(file: &LocalFile) -> Result<Part, ApiError> {
    file.check_uploadable().map_err(ApiError::InvalidUpload)?;
    Part::bytes(file.bytes.clone())
        .file_name(file.file_name.clone())
        .mime_str(&file.content_type)
        .map_err(|e| ApiError::InvalidUpload(e.to_string()))
}

#[async_trait]
impl OnboardingApi for ApliteClient {
    async fn current_onboarding(&self) -> SessionLookup {
        let endpoint = "/onboarding/current";
        match self
            .send_json::<SessionSnapshot>(endpoint, self.user_request(Method::GET, endpoint))
            .await
        {
            Ok(snapshot) => SessionLookup::Found(snapshot),
            Err(ApiError::Status { status: 404, .. }) => SessionLookup::NoSession,
            Err(e) => SessionLookup::Transient(e.to_string()),
        }
    }

    async fn save_draft(&self, request: &DraftRequest) -> Result<DraftResponse, ApiError> {
        let endpoint = "/onboarding/draft";
        self.send_json(endpoint, self.user_request(Method::POST, endpoint).json(request))
            .await
    }

    async fn reset_onboarding(&self) -> Result<(), ApiError> {
        let endpoint = "/onboarding/reset";
        self.send(endpoint, self.user_request(Method::POST, endpoint))
            .await?;
        Ok(())
    }

    async fn upload_id_document(&self, file: &LocalFile) -> Result<UploadResponse, ApiError> {
        let endpoint = "/onboarding/upload-id";
        let form = Form::new().part("file", file_part(file)?);
        self.send_json(endpoint, self.user_request(Method::POST, endpoint).multipart(form))
            .await
    }

    async fn upload_formation_document(
        &self,
        file: &LocalFile,
        doc_type: FormationDocType,
    ) -> Result<UploadResponse, ApiError> {
        let endpoint = "/onboarding/upload-formation";
        let form = Form::new()
            .text("doc_type", doc_type.as_str())
            .part("file", file_part(file)?);
        self.send_json(endpoint, self.user_request(Method::POST, endpoint).multipart(form))
            .await
    }

    async fn complete_onboarding(
        &self,
        payload: &CompletePayload,
        id_file: Option<&LocalFile>,
    ) -> Result<CompleteResponse, ApiError> {
        let endpoint = "/onboarding/complete";
        let mut form = Form::new().text("data", serde_json::to_string(payload)?);
        if let Some(file) = id_file {
            form = form.part("file", file_part(file)?);
        }
        self.send_json(endpoint, self.user_request(Method::POST, endpoint).multipart(form))
            .await
    }

    async fn onboarding_status(&self) -> Result<OnboardingState, ApiError> {
        let endpoint = "/api/profile/details";
        let details: ProfileDetails = self
            .send_json(endpoint, self.user_request(Method::GET, endpoint))
            .await?;
        Ok(details.onboarding_status)
    }
}

#[async_trait]
impl AdminApi for ApliteClient {
    async fn list_queue(&self) -> Result<Vec<QueueItem>, ApiError> {
        let endpoint = "/api/admin/verification/queue";
        self.send_json(endpoint, self.admin_request(Method::GET, endpoint)?)
            .await
    }

    async fn session_detail(&self, session_id: Uuid) -> Result<SessionDetail, ApiError> {
        let endpoint = format!("/api/admin/verification/{session_id}");
        self.send_json(&endpoint, self.admin_request(Method::GET, &endpoint)?)
            .await
    }

    async fn approve(&self, session_id: Uuid) -> Result<ReviewDecision, ApiError> {
        let endpoint = format!("/api/admin/verification/{session_id}/approve");
        self.send_json(&endpoint, self.admin_request(Method::POST, &endpoint)?)
            .await
    }

    async fn reject(&self, session_id: Uuid, reason: &str) -> Result<ReviewDecision, ApiError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Rejection reason required".to_string(),
            ));
        }
        let endpoint = format!("/api/admin/verification/{session_id}/reject");
        let body = serde_json::json!({ "reason": reason });
        self.send_json(
            &endpoint,
            self.admin_request(Method::POST, &endpoint)?.json(&body),
        )
        .await
    }

    async fn fetch_file(&self, file_id: &str) -> Result<FileDownload, ApiError> {
        if file_id.is_empty() || !file_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ApiError::InvalidRequest(format!("Invalid file id {file_id:?}")));
        }
        let endpoint = format!("/api/admin/verification/file/{file_id}");
        let resp = self
            .send(&endpoint, self.admin_request(Method::GET, &endpoint)?)
            .await?;

        let headers = resp.headers();
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let filename = headers
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition);

        let bytes = resp.bytes().await.map_err(|e| ApiError::InvalidResponse {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        Ok(FileDownload {
            bytes: bytes.to_vec(),
            content_type,
            filename,
        })
    }
}

#[async_trait]
impl DirectoryApi for ApliteClient {
    async fn list_clients(&self, query: &ClientQuery) -> Result<Vec<PublicClient>, ApiError> {
        query.check().map_err(ApiError::InvalidRequest)?;
        let endpoint = "/api/public/clients";
        let request = self.client.get(self.url(endpoint)).query(query);
        self.send_json(endpoint, request).await
    }
}

/// `inline; filename="id.pdf"` → `id.pdf`.
fn filename_from_disposition(value: &str) -> Option<String> {
    value.split(';').find_map(|part| {
        let name = part.trim().strip_prefix("filename=")?;
        let name = name.trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}
