use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use kubrick_core::{Config, JobId, MediaFile};
use log::info;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Proxy};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::api::models::{
    ChatRequest, ChatResponse, ProcessVideoRequest, ProcessVideoResponse, RemoteTaskStatus,
    ResetMemoryResponse, TaskStatusResponse, UploadVideoResponse,
};
use crate::client_trait::KubrickApi;
use crate::error::ApiError;
use crate::utils::http_utils::{ensure_success, log_response, read_json};
use crate::utils::media_file_name;

/// reqwest-backed implementation of [`KubrickApi`].
///
/// JSON endpoints go through the middleware stack (with retries only when
/// `max_retries > 0`). Uploads use the plain client because multipart bodies
/// cannot be replayed.
#[derive(Debug, Clone)]
pub struct KubrickClient {
    base_url: String,
    http: Client,
    json: ClientWithMiddleware,
}

impl KubrickClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = Self::build_http_client(config)?;
        let json = Self::build_json_client(http.clone(), config.max_retries);
        Ok(Self {
            base_url: config.api_base().to_string(),
            http,
            json,
        })
    }

    fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
        let mut builder = Client::builder().default_headers(Self::default_headers());
        if !config.http_proxy.is_empty() {
            builder = builder.proxy(Proxy::http(&config.http_proxy)?);
        }
        if !config.https_proxy.is_empty() {
            builder = builder.proxy(Proxy::https(&config.https_proxy)?);
        }
        builder.build()
    }

    fn build_json_client(client: Client, max_retries: u32) -> ClientWithMiddleware {
        if max_retries == 0 {
            return ClientBuilder::new(client).build();
        }
        let retry_policy = ExponentialBackoff::builder()
            .base(2)
            .build_with_max_retries(max_retries);

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Playback URL for a clip path returned by `/chat`.
    pub fn media_url(&self, clip_path: &str) -> String {
        self.endpoint(&format!("/media/{}", media_file_name(clip_path)))
    }
}

#[async_trait]
impl KubrickApi for KubrickClient {
    async fn upload_video(&self, file: &MediaFile) -> Result<String, ApiError> {
        let url = self.endpoint("/upload-video");
        let part = Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())?;
        let form = Form::new().part("file", part);

        info!("Uploading {} ({} bytes) to {}", file.name(), file.len(), url);
        let started = Instant::now();
        let sent = self.http.post(&url).multipart(form).send().await;
        let response = log_response(&url, started, sent.map_err(ApiError::from))?;

        let body: UploadVideoResponse = read_json(&url, response).await?;
        body.video_path.ok_or(ApiError::MissingField {
            endpoint: url,
            field: "video_path",
        })
    }

    async fn process_video(&self, video_path: &str) -> Result<JobId, ApiError> {
        let url = self.endpoint("/process-video");
        info!("Requesting processing of {}", video_path);
        let started = Instant::now();
        let sent = self
            .json
            .post(&url)
            .json(&ProcessVideoRequest { video_path })
            .send()
            .await;
        let response = log_response(&url, started, sent.map_err(ApiError::from))?;

        let body: ProcessVideoResponse = read_json(&url, response).await?;
        Ok(JobId::new(body.task_id))
    }

    async fn task_status(&self, job_id: &JobId) -> Result<RemoteTaskStatus, ApiError> {
        let url = self.endpoint(&format!("/task-status/{}", job_id));
        let started = Instant::now();
        let sent = self.json.get(&url).send().await;
        let response = log_response(&url, started, sent.map_err(ApiError::from))?;

        let body: TaskStatusResponse = read_json(&url, response).await?;
        Ok(body.status)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let url = self.endpoint("/chat");
        info!(
            "Sending chat message (image: {}, video: {})",
            request.image_base64.is_some(),
            request.video_path.as_deref().unwrap_or("none")
        );
        let started = Instant::now();
        let sent = self.json.post(&url).json(request).send().await;
        let response = log_response(&url, started, sent.map_err(ApiError::from))?;

        read_json(&url, response).await
    }

    async fn fetch_media(&self, name: &str) -> Result<Bytes, ApiError> {
        let url = self.media_url(name);
        let started = Instant::now();
        let sent = self.json.get(&url).send().await;
        let response = log_response(&url, started, sent.map_err(ApiError::from))?;

        let response = ensure_success(&url, response).await?;
        Ok(response.bytes().await?)
    }

    async fn reset_memory(&self) -> Result<String, ApiError> {
        let url = self.endpoint("/reset-memory");
        let started = Instant::now();
        let sent = self.json.post(&url).send().await;
        let response = log_response(&url, started, sent.map_err(ApiError::from))?;

        let body: ResetMemoryResponse = read_json(&url, response).await?;
        Ok(body.message)
    }
}
