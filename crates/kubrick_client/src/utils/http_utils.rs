use std::error::Error;
use std::time::Instant;

use log::{debug, error, info};
use reqwest::Response;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Logs the outcome of a sent request and passes the response through.
pub fn log_response(
    endpoint: &str,
    started: Instant,
    result: Result<Response, ApiError>,
) -> Result<Response, ApiError> {
    match &result {
        Ok(resp) => {
            info!(
                "Got response from {} after {:?} with status {}",
                endpoint,
                started.elapsed(),
                resp.status()
            );
            debug!("Response headers: {:?}", resp.headers());
        }
        Err(ApiError::Http(e)) => log_transport_error(endpoint, e),
        Err(ApiError::Middleware(reqwest_middleware::Error::Reqwest(e))) => {
            log_transport_error(endpoint, e)
        }
        Err(e) => error!("Failed HTTP request to {}: {}", endpoint, e),
    }
    result
}

fn log_transport_error(endpoint: &str, e: &reqwest::Error) {
    error!("Failed HTTP request to {}: {}", endpoint, e);
    if let Some(source) = e.source() {
        debug!("Error source: {:?}", source);
    }
    if e.is_timeout() {
        error!("Request timed out");
    }
    if e.is_connect() {
        error!("Connection error");
    }
    if e.is_decode() {
        error!("Decode error");
    }
}

/// Fails on non-success statuses, keeping the response body for diagnostics.
pub async fn ensure_success(endpoint: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!("{} returned {}: {}", endpoint, status, body);
    Err(ApiError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Checks the status and decodes a JSON body.
pub async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    response: Response,
) -> Result<T, ApiError> {
    let response = ensure_success(endpoint, response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        error!(
            "Failed to parse response from {}: {}, data: {}",
            endpoint,
            e,
            String::from_utf8_lossy(&bytes)
        );
        ApiError::Decode(e)
    })
}
