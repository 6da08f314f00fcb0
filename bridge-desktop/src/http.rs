//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartForm, MultipartPart},
};
use core_async::io::BoxedReader;
use futures_util::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - rustls TLS
/// - Multipart uploads and streamed downloads
///
/// Each request is attempted once; transport failures surface as
/// [`BridgeError::Network`] so the caller can decide whether to retry.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        // Long polls hold a request open for up to a minute.
        Self::with_timeout(Duration::from_secs(120))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("telecloud/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    fn convert_form(form: MultipartForm) -> Result<Form> {
        let mut out = Form::new();
        for part in form.parts {
            out = match part {
                MultipartPart::Text { name, value } => out.text(name, value),
                MultipartPart::File {
                    name,
                    file_name,
                    content_type,
                    length,
                    reader,
                } => {
                    let body = Body::wrap_stream(ReaderStream::new(reader));
                    let mut file_part =
                        Part::stream_with_length(body, length).file_name(file_name);
                    if let Some(content_type) = content_type {
                        file_part = file_part.mime_str(&content_type).map_err(|e| {
                            BridgeError::OperationFailed(format!("Invalid content type: {}", e))
                        })?;
                    }
                    out.part(name, file_part)
                }
            };
        }
        Ok(out)
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: HttpRequest) -> Result<reqwest::RequestBuilder> {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        if let Some(form) = request.multipart {
            req = req.multipart(Self::convert_form(form)?);
        } else if let Some(body) = request.body {
            req = req.body(body);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        Ok(req)
    }

    /// Error text never carries the URL, since bot URLs embed the token.
    fn map_send_error(e: reqwest::Error) -> BridgeError {
        let e = e.without_url();
        if e.is_builder() {
            BridgeError::OperationFailed(e.to_string())
        } else if e.is_timeout() {
            BridgeError::Network(format!("Request timed out: {}", e))
        } else if e.is_connect() {
            BridgeError::Network(format!("Connection failed: {}", e))
        } else {
            BridgeError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        let req_builder = self.build_request(request)?;

        let response = req_builder.send().await.map_err(|e| {
            let error = Self::map_send_error(e);
            warn!(path = %redact_url(&url), error = %error, "HTTP request failed");
            error
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response.bytes().await.map_err(Self::map_send_error)?;

        debug!(status, size = body.len(), path = %redact_url(&url), "HTTP request completed");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn download_stream(&self, url: String) -> Result<BoxedReader> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Api {
                status: status.as_u16(),
                message: format!("Download failed: {}", status),
            });
        }

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(stream);

        Ok(Box::new(reader))
    }
}

/// Drop the credential-bearing part of a bot API URL before logging it.
fn redact_url(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((_, method)) => format!(".../{}", method),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: &'static [u8]) -> BoxedReader {
        Box::new(std::io::Cursor::new(data))
    }

    #[test]
    fn test_http_client_creation() {
        assert!(ReqwestHttpClient::new().is_ok());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Post),
            reqwest::Method::POST
        );
    }

    #[test]
    fn test_convert_form_rejects_bad_mime() {
        let form = MultipartForm::new().file(
            "document",
            "a.bin",
            Some("not a mime".to_string()),
            1,
            reader(b"x"),
        );
        assert!(ReqwestHttpClient::convert_form(form).is_err());
    }

    #[tokio::test]
    async fn test_streamed_file_part_keeps_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, vec![7u8; 4096]).await.unwrap();
        let file = tokio::fs::File::open(&path).await.unwrap();

        let form = MultipartForm::new()
            .text("chat_id", "-100")
            .file("video", "clip.mp4", None, 4096, Box::new(file));
        let form = ReqwestHttpClient::convert_form(form).unwrap();

        assert!(!form.boundary().is_empty());
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://api.telegram.org/bot123:secret/getUpdates"),
            ".../getUpdates"
        );
    }
}
