//! HTTP Transport
//!
//! Form-POST transport seam between the service and the provider's token
//! endpoint, injectable so tests never touch the network.

use async_trait::async_trait;
use base64::Engine;
use secrecy::ExposeSecret;
use std::collections::HashMap;

use crate::error::TokenServiceError;
use crate::types::ClientCredentials;

/// A form-encoded POST to the provider.
#[derive(Clone, Debug)]
pub struct FormRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    /// `application/x-www-form-urlencoded` body.
    pub body: String,
}

/// Provider response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport interface (for dependency injection).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a form-encoded POST and return the raw response.
    async fn post_form(&self, request: FormRequest) -> Result<HttpResponse, TokenServiceError>;
}

/// Percent-encode key/value pairs into a form body.
pub fn encode_form(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// HTTP Basic `Authorization` header value for the client credentials.
pub fn basic_authorization(credentials: &ClientCredentials) -> String {
    let pair = format!(
        "{}:{}",
        credentials.client_id,
        credentials.client_secret.expose_secret()
    );
    let encoded = base64::engine::general_purpose::STANDARD.encode(pair);
    format!("Basic {}", encoded)
}

/// Default reqwest-based transport.
///
/// No request timeout is applied beyond the client's own defaults; a hung
/// provider call blocks that request's resolution.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
}

impl ReqwestHttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestHttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn post_form(&self, request: FormRequest) -> Result<HttpResponse, TokenServiceError> {
        let mut builder = self.client.post(&request.url).body(request.body);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TokenServiceError::Network {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TokenServiceError::Network {
                message: e.to_string(),
            })?;

        Ok(HttpResponse { status, body })
    }
}

/// Mock transport with queued responses and request history.
#[derive(Default)]
pub struct MockHttpTransport {
    responses: std::sync::Mutex<Vec<HttpResponse>>,
    request_history: std::sync::Mutex<Vec<FormRequest>>,
}

impl MockHttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to return (FIFO).
    pub fn queue_response(&self, status: u16, body: &str) -> &Self {
        self.responses.lock().unwrap().push(HttpResponse {
            status,
            body: body.to_string(),
        });
        self
    }

    /// Queue a 200 JSON response.
    pub fn queue_json_response<T: serde::Serialize>(&self, body: &T) -> &Self {
        self.queue_response(200, &serde_json::to_string(body).unwrap())
    }

    pub fn requests(&self) -> Vec<FormRequest> {
        self.request_history.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<FormRequest> {
        self.request_history.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn post_form(&self, request: FormRequest) -> Result<HttpResponse, TokenServiceError> {
        self.request_history.lock().unwrap().push(request);

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(TokenServiceError::Network {
                message: "No mock response queued".to_string(),
            });
        }
        Ok(responses.remove(0))
    }
}
