use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use std::pin::Pin;

use crate::error::{StreamError, TransportError};
use crate::payload::RequestPayload;

/// Default base URL of the server exposing `/api/chat`.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000";

/// Response body as it arrives from the network. `None` from the stream is end-of-stream.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Issues the chat request and hands back the streaming body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &RequestPayload) -> Result<BodyStream, TransportError>;
}

/// `POST {base_url}/api/chat` over reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &RequestPayload) -> Result<BodyStream, TransportError> {
        let url = self.chat_url();

        tracing::debug!(%url, model = %payload.model, "posting chat request");

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body: text });
        }

        if status == StatusCode::NO_CONTENT {
            return Err(TransportError::NoBody);
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(StreamError::from));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> RequestPayload {
        RequestPayload::new("You are terse.", "Say hi", "gpt-4.1-nano", "sk-test")
    }

    async fn collect(mut body: BodyStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk.expect("chunk"));
        }
        out
    }

    #[test]
    fn test_chat_url() {
        let transport = HttpTransport::new("http://localhost:3000/");
        assert_eq!(transport.chat_url(), "http://localhost:3000/api/chat");
        assert_eq!(transport.base_url(), "http://localhost:3000/");
    }

    #[tokio::test]
    async fn test_posts_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "developer_message": "You are terse.",
                "user_message": "Say hi",
                "model": "gpt-4.1-nano",
                "api_key": "sk-test",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("Hi!"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&server.uri());
        let body = transport.send(&payload()).await.expect("send");
        assert_eq!(collect(body).await, b"Hi!");
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&server.uri());
        let err = transport.send(&payload()).await.err().expect("error");
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_content_is_missing_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&server.uri());
        let err = transport.send(&payload()).await.err().expect("error");
        assert!(matches!(err, TransportError::NoBody));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(&format!("http://{}", addr));
        let err = transport.send(&payload()).await.err().expect("error");
        assert!(matches!(err, TransportError::Request(_)));
        assert!(err.to_string().starts_with("Request failed"));
    }
}
