// src/api/client.rs
//! HTTP transport for the Notion API.
//!
//! `RemoteSource` is the seam the loader depends on; `NotionHttpClient` is
//! the reqwest-backed implementation. The client handles authentication,
//! raw request/response mechanics and error-body decoding — no pagination
//! or business logic lives here.

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde_json::{json, Value};

use crate::constants::{API_BASE_URL, NOTION_API_PAGE_SIZE, NOTION_VERSION};
use crate::error::{AppError, NotionErrorCode};

/// The ability to reach the remote content API.
///
/// The loader and driver depend on this trait, never on HTTP details, so
/// tests inject an in-memory workspace instead of a network.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// One page of "children of block/page `id`" results.
    async fn list_children(&self, id: &str, cursor: Option<&str>) -> Result<Value, AppError>;

    /// One page of database query results, optionally filtered.
    async fn query_database(
        &self,
        database_id: &str,
        filter: Option<&Value>,
        cursor: Option<&str>,
    ) -> Result<Value, AppError>;

    /// A single page object, without children.
    async fn retrieve_page(&self, page_id: &str) -> Result<Value, AppError>;

    /// Writes one property on a page, returning the updated page object.
    async fn update_property(
        &self,
        page_id: &str,
        key: &str,
        value: &Value,
    ) -> Result<Value, AppError>;
}

/// A thin wrapper around a reqwest `Client` with Notion auth installed.
#[derive(Clone)]
pub struct NotionHttpClient {
    client: Client,
}

impl NotionHttpClient {
    /// Creates a client with the auth and version headers set once.
    pub fn new(token: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .default_headers(Self::create_headers(token)?)
            .build()?;
        Ok(Self { client })
    }

    fn create_headers(token: &str) -> Result<header::HeaderMap, AppError> {
        let mut headers = header::HeaderMap::new();

        let auth_header = format!("Bearer {}", token);
        let mut auth_value = header::HeaderValue::from_str(&auth_header)
            .map_err(|e| AppError::Configuration(format!("Invalid API token format: {}", e)))?;
        auth_value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth_value);

        headers.insert(
            "Notion-Version",
            header::HeaderValue::from_static(NOTION_VERSION),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        Ok(headers)
    }

    async fn get(&self, endpoint: &str) -> Result<Value, AppError> {
        let url = format!("{}/{}", API_BASE_URL, endpoint);
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, endpoint))?;
        Self::decode_response(response, endpoint).await
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, AppError> {
        let url = format!("{}/{}", API_BASE_URL, endpoint);
        log::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, endpoint))?;
        Self::decode_response(response, endpoint).await
    }

    async fn patch(&self, endpoint: &str, body: &Value) -> Result<Value, AppError> {
        let url = format!("{}/{}", API_BASE_URL, endpoint);
        log::debug!("PATCH {}", url);
        let response = self
            .client
            .patch(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, endpoint))?;
        Self::decode_response(response, endpoint).await
    }

    fn map_send_error(err: reqwest::Error, endpoint: &str) -> AppError {
        if err.is_timeout() {
            AppError::RequestTimeout(endpoint.to_string())
        } else {
            AppError::Network(err)
        }
    }

    /// Decodes a response into JSON, mapping error statuses to the typed
    /// error vocabulary. A `retry-after` header is carried through so the
    /// retry loop can honor the server's delay.
    async fn decode_response(response: Response, endpoint: &str) -> Result<Value, AppError> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let body = response
            .text()
            .await
            .map_err(|e| Self::map_send_error(e, endpoint))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                AppError::MalformedResponse(format!("{}: invalid JSON body: {}", endpoint, e))
            });
        }

        // Error bodies look like {"object":"error","code":"…","message":"…"}.
        let (code, message) = match serde_json::from_str::<Value>(&body) {
            Ok(error_body) => {
                let code = error_body
                    .get("code")
                    .and_then(Value::as_str)
                    .map(NotionErrorCode::from_api_response)
                    .unwrap_or_else(|| NotionErrorCode::from_http_status(status.as_u16()));
                let message = error_body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("no message")
                    .to_string();
                (code, message)
            }
            Err(_) => (
                NotionErrorCode::from_http_status(status.as_u16()),
                format!("HTTP {} from {}", status, endpoint),
            ),
        };

        Err(AppError::NotionService {
            code,
            message,
            retry_after,
        })
    }
}

#[async_trait]
impl RemoteSource for NotionHttpClient {
    async fn list_children(&self, id: &str, cursor: Option<&str>) -> Result<Value, AppError> {
        let mut endpoint = format!("blocks/{}/children?page_size={}", id, NOTION_API_PAGE_SIZE);
        if let Some(cursor) = cursor {
            endpoint.push_str(&format!("&start_cursor={}", cursor));
        }
        self.get(&endpoint).await
    }

    async fn query_database(
        &self,
        database_id: &str,
        filter: Option<&Value>,
        cursor: Option<&str>,
    ) -> Result<Value, AppError> {
        let mut body = json!({ "page_size": NOTION_API_PAGE_SIZE });
        if let Some(filter) = filter {
            body["filter"] = filter.clone();
        }
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        self.post(&format!("databases/{}/query", database_id), &body)
            .await
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Value, AppError> {
        self.get(&format!("pages/{}", page_id)).await
    }

    async fn update_property(
        &self,
        page_id: &str,
        key: &str,
        value: &Value,
    ) -> Result<Value, AppError> {
        let body = json!({ "properties": { key: value } });
        self.patch(&format!("pages/{}", page_id), &body).await
    }
}

/// Builds the rich_text property payload for a slug back-write.
pub fn rich_text_property_payload(value: &str, url: Option<&str>) -> Value {
    let link = url.map(|u| json!({ "url": u }));
    json!({
        "type": "rich_text",
        "rich_text": [{
            "type": "text",
            "text": { "content": value, "link": link },
            "annotations": {
                "bold": false,
                "italic": false,
                "strikethrough": false,
                "underline": false,
                "code": false,
                "color": "default"
            }
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_payload_is_a_single_plain_run() {
        let payload = rich_text_property_payload("hello-world", None);
        assert_eq!(payload["type"], "rich_text");
        assert_eq!(payload["rich_text"][0]["text"]["content"], "hello-world");
        assert_eq!(payload["rich_text"][0]["text"]["link"], Value::Null);
    }

    #[test]
    fn slug_payload_carries_link_when_given() {
        let payload = rich_text_property_payload("post", Some("https://example.com/post"));
        assert_eq!(
            payload["rich_text"][0]["text"]["link"]["url"],
            "https://example.com/post"
        );
    }
}
