//! PostgREST client (Supabase REST API).
//!
//! | Operation        | Request                                                   |
//! |------------------|-----------------------------------------------------------|
//! | `select_all`     | `GET    /rest/v1/{table}?select=*`                        |
//! | `select_limited` | `GET    /rest/v1/{table}?select=*&limit={n}`              |
//! | `delete_where`   | `DELETE /rest/v1/{table}?{column}={op}.{value}`           |
//! | `insert_batch`   | `POST   /rest/v1/{table}` with a JSON array body          |
//!
//! Deletes and inserts ask for `Prefer: return=representation`, so the
//! affected rows come back in the body and can be counted.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;

use super::{FilterOp, Record, RemoteStore};
use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};

/// PostgREST error body
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    hint: Option<String>,
}

/// HTTP client for a PostgREST endpoint
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestClient {
    /// Create a client from an explicit configuration value
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
    }

    /// Send a request and decode the returned rows
    async fn execute(&self, request: RequestBuilder) -> RemoteResult<Vec<Record>> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        parse_rows(&body)
    }
}

impl RemoteStore for RestClient {
    async fn select_all(&self, table: &str) -> RemoteResult<Vec<Record>> {
        let request = self.request(Method::GET, table).query(&[("select", "*")]);
        self.execute(request).await
    }

    async fn select_limited(&self, table: &str, limit: usize) -> RemoteResult<Vec<Record>> {
        let request = self
            .request(Method::GET, table)
            .query(&[("select", "*".to_string()), ("limit", limit.to_string())]);
        self.execute(request).await
    }

    async fn delete_where(
        &self,
        table: &str,
        column: &str,
        op: FilterOp,
        value: &str,
    ) -> RemoteResult<usize> {
        let request = self
            .request(Method::DELETE, table)
            .header("Prefer", "return=representation")
            .query(&[(column, format!("{}.{}", op.as_str(), value))]);
        Ok(self.execute(request).await?.len())
    }

    async fn insert_batch(&self, table: &str, rows: &[Record]) -> RemoteResult<usize> {
        let request = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(rows);
        Ok(self.execute(request).await?.len())
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    RemoteError::Unavailable(e.to_string())
}

/// Map a non-success response to an error kind
fn status_error(status: StatusCode, body: &str) -> RemoteError {
    let message = match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError { message, hint: Some(hint) }) => format!("{} ({})", message, hint),
        Ok(ApiError { message, hint: None }) => message,
        Err(_) if body.trim().is_empty() => {
            status.canonical_reason().unwrap_or("no details").to_string()
        }
        Err(_) => body.chars().take(500).collect(),
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::AuthFailure(message),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            RemoteError::Unavailable(format!("HTTP {}: {}", status.as_u16(), message))
        }
        _ => RemoteError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

/// Decode a JSON array of rows; an empty body counts as no rows
fn parse_rows(body: &str) -> RemoteResult<Vec<Record>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_trims_slash() {
        let config = RemoteConfig::new("https://example.supabase.co/", "k");
        let client = RestClient::new(&config).unwrap();
        assert_eq!(client.table_url("dim_date"), "https://example.supabase.co/rest/v1/dim_date");
    }

    #[test]
    fn test_auth_statuses() {
        let body = r#"{"message":"Invalid API key","hint":"Double check your Supabase `anon` or `service_role` API key."}"#;
        match status_error(StatusCode::UNAUTHORIZED, body) {
            RemoteError::AuthFailure(msg) => assert!(msg.starts_with("Invalid API key")),
            other => panic!("expected AuthFailure, got {:?}", other),
        }
        assert!(matches!(status_error(StatusCode::FORBIDDEN, ""), RemoteError::AuthFailure(_)));
    }

    #[test]
    fn test_rejected_keeps_status_and_message() {
        let body = r#"{"code":"22P02","details":null,"hint":null,"message":"invalid input syntax for type integer"}"#;
        match status_error(StatusCode::BAD_REQUEST, body) {
            RemoteError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid input syntax for type integer");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_gateway_errors_are_unavailable() {
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "down"),
            RemoteError::Unavailable(_)
        ));
    }

    #[test]
    fn test_parse_rows() {
        let body = r#"[{"date_key":20240115,"year":2024},{"date_key":20240116,"year":2024}]"#;
        let rows = parse_rows(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["date_key"], 20240115);

        assert!(parse_rows("").unwrap().is_empty());
        assert!(matches!(parse_rows("{not json"), Err(RemoteError::InvalidResponse(_))));
    }
}
