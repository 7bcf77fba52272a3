//! HTTP client for the remote ledger endpoints (`/api/ledger`).

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;

use super::RemoteLedger;
use crate::config::LedgerConfig;
use crate::models::{CanonicalRecord, MonthKey, RemoteEntry};
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::{Error, Result};

/// Header carrying the client-minted key that lets the server drop duplicate pushes.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

const LEDGER_PATH: &str = "/api/ledger";

/// Remote ledger reached over HTTP.
///
/// The handle is passed explicitly to the sync engine; dropping it releases
/// the underlying connection pool.
#[derive(Clone)]
pub struct HttpRemoteLedger {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteLedger {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteLedger")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpRemoteLedger {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url,
            token: None,
            client,
        })
    }

    /// Build from configuration; `Ok(None)` when no remote is configured.
    pub fn from_config(config: &LedgerConfig) -> Result<Option<Self>> {
        let Some(base_url) = config.api_base_url.clone() else {
            return Ok(None);
        };
        let remote = Self::new(base_url, config.http_timeout())?
            .with_token(config.api_token.clone());
        Ok(Some(remote))
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = normalize_text_option(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}{LEDGER_PATH}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl RemoteLedger for HttpRemoteLedger {
    async fn insert(&self, entry: &RemoteEntry) -> Result<CanonicalRecord> {
        let mut request = self
            .client
            .post(self.endpoint())
            .header(ACCEPT, "application/json")
            .json(entry);
        if let Some(client_ref) = entry.client_ref {
            request = request.header(IDEMPOTENCY_KEY_HEADER, client_ref.to_string());
        }

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|error| Error::RemoteWrite(format!("request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| Error::RemoteWrite(format!("failed to read response: {error}")))?;
        if !status.is_success() {
            return Err(Error::RemoteWrite(parse_api_error(status, &body)));
        }

        parse_write_response(&body)
    }

    async fn list_month(&self, month: MonthKey) -> Result<Vec<CanonicalRecord>> {
        let request = self
            .client
            .get(self.endpoint())
            .header(ACCEPT, "application/json")
            .query(&[("date", month.date_param())]);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|error| Error::RemoteRead(format!("request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| Error::RemoteRead(format!("failed to read response: {error}")))?;
        if !status.is_success() {
            return Err(Error::RemoteRead(parse_api_error(status, &body)));
        }

        let rows = parse_read_response(&body)?;
        tracing::debug!(%month, rows = rows.len(), "Fetched remote rows");
        Ok(rows)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<CanonicalRecord>),
    One(Box<CanonicalRecord>),
}

/// Parse the write response: `{"data": row}` or `{"data": [row, ...]}`.
pub(crate) fn parse_write_response(body: &str) -> Result<CanonicalRecord> {
    let envelope: Envelope<OneOrMany> = serde_json::from_str(body)
        .map_err(|error| Error::RemoteWrite(format!("invalid response payload: {error}")))?;

    if let Some(error) = envelope.error.filter(|error| !error.is_null()) {
        return Err(Error::RemoteWrite(describe_error_value(&error)));
    }

    match envelope.data {
        Some(OneOrMany::One(row)) => Ok(*row),
        Some(OneOrMany::Many(rows)) => rows.into_iter().next().ok_or_else(|| {
            Error::RemoteWrite("response did not include the stored row".to_string())
        }),
        None => Err(Error::RemoteWrite(
            "response did not include the stored row".to_string(),
        )),
    }
}

/// Parse the read response: `{"data": [row, ...]}`.
///
/// Rows that do not decode are skipped so the rest of the month still
/// reconciles.
pub(crate) fn parse_read_response(body: &str) -> Result<Vec<CanonicalRecord>> {
    let envelope: Envelope<Vec<serde_json::Value>> = serde_json::from_str(body)
        .map_err(|error| Error::RemoteRead(format!("invalid response payload: {error}")))?;

    if let Some(error) = envelope.error.filter(|error| !error.is_null()) {
        return Err(Error::RemoteRead(describe_error_value(&error)));
    }

    let rows = envelope
        .data
        .ok_or_else(|| Error::RemoteRead("response did not include data".to_string()))?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let remote_id = row.get("id").cloned();
        match serde_json::from_value::<CanonicalRecord>(row) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(?remote_id, %error, "Skipping malformed remote row");
            }
        }
    }
    Ok(records)
}

fn describe_error_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(message) => compact_text(message),
        serde_json::Value::Object(fields) => fields
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| compact_text(&value.to_string()), compact_text),
        other => compact_text(&other.to_string()),
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<Envelope<serde_json::Value>>(body) {
        if let Some(error) = payload.error.filter(|error| !error.is_null()) {
            return format!("{} ({})", describe_error_value(&error), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("API base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryType, RemoteId};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn coffee_entry(client_ref: Option<Uuid>) -> RemoteEntry {
        RemoteEntry {
            description: "coffee".to_string(),
            amount: "4.5".parse().unwrap(),
            category: None,
            entry_type: EntryType::Expense,
            client_ref,
        }
    }

    fn stored_row() -> serde_json::Value {
        serde_json::json!({
            "id": 101,
            "description": "coffee",
            "amount": 4.5,
            "category": "餐飲",
            "type": "expense",
            "created_at": "2024-06-15T08:00:00Z",
        })
    }

    fn remote(server: &MockServer) -> HttpRemoteLedger {
        HttpRemoteLedger::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_base_url("https://ledger.example.com/ ".to_string()).unwrap(),
            "https://ledger.example.com"
        );
    }

    #[test]
    fn debug_redacts_token() {
        let remote = HttpRemoteLedger::new("https://ledger.example.com", Duration::from_secs(1))
            .unwrap()
            .with_token(Some("secret".to_string()));
        let debug = format!("{remote:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn write_response_accepts_single_row_or_array() {
        let single = serde_json::json!({ "data": stored_row() }).to_string();
        let array = serde_json::json!({ "data": [stored_row()] }).to_string();

        assert_eq!(parse_write_response(&single).unwrap().id, RemoteId(101));
        assert_eq!(parse_write_response(&array).unwrap().id, RemoteId(101));
    }

    #[test]
    fn write_response_without_row_is_a_failure() {
        for body in [r#"{"data": null}"#, r#"{"data": []}"#, "{}"] {
            let error = parse_write_response(body).unwrap_err();
            assert!(matches!(error, Error::RemoteWrite(_)), "{body}");
        }
    }

    #[test]
    fn read_response_skips_malformed_rows() {
        let mut broken = stored_row();
        broken["id"] = serde_json::json!(102);
        broken["amount"] = serde_json::Value::Null;
        let body = serde_json::json!({ "data": [stored_row(), broken] }).to_string();

        let rows = parse_read_response(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, RemoteId(101));

        let error = parse_read_response(r#"{"data": {"id": 1}}"#).unwrap_err();
        assert!(matches!(error, Error::RemoteRead(_)));
    }

    #[test]
    fn error_payloads_surface_their_message() {
        let body = r#"{"error": {"message": "duplicate key value", "code": "23505"}}"#;
        let error = parse_write_response(body).unwrap_err();
        assert_eq!(error.to_string(), "Remote write failed: duplicate key value");

        assert_eq!(
            parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error": "boom"}"#),
            "boom (500)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
    }

    #[tokio::test]
    async fn insert_posts_entry_with_idempotency_key() {
        let server = MockServer::start().await;
        let client_ref = Uuid::now_v7();

        Mock::given(method("POST"))
            .and(path("/api/ledger"))
            .and(header(IDEMPOTENCY_KEY_HEADER, client_ref.to_string().as_str()))
            .and(body_partial_json(serde_json::json!({
                "description": "coffee",
                "amount": 4.5,
                "type": "expense",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [stored_row()] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let stored = remote(&server)
            .insert(&coffee_entry(Some(client_ref)))
            .await
            .unwrap();

        assert_eq!(stored.id, RemoteId(101));
        assert_eq!(stored.category.as_deref(), Some("餐飲"));
    }

    #[tokio::test]
    async fn insert_sends_bearer_token_when_configured() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/ledger"))
            .and(header("authorization", "Bearer api-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": stored_row() })),
            )
            .expect(1)
            .mount(&server)
            .await;

        remote(&server)
            .with_token(Some("api-token".to_string()))
            .insert(&coffee_entry(None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn insert_maps_server_errors_to_remote_write() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/ledger"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({ "error": { "message": "classifier down" } })),
            )
            .mount(&server)
            .await;

        let error = remote(&server).insert(&coffee_entry(None)).await.unwrap_err();
        assert!(matches!(error, Error::RemoteWrite(ref message) if message == "classifier down (500)"));
    }

    #[tokio::test]
    async fn list_month_queries_first_day_of_month() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/ledger"))
            .and(query_param("date", "2024-06-01"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [stored_row()] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let rows = remote(&server)
            .list_month("2024-06".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, RemoteId(101));
    }

    #[tokio::test]
    async fn list_month_maps_failures_to_remote_read() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/ledger"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let error = remote(&server)
            .list_month("2024-06".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::RemoteRead(ref message) if message == "HTTP 503"));
    }
}
