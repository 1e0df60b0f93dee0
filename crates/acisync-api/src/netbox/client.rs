// Async HTTP client for the NetBox REST API.
//
// Auth: `Authorization: Token <token>` default header.
// Lists are read in pages of 1000 by following the envelope's `next` link.
// GETs are retried on transient failures; writes are sent once.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use super::endpoint::Endpoint;
use super::models::{Object, Page, Status};
use crate::error::{Error, body_preview};
use crate::transport::TransportConfig;

const PAGE_LIMIT: u32 = 1000;

/// Attempts per GET, including the first.
const READ_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Async client for the NetBox REST API.
pub struct NetBoxClient {
    http: reqwest::Client,
    base_url: Url,
}

impl NetBoxClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from an API token and transport config.
    pub fn from_token(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(&format!("Token {}", token.expose_secret()))
            .map_err(|e| Error::Authentication {
                message: format!("invalid NetBox token header value: {e}"),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
        })
    }

    /// Accept `https://netbox`, `https://netbox/` or `https://netbox/api`.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/');
        let path = path.strip_suffix("/api").unwrap_or(path).to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    fn object_url(&self, endpoint: Endpoint, id: u64) -> Result<Url, Error> {
        self.url(&format!("{}{id}/", endpoint.path()))
    }

    // ── Public API ───────────────────────────────────────────────────

    /// Connectivity and auth probe.
    pub async fn status(&self) -> Result<Status, Error> {
        self.read(self.url("api/status/")?, &[]).await
    }

    /// Read every object of `endpoint` matching `filters`, across all pages.
    pub async fn list(
        &self,
        endpoint: Endpoint,
        filters: &[(&str, String)],
    ) -> Result<Vec<Object>, Error> {
        let url = self.url(endpoint.path())?;
        let mut params: Vec<(&str, String)> = filters.to_vec();
        params.push(("limit", PAGE_LIMIT.to_string()));

        let mut page: Page<Object> = self.read(url, &params).await?;
        let mut all = std::mem::take(&mut page.results);

        while let Some(next) = page.next.take() {
            page = self.read(Url::parse(&next)?, &[]).await?;
            all.append(&mut page.results);
        }

        debug!(endpoint = %endpoint, count = all.len(), "list complete");
        Ok(all)
    }

    pub async fn get(&self, endpoint: Endpoint, id: u64) -> Result<Object, Error> {
        self.read(self.object_url(endpoint, id)?, &[]).await
    }

    pub async fn create(&self, endpoint: Endpoint, body: &Map<String, Value>) -> Result<Object, Error> {
        let url = self.url(endpoint.path())?;
        debug!("POST {url}");
        let resp = self.http.post(url).json(body).send().await?;
        self.handle_response(resp).await
    }

    /// Partial update: only the fields in `body` are sent.
    pub async fn update(
        &self,
        endpoint: Endpoint,
        id: u64,
        body: &Map<String, Value>,
    ) -> Result<Object, Error> {
        let url = self.object_url(endpoint, id)?;
        debug!("PATCH {url}");
        let resp = self.http.patch(url).json(body).send().await?;
        self.handle_response(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    /// GET with retries on transient errors (timeouts, refused
    /// connections, 502-504). The delay doubles after each attempt.
    async fn read<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let mut delay = RETRY_DELAY;
        let mut attempt = 1;
        loop {
            debug!("GET {url} params={query:?}");
            let result = match self.http.get(url.clone()).query(query).send().await {
                Ok(resp) => self.handle_response(resp).await,
                Err(e) => Err(e.into()),
            };
            match result {
                Err(e) if e.is_transient() && attempt < READ_ATTEMPTS => {
                    warn!(attempt, "GET {url} failed ({e}), retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview = body_preview(&body);
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body: body.clone(),
                }
            })
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Error::Authentication {
                message: format!("NetBox rejected the API token (HTTP {status})"),
            };
        }

        let raw = resp.text().await.unwrap_or_default();
        let (message, fields) = parse_error_body(&raw);

        Error::NetBox {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| {
                if raw.is_empty() || !fields.is_empty() {
                    status.to_string()
                } else {
                    body_preview(&raw).to_owned()
                }
            }),
            fields,
        }
    }
}

/// Split a DRF error body into its `detail` message and per-field errors.
///
/// Validation failures look like `{"name": ["This field is required."]}`;
/// other failures like `{"detail": "Not found."}`.
fn parse_error_body(raw: &str) -> (Option<String>, BTreeMap<String, Vec<String>>) {
    let mut fields = BTreeMap::new();
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) else {
        return (None, fields);
    };

    let mut detail = None;
    for (key, value) in map {
        match value {
            Value::String(s) if key == "detail" => detail = Some(s),
            Value::String(s) => {
                fields.insert(key, vec![s]);
            }
            Value::Array(items) => {
                let messages = items
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect();
                fields.insert(key, messages);
            }
            other => {
                fields.insert(key, vec![other.to_string()]);
            }
        }
    }

    if detail.is_none() && !fields.is_empty() {
        let summary = fields
            .iter()
            .map(|(k, v)| format!("{k}: {}", v.join(" ")))
            .collect::<Vec<_>>()
            .join("; ");
        detail = Some(summary);
    }

    (detail, fields)
}
