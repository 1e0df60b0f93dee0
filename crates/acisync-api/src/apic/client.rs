// APIC REST client
//
// Cookie-session login against `/api/aaaLogin.json`, class queries under
// `/api/class/{class}.json`, and `imdata` envelope unwrapping. APIC error
// objects embedded in the envelope become typed errors.

use std::sync::atomic::{AtomicBool, Ordering};

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::apic::models::{ImData, ManagedObject};
use crate::error::{Error, body_preview};
use crate::transport::TransportConfig;

/// Options for a class query.
#[derive(Debug, Clone, Default)]
pub struct ClassQuery {
    /// Include direct children (`rsp-subtree=children`).
    pub children: bool,
    /// Restrict results to DNs containing this fragment
    /// (`query-target-filter=wcard(<class>.dn,"<fragment>")`).
    pub dn_contains: Option<String>,
}

impl ClassQuery {
    pub fn with_children() -> Self {
        Self {
            children: true,
            dn_contains: None,
        }
    }

    /// Scope the query to one tenant's subtree.
    pub fn in_tenant(mut self, tenant: Option<&str>) -> Self {
        self.dn_contains = tenant.map(|t| format!("tn-{t}/"));
        self
    }

    fn params(&self, class: &str) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if self.children {
            params.push(("rsp-subtree", "children".to_owned()));
        }
        if let Some(ref fragment) = self.dn_contains {
            params.push((
                "query-target-filter",
                format!("wcard({class}.dn,\"{fragment}\")"),
            ));
        }
        params
    }
}

/// Async client for the APIC REST API.
pub struct ApicClient {
    http: reqwest::Client,
    base_url: Url,
    logged_in: AtomicBool,
}

impl ApicClient {
    /// Create a client for the APIC at `host`.
    ///
    /// `host` may be a bare hostname (`apic1.example.net`) or a full URL;
    /// bare hosts are reached over HTTPS. A cookie jar is attached
    /// automatically because APIC authentication is session based.
    pub fn new(host: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        let base_url = Self::normalize_base_url(host)?;
        Ok(Self {
            http,
            base_url,
            logged_in: AtomicBool::new(false),
        })
    }

    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let with_scheme = if raw.contains("://") {
            raw.to_owned()
        } else {
            format!("https://{raw}")
        };
        let mut url = Url::parse(&with_scheme)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Authenticate with username/password.
    ///
    /// On success the `APIC-cookie` session cookie lands in the client's
    /// cookie jar and is sent with every later request.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.url("api/aaaLogin.json")?;
        debug!("logging in at {url}");

        let body = json!({
            "aaaUser": {
                "attributes": {
                    "name": username,
                    "pwd": password.expose_secret(),
                }
            }
        });

        let resp = self.http.post(url).json(&body).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("APIC rejected credentials for '{username}' (HTTP {status})"),
            });
        }

        self.parse_envelope(resp).await.map_err(|e| match e {
            Error::Apic { message, .. } => Error::Authentication { message },
            other => other,
        })?;

        self.logged_in.store(true, Ordering::SeqCst);
        debug!("login successful");
        Ok(())
    }

    /// End the current session.
    pub async fn logout(&self, username: &str) -> Result<(), Error> {
        if !self.logged_in.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let url = self.url("api/aaaLogout.json")?;
        debug!("logging out at {url}");

        let body = json!({ "aaaUser": { "attributes": { "name": username } } });
        let _resp = self.http.post(url).json(&body).send().await?;
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Query every managed object of `class`.
    pub async fn query_class(
        &self,
        class: &str,
        query: &ClassQuery,
    ) -> Result<Vec<ManagedObject>, Error> {
        if !self.is_logged_in() {
            return Err(Error::NotLoggedIn);
        }

        let url = self.url(&format!("api/class/{class}.json"))?;
        let params = query.params(class);
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(&params).send().await?;
        self.parse_envelope(resp).await
    }

    /// Parse the `{ totalCount, imdata }` envelope.
    ///
    /// APIC reports failures as an `error` object inside `imdata`, usually
    /// alongside a 4xx status, so the body is inspected before the status.
    async fn parse_envelope(&self, resp: reqwest::Response) -> Result<Vec<ManagedObject>, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            self.logged_in.store(false, Ordering::SeqCst);
            return Err(Error::Authentication {
                message: format!("session rejected (HTTP {status})"),
            });
        }

        let parsed: Result<ImData, _> = serde_json::from_str(&body);

        if let Ok(ref data) = parsed {
            if let Some(err) = data.imdata.iter().find(|mo| mo.is_error()) {
                return Err(Error::Apic {
                    code: err.attr("code").unwrap_or("unknown").to_owned(),
                    message: err.attr("text").unwrap_or_default().to_owned(),
                });
            }
        }

        if !status.is_success() {
            return Err(Error::Apic {
                code: status.as_u16().to_string(),
                message: body_preview(&body).to_owned(),
            });
        }

        parsed.map(|data| data.imdata).map_err(|e| {
            let preview = body_preview(&body);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }
}
