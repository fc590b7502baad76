//! HTTP client utilities for remote operation backends.
//!
//! This crate provides a lightweight client that:
//!
//! - Constructs a `reqwest::Client` with sensible defaults
//! - Validates the configured base URL for safety
//! - Builds requests with a consistent User-Agent and Accept header, carrying
//!   the caller's [`ExecutionContext`] headers
//!
//! The primary entry point is [`ApiClient`]. Create an instance via
//! [`ApiClient::new`], and then build requests with [`ApiClient::request`].
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tether_api::ApiClient;
//! use tether_types::ExecutionContext;
//!
//! let context = ExecutionContext::bearer("token");
//! let client = ApiClient::new("https://mail.example.com/api", Duration::from_secs(30))?;
//! let response = client
//!     .request_in(&context, reqwest::Method::GET, "/accounts")
//!     .send()
//!     .await?;
//! ```

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder, header};
use tether_types::ExecutionContext;
use tracing::{debug, warn};
use url::Url;

/// Hostnames allowed for local development regardless of scheme.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]"];

/// Thin wrapper around a configured `reqwest::Client`.
///
/// Every request is resolved relative to `base_url` and carries the headers
/// of the execution context the client was built with.
#[derive(Debug, Clone)]
pub struct ApiClient {
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl ApiClient {
    /// Build a client for `base_url`.
    ///
    /// Non-localhost hosts must use HTTPS.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        validate_base_url(base_url)?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .context("build http client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            user_agent: format!("tether/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    /// Build a `reqwest::RequestBuilder` for a method and API-relative path.
    pub fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = join_url(&self.base_url, path);
        debug!(%url, %method, "building request");

        self.http.request(method, url).header(header::USER_AGENT, &self.user_agent)
    }

    /// Like [`ApiClient::request`], with the execution context's headers applied.
    ///
    /// Header values are marked sensitive so they never show up in debug output.
    pub fn request_in(&self, context: &ExecutionContext, method: reqwest::Method, path: &str) -> RequestBuilder {
        let mut builder = self.request(method, path);
        for (name, value) in context.headers() {
            match header::HeaderValue::from_str(value) {
                Ok(mut header_value) => {
                    header_value.set_sensitive(true);
                    builder = builder.header(name, header_value);
                }
                Err(error) => warn!(header = %name, %error, "skipping invalid context header"),
            }
        }
        builder
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    if path.starts_with('/') {
        format!("{base_url}{path}")
    } else {
        format!("{base_url}/{path}")
    }
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost` or a loopback address: any scheme is allowed
/// - otherwise: scheme must be HTTPS
pub fn validate_base_url(base: &str) -> Result<()> {
    let parsed_base_url = Url::parse(base).map_err(|error| anyhow!("invalid base URL '{base}': {error}"))?;

    let host_name = parsed_base_url
        .host_str()
        .ok_or_else(|| anyhow!("base URL '{base}' must include a host"))?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }

    if parsed_base_url.scheme() != "https" {
        return Err(anyhow!(
            "base URL must use https for non-localhost hosts; got '{}://'",
            parsed_base_url.scheme()
        ));
    }

    Ok(())
}
