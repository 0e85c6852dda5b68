use crate::error::ApiError;
use anyhow::{Context, Result};
use reqwest::Method;
use reqwest::blocking::{Client, Response, multipart};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

/// Every endpoint lives under this prefix on the configured host.
pub const API_PREFIX: &str = "/api/v3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Central HTTP client for the HEPIC API. All fields are set at construction
/// and never mutated, so a single client serves the whole invocation.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    token: String,
    http: Client,
}

impl ApiClient {
    /// Creates a client for `host`, appending the `/api/v3` prefix.
    pub fn new(host: &str, token: &str) -> Result<Self> {
        let base = format!("{}{}", host.trim_end_matches('/'), API_PREFIX);
        Self::with_base(&base, token)
    }

    /// Creates a client against an explicit base URL, with no prefix added.
    pub fn with_base(base_url: &str, token: &str) -> Result<Self> {
        reqwest::Url::parse(base_url).context("parsing base URL")?;
        let http = Client::builder()
            .user_agent(HeaderValue::from_static("hepctl/0.1"))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        })
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.perform(Method::GET, path, Option::<&()>::None)
    }

    pub fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        self.perform(Method::POST, path, body)
    }

    pub fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        self.perform(Method::PUT, path, body)
    }

    pub fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.perform(Method::DELETE, path, Option::<&()>::None)
    }

    /// GET that hands back the unconsumed response body, for binary payloads
    /// such as PCAP captures. The caller owns the response; dropping it
    /// releases the connection even when nothing was read.
    pub fn get_raw(&self, path: &str) -> Result<Response> {
        self.dispatch(Method::GET, path, Option::<&()>::None)
    }

    /// POST variant of [`ApiClient::get_raw`].
    pub fn post_raw<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<Response> {
        self.dispatch(Method::POST, path, body)
    }

    /// Uploads a local file as `multipart/form-data` under `field`, using the
    /// file's base name, and decodes the JSON response.
    pub fn post_form_file<T: DeserializeOwned>(
        &self,
        path: &str,
        field: &str,
        file: &Path,
    ) -> Result<T> {
        let form = multipart::Form::new()
            .file(field.to_string(), file)
            .with_context(|| format!("reading {}", file.display()))?;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, file = %file.display(), "uploading file");

        let response = self
            .http
            .post(&url)
            .header("Auth-Token", &self.token)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .multipart(form)
            .send()
            .with_context(|| format!("request to {url} failed"))?;

        if response.status().as_u16() >= 400 {
            return Err(parse_error(response).into());
        }
        decode_body(response)
    }

    fn perform<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let response = self.dispatch(method, path, body)?;
        decode_body(response)
    }

    /// Single request-construction path shared by every body mode: header
    /// injection, dispatch, and error classification.
    fn dispatch<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "sending request");

        let mut request = self
            .http
            .request(method, &url)
            .header("Auth-Token", &self.token)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        tracing::debug!(status = %response.status(), "response received");

        if response.status().as_u16() >= 400 {
            return Err(parse_error(response).into());
        }
        Ok(response)
    }
}

fn decode_body<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().context("reading response body")?;
    // A handful of endpoints answer 2xx with an empty body.
    let text = if text.is_empty() { "null" } else { &text };
    serde_json::from_str(text).context("decoding response body")
}

/// Builds an [`ApiError`] from a status >= 400 response. Missing or
/// unparsable body fields fall back to the HTTP status line.
fn parse_error(response: Response) -> ApiError {
    let status = response.status();
    let reason = status
        .canonical_reason()
        .unwrap_or("Unknown Status")
        .to_string();
    let body = response.text().unwrap_or_default();

    match serde_json::from_str::<ApiError>(&body) {
        Ok(mut err) => {
            if err.status_code == 0 {
                err.status_code = status.as_u16();
            }
            if err.error_text.is_empty() {
                err.error_text = reason;
            }
            err
        }
        Err(_) => ApiError {
            status_code: status.as_u16(),
            error_text: reason,
            message: "failed to parse error response".into(),
        },
    }
}
