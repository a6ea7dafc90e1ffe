use std::str::FromStr;
use std::time::Duration;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use url::Url;

/// The probe configuration for one run.
/// Loaded once from the JSON document given on the command line and shared
/// read-only by every probe task.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// The URLs to probe. Every URL is probed concurrently and produces one
    /// metric line.
    pub urls: Vec<String>,

    /// An optional proxy applied to every request. An empty string is
    /// treated the same as an absent value.
    pub http_proxy: Option<String>,

    /// Response deadline in milliseconds for the whole exchange, handshake
    /// included. `0` or absent waits indefinitely.
    pub response_timeout: Option<u64>,

    /// The HTTP verb to use. Defaults to GET.
    pub method: Option<HttpMethod>,

    /// NTLM account in `DOMAIN\user` form.
    pub username: String,

    /// NTLM password.
    pub password: String,

    /// An optional request payload, sent on every request.
    pub body: Option<String>,

    /// A regular expression searched for in response bodies. Empty or absent
    /// disables the check.
    pub response_string_match: Option<String>,

    /// The expected HTTP status code. `0` or absent disables the check.
    pub response_status_code: Option<u16>,

    /// Extra request headers, sent on every request.
    pub headers: Option<IndexMap<String, String>>,

    /// Maps response header names to output tag names. Tags are emitted in
    /// this order, and only when the header is present in the response.
    pub http_header_tags: Option<IndexMap<String, String>>,
}

impl ProbeConfig {
    pub fn method(&self) -> HttpMethod {
        self.method.unwrap_or(HttpMethod::Get)
    }

    pub fn http_proxy(&self) -> Option<&str> {
        self.http_proxy.as_deref().filter(|proxy| !proxy.is_empty())
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        match self.response_timeout {
            None | Some(0) => None,
            Some(millis) => Some(Duration::from_millis(millis)),
        }
    }

    /// Checks everything that should fail before the first request goes out.
    pub fn validate(&self) -> Result<(), String> {
        if self.urls.is_empty() {
            return Err("config must list at least one URL".to_string());
        }
        for url in &self.urls {
            Url::parse(url).map_err(|err| format!("invalid URL {url:?}: {err}"))?;
        }
        if !self.username.contains('\\') {
            return Err(format!(
                "username {:?} is not in DOMAIN\\user form",
                self.username
            ));
        }
        if let Some(pattern) = self.response_string_match.as_deref() {
            if !pattern.is_empty() {
                Regex::new(pattern)
                    .map_err(|err| format!("invalid response_string_match: {err}"))?;
            }
        }
        if let Some(proxy) = self.http_proxy() {
            Url::parse(proxy).map_err(|err| format!("invalid http_proxy {proxy:?}: {err}"))?;
        }
        Ok(())
    }
}

/// The closed set of HTTP verbs a probe may be configured with. Parsed
/// case-insensitively; anything outside the set is rejected at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Delete,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Purge,
    Link,
    Unlink,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Purge => "PURGE",
            HttpMethod::Link => "LINK",
            HttpMethod::Unlink => "UNLINK",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            other => reqwest::Method::from_bytes(other.as_str().as_bytes())
                .expect("verb set contains only valid method tokens"),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "PURGE" => Ok(HttpMethod::Purge),
            "LINK" => Ok(HttpMethod::Link),
            "UNLINK" => Ok(HttpMethod::Unlink),
            other => Err(format!("unsupported HTTP method: {other:?}")),
        }
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// NTLM credentials, derived once from the configured `DOMAIN\user` pair and
/// shared read-only by every probe.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub domain: String,
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Splits `username` on the first backslash. A username without a domain
    /// separator is a configuration error, reported before any probing.
    pub fn from_config(config: &ProbeConfig) -> Result<Self, String> {
        let (domain, user) = config.username.split_once('\\').ok_or_else(|| {
            format!("username {:?} is not in DOMAIN\\user form", config.username)
        })?;
        Ok(Self {
            domain: domain.to_string(),
            user: user.to_string(),
            password: config.password.clone(),
        })
    }
}
