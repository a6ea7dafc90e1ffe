use std::time::{Duration, Instant};

use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::model::HttpMethod;

use super::ntlm::NtlmTransport;
use super::report;
use super::result::{Exchange, FailureKind, ProbeResponse};

/// Runs one authenticated exchange against `url` and measures it.
///
/// The whole exchange, NTLM handshake legs and body read included, runs
/// inside the timeout window when one is configured; no window means the
/// probe waits indefinitely. Expected failures (timeout, unreachable server)
/// come back as `Exchange::Failure`, never as an error.
pub async fn probe_url(
    transport: &NtlmTransport,
    url: &str,
    method: HttpMethod,
    headers: Option<&IndexMap<String, String>>,
    body: Option<&str>,
    timeout: Option<Duration>,
) -> Exchange {
    let method = method.to_reqwest();
    let headers = build_header_map(headers);
    let start = Instant::now();

    let outcome = match timeout {
        Some(window) => {
            match tokio::time::timeout(window, exchange(transport, &method, url, &headers, body))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Exchange::Failure {
                        kind: FailureKind::Timeout,
                        elapsed_seconds: start.elapsed().as_secs_f64(),
                    };
                }
            }
        }
        None => exchange(transport, &method, url, &headers, body).await,
    };
    let elapsed_seconds = start.elapsed().as_secs_f64();

    match outcome {
        Ok((status, headers, body)) => Exchange::Response(ProbeResponse {
            status,
            headers,
            body,
            elapsed_seconds,
        }),
        Err(err) => {
            let kind = if err.is_timeout() {
                FailureKind::Timeout
            } else {
                FailureKind::Connection
            };
            log::debug!("probe of {url} failed: {}", report(&err));
            Exchange::Failure {
                kind,
                elapsed_seconds,
            }
        }
    }
}

async fn exchange(
    transport: &NtlmTransport,
    method: &reqwest::Method,
    url: &str,
    headers: &HeaderMap,
    body: Option<&str>,
) -> Result<(u16, IndexMap<String, String>, Option<String>), reqwest::Error> {
    let response = transport.send(method, url, headers, body).await?;
    let status = response.status().as_u16();

    let mut response_headers = IndexMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            response_headers
                .entry(name.as_str().to_string())
                .or_insert_with(|| value.to_string());
        }
    }

    let body = match response.text().await {
        Ok(text) => Some(text),
        Err(err) => {
            log::warn!("failed to read response body from {url}: {err}");
            None
        }
    };

    Ok((status, response_headers, body))
}

fn build_header_map(headers: Option<&IndexMap<String, String>>) -> HeaderMap {
    let mut map = HeaderMap::new();
    let Some(headers) = headers else {
        return map;
    };
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => log::warn!("skipping invalid request header {name:?}"),
        }
    }
    map
}
