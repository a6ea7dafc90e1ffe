use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{AUTHORIZATION, HeaderMap, WWW_AUTHENTICATE};
use reqwest::{Client, Method, Proxy, RequestBuilder, Response, StatusCode};

use crate::config::model::Credentials;

const WORKSTATION: &str = "WORKSTATION";

/// An HTTP client that negotiates NTLM authentication transparently.
///
/// NTLM authenticates the underlying connection rather than the request, so
/// the client is pinned to HTTP/1.1 with a single pooled connection per host;
/// the handshake legs must travel over the same keep-alive socket.
pub struct NtlmTransport {
    client: Client,
    credentials: Credentials,
}

impl NtlmTransport {
    pub fn new(credentials: Credentials, proxy: Option<&str>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .http1_only()
            .pool_max_idle_per_host(1)
            .danger_accept_invalid_certs(true);
        if let Some(proxy) = proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
            credentials,
        })
    }

    /// Performs one authenticated exchange: a Type 1 negotiate request, and,
    /// when the server answers 401 with an NTLM challenge, a second request
    /// carrying the NTLMv2 Type 3 response.
    ///
    /// A server that does not solicit NTLM gets its response returned as-is;
    /// a malformed challenge is logged and the 401 flows on unchanged.
    pub async fn send(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&str>,
    ) -> Result<Response, reqwest::Error> {
        let mut first = self.request(method, url, headers, body);
        if let Some(negotiate) = negotiate_message() {
            first = first.header(AUTHORIZATION, format!("NTLM {negotiate}"));
        }
        let response = first.send().await?;

        let Some(challenge) = challenge_from(&response) else {
            return Ok(response);
        };
        let Some(authenticate) = self.authenticate_message(&challenge) else {
            return Ok(response);
        };

        self.request(method, url, headers, body)
            .header(AUTHORIZATION, format!("NTLM {authenticate}"))
            .send()
            .await
    }

    fn request(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&str>,
    ) -> RequestBuilder {
        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(headers.clone());
        if let Some(body) = body {
            request = request.body(body.to_owned());
        }
        request
    }

    /// Decodes the Type 2 challenge and derives the base64 Type 3 answer.
    fn authenticate_message(&self, challenge_b64: &str) -> Option<String> {
        let challenge_bytes = match BASE64.decode(challenge_b64) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("discarding undecodable NTLM challenge: {err}");
                return None;
            }
        };
        let message = match ntlmclient::Message::try_from(challenge_bytes.as_slice()) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("discarding malformed NTLM challenge: {err:?}");
                return None;
            }
        };
        let challenge = match message {
            ntlmclient::Message::Challenge(challenge) => challenge,
            other => {
                log::warn!("expected an NTLM challenge message, got {other:?}");
                return None;
            }
        };

        let target_info: Vec<u8> = challenge
            .target_information
            .iter()
            .flat_map(|entry| entry.to_bytes())
            .collect();
        let credentials = ntlmclient::Credentials {
            username: self.credentials.user.clone(),
            password: self.credentials.password.clone(),
            domain: self.credentials.domain.clone(),
        };
        let response = ntlmclient::respond_challenge_ntlm_v2(
            challenge.challenge,
            &target_info,
            ntlmclient::get_ntlm_time(),
            &credentials,
        );

        let flags = ntlmclient::Flags::NEGOTIATE_UNICODE
            | ntlmclient::Flags::REQUEST_TARGET
            | ntlmclient::Flags::NEGOTIATE_NTLM
            | ntlmclient::Flags::NEGOTIATE_WORKSTATION_SUPPLIED;
        match response.to_message(&credentials, WORKSTATION, flags).to_bytes() {
            Ok(bytes) => Some(BASE64.encode(bytes)),
            Err(err) => {
                log::warn!("failed to encode NTLM authenticate message: {err:?}");
                None
            }
        }
    }
}

fn negotiate_message() -> Option<String> {
    let flags = ntlmclient::Flags::NEGOTIATE_UNICODE
        | ntlmclient::Flags::REQUEST_TARGET
        | ntlmclient::Flags::NEGOTIATE_NTLM
        | ntlmclient::Flags::NEGOTIATE_WORKSTATION_SUPPLIED;
    let message = ntlmclient::Message::Negotiate(ntlmclient::NegotiateMessage {
        flags,
        supplied_domain: String::new(),
        supplied_workstation: WORKSTATION.to_owned(),
        os_version: Default::default(),
    });
    match message.to_bytes() {
        Ok(bytes) => Some(BASE64.encode(bytes)),
        Err(err) => {
            log::warn!("failed to encode NTLM negotiate message: {err:?}");
            None
        }
    }
}

fn challenge_from(response: &Response) -> Option<String> {
    if response.status() != StatusCode::UNAUTHORIZED {
        return None;
    }
    let header = response.headers().get(WWW_AUTHENTICATE)?.to_str().ok()?;
    challenge_token(header).map(str::to_string)
}

fn challenge_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("NTLM ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_challenge_token_extraction() {
        assert_eq!(challenge_token("NTLM dGVzdA=="), Some("dGVzdA=="));
        assert_eq!(challenge_token("NTLM  dGVzdA== "), Some("dGVzdA=="));
        assert_eq!(challenge_token("Basic realm=\"intranet\""), None);
        assert_eq!(challenge_token("Negotiate dGVzdA=="), None);
        assert_eq!(challenge_token("NTLM"), None);
        assert_eq!(challenge_token("NTLM "), None);
    }

    #[test]
    fn test_negotiate_message_is_stable_base64() {
        let first = negotiate_message().expect("negotiate message");
        let second = negotiate_message().expect("negotiate message");
        assert_eq!(first, second);
        assert!(BASE64.decode(&first).is_ok());
    }
}
