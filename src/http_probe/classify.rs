use regex::Regex;

use crate::config::model::ProbeConfig;

use super::result::{Exchange, FailureKind};

/// Single-digit outcome understood by the downstream alerting layer without
/// string parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// Reachable, expected status, expected content.
    Success,
    /// Status accepted but the body did not match the configured pattern.
    StringMismatch,
    /// A response arrived but its body could not be read.
    MissingBody,
    /// The server could not be reached at all.
    ConnectionFailed,
    /// No complete response within the configured window.
    Timeout,
    /// The response status differed from the expected one.
    StatusMismatch,
}

impl ResultCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultCode::Success => "0",
            ResultCode::StringMismatch => "1",
            ResultCode::MissingBody => "2",
            ResultCode::ConnectionFailed => "3",
            ResultCode::Timeout => "4",
            ResultCode::StatusMismatch => "6",
        }
    }
}

/// Everything the metric formatter needs about one classified exchange.
#[derive(Debug, Clone)]
pub struct Classification {
    pub result: ResultCode,
    pub status_code_match: bool,
    pub string_match: bool,
    /// `None` when the exchange produced no response; the formatter emits
    /// the 408 stand-in status in that case.
    pub http_status: Option<u16>,
    pub content_length: usize,
    pub duration_seconds: f64,
    /// Header-derived tags in configuration order. Absent headers are
    /// omitted entirely, never emitted as empty tags.
    pub header_tags: Vec<(String, String)>,
}

/// Derives a classification from one exchange and the probe configuration.
pub fn classify(exchange: &Exchange, config: &ProbeConfig) -> Classification {
    let status_code_match = match_response_code(exchange, config.response_status_code);
    let string_match = match_response_string(exchange, config.response_string_match.as_deref());

    let result = match exchange {
        Exchange::Failure {
            kind: FailureKind::Connection,
            ..
        } => ResultCode::ConnectionFailed,
        Exchange::Failure {
            kind: FailureKind::Timeout,
            ..
        } => ResultCode::Timeout,
        Exchange::Response(response) if response.body.is_none() => ResultCode::MissingBody,
        _ if !status_code_match => ResultCode::StatusMismatch,
        _ if !string_match => ResultCode::StringMismatch,
        _ => ResultCode::Success,
    };

    let (http_status, content_length) = match exchange {
        Exchange::Response(response) => (
            Some(response.status),
            response.body.as_ref().map(String::len).unwrap_or(0),
        ),
        Exchange::Failure { .. } => (None, 0),
    };

    // Configured header names are matched against the lowercased names the
    // transport recorded, case-sensitively as configured.
    let header_tags = match (exchange, config.http_header_tags.as_ref()) {
        (Exchange::Response(response), Some(tags)) => tags
            .iter()
            .filter_map(|(header, tag)| {
                response
                    .headers
                    .get(header)
                    .map(|value| (tag.clone(), value.clone()))
            })
            .collect(),
        _ => Vec::new(),
    };

    Classification {
        result,
        status_code_match,
        string_match,
        http_status,
        content_length,
        duration_seconds: exchange.elapsed_seconds(),
        header_tags,
    }
}

/// No expectation always passes. Failed exchanges pass only against an
/// expected 408; successful ones must match exactly.
fn match_response_code(exchange: &Exchange, expected: Option<u16>) -> bool {
    let expected = match expected {
        None | Some(0) => return true,
        Some(code) => code,
    };
    match exchange {
        Exchange::Failure { .. } => expected == 408,
        Exchange::Response(response) => response.status == expected,
    }
}

/// No pattern always passes. A failed exchange or a missing/empty body never
/// matches; otherwise the pattern is searched for anywhere in the body.
fn match_response_string(exchange: &Exchange, pattern: Option<&str>) -> bool {
    let pattern = match pattern {
        None | Some("") => return true,
        Some(pattern) => pattern,
    };
    let body = match exchange {
        Exchange::Failure { .. } => return false,
        Exchange::Response(response) => match response.body.as_deref() {
            None | Some("") => return false,
            Some(body) => body,
        },
    };
    match Regex::new(pattern) {
        Ok(regex) => regex.is_match(body),
        Err(err) => {
            log::warn!("unusable response_string_match pattern: {err}");
            false
        }
    }
}

#[cfg(test)]
pub mod test {
    use indexmap::IndexMap;

    use crate::http_probe::result::ProbeResponse;

    use super::*;

    fn base_config() -> ProbeConfig {
        serde_json::from_str(
            r#"{
                "urls": ["https://intranet.example.com/health"],
                "username": "CORP\\svc-probe",
                "password": "hunter2"
            }"#,
        )
        .expect("invalid config JSON")
    }

    fn response(status: u16, body: Option<&str>) -> Exchange {
        Exchange::Response(ProbeResponse {
            status,
            headers: IndexMap::new(),
            body: body.map(str::to_string),
            elapsed_seconds: 0.25,
        })
    }

    fn response_with_headers(status: u16, headers: &[(&str, &str)]) -> Exchange {
        Exchange::Response(ProbeResponse {
            status,
            headers: headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            body: Some("ok".to_string()),
            elapsed_seconds: 0.25,
        })
    }

    fn failure(kind: FailureKind) -> Exchange {
        Exchange::Failure {
            kind,
            elapsed_seconds: 0.25,
        }
    }

    #[test]
    fn test_clean_success_is_result_zero() {
        let config = base_config();
        let classification = classify(&response(200, Some("all good")), &config);

        assert_eq!(classification.result, ResultCode::Success);
        assert!(classification.status_code_match);
        assert!(classification.string_match);
        assert_eq!(classification.http_status, Some(200));
        assert_eq!(classification.content_length, 8);
        assert_eq!(classification.duration_seconds, 0.25);
    }

    #[test]
    fn test_unset_or_zero_expected_status_always_matches() {
        for expected in [None, Some(0)] {
            let mut config = base_config();
            config.response_status_code = expected;

            for exchange in [
                response(500, Some("oops")),
                failure(FailureKind::Timeout),
                failure(FailureKind::Connection),
            ] {
                assert!(classify(&exchange, &config).status_code_match);
            }
        }
    }

    #[test]
    fn test_failures_match_only_an_expected_408() {
        let mut config = base_config();
        config.response_status_code = Some(408);
        assert!(classify(&failure(FailureKind::Timeout), &config).status_code_match);
        assert!(classify(&failure(FailureKind::Connection), &config).status_code_match);

        config.response_status_code = Some(404);
        assert!(!classify(&failure(FailureKind::Timeout), &config).status_code_match);
    }

    #[test]
    fn test_status_mismatch_is_result_six() {
        let mut config = base_config();
        config.response_status_code = Some(404);

        let classification = classify(&response(200, Some("found after all")), &config);
        assert!(!classification.status_code_match);
        assert_eq!(classification.result, ResultCode::StatusMismatch);
    }

    #[test]
    fn test_timeout_is_result_four() {
        let config = base_config();
        let classification = classify(&failure(FailureKind::Timeout), &config);

        assert_eq!(classification.result, ResultCode::Timeout);
        assert_eq!(classification.http_status, None);
        assert_eq!(classification.content_length, 0);
        assert!(classification.header_tags.is_empty());
    }

    #[test]
    fn test_connection_failure_is_result_three() {
        let config = base_config();
        let classification = classify(&failure(FailureKind::Connection), &config);
        assert_eq!(classification.result, ResultCode::ConnectionFailed);
    }

    #[test]
    fn test_missing_body_wins_over_status_mismatch() {
        let mut config = base_config();
        config.response_status_code = Some(200);

        let classification = classify(&response(500, None), &config);
        assert_eq!(classification.result, ResultCode::MissingBody);
        assert_eq!(classification.content_length, 0);
    }

    #[test]
    fn test_string_match_searches_the_body() {
        let mut config = base_config();
        config.response_string_match = Some("OK".to_string());

        let matched = classify(&response(200, Some("system OK")), &config);
        assert!(matched.string_match);
        assert_eq!(matched.result, ResultCode::Success);

        let mismatched = classify(&response(200, Some("system DOWN")), &config);
        assert!(!mismatched.string_match);
        assert_eq!(mismatched.result, ResultCode::StringMismatch);
    }

    #[test]
    fn test_empty_pattern_always_matches() {
        for pattern in [None, Some(String::new())] {
            let mut config = base_config();
            config.response_string_match = pattern;

            assert!(classify(&response(200, Some("anything")), &config).string_match);
            assert!(classify(&failure(FailureKind::Connection), &config).string_match);
        }
    }

    #[test]
    fn test_pattern_never_matches_empty_or_missing_bodies() {
        let mut config = base_config();
        config.response_string_match = Some("OK".to_string());

        assert!(!classify(&response(200, Some("")), &config).string_match);
        assert!(!classify(&response(200, None), &config).string_match);
        assert!(!classify(&failure(FailureKind::Timeout), &config).string_match);
    }

    #[test]
    fn test_header_tags_follow_configuration_order() {
        let mut config = base_config();
        let mut tags = IndexMap::new();
        tags.insert("x-region".to_string(), "region".to_string());
        tags.insert("x-env".to_string(), "env".to_string());
        tags.insert("x-absent".to_string(), "absent".to_string());
        config.http_header_tags = Some(tags);

        let exchange = response_with_headers(200, &[("x-env", "prod"), ("x-region", "eu-west")]);
        let classification = classify(&exchange, &config);

        assert_eq!(
            classification.header_tags,
            vec![
                ("region".to_string(), "eu-west".to_string()),
                ("env".to_string(), "prod".to_string()),
            ]
        );
    }

    #[test]
    fn test_header_tag_lookup_is_case_sensitive_as_configured() {
        let mut config = base_config();
        let mut tags = IndexMap::new();
        tags.insert("X-Env".to_string(), "env".to_string());
        config.http_header_tags = Some(tags);

        // The transport records lowercased header names, so a mixed-case
        // configured key never matches.
        let exchange = response_with_headers(200, &[("x-env", "prod")]);
        assert!(classify(&exchange, &config).header_tags.is_empty());
    }
}
