use indexmap::IndexMap;

/// One complete attempt to reach a target URL, successful or failed.
#[derive(Debug)]
pub enum Exchange {
    Response(ProbeResponse),
    Failure {
        kind: FailureKind,
        elapsed_seconds: f64,
    },
}

impl Exchange {
    pub fn elapsed_seconds(&self) -> f64 {
        match self {
            Exchange::Response(response) => response.elapsed_seconds,
            Exchange::Failure {
                elapsed_seconds, ..
            } => *elapsed_seconds,
        }
    }
}

#[derive(Debug)]
pub struct ProbeResponse {
    pub status: u16,
    /// Response headers with lowercased names; the first value wins for
    /// repeated headers.
    pub headers: IndexMap<String, String>,
    /// `None` when the response completed but the body could not be read.
    pub body: Option<String>,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No complete response within the configured window.
    Timeout,
    /// DNS, connect, or TLS failure before any response arrived.
    Connection,
}
