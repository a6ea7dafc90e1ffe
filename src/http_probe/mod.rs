pub mod classify;
pub mod ntlm;
pub mod probe;
pub mod result;

pub mod prelude {
    pub use super::classify::{Classification, ResultCode, classify};
    pub use super::ntlm::NtlmTransport;
    pub use super::probe::probe_url;
    pub use super::result::{Exchange, FailureKind, ProbeResponse};
}

use std::fmt::Write;

pub(crate) fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, "\n\nCaused by: {}", src);
        err = src;
    }
    s
}
