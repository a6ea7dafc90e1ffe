pub mod line;

pub use line::format_line;

/// Measurement name shared by every emitted record.
pub const MEASUREMENT: &str = "ntlm_response";

/// Stand-in status for exchanges that produced no response.
pub const NO_RESPONSE_STATUS: u16 = 408;
