use std::fmt::Write;

use crate::http_probe::classify::Classification;

use super::{MEASUREMENT, NO_RESPONSE_STATUS};

/// Renders one line protocol record for a classified exchange.
///
/// The shape reproduces what the downstream collector was built against:
/// the field section opens with a space and then a comma, failed exchanges
/// emit `content_length=0` without the integer suffix while keeping it on
/// `http_response_code=408i`, and tag values and URLs are written unescaped.
pub fn format_line(
    url: &str,
    method: &str,
    classification: &Classification,
    now_millis: i64,
) -> String {
    let mut line = String::new();
    let status_tag = classification.http_status.unwrap_or(NO_RESPONSE_STATUS);

    let _ = write!(
        line,
        "{MEASUREMENT},method={},server={url},status_code={status_tag},result={}",
        method.to_lowercase(),
        classification.result.as_str(),
    );
    for (tag, value) in &classification.header_tags {
        let _ = write!(line, ",{tag}={value}");
    }

    line.push(' ');
    match classification.http_status {
        Some(status) => {
            let _ = write!(
                line,
                ",content_length={}i,http_response_code={status}i",
                classification.content_length
            );
        }
        None => {
            let _ = write!(
                line,
                ",content_length=0,http_response_code={NO_RESPONSE_STATUS}i"
            );
        }
    }
    let _ = write!(
        line,
        ",response_time={},response_status_code_match={},response_string_match={} {now_millis}",
        classification.duration_seconds,
        flag(classification.status_code_match),
        flag(classification.string_match),
    );

    line
}

fn flag(matched: bool) -> &'static str {
    if matched { "1" } else { "0" }
}
