use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;

pub mod config;
pub mod http_probe;
pub mod influx;

use config::model::Credentials;
use http_probe::prelude::*;
use influx::format_line;

const USAGE: &str = r#"ntlm-probe
Usage: ntlm-probe <config file>

Probes the URLs in the config file behind NTLM authentication and prints one
InfluxDB line protocol record per URL to standard output.

Sample config:

{
    "urls": [
        "https://www.google.com"
    ],
    "http_proxy": "",
    "response_timeout": 5000,
    "method": "get",
    "username": "domain\\username",
    "password": "password",
    "body": "",
    "response_string_match": "",
    "response_status_code": 0,
    "headers": {
        "Host": "github.com"
    },
    "http_header_tags": {
        "HTTP_HEADER": "TAG_NAME"
    }
}
"#;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    }

    let config = match config::load_config(&args[1]) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let credentials = match Credentials::from_config(&config) {
        Ok(credentials) => credentials,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let config = Arc::new(config);
    let mut handles = Vec::with_capacity(config.urls.len());

    for url in config.urls.clone() {
        let config = Arc::clone(&config);
        let credentials = credentials.clone();

        handles.push(tokio::spawn(async move {
            let transport = match NtlmTransport::new(credentials, config.http_proxy()) {
                Ok(transport) => transport,
                Err(err) => {
                    log::error!(
                        "skipping {url}: failed to build HTTP client: {}",
                        http_probe::report(&err)
                    );
                    return;
                }
            };

            let method = config.method();
            let exchange = probe_url(
                &transport,
                &url,
                method,
                config.headers.as_ref(),
                config.body.as_deref(),
                config.response_timeout(),
            )
            .await;

            let classification = classify(&exchange, &config);
            let line = format_line(
                &url,
                method.as_str(),
                &classification,
                Utc::now().timestamp_millis(),
            );
            println!("{line}");
        }));
    }

    for handle in handles {
        if let Err(err) = handle.await {
            log::error!("probe task failed: {err}");
        }
    }

    ExitCode::SUCCESS
}
