use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

const APP_USER_AGENT: &str = "ModSync/0.1.0";

/// Default timeout for hosting-service requests, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub fn build_http_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}
