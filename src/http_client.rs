use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Serialize;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const AGENT: &str = concat!("pickscout/", env!("CARGO_PKG_VERSION"));

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// GET `url` and return the body, failing on any non-success status.
pub fn get_text(url: &str, extra_headers: &[(&str, &str)]) -> Result<String> {
    let mut req = http_client()?
        .get(url)
        .header(USER_AGENT, AGENT)
        .header(ACCEPT, "application/json");
    for (name, value) in extra_headers {
        req = req.header(*name, *value);
    }
    let resp = req.send().with_context(|| format!("GET {url} failed"))?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {}: {}", status, body));
    }
    Ok(body)
}

/// POST `payload` as JSON and return the response body.
pub fn post_json<T: Serialize>(url: &str, payload: &T) -> Result<String> {
    let resp = http_client()?
        .post(url)
        .header(USER_AGENT, AGENT)
        .json(payload)
        .send()
        .with_context(|| format!("POST {url} failed"))?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {}: {}", status, body));
    }
    Ok(body)
}
