// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Blocking client for the REST list endpoint.

use anyhow::{Context, Result, anyhow, bail};
use procon_app::{ListParams, Page, PaginatedFetch, PageRequest, Record};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let base_url = Url::parse(trimmed)
            .with_context(|| format!("api.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "api.base_url {trimmed:?} must use http or https, got {}",
                base_url.scheme()
            );
        }
        if base_url.cannot_be_a_base() {
            bail!("api.base_url {trimmed:?} cannot carry a path");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `{base}/{page_id}/{api}` with the list parameters on the query string.
    pub fn list_url(&self, page_id: &str, api: &str, params: &ListParams) -> Result<Url> {
        if page_id.trim().is_empty() || api.trim().is_empty() {
            bail!("page id and api name must not be empty");
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("{} cannot carry a path", self.base_url()))?
            .pop_if_empty()
            .push(page_id)
            .push(api);
        url.query_pairs_mut()
            .append_pair("queryInput", &params.query_input)
            .append_pair("sort", &params.sort)
            .append_pair("limit", &params.limit.to_string())
            .append_pair("skip", &params.skip.to_string());
        Ok(url)
    }

    pub fn list(&self, page_id: &str, api: &str, params: &ListParams) -> Result<Page> {
        let url = self.list_url(page_id, api, params)?;
        debug!(%url, "list request");
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let body = response
            .text()
            .with_context(|| format!("read {page_id}/{api} response"))?;
        decode_page(&body).with_context(|| format!("decode {page_id}/{api} response"))
    }

    /// Fetches a single row to prove the endpoint answers.
    pub fn ping(&self, page_id: &str, api: &str) -> Result<u64> {
        let params = ListParams::new(&Record::new(), &[], PageRequest::new(1, 1));
        self.list(page_id, api, &params).map(|page| page.count)
    }
}

impl PaginatedFetch for Client {
    fn fetch_page(&mut self, page_id: &str, api: &str, params: &ListParams) -> Result<Page> {
        self.list(page_id, api, params).inspect_err(|error| {
            warn!(page_id, api, error = %format!("{error:#}"), "remote list failed");
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    success: Option<bool>,
    message: Option<String>,
    #[serde(default)]
    data: Vec<Record>,
    #[serde(alias = "total")]
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Text(String),
    Nested { message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    error: Option<ErrorDetail>,
}

/// Body of a 2xx list response. A body that says `success: false` is an
/// error even though the status was fine; a missing count falls back to the
/// number of rows returned.
pub fn decode_page(body: &str) -> Result<Page> {
    let envelope: ListEnvelope =
        serde_json::from_str(body).context("expected {\"data\": [...], \"count\": N}")?;
    if envelope.success == Some(false) {
        let message = envelope
            .message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| "request was not successful".to_owned());
        bail!("server rejected request: {message}");
    }
    let count = envelope.count.unwrap_or(envelope.data.len() as u64);
    Ok(Page {
        data: envelope.data,
        count,
    })
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("request to {base_url} timed out -- raise api.timeout or check the server");
    }
    anyhow!("cannot reach {base_url} -- check api.base_url and that the server is up ({error})")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = match parsed.error {
            Some(ErrorDetail::Text(message)) | Some(ErrorDetail::Nested { message }) => {
                Some(message)
            }
            None => parsed.message,
        };
        if let Some(message) = message.filter(|message| !message.is_empty()) {
            return anyhow!("server error ({}): {}", status.as_u16(), message);
        }
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::{Client, clean_error_response, decode_page};
    use procon_app::{ListParams, PageRequest, SortKey, SortOrder};
    use reqwest::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn new_rejects_bad_base_urls() {
        for bad in ["", "   ", "not a url", "ftp://example.com", "mailto:ops@example.com"] {
            assert!(
                Client::new(bad, Duration::from_secs(1)).is_err(),
                "{bad:?} should be rejected"
            );
        }
        let client = Client::new("http://example.com/api/", Duration::from_secs(1))
            .expect("valid base url");
        assert_eq!(client.base_url(), "http://example.com/api");
    }

    #[test]
    fn list_url_encodes_params() {
        let client =
            Client::new("http://example.com/api", Duration::from_secs(1)).expect("valid url");
        let filter = json!({"name": {"contains": "a b"}})
            .as_object()
            .cloned()
            .unwrap_or_default();
        let params = ListParams::new(
            &filter,
            &[SortKey::new("sequence", SortOrder::Ascend)],
            PageRequest::new(3, 20),
        );
        let url = client.list_url("p1", "game", &params).expect("url");
        assert_eq!(url.path(), "/api/p1/game");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (
                    "queryInput".to_owned(),
                    r#"{"name":{"contains":"a b"}}"#.to_owned()
                ),
                ("sort".to_owned(), r#"[{"sequence":"asc"}]"#.to_owned()),
                ("limit".to_owned(), "20".to_owned()),
                ("skip".to_owned(), "40".to_owned()),
            ]
        );
        assert!(client.list_url("", "game", &params).is_err());
    }

    #[test]
    fn decode_page_accepts_count_or_total() {
        let page = decode_page(r#"{"data":[{"id":1}],"count":7}"#).expect("page");
        assert_eq!((page.data.len(), page.count), (1, 7));
        let page = decode_page(r#"{"success":true,"data":[{"id":1},{"id":2}],"total":9}"#)
            .expect("page");
        assert_eq!(page.count, 9);
        let page = decode_page(r#"{"data":[{"id":1}]}"#).expect("page");
        assert_eq!(page.count, 1);
    }

    #[test]
    fn decode_page_rejects_unsuccessful_and_malformed_bodies() {
        let err = decode_page(r#"{"success":false,"message":"no access"}"#).expect_err("fails");
        assert!(err.to_string().contains("no access"));
        assert!(decode_page("[]").is_err());
        assert!(decode_page(r#"{"data":[1,2]}"#).is_err());
    }

    #[test]
    fn error_messages_prefer_server_text() {
        let cases = [
            (r#"{"message":"bad filter"}"#, "server error (400): bad filter"),
            (r#"{"error":"bad sort"}"#, "server error (400): bad sort"),
            (r#"{"error":{"message":"nope"}}"#, "server error (400): nope"),
            ("plain failure", "server error (400): plain failure"),
            ("", "server returned 400"),
        ];
        for (body, expected) in cases {
            assert_eq!(
                clean_error_response(StatusCode::BAD_REQUEST, body).to_string(),
                expected,
                "body {body:?}"
            );
        }
    }
}
