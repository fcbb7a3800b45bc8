use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::ImfError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

/// Blocking HTTP client shared by the dataset readers.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, ImfError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ImfError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("imf-reader/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ImfError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| ImfError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn get_text(&self, url: &str) -> Result<String, ImfError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        Self::handle_status(response, url)?
            .text()
            .map_err(|err| ImfError::Http(format!("could not read {url}: {err}")))
    }

    /// GET with an explicit `Accept`, for endpoints that negotiate format.
    pub fn get_text_accepting(&self, url: &str, accept: &str) -> Result<String, ImfError> {
        let response = self.send_with_retries(|| self.client.get(url).header(ACCEPT, accept))?;
        Self::handle_status(response, url)?
            .text()
            .map_err(|err| ImfError::Http(format!("could not read {url}: {err}")))
    }

    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ImfError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        let bytes = Self::handle_status(response, url)?
            .bytes()
            .map_err(|err| ImfError::Http(format!("could not read {url}: {err}")))?;
        Ok(bytes.to_vec())
    }

    pub fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Vec<u8>, ImfError> {
        let response = self.send_with_retries(|| self.client.post(url).form(form))?;
        let bytes = Self::handle_status(response, url)?
            .bytes()
            .map_err(|err| ImfError::Http(format!("could not read {url}: {err}")))?;
        Ok(bytes.to_vec())
    }

    fn handle_status(response: Response, url: &str) -> Result<Response, ImfError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(ImfError::HttpStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, ImfError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        debug!(status, attempt, "retrying request");
                        thread::sleep(backoff(attempt));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        debug!(%err, attempt, "retrying request");
                        thread::sleep(backoff(attempt));
                        attempt += 1;
                        continue;
                    }
                    return Err(ImfError::Http(err.to_string()));
                }
            }
        }
    }
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
