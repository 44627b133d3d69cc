//! # HTTP Source
//!
//! A blocking HTTP(S) [`Source`] implementation. Opening at a non-zero offset
//! requests `bytes=offset-`; servers answering `206 Partial Content` report a
//! total length of `offset + Content-Length`, plain `200` responses report
//! `Content-Length` as-is, and a missing `Content-Length` leaves the length
//! unknown. A `200` answer to a ranged request means the server restarted the
//! body at byte zero, so the first `offset` bytes are drained before reads
//! are served.

use std::io::{self, Read};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::RANGE;
use tracing::debug;
use url::Url;

use crate::error::{ProxyCacheError, Result};
use crate::source::Source;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`Source`] that streams a remote resource over HTTP(S).
#[derive(Debug)]
pub struct HttpSource {
    url: Url,
    client: Client,
    response: Option<Response>,
    length: Option<u64>,
}

impl HttpSource {
    /// Create a source for `url` with a default client.
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProxyCacheError::SourceOpen(Box::new(e)))?;
        Self::with_client(url, client)
    }

    /// Create a source for `url` reusing an existing blocking client.
    pub fn with_client(url: impl AsRef<str>, client: Client) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|e| ProxyCacheError::SourceOpen(Box::new(e)))?;
        Ok(Self {
            url,
            client,
            response: None,
            length: None,
        })
    }

    /// The resource URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Source for HttpSource {
    fn open(&mut self, offset: u64) -> Result<()> {
        let mut request = self.client.get(self.url.clone());
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let mut response = request
            .send()
            .map_err(|e| ProxyCacheError::SourceOpen(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyCacheError::SourceOpen(
                format!("server returned status code {status} for {}", self.url).into(),
            ));
        }

        // A server that ignores the Range header restarts the body at byte
        // zero; drain the prefix so the next read still begins at `offset`.
        if offset > 0 && status != StatusCode::PARTIAL_CONTENT {
            debug!(url = %self.url, offset, "range request ignored, skipping prefix");
            let skipped = io::copy(&mut response.by_ref().take(offset), &mut io::sink())
                .map_err(|e| ProxyCacheError::SourceOpen(Box::new(e)))?;
            if skipped < offset {
                return Err(ProxyCacheError::SourceOpen(
                    format!(
                        "resource at {} ended before resume offset {offset}",
                        self.url
                    )
                    .into(),
                ));
            }
        }

        self.length = match (status, response.content_length()) {
            (StatusCode::PARTIAL_CONTENT, Some(remaining)) => Some(offset + remaining),
            (_, Some(total)) => Some(total),
            (_, None) => None,
        };
        debug!(
            url = %self.url,
            offset,
            status = %status,
            length = ?self.length,
            "opened http source"
        );
        self.response = Some(response);
        Ok(())
    }

    fn length(&self) -> Option<u64> {
        self.length
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let response = self.response.as_mut().ok_or_else(|| {
            ProxyCacheError::SourceRead("http source is not open".into())
        })?;
        response
            .read(buf)
            .map_err(|e| ProxyCacheError::SourceRead(Box::new(e)))
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the response tears down the connection (or returns it to
        // the pool once drained).
        self.response = None;
        Ok(())
    }
}
