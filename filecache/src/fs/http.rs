//! Read-only remote file over HTTP(S).
//!
//! The size is taken from the `Content-Length` of a `HEAD` request when the
//! file is opened; reads are issued as `Range` requests. Servers that ignore
//! the range and answer `200 OK` with the whole body are tolerated by slicing
//! the body locally.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::fs::FileReader;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HttpFile {
    client: Client,
    url: Url,
    path: PathBuf,
    size: u64,
}

fn remote_err(context: &'static str, path: &Path, e: impl std::fmt::Display) -> CacheError {
    CacheError::io(context, path, io::Error::other(e.to_string()))
}

impl HttpFile {
    pub fn open(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| remote_err("build http client", Path::new(url), e))?;
        Self::open_with_client(client, url)
    }

    pub fn open_with_client(client: Client, url: &str) -> Result<Self> {
        let path = PathBuf::from(url);
        let url = Url::parse(url).map_err(|e| remote_err("parse remote url", &path, e))?;

        let resp = client
            .head(url.clone())
            .send()
            .map_err(|e| remote_err("stat remote file", &path, e))?;
        if !resp.status().is_success() {
            return Err(remote_err(
                "stat remote file",
                &path,
                format!("unexpected status {}", resp.status()),
            ));
        }
        let size = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| remote_err("stat remote file", &path, "missing Content-Length"))?;
        debug!(url = %url, size, "opened remote file");

        Ok(Self {
            client,
            url,
            path,
            size,
        })
    }
}

impl FileReader for HttpFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }
        let last = (offset + buf.len() as u64).min(self.size) - 1;
        let resp = self
            .client
            .get(self.url.clone())
            .header(RANGE, format!("bytes={offset}-{last}"))
            .send()
            .map_err(|e| remote_err("read remote file", &self.path, e))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .map_err(|e| remote_err("read remote file", &self.path, e))?;
        let data = match status {
            StatusCode::PARTIAL_CONTENT => &body[..],
            StatusCode::OK => {
                let start = usize::try_from(offset).map_or(body.len(), |o| o.min(body.len()));
                &body[start..]
            }
            other => {
                return Err(remote_err(
                    "read remote file",
                    &self.path,
                    format!("unexpected status {other}"),
                ));
            }
        };

        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
