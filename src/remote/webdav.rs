//! WebDAV client over HTTP (reqwest, Basic auth)

use super::propfind::{parse_multistatus, PROPFIND_BODY};
use super::{normalize_etag, DavEntry, Depth, RemoteStore};
use crate::types::SyncError;
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::header::{HeaderValue, CONTENT_TYPE, ETAG};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use std::time::Duration;
use tracing::{debug, warn};

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const XML_CONTENT_TYPE_FALLBACK: &str = "text/xml; charset=utf-8";

/// Talks to one WebDAV server
#[derive(Debug, Clone)]
pub struct WebDavClient {
    client: Client,
    base: Url,
    username: String,
    password: String,
}

impl WebDavClient {
    /// Build a client for `base_url`; a missing scheme defaults to `https://`.
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let base = parse_base_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("notesync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;

        Ok(Self {
            client,
            base,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Absolute URL for a remote path; collections get a trailing slash
    fn url_for(&self, path: &str, collection: bool) -> Result<Url, SyncError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SyncError::Config(format!("base URL cannot hold a path: {}", self.base)))?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            if collection {
                segments.push("");
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn send(&self, builder: RequestBuilder, url: &Url) -> Result<Response, SyncError> {
        let response = builder.send().await.map_err(transport)?;
        check_status(response, url)
    }

    async fn propfind(&self, url: &Url, depth: Depth, content_type: &str) -> Result<String, SyncError> {
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let builder = self
            .request(method, url.clone())
            .header("Depth", depth.header_value())
            .header(CONTENT_TYPE, content_type)
            .body(PROPFIND_BODY);
        let response = self.send(builder, url).await?;
        response.text().await.map_err(transport)
    }
}

#[async_trait]
impl RemoteStore for WebDavClient {
    async fn list(&self, path: &str, depth: Depth) -> Result<Vec<DavEntry>, SyncError> {
        let url = self.url_for(path, true)?;
        let body = match self.propfind(&url, depth, XML_CONTENT_TYPE).await {
            Ok(body) => body,
            // Some servers only accept text/xml on shallow listings
            Err(first) if depth == Depth::One => {
                debug!(url = %url, error = %first, "retrying PROPFIND with text/xml");
                self.propfind(&url, depth, XML_CONTENT_TYPE_FALLBACK)
                    .await
                    .map_err(|_| first)?
            }
            Err(e) => return Err(e),
        };

        let base_path = percent_decode_str(url.path()).decode_utf8_lossy();
        parse_multistatus(&body, &base_path)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, SyncError> {
        let url = self.url_for(path, false)?;
        let response = self.send(self.request(Method::GET, url.clone()), &url).await?;
        let bytes = response.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<Option<String>, SyncError> {
        let url = self.url_for(path, false)?;
        let builder = self.request(Method::PUT, url.clone()).body(data);
        let response = self.send(builder, &url).await?;
        Ok(response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .and_then(normalize_etag))
    }

    async fn delete(&self, path: &str) -> Result<(), SyncError> {
        let url = self.url_for(path, false)?;
        self.send(self.request(Method::DELETE, url.clone()), &url).await?;
        Ok(())
    }

    async fn move_to(&self, from: &str, to: &str, overwrite: bool) -> Result<(), SyncError> {
        let url = self.url_for(from, false)?;
        let destination = self.url_for(to, false)?;
        let method =
            Method::from_bytes(b"MOVE").map_err(|e| SyncError::Transport(e.to_string()))?;
        let destination = HeaderValue::from_str(destination.as_str())
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let builder = self
            .request(method, url.clone())
            .header("Destination", destination)
            .header("Overwrite", if overwrite { "T" } else { "F" });
        self.send(builder, &url).await?;
        Ok(())
    }

    async fn mkcol(&self, path: &str) -> Result<(), SyncError> {
        let url = self.url_for(path, true)?;
        let method =
            Method::from_bytes(b"MKCOL").map_err(|e| SyncError::Transport(e.to_string()))?;
        self.send(self.request(method, url.clone()), &url).await?;
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, SyncError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SyncError::Config("WebDAV base URL is empty".to_string()));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        warn!(url = %trimmed, "base URL has no scheme, assuming https");
        format!("https://{trimmed}")
    };
    Url::parse(&with_scheme)
        .map_err(|e| SyncError::Config(format!("invalid WebDAV base URL '{}': {}", trimmed, e)))
}

fn check_status(response: Response, url: &Url) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SyncError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

fn transport(e: reqwest::Error) -> SyncError {
    SyncError::Transport(e.to_string())
}
