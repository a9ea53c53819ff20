//! Media streamer — serves prompt audio with byte-range support.
//!
//! Every request opens its own file handle; nothing is shared between
//! callers beyond the read-only resolver.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use crate::assets::AssetResolver;
use crate::error::MediaError;
use crate::store::Database;

/// Content type of every prompt asset.
pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Stream keys with this prefix name a persisted script directly.
pub const SCRIPT_PREFIX: &str = "script_";

static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^bytes=(\d+)-(\d*)$").expect("valid range pattern"));

/// A parsed `Range` header, checked against the file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// No usable range: serve the whole file.
    Full,
    /// Inclusive byte span.
    Partial { start: u64, end: u64 },
    /// Well-formed but outside the file.
    Unsatisfiable,
}

impl ByteRange {
    /// Parse `bytes=<start>-<end>?`. Malformed syntax means `Full`; an
    /// omitted or oversized end is clamped to the last byte.
    pub fn parse(header: Option<&str>, size: u64) -> Self {
        let Some(caps) = header.and_then(|h| RANGE_RE.captures(h.trim())) else {
            return Self::Full;
        };
        let Ok(start) = caps[1].parse::<u64>() else {
            return Self::Full;
        };
        let last = match size.checked_sub(1) {
            Some(last) => last,
            None => return Self::Unsatisfiable,
        };
        let end = match &caps[2] {
            "" => last,
            raw => match raw.parse::<u64>() {
                Ok(end) => end.min(last),
                Err(_) => return Self::Full,
            },
        };
        if start > end {
            return Self::Unsatisfiable;
        }
        Self::Partial { start, end }
    }
}

/// A fully buffered audio response.
#[derive(Debug)]
pub struct MediaResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl IntoResponse for MediaResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

pub struct MediaStreamer {
    assets: Arc<AssetResolver>,
    db: Arc<dyn Database>,
}

impl MediaStreamer {
    pub fn new(assets: Arc<AssetResolver>, db: Arc<dyn Database>) -> Self {
        Self { assets, db }
    }

    /// Serve the asset for `key`, honouring an optional `Range` header.
    pub async fn stream(&self, key: &str, range: Option<&str>) -> Result<MediaResponse, MediaError> {
        let path = self.locate(key).await?;

        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(key = %key, path = %path.display(), "Audio file not found");
                return Err(MediaError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(AUDIO_CONTENT_TYPE),
        );

        match ByteRange::parse(range, size) {
            ByteRange::Full => {
                let mut body = Vec::with_capacity(size as usize);
                file.read_to_end(&mut body).await?;
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len() as u64));
                Ok(MediaResponse {
                    status: StatusCode::OK,
                    headers,
                    body,
                })
            }
            ByteRange::Partial { start, end } => {
                let len = end - start + 1;
                let mut body = vec![0u8; len as usize];
                file.seek(std::io::SeekFrom::Start(start)).await?;
                file.read_exact(&mut body).await?;
                debug!(key = %key, start, end, size, "Serving byte range");

                insert_text(&mut headers, header::CONTENT_RANGE, format!("bytes {start}-{end}/{size}"));
                headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
                Ok(MediaResponse {
                    status: StatusCode::PARTIAL_CONTENT,
                    headers,
                    body,
                })
            }
            ByteRange::Unsatisfiable => {
                insert_text(&mut headers, header::CONTENT_RANGE, format!("bytes */{size}"));
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(0u64));
                Ok(MediaResponse {
                    status: StatusCode::RANGE_NOT_SATISFIABLE,
                    headers,
                    body: Vec::new(),
                })
            }
        }
    }

    async fn locate(&self, key: &str) -> Result<PathBuf, MediaError> {
        if let Some(name) = key.strip_prefix(SCRIPT_PREFIX) {
            let script = self
                .db
                .get_script(name)
                .await?
                .ok_or_else(|| MediaError::NotFound(key.to_string()))?;
            let relative = script
                .asset_path
                .ok_or_else(|| MediaError::NotFound(key.to_string()))?;
            return Ok(self.assets.asset_path(&relative));
        }
        Ok(self.assets.resolve(key).path)
    }
}

fn insert_text(headers: &mut HeaderMap, name: header::HeaderName, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}
