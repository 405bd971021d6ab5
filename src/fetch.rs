//! Loading the raw bytes behind a resolved source.

use std::fs;
use std::io::Read;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;
use url::Url;

use crate::config::LocalizerConfig;
use crate::report::SkipReason;
use crate::resolve::ResolvedSource;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("{0}")]
    Transport(String),

    #[error("body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("reading body: {0}")]
    Read(#[from] std::io::Error),
}

impl From<FetchError> for SkipReason {
    fn from(error: FetchError) -> Self {
        SkipReason::Fetch(error.to_string())
    }
}

/// Network seam: turns a remote URL into bytes, blocking the caller.
pub trait Fetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP(S) fetcher backed by a shared `ureq` agent.
pub struct HttpFetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &LocalizerConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.fetch_timeout)
            .user_agent(&config.user_agent)
            .build();
        Self {
            agent,
            max_bytes: config.max_image_bytes,
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        }

        let response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        read_limited(response.into_reader(), self.max_bytes)
    }
}

/// Reads at most `limit` bytes; anything longer is an error rather than a
/// silently truncated image.
fn read_limited(reader: impl Read, limit: u64) -> Result<Vec<u8>, FetchError> {
    let mut bytes = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(FetchError::TooLarge { limit });
    }
    Ok(bytes)
}

/// Loads the bytes for one resolved reference.
pub fn load(
    source: &ResolvedSource,
    fetcher: &dyn Fetcher,
    max_bytes: u64,
) -> Result<Vec<u8>, SkipReason> {
    match source {
        ResolvedSource::Remote(url) => Ok(fetcher.fetch(url)?),
        ResolvedSource::Local(path) => read_local(path, max_bytes),
        ResolvedSource::Data(data_url) => decode_data_url(data_url, max_bytes),
    }
}

fn read_local(path: &Path, max_bytes: u64) -> Result<Vec<u8>, SkipReason> {
    let metadata = match fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return Err(SkipReason::NotFound(path.display().to_string())),
    };
    if metadata.len() > max_bytes {
        return Err(FetchError::TooLarge { limit: max_bytes }.into());
    }
    fs::read(path).map_err(|e| SkipReason::Fetch(format!("{}: {e}", path.display())))
}

/// Decodes the payload of a base64 `data:` URL.
fn decode_data_url(data_url: &str, max_bytes: u64) -> Result<Vec<u8>, SkipReason> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or_else(|| SkipReason::Unresolvable("data URL without payload".into()))?;

    let is_base64 = header
        .rsplit(';')
        .next()
        .is_some_and(|p| p.trim().eq_ignore_ascii_case("base64"));
    if !is_base64 {
        return Err(SkipReason::Unresolvable(
            "only base64 data URLs are supported".into(),
        ));
    }

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| SkipReason::Decode(format!("invalid base64 payload: {e}")))?;
    if bytes.len() as u64 > max_bytes {
        return Err(FetchError::TooLarge { limit: max_bytes }.into());
    }
    Ok(bytes)
}
