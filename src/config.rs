use std::path::PathBuf;
use std::time::Duration;

/// Tunables for fetching and normalizing images.
#[derive(Debug, Clone)]
pub struct LocalizerConfig {
    /// Upper bound on a single remote fetch (connect + read).
    pub fetch_timeout: Duration,
    /// Largest accepted image body, remote or local.
    pub max_image_bytes: u64,
    /// Largest target area for a size normalization.
    pub max_resize_pixels: u64,
    /// Parent of auto-generated working folders; the OS temp dir when unset.
    pub temp_root: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            max_image_bytes: 10 * 1024 * 1024,
            max_resize_pixels: 64 * 1024 * 1024,
            temp_root: None,
            user_agent: concat!("html-img-localize/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
