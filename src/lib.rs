//! Localize the images referenced by edited HTML.
//!
//! Saving a document copies every `<img>` source (local path, `file:` URL,
//! remote http(s) URL or inline `data:` URL) into a working folder, scales
//! each copy to the width/height the tag declares, and rewrites the tag to
//! point at the copy. An optional placeholder keeps the saved HTML free of
//! absolute paths. Loading maps the placeholder back to the real folder.
//!
//! ```no_run
//! use std::path::Path;
//! use html_img_localize::{BaseUri, ImageLocalizer, SaveTarget};
//!
//! # fn main() -> html_img_localize::Result<()> {
//! let mut localizer = ImageLocalizer::default();
//! let saved = localizer.convert_for_save(
//!     r#"<img src="logo.png" width="64" height="64">"#,
//!     &BaseUri::from_directory(Path::new("site"))?,
//!     SaveTarget { folder: Some(Path::new("store")), placeholder: Some("$IMAGES$") },
//! )?;
//! let editable = ImageLocalizer::convert_for_load(&saved.html, Path::new("store"), "$IMAGES$")?;
//! # let _ = editable;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod fetch;
pub mod localizer;
pub mod references;
pub mod report;
pub mod resolve;
pub mod rewrite;

pub use config::LocalizerConfig;
pub use error::{Error, Result};
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use localizer::{Conversion, ImageLocalizer, SaveTarget};
pub use references::{find_images, ImageReference};
pub use report::{ConversionReport, Outcome, ReferenceOutcome, SkipReason};
pub use resolve::{BaseUri, ResolvedSource, BLANK_DOCUMENT};
