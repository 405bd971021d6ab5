//! The stateful front door: save, load, list and cleanup.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::TempDir;
use uuid::Uuid;

use crate::codec::DecodedImage;
use crate::config::LocalizerConfig;
use crate::error::{Error, Result};
use crate::fetch::{self, Fetcher, HttpFetcher};
use crate::references::{find_images, ImageReference};
use crate::report::{ConversionReport, Outcome, SkipReason};
use crate::resolve::{resolve, BaseUri};
use crate::rewrite;

/// Where a save conversion puts its images.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveTarget<'a> {
    /// Caller-owned working folder, created when missing and never deleted.
    /// `None` makes the localizer create (and later delete) a temp folder.
    pub folder: Option<&'a Path>,
    /// Stand-in for the folder's URL in the emitted HTML.
    pub placeholder: Option<&'a str>,
}

/// Result of [`ImageLocalizer::convert_for_save`].
#[derive(Debug, Clone)]
pub struct Conversion {
    pub html: String,
    /// Working folder the images went to; `None` when the input was empty.
    pub folder: Option<PathBuf>,
    pub report: ConversionReport,
}

/// Copies the images an HTML document references into a working folder and
/// points the document at the copies.
///
/// Temp folders created by [`convert_for_save`](Self::convert_for_save) are
/// owned by the localizer and removed by [`cleanup`](Self::cleanup) or on
/// drop, whichever comes first.
pub struct ImageLocalizer {
    config: LocalizerConfig,
    fetcher: Box<dyn Fetcher>,
    temp_folders: Vec<TempDir>,
}

impl Default for ImageLocalizer {
    fn default() -> Self {
        Self::new(LocalizerConfig::default())
    }
}

impl ImageLocalizer {
    pub fn new(config: LocalizerConfig) -> Self {
        let fetcher = HttpFetcher::new(&config);
        Self::with_fetcher(config, fetcher)
    }

    pub fn with_fetcher(config: LocalizerConfig, fetcher: impl Fetcher + 'static) -> Self {
        Self {
            config,
            fetcher: Box::new(fetcher),
            temp_folders: Vec::new(),
        }
    }

    pub fn config(&self) -> &LocalizerConfig {
        &self.config
    }

    /// Temp folders this instance will delete on cleanup.
    pub fn tracked_folders(&self) -> impl Iterator<Item = &Path> {
        self.temp_folders.iter().map(TempDir::path)
    }

    /// Save path: localizes every `<img>` and rewrites the HTML to match.
    ///
    /// References that cannot be resolved, fetched, decoded or resized are
    /// left untouched and listed as skipped in the report. Failing to create
    /// the folder or write a file aborts the call.
    pub fn convert_for_save(
        &mut self,
        html: &str,
        base: &BaseUri,
        target: SaveTarget<'_>,
    ) -> Result<Conversion> {
        if html.is_empty() {
            return Ok(Conversion {
                html: String::new(),
                folder: None,
                report: ConversionReport::default(),
            });
        }

        let folder = match target.folder.filter(|f| !f.as_os_str().is_empty()) {
            Some(folder) => {
                let folder = std::path::absolute(folder).map_err(|e| Error::io(folder, e))?;
                fs::create_dir_all(&folder).map_err(|e| Error::io(&folder, e))?;
                folder
            }
            None => self.create_temp_folder()?,
        };
        let placeholder = target.placeholder.filter(|p| !p.is_empty());

        let mut report = ConversionReport::default();
        let mut replacements = HashMap::new();
        let mut seen: HashMap<String, Outcome> = HashMap::new();

        for reference in find_images(html) {
            let key = rewrite::source_key(&reference.source);

            let outcome = match seen.get(&key) {
                Some(Outcome::Saved { url, .. } | Outcome::Reused { url }) => {
                    Outcome::Reused { url: url.clone() }
                }
                Some(skipped @ Outcome::Skipped { .. }) => skipped.clone(),
                None => {
                    let outcome = self.localize(&reference, base, &folder, placeholder)?;
                    if let Outcome::Saved { url, .. } = &outcome {
                        replacements.insert(key.clone(), url.clone());
                    }
                    seen.insert(key, outcome.clone());
                    outcome
                }
            };
            report.push(reference, outcome);
        }

        let (html, matched) = rewrite::substitute_sources(html, &replacements);
        for entry in &mut report.outcomes {
            let key = rewrite::source_key(&entry.reference.source);
            if !replacements.contains_key(&key) || matched.contains(&key) {
                continue;
            }
            if let Outcome::Saved { file, .. } = &entry.outcome {
                if let Err(e) = fs::remove_file(file) {
                    warn!("Failed to remove {}: {e}", file.display());
                }
            }
            let source = log_source(&entry.reference.source);
            warn!("Skipping image '{source}': its src attribute could not be rewritten");
            entry.outcome = Outcome::Skipped {
                reason: SkipReason::Unrewritten(source.into_owned()),
            };
        }

        info!(
            "Localized {} of {} image reference(s) into {}",
            report.saved_files().count(),
            report.len(),
            folder.display()
        );

        Ok(Conversion {
            html,
            folder: Some(folder),
            report,
        })
    }

    /// Load path: maps `placeholder` back to `folder`'s file URL.
    pub fn convert_for_load(html: &str, folder: &Path, placeholder: &str) -> Result<String> {
        rewrite::restore_placeholder(html, folder, placeholder)
    }

    /// Sub-paths under `placeholder` of the images the HTML references.
    pub fn list_contained_images(html: &str, placeholder: &str) -> Vec<String> {
        rewrite::contained_images(html, placeholder)
    }

    /// Deletes every temp folder this instance created. Idempotent.
    ///
    /// All folders are attempted; the first failure is returned.
    pub fn cleanup(&mut self) -> Result<()> {
        let mut first_error = None;
        for folder in self.temp_folders.drain(..) {
            let path = folder.path().to_path_buf();
            match folder.close() {
                Ok(()) => debug!("Removed working folder {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to remove working folder {}: {e}", path.display());
                    first_error.get_or_insert(Error::io(path, e));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn create_temp_folder(&mut self) -> Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("html-img-");

        let folder = match &self.config.temp_root {
            Some(root) => {
                fs::create_dir_all(root).map_err(|e| Error::io(root, e))?;
                builder.tempdir_in(root).map_err(|e| Error::io(root, e))?
            }
            None => builder
                .tempdir()
                .map_err(|e| Error::io(std::env::temp_dir(), e))?,
        };

        let path = folder.path().to_path_buf();
        debug!("Created working folder {}", path.display());
        self.temp_folders.push(folder);
        Ok(path)
    }

    /// Resolve, fetch, validate, normalize and persist one reference.
    fn localize(
        &self,
        reference: &ImageReference,
        base: &BaseUri,
        folder: &Path,
        placeholder: Option<&str>,
    ) -> Result<Outcome> {
        let source = log_source(&reference.source);

        let prepared = resolve(&reference.source, base)
            .and_then(|resolved| {
                debug!("Resolved '{source}' to {resolved}");
                fetch::load(&resolved, self.fetcher.as_ref(), self.config.max_image_bytes)
            })
            .and_then(|bytes| self.normalize(reference, bytes));

        let (bytes, resized) = match prepared {
            Ok(prepared) => prepared,
            Err(reason) => {
                warn!("Skipping image '{source}': {reason}");
                return Ok(Outcome::Skipped { reason });
            }
        };

        let file = folder.join(Uuid::new_v4().to_string());
        fs::write(&file, &bytes).map_err(|e| Error::io(&file, e))?;
        let url = rewrite::emitted_url(&file, folder, placeholder)?;

        info!("Saved '{source}' as {} ({} bytes)", file.display(), bytes.len());
        Ok(Outcome::Saved { file, url, resized })
    }

    /// Checks the bytes decode, then brings them to the declared size.
    fn normalize(
        &self,
        reference: &ImageReference,
        bytes: Vec<u8>,
    ) -> std::result::Result<(Vec<u8>, bool), SkipReason> {
        let decoded = DecodedImage::decode(&bytes)?;
        if !reference.has_declared_size() {
            return Ok((bytes, false));
        }

        match decoded.resized_to(
            reference.width,
            reference.height,
            self.config.max_resize_pixels,
        )? {
            Some(resized) => {
                let (w, h) = decoded.dimensions();
                debug!(
                    "Resized {}x{} to declared {}x{}",
                    w, h, reference.width, reference.height
                );
                Ok((resized, true))
            }
            None => Ok((bytes, false)),
        }
    }
}

impl Drop for ImageLocalizer {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            warn!("Working folder cleanup incomplete: {e}");
        }
    }
}

/// Data URLs are shortened so a single inline image cannot flood the log.
fn log_source(source: &str) -> Cow<'_, str> {
    const MAX: usize = 64;
    if source.len() <= MAX {
        return Cow::Borrowed(source);
    }
    let cut = (0..=MAX).rev().find(|&i| source.is_char_boundary(i)).unwrap_or(0);
    Cow::Owned(format!("{}...", &source[..cut]))
}
