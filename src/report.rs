//! Per-reference outcome of a save conversion.
//!
//! Every extracted `<img>` gets exactly one entry, in document order. A
//! reference that could not be localized is skipped rather than failing the
//! call; callers that want all-or-nothing behavior check
//! [`ConversionReport::is_complete`].

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::references::ImageReference;

/// Why a reference was left untouched in the HTML.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("cannot resolve source: {0}")]
    Unresolvable(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("not a decodable image: {0}")]
    Decode(String),

    #[error("resize failed: {0}")]
    Resize(String),

    /// Localized, but no `src` attribute in the markup could be pointed at
    /// the copy, so the copy was removed again.
    #[error("src attribute not rewritable: {0}")]
    Unrewritten(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Persisted to `file`; the HTML now points at `url`.
    Saved {
        file: PathBuf,
        url: String,
        resized: bool,
    },
    /// An earlier reference with the same source already produced `url`.
    Reused { url: String },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceOutcome {
    pub reference: ImageReference,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub outcomes: Vec<ReferenceOutcome>,
}

impl ConversionReport {
    pub(crate) fn push(&mut self, reference: ImageReference, outcome: Outcome) {
        self.outcomes.push(ReferenceOutcome { reference, outcome });
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Files written by this conversion.
    pub fn saved_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            Outcome::Saved { file, .. } => Some(file),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&ImageReference, &SkipReason)> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            Outcome::Skipped { reason } => Some((&o.reference, reason)),
            _ => None,
        })
    }

    /// No reference was skipped.
    pub fn is_complete(&self) -> bool {
        self.skipped().next().is_none()
    }
}
