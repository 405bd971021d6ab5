//! `<img>` reference extraction.
//!
//! Parsing goes through html5ever (via `scraper`), which accepts anything a
//! browser would: unclosed tags, unquoted attributes, stray markup. The
//! parser lowercases attribute names, so `SRC`, `Width` and friends match
//! without extra work.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

static IMG_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

/// One `<img>` tag's source and declared size.
///
/// A width or height of 0 means the tag did not declare it (or declared
/// something that is not a plain non-negative integer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReference {
    pub source: String,
    pub width: u32,
    pub height: u32,
}

impl ImageReference {
    /// Both dimensions are declared.
    pub fn has_declared_size(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Returns every `<img>` with a non-empty `src`, in document order.
///
/// The content of `<noscript>` is included. The parser treats it as raw
/// text (scripting is on), so it is parsed again as a fragment in place.
pub fn find_images(html: &str) -> Vec<ImageReference> {
    if html.is_empty() {
        return Vec::new();
    }

    let mut found = Vec::new();
    collect_images(&Html::parse_document(html), &mut found);
    found
}

fn collect_images(document: &Html, found: &mut Vec<ImageReference>) {
    for node in document.tree.root().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        match element.value().name() {
            "img" => found.extend(image_reference(element)),
            "noscript" => {
                let inner: String = element.text().collect();
                if inner.contains('<') {
                    collect_images(&Html::parse_fragment(&inner), found);
                }
            }
            _ => {}
        }
    }
}

fn image_reference(element: ElementRef<'_>) -> Option<ImageReference> {
    let element = element.value();
    let source = element.attr("src").filter(|s| !s.is_empty())?;
    Some(ImageReference {
        source: source.to_string(),
        width: parse_dimension(element.attr("width")),
        height: parse_dimension(element.attr("height")),
    })
}

/// Decodes character references in a raw attribute value the way the
/// parser does when it builds an [`ImageReference`].
pub(crate) fn decode_attribute(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let fragment = Html::parse_fragment(&format!(r#"<img src="{}">"#, raw.replace('"', "&quot;")));
    fragment
        .select(&IMG_SELECTOR)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map_or_else(|| raw.to_string(), str::to_string)
}

fn parse_dimension(value: Option<&str>) -> u32 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}
