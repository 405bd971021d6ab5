//! String-level HTML rewriting: placing localized URLs into `<img src>`,
//! and the placeholder round trip used when a document is loaded again.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use crate::error::{Error, Result};
use crate::references::{decode_attribute, find_images};

// The `src` attribute of an <img> (or its `<image>` alias) tag: double-quoted,
// single-quoted or bare. Attributes before it are consumed whole, so a `>` or
// `src=` inside another attribute's quoted value is not mistaken for markup.
static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?i)(<(?:img|image)\b"#,
        r#"(?:\s+[^\s=>/]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*?"#,
        r#"\s+src\s*=\s*)"#,
        r#"(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#,
    ))
    .unwrap()
});

/// Key under which a source is looked up during substitution. Matching is
/// case-insensitive, like the `src` comparison in [`substitute_sources`].
pub(crate) fn source_key(source: &str) -> String {
    source.to_lowercase()
}

/// Replaces `<img src>` values whose (entity-decoded, case-folded) text is a
/// key of `replacements`.
///
/// Only `src` attributes of `<img>` tags are touched; the same literal in
/// text or in other attributes stays as written. Quote style is kept, and
/// bare values come out double-quoted.
///
/// Returns the new HTML and the keys that were substituted at least once.
pub fn substitute_sources(
    html: &str,
    replacements: &HashMap<String, String>,
) -> (String, HashSet<String>) {
    let mut matched = HashSet::new();
    if replacements.is_empty() {
        return (html.to_string(), matched);
    }

    let html = IMG_SRC_RE
        .replace_all(html, |caps: &Captures| {
            let prefix = &caps[1];
            let (quote, value) = if let Some(v) = caps.get(2) {
                ('"', v.as_str())
            } else if let Some(v) = caps.get(3) {
                ('\'', v.as_str())
            } else {
                ('"', caps.get(4).map_or("", |v| v.as_str()))
            };

            let key = source_key(&decode_attribute(value));
            match replacements.get(&key) {
                Some(url) => {
                    let replaced = format!("{prefix}{quote}{url}{quote}");
                    matched.insert(key);
                    replaced
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned();
    (html, matched)
}

/// `file:` URL of an absolute filesystem path.
pub fn file_url(path: &Path) -> Result<Url> {
    let absolute = std::path::absolute(path).map_err(|e| Error::io(path, e))?;
    Url::from_file_path(&absolute).map_err(|()| Error::FolderUrl(absolute))
}

/// URL written into the HTML for `file`, a direct child of `folder`.
///
/// With a placeholder, the folder's URL prefix is swapped for it:
/// `<placeholder>/<file name>`.
pub fn emitted_url(file: &Path, folder: &Path, placeholder: Option<&str>) -> Result<String> {
    let url = file_url(file)?.to_string();

    let Some(placeholder) = placeholder.filter(|p| !p.is_empty()) else {
        return Ok(url);
    };

    let folder_url = file_url(folder)?.to_string();
    match url.strip_prefix(folder_url.trim_end_matches('/')) {
        Some(relative) => Ok(combine_virtual(placeholder, relative)),
        None => Ok(url),
    }
}

fn combine_virtual(head: &str, tail: &str) -> String {
    format!(
        "{}/{}",
        head.trim_end_matches('/'),
        tail.trim_start_matches('/')
    )
}

/// Load path: swaps the placeholder back for the real folder's file URL.
///
/// Empty `html` or `placeholder` (a bare `/` counts as empty) returns
/// `html` unchanged. This is a plain text replace and performs no I/O.
pub fn restore_placeholder(html: &str, folder: &Path, placeholder: &str) -> Result<String> {
    let placeholder = placeholder.trim_end_matches('/');
    if html.is_empty() || placeholder.is_empty() {
        return Ok(html.to_string());
    }

    let folder_url = file_url(folder)?;
    Ok(html.replace(placeholder, folder_url.as_str().trim_end_matches('/')))
}

/// Sub-paths of every `<img>` source that starts with `placeholder`
/// (ASCII case-insensitive), with surrounding `/` and `\` trimmed.
pub fn contained_images(html: &str, placeholder: &str) -> Vec<String> {
    if html.is_empty() || placeholder.is_empty() {
        return Vec::new();
    }

    find_images(html)
        .into_iter()
        .filter_map(|reference| {
            let source = reference.source.as_bytes();
            let prefix = placeholder.as_bytes();
            if source.len() < prefix.len() || !source[..prefix.len()].eq_ignore_ascii_case(prefix) {
                return None;
            }
            let rest = reference.source.get(placeholder.len()..)?;
            Some(rest.trim_matches(['/', '\\']).to_string())
        })
        .collect()
}
