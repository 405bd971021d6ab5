//! Classification of an `<img src>` value into something bytes can be
//! loaded from.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};
use crate::report::SkipReason;

/// Base URI value meaning "no document context".
pub const BLANK_DOCUMENT: &str = "about:blank";

/// The document location relative sources are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseUri {
    /// `about:blank`: relative sources are used as-is.
    Blank,
    Url(Url),
}

impl BaseUri {
    /// Parses an absolute URI. Empty input and `about:blank` give [`BaseUri::Blank`].
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() || uri.eq_ignore_ascii_case(BLANK_DOCUMENT) {
            return Ok(BaseUri::Blank);
        }
        Url::parse(uri)
            .map(BaseUri::Url)
            .map_err(|source| Error::InvalidBaseUri {
                uri: uri.to_string(),
                source,
            })
    }

    /// Base for documents living in `dir`.
    pub fn from_directory(dir: &Path) -> Result<Self> {
        let dir = std::path::absolute(dir).map_err(|e| Error::io(dir, e))?;
        Url::from_directory_path(&dir)
            .map(BaseUri::Url)
            .map_err(|()| Error::FolderUrl(dir))
    }
}

/// Where the bytes of one reference come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// http, https or ftp.
    Remote(Url),
    Local(PathBuf),
    /// A `data:` URL, kept verbatim until its payload is decoded.
    Data(String),
}

impl fmt::Display for ResolvedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedSource::Remote(url) => write!(f, "{url}"),
            ResolvedSource::Local(path) => write!(f, "{}", path.display()),
            ResolvedSource::Data(_) => f.write_str("inline data"),
        }
    }
}

/// Resolves `source` against `base`.
///
/// Absolute URLs never look at the base. Drive-letter paths (`C:\x.png`)
/// pass through unchanged, as does everything when the base is blank.
pub fn resolve(source: &str, base: &BaseUri) -> std::result::Result<ResolvedSource, SkipReason> {
    let source = source.trim();

    if is_drive_path(source) {
        return Ok(ResolvedSource::Local(PathBuf::from(source)));
    }
    if has_scheme(source, "data") {
        return Ok(ResolvedSource::Data(source.to_string()));
    }

    match Url::parse(source) {
        Ok(url) => classify(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            BaseUri::Blank => Ok(ResolvedSource::Local(PathBuf::from(source))),
            BaseUri::Url(base) => base
                .join(source)
                .map_err(|e| SkipReason::Unresolvable(format!("{source} against {base}: {e}")))
                .and_then(classify),
        },
        Err(e) => Err(SkipReason::Unresolvable(format!("{source}: {e}"))),
    }
}

fn classify(url: Url) -> std::result::Result<ResolvedSource, SkipReason> {
    match url.scheme() {
        "http" | "https" | "ftp" => Ok(ResolvedSource::Remote(url)),
        "file" => url
            .to_file_path()
            .map(ResolvedSource::Local)
            .map_err(|()| SkipReason::Unresolvable(format!("{url} has no local path"))),
        "data" => Ok(ResolvedSource::Data(url.into())),
        other => Err(SkipReason::Unresolvable(format!(
            "unsupported scheme '{other}' in {url}"
        ))),
    }
}

fn has_scheme(source: &str, scheme: &str) -> bool {
    let bytes = source.as_bytes();
    bytes.len() > scheme.len()
        && bytes[..scheme.len()].eq_ignore_ascii_case(scheme.as_bytes())
        && bytes[scheme.len()] == b':'
}

/// `X:\...` or `X:/...`
fn is_drive_path(source: &str) -> bool {
    let bytes = source.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(uri: &str) -> BaseUri {
        BaseUri::parse(uri).unwrap()
    }

    #[test]
    fn test_blank_sentinel() {
        assert_eq!(base("about:blank"), BaseUri::Blank);
        assert_eq!(base("ABOUT:BLANK"), BaseUri::Blank);
        assert_eq!(base(""), BaseUri::Blank);
    }

    #[test]
    fn test_invalid_base() {
        assert!(matches!(
            BaseUri::parse("not a uri"),
            Err(Error::InvalidBaseUri { .. })
        ));
    }

    #[test]
    fn test_remote_ignores_base() {
        let nowhere = base("file:///definitely/not/here/");
        for src in ["http://example.com/a.png", "HTTPS://example.com/a.png", "ftp://host/a.png"] {
            match resolve(src, &nowhere).unwrap() {
                ResolvedSource::Remote(url) => assert!(url.host_str().is_some()),
                other => panic!("expected remote for {src}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_relative_with_blank_base_is_unchanged() {
        assert_eq!(
            resolve("images/pic.png", &BaseUri::Blank).unwrap(),
            ResolvedSource::Local(PathBuf::from("images/pic.png"))
        );
    }

    #[test]
    fn test_drive_letter_path_is_unchanged() {
        let b = base("file:///docs/");
        assert_eq!(
            resolve(r"C:\pics\a.png", &b).unwrap(),
            ResolvedSource::Local(PathBuf::from(r"C:\pics\a.png"))
        );
        assert_eq!(
            resolve("d:/pics/a.png", &b).unwrap(),
            ResolvedSource::Local(PathBuf::from("d:/pics/a.png"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_joins_base_folder() {
        let b = base("file:///docs/page/");
        assert_eq!(
            resolve("img/a.png", &b).unwrap(),
            ResolvedSource::Local(PathBuf::from("/docs/page/img/a.png"))
        );
        // A document URL resolves against its containing folder.
        let b = base("file:///docs/page/index.html");
        assert_eq!(
            resolve("a%20b.png", &b).unwrap(),
            ResolvedSource::Local(PathBuf::from("/docs/page/a b.png"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_path_resolves_against_base_root() {
        let b = base("file:///docs/page/");
        assert_eq!(
            resolve("/shared/a.png", &b).unwrap(),
            ResolvedSource::Local(PathBuf::from("/shared/a.png"))
        );
    }

    #[test]
    fn test_relative_against_remote_base_is_remote() {
        let b = base("https://example.com/blog/post.html");
        assert_eq!(
            resolve("../img/a.png", &b).unwrap(),
            ResolvedSource::Remote(Url::parse("https://example.com/img/a.png").unwrap())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_url() {
        assert_eq!(
            resolve("file:///tmp/x.png", &BaseUri::Blank).unwrap(),
            ResolvedSource::Local(PathBuf::from("/tmp/x.png"))
        );
    }

    #[test]
    fn test_data_url() {
        let src = "DATA:image/png;base64,AAAA";
        assert_eq!(
            resolve(src, &BaseUri::Blank).unwrap(),
            ResolvedSource::Data(src.to_string())
        );
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(matches!(
            resolve("javascript:alert(1)", &BaseUri::Blank),
            Err(SkipReason::Unresolvable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_from_directory() {
        assert_eq!(
            BaseUri::from_directory(Path::new("/srv/docs")).unwrap(),
            base("file:///srv/docs/")
        );
    }
}
