//! Inline file contents.
//!
//! Reads a file below the public root, or fetches a remote one, and prepares
//! it for embedding: SVGs get positional arguments substituted, stylesheets
//! get relative asset paths and source maps made absolute, and anything can
//! be wrapped into a base64 data URI. Every failure renders as `""`.

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::{Captures, Regex};
use tracing::debug;

use crate::helpers::fetch;
use crate::http_client::Transport;
use crate::image::asset::is_svg;

static REMOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:(?:http|ftp)s?|s(?:ftp|cp)):").unwrap());
static SOURCE_MAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"sourceMappingURL=([^"]+.css)\.map"#).unwrap());
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%(?:(\d+)\$)?s|%%").unwrap());

/// Per-call options.
#[derive(Clone, Debug, Default)]
pub struct FileOptions {
    /// Values for `%s` / `%1$s` placeholders in SVGs.
    pub arguments: Vec<String>,
    /// MIME type of a remote file; local files are guessed from the name.
    pub mime_type: String,
    /// Return `data:{mime};base64,…` instead of the raw content.
    pub data_uri: bool,
    /// Replacement for `../` in stylesheets.
    pub base_uri: Option<String>,
}

#[derive(Clone)]
pub struct FileContent {
    public_root: PathBuf,
    asset_host: String,
    transport: Arc<dyn Transport>,
}

impl FileContent {
    /// `asset_host` is the host rewritten source maps point to (a CDN, or
    /// the site's own host).
    pub fn new(public_root: impl Into<PathBuf>, asset_host: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self { public_root: public_root.into(), asset_host: asset_host.into(), transport }
    }

    pub async fn render(&self, file: &str, options: &FileOptions) -> String {
        let Some((raw, mime_type)) = self.load(file, options).await else {
            return String::new();
        };
        let Ok(mut content) = String::from_utf8(raw) else {
            debug!(file, "file content is not valid UTF-8");
            return String::new();
        };

        if is_svg(&mime_type) {
            match substitute(&content, &options.arguments) {
                Some(substituted) => content = substituted,
                None => {
                    debug!(file, "not enough arguments for svg placeholders");
                    return String::new();
                }
            }
        } else if matches!(mime_type.as_str(), "text/plain" | "text/css") {
            if let Some(base_uri) = options.base_uri.as_deref().filter(|b| !b.is_empty()) {
                content = content.replace("../", base_uri);
            }
            let map_uri = format!("https://{}/{}", self.asset_host, file_path(file));
            content = SOURCE_MAP_RE
                .replace_all(&content, |_: &Captures<'_>| format!("sourceMappingURL={map_uri}.map"))
                .into_owned();
        }

        if options.data_uri && !content.is_empty() {
            content = format!("data:{mime_type};base64,{}", STANDARD.encode(content.as_bytes()));
        }

        content.trim().to_owned()
    }

    async fn load(&self, file: &str, options: &FileOptions) -> Option<(Vec<u8>, String)> {
        if REMOTE_RE.is_match(file) {
            let body = fetch(self.transport.as_ref(), file).await?;
            return Some((body.to_vec(), options.mime_type.clone()));
        }

        let path = self.local_path(file).await?;
        let mime_type = mime_guess::from_path(&path).first_raw().unwrap_or("text/plain").to_owned();
        match tokio::fs::read(&path).await {
            Ok(raw) => Some((raw, mime_type)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot read file");
                None
            }
        }
    }

    /// Resolves `file` below the public root. Paths with `..`, and symlinks
    /// that lead outside the root, resolve to nothing.
    async fn local_path(&self, file: &str) -> Option<PathBuf> {
        let relative = Path::new(file.trim_start_matches('/'));
        if !relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
            debug!(file, "refusing path outside the public root");
            return None;
        }

        let path = self.public_root.join(relative);
        let (root, resolved) = match (
            tokio::fs::canonicalize(&self.public_root).await,
            tokio::fs::canonicalize(&path).await,
        ) {
            (Ok(root), Ok(resolved)) => (root, resolved),
            (Err(e), _) | (_, Err(e)) => {
                debug!(path = %path.display(), error = %e, "cannot resolve file");
                return None;
            }
        };
        if !resolved.starts_with(&root) {
            debug!(file, "refusing path outside the public root");
            return None;
        }
        Some(resolved)
    }
}

/// Path part of `file` without leading slash, for local and remote files.
fn file_path(file: &str) -> String {
    match url::Url::parse(file) {
        Ok(url) if url.has_host() => url.path().trim_start_matches('/').to_owned(),
        _ => file.trim_start_matches('/').to_owned(),
    }
}

/// Replaces `%s` (sequential), `%N$s` (positional) and `%%`. `None` when a
/// placeholder has no argument.
fn substitute(template: &str, arguments: &[String]) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    let mut next = 0;
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let whole = caps.get(0)?;
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        if whole.as_str() == "%%" {
            out.push('%');
            continue;
        }
        let index = match caps.get(1) {
            Some(n) => n.as_str().parse::<usize>().ok()?.checked_sub(1)?,
            None => {
                next += 1;
                next - 1
            }
        };
        out.push_str(arguments.get(index)?);
    }
    out.push_str(&template[last..]);
    Some(out)
}
