//! Unified error type.

/// The error type returned by vitrine's fallible operations.
///
/// Application-level errors (404, 500, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. Missing media and
/// failed SSR calls are not errors either: they degrade to empty markup and
/// pass-through responses. What is left is infrastructure and authoring bugs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Binding to a port or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The outbound HTTP client could not be constructed.
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is present but unusable.
    #[error("invalid config `{key}`: {reason}")]
    Config { key: &'static str, reason: String },

    /// A picture was rendered with zero or several image sources.
    #[error("you must specify exactly one of a string path, an image or page data (got {given})")]
    InvalidImageSource { given: usize },
}
