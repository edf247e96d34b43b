//! Environment-driven configuration.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `SSR_SUB_REQUEST_URI` | SSR service endpoint; unset disables SSR | unset |
//! | `SSR_SUB_REQUEST_TIMEOUT` | outbound timeout in seconds | `15` |
//!
//! Every constructor has a `from_lookup` twin that takes the variable source
//! as a closure, so tests never mutate the process environment.

use std::time::Duration;

use crate::error::Error;

pub const SUB_REQUEST_URI_VAR: &str = "SSR_SUB_REQUEST_URI";
pub const SUB_REQUEST_TIMEOUT_VAR: &str = "SSR_SUB_REQUEST_TIMEOUT";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Page-type numbers from the site's routing convention.
///
/// These are site configuration, not domain logic; the defaults match the
/// usual setup where page type `0` is a regular page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageTypes {
    /// A `type` query parameter greater than this marks non-page output
    /// (JSON, feeds, …) that must not go through SSR.
    pub page_threshold: i64,
    /// Page type of the print view; pictures load eagerly there.
    pub print: u64,
}

impl Default for PageTypes {
    fn default() -> Self {
        Self { page_threshold: 0, print: 1_644_444_444 }
    }
}

/// SSR settings read from the environment.
#[derive(Clone, Debug, Default)]
pub struct SsrConfig {
    /// Where rendered pages are POSTed. `None` turns SSR off.
    pub sub_request_uri: Option<String>,
    pub page_types: PageTypes,
}

impl SsrConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// An empty variable counts as set: it still switches SSR on, and the
    /// outbound call then fails and degrades to pass-through.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            sub_request_uri: lookup(SUB_REQUEST_URI_VAR),
            page_types: PageTypes::default(),
        }
    }

    pub fn with_page_types(mut self, page_types: PageTypes) -> Self {
        self.page_types = page_types;
        self
    }
}

/// Reads `SSR_SUB_REQUEST_TIMEOUT` from `lookup`.
///
/// Unset, empty and any zero value (`0`, `0.0`, …) fall back to
/// [`DEFAULT_TIMEOUT`]. Fractional seconds are allowed.
pub fn sub_request_timeout(lookup: impl Fn(&str) -> Option<String>) -> Result<Duration, Error> {
    let Some(raw) = lookup(SUB_REQUEST_TIMEOUT_VAR) else {
        return Ok(DEFAULT_TIMEOUT);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_TIMEOUT);
    }
    let secs: f64 = raw.parse().map_err(|_| Error::Config {
        key: SUB_REQUEST_TIMEOUT_VAR,
        reason: format!("`{raw}` is not a number of seconds"),
    })?;
    // A zero timeout would fail every sub-request immediately.
    if secs == 0.0 {
        return Ok(DEFAULT_TIMEOUT);
    }
    Duration::try_from_secs_f64(secs).map_err(|e| Error::Config {
        key: SUB_REQUEST_TIMEOUT_VAR,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v).to_owned())
    }

    #[rstest]
    fn ssr_disabled_without_uri() {
        assert_eq!(SsrConfig::from_lookup(env(&[])).sub_request_uri, None);
    }

    #[rstest]
    fn ssr_uri_is_read() {
        let config = SsrConfig::from_lookup(env(&[(SUB_REQUEST_URI_VAR, "http://ssr:3000/render")]));
        assert_eq!(config.sub_request_uri.as_deref(), Some("http://ssr:3000/render"));
    }

    #[rstest]
    #[case(&[], Duration::from_secs(15))]
    #[case(&[(SUB_REQUEST_TIMEOUT_VAR, "")], Duration::from_secs(15))]
    #[case(&[(SUB_REQUEST_TIMEOUT_VAR, "0")], Duration::from_secs(15))]
    #[case(&[(SUB_REQUEST_TIMEOUT_VAR, "0.0")], Duration::from_secs(15))]
    #[case(&[(SUB_REQUEST_TIMEOUT_VAR, "00")], Duration::from_secs(15))]
    #[case(&[(SUB_REQUEST_TIMEOUT_VAR, "-0")], Duration::from_secs(15))]
    #[case(&[(SUB_REQUEST_TIMEOUT_VAR, "3")], Duration::from_secs(3))]
    #[case(&[(SUB_REQUEST_TIMEOUT_VAR, " 2.5 ")], Duration::from_millis(2500))]
    fn timeout_resolution(
        #[case] pairs: &'static [(&'static str, &'static str)],
        #[case] expected: Duration,
    ) {
        assert_eq!(sub_request_timeout(env(pairs)).unwrap(), expected);
    }

    #[rstest]
    #[case("soon")]
    #[case("-1")]
    fn timeout_rejects_garbage(#[case] raw: &'static str) {
        let lookup = move |key: &str| (key == SUB_REQUEST_TIMEOUT_VAR).then(|| raw.to_owned());
        assert!(matches!(sub_request_timeout(lookup), Err(Error::Config { .. })));
    }

    #[rstest]
    fn page_types_are_configurable() {
        let types = PageTypes { page_threshold: 5, print: 98 };
        assert_eq!(SsrConfig::default().with_page_types(types).page_types, types);
    }

    #[rstest]
    fn print_page_type_default() {
        assert_eq!(PageTypes::default().print, 1644444444);
    }
}
