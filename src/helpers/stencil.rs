//! Stencil component loader.
//!
//! Inlines a Stencil build's `{namespace}.esm.js` entry module with its
//! relative imports made absolute, preloads those imports and adds the
//! `nomodule` fallback for old browsers:
//!
//! ```text
//! <link href="https://cdn.example.com/dist/p-1a2b.js" rel="modulepreload" />
//! <script type="module" data-resources-url="https://cdn.example.com/dist/" data-stencil-namespace="app">…</script>
//! <script nomodule="" src="https://cdn.example.com/dist/app.js"></script>
//! ```

use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use url::Url;

use crate::helpers::fetch;
use crate::html::TagBuilder;
use crate::http_client::Transport;

static DOUBLE_QUOTED_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(from|import)"\./([^"]+.js)""#).unwrap());
static SINGLE_QUOTED_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(from|import)\s'\./([^']+.js)'").unwrap());

#[derive(Clone)]
pub struct Stencil {
    host: String,
    transport: Arc<dyn Transport>,
}

impl Stencil {
    /// Assets are served from `cdn_base` when it is a valid URL with a host,
    /// otherwise from `site_base`.
    pub fn new(site_base: &Url, cdn_base: Option<&str>, transport: Arc<dyn Transport>) -> Self {
        let cdn_host = cdn_base
            .and_then(|base| Url::parse(base).ok())
            .and_then(|url| url.host_str().map(str::to_owned));
        let host = cdn_host.or_else(|| site_base.host_str().map(str::to_owned)).unwrap_or_default();
        Self { host, transport }
    }

    pub async fn render(&self, resources_url: &str, namespace: &str) -> String {
        let namespace = namespace.trim();
        let resources = format!("{}/", resources_url.trim().trim_end_matches('/'));

        let entry_url = self.absolute(&format!("{resources}{namespace}.esm.js"));
        let entry = fetch(self.transport.as_ref(), &entry_url)
            .await
            .and_then(|body| String::from_utf8(body.to_vec()).ok())
            .unwrap_or_default();
        let asset_url = format!("{}/", self.absolute(&resources).trim_end_matches('/'));

        let mut preload = Vec::new();
        let mut rewrite = |caps: &Captures<'_>| {
            let file_uri = format!("{asset_url}{}", &caps[2]);
            if !preload.contains(&file_uri) {
                preload.push(file_uri.clone());
            }
            format!(r#"{}"{file_uri}""#, &caps[1])
        };
        let script = DOUBLE_QUOTED_IMPORT_RE.replace_all(&entry, &mut rewrite).into_owned();
        let script = SINGLE_QUOTED_IMPORT_RE.replace_all(&script, &mut rewrite).into_owned();
        let script = script.replace("sourceMappingURL=", &format!("sourceMappingURL={asset_url}"));

        let mut out = String::new();
        let links: Vec<String> = preload
            .iter()
            .map(|uri| {
                let mut link = TagBuilder::new("link");
                link.add_attribute("href", self.absolute(uri)).add_attribute("rel", "modulepreload");
                link.render()
            })
            .collect();
        out.push_str(&links.join("\n"));
        out.push('\n');

        let mut module = TagBuilder::new("script");
        module
            .add_attribute("type", "module")
            .add_attribute("data-resources-url", asset_url.as_str())
            .add_attribute("data-stencil-namespace", namespace)
            .set_content(script)
            .force_closing_tag(true);
        out.push_str(&module.render());
        out.push('\n');

        let mut fallback = TagBuilder::new("script");
        fallback
            .add_attribute("nomodule", "")
            .add_attribute("src", self.absolute(&format!("{resources}{namespace}.js")))
            .force_closing_tag(true);
        out.push_str(&fallback.render());
        out.push('\n');

        out
    }

    /// `https://{host}/{path}`; URLs with a scheme pass through.
    fn absolute(&self, file: &str) -> String {
        if Url::parse(file).is_ok_and(|url| url.has_host()) {
            return file.to_owned();
        }
        format!("https://{}/{}", self.host, file.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::testing::Fixed;
    use rstest::rstest;

    const ESM: &str = concat!(
        r#"import{p as e,b as t}from"./p-1a2b.js";export{s as setNonce}from"./p-1a2b.js";"#,
        "\nimport './p-3c4d.js';\n",
        "//# sourceMappingURL=app.esm.js.map",
    );

    fn site() -> Url {
        Url::parse("https://www.example.com/").unwrap()
    }

    #[tokio::test]
    async fn renders_preloads_module_and_fallback() {
        let transport = Fixed::serving("https://www.example.com/dist/app.esm.js", ESM);
        let stencil = Stencil::new(&site(), None, Arc::new(transport));

        let out = stencil.render("/dist", " app ").await;
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], r#"<link href="https://www.example.com/dist/p-1a2b.js" rel="modulepreload" />"#);
        assert_eq!(lines[1], r#"<link href="https://www.example.com/dist/p-3c4d.js" rel="modulepreload" />"#);
        assert!(lines[2].starts_with(
            r#"<script type="module" data-resources-url="https://www.example.com/dist/" data-stencil-namespace="app">import{p as e,b as t}from"https://www.example.com/dist/p-1a2b.js";"#
        ));
        assert_eq!(lines[3], r#"import"https://www.example.com/dist/p-3c4d.js";"#);
        assert_eq!(lines[4], "//# sourceMappingURL=https://www.example.com/dist/app.esm.js.map</script>");
        assert_eq!(lines[5], r#"<script nomodule="" src="https://www.example.com/dist/app.js"></script>"#);
        assert!(out.ends_with('\n'));
    }

    #[rstest]
    #[case(Some("https://cdn.example.net/"), "https://cdn.example.net/dist/app.js")]
    #[case(Some("not a url"), "https://www.example.com/dist/app.js")]
    #[case(None, "https://www.example.com/dist/app.js")]
    fn host_prefers_cdn(#[case] cdn: Option<&str>, #[case] expected: &str) {
        let stencil = Stencil::new(&site(), cdn, Arc::new(Fixed::default()));
        assert_eq!(stencil.absolute("dist/app.js"), expected);
    }

    #[tokio::test]
    async fn missing_entry_still_renders_loaders() {
        let transport = Fixed::default();
        let stencil = Stencil::new(&site(), None, Arc::new(transport.clone()));

        let out = stencil.render("https://assets.example.org/build/", "app").await;

        assert_eq!(
            transport.requested.lock().unwrap().as_slice(),
            ["https://assets.example.org/build/app.esm.js"]
        );
        assert_eq!(
            out,
            "\n<script type=\"module\" data-resources-url=\"https://assets.example.org/build/\" data-stencil-namespace=\"app\"></script>\n\
             <script nomodule=\"\" src=\"https://assets.example.org/build/app.js\"></script>\n"
        );
    }
}
