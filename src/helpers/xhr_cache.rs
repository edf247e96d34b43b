//! Preloaded XHR responses.
//!
//! Emits a script that pushes `{url, data}` onto `window.TYPO3.xhrCache` so
//! client code can skip a request whose answer is already in the page, and
//! registers the same entry as an inline setting for the SSR service.

use serde_json::{Value, json};

use crate::context::RenderContext;
use crate::error::Error;
use crate::html::TagBuilder;

const TEMPLATE: &str = r#"window.TYPO3 = window.TYPO3 || {};
(function(TYPO3){
    TYPO3.xhrCache = TYPO3.xhrCache || [];
    TYPO3.xhrCache.push({
        url: "{url}",
        data: "{data}"
    });
})(window.TYPO3);"#;

#[derive(Clone, Copy, Debug, Default)]
pub struct XhrCache {
    development: bool,
}

impl XhrCache {
    /// In development the cached data is pretty-printed.
    pub fn new(development: bool) -> Self {
        Self { development }
    }

    /// Renders the `<script>` for `content`, cached for `url` or, without
    /// one, for whatever page the script ends up on.
    pub fn render(&self, ctx: &RenderContext, url: Option<&str>, content: Option<&Value>) -> Result<String, Error> {
        let data = content.unwrap_or(&Value::Null);
        let url_js = match url {
            Some(url) => serde_json::to_string(url)?,
            None => "window.location.href".to_owned(),
        };
        let data_js = if self.development {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };

        ctx.add_inline_setting("xhrCache", json!([{ "data": data, "url": url }]));

        let script = TEMPLATE.replace(r#""{url}""#, &url_js).replace(r#""{data}""#, &data_js);
        let mut tag = TagBuilder::new("script");
        tag.set_content(script);
        Ok(tag.render())
    }
}
