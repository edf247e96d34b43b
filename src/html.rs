//! Minimal HTML tag builder.
//!
//! Attribute values are escaped; content is inserted verbatim because it is
//! usually markup produced by another builder.

/// Builds one HTML element.
#[derive(Clone, Debug)]
pub struct TagBuilder {
    name: String,
    attributes: Vec<(String, String)>,
    content: String,
    force_closing_tag: bool,
}

impl TagBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            content: String::new(),
            force_closing_tag: false,
        }
    }

    /// Sets `name`, replacing an earlier value but keeping its position.
    pub fn add_attribute(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_owned(), value)),
        }
        self
    }

    pub fn remove_attribute(&mut self, name: &str) -> &mut Self {
        self.attributes.retain(|(k, _)| k != name);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn set_content(&mut self, content: impl Into<String>) -> &mut Self {
        self.content = content.into();
        self
    }

    /// Render `<x></x>` instead of `<x />` when there is no content.
    pub fn force_closing_tag(&mut self, force: bool) -> &mut Self {
        self.force_closing_tag = force;
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!("<{}", self.name);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attribute(value));
            out.push('"');
        }
        if self.content.is_empty() && !self.force_closing_tag {
            out.push_str(" />");
        } else {
            out.push('>');
            out.push_str(&self.content);
            out.push_str(&format!("</{}>", self.name));
        }
        out
    }
}

/// Escapes `&`, `<`, `>`, `"` and `'` for use inside a double-quoted attribute.
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn empty_element_self_closes() {
        let mut tag = TagBuilder::new("img");
        tag.add_attribute("src", "/a.jpg").add_attribute("alt", "");

        assert_eq!(tag.render(), r#"<img src="/a.jpg" alt="" />"#);
    }

    #[rstest]
    fn forced_closing_tag() {
        let mut tag = TagBuilder::new("script");
        tag.add_attribute("nomodule", "").force_closing_tag(true);

        assert_eq!(tag.render(), r#"<script nomodule=""></script>"#);
    }

    #[rstest]
    fn replacing_attribute_keeps_order() {
        let mut tag = TagBuilder::new("picture");
        tag.add_attribute("class", "a").add_attribute("style", "s").add_attribute("class", "b");
        tag.set_content("<img />");

        assert_eq!(tag.render(), r#"<picture class="b" style="s"><img /></picture>"#);
    }

    #[rstest]
    fn removed_attribute_is_gone() {
        let mut tag = TagBuilder::new("img");
        tag.add_attribute("decoding", "async").remove_attribute("decoding");

        assert_eq!(tag.attribute("decoding"), None);
    }

    #[rstest]
    #[case(r#"Tom & "Jerry""#, "Tom &amp; &quot;Jerry&quot;")]
    #[case("<b>'x'</b>", "&lt;b&gt;&#039;x&#039;&lt;/b&gt;")]
    #[case("plain", "plain")]
    fn attribute_escaping(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape_attribute(input), expected);
    }
}
