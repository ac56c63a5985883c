//! Link markup rendering

use crate::selection::LinkDraft;
use linkforge_common::config::EngineConfig;
use std::borrow::Cow;

/// Turns a draft into the markup inserted into a body
pub trait LinkRenderer: Send + Sync {
    fn render(&self, draft: &LinkDraft) -> String;
}

/// Plain `<a>` element tagged with a marker attribute so later runs can
/// strip it again.
#[derive(Debug, Clone)]
pub struct AnchorRenderer {
    href_prefix: String,
    marker_attribute: String,
}

impl AnchorRenderer {
    pub fn new(href_prefix: impl Into<String>, marker_attribute: impl Into<String>) -> Self {
        Self {
            href_prefix: href_prefix.into(),
            marker_attribute: marker_attribute.into(),
        }
    }
}

impl From<&EngineConfig> for AnchorRenderer {
    fn from(config: &EngineConfig) -> Self {
        Self::new(config.link_href_prefix.clone(), config.link_marker_attribute.clone())
    }
}

impl LinkRenderer for AnchorRenderer {
    fn render(&self, draft: &LinkDraft) -> String {
        format!(
            r#"<a href="{}/{}" {}="{}">{}</a>"#,
            escape(self.href_prefix.trim_end_matches('/')),
            draft.target_id,
            self.marker_attribute,
            draft.anchor_type,
            escape(&draft.anchor_text),
        )
    }
}

fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}
