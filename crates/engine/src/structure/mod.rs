//! Content structure analysis
//!
//! Parses one item's markup into:
//! - Zones: paragraph-equivalent blocks (`p`, `li`, `blockquote`, `dd`,
//!   `figcaption`) with byte offsets, word counts and link counts
//! - Headings `h1`-`h6` with their collapsed text
//! - The visible text outside headings, used for term extraction
//!
//! Nested zone starts inside an open zone are ignored (outermost wins). An
//! unclosed zone closes implicitly at the next zone start, heading or
//! structural block, or at the end of input.

mod tokenizer;

pub use tokenizer::{tokenize, Token, TokenKind, Tokenizer};

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

const ZONE_ELEMENTS: &[&str] = &["p", "li", "blockquote", "dd", "figcaption"];

/// Zone elements that never nest inside themselves
const SELF_CLOSING_ZONES: &[&str] = &["p", "li", "dd"];

const STRUCTURAL_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "body", "dl", "div", "fieldset", "figure", "footer", "form",
    "header", "hr", "html", "main", "nav", "ol", "pre", "section", "table", "ul",
];

/// Relative position of a zone within the document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ZonePosition {
    Intro,
    Body,
    Conclusion,
}

impl ZonePosition {
    /// Classify zone `index` of `count` purely by index
    pub fn classify(index: usize, count: usize) -> Self {
        if count == 0 {
            return ZonePosition::Body;
        }
        let relative = index as f64 / count as f64;
        if relative < 0.2 {
            ZonePosition::Intro
        } else if relative >= 0.8 {
            ZonePosition::Conclusion
        } else {
            ZonePosition::Body
        }
    }
}

/// A paragraph-equivalent block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Zone {
    pub index: usize,

    /// Start of the opening tag
    pub start_offset: usize,

    /// End of the closing tag, or the implicit close point
    pub end_offset: usize,

    /// Inner range start (just after the opening tag)
    pub content_start: usize,

    /// Inner range end (start of the closing tag, or the implicit close point)
    pub content_end: usize,

    pub word_count: usize,

    /// Anchors inside the zone
    pub link_count: usize,

    pub already_linked: bool,

    pub position: ZonePosition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Heading {
    pub level: u8,

    /// Offset of the opening tag
    pub offset: usize,

    pub text: String,
}

/// Result of analyzing one markup document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StructureAnalysis {
    pub zones: Vec<Zone>,
    pub headings: Vec<Heading>,

    /// Visible text outside headings, entity-decoded
    pub text: String,
}

struct OpenZone {
    name: String,
    depth: usize,
    start_offset: usize,
    content_start: usize,
    word_count: usize,
    link_count: usize,
}

struct OpenHeading {
    level: u8,
    offset: usize,
    text: String,
}

#[derive(Default)]
struct Analyzer {
    zones: Vec<Zone>,
    headings: Vec<Heading>,
    text: String,
    zone: Option<OpenZone>,
    heading: Option<OpenHeading>,
}

impl Analyzer {
    fn open_zone(&mut self, name: &str, token: &Token) {
        self.zone = Some(OpenZone {
            name: name.to_string(),
            depth: 1,
            start_offset: token.start,
            content_start: token.end,
            word_count: 0,
            link_count: 0,
        });
    }

    fn close_zone(&mut self, content_end: usize, end_offset: usize) {
        if let Some(open) = self.zone.take() {
            self.zones.push(Zone {
                index: self.zones.len(),
                start_offset: open.start_offset,
                end_offset,
                content_start: open.content_start,
                content_end,
                word_count: open.word_count,
                link_count: open.link_count,
                already_linked: open.link_count > 0,
                position: ZonePosition::Body,
            });
        }
    }

    fn close_heading(&mut self) {
        if let Some(open) = self.heading.take() {
            self.headings.push(Heading {
                level: open.level,
                offset: open.offset,
                text: collapse_whitespace(&open.text),
            });
        }
    }

    fn start_tag(&mut self, name: &str, self_closing: bool, token: &Token) {
        if let Some(level) = heading_level(name) {
            self.close_zone(token.start, token.start);
            self.close_heading();
            self.heading = Some(OpenHeading {
                level,
                offset: token.start,
                text: String::new(),
            });
            return;
        }

        if STRUCTURAL_ELEMENTS.contains(&name) {
            self.close_zone(token.start, token.start);
            return;
        }

        if ZONE_ELEMENTS.contains(&name) && !self_closing {
            let same_element = self.zone.as_ref().map(|open| open.name == name);
            match same_element {
                None => self.open_zone(name, token),
                Some(true) if SELF_CLOSING_ZONES.contains(&name) => {
                    self.close_zone(token.start, token.start);
                    self.open_zone(name, token);
                }
                Some(true) => {
                    if let Some(open) = self.zone.as_mut() {
                        open.depth += 1;
                    }
                }
                // Outermost zone wins
                Some(false) => {}
            }
            return;
        }

        if name == "a" {
            if let Some(open) = self.zone.as_mut() {
                open.link_count += 1;
            }
        }
    }

    fn end_tag(&mut self, name: &str, token: &Token) {
        if heading_level(name).is_some() {
            self.close_heading();
            return;
        }

        if STRUCTURAL_ELEMENTS.contains(&name) {
            self.close_zone(token.start, token.start);
            return;
        }

        let closes = match self.zone.as_mut() {
            Some(open) if open.name == name => {
                open.depth -= 1;
                open.depth == 0
            }
            _ => false,
        };
        if closes {
            self.close_zone(token.start, token.end);
        }
    }

    fn text(&mut self, raw: &str) {
        let decoded = decode_entities(raw);

        if let Some(heading) = self.heading.as_mut() {
            heading.text.push_str(&decoded);
            heading.text.push(' ');
            return;
        }

        if let Some(zone) = self.zone.as_mut() {
            zone.word_count += decoded.split_whitespace().count();
        }
        if !decoded.trim().is_empty() {
            self.text.push_str(decoded.trim());
            self.text.push(' ');
        }
    }

    fn finish(mut self, len: usize) -> StructureAnalysis {
        self.close_zone(len, len);
        self.close_heading();

        let count = self.zones.len();
        for zone in &mut self.zones {
            zone.position = ZonePosition::classify(zone.index, count);
        }

        StructureAnalysis {
            zones: self.zones,
            headings: self.headings,
            text: self.text.trim_end().to_string(),
        }
    }
}

/// Analyze markup into zones and headings.
///
/// Markup without any zone yields an empty zone list.
pub fn analyze(markup: &str) -> StructureAnalysis {
    let mut analyzer = Analyzer::default();

    for token in Tokenizer::new(markup) {
        match &token.kind {
            TokenKind::StartTag {
                name, self_closing, ..
            } => analyzer.start_tag(name, *self_closing, &token),
            TokenKind::EndTag { name } => analyzer.end_tag(name, &token),
            TokenKind::Text => analyzer.text(&markup[token.span()]),
            TokenKind::RawText | TokenKind::Comment | TokenKind::Declaration => {}
        }
    }

    analyzer.finish(markup.len())
}

/// Remove anchors carrying `marker_attribute`, with the single space before each.
pub fn strip_marked_links(markup: &str, marker_attribute: &str) -> String {
    let tokens = tokenize(markup);
    let mut out = String::with_capacity(markup.len());
    let mut copied = 0;
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        if !(token.is_start_tag("a") && token.attribute(marker_attribute).is_some()) {
            i += 1;
            continue;
        }

        let close = tokens[i + 1..]
            .iter()
            .position(|t| t.is_end_tag("a"))
            .map(|offset| i + 1 + offset);
        let end = close.map_or(token.end, |c| tokens[c].end);

        let mut start = token.start;
        if start > copied && markup.as_bytes()[start - 1] == b' ' {
            start -= 1;
        }

        out.push_str(&markup[copied..start]);
        copied = end;
        i = close.map_or(i + 1, |c| c + 1);
    }

    out.push_str(&markup[copied..]);
    out
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the common named and numeric character references
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_reference(&tail[1..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_reference(reference: &str) -> Option<char> {
    if let Some(numeric) = reference.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse().ok()?,
        };
        return char::from_u32(code);
    }

    match reference {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "ndash" => Some('\u{2013}'),
        "mdash" => Some('\u{2014}'),
        "hellip" => Some('\u{2026}'),
        "rsquo" => Some('\u{2019}'),
        "lsquo" => Some('\u{2018}'),
        "ldquo" => Some('\u{201C}'),
        "rdquo" => Some('\u{201D}'),
        _ => None,
    }
}
