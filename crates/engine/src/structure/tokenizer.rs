//! Streaming markup tokenizer
//!
//! Splits markup into tags, text, comments and declarations while keeping
//! byte spans into the original string. Every span boundary lands on an
//! ASCII delimiter, so spans can always be used to slice the input.
//!
//! The tokenizer never fails: an unterminated tag or comment runs to the end
//! of input and is still reported as a tag or comment.

use std::ops::Range;

/// Elements whose content is not markup
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `<name attr="value">`; names are lower-cased
    StartTag {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        self_closing: bool,
    },

    /// `</name>`
    EndTag { name: String },

    /// Character data between tags
    Text,

    /// Content of a raw-text element such as `<script>`
    RawText,

    /// `<!-- ... -->`
    Comment,

    /// `<!DOCTYPE ...>`, `<?xml ...?>`, `<![CDATA[...]]>`
    Declaration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn is_start_tag(&self, tag: &str) -> bool {
        matches!(&self.kind, TokenKind::StartTag { name, .. } if name == tag)
    }

    pub fn is_end_tag(&self, tag: &str) -> bool {
        matches!(&self.kind, TokenKind::EndTag { name } if name == tag)
    }

    /// Attribute lookup on a start tag
    pub fn attribute(&self, attr: &str) -> Option<Option<&str>> {
        match &self.kind {
            TokenKind::StartTag { attributes, .. } => attributes
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(attr))
                .map(|(_, value)| value.as_deref()),
            _ => None,
        }
    }
}

/// Iterator over the tokens of a markup string
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    /// Set after a raw-text start tag until its end tag is found
    raw_text: Option<&'static str>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            raw_text: None,
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn emit(&mut self, kind: TokenKind, end: usize) -> Token {
        let token = Token {
            kind,
            start: self.pos,
            end,
        };
        self.pos = end;
        token
    }

    fn raw_text_token(&mut self, element: &'static str) -> Option<Token> {
        self.raw_text = None;
        let close = format!("</{}", element);
        let end = find_ignore_case(self.input, self.pos, &close).unwrap_or(self.input.len());
        if end == self.pos {
            return self.next();
        }
        Some(self.emit(TokenKind::RawText, end))
    }

    fn text_token(&mut self) -> Token {
        let end = self.bytes()[self.pos + 1..]
            .iter()
            .position(|&b| b == b'<')
            .map_or(self.input.len(), |i| self.pos + 1 + i);
        self.emit(TokenKind::Text, end)
    }

    fn comment_token(&mut self) -> Token {
        let end = self.input[self.pos + 4..]
            .find("-->")
            .map_or(self.input.len(), |i| self.pos + 4 + i + 3);
        self.emit(TokenKind::Comment, end)
    }

    fn declaration_token(&mut self) -> Token {
        let end = self.bytes()[self.pos..]
            .iter()
            .position(|&b| b == b'>')
            .map_or(self.input.len(), |i| self.pos + i + 1);
        self.emit(TokenKind::Declaration, end)
    }

    fn end_tag_token(&mut self) -> Token {
        let bytes = self.bytes();
        let name_start = self.pos + 2;
        let name_end = scan_name(bytes, name_start);
        let name = self.input[name_start..name_end].to_ascii_lowercase();
        let end = bytes[name_end..]
            .iter()
            .position(|&b| b == b'>')
            .map_or(self.input.len(), |i| name_end + i + 1);
        self.emit(TokenKind::EndTag { name }, end)
    }

    fn start_tag_token(&mut self) -> Token {
        let input = self.input;
        let bytes = self.bytes();
        let len = bytes.len();

        let name_start = self.pos + 1;
        let mut i = scan_name(bytes, name_start);
        let name = input[name_start..i].to_ascii_lowercase();

        let mut attributes = Vec::new();
        let mut self_closing = false;
        let mut end = len;

        while i < len {
            match bytes[i] {
                b'>' => {
                    end = i + 1;
                    break;
                }
                b'/' => {
                    self_closing = bytes.get(i + 1) == Some(&b'>');
                    i += 1;
                    continue;
                }
                b if b.is_ascii_whitespace() => {
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let attr_start = i;
            while i < len && !is_attr_delimiter(bytes[i]) {
                i += 1;
            }
            if i == attr_start {
                // Stray '=' or quote
                i += 1;
                continue;
            }
            let attr_name = input[attr_start..i].to_ascii_lowercase();

            let mut j = skip_whitespace(bytes, i);
            if j < len && bytes[j] == b'=' {
                j = skip_whitespace(bytes, j + 1);
                let (value, next) = scan_attribute_value(input, j);
                attributes.push((attr_name, Some(value)));
                i = next;
            } else {
                attributes.push((attr_name, None));
            }
            self_closing = false;
        }

        if !self_closing {
            self.raw_text = RAW_TEXT_ELEMENTS.iter().copied().find(|&el| el == name);
        }

        self.emit(
            TokenKind::StartTag {
                name,
                attributes,
                self_closing,
            },
            end,
        )
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.pos >= self.input.len() {
            return None;
        }

        if let Some(element) = self.raw_text {
            return self.raw_text_token(element);
        }

        let rest = &self.bytes()[self.pos..];
        if rest[0] != b'<' {
            return Some(self.text_token());
        }

        let token = match rest.get(1) {
            Some(b'!') if rest.starts_with(b"<!--") => self.comment_token(),
            Some(b'!') | Some(b'?') => self.declaration_token(),
            Some(b'/') if rest.get(2).is_some_and(u8::is_ascii_alphabetic) => self.end_tag_token(),
            Some(b) if b.is_ascii_alphabetic() => self.start_tag_token(),
            _ => self.text_token(),
        };
        Some(token)
    }
}

/// Tokenize the whole input
pub fn tokenize(input: &str) -> Vec<Token> {
    Tokenizer::new(input).collect()
}

fn scan_name(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'>' | b'/') {
        i += 1;
    }
    i
}

fn is_attr_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'')
}

fn skip_whitespace(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Returns the value and the index just past it
fn scan_attribute_value(input: &str, from: usize) -> (String, usize) {
    let bytes = input.as_bytes();
    match bytes.get(from) {
        Some(&quote) if quote == b'"' || quote == b'\'' => {
            let value_start = from + 1;
            match bytes[value_start..].iter().position(|&b| b == quote) {
                Some(i) => (
                    input[value_start..value_start + i].to_string(),
                    value_start + i + 1,
                ),
                None => (input[value_start..].to_string(), input.len()),
            }
        }
        _ => {
            let mut i = from;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                i += 1;
            }
            (input[from..i].to_string(), i)
        }
    }
}

/// ASCII case-insensitive search for an ASCII needle
fn find_ignore_case(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_spans_cover_input() {
        let input = "<p class=\"a\">Hello <b>world</b></p><!-- c -->tail";
        let tokens = tokenize(input);
        let mut pos = 0;
        for token in &tokens {
            assert_eq!(token.start, pos);
            pos = token.end;
        }
        assert_eq!(pos, input.len());
    }

    #[test]
    fn test_quoted_attribute_with_angle_bracket() {
        let input = r#"<a title="x > y" href='/z'>link</a>"#;
        let tokens = tokenize(input);
        assert_eq!(&input[tokens[0].span()], r#"<a title="x > y" href='/z'>"#);
        assert_eq!(tokens[0].attribute("title"), Some(Some("x > y")));
        assert_eq!(tokens[0].attribute("href"), Some(Some("/z")));
        assert_eq!(&input[tokens[1].span()], "link");
    }

    #[test]
    fn test_raw_text_element_hides_tags() {
        let input = "<script>if (a < b) { x = '<p>'; }</script><p>ok</p>";
        let tokens = tokenize(input);
        assert_eq!(tokens[1].kind, TokenKind::RawText);
        assert_eq!(&input[tokens[1].span()], "if (a < b) { x = '<p>'; }");
        assert!(tokens[2].is_end_tag("script"));
        assert!(tokens[3].is_start_tag("p"));
    }

    #[test]
    fn test_comment_and_declaration() {
        assert_eq!(
            kinds("<!DOCTYPE html><!-- <p>not a tag</p> -->"),
            vec![TokenKind::Declaration, TokenKind::Comment]
        );
    }

    #[test]
    fn test_malformed_input_does_not_panic() {
        for input in ["<", "<p", "<a href=\"unterminated", "</", "<!--", "a < b", "<p>é<", "<>"] {
            let tokens = tokenize(input);
            assert_eq!(tokens.last().map(|t| t.end), Some(input.len()), "{input}");
        }
    }

    #[test]
    fn test_unterminated_tag_is_a_tag() {
        let tokens = tokenize("text<p class=x");
        assert!(tokens[1].is_start_tag("p"));
        assert_eq!(tokens[1].end, 14);
    }

    #[test]
    fn test_self_closing_and_boolean_attribute() {
        let tokens = tokenize("<img src=a.png alt=\"\" hidden/>");
        match &tokens[0].kind {
            TokenKind::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                assert_eq!(name, "img");
                assert!(*self_closing);
                assert_eq!(attributes.len(), 3);
                assert_eq!(attributes[2], ("hidden".to_string(), None));
            }
            other => panic!("unexpected token {other:?}"),
        }
    }
}
