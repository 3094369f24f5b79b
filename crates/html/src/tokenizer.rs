//! Simplified markup tokenizer.
//!
//! Enough of HTML to load real article markup into a [`Document`](crate::Document):
//! tags with quoted/unquoted/valueless attributes, comments, doctype, void
//! elements, and raw text for `<script>`/`<style>`. Tag and attribute names
//! are ASCII `[A-Za-z0-9:_-]` and are lowercased.
//!
//! Not an HTML5 state machine: no parse-error recovery beyond skipping to the
//! next `>`.
use crate::entities::decode_entities;
use crate::types::Token;
use memchr::memchr;

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':'
}

pub(crate) fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn starts_with_ignore_ascii_case_at(haystack: &[u8], start: usize, needle: &[u8]) -> bool {
    haystack.len() >= start + needle.len()
        && haystack[start..start + needle.len()].eq_ignore_ascii_case(needle)
}

/// Byte range `(start, end)` of the `</name ...>` closing a raw text element.
fn find_rawtext_close(input: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let bytes = input.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        i += memchr(b'<', &bytes[i..])?;
        if bytes.get(i + 1) == Some(&b'/')
            && starts_with_ignore_ascii_case_at(bytes, i + 2, name.as_bytes())
        {
            let gt = memchr(b'>', &bytes[i..])?;
            return Some((i, i + gt + 1));
        }
        i += 1;
    }
    None
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut out = Vec::new();
    let mut i = 0;
    // Slices are only cut at ASCII structural bytes, so every endpoint stays a
    // UTF-8 char boundary.
    while i < len {
        if bytes[i] != b'<' {
            let end = memchr(b'<', &bytes[i..]).map_or(len, |rel| i + rel);
            out.push(Token::Text(decode_entities(&input[i..end])));
            i = end;
            continue;
        }

        if input[i..].starts_with(COMMENT_START) {
            let body_start = i + COMMENT_START.len();
            match input[body_start..].find(COMMENT_END) {
                Some(rel) => {
                    out.push(Token::Comment(input[body_start..body_start + rel].to_string()));
                    i = body_start + rel + COMMENT_END.len();
                }
                None => {
                    out.push(Token::Comment(input[body_start..].to_string()));
                    i = len;
                }
            }
            continue;
        }

        if starts_with_ignore_ascii_case_at(bytes, i, b"<!doctype") {
            let Some(rel) = memchr(b'>', &bytes[i..]) else {
                break;
            };
            out.push(Token::Doctype(input[i + 2..i + rel].trim().to_string()));
            i += rel + 1;
            continue;
        }

        if bytes.get(i + 1) == Some(&b'/') {
            let start = i + 2;
            let mut j = start;
            while j < len && is_name_char(bytes[j]) {
                j += 1;
            }
            let name = input[start..j].to_ascii_lowercase();
            i = memchr(b'>', &bytes[j..]).map_or(len, |rel| j + rel + 1);
            if !name.is_empty() {
                out.push(Token::EndTag(name));
            }
            continue;
        }

        let start = i + 1;
        let mut j = start;
        while j < len && is_name_char(bytes[j]) {
            j += 1;
        }
        if j == start {
            // A lone `<` is text.
            out.push(Token::Text("<".to_string()));
            i += 1;
            continue;
        }
        let name = input[start..j].to_ascii_lowercase();
        let (attributes, mut self_closing, next) = scan_attributes(input, j);
        self_closing |= is_void_element(&name);
        i = next;

        let rawtext = !self_closing && (name == "script" || name == "style");
        out.push(Token::StartTag {
            name: name.clone(),
            attributes,
            self_closing,
        });
        if rawtext {
            let (body_end, resume) = find_rawtext_close(input, i, &name).unwrap_or((len, len));
            if body_end > i {
                out.push(Token::Text(input[i..body_end].to_string()));
            }
            out.push(Token::EndTag(name));
            i = resume;
        }
    }
    out
}

type Attributes = Vec<(String, Option<String>)>;

/// Scan attributes starting right after the tag name. Returns the attributes,
/// whether the tag was written self-closing, and the index after `>`.
fn scan_attributes(input: &str, mut k: usize) -> (Attributes, bool, usize) {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut attributes = Vec::new();
    let skip_whitespace = |k: &mut usize| {
        while *k < len && bytes[*k].is_ascii_whitespace() {
            *k += 1;
        }
    };

    loop {
        skip_whitespace(&mut k);
        if k >= len {
            return (attributes, false, len);
        }
        match bytes[k] {
            b'>' => return (attributes, false, k + 1),
            b'/' if bytes.get(k + 1) == Some(&b'>') => return (attributes, true, k + 2),
            b'/' => {
                k += 1;
                continue;
            }
            _ => {}
        }
        let name_start = k;
        while k < len && is_name_char(bytes[k]) {
            k += 1;
        }
        if name_start == k {
            k += 1;
            continue;
        }
        let name = input[name_start..k].to_ascii_lowercase();
        skip_whitespace(&mut k);
        let value = if k < len && bytes[k] == b'=' {
            k += 1;
            skip_whitespace(&mut k);
            if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                let quote = bytes[k];
                let vstart = k + 1;
                let vend = memchr(quote, &bytes[vstart..]).map_or(len, |rel| vstart + rel);
                k = (vend + 1).min(len);
                Some(decode_entities(&input[vstart..vend]))
            } else {
                let vstart = k;
                while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    k += 1;
                }
                Some(decode_entities(&input[vstart..k]))
            }
        } else {
            None
        };
        attributes.push((name, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str, attributes: &[(&str, Option<&str>)]) -> Token {
        Token::StartTag {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
            self_closing: false,
        }
    }

    #[test]
    fn tags_text_and_attributes() {
        let tokens = tokenize(r#"<P class="a b" id=x hidden>Hi &amp; bye</p>"#);
        assert_eq!(
            tokens,
            vec![
                start("p", &[("class", Some("a b")), ("id", Some("x")), ("hidden", None)]),
                Token::Text("Hi & bye".to_string()),
                Token::EndTag("p".to_string()),
            ]
        );
    }

    #[test]
    fn void_and_self_closing() {
        let tokens = tokenize("a<br>b<x/>");
        assert!(matches!(&tokens[1], Token::StartTag { name, self_closing: true, .. } if name == "br"));
        assert!(matches!(&tokens[3], Token::StartTag { name, self_closing: true, .. } if name == "x"));
    }

    #[test]
    fn comments_and_doctype() {
        let tokens = tokenize("<!DOCTYPE html><!-- note --><p></p>");
        assert_eq!(tokens[0], Token::Doctype("DOCTYPE html".to_string()));
        assert_eq!(tokens[1], Token::Comment(" note ".to_string()));
    }

    #[test]
    fn script_body_is_raw() {
        let tokens = tokenize("<script>if (a < b) {}</ScRiPt>after");
        assert_eq!(tokens[1], Token::Text("if (a < b) {}".to_string()));
        assert_eq!(tokens[2], Token::EndTag("script".to_string()));
        assert_eq!(tokens[3], Token::Text("after".to_string()));
    }

    #[test]
    fn utf8_text_survives() {
        let tokens = tokenize("\u{a1}Hola <b>caf\u{e9}</b> \u{1f60a}");
        assert_eq!(tokens[0], Token::Text("\u{a1}Hola ".to_string()));
        assert_eq!(tokens[2], Token::Text("caf\u{e9}".to_string()));
        assert_eq!(tokens[4], Token::Text(" \u{1f60a}".to_string()));
    }
}
