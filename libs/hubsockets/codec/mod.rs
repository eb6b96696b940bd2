//! Frame codec
//!
//! Pulls JSON fragments out of handshake bodies (plain JSON or
//! `callback(<json>)`) and streaming frames (any number of fragments mixed
//! with noise). Pure and stateless.

pub mod message;
pub mod scanner;

pub use message::{DecodedMessage, Fragment, HubInvocation};
pub use scanner::{candidate_at, Candidate, Scanner};

use crate::traits::CodecError;
use serde_json::Value;

/// Outcome of decoding one streaming frame
#[derive(Debug, Clone, PartialEq)]
pub enum CodecResult {
    /// Every candidate parsed
    Complete(Vec<Fragment>),
    /// Some candidates did not parse; they sit in `fragments` as
    /// `Fragment::Raw` at their source position
    Partial {
        fragments: Vec<Fragment>,
        undecodable: usize,
    },
    /// Nothing object/array-looking in the frame
    Empty(CodecError),
}

impl CodecResult {
    pub fn fragments(&self) -> &[Fragment] {
        match self {
            CodecResult::Complete(f) | CodecResult::Partial { fragments: f, .. } => f,
            CodecResult::Empty(_) => &[],
        }
    }

    pub fn into_fragments(self) -> Vec<Fragment> {
        match self {
            CodecResult::Complete(f) | CodecResult::Partial { fragments: f, .. } => f,
            CodecResult::Empty(_) => Vec::new(),
        }
    }

    /// Convert into decoded messages, in source order
    pub fn into_messages(self) -> Vec<DecodedMessage> {
        self.into_fragments()
            .into_iter()
            .map(DecodedMessage::from_fragment)
            .collect()
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, CodecResult::Partial { .. })
    }
}

/// Extract the JSON payload from a handshake response body
///
/// `name(<payload>)` yields the interior; anything else yields the first
/// decodable object/array in the text.
pub fn extract_handshake_payload(text: &str) -> Result<&str, CodecError> {
    let trimmed = text.trim();

    if let Some(interior) = strip_callback(trimmed) {
        return Ok(interior);
    }

    Pieces::new(trimmed)
        .find_map(|piece| match piece {
            Piece::Decoded { text, .. } => Some(text),
            Piece::Broken(_) => None,
        })
        .ok_or(CodecError::NoPayload { len: text.len() })
}

/// `identifier(...)` → `...`
fn strip_callback(text: &str) -> Option<&str> {
    if !text.ends_with(')') {
        return None;
    }
    let open = text.find('(')?;
    let name = text[..open].trim_end();
    if name.is_empty() || !name.chars().all(is_callback_char) {
        return None;
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let close = text.rfind(')')?;
    (close > open).then(|| text[open + 1..close].trim())
}

fn is_callback_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
}

/// A span of the input as seen by [`Pieces`]
enum Piece<'a> {
    Decoded { text: &'a str, value: Value },
    /// Bracketed span that did not parse and holds nothing decodable
    Broken(&'a str),
}

/// Walks a text yielding decodable fragments and broken spans in order
///
/// A candidate that fails to decode only becomes `Broken` when no decodable
/// fragment starts inside it; otherwise the walk resumes at that inner
/// fragment, so a stray `{` or `[` in the noise cannot swallow what follows.
struct Pieces<'a> {
    scanner: Scanner<'a>,
}

impl<'a> Pieces<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            scanner: Scanner::new(input),
        }
    }

    fn first_decodable_inside(&self, outer: &Candidate<'a>) -> Option<usize> {
        let input = self.scanner.input();
        let bytes = input.as_bytes();
        (outer.start + 1..outer.end())
            .filter(|&i| bytes[i] == b'{' || bytes[i] == b'[')
            .find(|&i| candidate_at(input, i).and_then(|c| decode(&c)).is_some())
    }
}

impl<'a> Iterator for Pieces<'a> {
    type Item = Piece<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let candidate = self.scanner.next()?;
            if let Some(value) = decode(&candidate) {
                return Some(Piece::Decoded {
                    text: candidate.text,
                    value,
                });
            }
            match self.first_decodable_inside(&candidate) {
                Some(inner) => self.scanner.seek(inner),
                None => return Some(Piece::Broken(candidate.text)),
            }
        }
    }
}

fn decode(candidate: &Candidate<'_>) -> Option<Value> {
    if !candidate.balanced {
        return None;
    }
    serde_json::from_str::<Value>(candidate.text).ok()
}

/// Decode every object/array fragment in a streaming frame
pub fn decode_stream(text: &str) -> CodecResult {
    let mut fragments = Vec::new();
    let mut undecodable = 0;

    for piece in Pieces::new(text) {
        match piece {
            Piece::Decoded { value, .. } => fragments.push(Fragment::Structured(value)),
            Piece::Broken(raw) => {
                undecodable += 1;
                fragments.push(Fragment::Raw(raw.to_string()));
            }
        }
    }

    if fragments.is_empty() {
        CodecResult::Empty(CodecError::NoPayload { len: text.len() })
    } else if undecodable > 0 {
        CodecResult::Partial {
            fragments,
            undecodable,
        }
    } else {
        CodecResult::Complete(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jsonp_body_is_unwrapped() {
        let body = r#"cb({"ConnectionToken":"abc123"})"#;
        assert_eq!(
            extract_handshake_payload(body).unwrap(),
            r#"{"ConnectionToken":"abc123"}"#
        );
    }

    #[test]
    fn test_jquery_style_callback_with_whitespace() {
        let body = "  jQuery1124018846644728821516_1759907136799({\"a\":[1,2]});\n";
        // trailing ';' is not a call ending in ')', falls back to the scanner
        assert_eq!(extract_handshake_payload(body).unwrap(), r#"{"a":[1,2]}"#);

        let body = "jQuery.cb_1 ( [1, {\"b\":2}] )";
        assert_eq!(extract_handshake_payload(body).unwrap(), r#"[1, {"b":2}]"#);
    }

    #[test]
    fn test_plain_json_is_returned_as_is() {
        for body in [r#"{"ConnectionId":"x","Nested":{"a":[1]}}"#, "[1,2,3]"] {
            assert_eq!(extract_handshake_payload(body).unwrap(), body);
        }
    }

    #[test]
    fn test_handshake_without_payload() {
        assert_eq!(
            extract_handshake_payload("<html>gateway timeout</html>"),
            Err(CodecError::NoPayload { len: 28 })
        );
    }

    #[test]
    fn test_stream_fragments_in_source_order() {
        let frame = r#"a {"x":1} b [2] c {"y":{"z":[3]}} d"#;
        let result = decode_stream(frame);
        assert_eq!(
            result,
            CodecResult::Complete(vec![
                Fragment::Structured(json!({"x": 1})),
                Fragment::Structured(json!([2])),
                Fragment::Structured(json!({"y": {"z": [3]}})),
            ])
        );
    }

    #[test]
    fn test_bad_fragment_does_not_lose_siblings() {
        let frame = r#"{"ok":1} {"bad":tru} {"ok":2}"#;
        let result = decode_stream(frame);
        assert!(result.is_partial());
        assert_eq!(
            result.into_fragments(),
            vec![
                Fragment::Structured(json!({"ok": 1})),
                Fragment::Raw(r#"{"bad":tru}"#.to_string()),
                Fragment::Structured(json!({"ok": 2})),
            ]
        );
    }

    fn structured(result: CodecResult) -> Vec<Value> {
        result
            .into_fragments()
            .into_iter()
            .filter_map(|f| match f {
                Fragment::Structured(v) => Some(v),
                Fragment::Raw(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_stray_opener_does_not_swallow_fragments() {
        let result = decode_stream(r#"noise [ref {"ok":1} more {"ok":2}"#);
        assert_eq!(
            result,
            CodecResult::Complete(vec![
                Fragment::Structured(json!({"ok": 1})),
                Fragment::Structured(json!({"ok": 2})),
            ])
        );

        let result = decode_stream(r#"{"a":1, [1,2] ]x {"b":2}"#);
        assert_eq!(structured(result), vec![json!([1, 2]), json!({"b": 2})]);

        // Nothing decodable inside a broken span keeps it as one raw piece
        let result = decode_stream(r#"{"a":[1,2} tail {"b":2}"#);
        assert_eq!(
            result.into_fragments(),
            vec![
                Fragment::Raw(r#"{"a":[1,2}"#.to_string()),
                Fragment::Structured(json!({"b": 2})),
            ]
        );
    }

    #[test]
    fn test_unterminated_fragment_before_valid_one() {
        let frame = r#"{"broken":"x", [1,2] {"ok":true}"#;
        assert_eq!(structured(decode_stream(frame)), vec![json!([1, 2]), json!({"ok": true})]);

        let result = decode_stream(r#"{"ok":1} {"cut":"#);
        assert_eq!(
            result.into_fragments(),
            vec![
                Fragment::Structured(json!({"ok": 1})),
                Fragment::Raw(r#"{"cut":"#.to_string()),
            ]
        );
    }

    #[test]
    fn test_handshake_payload_after_stray_opener() {
        assert_eq!(
            extract_handshake_payload(r#"note { see below {"ConnectionToken":"abc"}"#).unwrap(),
            r#"{"ConnectionToken":"abc"}"#
        );
        assert_eq!(
            extract_handshake_payload(r#"[warn] {"ConnectionId":"x"}"#).unwrap(),
            r#"{"ConnectionId":"x"}"#
        );
    }

    #[test]
    fn test_random_noise_keeps_every_fragment() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        const NOISE: &[u8] = b"abc xyz{[\"\\:,0123";

        let mut rng = StdRng::seed_from_u64(0x5eed);
        for round in 0..500 {
            let n = rng.gen_range(0..6);
            let expected: Vec<Value> = (0..n)
                .map(|i| match rng.gen_range(0..3) {
                    0 => json!({"n": i}),
                    1 => json!([i, {"n": i, "s": "x}]{["}]),
                    _ => json!({"n": i, "M": [{"H": "newshub", "A": ["{\"q\":1}"]}]}),
                })
                .collect();

            let mut frame = String::new();
            for value in &expected {
                let len = rng.gen_range(1..12);
                let noise: String = (0..len)
                    .map(|_| NOISE[rng.gen_range(0..NOISE.len())] as char)
                    .collect();
                // A letter keeps noise from forming valid JSON with a neighbour
                frame.push('z');
                frame.push_str(&noise);
                frame.push_str(&value.to_string());
            }
            frame.push_str(" tail{[\"");

            assert_eq!(
                structured(decode_stream(&frame)),
                expected,
                "round {} frame {:?}",
                round,
                frame
            );
        }
    }

    #[test]
    fn test_empty_frame_is_an_error() {
        assert!(matches!(decode_stream("   "), CodecResult::Empty(_)));
    }

    #[test]
    fn test_news_update_frame() {
        let frame = r#"{"M":[{"H":"newshub","M":"sendUpdates","A":["[{\"Title\":\"X\"}]"]}]}"#;
        let messages = decode_stream(frame).into_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].invocations.len(), 1);
        assert_eq!(messages[0].invocations[0].hub, "newshub");
        assert_eq!(
            messages[0].value(),
            Some(&serde_json::from_str::<Value>(frame).unwrap())
        );
    }
}
