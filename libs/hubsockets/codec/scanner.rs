//! Balanced object/array scanner
//!
//! Finds `{...}` / `[...]` candidates inside arbitrary text. Brackets inside
//! JSON string literals (including escaped quotes) do not count towards
//! nesting. Text outside any candidate is noise and is skipped.
//!
//! The scanner is purely structural: after a candidate it resumes at the
//! candidate's end whether or not the brackets matched. Recovering fragments
//! that start inside a broken span is up to the caller, via [`Scanner::seek`]
//! and [`candidate_at`].

/// One candidate found by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub text: &'a str,
    /// Byte offset of the opening bracket in the scanned input
    pub start: usize,
    /// `false` when the brackets mismatched or the input ended mid-fragment
    pub balanced: bool,
}

impl Candidate<'_> {
    /// Byte offset just past the candidate
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// Iterator over candidates in source order
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Continue scanning from byte offset `pos`
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Candidate<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.input.as_bytes()[self.pos..];
        let offset = rest.iter().position(|&b| b == b'{' || b == b'[')?;
        let candidate = scan_from(self.input, self.pos + offset);
        self.pos = candidate.end();
        Some(candidate)
    }
}

/// Scan the candidate opening at byte offset `start`
///
/// `None` when `input[start]` is not `{` or `[`.
pub fn candidate_at(input: &str, start: usize) -> Option<Candidate<'_>> {
    match input.as_bytes().get(start) {
        Some(b'{') | Some(b'[') => Some(scan_from(input, start)),
        _ => None,
    }
}

fn scan_from(input: &str, start: usize) -> Candidate<'_> {
    let bytes = input.as_bytes();
    let mut expected: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => expected.push(b'}'),
            b'[' => expected.push(b']'),
            b'}' | b']' => {
                if expected.pop() != Some(b) {
                    return Candidate {
                        text: &input[start..=i],
                        start,
                        balanced: false,
                    };
                }
                if expected.is_empty() {
                    return Candidate {
                        text: &input[start..=i],
                        start,
                        balanced: true,
                    };
                }
            }
            _ => {}
        }
        i += 1;
    }

    Candidate {
        text: &input[start..],
        start,
        balanced: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<(&str, bool)> {
        Scanner::new(input).map(|c| (c.text, c.balanced)).collect()
    }

    #[test]
    fn test_nested_fragment_is_one_candidate() {
        let input = r#"{"M":[{"H":"newshub","A":[1,2]}]}"#;
        assert_eq!(texts(input), vec![(input, true)]);
    }

    #[test]
    fn test_brackets_inside_strings_are_ignored() {
        let input = r#"x {"a":"}]{[","b":"\"}"} y"#;
        assert_eq!(texts(input), vec![(r#"{"a":"}]{[","b":"\"}"}"#, true)]);
    }

    #[test]
    fn test_noise_between_fragments() {
        let input = r#"noise {"a":1} more noise [1,2] end"#;
        assert_eq!(texts(input), vec![(r#"{"a":1}"#, true), ("[1,2]", true)]);
    }

    #[test]
    fn test_mismatched_and_unterminated() {
        let input = r#"{"a":1] {"b":2} {"c":"#;
        assert_eq!(
            texts(input),
            vec![(r#"{"a":1]"#, false), (r#"{"b":2}"#, true), (r#"{"c":"#, false)]
        );
    }

    #[test]
    fn test_candidate_offsets_and_seek() {
        let input = r#"ab [x {"k":1}"#;
        let mut scanner = Scanner::new(input);
        let outer = scanner.next().unwrap();
        assert_eq!((outer.start, outer.end(), outer.balanced), (3, input.len(), false));
        assert!(scanner.next().is_none());

        scanner.seek(6);
        let inner = scanner.next().unwrap();
        assert_eq!(inner.text, r#"{"k":1}"#);
        assert!(inner.balanced);

        assert_eq!(candidate_at(input, 6), Some(inner));
        assert_eq!(candidate_at(input, 0), None);
    }
}
