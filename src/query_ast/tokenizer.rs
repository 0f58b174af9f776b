//! Flat, position-free tokenizer for the SQL subset.
//!
//! Tokens are slices of the input. A fixed set of special characters always
//! stands alone as a one-character token; everything else accumulates into
//! identifiers until whitespace or a special character. A quote additionally
//! captures everything up to the matching quote as a single content token, so
//! `'a b'` becomes `'`, `a b`, `'`. An unterminated quote yields only the
//! opening quote and the remaining text, which the parser then rejects.

pub type Token<'a> = &'a str;

const SPECIALS: &[char] = &[
    '=', '(', ')', '"', '\'', '.', ',', '-', '+', '*', '/', ';', '<', '>', '!',
];

pub(crate) fn is_quote(token: &str) -> bool {
    token == "\"" || token == "'"
}

pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i < text.len() {
        let Some(c) = text[i..].chars().next() else { break };
        let next = i + c.len_utf8();

        if c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push(&text[s..i]);
            }
            i = next;
            continue;
        }

        if SPECIALS.contains(&c) {
            if let Some(s) = start.take() {
                out.push(&text[s..i]);
            }
            out.push(&text[i..next]);
            i = next;
            if c == '"' || c == '\'' {
                match text[next..].find(c) {
                    Some(len) => {
                        let close = next + len;
                        out.push(&text[next..close]);
                        out.push(&text[close..close + 1]);
                        i = close + 1;
                    }
                    None => {
                        out.push(&text[next..]);
                        i = text.len();
                    }
                }
            }
            continue;
        }

        if start.is_none() {
            start = Some(i);
        }
        i = next;
    }

    if let Some(s) = start {
        out.push(&text[s..]);
    }
    out
}
