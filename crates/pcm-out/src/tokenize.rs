//! Comma-list tokenizing with empty tokens preserved.
//!
//! `"a,,b"` yields `"a"`, `""`, `"b"`. Whitespace following a comma is skipped.
//! Empty tokens are what lets option lists carry earlier values forward.

/// Iterator over the comma-separated tokens of a string.
#[derive(Clone, Debug)]
pub struct Tokens<'a> {
    rest: Option<&'a str>,
}

impl<'a> Tokens<'a> {
    pub fn new(list: &'a str) -> Self {
        Self { rest: Some(list) }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let s = self.rest?;
        match s.find(',') {
            Some(at) => {
                self.rest = Some(s[at + 1..].trim_start());
                Some(&s[..at])
            }
            None => {
                self.rest = None;
                Some(s)
            }
        }
    }
}

/// Number of tokens in `list`: one more than its commas, 0 when absent.
pub fn token_count(list: Option<&str>) -> usize {
    list.map_or(0, |s| 1 + s.matches(',').count())
}

/// Parse the leading number of `token`, 0.0 when there is none.
///
/// Trailing garbage is ignored (`"440Hz"` is 440).
pub fn parse_number(token: &str) -> f64 {
    let s = token.trim_start();
    let mut end = s
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(s.len());
    while end > 0 {
        if let Ok(v) = s[..end].parse::<f64>() {
            return v;
        }
        end -= 1;
    }
    0.0
}

/// Parse `count` entries from `list`, repeating the previous entry for empty or
/// missing tokens. The first entry falls back to `baseline`.
pub fn carry_forward<T: Clone>(
    list: Option<&str>,
    count: usize,
    baseline: T,
    parse: impl FnMut(&str) -> T,
) -> Vec<T> {
    carry_forward_with(list, count, baseline, parse, T::clone)
}

/// Like [`carry_forward`], but empty or missing tokens take `carry(previous)`.
pub fn carry_forward_with<T: Clone>(
    list: Option<&str>,
    count: usize,
    baseline: T,
    mut parse: impl FnMut(&str) -> T,
    carry: impl Fn(&T) -> T,
) -> Vec<T> {
    let mut tokens = list.map(Tokens::new);
    let mut out: Vec<T> = Vec::with_capacity(count);
    for _ in 0..count {
        let token = tokens.as_mut().and_then(Iterator::next);
        let value = match (token, out.last()) {
            (Some(t), _) if !t.is_empty() => parse(t),
            (_, Some(prev)) => carry(prev),
            (_, None) => baseline.clone(),
        };
        out.push(value);
    }
    out
}
