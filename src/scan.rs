//! String scanning helpers shared by the query parser and the expression
//! compiler. All of them work on plain `&str` slices and the grammar rules in
//! `pql.pest`; none of them allocate beyond the returned collections.

use pest::iterators::Pair;
use pest::Parser as _;

use crate::error::{PqlError, Result};
use crate::parser::{PqlParser, Rule};

/// The unconsumed tail of a query, always kept free of leading whitespace.
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input.trim(),
        }
    }

    pub fn rest(&self) -> &'a str {
        self.rest
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    /// Whether the remaining input begins with `rule`. Nothing is consumed.
    pub fn starts_with(&self, rule: Rule) -> bool {
        split_match(rule, self.rest).is_some()
    }

    /// Consumes `rule` from the front of the remaining input.
    pub fn take(&mut self, rule: Rule) -> Result<Pair<'a, Rule>> {
        let pair = PqlParser::parse(rule, self.rest)?
            .next()
            .ok_or_else(|| PqlError::syntax(format!("expected {:?} at {:?}", rule, self.rest)))?;
        self.rest = self.rest[pair.as_span().end()..].trim_start();
        Ok(pair)
    }
}

/// Matches `rule` at the start of `input` and returns the matched text along
/// with the (trimmed) remainder. `None` when the rule does not match.
pub fn split_match(rule: Rule, input: &str) -> Option<(&str, &str)> {
    let input = input.trim();
    let pair = PqlParser::parse(rule, input).ok()?.next()?;
    let end = pair.as_span().end();
    Some((&input[..end], input[end..].trim_start()))
}

/// A non-empty match found by [`find_all`].
#[derive(Clone, Debug)]
pub struct Match<'a> {
    /// Byte offset of the match inside the scanned text.
    pub start: usize,
    pub pair: Pair<'a, Rule>,
}

impl<'a> Match<'a> {
    pub fn end(&self) -> usize {
        self.start + self.pair.as_str().len()
    }

    pub fn as_str(&self) -> &'a str {
        self.pair.as_str()
    }
}

/// Every non-overlapping match of `rule` in `input`, left to right. Text that
/// does not start a match is skipped one character at a time.
pub fn find_all(rule: Rule, input: &str) -> Vec<Match<'_>> {
    let mut matches = Vec::new();
    let mut offset = 0;

    while offset < input.len() {
        let rest = &input[offset..];
        match PqlParser::parse(rule, rest).ok().and_then(|mut pairs| pairs.next()) {
            Some(pair) if !pair.as_str().is_empty() => {
                let len = pair.as_span().end();
                matches.push(Match {
                    start: offset,
                    pair,
                });
                offset += len;
            }
            _ => offset += rest.chars().next().map_or(1, char::len_utf8),
        }
    }

    matches
}

/// Like [`find_all`], but drops matches that begin inside a longer word, so
/// `s` is not found in `1s`.
pub fn find_words(rule: Rule, input: &str) -> Vec<Match<'_>> {
    find_all(rule, input)
        .into_iter()
        .filter(|found| {
            !input[..found.start].ends_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
        })
        .collect()
}

/// Replaces the contents of every double-quoted run with spaces, keeping the
/// quotes. An unterminated quote blanks the rest of the input.
pub fn mask_quoted(input: &str) -> String {
    let mut quoted = false;
    input
        .chars()
        .map(|c| match c {
            '"' => {
                quoted = !quoted;
                c
            }
            _ if quoted => ' ',
            _ => c,
        })
        .collect()
}

/// Splits on a literal delimiter and trims each piece. Nesting is not
/// tracked, so callers isolate bracketed regions first.
pub fn split_delimited(input: &str, delimiter: char) -> Vec<&str> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    input.split(delimiter).map(str::trim).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_match() {
        assert_eq!(
            split_match(Rule::design_entity, "  stmt s, t;"),
            Some(("stmt", "s, t;"))
        );
        assert_eq!(split_match(Rule::design_entity, "stmts;"), None);
        assert_eq!(split_match(Rule::design_entity, ""), None);
    }

    #[test]
    fn test_cursor_take() {
        let mut cursor = Cursor::new(" stmt s;  Select s ");
        assert!(cursor.starts_with(Rule::declaration_head));
        let decl = cursor.take(Rule::declaration).unwrap();
        assert_eq!(decl.as_str(), "stmt s;");
        assert_eq!(cursor.rest(), "Select s");
        assert!(!cursor.starts_with(Rule::declaration_head));
        assert!(cursor.take(Rule::declaration).is_err());
        assert_eq!(cursor.rest(), "Select s");
    }

    #[test]
    fn test_find_all() {
        let found = find_all(Rule::expr_token, "x + 12*(y)");
        let texts = found.iter().map(Match::as_str).collect::<Vec<_>>();
        assert_eq!(texts, ["x", "+", "12", "*", "(", "y", ")"]);
        assert_eq!(found[2].start, 4);
        assert_eq!(found[2].end(), 6);

        assert!(find_all(Rule::expr_token, "").is_empty());
        assert!(find_all(Rule::expr_token, "  ").is_empty());
    }

    #[test]
    fn test_find_words() {
        let found = find_words(Rule::synonym, "s1, 1s x_y ab");
        let texts = found.iter().map(Match::as_str).collect::<Vec<_>>();
        assert_eq!(texts, ["s1", "x", "ab"]);
    }

    #[test]
    fn test_mask_quoted() {
        assert_eq!(mask_quoted("a, \"bc\" d"), "a, \"  \" d");
        assert_eq!(mask_quoted("\"x, y"), "\"    ");
        assert_eq!(mask_quoted("plain"), "plain");
    }

    #[test]
    fn test_split_delimited() {
        assert_eq!(split_delimited(" a, b.stmt# ,c ", ','), ["a", "b.stmt#", "c"]);
        assert_eq!(split_delimited("a,,b", ','), ["a", "", "b"]);
        assert!(split_delimited("   ", ',').is_empty());
    }
}
