//! Bracket and quote balancing.
//!
//! Repairs exactly-one imbalances that routinely show up in scraped
//! definition text: a single unmatched closing bracket, or a single missing
//! closing quote. Larger imbalances are left untouched — they're more
//! likely a genuine structural problem than a trivial scrape artifact.

/// Outcome of a [`balance`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceResult {
    pub text: String,
    pub changed: bool,
    pub reason: Option<String>,
}

const PAIRS: &[(char, char)] = &[('(', ')'), ('[', ']'), ('{', '}')];
const CURLY_QUOTE_PAIRS: &[(char, char)] = &[('\u{201c}', '\u{201d}'), ('\u{2018}', '\u{2019}')];

/// Balance brackets and quotes in `text`, returning the (possibly repaired)
/// text along with whether anything changed and why.
#[must_use]
pub fn balance(text: &str) -> BalanceResult {
    let mut working = text.to_string();
    let mut reasons = Vec::new();

    for &(open, close) in PAIRS {
        let opens = working.matches(open).count();
        let closes = working.matches(close).count();
        if opens == closes + 1 {
            working.push(close);
            reasons.push(format!("appended missing '{close}'"));
        } else if closes == opens + 1 {
            working = strip_one_unmatched_close(&working, open, close);
            reasons.push(format!("stripped unmatched trailing '{close}'"));
        }
    }

    for &(open, close) in CURLY_QUOTE_PAIRS {
        let opens = working.matches(open).count();
        let closes = working.matches(close).count();
        if opens == closes + 1 {
            working.push(close);
            reasons.push(format!("appended missing '{close}'"));
        } else if closes == opens + 1 {
            working = strip_one_unmatched_close(&working, open, close);
            reasons.push(format!("stripped unmatched trailing '{close}'"));
        }
    }

    working = balance_quotes(&working, &mut reasons);

    let changed = working != text;
    BalanceResult {
        changed,
        reason: if changed { Some(reasons.join("; ")) } else { None },
        text: working,
    }
}

/// With the imbalance known to be exactly one extra close-bracket, find and
/// drop the single one with no matching opener, scanning left to right and
/// tracking open depth.
fn strip_one_unmatched_close(text: &str, open: char, close: char) -> String {
    let mut depth = 0i32;
    let mut out = String::with_capacity(text.len());
    let mut dropped = false;
    for c in text.chars() {
        if c == open {
            depth += 1;
            out.push(c);
        } else if c == close {
            if depth > 0 {
                depth -= 1;
                out.push(c);
            } else if !dropped {
                dropped = true;
            } else {
                out.push(c);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn balance_quotes(text: &str, reasons: &mut Vec<String>) -> String {
    let double_quotes = text.matches('"').count();
    if double_quotes % 2 == 1 {
        reasons.push("appended missing closing double quote".to_string());
        return format!("{text}\"");
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_balanced_is_unchanged() {
        let result = balance("a (balanced) sentence [with] {brackets}");
        assert!(!result.changed);
        assert!(result.reason.is_none());
    }

    #[test]
    fn appends_missing_closing_paren() {
        let result = balance("a (partial sentence");
        assert!(result.changed);
        assert_eq!(result.text, "a (partial sentence)");
    }

    #[test]
    fn strips_unmatched_leading_close_bracket() {
        let result = balance("stray ) close paren");
        assert!(result.changed);
        assert_eq!(result.text, "stray  close paren");
    }

    #[test]
    fn appends_missing_closing_quote() {
        let result = balance("a \"dangling quote");
        assert!(result.changed);
        assert_eq!(result.text, "a \"dangling quote\"");
    }

    #[test]
    fn handles_multiple_bracket_kinds_independently() {
        let result = balance("mixed (paren and [bracket");
        assert!(result.changed);
        assert_eq!(result.text, "mixed (paren and [bracket])");
    }
}
