//! Heuristic negation of predicate *source text*.
//!
//! Legacy `if (guard) throw ..;` preconditions store the negated guard as
//! their condition. The condition tree is negated structurally
//! ([`Expr::negate`](contractor_core::Expr::negate)); this module only
//! produces the matching display string for `original_source`. The output
//! is never parsed or evaluated and may be wrong for predicates with side
//! effects, conditionals or comments.
//!
//! Rules, in order:
//! 1. redundant outer parentheses are dropped;
//! 2. a top-level `||` chain becomes an `&&` chain of negated operands;
//! 3. a top-level `&&` chain becomes an `||` chain of negated operands;
//! 4. a single top-level relational or equality operator is flipped in
//!    place, keeping the surrounding whitespace;
//! 5. `!atom` loses its `!`, `true`/`false` swap;
//! 6. otherwise `!atom` or `!(text)`.

use crate::source_text::{find_argument_end, top_level_offsets};

/// Best-effort textual negation of `text`.
pub fn negate_source_text(text: &str) -> String {
    let t = strip_outer_parens(text.trim());

    let disjuncts = split_top_level(t, "||");
    if disjuncts.len() > 1 {
        return disjuncts
            .iter()
            .map(|d| {
                let n = negate_source_text(d);
                if split_top_level(&n, "||").len() > 1 {
                    format!("({})", n)
                } else {
                    n
                }
            })
            .collect::<Vec<_>>()
            .join(" && ");
    }

    let conjuncts = split_top_level(t, "&&");
    if conjuncts.len() > 1 {
        return conjuncts
            .iter()
            .map(|c| negate_source_text(c))
            .collect::<Vec<_>>()
            .join(" || ");
    }

    if let Some(flipped) = flip_relational(t) {
        return flipped;
    }

    if let Some(rest) = t.strip_prefix('!') {
        let rest = rest.trim_start();
        if is_atomic(rest) {
            return strip_outer_parens(rest).to_string();
        }
    }

    match t {
        "true" => "false".to_string(),
        "false" => "true".to_string(),
        _ if is_atomic(t) => format!("!{}", t),
        _ => format!("!({})", t),
    }
}

/// Drops parentheses that enclose the whole of `s`.
fn strip_outer_parens(mut s: &str) -> &str {
    while s.starts_with('(') {
        match find_argument_end(&s[1..], false) {
            Some(close) if close + 2 == s.len() => s = s[1..close + 1].trim(),
            _ => break,
        }
    }
    s
}

/// Splits `s` at every top-level occurrence of the two-character `op`.
fn split_top_level<'s>(s: &'s str, op: &str) -> Vec<&'s str> {
    let mut parts = Vec::new();
    let mut from = 0;
    let mut skip_until = 0;
    for i in top_level_offsets(s) {
        if i < skip_until {
            continue;
        }
        if s[i..].starts_with(op) {
            parts.push(s[from..i].trim());
            from = i + op.len();
            skip_until = from;
        }
    }
    parts.push(s[from..].trim());
    parts
}

/// Flips the only top-level comparison operator of `t`, if there is exactly
/// one and nothing at the top level makes flipping unsafe.
fn flip_relational(t: &str) -> Option<String> {
    let mut found: Option<(usize, usize, &str)> = None;
    let mut skip_until = 0;
    for i in top_level_offsets(t) {
        if i < skip_until {
            continue;
        }
        let two = t.get(i..i + 2).unwrap_or("");
        let (len, flipped) = match two {
            "==" => (2, "!="),
            "!=" => (2, "=="),
            "<=" => (2, ">"),
            ">=" => (2, "<"),
            // Shifts.
            "<<" | ">>" => {
                skip_until = i + 2;
                continue;
            }
            // Lambdas.
            "=>" => return None,
            _ => match t.as_bytes()[i] {
                b'<' => (1, ">="),
                b'>' => (1, "<="),
                // Conditional or assignment.
                b'?' | b'=' => return None,
                _ => continue,
            },
        };
        if found.is_some() {
            return None;
        }
        found = Some((i, len, flipped));
        skip_until = i + len;
    }
    let (i, len, flipped) = found?;
    Some(format!("{}{}{}", &t[..i], flipped, &t[i + len..]))
}

/// An identifier, member access, call, indexer, literal or parenthesized
/// expression: no top-level whitespace or operators.
fn is_atomic(s: &str) -> bool {
    !s.is_empty()
        && top_level_offsets(s).into_iter().all(|i| {
            let c = s.as_bytes()[i];
            !(c.is_ascii_whitespace() || b"+-*/%<>=!&|^?:".contains(&c)) || (i == 0 && c == b'!')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn relational_flips_keep_whitespace() {
        insta::assert_snapshot!(negate_source_text("x == null"), @"x != null");
        insta::assert_snapshot!(negate_source_text("a<b"), @"a>=b");
        insta::assert_snapshot!(negate_source_text("count >= 0"), @"count < 0");
        insta::assert_snapshot!(negate_source_text("Math.Max(a, b) > limit"), @"Math.Max(a, b) <= limit");
    }

    #[test]
    fn simple_negation_is_removed() {
        insta::assert_snapshot!(negate_source_text("!(x > 0)"), @"x > 0");
        insta::assert_snapshot!(negate_source_text("!IsValid(x)"), @"IsValid(x)");
        insta::assert_snapshot!(negate_source_text("IsValid(x)"), @"!IsValid(x)");
        insta::assert_snapshot!(negate_source_text("true"), @"false");
    }

    #[test]
    fn de_morgan() {
        insta::assert_snapshot!(negate_source_text("x == null || x.Length == 0"), @"x != null && x.Length != 0");
        insta::assert_snapshot!(negate_source_text("a > 0 && (b < 0 || c)"), @"a <= 0 || b >= 0 && !c");
        insta::assert_snapshot!(negate_source_text("a || b && c"), @"!a && (!b || !c)");
    }

    #[test]
    fn operators_inside_literals_and_calls_are_ignored() {
        insta::assert_snapshot!(negate_source_text(r#"s == "a || b""#), @r#"s != "a || b""#);
        insta::assert_snapshot!(negate_source_text("items.All(i => i > 0)"), @"!items.All(i => i > 0)");
    }

    #[test]
    fn fallback_wraps_whole_text() {
        insta::assert_snapshot!(negate_source_text("a < b == c"), @"!(a < b == c)");
        insta::assert_snapshot!(negate_source_text("flag ? x : y"), @"!(flag ? x : y)");
        insta::assert_snapshot!(negate_source_text("x << 2"), @"!(x << 2)");
        insta::assert_snapshot!(negate_source_text("(x)"), @"!x");
    }

    fn relation() -> impl Strategy<Value = String> {
        (
            "[a-z][a-z0-9]{0,5}",
            prop::sample::select(vec!["==", "!=", "<", "<=", ">", ">="]),
            "[a-z0-9]{1,4}",
            prop::sample::select(vec!["", " "]),
        )
            .prop_map(|(l, op, r, ws)| format!("{l}{ws}{op}{ws}{r}"))
    }

    proptest! {
        #[test]
        fn double_negation_of_simple_relations_is_exact(text in relation()) {
            let once = negate_source_text(&text);
            prop_assert_ne!(&once, &text);
            prop_assert_eq!(negate_source_text(&once), text);
        }
    }
}
