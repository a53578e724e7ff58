//! Array parameter expansion (spec §4.4 rule 5): `expr = ANY($n)` bound to a
//! list parameter is rewritten to `expr IN (v1, v2, ...)`, since IRIS SQL has
//! no direct `= ANY(array)` construct. Like the vector optimizer, this
//! depends on the bound parameter's *value* so it runs after the cached
//! static translation, not as part of it.
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DecodeError, Result};

/// Matches `<expr> = ANY($n)` / `<expr> = ANY ( $n )`. The left-hand
/// expression is captured greedily but stops at common clause boundaries.
static ANY_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\S+)\s*=\s*ANY\s*\(\s*\$(\d+)\s*\)").unwrap());

#[derive(Debug, Clone)]
pub struct AnyCallSite {
    pub param_index: usize,
}

pub fn find_any_calls(sql: &str) -> Vec<AnyCallSite> {
    ANY_CALL
        .captures_iter(sql)
        .filter_map(|caps| caps[2].parse().ok().map(|param_index| AnyCallSite { param_index }))
        .collect()
}

/// Parse a bound array parameter's text-format value, accepting either a
/// PostgreSQL array literal (`{1,2,3}`) or a JSON array (`[1,2,3]`).
pub fn parse_array_elements(raw: &str) -> Result<Vec<String>> {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        return Ok(split_top_level(inner));
    }
    if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
        return Ok(values
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect());
    }
    Err(DecodeError::Malformed(format!("not a valid array literal: {raw}")).into())
}

fn split_top_level(inner: &str) -> Vec<String> {
    if inner.is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut current = String::new();
    for ch in inner.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '{' if !in_quotes => {
                depth += 1;
                current.push(ch);
            }
            '}' if !in_quotes => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 && !in_quotes => {
                parts.push(current.trim().trim_matches('"').to_string());
                current = String::new();
            }
            _ => current.push(ch),
        }
    }
    parts.push(current.trim().trim_matches('"').to_string());
    parts
}

/// Render one expanded array element as a SQL literal for splicing into an
/// `IN (...)` list. A bare integer or float is passed through unquoted so
/// numeric comparisons don't pick up an implicit string cast; everything
/// else is quoted as a SQL string literal with embedded `'` doubled, the
/// same escaping Postgres itself uses. This also closes the injection path
/// a raw, unescaped splice would otherwise open for elements containing
/// `'` or other SQL metacharacters.
fn quote_element(element: &str) -> String {
    if is_bare_number(element) {
        return element.to_string();
    }
    format!("'{}'", element.replace('\'', "''"))
}

fn is_bare_number(s: &str) -> bool {
    !s.is_empty() && s.parse::<f64>().is_ok()
}

/// Replace `expr = ANY($n)` with `expr IN (v1, v2, ...)` for each site whose
/// parameter index is present in `resolved`.
pub fn expand_any_calls(sql: &str, resolved: &[(usize, Vec<String>)]) -> String {
    let mut out = sql.to_string();
    for (param_index, elements) in resolved {
        let pattern = Regex::new(&format!(r"(?i)(\S+)\s*=\s*ANY\s*\(\s*\${}\s*\)", param_index))
            .expect("generated pattern is valid");
        let in_list = elements.iter().map(|e| quote_element(e)).collect::<Vec<_>>().join(", ");
        out = pattern
            .replace(&out, |caps: &regex::Captures| format!("{} IN ({in_list})", &caps[1]))
            .into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_any_call_site() {
        let sites = find_any_calls("SELECT * FROM t WHERE id = ANY($1)");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].param_index, 1);
    }

    #[test]
    fn parses_postgres_array_literal() {
        assert_eq!(parse_array_elements("{1,2,3}").unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn parses_json_array_literal() {
        assert_eq!(parse_array_elements("[1,2,3]").unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn expands_any_into_in_list() {
        let sql = "SELECT * FROM t WHERE id = ANY($1)";
        let out = expand_any_calls(sql, &[(1, vec!["1".into(), "2".into(), "3".into()])]);
        assert_eq!(out, "SELECT * FROM t WHERE id IN (1, 2, 3)");
    }

    #[test]
    fn expands_text_elements_as_quoted_and_escaped_literals() {
        let sql = "SELECT * FROM t WHERE name = ANY($1)";
        let out = expand_any_calls(
            sql,
            &[(1, vec!["alice".into(), "o'brien".into(), "'); DROP TABLE t--".into()])],
        );
        assert_eq!(
            out,
            "SELECT * FROM t WHERE name IN ('alice', 'o''brien', '''); DROP TABLE t--')"
        );
    }
}
