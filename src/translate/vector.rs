//! Vector optimizer (spec §4.5): substitutes a bound `TO_VECTOR($n, TYPE)`
//! parameter's decoded value as a JSON literal directly into the SQL text
//! sent to IRIS, instead of passing it through as a bind parameter. IRIS's
//! query planner can only pick the vector index when the literal is visible
//! at parse time, not hidden behind a placeholder.
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, TranslateError};
use crate::types::vector::parse_vector_param;

/// Matches `TO_VECTOR($3, DOUBLE)`, `TO_VECTOR($1,FLOAT)`, etc. inside an
/// `ORDER BY` clause. Capture groups: 1-based parameter index, declared type.
static TO_VECTOR_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TO_VECTOR\(\s*\$(\d+)\s*,\s*([A-Za-z][A-Za-z0-9_]*)\s*\)").unwrap());

static ORDER_BY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)ORDER\s+BY").unwrap());

/// The only declared element types IRIS's `VECTOR` accepts (spec §4.5:
/// "Preserve the declared TYPE (FLOAT/DOUBLE/DECIMAL) to match the table
/// column's declared vector datatype"). A `TO_VECTOR` call naming anything
/// else can never match a real column and is rejected before inlining.
const VALID_VECTOR_TYPES: &[&str] = &["FLOAT", "DOUBLE", "DECIMAL"];

/// One `TO_VECTOR($n, TYPE)` call found in the statement's `ORDER BY` clause.
#[derive(Debug, Clone)]
pub struct VectorCallSite {
    /// 1-based parameter index as it appeared in the original SQL text.
    pub param_index: usize,
    pub declared_type: String,
}

/// Find every `TO_VECTOR($n, TYPE)` call that appears at or after the first
/// `ORDER BY` keyword. Calls earlier in the statement (e.g. in the select
/// list) are left as ordinary bind parameters.
pub fn find_order_by_vector_calls(sql: &str) -> Vec<VectorCallSite> {
    let scan_from = ORDER_BY.find(sql).map(|m| m.start()).unwrap_or(sql.len());
    TO_VECTOR_CALL
        .captures_iter(&sql[scan_from..])
        .filter_map(|caps| {
            let param_index: usize = caps[1].parse().ok()?;
            Some(VectorCallSite { param_index, declared_type: caps[2].to_string() })
        })
        .collect()
}

/// Replace every `TO_VECTOR($n, TYPE)` occurrence whose `$n` is in
/// `resolved` with `TO_VECTOR('[...]', TYPE)`, where `[...]` is the decoded
/// vector re-rendered as a JSON array literal. `resolved` maps parameter
/// index (1-based) to its raw text-format parameter value.
pub fn inline_vector_literals(sql: &str, resolved: &[(usize, String)]) -> Result<String> {
    let mut out = sql.to_string();
    for (param_index, raw_value) in resolved {
        let floats = parse_vector_param(raw_value)
            .map_err(|_| TranslateError::invalid_parameter(format!("parameter ${param_index} is not a valid vector")))?;
        let literal = crate::types::vector::to_json_literal(&floats);
        let pattern = Regex::new(&format!(
            r"TO_VECTOR\(\s*\${}\s*,\s*([A-Za-z][A-Za-z0-9_]*)\s*\)",
            param_index
        ))
        .expect("generated pattern is valid");
        let mut rejected = None;
        out = pattern.replace(&out, |caps: &regex::Captures| {
            let declared_type = caps[1].to_string();
            if !VALID_VECTOR_TYPES.iter().any(|t| t.eq_ignore_ascii_case(&declared_type)) {
                rejected = Some(declared_type.clone());
            }
            format!("TO_VECTOR('{literal}', {declared_type})")
        }).into_owned();
        if let Some(declared_type) = rejected {
            return Err(TranslateError::invalid_parameter(format!(
                "parameter ${param_index} declares vector type \"{declared_type}\", which does not match the column's declared vector datatype (expected FLOAT, DOUBLE, or DECIMAL)"
            ))
            .into());
        }
    }
    Ok(out)
}

/// Renumber the remaining `$n` placeholders after `consumed` parameter
/// indices (1-based, sorted ascending) have been spliced out of the
/// parameter list. E.g. consuming `$2` out of a 3-parameter statement turns
/// `$1, $3` into `$1, $2`.
pub fn renumber_placeholders(sql: &str, consumed: &[usize]) -> String {
    if consumed.is_empty() {
        return sql.to_string();
    }
    let placeholder = Regex::new(r"\$(\d+)").unwrap();
    placeholder
        .replace_all(sql, |caps: &regex::Captures| {
            let n: usize = caps[1].parse().unwrap();
            if consumed.contains(&n) {
                // Already substituted as a literal; any leftover reference is
                // a bug in the caller, but degrade to passthrough rather than
                // panicking mid-protocol.
                return format!("${n}");
            }
            let shift = consumed.iter().filter(|&&c| c < n).count();
            format!("${}", n - shift)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_vector_call_in_order_by() {
        let sql = "SELECT id FROM docs ORDER BY embedding <=> TO_VECTOR($2, DOUBLE) LIMIT 5";
        let calls = find_order_by_vector_calls(sql);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].param_index, 2);
        assert_eq!(calls[0].declared_type, "DOUBLE");
    }

    #[test]
    fn ignores_vector_calls_before_order_by() {
        let sql = "SELECT TO_VECTOR($1, DOUBLE) FROM docs ORDER BY id";
        assert!(find_order_by_vector_calls(sql).is_empty());
    }

    #[test]
    fn inlines_literal_and_keeps_declared_type() {
        let sql = "SELECT id FROM docs ORDER BY embedding <=> TO_VECTOR($2, DOUBLE)";
        let out = inline_vector_literals(sql, &[(2, "[1,2,3]".to_string())]).unwrap();
        assert_eq!(out, "SELECT id FROM docs ORDER BY embedding <=> TO_VECTOR('[1,2,3]', DOUBLE)");
    }

    #[test]
    fn rejects_declared_type_outside_the_iris_vector_type_set() {
        let sql = "SELECT id FROM docs ORDER BY embedding <=> TO_VECTOR($2, INTEGER)";
        let err = inline_vector_literals(sql, &[(2, "[1,2,3]".to_string())]).unwrap_err();
        assert_eq!(err.sqlstate(), crate::error::Sqlstate::INVALID_PARAMETER_VALUE);
    }

    #[test]
    fn renumbers_remaining_placeholders_after_consuming_one() {
        let sql = "SELECT $1, $3 FROM t WHERE $1 = $3";
        let out = renumber_placeholders(sql, &[2]);
        assert_eq!(out, "SELECT $1, $2 FROM t WHERE $1 = $2");
    }
}
