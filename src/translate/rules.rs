//! Text-level transform rules applied, in order, to PostgreSQL-dialect SQL
//! before it is sent to IRIS (spec §4.4).
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::error::{Result, TranslateError};
use crate::oid::{Kind, OidGenerator};

static PUBLIC_SCHEMA_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpublic\.([A-Za-z_][A-Za-z0-9_]*)").unwrap());

static PUBLIC_SCHEMA_COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"table_schema\s*=\s*'public'")
        .case_insensitive(true)
        .build()
        .unwrap()
});

static TOP_N: LazyLock<Regex> =
    LazyLock::new(|| RegexBuilder::new(r"\bTOP\s+(\d+)\b").case_insensitive(true).build().unwrap());

static ORDER_BY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)\bORDER\s+BY\b").unwrap());

static BEGIN_STMT: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^\s*BEGIN\b").case_insensitive(true).build().unwrap()
});

/// An operand of a pgvector distance operator: a call like `TO_VECTOR($1,
/// DOUBLE)` (args may contain spaces/commas so long as parens don't nest), a
/// bare parenthesized group, or a single non-whitespace token. Tried in that
/// order so a function call isn't cut short at its first internal space.
const OPERAND: &str = r"(?:[A-Za-z_][\w.]*\([^()]*\)|\([^()]*\)|\S+)";

static COSINE_DISTANCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?s)({OPERAND})\s*<=>\s*({OPERAND})")).unwrap());
static DOT_PRODUCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?s)({OPERAND})\s*<#>\s*({OPERAND})")).unwrap());

static REGCLASS_CAST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([A-Za-z_][\w.]*)'::regclass").unwrap());

static ADMIN_VERBS: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^\s*(VACUUM|CLUSTER)\b").case_insensitive(true).build().unwrap()
});

/// pgvector-only features IRIS has no equivalent for (spec §4.4 rule 9):
/// `halfvec`/`sparsevec` types, `avg(vector)`, and the L1 (`<+>`/`l1_distance`)
/// and Hamming (`<~>`/`hamming_distance`) distance operators/functions.
static VECTOR_ONLY_FEATURES: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"\b(halfvec|sparsevec|avg\s*\(\s*vector\b|l1_distance|hamming_distance)\b|<\+>|<~>")
        .case_insensitive(true)
        .build()
        .unwrap()
});

/// Rule 1: `public.<ident>` -> `SQLUser.<ident>`; `table_schema = 'public'`
/// (case-insensitive) -> `table_schema = 'SQLUser'`. `%SYS` and explicit
/// `SQLUser` pass through untouched.
pub fn schema_qualifier(sql: &str) -> String {
    let sql = PUBLIC_SCHEMA_IDENT.replace_all(sql, "SQLUser.$1");
    PUBLIC_SCHEMA_COMPARISON.replace_all(&sql, "table_schema = 'SQLUser'").into_owned()
}

/// Rule 2: `TOP n` -> `LIMIT n`, moved after `ORDER BY` (IRIS, unlike
/// PostgreSQL, places `TOP` right after `SELECT`).
pub fn top_to_limit(sql: &str) -> String {
    let Some(m) = TOP_N.find(sql) else { return sql.to_string() };
    let n: &str = &TOP_N.captures(sql).unwrap()[1];
    let mut without_top = String::with_capacity(sql.len());
    without_top.push_str(&sql[..m.start()]);
    without_top.push_str(&sql[m.end()..]);

    let limit_clause = format!(" LIMIT {n}");
    match ORDER_BY.find(&without_top) {
        Some(_) => format!("{} {}", without_top.trim_end(), limit_clause.trim()),
        None => format!("{}{}", without_top.trim_end(), limit_clause),
    }
}

/// Rule 6: `BEGIN` -> `START TRANSACTION`; `COMMIT`/`ROLLBACK` pass through.
pub fn transaction_control(sql: &str) -> String {
    BEGIN_STMT.replace(sql, "START TRANSACTION").into_owned()
}

/// Rule 7: pgvector distance operators. `<=>`/`<#>` rewrite to IRIS vector
/// functions; `<->` (L2) is surfaced as `feature_not_supported` since IRIS
/// has no L2/Euclidean vector distance function (spec Non-goals).
pub fn pgvector_operators(sql: &str) -> Result<String> {
    if contains_l2_operator(sql) {
        return Err(TranslateError::feature_not_supported("L2 distance is not implemented").into());
    }
    let sql = COSINE_DISTANCE.replace_all(sql, "VECTOR_COSINE($1,$2)");
    let sql = DOT_PRODUCT.replace_all(&sql, "-VECTOR_DOT_PRODUCT($1,$2)");
    Ok(sql.into_owned())
}

/// `<->` must be detected without tripping on the `<=>`/`<#>` tokens, whose
/// second character also happens to precede a `>`.
fn contains_l2_operator(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i + 2 < bytes.len() {
        if bytes[i] == b'<' && bytes[i + 1] == b'-' && bytes[i + 2] == b'>' {
            return true;
        }
        i += 1;
    }
    false
}

/// Rule 8: `'name'::regclass` -> the deterministic OID literal for `name`.
pub fn resolve_regclass_casts(sql: &str, oidgen: &OidGenerator, namespace: &str) -> String {
    REGCLASS_CAST
        .replace_all(sql, |caps: &regex::Captures| {
            let ident = &caps[1];
            let (ns, name) = match ident.split_once('.') {
                Some((ns, name)) => (ns, name),
                None => (namespace, ident),
            };
            oidgen.oid(ns, Kind::Table, name).to_string()
        })
        .into_owned()
}

/// Rule 9: administrative verbs and pgvector-only features IRIS cannot
/// execute. Connection remains usable; caller reports `feature_not_supported`.
pub fn check_unsupported(sql: &str) -> Result<()> {
    if let Some(m) = ADMIN_VERBS.find(sql) {
        return Err(TranslateError::feature_not_supported(format!(
            "administrative statement \"{}\" is not supported",
            m.as_str().trim()
        ))
        .into());
    }
    if let Some(m) = VECTOR_ONLY_FEATURES.find(sql) {
        return Err(TranslateError::feature_not_supported(format!(
            "\"{}\" has no IRIS equivalent",
            m.as_str()
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_public_schema_qualifier() {
        assert_eq!(schema_qualifier("SELECT * FROM public.accounts"), "SELECT * FROM SQLUser.accounts");
    }

    #[test]
    fn leaves_sys_and_sqluser_alone() {
        assert_eq!(schema_qualifier("SELECT * FROM %SYS.t"), "SELECT * FROM %SYS.t");
        assert_eq!(schema_qualifier("SELECT * FROM SQLUser.t"), "SELECT * FROM SQLUser.t");
    }

    #[test]
    fn rewrites_table_schema_comparison() {
        assert_eq!(
            schema_qualifier("WHERE table_schema = 'public'"),
            "WHERE table_schema = 'SQLUser'"
        );
    }

    #[test]
    fn moves_top_after_order_by() {
        assert_eq!(
            top_to_limit("SELECT TOP 5 * FROM t ORDER BY id"),
            "SELECT  * FROM t ORDER BY id LIMIT 5"
        );
    }

    #[test]
    fn top_without_order_by_appends_limit() {
        assert_eq!(top_to_limit("SELECT TOP 5 * FROM t"), "SELECT  * FROM t LIMIT 5");
    }

    #[test]
    fn begin_becomes_start_transaction() {
        assert_eq!(transaction_control("BEGIN"), "START TRANSACTION");
        assert_eq!(transaction_control("COMMIT"), "COMMIT");
    }

    #[test]
    fn cosine_and_dot_product_rewrite() {
        assert_eq!(pgvector_operators("a <=> b").unwrap(), "VECTOR_COSINE(a,b)");
        assert_eq!(pgvector_operators("a <#> b").unwrap(), "-VECTOR_DOT_PRODUCT(a,b)");
    }

    #[test]
    fn l2_distance_is_rejected() {
        let err = pgvector_operators("v <-> '[1,2,3]'").unwrap_err();
        assert_eq!(err.sqlstate(), crate::error::Sqlstate::FEATURE_NOT_SUPPORTED);
    }

    #[test]
    fn rejects_vacuum() {
        assert!(check_unsupported("VACUUM t").is_err());
    }

    #[test]
    fn rejects_halfvec() {
        assert!(check_unsupported("CREATE TABLE t (v halfvec(3))").is_err());
    }

    #[test]
    fn rejects_l1_and_hamming_distance() {
        let l1_operator = check_unsupported("SELECT * FROM t ORDER BY v <+> '[1,2,3]'").unwrap_err();
        assert_eq!(l1_operator.sqlstate(), crate::error::Sqlstate::FEATURE_NOT_SUPPORTED);

        let l1_function = check_unsupported("SELECT l1_distance(v, '[1,2,3]') FROM t").unwrap_err();
        assert_eq!(l1_function.sqlstate(), crate::error::Sqlstate::FEATURE_NOT_SUPPORTED);

        let hamming_operator = check_unsupported("SELECT * FROM t ORDER BY v <~> '101'").unwrap_err();
        assert_eq!(hamming_operator.sqlstate(), crate::error::Sqlstate::FEATURE_NOT_SUPPORTED);

        let hamming_function = check_unsupported("SELECT hamming_distance(v, '101') FROM t").unwrap_err();
        assert_eq!(hamming_function.sqlstate(), crate::error::Sqlstate::FEATURE_NOT_SUPPORTED);
    }
}
