//! IRIS system function registry (spec §4.4 rule 3).
use std::sync::LazyLock;

use regex::Regex;

/// `(postgres-spelling regex, iris replacement template)` pairs. Templates
/// use `$1`, `$2`, ... to refer to the regex's capture groups, same
/// convention as [`regex::Regex::replace_all`].
struct FunctionRule {
    pattern: Regex,
    replacement: &'static str,
}

static RULES: LazyLock<Vec<FunctionRule>> = LazyLock::new(|| {
    vec![
        FunctionRule {
            pattern: Regex::new(r"(?i)%SYSTEM\.Version\.GetNumber\(\s*\)").unwrap(),
            replacement: "version()",
        },
        FunctionRule {
            pattern: Regex::new(r"(?i)%SQLUPPER\(([^()]+)\)").unwrap(),
            replacement: "UPPER($1)",
        },
        FunctionRule {
            pattern: Regex::new(r"(?i)DATEDIFF_MICROSECONDS\(\s*([^,()]+)\s*,\s*([^,()]+)\s*\)").unwrap(),
            replacement: "EXTRACT(EPOCH FROM ($2-$1))*1000000",
        },
    ]
});

/// Apply every registered IRIS-system-function rewrite rule once.
pub fn rewrite(sql: &str) -> String {
    let mut out = sql.to_string();
    for rule in RULES.iter() {
        out = rule.pattern.replace_all(&out, rule.replacement).into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_version_call() {
        assert_eq!(rewrite("SELECT %SYSTEM.Version.GetNumber()"), "SELECT version()");
    }

    #[test]
    fn rewrites_sqlupper() {
        assert_eq!(rewrite("SELECT %SQLUPPER(name) FROM t"), "SELECT UPPER(name) FROM t");
    }

    #[test]
    fn rewrites_datediff_microseconds() {
        assert_eq!(
            rewrite("SELECT DATEDIFF_MICROSECONDS(a, b)"),
            "SELECT EXTRACT(EPOCH FROM (b-a))*1000000"
        );
    }
}
