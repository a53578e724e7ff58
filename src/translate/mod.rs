//! SQL translator (spec §4.4) and vector optimizer (spec §4.5).
//!
//! Split into two phases because they run at different points in the
//! Extended Query lifecycle:
//!
//! - [`Translator::translate`]: the static, parameter-independent text
//!   rewrite (schema qualifiers, `TOP`, system functions, transaction
//!   control, pgvector operators, `::regclass`, unsupported-verb checks).
//!   Pure function of SQL text, so it is cached in an LRU keyed on the
//!   normalized input (spec §4.4 closing paragraph). Runs once, at Parse.
//! - [`finalize_params`]: array and vector parameter handling (spec §4.4
//!   rule 5, §4.5), which depends on the actual bound parameter *values*
//!   and therefore must run again on every Bind/Execute, never cached.
mod array_params;
mod functions;
mod rules;
mod vector;

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::error::Result;
use crate::oid::OidGenerator;

pub use vector::VectorCallSite;

/// Soft translation budget (spec §4.4): exceeding it is a logged warning,
/// not an error.
pub const SOFT_BUDGET: Duration = Duration::from_millis(5);

/// Output of the static translation pipeline.
#[derive(Debug, Clone)]
pub struct Translated {
    pub sql: String,
    /// `ORDER BY` vector call sites detected in the *translated* SQL, handed
    /// to [`finalize_params`] so it doesn't need to re-scan.
    pub vector_calls: Vec<VectorCallSite>,
}

struct CacheEntry {
    translated: Translated,
}

/// Caches and applies the static SQL translation pipeline.
pub struct Translator {
    cache: Mutex<LruCache<String, CacheEntry>>,
    oidgen: std::sync::Arc<OidGenerator>,
}

impl Translator {
    pub fn new(capacity: NonZeroUsize, oidgen: std::sync::Arc<OidGenerator>) -> Self {
        Self { cache: Mutex::new(LruCache::new(capacity)), oidgen }
    }

    /// Translate `sql` (as received from the client, targeting schema
    /// `namespace` for unqualified-name resolution), using the LRU cache
    /// when the normalized text has been seen before.
    pub fn translate(&self, sql: &str, namespace: &str) -> Result<Translated> {
        let key = normalize(sql);
        if let Some(entry) = self.cache.lock().expect("translator cache poisoned").get(&key) {
            return Ok(entry.translated.clone());
        }

        let started = Instant::now();
        let translated = self.run_pipeline(sql, namespace)?;
        let elapsed = started.elapsed();
        if elapsed > SOFT_BUDGET {
            tracing::warn!(millis = elapsed.as_millis(), sql = %key, "translation exceeded soft budget");
        }

        self.cache
            .lock()
            .expect("translator cache poisoned")
            .put(key, CacheEntry { translated: translated.clone() });
        Ok(translated)
    }

    fn run_pipeline(&self, sql: &str, namespace: &str) -> Result<Translated> {
        rules::check_unsupported(sql)?;
        let sql = rules::schema_qualifier(sql);
        let sql = rules::top_to_limit(&sql);
        let sql = functions::rewrite(&sql);
        let sql = rules::transaction_control(&sql);
        let sql = rules::pgvector_operators(&sql)?;
        let sql = rules::resolve_regclass_casts(&sql, &self.oidgen, namespace);
        let vector_calls = vector::find_order_by_vector_calls(&sql);
        Ok(Translated { sql, vector_calls })
    }
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Result of [`finalize_params`]: the SQL to actually send to IRIS, plus the
/// original (1-based) parameter index that now backs each `$n` placeholder
/// in the finalized SQL, in order. A parameter index absent from
/// `kept_params` was consumed (inlined as a literal) and must not be sent.
#[derive(Debug, Clone, Default)]
pub struct FinalizedQuery {
    pub sql: String,
    pub kept_params: Vec<usize>,
}

/// Run the parameter-dependent rewrite stages against a statement that has
/// already gone through [`Translator::translate`]. `vector_calls` is the
/// list produced alongside the cached translation. `param_text` holds the
/// text-format representation of every bound parameter, 0-indexed (`$1` is
/// `param_text[0]`); `None` for a parameter that arrived as SQL NULL.
pub fn finalize_params(
    translated_sql: &str,
    vector_calls: &[VectorCallSite],
    param_text: &[Option<String>],
) -> Result<FinalizedQuery> {
    let mut consumed = Vec::new();

    let vector_literals: Vec<(usize, String)> = vector_calls
        .iter()
        .filter_map(|site| {
            let raw = param_text.get(site.param_index - 1)?.as_ref()?;
            consumed.push(site.param_index);
            Some((site.param_index, raw.clone()))
        })
        .collect();
    let sql = vector::inline_vector_literals(translated_sql, &vector_literals)?;

    let any_sites = array_params::find_any_calls(&sql);
    let mut any_expansions = Vec::new();
    for site in &any_sites {
        if consumed.contains(&site.param_index) {
            continue;
        }
        let Some(Some(raw)) = param_text.get(site.param_index - 1) else { continue };
        let elements = array_params::parse_array_elements(raw)?;
        any_expansions.push((site.param_index, elements));
        consumed.push(site.param_index);
    }
    let sql = array_params::expand_any_calls(&sql, &any_expansions);

    consumed.sort_unstable();
    let kept_params: Vec<usize> =
        (1..=param_text.len()).filter(|i| !consumed.contains(i)).collect();
    let sql = vector::renumber_placeholders(&sql, &consumed);

    Ok(FinalizedQuery { sql, kept_params })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn translator() -> Translator {
        Translator::new(NonZeroUsize::new(64).unwrap(), Arc::new(OidGenerator::new()))
    }

    #[test]
    fn translates_and_caches_schema_qualifier() {
        let t = translator();
        let first = t.translate("SELECT * FROM public.accounts", "SQLUser").unwrap();
        assert_eq!(first.sql, "SELECT * FROM SQLUser.accounts");
        let second = t.translate("SELECT * FROM public.accounts", "SQLUser").unwrap();
        assert_eq!(second.sql, first.sql);
    }

    #[test]
    fn rejects_unsupported_administrative_verb() {
        let t = translator();
        assert!(t.translate("VACUUM accounts", "SQLUser").is_err());
    }

    #[test]
    fn pipeline_composes_top_and_schema_qualifier() {
        let t = translator();
        let out = t.translate("SELECT TOP 5 * FROM public.t ORDER BY id", "SQLUser").unwrap();
        assert_eq!(out.sql, "SELECT  * FROM SQLUser.t ORDER BY id LIMIT 5");
    }

    #[test]
    fn finalize_params_inlines_vector_and_renumbers() {
        let t = translator();
        let out = t
            .translate("SELECT id FROM docs ORDER BY embedding <=> TO_VECTOR($1, DOUBLE) LIMIT $2", "SQLUser")
            .unwrap();
        let finalized = finalize_params(
            &out.sql,
            &out.vector_calls,
            &[Some("[1,2,3]".to_string()), Some("5".to_string())],
        )
        .unwrap();
        assert!(finalized.sql.contains("TO_VECTOR('[1,2,3]', DOUBLE)"));
        assert!(finalized.sql.contains("LIMIT $1"));
        assert_eq!(finalized.kept_params, vec![2]);
    }

    #[test]
    fn finalize_params_expands_any_and_renumbers() {
        let sql = "SELECT * FROM t WHERE x = $1 AND id = ANY($2)";
        let finalized = finalize_params(
            sql,
            &[],
            &[Some("hi".to_string()), Some("{1,2,3}".to_string())],
        )
        .unwrap();
        assert_eq!(finalized.sql, "SELECT * FROM t WHERE x = $1 AND id IN (1, 2, 3)");
        assert_eq!(finalized.kept_params, vec![1]);
    }
}
