//! `pg_catalog` / `information_schema` emulation (spec §4.6).
//!
//! Detection is a token-level scan of the SQL text for the relation names
//! this module knows how to answer, not full SQL parsing (spec §4.6).
pub mod relations;
pub mod rows;

use crate::backend::PooledConnection;
use crate::error::{CatalogError, Result};
use crate::oid::OidGenerator;
use crate::types::{Format, Value};

pub use relations::{ColumnDef, Relation};

/// Table-like identifiers that appear in a `FROM`/`JOIN` clause but aren't
/// one of this module's emulated relations. A query mixing one of these with
/// an emulated relation is rejected (spec §4.6: "mixed joins across emulated
/// and real tables are not supported").
fn from_join_idents(sql: &str) -> Vec<String> {
    let lower = sql.to_ascii_lowercase();
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    let mut idents = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] == "from" || tokens[i] == "join" {
            if let Some(next) = tokens.get(i + 1) {
                let ident = next.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '_');
                if !ident.is_empty() {
                    idents.push(ident.to_string());
                }
            }
        }
        i += 1;
    }
    idents
}

/// Which [`Relation`] (if any) a query references, and whether it mixes an
/// emulated relation with a table this module can't answer for.
pub fn detect(sql: &str) -> Result<Option<Relation>> {
    let lower = sql.to_ascii_lowercase();
    let matched: Vec<Relation> = Relation::all()
        .iter()
        .copied()
        .filter(|r| r.match_tokens().iter().any(|token| lower.contains(token)))
        .collect();

    let Some(&relation) = matched.first() else {
        return Ok(None);
    };

    let matched_tokens: Vec<&str> = matched.iter().flat_map(|r| r.match_tokens().iter().copied()).collect();
    let other_tables: Vec<String> = from_join_idents(sql)
        .into_iter()
        .filter(|ident| !matched_tokens.iter().any(|t| ident == t || ident.ends_with(&format!(".{t}"))))
        .collect();

    if !other_tables.is_empty() {
        return Err(CatalogError::MixedJoin.into());
    }

    Ok(Some(relation))
}

/// A synthesized catalog result set, ready for `RowDescription`/`DataRow`
/// framing same as any real query result.
pub struct CatalogResult {
    pub columns: &'static [ColumnDef],
    pub rows: Vec<Vec<Value>>,
}

/// Answer a query already identified (via [`detect`]) as referencing `relation`.
pub async fn query(relation: Relation, conn: &mut PooledConnection, oidgen: &OidGenerator) -> Result<CatalogResult> {
    let rows = rows::produce(relation, conn, oidgen).await?;
    Ok(CatalogResult { columns: relation.columns(), rows })
}

/// Encode one catalog row's cells in the client-requested wire format.
pub fn encode_row(row: &[Value], formats: &[Format]) -> Result<Vec<Option<bytes::Bytes>>> {
    row.iter()
        .enumerate()
        .map(|(i, value)| crate::types::codec::encode(value, format_for(formats, i)))
        .collect()
}

fn format_for(formats: &[Format], index: usize) -> Format {
    match formats.len() {
        0 => Format::Text,
        1 => formats[0],
        _ => formats.get(index).copied().unwrap_or(Format::Text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bare_pg_class_reference() {
        let result = detect("select relname from pg_class where relkind = 'r'").unwrap();
        assert_eq!(result, Some(Relation::PgClass));
    }

    #[test]
    fn detects_qualified_information_schema_reference() {
        let result = detect("select table_name from information_schema.tables").unwrap();
        assert_eq!(result, Some(Relation::InfoSchemaTables));
    }

    #[test]
    fn non_catalog_query_detects_nothing() {
        assert_eq!(detect("select * from accounts").unwrap(), None);
    }

    #[test]
    fn mixed_join_across_emulated_and_real_table_is_rejected() {
        let err = detect("select * from pg_class c join accounts a on c.oid = a.reloid").unwrap_err();
        assert!(err.to_string().contains("mixed joins"));
    }

    #[test]
    fn self_join_on_same_emulated_relation_is_allowed() {
        let result = detect("select * from pg_class c1 join pg_class c2 on c1.relnamespace = c2.relnamespace").unwrap();
        assert_eq!(result, Some(Relation::PgClass));
    }
}
