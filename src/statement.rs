//! Prepared statement bookkeeping (spec §4.9).
//!
//! `StatementName`/`PortalName` mirror the teacher's `delegate!`-generated
//! newtypes (`statement.rs`), adapted for server-received names: the client
//! picks the name (or the empty string for "unnamed"), rather than the
//! driver generating one.
use crate::types::Oid;

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn unnamed() -> Self {
                Self(String::new())
            }

            pub fn is_unnamed(&self) -> bool {
                self.0.is_empty()
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                if self.is_unnamed() {
                    f.write_str("<unnamed>")
                } else {
                    f.write_str(&self.0)
                }
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }
    };
}

name_newtype!(StatementName);
name_newtype!(PortalName);

/// A parsed statement, from `Parse` through `Describe` (spec §4.9, §4.10).
#[derive(Clone, Debug)]
pub struct PreparedStatement {
    pub name: StatementName,
    /// Original client-supplied SQL, kept for `Describe` error messages.
    pub source_sql: String,
    /// Translated SQL ready for [`crate::translate::finalize_params`].
    pub translated_sql: String,
    pub vector_calls: Vec<crate::translate::VectorCallSite>,
    pub param_oids: Vec<Oid>,
    pub result_columns: Option<Vec<crate::backend::ColumnDescriptor>>,
}

impl PreparedStatement {
    pub fn describes_no_result(&self) -> bool {
        matches!(&self.result_columns, Some(cols) if cols.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_statement_displays_placeholder() {
        let name = StatementName::unnamed();
        assert!(name.is_unnamed());
        assert_eq!(name.to_string(), "<unnamed>");
    }

    #[test]
    fn named_statement_round_trips_as_str() {
        let name = StatementName::new("my_stmt");
        assert_eq!(name.as_str(), "my_stmt");
        assert!(!name.is_unnamed());
    }
}
