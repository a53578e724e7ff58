//! Per-connection statement/portal registry (spec §4.9).
use std::collections::HashMap;

use crate::error::{ProtocolError, Result};
use crate::portal::Portal;
use crate::statement::{PortalName, PreparedStatement, StatementName};

/// Owns every live prepared statement and portal for one connection.
/// Exclusively owned by that connection's task (spec §5: "no other task may
/// read or write them").
#[derive(Default)]
pub struct Registry {
    statements: HashMap<StatementName, PreparedStatement>,
    portals: HashMap<PortalName, Portal>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Parse`: register a statement. Reparsing a *named* statement that is
    /// still live without an intervening `Close` is `42P05`
    /// `duplicate_prepared_statement` (spec §4.9). The unnamed statement
    /// slot is always silently overwritten.
    pub fn add_statement(&mut self, statement: PreparedStatement) -> Result<()> {
        if !statement.name.is_unnamed() && self.statements.contains_key(&statement.name) {
            return Err(ProtocolError::DuplicatePreparedStatement(statement.name.as_str().to_string()).into());
        }
        self.statements.insert(statement.name.clone(), statement);
        Ok(())
    }

    pub fn statement(&self, name: &StatementName) -> Option<&PreparedStatement> {
        self.statements.get(name)
    }

    pub fn statement_mut(&mut self, name: &StatementName) -> Option<&mut PreparedStatement> {
        self.statements.get_mut(name)
    }

    pub fn close_statement(&mut self, name: &StatementName) {
        self.statements.remove(name);
    }

    /// `Bind`: register a portal. The unnamed portal slot auto-evicts
    /// whatever was bound there before (spec §4.9 "unnamed-slot auto-eviction").
    pub fn add_portal(&mut self, portal: Portal) {
        self.portals.insert(portal.name.clone(), portal);
    }

    pub fn portal(&self, name: &PortalName) -> Option<&Portal> {
        self.portals.get(name)
    }

    pub fn portal_mut(&mut self, name: &PortalName) -> Option<&mut Portal> {
        self.portals.get_mut(name)
    }

    pub fn close_portal(&mut self, name: &PortalName) {
        self.portals.remove(name);
    }

    /// All portals are implicit `ON COMMIT CLOSE` (spec §4.9): drop every
    /// portal at transaction end.
    pub fn close_all_portals(&mut self) {
        self.portals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::VectorCallSite;

    fn statement(name: &str) -> PreparedStatement {
        PreparedStatement {
            name: StatementName::new(name),
            source_sql: "SELECT 1".into(),
            translated_sql: "SELECT 1".into(),
            vector_calls: Vec::<VectorCallSite>::new(),
            param_oids: vec![],
            result_columns: None,
        }
    }

    #[test]
    fn reparsing_named_statement_without_close_is_rejected() {
        let mut reg = Registry::new();
        reg.add_statement(statement("s1")).unwrap();
        let err = reg.add_statement(statement("s1")).unwrap_err();
        assert_eq!(err.sqlstate(), crate::error::Sqlstate::DUPLICATE_PREPARED_STATEMENT);
        assert!(!err.is_fatal());
    }

    #[test]
    fn closing_then_reparsing_named_statement_succeeds() {
        let mut reg = Registry::new();
        reg.add_statement(statement("s1")).unwrap();
        reg.close_statement(&StatementName::new("s1"));
        assert!(reg.add_statement(statement("s1")).is_ok());
    }

    #[test]
    fn unnamed_statement_always_overwrites() {
        let mut reg = Registry::new();
        reg.add_statement(statement("")).unwrap();
        assert!(reg.add_statement(statement("")).is_ok());
    }
}
