//! Bound portal (spec §4.9, §4.10: Bind through Execute).
use bytes::Bytes;

use crate::statement::{PortalName, StatementName};
use crate::types::Format;

/// A bound portal, from `Bind` through `Execute`/`PortalSuspended`.
#[derive(Debug, Clone)]
pub struct Portal {
    pub name: PortalName,
    pub statement: StatementName,
    pub param_formats: Vec<Format>,
    pub params: Vec<Option<Bytes>>,
    pub result_formats: Vec<Format>,
    /// Rows already streamed to the client by prior `Execute`s against this
    /// portal (spec §4.10: a suspended portal must be re-executable).
    pub rows_sent: usize,
}

impl Portal {
    /// The wire format of the `index`-th bound parameter (spec §4.1 Bind:
    /// zero formats means all-text, one means all-that-format, N means
    /// per-parameter).
    pub fn format_for_param(&self, index: usize) -> Format {
        match self.param_formats.len() {
            0 => Format::Text,
            1 => self.param_formats[0],
            _ => self.param_formats.get(index).copied().unwrap_or(Format::Text),
        }
    }

    /// The wire format the client wants the `index`-th result column in.
    pub fn format_for_result(&self, index: usize) -> Format {
        match self.result_formats.len() {
            0 => Format::Text,
            1 => self.result_formats[0],
            _ => self.result_formats.get(index).copied().unwrap_or(Format::Text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal(param_formats: Vec<Format>, result_formats: Vec<Format>) -> Portal {
        Portal {
            name: PortalName::unnamed(),
            statement: StatementName::unnamed(),
            param_formats,
            params: vec![],
            result_formats,
            rows_sent: 0,
        }
    }

    #[test]
    fn single_format_broadcasts_to_every_param() {
        let p = portal(vec![Format::Binary], vec![]);
        assert_eq!(p.format_for_param(0), Format::Binary);
        assert_eq!(p.format_for_param(7), Format::Binary);
    }

    #[test]
    fn no_formats_defaults_to_text() {
        let p = portal(vec![], vec![]);
        assert_eq!(p.format_for_param(0), Format::Text);
        assert_eq!(p.format_for_result(0), Format::Text);
    }

    #[test]
    fn per_column_formats_are_indexed() {
        let p = portal(vec![], vec![Format::Text, Format::Binary]);
        assert_eq!(p.format_for_result(0), Format::Text);
        assert_eq!(p.format_for_result(1), Format::Binary);
    }
}
