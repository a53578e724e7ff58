//! The relations the catalog emulator intercepts (spec §4.6) and the
//! PostgreSQL-shaped column layout each one must answer with.
use crate::types::oid;
use crate::types::Oid;

/// One `pg_catalog`/`information_schema` relation the emulator answers for
/// entirely in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    PgNamespace,
    PgClass,
    PgAttribute,
    PgType,
    PgConstraint,
    PgIndex,
    PgAttrdef,
    PgDepend,
    InfoSchemaTables,
    InfoSchemaColumns,
    InfoSchemaTableConstraints,
    InfoSchemaKeyColumnUsage,
    InfoSchemaReferentialConstraints,
}

/// A PostgreSQL column: name plus the OID/length it must be described as in
/// `RowDescription` (spec §6: "column names, ordering, and OIDs closely
/// enough for Prisma `db pull`, SQLAlchemy reflection, and `psql \d`").
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub type_oid: Oid,
    pub type_len: i16,
}

const fn col(name: &'static str, type_oid: Oid, type_len: i16) -> ColumnDef {
    ColumnDef { name, type_oid, type_len }
}

impl Relation {
    /// All relation names this variant answers for, qualified both as
    /// `pg_catalog.x`/`information_schema.x` and bare, matching however
    /// clients happen to write the query (spec §4.6 detection heuristic:
    /// "token-level scan ... rather than full SQL parsing").
    pub fn match_tokens(self) -> &'static [&'static str] {
        match self {
            Relation::PgNamespace => &["pg_namespace", "pg_catalog.pg_namespace"],
            Relation::PgClass => &["pg_class", "pg_catalog.pg_class"],
            Relation::PgAttribute => &["pg_attribute", "pg_catalog.pg_attribute"],
            Relation::PgType => &["pg_type", "pg_catalog.pg_type"],
            Relation::PgConstraint => &["pg_constraint", "pg_catalog.pg_constraint"],
            Relation::PgIndex => &["pg_index", "pg_catalog.pg_index"],
            Relation::PgAttrdef => &["pg_attrdef", "pg_catalog.pg_attrdef"],
            Relation::PgDepend => &["pg_depend", "pg_catalog.pg_depend"],
            Relation::InfoSchemaTables => &["information_schema.tables"],
            Relation::InfoSchemaColumns => &["information_schema.columns"],
            Relation::InfoSchemaTableConstraints => &["information_schema.table_constraints"],
            Relation::InfoSchemaKeyColumnUsage => &["information_schema.key_column_usage"],
            Relation::InfoSchemaReferentialConstraints => &["information_schema.referential_constraints"],
        }
    }

    pub fn all() -> &'static [Relation] {
        &[
            Relation::PgNamespace,
            Relation::PgClass,
            Relation::PgAttribute,
            Relation::PgType,
            Relation::PgConstraint,
            Relation::PgIndex,
            Relation::PgAttrdef,
            Relation::PgDepend,
            Relation::InfoSchemaTables,
            Relation::InfoSchemaColumns,
            Relation::InfoSchemaTableConstraints,
            Relation::InfoSchemaKeyColumnUsage,
            Relation::InfoSchemaReferentialConstraints,
        ]
    }

    pub fn columns(self) -> &'static [ColumnDef] {
        match self {
            Relation::PgNamespace => &[
                col("oid", oid::INT4, 4),
                col("nspname", oid::TEXT, -1),
                col("nspowner", oid::INT4, 4),
            ],
            Relation::PgClass => &[
                col("oid", oid::INT4, 4),
                col("relname", oid::TEXT, -1),
                col("relnamespace", oid::INT4, 4),
                col("reltype", oid::INT4, 4),
                col("relowner", oid::INT4, 4),
                col("relkind", oid::CHAR, 1),
                col("relnatts", oid::INT2, 2),
            ],
            Relation::PgAttribute => &[
                col("attrelid", oid::INT4, 4),
                col("attname", oid::TEXT, -1),
                col("atttypid", oid::INT4, 4),
                col("attlen", oid::INT2, 2),
                col("attnum", oid::INT2, 2),
                col("attnotnull", oid::BOOL, 1),
                col("atthasdef", oid::BOOL, 1),
            ],
            Relation::PgType => &[
                col("oid", oid::INT4, 4),
                col("typname", oid::TEXT, -1),
                col("typnamespace", oid::INT4, 4),
                col("typlen", oid::INT2, 2),
                col("typtype", oid::CHAR, 1),
            ],
            Relation::PgConstraint => &[
                col("oid", oid::INT4, 4),
                col("conname", oid::TEXT, -1),
                col("connamespace", oid::INT4, 4),
                col("contype", oid::CHAR, 1),
                col("conrelid", oid::INT4, 4),
            ],
            Relation::PgIndex => &[
                col("indexrelid", oid::INT4, 4),
                col("indrelid", oid::INT4, 4),
                col("indisunique", oid::BOOL, 1),
                col("indisprimary", oid::BOOL, 1),
            ],
            Relation::PgAttrdef => &[
                col("oid", oid::INT4, 4),
                col("adrelid", oid::INT4, 4),
                col("adnum", oid::INT2, 2),
                col("adsrc", oid::TEXT, -1),
            ],
            Relation::PgDepend => &[
                col("classid", oid::INT4, 4),
                col("objid", oid::INT4, 4),
                col("refclassid", oid::INT4, 4),
                col("refobjid", oid::INT4, 4),
                col("deptype", oid::CHAR, 1),
            ],
            Relation::InfoSchemaTables => &[
                col("table_catalog", oid::TEXT, -1),
                col("table_schema", oid::TEXT, -1),
                col("table_name", oid::TEXT, -1),
                col("table_type", oid::TEXT, -1),
            ],
            Relation::InfoSchemaColumns => &[
                col("table_catalog", oid::TEXT, -1),
                col("table_schema", oid::TEXT, -1),
                col("table_name", oid::TEXT, -1),
                col("column_name", oid::TEXT, -1),
                col("ordinal_position", oid::INT4, 4),
                col("column_default", oid::TEXT, -1),
                col("is_nullable", oid::TEXT, -1),
                col("data_type", oid::TEXT, -1),
            ],
            Relation::InfoSchemaTableConstraints => &[
                col("constraint_catalog", oid::TEXT, -1),
                col("constraint_schema", oid::TEXT, -1),
                col("constraint_name", oid::TEXT, -1),
                col("table_schema", oid::TEXT, -1),
                col("table_name", oid::TEXT, -1),
                col("constraint_type", oid::TEXT, -1),
            ],
            Relation::InfoSchemaKeyColumnUsage => &[
                col("constraint_catalog", oid::TEXT, -1),
                col("constraint_schema", oid::TEXT, -1),
                col("constraint_name", oid::TEXT, -1),
                col("table_schema", oid::TEXT, -1),
                col("table_name", oid::TEXT, -1),
                col("column_name", oid::TEXT, -1),
                col("ordinal_position", oid::INT4, 4),
            ],
            Relation::InfoSchemaReferentialConstraints => &[
                col("constraint_catalog", oid::TEXT, -1),
                col("constraint_schema", oid::TEXT, -1),
                col("constraint_name", oid::TEXT, -1),
                col("unique_constraint_schema", oid::TEXT, -1),
                col("unique_constraint_name", oid::TEXT, -1),
                col("match_option", oid::TEXT, -1),
                col("update_rule", oid::TEXT, -1),
                col("delete_rule", oid::TEXT, -1),
            ],
        }
    }
}
