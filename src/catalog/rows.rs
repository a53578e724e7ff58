//! Row producers: each queries IRIS `INFORMATION_SCHEMA` (or synthesizes
//! static data) and shapes the result as PostgreSQL catalog rows (spec §4.6).
use crate::backend::PooledConnection;
use crate::error::Result;
use crate::oid::{Kind, OidGenerator};
use crate::types::{oid, Value};

use super::relations::Relation;

/// IRIS namespace the gateway's single emulated schema lives in. Anything
/// else (`%SYS`, ...) is left alone rather than rewritten (spec §4.7).
const USER_SCHEMA: &str = "SQLUser";

pub async fn produce(relation: Relation, conn: &mut PooledConnection, oidgen: &OidGenerator) -> Result<Vec<Vec<Value>>> {
    match relation {
        Relation::PgNamespace => Ok(namespaces(oidgen)),
        Relation::PgType => Ok(builtin_types()),
        Relation::PgClass => classes(conn, oidgen).await,
        Relation::PgAttribute => attributes(conn, oidgen).await,
        Relation::InfoSchemaTables => tables(conn).await,
        Relation::InfoSchemaColumns => columns(conn).await,
        // No IRIS dictionary equivalent wired up for these; a conservative
        // empty result is explicitly allowed (spec §4.6).
        Relation::PgConstraint
        | Relation::PgIndex
        | Relation::PgAttrdef
        | Relation::PgDepend
        | Relation::InfoSchemaTableConstraints
        | Relation::InfoSchemaKeyColumnUsage
        | Relation::InfoSchemaReferentialConstraints => Ok(Vec::new()),
    }
}

fn namespaces(oidgen: &OidGenerator) -> Vec<Vec<Value>> {
    ["public", "pg_catalog", "information_schema", "%SYS"]
        .into_iter()
        .map(|name| {
            let display = if name == "public" { "public" } else { name };
            vec![
                Value::Int4(oidgen.oid(name, Kind::Namespace, name) as i32),
                Value::Text(display.to_string()),
                Value::Int4(10),
            ]
        })
        .collect()
}

fn builtin_types() -> Vec<Vec<Value>> {
    let entries: &[(&str, u32, i16, &str)] = &[
        ("bool", oid::BOOL, 1, "b"),
        ("bytea", oid::BYTEA, -1, "b"),
        ("int8", oid::INT8, 8, "b"),
        ("int2", oid::INT2, 2, "b"),
        ("int4", oid::INT4, 4, "b"),
        ("text", oid::TEXT, -1, "b"),
        ("float4", oid::FLOAT4, 4, "b"),
        ("float8", oid::FLOAT8, 8, "b"),
        ("varchar", oid::VARCHAR, -1, "b"),
        ("date", oid::DATE, 4, "b"),
        ("time", oid::TIME, 8, "b"),
        ("timestamp", oid::TIMESTAMP, 8, "b"),
        ("timestamptz", oid::TIMESTAMPTZ, 8, "b"),
        ("numeric", oid::NUMERIC, -1, "b"),
        ("uuid", oid::UUID, 16, "b"),
        ("json", oid::JSON, -1, "b"),
        ("jsonb", oid::JSONB, -1, "b"),
    ];
    entries
        .iter()
        .map(|(name, type_oid, len, kind)| {
            vec![
                Value::Int4(*type_oid as i32),
                Value::Text(name.to_string()),
                Value::Int4(11),
                Value::Int2(*len),
                Value::Text(kind.to_string()),
            ]
        })
        .collect()
}

async fn tables(conn: &mut PooledConnection) -> Result<Vec<Vec<Value>>> {
    let result = conn
        .execute(
            "SELECT TABLE_SCHEMA, TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = 'SQLUser'",
            &[],
        )
        .await?;
    Ok(result
        .rows
        .into_iter()
        .map(|row| {
            let table_name = text_cell(&row, 1);
            vec![
                Value::Text("iris".to_string()),
                Value::Text("public".to_string()),
                Value::Text(table_name),
                Value::Text("BASE TABLE".to_string()),
            ]
        })
        .collect())
}

async fn columns(conn: &mut PooledConnection) -> Result<Vec<Vec<Value>>> {
    let result = conn
        .execute(
            "SELECT TABLE_NAME, COLUMN_NAME, ORDINAL_POSITION, COLUMN_DEFAULT, IS_NULLABLE, DATA_TYPE \
             FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_SCHEMA = 'SQLUser' ORDER BY TABLE_NAME, ORDINAL_POSITION",
            &[],
        )
        .await?;
    Ok(result
        .rows
        .into_iter()
        .map(|row| {
            vec![
                Value::Text("iris".to_string()),
                Value::Text("public".to_string()),
                Value::Text(text_cell(&row, 0)),
                Value::Text(text_cell(&row, 1)),
                row.get(2).cloned().unwrap_or(Value::Null),
                row.get(3).cloned().unwrap_or(Value::Null),
                row.get(4).cloned().unwrap_or(Value::Null),
                row.get(5).cloned().unwrap_or(Value::Null),
            ]
        })
        .collect())
}

async fn classes(conn: &mut PooledConnection, oidgen: &OidGenerator) -> Result<Vec<Vec<Value>>> {
    let result = conn
        .execute(
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = 'SQLUser'",
            &[],
        )
        .await?;
    let namespace_oid = oidgen.oid("public", Kind::Namespace, "public");
    Ok(result
        .rows
        .into_iter()
        .map(|row| {
            let name = text_cell(&row, 0);
            let table_oid = oidgen.oid(USER_SCHEMA, Kind::Table, &name);
            vec![
                Value::Int4(table_oid as i32),
                Value::Text(name),
                Value::Int4(namespace_oid as i32),
                Value::Int4(0),
                Value::Int4(10),
                Value::Text("r".to_string()),
                Value::Int2(0),
            ]
        })
        .collect())
}

async fn attributes(conn: &mut PooledConnection, oidgen: &OidGenerator) -> Result<Vec<Vec<Value>>> {
    let result = conn
        .execute(
            "SELECT TABLE_NAME, COLUMN_NAME, ORDINAL_POSITION, IS_NULLABLE, COLUMN_DEFAULT, DATA_TYPE \
             FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_SCHEMA = 'SQLUser' ORDER BY TABLE_NAME, ORDINAL_POSITION",
            &[],
        )
        .await?;
    Ok(result
        .rows
        .into_iter()
        .map(|row| {
            let table_name = text_cell(&row, 0);
            let col_name = text_cell(&row, 1);
            let ordinal = int_cell(&row, 2);
            let is_nullable = text_cell(&row, 3) != "NO";
            let has_default = !matches!(row.get(4), Some(Value::Null) | None);
            let data_type = text_cell(&row, 5);
            let attrelid = oidgen.oid(USER_SCHEMA, Kind::Table, &table_name);
            let atttypid = pg_type_oid_for_iris_type(&data_type);
            vec![
                Value::Int4(attrelid as i32),
                Value::Text(col_name),
                Value::Int4(atttypid as i32),
                Value::Int2(oid::type_len(atttypid)),
                Value::Int2(ordinal as i16),
                Value::Bool(!is_nullable),
                Value::Bool(has_default),
            ]
        })
        .collect())
}

fn text_cell(row: &[Value], index: usize) -> String {
    match row.get(index) {
        Some(Value::Text(s)) => s.clone(),
        Some(other) => format!("{other:?}"),
        None => String::new(),
    }
}

fn int_cell(row: &[Value], index: usize) -> i64 {
    match row.get(index) {
        Some(Value::Int4(v)) => *v as i64,
        Some(Value::Int8(v)) => *v,
        Some(Value::Int2(v)) => *v as i64,
        Some(Value::Text(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Map an IRIS `INFORMATION_SCHEMA.COLUMNS.DATA_TYPE` name to the closest
/// PostgreSQL type OID. Unknown types fall back to `text` rather than
/// failing the whole catalog query.
fn pg_type_oid_for_iris_type(iris_type: &str) -> crate::types::Oid {
    match iris_type.to_ascii_uppercase().as_str() {
        "BIGINT" => oid::INT8,
        "INTEGER" | "INT" => oid::INT4,
        "SMALLINT" | "TINYINT" => oid::INT2,
        "DOUBLE" | "FLOAT" => oid::FLOAT8,
        "NUMERIC" | "DECIMAL" => oid::NUMERIC,
        "VARCHAR" | "CHARACTER VARYING" => oid::VARCHAR,
        "DATE" => oid::DATE,
        "TIME" => oid::TIME,
        "TIMESTAMP" => oid::TIMESTAMP,
        "BOOLEAN" | "BIT" => oid::BOOL,
        "BINARY" | "VARBINARY" | "LONGVARBINARY" => oid::BYTEA,
        _ => oid::TEXT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_iris_types_to_pg_oids() {
        assert_eq!(pg_type_oid_for_iris_type("BIGINT"), oid::INT8);
        assert_eq!(pg_type_oid_for_iris_type("VARCHAR"), oid::VARCHAR);
    }

    #[test]
    fn unknown_iris_type_falls_back_to_text() {
        assert_eq!(pg_type_oid_for_iris_type("%Library.RawString"), oid::TEXT);
    }

    #[test]
    fn builtin_types_includes_core_scalar_types() {
        let rows = builtin_types();
        assert!(rows.iter().any(|r| matches!(&r[1], Value::Text(n) if n == "int4")));
    }

    #[test]
    fn namespaces_include_public_and_sys() {
        let oidgen = OidGenerator::new();
        let rows = namespaces(&oidgen);
        let names: Vec<String> = rows
            .iter()
            .map(|r| match &r[1] {
                Value::Text(s) => s.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert!(names.contains(&"public".to_string()));
        assert!(names.contains(&"%SYS".to_string()));
    }
}
