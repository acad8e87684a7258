//! Statement construction.
//!
//! Builds DDL, DML and query statements from structural metadata. Values are
//! always carried as bindings; identifiers are always embedded through
//! [`crate::ident`].

use crate::core::db::{Bindings, ColumnSpec, ColumnType, Statement, TableSchema};
use crate::core::{Result, SchemaError, TabqlError};
use crate::ident::{quote, quote_column, quote_column_ref};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use std::fmt::Write as _;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One input row: raw text values, optionally keyed by header names.
///
/// Without names the values are taken in the live table's column order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowRecord {
    pub names: Vec<String>,
    pub values: Vec<String>,
}

impl RowRecord {
    /// A row keyed by `header`.
    pub fn keyed(header: &[&str], values: &[&str]) -> Self {
        RowRecord {
            names: header.iter().map(|h| h.trim().to_string()).collect(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// A row in table order.
    pub fn positional(values: &[&str]) -> Self {
        RowRecord {
            names: Vec::new(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Number of values
    pub fn arity(&self) -> usize {
        self.values.len()
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// `d`/`desc` (any case) is descending, everything else ascending.
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "d" | "desc" => Direction::Desc,
            _ => Direction::Asc,
        }
    }
}

/// What to order by: a position in the selected column list, or a column name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    Index(usize),
    Name(String),
}

impl OrderKey {
    /// Numeric input is a position, anything else a name.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        input
            .parse()
            .map(OrderKey::Index)
            .unwrap_or_else(|_| OrderKey::Name(input.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub key: OrderKey,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
}

impl JoinKind {
    /// `l`/`left` and `r`/`right` select outer joins; anything else is inner.
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "l" | "left" => JoinKind::Left,
            "r" | "right" => JoinKind::Right,
            _ => JoinKind::Inner,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// Joins `right` on `on_left = right.on_right`.
///
/// Unqualified `on_left` refers to the base table and unqualified `on_right`
/// to `right`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub right: String,
    pub on_left: String,
    pub on_right: String,
    pub kind: JoinKind,
}

/// A read query. Zero `limit`/`offset` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectQuery {
    pub table: String,
    /// Selected columns; empty selects all
    pub columns: Vec<String>,
    pub order: Option<Order>,
    pub limit: u64,
    pub offset: u64,
    pub joins: Vec<Join>,
}

impl SelectQuery {
    pub fn new(table: &str) -> Self {
        SelectQuery {
            table: table.to_string(),
            ..SelectQuery::default()
        }
    }

    pub fn columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn order_by(mut self, key: OrderKey, direction: Direction) -> Self {
        self.order = Some(Order { key, direction });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// The selected column the order resolves to, if it resolves at all.
    pub fn resolve_order(&self) -> Option<(&str, Direction)> {
        let order = self.order.as_ref()?;
        let column = match &order.key {
            OrderKey::Index(index) => self.columns.get(*index)?,
            OrderKey::Name(name) => self.columns.iter().find(|c| c.eq_ignore_ascii_case(name))?,
        };
        Some((column.as_str(), order.direction))
    }
}

fn column_clause(column: &ColumnSpec) -> Result<String> {
    let mut clause = format!("{} {}", quote_column(&column.name)?, column.column_type);
    if column.not_null {
        clause.push_str(" NOT NULL");
    }
    if column.is_primary_key {
        clause.push_str(" PRIMARY KEY");
    }
    if let Some(target) = &column.references {
        // Infallible: writing into a String
        let _ = write!(clause, " REFERENCES {}", quote(&target.table)?);
        if let Some(target_column) = &target.column {
            let _ = write!(clause, "({})", quote(target_column)?);
        }
    }
    Ok(clause)
}

/// `CREATE TABLE` with one clause per column, in input order.
///
/// # Errors
///
/// `EmptySchema` without columns, `MultiplePrimaryKeys` when more than one
/// column is flagged, and `InvalidIdentifier` for any rejected name.
pub fn build_create(table: &str, columns: &[ColumnSpec]) -> Result<Statement> {
    if columns.is_empty() {
        return Err(SchemaError::EmptySchema(table.to_string()).into());
    }
    if columns.iter().filter(|c| c.is_primary_key).count() > 1 {
        return Err(SchemaError::MultiplePrimaryKeys(table.to_string()).into());
    }

    let clauses = columns
        .iter()
        .map(column_clause)
        .collect::<Result<Vec<_>>>()?;
    Ok(Statement::new(
        format!("CREATE TABLE {} ({})", quote(table)?, clauses.join(", ")),
        Bindings::None,
    ))
}

/// Bulk `INSERT` aligned to `schema`.
///
/// Every row is checked and converted before the statement exists, so a
/// single bad row rejects the whole batch.
///
/// # Errors
///
/// `EmptySchema`, `ArityMismatch` for any row whose field count differs from
/// the schema, `UnknownColumn` for a header name outside the schema, and
/// `ValueMismatch` for a value its column cannot hold.
pub fn build_insert(table: &str, schema: &TableSchema, rows: &[RowRecord]) -> Result<Statement> {
    if schema.is_empty() {
        return Err(SchemaError::EmptySchema(table.to_string()).into());
    }

    for (index, row) in rows.iter().enumerate() {
        let found = if row.arity() != schema.len() {
            row.arity()
        } else if !row.names.is_empty() && row.names.len() != schema.len() {
            row.names.len()
        } else {
            continue;
        };
        return Err(TabqlError::ArityMismatch {
            row: index + 1,
            expected: schema.len(),
            found,
        });
    }

    let batch = rows
        .iter()
        .enumerate()
        .map(|(index, row)| align_row(table, schema, row, index + 1))
        .collect::<Result<Vec<_>>>()?;

    let columns = schema
        .columns
        .iter()
        .map(|c| quote(&c.name))
        .collect::<Result<Vec<_>>>()?;
    let placeholders: Vec<String> = (1..=schema.len()).map(|i| format!("?{}", i)).collect();

    Ok(Statement::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table)?,
            columns.join(", "),
            placeholders.join(", ")
        ),
        Bindings::Batch(batch),
    ))
}

/// Orders a row's values by schema position and converts each one.
fn align_row(table: &str, schema: &TableSchema, row: &RowRecord, row_number: usize) -> Result<Vec<Value>> {
    let mut slots: Vec<Option<&str>> = vec![None; schema.len()];

    if row.names.is_empty() {
        for (slot, value) in slots.iter_mut().zip(&row.values) {
            *slot = Some(value.as_str());
        }
    } else {
        for (name, value) in row.names.iter().zip(&row.values) {
            let position = schema.position(name).ok_or_else(|| SchemaError::UnknownColumn {
                table: table.to_string(),
                column: name.clone(),
            })?;
            if slots[position].replace(value.as_str()).is_some() {
                return Err(SchemaError::InvalidIdentifier {
                    name: name.clone(),
                    reason: "appears more than once in the header",
                }
                .into());
            }
        }
    }

    schema
        .columns
        .iter()
        .zip(slots)
        .map(|(column, raw)| {
            // Every slot is filled: arity matches and names are distinct
            convert_value(column, raw.unwrap_or_default(), row_number)
        })
        .collect()
}

/// Converts a raw text value for storage in `column`.
pub fn convert_value(column: &ColumnSpec, raw: &str, row: usize) -> Result<Value> {
    let mismatch = || TabqlError::ValueMismatch {
        row,
        column: column.name.clone(),
        value: raw.to_string(),
        expected: column.column_type.to_string(),
    };

    match column.column_type {
        ColumnType::Integer => raw.trim().parse().map(Value::Integer).map_err(|_| mismatch()),
        ColumnType::VarChar(max) => {
            if raw.chars().count() > max as usize {
                Err(mismatch())
            } else {
                Ok(Value::Text(raw.to_string()))
            }
        }
        ColumnType::Decimal(precision, scale) => {
            let number: f64 = raw.trim().parse().map_err(|_| mismatch())?;
            let bound = 10f64.powi(i32::from(precision.saturating_sub(scale)));
            if number.is_finite() && number.abs() < bound {
                Ok(Value::Real(number))
            } else {
                Err(mismatch())
            }
        }
        ColumnType::DateTime => parse_datetime(raw.trim())
            .map(|dt| Value::Text(dt.format(DATETIME_FORMAT).to_string()))
            .ok_or_else(mismatch),
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
        })
}

/// `SELECT` with projection, joins, ordering and pagination.
///
/// An order that does not resolve against the selected columns is dropped.
/// A zero limit or offset leaves its clause out. SQLite only accepts OFFSET
/// after LIMIT, so an offset without a limit is carried as the statement's
/// [`skip`](Statement::skip) and applied by the gateway.
pub fn build_select(query: &SelectQuery) -> Result<Statement> {
    let projection = if query.columns.is_empty() {
        "*".to_string()
    } else {
        query
            .columns
            .iter()
            .map(|c| quote_column_ref(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ")
    };

    let mut sql = format!("SELECT {} FROM {}", projection, quote(&query.table)?);

    for join in &query.joins {
        let left = qualify(&query.table, &join.on_left)?;
        let right = qualify(&join.right, &join.on_right)?;
        let _ = write!(
            sql,
            " {} {} ON {} = {}",
            join.kind.keyword(),
            quote(&join.right)?,
            left,
            right
        );
    }

    if let Some((column, direction)) = query.resolve_order() {
        let _ = write!(
            sql,
            " ORDER BY {} {}",
            quote_column_ref(column)?,
            match direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            }
        );
    }

    let mut skip = 0;
    match (query.limit, query.offset) {
        (0, 0) => {}
        (0, offset) => skip = usize::try_from(offset).unwrap_or(usize::MAX),
        (limit, 0) => {
            let _ = write!(sql, " LIMIT {}", limit);
        }
        (limit, offset) => {
            let _ = write!(sql, " LIMIT {} OFFSET {}", limit, offset);
        }
    }

    Ok(Statement::new(sql, Bindings::None).with_skip(skip))
}

fn qualify(table: &str, column: &str) -> Result<String> {
    if column.contains('.') {
        quote_column_ref(column)
    } else {
        Ok(format!("{}.{}", quote(table)?, quote(column)?))
    }
}

/// `DROP TABLE IF EXISTS`
pub fn build_drop(table: &str) -> Result<Statement> {
    Ok(Statement::new(
        format!("DROP TABLE IF EXISTS {}", quote(table)?),
        Bindings::None,
    ))
}

/// Removes every row while keeping the table (SQLite's truncate form).
pub fn build_truncate(table: &str) -> Result<Statement> {
    Ok(Statement::new(
        format!("DELETE FROM {}", quote(table)?),
        Bindings::None,
    ))
}

/// Drops every table of the database in one parameterless script.
pub fn build_drop_database(tables: &[String]) -> Result<Statement> {
    let script = tables
        .iter()
        .map(|table| Ok(format!("DROP TABLE IF EXISTS {};", quote(table)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Statement::new(script.join("\n"), Bindings::None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::ForeignRef;
    use crate::infer::TypeInferencer;

    fn order_schema() -> TableSchema {
        TableSchema {
            table: "orders".to_string(),
            columns: TypeInferencer::default()
                .infer_header(&["id", "customer_name", "product_price"])
                .unwrap(),
        }
    }

    #[test]
    fn test_create_statement() {
        let stmt = build_create("orders", &order_schema().columns).unwrap();
        insta::assert_snapshot!(stmt.text(), @r#"CREATE TABLE "orders" ("id" INTEGER NOT NULL PRIMARY KEY, "customer_name" VARCHAR(80) NOT NULL, "product_price" DECIMAL(10,5) NOT NULL)"#);
        assert_eq!(stmt.bindings(), &Bindings::None);
    }

    #[test]
    fn test_create_with_reference() {
        let columns = vec![
            ColumnSpec::new("id", ColumnType::Integer).primary_key(),
            ColumnSpec::new("customer", ColumnType::Integer).foreign_key(Some(ForeignRef {
                table: "customers".to_string(),
                column: Some("id".to_string()),
            })),
        ];
        let stmt = build_create("orders", &columns).unwrap();
        assert!(stmt
            .text()
            .ends_with(r#""customer" INTEGER NOT NULL REFERENCES "customers"("id"))"#));
    }

    #[test]
    fn test_create_rejects_empty_and_double_key() {
        assert!(matches!(
            build_create("t", &[]),
            Err(TabqlError::Schema(SchemaError::EmptySchema(_)))
        ));

        let columns = vec![
            ColumnSpec::new("a", ColumnType::Integer).primary_key(),
            ColumnSpec::new("b", ColumnType::Integer).primary_key(),
        ];
        assert!(matches!(
            build_create("t", &columns),
            Err(TabqlError::Schema(SchemaError::MultiplePrimaryKeys(_)))
        ));
    }

    #[test]
    fn test_create_rejects_injected_identifier() {
        let columns = vec![ColumnSpec::new("id); DROP TABLE x; --", ColumnType::Integer)];
        assert!(matches!(
            build_create("t", &columns),
            Err(TabqlError::Schema(SchemaError::InvalidIdentifier { .. }))
        ));
    }

    #[test]
    fn test_create_rejects_dotted_column() {
        let columns = vec![
            ColumnSpec::new("id", ColumnType::Integer).primary_key(),
            ColumnSpec::new("x.name", ColumnType::VarChar(80)),
        ];
        assert!(matches!(
            build_create("t", &columns),
            Err(TabqlError::Schema(SchemaError::InvalidIdentifier { .. }))
        ));
    }

    #[test]
    fn test_insert_follows_schema_order() {
        let schema = order_schema();
        let rows = vec![RowRecord::keyed(
            &["product_price", "id", "customer_name"],
            &["9.99", "1", "Alice"],
        )];
        let stmt = build_insert("orders", &schema, &rows).unwrap();

        insta::assert_snapshot!(stmt.text(), @r#"INSERT INTO "orders" ("id", "customer_name", "product_price") VALUES (?1, ?2, ?3)"#);
        assert_eq!(
            stmt.bindings(),
            &Bindings::Batch(vec![vec![
                Value::Integer(1),
                Value::Text("Alice".to_string()),
                Value::Real(9.99),
            ]])
        );
    }

    #[test]
    fn test_insert_rejects_short_row() {
        let schema = order_schema();
        let rows = vec![
            RowRecord::positional(&["1", "Alice", "9.99"]),
            RowRecord::positional(&["2", "Bob"]),
        ];
        match build_insert("orders", &schema, &rows) {
            Err(TabqlError::ArityMismatch { row, expected, found }) => {
                assert_eq!((row, expected, found), (2, 3, 2));
            }
            other => panic!("Expected ArityMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_rejects_header_mismatch() {
        let schema = order_schema();
        let rows = vec![RowRecord::keyed(&["id", "customer_name"], &["1", "Alice", "9.99"])];
        assert!(matches!(
            build_insert("orders", &schema, &rows),
            Err(TabqlError::ArityMismatch { .. })
        ));

        let rows = vec![RowRecord::keyed(&["id", "customer_name", "colour"], &["1", "Alice", "red"])];
        assert!(matches!(
            build_insert("orders", &schema, &rows),
            Err(TabqlError::Schema(SchemaError::UnknownColumn { .. }))
        ));

        let rows = vec![RowRecord::keyed(&["id", "id", "customer_name"], &["1", "2", "Alice"])];
        assert!(matches!(
            build_insert("orders", &schema, &rows),
            Err(TabqlError::Schema(SchemaError::InvalidIdentifier { .. }))
        ));
    }

    #[test]
    fn test_insert_rejects_bad_values() {
        let schema = order_schema();
        for row in [
            ["one", "Alice", "9.99"],
            ["1", "Alice", "cheap"],
            ["1", "Alice", "123456.5"],
        ] {
            assert!(matches!(
                build_insert("orders", &schema, &[RowRecord::positional(&row)]),
                Err(TabqlError::ValueMismatch { .. })
            ));
        }

        let long_name = "x".repeat(81);
        assert!(build_insert(
            "orders",
            &schema,
            &[RowRecord::positional(&["1", &long_name, "1"])]
        )
        .is_err());
    }

    #[test]
    fn test_datetime_normalization() {
        let column = ColumnSpec::new("date_time", ColumnType::DateTime);
        for raw in ["2023-04-01T10:30:00", "2023-04-01 10:30:00", "2023-04-01T10:30:00.250"] {
            assert_eq!(
                convert_value(&column, raw, 1).unwrap(),
                Value::Text("2023-04-01 10:30:00".to_string())
            );
        }
        assert_eq!(
            convert_value(&column, "2023-04-01", 1).unwrap(),
            Value::Text("2023-04-01 00:00:00".to_string())
        );
        assert!(convert_value(&column, "yesterday", 1).is_err());
    }

    #[test]
    fn test_select_projection_order_pagination() {
        let query = SelectQuery::new("customers")
            .columns(&["id", "email"])
            .order_by(OrderKey::Index(1), Direction::Desc)
            .limit(19)
            .offset(8);
        insta::assert_snapshot!(build_select(&query).unwrap().text(), @r#"SELECT "id", "email" FROM "customers" ORDER BY "email" DESC LIMIT 19 OFFSET 8"#);
    }

    #[test]
    fn test_select_unresolved_order_is_dropped() {
        let base = SelectQuery::new("customers").columns(&["id", "email"]);

        let out_of_range = base.clone().order_by(OrderKey::Index(2), Direction::Asc);
        assert_eq!(
            build_select(&out_of_range).unwrap().text(),
            r#"SELECT "id", "email" FROM "customers""#
        );

        let absent = base.clone().order_by(OrderKey::Name("name".into()), Direction::Asc);
        assert!(!build_select(&absent).unwrap().text().contains("ORDER BY"));

        let present = base.order_by(OrderKey::Name("EMAIL".into()), Direction::Asc);
        assert!(build_select(&present)
            .unwrap()
            .text()
            .ends_with(r#"ORDER BY "email" ASC"#));
    }

    #[test]
    fn test_select_zero_limit_and_offset() {
        let all = SelectQuery::new("orders");
        assert_eq!(build_select(&all).unwrap().text(), r#"SELECT * FROM "orders""#);

        let limited = SelectQuery::new("orders").limit(5);
        assert!(build_select(&limited).unwrap().text().ends_with("LIMIT 5"));

        let offset_only = build_select(&SelectQuery::new("orders").offset(3)).unwrap();
        assert_eq!(offset_only.text(), r#"SELECT * FROM "orders""#);
        assert_eq!(offset_only.skip(), 3);

        let paged = build_select(&SelectQuery::new("orders").limit(2).offset(3)).unwrap();
        assert!(paged.text().ends_with("LIMIT 2 OFFSET 3"));
        assert_eq!(paged.skip(), 0);
    }

    #[test]
    fn test_select_with_joins() {
        let query = SelectQuery::new("orders")
            .columns(&["orders.id", "customers.name", "products.name"])
            .join(Join {
                right: "customers".into(),
                on_left: "customer".into(),
                on_right: "id".into(),
                kind: JoinKind::Inner,
            })
            .join(Join {
                right: "products".into(),
                on_left: "orders.product".into(),
                on_right: "id".into(),
                kind: JoinKind::parse("l"),
            });
        insta::assert_snapshot!(build_select(&query).unwrap().text(), @r#"SELECT "orders"."id", "customers"."name", "products"."name" FROM "orders" INNER JOIN "customers" ON "orders"."customer" = "customers"."id" LEFT JOIN "products" ON "orders"."product" = "products"."id""#);
    }

    #[test]
    fn test_destructive_statements() {
        assert_eq!(build_drop("orders").unwrap().text(), r#"DROP TABLE IF EXISTS "orders""#);
        assert_eq!(build_truncate("orders").unwrap().text(), r#"DELETE FROM "orders""#);
        assert_eq!(
            build_drop_database(&["a".to_string(), "b".to_string()]).unwrap().text(),
            "DROP TABLE IF EXISTS \"a\";\nDROP TABLE IF EXISTS \"b\";"
        );
        assert!(build_drop("orders;").is_err());
    }

    #[test]
    fn test_order_and_direction_parsing() {
        assert_eq!(OrderKey::parse("1"), OrderKey::Index(1));
        assert_eq!(OrderKey::parse("email"), OrderKey::Name("email".into()));
        assert_eq!(Direction::parse("d"), Direction::Desc);
        assert_eq!(Direction::parse("x"), Direction::Asc);
        assert_eq!(JoinKind::parse("r"), JoinKind::Right);
        assert_eq!(JoinKind::parse("i"), JoinKind::Inner);
    }
}
