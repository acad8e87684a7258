//! Column type inference from column names.
//!
//! Inference walks [`RULES`] in order and the first matching rule decides the
//! column. A name carrying several signals (`product_name_date`) therefore
//! gets the type of the earliest rule, never a blend.

use crate::core::db::{ColumnSpec, ColumnType, ForeignRef};
use crate::core::{Result, SchemaError};
use std::collections::BTreeMap;

/// One inference rule. Matching is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Name equals the designated primary key
    PrimaryKey,
    /// Name contains "name"
    Name,
    /// Name contains "email"
    Email,
    /// Name contains "price"
    Price,
    /// Name contains "date"
    Date,
    /// Name equals a known foreign-reference token
    ForeignReference,
}

/// Rules in precedence order.
pub const RULES: [Rule; 6] = [
    Rule::PrimaryKey,
    Rule::Name,
    Rule::Email,
    Rule::Price,
    Rule::Date,
    Rule::ForeignReference,
];

pub const DEFAULT_NAME_LENGTH: u32 = 80;
pub const DEFAULT_EMAIL_LENGTH: u32 = 254;
pub const PRICE_TYPE: ColumnType = ColumnType::Decimal(10, 5);

/// Inference policy. The defaults follow the documented table; lengths and
/// foreign-reference tokens can be overridden from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInferencer {
    pub name_length: u32,
    pub email_length: u32,
    /// Foreign-reference token (lower case) to referenced table
    pub references: BTreeMap<String, String>,
}

impl Default for TypeInferencer {
    fn default() -> Self {
        TypeInferencer {
            name_length: DEFAULT_NAME_LENGTH,
            email_length: DEFAULT_EMAIL_LENGTH,
            references: default_references(),
        }
    }
}

/// `customer -> customers`, `product -> products`
pub fn default_references() -> BTreeMap<String, String> {
    [("customer", "customers"), ("product", "products")]
        .into_iter()
        .map(|(token, table)| (token.to_string(), table.to_string()))
        .collect()
}

impl TypeInferencer {
    /// The first rule matching `name`, if any.
    pub fn rule_for(&self, name: &str, primary_key: Option<&str>) -> Option<Rule> {
        let lower = name.trim().to_lowercase();
        RULES.into_iter().find(|rule| match rule {
            Rule::PrimaryKey => primary_key.is_some_and(|pk| pk.trim().eq_ignore_ascii_case(&lower)),
            Rule::Name => lower.contains("name"),
            Rule::Email => lower.contains("email"),
            Rule::Price => lower.contains("price"),
            Rule::Date => lower.contains("date"),
            Rule::ForeignReference => self.references.contains_key(&lower),
        })
    }

    /// Infers the column for `name`.
    ///
    /// # Errors
    ///
    /// `SchemaError::UnrecognizedColumn` when no rule matches.
    pub fn infer(&self, name: &str, primary_key: Option<&str>) -> Result<ColumnSpec> {
        let name = name.trim();
        let rule = self
            .rule_for(name, primary_key)
            .ok_or_else(|| SchemaError::UnrecognizedColumn(name.to_string()))?;

        let column = match rule {
            Rule::PrimaryKey => ColumnSpec::new(name, ColumnType::Integer).primary_key(),
            Rule::Name => ColumnSpec::new(name, ColumnType::VarChar(self.name_length)),
            Rule::Email => ColumnSpec::new(name, ColumnType::VarChar(self.email_length)),
            Rule::Price => ColumnSpec::new(name, PRICE_TYPE),
            Rule::Date => ColumnSpec::new(name, ColumnType::DateTime),
            Rule::ForeignReference => {
                let table = self.references.get(&name.to_lowercase()).cloned();
                ColumnSpec::new(name, ColumnType::Integer).foreign_key(table.map(|table| {
                    ForeignRef {
                        table,
                        column: Some("id".to_string()),
                    }
                }))
            }
        };
        Ok(column)
    }

    /// Infers every column of a header. The first column is the primary key.
    pub fn infer_header(&self, header: &[&str]) -> Result<Vec<ColumnSpec>> {
        let primary_key = header.first().copied();
        header
            .iter()
            .map(|name| self.infer(name, primary_key))
            .collect()
    }
}

/// Infers a column with the default policy.
pub fn infer_type(name: &str, primary_key: Option<&str>) -> Result<ColumnSpec> {
    TypeInferencer::default().infer(name, primary_key)
}
