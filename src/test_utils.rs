/// # Test Utilities Module
///
/// Shared fixtures for unit tests: in-memory databases with scripted
/// confirmation answers and a small orders data set.

use crate::database::Database;
use crate::guard::ScriptedConfirm;

/// Header plus three data rows in the shape of an orders export.
pub const ORDERS_CSV: &[&str] = &[
    "id,date_time,customer_name,customer_email,product_name,product_price",
    "1,2023-01-05T10:00:00,Alice,alice@example.com,Widget,9.99",
    "2,2023-01-06T11:30:00,Bob,bob@example.com,Gadget,19.5",
    "3,2023-01-07T09:15:00,Carol,carol@example.com,Gizmo,4.25",
];

/// Owned copies of raw lines, as a row source would return them.
pub fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|line| line.to_string()).collect()
}

/// A connected in-memory database whose guard replays `answers`.
pub fn memory_database(answers: &[bool]) -> Database<ScriptedConfirm> {
    Database::in_memory(ScriptedConfirm::new(answers)).expect("in-memory database")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SelectQuery;

    #[test]
    fn test_fixture_loads_orders() {
        let mut db = memory_database(&[]);
        assert!(db.is_connected());
        assert_eq!(db.new_table(&lines(ORDERS_CSV), "orders").unwrap(), 3);

        let rows = db
            .read(&SelectQuery::new("orders").columns(&["date_time"]).limit(1))
            .unwrap();
        assert_eq!(rows.rows, vec![vec!["2023-01-05 10:00:00"]]);
    }
}
