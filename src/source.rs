//! Delimited text input.
//!
//! Lines are split on commas with no quoting or escaping, so values that
//! contain a comma are not supported.

use crate::core::Result;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const DELIMITER: char = ',';

/// Reads the non-empty lines of a file, without line terminators.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())?;
    let lines: Vec<String> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();
    debug!("Read {} lines from {:?}", lines.len(), path.as_ref());
    Ok(lines)
}

/// Splits one line into fields.
pub fn split_line(line: &str) -> Vec<&str> {
    line.trim_end_matches(&['\r', '\n'][..]).split(DELIMITER).collect()
}

/// Table name for a file: its stem (`data/orders.csv` -> `orders`).
pub fn table_name<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref()
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_split_line() {
        assert_eq!(split_line("1,Alice,9.99\r\n"), vec!["1", "Alice", "9.99"]);
        assert_eq!(split_line("a,,b"), vec!["a", "", "b"]);
        // Quoting is not interpreted
        assert_eq!(split_line("\"a,b\""), vec!["\"a", "b\""]);
    }

    #[test]
    fn test_table_name() {
        assert_eq!(table_name("data/orders.csv").as_deref(), Some("orders"));
        assert_eq!(table_name("customers").as_deref(), Some("customers"));
    }

    #[test]
    fn test_read_lines_skips_blank() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "id,name\r\n1,Alice\n\n2,Bob\n").unwrap();

        let lines = read_lines(file.path()).unwrap();
        assert_eq!(lines, vec!["id,name", "1,Alice", "2,Bob"]);
    }

    #[test]
    fn test_read_missing_file() {
        assert!(read_lines("/nonexistent/orders.csv").is_err());
    }
}
