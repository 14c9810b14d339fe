//! Helpers for A1-notation cell addresses.

use regex::Regex;
use std::sync::LazyLock;

/// Leading column letters and row digits of a cell reference, `$` markers allowed.
static CELL_START_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$?([A-Za-z]*)\$?([0-9]*)").expect("Invalid cell reference regex")
});

/// Convert a 1-based column index to its letter form (1 -> A, 27 -> AA).
///
/// Columns use bijective base-26, which has no zero digit, so each step
/// subtracts one before dividing. Index 0 yields an empty string.
///
/// ```
/// use mcp_google_spreadsheet::a1::column_index_to_letter;
///
/// assert_eq!(column_index_to_letter(52), "AZ");
/// assert_eq!(column_index_to_letter(703), "AAA");
/// ```
pub fn column_index_to_letter(index: u32) -> String {
    let mut letters = Vec::new();
    let mut n = index;
    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert column letters to a 1-based index. Case-insensitive.
///
/// Returns `None` for an empty string, non-letters, or overflow.
pub fn column_letter_to_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// Top-left cell of a range, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub column: u32,
    pub row: u32,
}

impl Default for CellRef {
    fn default() -> Self {
        Self { column: 1, row: 1 }
    }
}

/// Extract the starting column and row from an A1 range such as `B3:D10`.
///
/// Only the start cell is inspected; the end cell is ignored and the range
/// is not validated. A sheet prefix (`Sheet1!`) is skipped. Missing parts
/// default to 1, so `C:E` starts at column 3, row 1 and `5:9` at column 1,
/// row 5.
pub fn parse_range_start(range: &str) -> CellRef {
    let cells = match range.rfind('!') {
        Some(pos) => &range[pos + 1..],
        None => range,
    };
    let start = cells.split(':').next().unwrap_or_default().trim();

    let mut cell = CellRef::default();
    if let Some(captures) = CELL_START_REGEX.captures(start) {
        if let Some(column) = captures.get(1).and_then(|m| column_letter_to_index(m.as_str())) {
            cell.column = column;
        }
        if let Some(row) = captures
            .get(2)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|row| *row > 0)
        {
            cell.row = row;
        }
    }
    cell
}

/// Quote a tab title for use in an A1 range, doubling embedded quotes.
pub fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Build `'Title'!range`, or just `'Title'` (the whole tab) without a range.
pub fn sheet_range(title: &str, range: Option<&str>) -> String {
    match range {
        Some(range) => format!("{}!{}", quote_sheet_title(title), range),
        None => quote_sheet_title(title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_range() {
        assert_eq!(sheet_range("Sheet1", Some("A1:B2")), "'Sheet1'!A1:B2");
        assert_eq!(sheet_range("Bob's data", None), "'Bob''s data'");
    }

    #[test]
    fn test_parse_range_start_skips_sheet_prefix() {
        let cell = parse_range_start("'Q1 Sales'!$C$7:F20");
        assert_eq!(cell, CellRef { column: 3, row: 7 });
    }
}
