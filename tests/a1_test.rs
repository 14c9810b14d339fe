//! Tests for A1 column and range helpers.

use mcp_google_spreadsheet::a1::{
    column_index_to_letter, column_letter_to_index, parse_range_start, CellRef,
};

mod index_to_letter {
    use super::*;

    #[test]
    fn single_letters() {
        assert_eq!(column_index_to_letter(1), "A");
        assert_eq!(column_index_to_letter(26), "Z");
    }

    #[test]
    fn carries_without_zero_digit() {
        assert_eq!(column_index_to_letter(27), "AA");
        assert_eq!(column_index_to_letter(52), "AZ");
        assert_eq!(column_index_to_letter(53), "BA");
        assert_eq!(column_index_to_letter(702), "ZZ");
        assert_eq!(column_index_to_letter(703), "AAA");
    }

    #[test]
    fn zero_is_empty() {
        assert_eq!(column_index_to_letter(0), "");
    }
}

mod letter_to_index {
    use super::*;

    #[test]
    fn known_columns() {
        assert_eq!(column_letter_to_index("A"), Some(1));
        assert_eq!(column_letter_to_index("z"), Some(26));
        assert_eq!(column_letter_to_index("AA"), Some(27));
        assert_eq!(column_letter_to_index("AAA"), Some(703));
    }

    #[test]
    fn rejects_non_letters() {
        assert_eq!(column_letter_to_index(""), None);
        assert_eq!(column_letter_to_index("A1"), None);
        assert_eq!(column_letter_to_index("ZZZZZZZZZZ"), None);
    }
}

mod range_start {
    use super::*;

    #[test]
    fn round_trips_with_letters() {
        for index in [1, 26, 27, 52, 53, 702, 703] {
            let range = format!("{}5:ZZZ9", column_index_to_letter(index));
            assert_eq!(parse_range_start(&range).column, index, "range {}", range);
        }
    }

    #[test]
    fn ignores_end_cell() {
        assert_eq!(parse_range_start("B3:D10"), CellRef { column: 2, row: 3 });
        assert_eq!(parse_range_start("B3:garbage"), CellRef { column: 2, row: 3 });
    }

    #[test]
    fn whole_columns_and_rows() {
        assert_eq!(parse_range_start("C:E"), CellRef { column: 3, row: 1 });
        assert_eq!(parse_range_start("10:11"), CellRef { column: 1, row: 10 });
    }

    #[test]
    fn lowercase_and_single_cell() {
        assert_eq!(parse_range_start("aa12"), CellRef { column: 27, row: 12 });
    }

    #[test]
    fn empty_defaults_to_a1() {
        assert_eq!(parse_range_start(""), CellRef::default());
    }
}
