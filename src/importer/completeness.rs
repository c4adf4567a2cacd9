// ==========================================
// Trip import engine - completeness accountant
// ==========================================
// Proof per batch: imported + skipped + errored == expected, and every row
// number 1..=expected has exactly one outcome.
// ==========================================

use crate::domain::{CompletenessReport, RowOutcome};
use std::collections::BTreeMap;

pub struct CompletenessAccountant;

impl CompletenessAccountant {
    /// Build the accounting proof for one batch
    ///
    /// # Arguments
    /// - expected_rows: logical data rows after the header
    /// - outcomes: (1-based row, outcome); a row reported twice counts once
    pub fn account(expected_rows: usize, outcomes: &[(usize, RowOutcome)]) -> CompletenessReport {
        let mut by_row: BTreeMap<usize, &RowOutcome> = BTreeMap::new();
        for (row, outcome) in outcomes {
            if (1..=expected_rows).contains(row) {
                by_row.entry(*row).or_insert(outcome);
            }
        }

        let mut report = CompletenessReport {
            expected_rows,
            ..CompletenessReport::default()
        };
        for outcome in by_row.values() {
            match outcome {
                RowOutcome::Imported(_) => report.imported_rows += 1,
                RowOutcome::Skipped(_) => report.skipped_rows += 1,
                RowOutcome::Error(_) => report.error_rows += 1,
            }
        }

        report.accounted_rows = report.imported_rows + report.skipped_rows + report.error_rows;
        report.missing_rows = (1..=expected_rows)
            .filter(|row| !by_row.contains_key(row))
            .collect();
        report.is_complete =
            report.accounted_rows == expected_rows && report.missing_rows.is_empty();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_batch() {
        let outcomes = vec![
            (1, RowOutcome::Error("bad date".to_string())),
            (2, RowOutcome::Skipped("blank row".to_string())),
            (3, RowOutcome::Error("duplicate".to_string())),
        ];

        let report = CompletenessAccountant::account(3, &outcomes);

        assert!(report.is_complete);
        assert_eq!(report.accounted_rows, 3);
        assert_eq!(report.error_rows, 2);
        assert_eq!(report.skipped_rows, 1);
    }

    #[test]
    fn test_missing_rows_are_named() {
        let outcomes = vec![
            (1, RowOutcome::Skipped("blank row".to_string())),
            (4, RowOutcome::Skipped("blank row".to_string())),
        ];

        let report = CompletenessAccountant::account(4, &outcomes);

        assert!(!report.is_complete);
        assert_eq!(report.missing_rows, vec![2, 3]);
        assert_eq!(report.accounted_rows, 2);
    }

    #[test]
    fn test_double_reported_row_counts_once() {
        let outcomes = vec![
            (1, RowOutcome::Error("first".to_string())),
            (1, RowOutcome::Error("second".to_string())),
        ];

        let report = CompletenessAccountant::account(2, &outcomes);

        assert_eq!(report.error_rows, 1);
        assert_eq!(report.missing_rows, vec![2]);
    }

    #[test]
    fn test_empty_file_is_complete() {
        let report = CompletenessAccountant::account(0, &[]);
        assert!(report.is_complete);
    }
}
