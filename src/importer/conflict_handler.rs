// ==========================================
// Trip import engine - conflict handler
// ==========================================
// Responsibility: duplicate composite keys inside one file and against the store
// Policy: the first occurrence wins, later rows become row-level errors
// ==========================================

use crate::domain::TripKey;
use crate::importer::trip_importer_trait::ConflictHandler as ConflictHandlerTrait;
use std::collections::{HashMap, HashSet};

pub struct ConflictHandler;

impl ConflictHandlerTrait for ConflictHandler {
    /// Duplicate keys inside one batch
    ///
    /// # Returns
    /// - Vec<(row, key)>: every occurrence after the first
    fn detect_duplicates(&self, keys: &[(usize, TripKey)]) -> Vec<(usize, TripKey)> {
        let mut first_occurrence: HashMap<&TripKey, usize> = HashMap::new();
        let mut duplicates = Vec::new();

        for (row, key) in keys {
            if first_occurrence.contains_key(key) {
                duplicates.push((*row, key.clone()));
            } else {
                first_occurrence.insert(key, *row);
            }
        }

        duplicates
    }

    /// Keys already committed by an earlier batch
    ///
    /// # Arguments
    /// - keys: candidate keys with their row numbers
    /// - existing: subset already present in the store
    fn detect_cross_batch_duplicates(
        &self,
        keys: &[(usize, TripKey)],
        existing: &HashSet<TripKey>,
    ) -> Vec<(usize, TripKey)> {
        keys.iter()
            .filter(|(_, key)| existing.contains(key))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn key(opco: &str, trip_id: &str) -> TripKey {
        TripKey {
            opco_id: opco.to_string(),
            broker_account_id: format!("MTM_{}", opco),
            service_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            trip_id: trip_id.to_string(),
        }
    }

    #[test]
    fn test_detect_duplicates_none() {
        let handler = ConflictHandler;
        let keys = vec![(1, key("MAIN", "T1")), (2, key("MAIN", "T2"))];

        assert!(handler.detect_duplicates(&keys).is_empty());
    }

    #[test]
    fn test_detect_duplicates_multiple() {
        let handler = ConflictHandler;
        let keys = vec![
            (1, key("MAIN", "T1")),
            (2, key("MAIN", "T1")),
            (3, key("MAIN", "T2")),
            (4, key("MAIN", "T1")),
        ];

        let duplicates = handler.detect_duplicates(&keys);

        assert_eq!(duplicates.len(), 2);
        assert_eq!(duplicates[0].0, 2);
        assert_eq!(duplicates[1].0, 4);
    }

    #[test]
    fn test_same_trip_id_in_other_partition_is_not_a_duplicate() {
        let handler = ConflictHandler;
        let keys = vec![(1, key("MAIN", "T1")), (2, key("SAHRAWI", "T1"))];

        assert!(handler.detect_duplicates(&keys).is_empty());
    }

    #[test]
    fn test_detect_cross_batch_duplicates() {
        let handler = ConflictHandler;
        let keys = vec![(1, key("MAIN", "T1")), (2, key("MAIN", "T2"))];
        let existing: HashSet<TripKey> = [key("MAIN", "T2")].into_iter().collect();

        let duplicates = handler.detect_cross_batch_duplicates(&keys, &existing);

        assert_eq!(duplicates, vec![(2, key("MAIN", "T2"))]);
    }
}
