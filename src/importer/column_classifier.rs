// ==========================================
// Trip import engine - allowlist column classifier
// ==========================================
// Responsibility: raw CSV header -> canonical field, by static table lookup
// Red line: allow-by-default-deny. A header not in the table is never read,
//           whatever it is called. No keyword heuristics.
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

// ==========================================
// CanonicalField - the only fields a TripRecord can be built from
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    TripId,
    ServiceDate,
    Driver,
    Vehicle,
    MobilityType,
    RoutedDistance,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::TripId,
        CanonicalField::ServiceDate,
        CanonicalField::Driver,
        CanonicalField::Vehicle,
        CanonicalField::MobilityType,
        CanonicalField::RoutedDistance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::TripId => "trip_id",
            CanonicalField::ServiceDate => "service_date",
            CanonicalField::Driver => "driver",
            CanonicalField::Vehicle => "vehicle",
            CanonicalField::MobilityType => "mobility_type",
            CanonicalField::RoutedDistance => "routed_distance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// Header allowlist
// ==========================================
// Literal header strings, compared after lowercase + trim + whitespace collapse.
// Adding vendor tolerance = adding a string here (or via config). Nothing else.
pub const HEADER_ALLOWLIST: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::TripId,
        &["trip id", "tripid", "trip_id", "id", "trip number", "trip #"],
    ),
    (
        CanonicalField::ServiceDate,
        &["date", "service date", "trip date", "date of service", "dos", "service_date"],
    ),
    (CanonicalField::Driver, &["driver", "driver name", "driver_name"]),
    (
        CanonicalField::Vehicle,
        &["vehicle", "vehicle unit", "vehicle id", "vehicle #", "unit"],
    ),
    (
        CanonicalField::MobilityType,
        &["mobility type", "type", "mobility", "level of service", "los"],
    ),
    (
        CanonicalField::RoutedDistance,
        &["distance", "miles", "routed distance", "routed miles", "trip miles", "mileage"],
    ),
];

/// Lowercase, trim, collapse internal whitespace runs to one space
pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ==========================================
// ColumnClassification - classifier output
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnClassification {
    pub extracted_columns: Vec<String>,           // headers matched to a canonical field
    pub ignored_columns: Vec<String>,             // everything else (never read)
    pub mapping: HashMap<CanonicalField, usize>,  // canonical field -> column index
}

impl ColumnClassification {
    pub fn column_of(&self, field: CanonicalField) -> Option<usize> {
        self.mapping.get(&field).copied()
    }

    pub fn has(&self, field: CanonicalField) -> bool {
        self.mapping.contains_key(&field)
    }
}

// ==========================================
// ColumnClassifier
// ==========================================
#[derive(Debug, Clone)]
pub struct ColumnClassifier {
    lookup: HashMap<String, CanonicalField>,
}

impl Default for ColumnClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnClassifier {
    /// Classifier over the built-in allowlist only
    pub fn new() -> Self {
        let mut lookup = HashMap::new();
        for (field, headers) in HEADER_ALLOWLIST {
            for header in headers.iter() {
                lookup.insert(normalize_header(header), *field);
            }
        }
        Self { lookup }
    }

    /// Built-in allowlist plus additive synonyms keyed by canonical field name.
    ///
    /// Synonyms can only attach to an existing canonical field; unknown field
    /// names are logged and dropped. A synonym already claimed by another field
    /// keeps its original mapping.
    pub fn with_extra_synonyms(extra: &HashMap<String, Vec<String>>) -> Self {
        let mut classifier = Self::new();
        for (field_name, synonyms) in extra {
            let Some(field) = CanonicalField::from_name(field_name) else {
                warn!(field = %field_name, "extra header synonyms for unknown canonical field ignored");
                continue;
            };
            for synonym in synonyms {
                let key = normalize_header(synonym);
                if key.is_empty() {
                    continue;
                }
                classifier.lookup.entry(key).or_insert(field);
            }
        }
        classifier
    }

    pub fn lookup(&self, header: &str) -> Option<CanonicalField> {
        self.lookup.get(&normalize_header(header)).copied()
    }

    /// Classify a header row. Pure function of the header list.
    pub fn classify(&self, headers: &[String]) -> ColumnClassification {
        let mut result = ColumnClassification::default();

        for (idx, header) in headers.iter().enumerate() {
            match self.lookup(header) {
                Some(field) if !result.mapping.contains_key(&field) => {
                    result.mapping.insert(field, idx);
                    result.extracted_columns.push(header.clone());
                }
                // second header for an already-mapped field: first one wins
                Some(_) | None => result.ignored_columns.push(header.clone()),
            }
        }

        debug!(
            extracted = result.extracted_columns.len(),
            ignored = result.ignored_columns.len(),
            "header classification done"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_synonyms_case_insensitive() {
        let classifier = ColumnClassifier::new();
        assert_eq!(classifier.lookup("Trip Id"), Some(CanonicalField::TripId));
        assert_eq!(classifier.lookup("TRIPID"), Some(CanonicalField::TripId));
        assert_eq!(classifier.lookup("ID"), Some(CanonicalField::TripId));
        assert_eq!(classifier.lookup("  Service   Date "), Some(CanonicalField::ServiceDate));
        assert_eq!(classifier.lookup("Type"), Some(CanonicalField::MobilityType));
    }

    #[test]
    fn test_phi_headers_are_ignored() {
        let classifier = ColumnClassifier::new();
        let result = classifier.classify(&headers(&[
            "Trip ID",
            "Patient Name",
            "Phone",
            "DOB",
            "Address",
            "Date",
            "Driver",
        ]));

        assert_eq!(result.extracted_columns, headers(&["Trip ID", "Date", "Driver"]));
        assert_eq!(
            result.ignored_columns,
            headers(&["Patient Name", "Phone", "DOB", "Address"])
        );
        assert_eq!(result.column_of(CanonicalField::Driver), Some(6));
    }

    #[test]
    fn test_unknown_column_ignored_without_configuration() {
        let classifier = ColumnClassifier::new();
        let result = classifier.classify(&headers(&["Trip ID", "New Vendor Field"]));
        assert!(result.ignored_columns.contains(&"New Vendor Field".to_string()));
        assert!(!result.extracted_columns.contains(&"New Vendor Field".to_string()));
    }

    #[test]
    fn test_near_miss_headers_are_not_admitted() {
        // "Driver Phone" contains an allowlisted word but is not an allowlisted header
        let classifier = ColumnClassifier::new();
        let result = classifier.classify(&headers(&["Driver Phone", "Patient ID", "Member ID"]));
        assert!(result.extracted_columns.is_empty());
        assert_eq!(result.ignored_columns.len(), 3);
    }

    #[test]
    fn test_first_header_wins_for_same_field() {
        let classifier = ColumnClassifier::new();
        let result = classifier.classify(&headers(&["Trip ID", "ID"]));
        assert_eq!(result.column_of(CanonicalField::TripId), Some(0));
        assert_eq!(result.ignored_columns, headers(&["ID"]));
    }

    #[test]
    fn test_extra_synonyms_are_additive() {
        let mut extra = HashMap::new();
        extra.insert("driver".to_string(), vec!["Chauffeur".to_string()]);
        extra.insert("patient_name".to_string(), vec!["Patient".to_string()]);
        // must not steal an existing mapping
        extra.insert("vehicle".to_string(), vec!["Date".to_string()]);

        let classifier = ColumnClassifier::with_extra_synonyms(&extra);
        assert_eq!(classifier.lookup("chauffeur"), Some(CanonicalField::Driver));
        assert_eq!(classifier.lookup("Patient"), None);
        assert_eq!(classifier.lookup("Date"), Some(CanonicalField::ServiceDate));
    }
}
