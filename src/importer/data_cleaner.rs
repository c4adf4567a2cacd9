// ==========================================
// Trip import engine - data cleaner
// ==========================================
// Responsibility: TRIM / NULL normalization / date, mobility and distance parsing
// ==========================================

use crate::domain::MobilityType;
use crate::importer::trip_importer_trait::DataCleaner as DataCleanerTrait;
use chrono::{Datelike, NaiveDate};

/// Accepted service date formats, tried in order
pub const SERVICE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%-m/%-d/%Y"];

// Two-digit years parse as year 25 AD under %Y; reject anything outside this window
const MIN_SERVICE_YEAR: i32 = 1900;
const MAX_SERVICE_YEAR: i32 = 2100;

const AMBULATORY_VALUES: &[&str] = &["ambulatory", "amb", "ambulant", "walker"];
const WHEELCHAIR_VALUES: &[&str] = &["wheelchair", "wheel chair", "wc", "w/c", "wch"];
const STRETCHER_VALUES: &[&str] = &["stretcher", "str", "gurney"];

#[derive(Default)]
pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn clean_text(&self, value: &str, uppercase: bool) -> String {
        let trimmed = value.trim();
        if uppercase {
            trimmed.to_uppercase()
        } else {
            trimmed.to_string()
        }
    }

    fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn parse_service_date(&self, value: &str) -> Option<NaiveDate> {
        // "1/15/2025 08:30 AM" / "2025-01-15T08:30:00" -> date token only
        let token = value
            .trim()
            .split(|c: char| c.is_whitespace() || c == 'T')
            .next()
            .unwrap_or("");

        SERVICE_DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
            .filter(|d| (MIN_SERVICE_YEAR..=MAX_SERVICE_YEAR).contains(&d.year()))
    }

    fn clean_mobility_type(&self, value: Option<&str>) -> MobilityType {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return MobilityType::Unspecified;
        };

        let key = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        if AMBULATORY_VALUES.contains(&key.as_str()) {
            MobilityType::Ambulatory
        } else if WHEELCHAIR_VALUES.contains(&key.as_str()) {
            MobilityType::Wheelchair
        } else if STRETCHER_VALUES.contains(&key.as_str()) {
            MobilityType::Stretcher
        } else {
            MobilityType::Other(raw.to_string())
        }
    }

    fn parse_distance(&self, value: &str) -> Option<f64> {
        let lowered = value.trim().to_lowercase();
        let numeric = ["miles", "mile", "mi"]
            .iter()
            .find_map(|unit| lowered.strip_suffix(unit))
            .unwrap_or(&lowered)
            .trim()
            .replace(',', "");

        numeric.parse::<f64>().ok().filter(|d| d.is_finite())
    }
}

impl DataCleaner {
    /// Driver names: trim and collapse internal whitespace, keep casing
    pub fn clean_person_name(&self, value: &str) -> String {
        value.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
