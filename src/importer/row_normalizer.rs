// ==========================================
// Trip import engine - row normalizer / validator
// ==========================================
// Responsibility: raw row + column mapping -> typed row | skip | row error
// Red line: only allowlisted canonical columns are read
// ==========================================

use crate::domain::{MobilityType, NormalizedRow};
use crate::importer::column_classifier::{CanonicalField, ColumnClassification};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportError;
use crate::importer::file_parser::RawRow;
use crate::importer::trip_importer_trait::{DataCleaner as _, RowNormalizer};

/// Default routed-distance anomaly threshold (miles); above it the row is flagged
pub const DEFAULT_MAX_ROUTED_DISTANCE: f64 = 500.0;

pub const BLANK_ROW_REASON: &str = "blank row";

// ==========================================
// NormalizeOutcome
// ==========================================
#[derive(Debug)]
pub enum NormalizeOutcome {
    Normalized(NormalizedRow),
    Skipped(String),
    Failed(ImportError),
}

// ==========================================
// RowNormalizerImpl
// ==========================================
#[derive(Default)]
pub struct RowNormalizerImpl {
    cleaner: DataCleaner,
}

impl RowNormalizerImpl {
    pub fn new() -> Self {
        Self::default()
    }

    fn field<'a>(
        &self,
        row: &'a RawRow,
        columns: &ColumnClassification,
        field: CanonicalField,
    ) -> Option<&'a str> {
        columns.column_of(field).and_then(|idx| row.get(idx))
    }

    fn required<'a>(
        &self,
        row: &'a RawRow,
        columns: &ColumnClassification,
        field: CanonicalField,
    ) -> Result<&'a str, ImportError> {
        self.field(row, columns, field)
            .ok_or_else(|| ImportError::MalformedRow {
                row: row.row_number,
                message: format!("missing required field '{}'", field),
            })
    }

    fn normalize_inner(
        &self,
        row: &RawRow,
        columns: &ColumnClassification,
        max_routed_distance: f64,
    ) -> Result<NormalizedRow, ImportError> {
        let mut warnings = Vec::new();

        let trip_id = self.cleaner.clean_text(
            self.required(row, columns, CanonicalField::TripId)?,
            false,
        );

        let service_date = match self.field(row, columns, CanonicalField::ServiceDate) {
            Some(raw) => self
                .cleaner
                .parse_service_date(raw)
                .ok_or_else(|| ImportError::MalformedDate {
                    row: row.row_number,
                    value: raw.to_string(),
                })?,
            None => {
                return Err(ImportError::MalformedDate {
                    row: row.row_number,
                    value: String::new(),
                })
            }
        };

        let driver_raw = self
            .cleaner
            .clean_person_name(self.required(row, columns, CanonicalField::Driver)?);

        let vehicle_unit = self
            .cleaner
            .normalize_null(self.field(row, columns, CanonicalField::Vehicle).map(str::to_string));

        let mobility_type = self
            .cleaner
            .clean_mobility_type(self.field(row, columns, CanonicalField::MobilityType));
        if let MobilityType::Other(raw) = &mobility_type {
            warnings.push(format!("unrecognized mobility type '{}'", raw));
        }

        let routed_distance = match self.field(row, columns, CanonicalField::RoutedDistance) {
            None => None,
            Some(raw) => {
                let distance =
                    self.cleaner
                        .parse_distance(raw)
                        .ok_or_else(|| ImportError::MalformedRow {
                            row: row.row_number,
                            message: format!("routed distance '{}' is not a number", raw),
                        })?;
                if distance < 0.0 {
                    return Err(ImportError::MalformedRow {
                        row: row.row_number,
                        message: format!("routed distance {} is negative", distance),
                    });
                }
                if distance > max_routed_distance {
                    // warning level, row still imported
                    warnings.push(format!(
                        "routed distance {} exceeds {} miles",
                        distance, max_routed_distance
                    ));
                }
                Some(distance)
            }
        };

        Ok(NormalizedRow {
            row_number: row.row_number,
            trip_id,
            service_date,
            driver_raw,
            vehicle_unit,
            mobility_type,
            routed_distance,
            warnings,
        })
    }
}

impl RowNormalizer for RowNormalizerImpl {
    fn normalize(
        &self,
        row: &RawRow,
        columns: &ColumnClassification,
        max_routed_distance: f64,
    ) -> NormalizeOutcome {
        if let Some(parse_error) = &row.parse_error {
            return NormalizeOutcome::Failed(ImportError::MalformedRow {
                row: row.row_number,
                message: parse_error.clone(),
            });
        }

        if row.is_blank() {
            return NormalizeOutcome::Skipped(BLANK_ROW_REASON.to_string());
        }

        match self.normalize_inner(row, columns, max_routed_distance) {
            Ok(normalized) => NormalizeOutcome::Normalized(normalized),
            Err(e) => NormalizeOutcome::Failed(e),
        }
    }
}
