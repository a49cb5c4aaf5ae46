use super::types::{EntityType, Observation, ObservationTable};
use anyhow::Context;
use crate::error::{ValidationError, ValidationResult, REQUIRED_COLUMNS};
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Cell contents treated as a missing metric value rather than a number.
const MISSING_TOKENS: [&str; 7] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL"];

/// Column positions resolved from the header row. Every header outside the
/// four identifier columns is a metric, kept in header order.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub entity: usize,
    pub entity_type: usize,
    pub date: usize,
    pub filter: usize,
    pub metrics: Vec<(usize, String)>,
}

impl TableSchema {
    pub fn discover(headers: &StringRecord) -> ValidationResult<Self> {
        let position = |name: &str| headers.iter().position(|h| h == name);
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|&&name| position(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingColumns { missing });
        }

        let mut seen = HashSet::new();
        let mut duplicates: Vec<String> = Vec::new();
        for header in headers.iter() {
            if !seen.insert(header) && !duplicates.iter().any(|d| d == header) {
                duplicates.push(header.to_string());
            }
        }
        if !duplicates.is_empty() {
            return Err(ValidationError::DuplicateColumns { duplicates });
        }

        let metrics = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !REQUIRED_COLUMNS.contains(h))
            .map(|(idx, h)| (idx, h.to_string()))
            .collect();

        Ok(Self {
            entity: position("Entity").unwrap_or_default(),
            entity_type: position("Type").unwrap_or_default(),
            date: position("Date").unwrap_or_default(),
            filter: position("Filter").unwrap_or_default(),
            metrics,
        })
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|(_, name)| name.clone()).collect()
    }
}

/// Opening the file is an IO failure; anything wrong with its contents stays a
/// `ValidationError` under the `anyhow` context.
pub fn read_observations_from_path(path: &Path) -> anyhow::Result<ObservationTable> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let table = read_observations(file)?;
    tracing::info!(
        path = %path.display(),
        rows = table.rows().len(),
        entities = table.entities().len(),
        metrics = table.metrics().len(),
        "loaded observations"
    );
    Ok(table)
}

/// Parses and validates a CSV observation table.
///
/// Checks run as whole-table passes so the reported failure follows rule
/// precedence (schema, then Type, then Date, then metric values, then the
/// per-entity invariants) rather than row order.
pub fn read_observations<R: Read>(input: R) -> ValidationResult<ObservationTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input);
    let headers = reader.headers()?.clone();
    let schema = TableSchema::discover(&headers)?;

    let records: Vec<StringRecord> = reader.records().collect::<Result<_, _>>()?;

    let types = records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            let raw = record.get(schema.entity_type).unwrap_or_default();
            EntityType::parse(raw).ok_or_else(|| ValidationError::InvalidType {
                row: line_of(record, idx),
                value: raw.to_string(),
            })
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    let dates = records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            let raw = record.get(schema.date).unwrap_or_default();
            parse_date(raw).ok_or_else(|| ValidationError::InvalidDate {
                row: line_of(record, idx),
                value: raw.to_string(),
            })
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(records.len());
    for (idx, ((record, entity_type), date)) in
        records.iter().zip(types).zip(dates).enumerate()
    {
        let values = schema
            .metrics
            .iter()
            .map(|(col, name)| {
                let raw = record.get(*col).unwrap_or_default();
                parse_metric(raw).ok_or_else(|| ValidationError::MetricValue {
                    row: line_of(record, idx),
                    column: name.clone(),
                    value: raw.to_string(),
                })
            })
            .collect::<ValidationResult<Vec<_>>>()?;

        rows.push(Observation {
            entity: record.get(schema.entity).unwrap_or_default().to_string(),
            entity_type,
            date,
            filter: record.get(schema.filter).unwrap_or_default().to_string(),
            values,
        });
    }

    ObservationTable::new(schema.metric_names(), rows)
}

/// Accepts `m/d/yyyy` with optional zero padding; the year must be exactly
/// four digits.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let year = raw.rsplit('/').next()?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

/// `Some(None)` for a missing cell, `None` when the cell is not a number.
fn parse_metric(raw: &str) -> Option<Option<f64>> {
    let trimmed = raw.trim();
    if MISSING_TOKENS.contains(&trimmed) {
        return Some(None);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(Some(value)),
        _ => None,
    }
}

fn line_of(record: &StringRecord, idx: usize) -> usize {
    record
        .position()
        .map(|pos| pos.line() as usize)
        .unwrap_or(idx + 2)
}

/// Logs the first `limit` rows, the CLI's stand-in for an upload preview.
pub fn log_preview(table: &ObservationTable, limit: usize) {
    for row in table.rows().iter().take(limit) {
        tracing::info!(
            entity = %row.entity,
            entity_type = row.entity_type.as_str(),
            date = %row.date.format(DATE_FORMAT),
            filter = %row.filter,
            values = ?row.values,
            "preview"
        );
    }
}
