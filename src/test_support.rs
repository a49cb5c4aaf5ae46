use crate::services::matching::ingest::{parse_date, read_observations};
use crate::services::matching::types::{EntityType, Observation, ObservationTable};

/// T1 (Test, A) against C1..C3 (Not Test, A) and C4 (Not Test, B).
pub const SAMPLE_CSV: &str = "\
Entity,Type,Date,Filter,Sales $,Sales Qty
T1,Test,01/01/2024,A,10,100
T1,Test,01/02/2024,A,12,110
C1,Not Test,01/01/2024,A,11,101
C1,Not Test,01/02/2024,A,13,111
C2,Not Test,01/01/2024,A,15,100
C2,Not Test,01/02/2024,A,17,110
C3,Not Test,01/01/2024,A,10,90
C3,Not Test,01/02/2024,A,12,130
C4,Not Test,01/01/2024,B,10,100
C4,Not Test,01/02/2024,B,12,110
";

pub fn sample_table() -> ObservationTable {
    read_observations(SAMPLE_CSV.as_bytes()).expect("sample csv is valid")
}

pub fn obs(
    entity: &str,
    entity_type: EntityType,
    date: &str,
    filter: &str,
    values: &[Option<f64>],
) -> Observation {
    Observation {
        entity: entity.to_string(),
        entity_type,
        date: parse_date(date).expect("fixture date"),
        filter: filter.to_string(),
        values: values.to_vec(),
    }
}

pub fn table(metrics: &[&str], rows: Vec<Observation>) -> ObservationTable {
    ObservationTable::new(metrics.iter().map(|m| m.to_string()).collect(), rows)
        .expect("fixture table is valid")
}
