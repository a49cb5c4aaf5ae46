use crate::error::{ValidationError, ValidationResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const MIN_WEIGHT: f64 = 0.0;
pub const MAX_WEIGHT: f64 = 10.0;
pub const DEFAULT_WEIGHT: f64 = 5.0;
pub const MIN_TOP_N: i64 = 1;
pub const MAX_TOP_N: i64 = 10;
pub const DEFAULT_TOP_N: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityType {
    Test,
    NotTest,
}

impl EntityType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Test" => Some(EntityType::Test),
            "Not Test" => Some(EntityType::NotTest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Test => "Test",
            EntityType::NotTest => "Not Test",
        }
    }
}

/// One validated input row. `values` is positionally aligned with
/// [`ObservationTable::metrics`]; `None` marks a blank cell.
#[derive(Debug, Clone)]
pub struct Observation {
    pub entity: String,
    pub entity_type: EntityType,
    pub date: NaiveDate,
    pub filter: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub entity_type: EntityType,
    pub filter: String,
    pub rows: Vec<usize>,
}

/// Validated observations plus the per-entity index derived from them.
///
/// Entities are kept in first-appearance order. Construction enforces that an
/// entity never changes Type or Filter across its rows.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    metrics: Vec<String>,
    rows: Vec<Observation>,
    entities: Vec<Entity>,
}

impl ObservationTable {
    pub fn new(metrics: Vec<String>, rows: Vec<Observation>) -> ValidationResult<Self> {
        let mut entities: Vec<Entity> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (row_idx, row) in rows.iter().enumerate() {
            match index.get(&row.entity) {
                Some(&entity_idx) => {
                    let entity = &mut entities[entity_idx];
                    if entity.entity_type != row.entity_type {
                        return Err(ValidationError::ConflictingType {
                            entity: row.entity.clone(),
                        });
                    }
                    if entity.filter != row.filter {
                        return Err(ValidationError::InconsistentFilter {
                            entity: row.entity.clone(),
                            first: entity.filter.clone(),
                            other: row.filter.clone(),
                        });
                    }
                    entity.rows.push(row_idx);
                }
                None => {
                    index.insert(row.entity.clone(), entities.len());
                    entities.push(Entity {
                        id: row.entity.clone(),
                        entity_type: row.entity_type,
                        filter: row.filter.clone(),
                        rows: vec![row_idx],
                    });
                }
            }
        }

        Ok(Self {
            metrics,
            rows,
            entities,
        })
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn observations<'a>(&'a self, entity: &'a Entity) -> impl Iterator<Item = &'a Observation> {
        entity.rows.iter().map(move |idx| &self.rows[*idx])
    }

    pub fn entities_of_type(&self, entity_type: EntityType) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(move |entity| entity.entity_type == entity_type)
    }
}

/// Metric importance weights, each in `[0, 10]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightMap {
    weights: BTreeMap<String, f64>,
}

impl WeightMap {
    pub fn new(weights: BTreeMap<String, f64>) -> ValidationResult<Self> {
        for (metric, weight) in &weights {
            if !weight.is_finite() || *weight < MIN_WEIGHT || *weight > MAX_WEIGHT {
                return Err(ValidationError::WeightOutOfRange {
                    metric: metric.clone(),
                    weight: *weight,
                });
            }
        }
        Ok(Self { weights })
    }

    pub fn uniform(metrics: &[String], weight: f64) -> ValidationResult<Self> {
        Self::new(metrics.iter().map(|m| (m.clone(), weight)).collect())
    }

    /// Weights in metric order. The map must name exactly the given metrics.
    pub fn resolve(&self, metrics: &[String]) -> ValidationResult<Vec<f64>> {
        let missing: Vec<String> = metrics
            .iter()
            .filter(|m| !self.weights.contains_key(*m))
            .cloned()
            .collect();
        let unexpected: Vec<String> = self
            .weights
            .keys()
            .filter(|k| !metrics.contains(k))
            .cloned()
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(ValidationError::WeightsMismatch {
                missing,
                unexpected,
            });
        }
        Ok(metrics.iter().map(|m| self.weights[m]).collect())
    }
}

/// How many control entities make the summary table per test entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopN(u32);

impl TopN {
    pub fn new(n: i64) -> ValidationResult<Self> {
        if !(MIN_TOP_N..=MAX_TOP_N).contains(&n) {
            return Err(ValidationError::TopNOutOfRange(n));
        }
        Ok(Self(n as u32))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for TopN {
    fn default() -> Self {
        Self(DEFAULT_TOP_N as u32)
    }
}

/// Per-metric dissimilarity. `Insufficient` stands in for the undefined
/// score produced when fewer than two dates line up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "Option<f64>")]
pub enum MetricScore {
    Value(f64),
    Insufficient { matched: usize },
}

impl MetricScore {
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricScore::Value(v) => Some(*v),
            MetricScore::Insufficient { .. } => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, MetricScore::Insufficient { .. })
    }
}

impl From<MetricScore> for Option<f64> {
    fn from(score: MetricScore) -> Self {
        score.value()
    }
}

#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub test_entity: String,
    pub control_entity: String,
    pub scores: Vec<MetricScore>,
    pub weighted_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    pub test_entity: String,
    pub twin_entity: String,
    pub final_ranking: u32,
    pub scores: Vec<MetricScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopRow {
    pub test_entity: String,
    pub twin_entity: String,
    pub final_ranking: u32,
}

impl From<&RankedRow> for TopRow {
    fn from(row: &RankedRow) -> Self {
        Self {
            test_entity: row.test_entity.clone(),
            twin_entity: row.twin_entity.clone(),
            final_ranking: row.final_ranking,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchWarning {
    NoEligibleControls {
        test_entity: String,
        filter: String,
    },
    InsufficientOverlap {
        test_entity: String,
        control_entity: String,
        metrics: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchReport {
    pub metrics: Vec<String>,
    pub detailed: Vec<RankedRow>,
    pub top: Vec<TopRow>,
    pub warnings: Vec<MatchWarning>,
}
