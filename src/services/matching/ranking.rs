use super::scoring::score_pair;
use super::types::{
    Entity, EntityType, MatchRecord, MatchReport, MatchWarning, MetricScore, ObservationTable,
    RankedRow, TopN, TopRow, WeightMap,
};
use crate::error::ValidationResult;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
pub struct RankOptions {
    /// Rank test entities on the rayon pool. Output order is unchanged.
    pub parallel: bool,
}

#[derive(Debug, Default)]
struct TestOutcome {
    ranked: Vec<RankedRow>,
    warnings: Vec<MatchWarning>,
}

/// Ranks every control entity against every test entity that shares its
/// filter and returns both the detailed and the top-N tables.
///
/// Weights are checked against the table's metric columns before any pair is
/// scored. Rows come out grouped by test entity in input order, then by
/// ascending `final_ranking`.
pub fn find_twin_matches(
    table: &ObservationTable,
    weights: &WeightMap,
    top_n: TopN,
    options: RankOptions,
) -> ValidationResult<MatchReport> {
    let metric_weights = weights.resolve(table.metrics())?;
    let started = Instant::now();

    let tests: Vec<&Entity> = table.entities_of_type(EntityType::Test).collect();
    let controls: Vec<&Entity> = table.entities_of_type(EntityType::NotTest).collect();

    let outcomes: Vec<TestOutcome> = if options.parallel {
        tests
            .par_iter()
            .map(|test| rank_test_entity(table, test, &controls, &metric_weights))
            .collect()
    } else {
        tests
            .iter()
            .map(|test| rank_test_entity(table, test, &controls, &metric_weights))
            .collect()
    };

    let mut report = MatchReport {
        metrics: table.metrics().to_vec(),
        ..MatchReport::default()
    };
    for outcome in outcomes {
        report.warnings.extend(outcome.warnings);
        for row in outcome.ranked {
            if row.final_ranking <= top_n.get() {
                report.top.push(TopRow::from(&row));
            }
            report.detailed.push(row);
        }
    }

    tracing::info!(
        test_entities = tests.len(),
        control_entities = controls.len(),
        detailed_rows = report.detailed.len(),
        top_rows = report.top.len(),
        warnings = report.warnings.len(),
        parallel = options.parallel,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "twin matching complete"
    );
    Ok(report)
}

fn rank_test_entity(
    table: &ObservationTable,
    test: &Entity,
    controls: &[&Entity],
    metric_weights: &[f64],
) -> TestOutcome {
    let mut outcome = TestOutcome::default();
    let mut records = Vec::new();

    for control in controls {
        if control.id == test.id {
            continue;
        }
        let Some(pair) = score_pair(table, test, control) else {
            continue;
        };
        if pair.has_insufficient() {
            let metrics: Vec<String> = table
                .metrics()
                .iter()
                .zip(pair.scores.iter())
                .filter(|(_, score)| score.is_insufficient())
                .map(|(metric, _)| metric.clone())
                .collect();
            tracing::debug!(
                test_entity = %test.id,
                control_entity = %control.id,
                matched_dates = pair.matched_dates,
                metrics = ?metrics,
                "insufficient overlap for dissimilarity score"
            );
            outcome.warnings.push(MatchWarning::InsufficientOverlap {
                test_entity: test.id.clone(),
                control_entity: control.id.clone(),
                metrics,
            });
        }
        records.push(MatchRecord {
            test_entity: test.id.clone(),
            control_entity: control.id.clone(),
            weighted_total: weighted_total(&pair.scores, metric_weights),
            scores: pair.scores,
        });
    }

    if records.is_empty() {
        tracing::warn!(
            test_entity = %test.id,
            filter = %test.filter,
            "no eligible control entities share this filter"
        );
        outcome.warnings.push(MatchWarning::NoEligibleControls {
            test_entity: test.id.clone(),
            filter: test.filter.clone(),
        });
    }

    outcome.ranked = rank_records(records);
    outcome
}

/// `Σ score × weight`. Zero-weight metrics are skipped, so their scores never
/// matter; any other undefined score makes the total undefined.
pub fn weighted_total(scores: &[MetricScore], weights: &[f64]) -> Option<f64> {
    let mut total = 0.0;
    for (score, weight) in scores.iter().zip(weights.iter()) {
        if *weight == 0.0 {
            continue;
        }
        total += score.value()? * weight;
    }
    Some(total)
}

/// Sorts ascending by weighted total (undefined last) and assigns 1-based
/// ranks. The sort is stable: equal totals keep the candidates' input order.
pub fn rank_records(mut records: Vec<MatchRecord>) -> Vec<RankedRow> {
    records.sort_by(|a, b| compare_totals(a.weighted_total, b.weighted_total));
    records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| RankedRow {
            test_entity: record.test_entity,
            twin_entity: record.control_entity,
            final_ranking: (idx + 1) as u32,
            scores: record.scores,
        })
        .collect()
}

fn compare_totals(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
