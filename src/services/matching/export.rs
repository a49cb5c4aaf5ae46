use super::types::{MatchReport, MetricScore};
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DETAILED_RESULTS_FILE: &str = "detailed_results.csv";
pub const TOP_CONTROL_STORES_FILE: &str = "top_control_stores.csv";

const TEST_ENTITY_COLUMN: &str = "Test Entity";
const TWIN_ENTITY_COLUMN: &str = "Twin Entity";
const FINAL_RANKING_COLUMN: &str = "Final Ranking";

#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub detailed: PathBuf,
    pub top: PathBuf,
}

pub fn detailed_headers(metrics: &[String]) -> Vec<String> {
    let mut headers = vec![
        TEST_ENTITY_COLUMN.to_string(),
        TWIN_ENTITY_COLUMN.to_string(),
        FINAL_RANKING_COLUMN.to_string(),
    ];
    headers.extend(metrics.iter().map(|metric| format!("{metric} Ranking")));
    headers
}

/// Shortest round-trip float text (`1.0`, `22.071067811865476`); undefined
/// scores become an empty cell.
pub fn format_score(score: &MetricScore) -> String {
    match score.value() {
        Some(value) => format!("{value:?}"),
        None => String::new(),
    }
}

pub fn write_detailed<W: Write>(report: &MatchReport, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(detailed_headers(&report.metrics))?;
    for row in &report.detailed {
        let mut record = vec![
            row.test_entity.clone(),
            row.twin_entity.clone(),
            row.final_ranking.to_string(),
        ];
        record.extend(row.scores.iter().map(format_score));
        out.write_record(&record)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_top<W: Write>(report: &MatchReport, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([TEST_ENTITY_COLUMN, TWIN_ENTITY_COLUMN, FINAL_RANKING_COLUMN])?;
    for row in &report.top {
        out.write_record([
            row.test_entity.as_str(),
            row.twin_entity.as_str(),
            row.final_ranking.to_string().as_str(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

/// Writes both tables into `dir`, creating it if needed.
pub fn write_report(report: &MatchReport, dir: &Path) -> Result<ExportPaths> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let paths = ExportPaths {
        detailed: dir.join(DETAILED_RESULTS_FILE),
        top: dir.join(TOP_CONTROL_STORES_FILE),
    };

    let file = fs::File::create(&paths.top)
        .with_context(|| format!("failed to create {}", paths.top.display()))?;
    write_top(report, file).with_context(|| format!("failed to write {}", paths.top.display()))?;

    let file = fs::File::create(&paths.detailed)
        .with_context(|| format!("failed to create {}", paths.detailed.display()))?;
    write_detailed(report, file)
        .with_context(|| format!("failed to write {}", paths.detailed.display()))?;

    tracing::info!(
        top = %paths.top.display(),
        detailed = %paths.detailed.display(),
        "wrote match results"
    );
    Ok(paths)
}

/// Fixed-width text rendering of the top-N table for terminal output.
pub fn render_top_table(report: &MatchReport) -> String {
    let headers = [TEST_ENTITY_COLUMN, TWIN_ENTITY_COLUMN, FINAL_RANKING_COLUMN];
    let rows: Vec<[String; 3]> = report
        .top
        .iter()
        .map(|row| {
            [
                row.test_entity.clone(),
                row.twin_entity.clone(),
                row.final_ranking.to_string(),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: [&str; 3]| {
        let line = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{cell:<width$}", width = *width))
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    };
    push_line(headers);
    for row in &rows {
        push_line([row[0].as_str(), row[1].as_str(), row[2].as_str()]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::matching::ranking::{find_twin_matches, RankOptions};
    use crate::services::matching::types::{RankedRow, TopN, TopRow, WeightMap};
    use crate::test_support::sample_table;

    fn sample_report() -> MatchReport {
        let table = sample_table();
        let weights = WeightMap::uniform(table.metrics(), 5.0).unwrap();
        find_twin_matches(&table, &weights, TopN::new(2).unwrap(), RankOptions::default()).unwrap()
    }

    #[test]
    fn detailed_csv_has_metric_ranking_columns() {
        let mut buf = Vec::new();
        write_detailed(&sample_report(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Test Entity,Twin Entity,Final Ranking,Sales $ Ranking,Sales Qty Ranking")
        );
        assert_eq!(lines.next(), Some("T1,C1,1,1.0,1.0"));
        assert_eq!(lines.next(), Some("T1,C2,2,5.0,0.0"));
        let c3 = lines.next().unwrap();
        assert!(c3.starts_with("T1,C3,3,0.0,22.07"), "{c3}");
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn top_csv_has_identity_and_rank_only() {
        let mut buf = Vec::new();
        write_top(&sample_report(), &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Test Entity,Twin Entity,Final Ranking\nT1,C1,1\nT1,C2,2\n"
        );
    }

    #[test]
    fn undefined_scores_are_blank_cells() {
        let report = MatchReport {
            metrics: vec!["Sales".to_string(), "Qty".to_string()],
            detailed: vec![RankedRow {
                test_entity: "T".to_string(),
                twin_entity: "C".to_string(),
                final_ranking: 1,
                scores: vec![MetricScore::Value(0.5), MetricScore::Insufficient { matched: 1 }],
            }],
            top: vec![],
            warnings: vec![],
        };
        let mut buf = Vec::new();
        write_detailed(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().nth(1), Some("T,C,1,0.5,"));
    }

    #[test]
    fn empty_report_still_writes_headers() {
        let report = MatchReport {
            metrics: vec!["Sales".to_string()],
            ..MatchReport::default()
        };
        let mut buf = Vec::new();
        write_detailed(&report, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Test Entity,Twin Entity,Final Ranking,Sales Ranking\n"
        );
    }

    #[test]
    fn write_report_creates_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("results");
        let paths = write_report(&sample_report(), &out_dir).unwrap();
        assert_eq!(paths.top, out_dir.join(TOP_CONTROL_STORES_FILE));
        let top = std::fs::read_to_string(&paths.top).unwrap();
        assert!(top.starts_with("Test Entity,Twin Entity,Final Ranking\n"));
        let detailed = std::fs::read_to_string(&paths.detailed).unwrap();
        assert_eq!(detailed.lines().count(), 4);
    }

    #[test]
    fn text_table_aligns_columns() {
        let report = MatchReport {
            top: vec![TopRow {
                test_entity: "Store 1001".to_string(),
                twin_entity: "C".to_string(),
                final_ranking: 1,
            }],
            ..MatchReport::default()
        };
        assert_eq!(
            render_top_table(&report),
            "Test Entity  Twin Entity  Final Ranking\nStore 1001   C            1\n"
        );
    }
}
