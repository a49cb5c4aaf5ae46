use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "twin-match",
    version,
    about = "Rank control entities as twins for each test entity"
)]
pub struct Args {
    /// Observation CSV with Entity, Type, Date, Filter and one column per metric.
    #[arg(long)]
    pub input: PathBuf,

    /// JSON object mapping every metric column to a weight in [0, 10].
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// Single metric weight as METRIC=WEIGHT (repeatable; overrides --weights entries).
    #[arg(long = "weight", value_parser = parse_weight_arg)]
    pub weight: Vec<(String, f64)>,

    /// Weight applied to every metric when no explicit weights are given.
    #[arg(long)]
    pub default_weight: Option<f64>,

    /// Number of control entities to keep per test entity (1-10).
    #[arg(long)]
    pub top_n: Option<i64>,

    /// Directory for top_control_stores.csv and detailed_results.csv.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Rank test entities in parallel.
    #[arg(long, default_value_t = false)]
    pub parallel: bool,

    /// Print the full report as JSON instead of the top-N table.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Input rows to log as a preview.
    #[arg(long)]
    pub preview_rows: Option<usize>,

    /// Run config file (JSON).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_weight_arg(raw: &str) -> Result<(String, f64), String> {
    let (metric, weight) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected METRIC=WEIGHT, got {raw:?}"))?;
    let metric = metric.trim();
    if metric.is_empty() {
        return Err(format!("missing metric name in {raw:?}"));
    }
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid weight in {raw:?}: {err}"))?;
    Ok((metric.to_string(), weight))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_args_split_on_last_equals() {
        assert_eq!(
            parse_weight_arg("Sales $=7").unwrap(),
            ("Sales $".to_string(), 7.0)
        );
        assert_eq!(
            parse_weight_arg("a=b=2.5").unwrap(),
            ("a=b".to_string(), 2.5)
        );
        assert!(parse_weight_arg("Sales").is_err());
        assert!(parse_weight_arg("=3").is_err());
        assert!(parse_weight_arg("Sales=high").is_err());
    }

    #[test]
    fn args_parse_repeated_weights() {
        let args = Args::try_parse_from([
            "twin-match",
            "--input",
            "stores.csv",
            "--weight",
            "Sales=8",
            "--weight",
            "Qty=2",
            "--top-n",
            "4",
            "--parallel",
        ])
        .unwrap();
        assert_eq!(args.input, PathBuf::from("stores.csv"));
        assert_eq!(
            args.weight,
            vec![("Sales".to_string(), 8.0), ("Qty".to_string(), 2.0)]
        );
        assert_eq!(args.top_n, Some(4));
        assert!(args.parallel);
        assert!(!args.json);
    }
}
