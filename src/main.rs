use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use twin_match::cli::Args;
use twin_match::config::MatchConfig;
use twin_match::error::ValidationError;
use twin_match::services::matching::{export, find_twin_matches, ingest, RankOptions};

fn run(args: Args) -> Result<()> {
    let config = MatchConfig::load(&args)?;
    let top_n = config.top_n()?;

    let table = ingest::read_observations_from_path(&args.input)?;
    ingest::log_preview(&table, config.preview_rows);

    let weights = config.weight_map(table.metrics())?;
    let report = find_twin_matches(
        &table,
        &weights,
        top_n,
        RankOptions {
            parallel: config.parallel,
        },
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", export::render_top_table(&report));
    }

    export::write_report(&report, &config.output_dir)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(report_failure(&err)),
    }
}

/// Prints the failure and returns the process exit code: 2 when the input
/// was rejected, 1 for anything else.
fn report_failure(err: &anyhow::Error) -> u8 {
    if let Some(validation) = err.downcast_ref::<ValidationError>() {
        tracing::error!(kind = validation.kind(), "input rejected");
        eprintln!("error: {validation}");
        return 2;
    }
    eprintln!("error: {err:#}");
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn args_for(input: &Path, output_dir: &Path) -> Args {
        Args::try_parse_from([
            "twin-match",
            "--input",
            input.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn invalid_type_is_rejected_with_exit_code_two() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("stores.csv");
        let mut file = std::fs::File::create(&input).unwrap();
        write!(
            file,
            "Entity,Type,Date,Filter,Sales\n\
             S1,Test,01/01/2024,A,1\n\
             S2,Control,01/01/2024,A,2\n"
        )
        .unwrap();

        let err = run(args_for(&input, &dir.path().join("out"))).unwrap_err();
        let validation = err.downcast_ref::<ValidationError>().unwrap();
        assert!(matches!(validation, ValidationError::InvalidType { .. }));
        assert!(validation
            .to_string()
            .starts_with("Type column should only contain 'Test' or 'Not Test' values"));
        assert_eq!(report_failure(&err), 2);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn missing_input_fails_with_exit_code_one() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(args_for(&dir.path().join("absent.csv"), dir.path())).unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_none());
        assert_eq!(report_failure(&err), 1);
    }

    #[test]
    fn valid_input_writes_both_result_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("stores.csv");
        std::fs::write(&input, STORES_CSV).unwrap();
        let out = dir.path().join("out");

        run(args_for(&input, &out)).unwrap();
        let top = std::fs::read_to_string(out.join(export::TOP_CONTROL_STORES_FILE)).unwrap();
        assert_eq!(top.lines().next(), Some("Test Entity,Twin Entity,Final Ranking"));
        assert_eq!(top.lines().nth(1), Some("T1,C1,1"));
        assert!(out.join(export::DETAILED_RESULTS_FILE).exists());
    }

    const STORES_CSV: &str = "Entity,Type,Date,Filter,Sales\n\
         T1,Test,01/01/2024,A,10\n\
         T1,Test,01/02/2024,A,12\n\
         C1,Not Test,01/01/2024,A,11\n\
         C1,Not Test,01/02/2024,A,13\n\
         C2,Not Test,01/01/2024,A,30\n\
         C2,Not Test,01/02/2024,A,50\n";
}
