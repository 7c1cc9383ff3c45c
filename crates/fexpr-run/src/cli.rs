use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fexpr_lang::Record;
use fexpr_resolve::{Cache, Config, Evaluator, MemorySource, Mode, NewlineMode, PendingPolicy};
use miette::{IntoDiagnostic, miette};
use serde::Serialize;

use crate::data;

#[derive(Parser, Debug, Default)]
#[command(name = "fexpr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "# Examples:\n\n\
    ## Evaluate an expression against a record:\n\
    fexpr --record record.json '{quantity} * {price}'\n\n\
    ## Look up features of another dataset:\n\
    fexpr --data datasets.json --record record.json \"getFeature('parcels', 'id', {parcel_id}).area\"\n\n\
    ## Evaluate named expressions together:\n\
    fexpr --data datasets.json --record record.json -b 'x=1+1' -b \"area=getFeature('parcels', 'id', {parcel_id}).area\"")]
#[command(
    about = "Evaluates attribute expressions against a record, fetching referenced features from JSON datasets.",
    long_about = None
)]
pub struct Cli {
    /// JSON file mapping dataset names to arrays of records
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// JSON file holding the record expressions are evaluated against
    #[arg(short, long)]
    record: Option<PathBuf>,

    /// Evaluate in filter mode: comparisons against fields become filters
    #[arg(long, default_value_t = false)]
    filter: bool,

    /// Delay before each dataset answers, in milliseconds
    #[arg(long)]
    latency_ms: Option<u64>,

    /// Coordinate reference system sent with feature requests
    #[arg(long)]
    crs: Option<String>,

    /// Maximum number of records requested per lookup
    #[arg(long)]
    page_size: Option<usize>,

    /// What a lookup of an in-flight key returns: attach or detach
    #[arg(long)]
    pending_policy: Option<PendingPolicy>,

    /// Newline normalization before parsing: first-only or all
    #[arg(long)]
    newlines: Option<NewlineMode>,

    /// Maximum number of evaluation rounds
    #[arg(long)]
    max_rounds: Option<usize>,

    /// Named expression evaluated as part of one batch, as NAME=EXPR
    #[arg(short, long, value_parser = parse_named)]
    batch: Vec<(String, String)>,

    #[arg(value_name = "EXPR")]
    exprs: Vec<String>,
}

#[derive(Serialize)]
struct ExprOutput<'a> {
    expression: &'a str,
    value: serde_json::Value,
    rounds: usize,
    settled: bool,
}

#[derive(Serialize)]
struct BatchOutput {
    values: serde_json::Map<String, serde_json::Value>,
    rounds: usize,
    settled: bool,
}

fn parse_named(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, expr)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), expr.to_string()))
        }
        _ => Err(format!("expected NAME=EXPR, got '{}'", s)),
    }
}

impl Cli {
    pub async fn run(&self) -> miette::Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.run_with(&mut out).await
    }

    pub async fn run_with<W: Write>(&self, out: &mut W) -> miette::Result<()> {
        if self.exprs.is_empty() && self.batch.is_empty() {
            return Err(miette!("No expression given. Pass EXPR arguments or --batch NAME=EXPR"));
        }

        let config = self.config(Config::from_env());
        let evaluator = Evaluator::new(Cache::new(), Arc::new(self.source()?)).with_config(config);
        let record = self.record()?;
        let mode = if self.filter { Mode::Filter } else { Mode::Value };

        tracing::debug!(config = ?evaluator.config(), "Evaluating");

        for expr in &self.exprs {
            let outcome = evaluator.evaluate_settled(expr, &record, mode).await;
            report(&outcome.diagnostics);

            let output = ExprOutput {
                expression: expr,
                value: (&outcome.value).into(),
                rounds: outcome.rounds,
                settled: outcome.settled,
            };
            writeln!(out, "{}", serde_json::to_string(&output).into_diagnostic()?).into_diagnostic()?;
        }

        if !self.batch.is_empty() {
            let outcome = evaluator
                .evaluate_all(self.batch.iter().cloned(), &record, mode)
                .await;
            report(&outcome.diagnostics);

            let output = BatchOutput {
                values: outcome
                    .values
                    .iter()
                    .map(|(name, value)| (name.clone(), value.into()))
                    .collect(),
                rounds: outcome.rounds,
                settled: outcome.settled,
            };
            writeln!(out, "{}", serde_json::to_string(&output).into_diagnostic()?).into_diagnostic()?;
        }

        Ok(())
    }

    /// Layers command line flags over `config`.
    fn config(&self, mut config: Config) -> Config {
        if let Some(crs) = &self.crs {
            config.crs = crs.clone();
        }
        if let Some(page_size) = self.page_size {
            config.page_size = Some(page_size);
        }
        if let Some(pending_policy) = self.pending_policy {
            config.pending_policy = pending_policy;
        }
        if let Some(newlines) = self.newlines {
            config.newline_mode = newlines;
        }
        if let Some(max_rounds) = self.max_rounds {
            config.max_rounds = max_rounds.max(1);
        }
        config
    }

    fn source(&self) -> miette::Result<MemorySource> {
        let source = match &self.data {
            Some(path) => data::parse_datasets(&data::read(path)?)?,
            None => MemorySource::new(),
        };

        Ok(match self.latency_ms {
            Some(ms) => source.with_latency(Duration::from_millis(ms)),
            None => source,
        })
    }

    fn record(&self) -> miette::Result<Record> {
        match &self.record {
            Some(path) => Ok(data::parse_record(&data::read(path)?)?),
            None => Ok(Record::new()),
        }
    }
}

fn report(diagnostics: &[fexpr_resolve::Error]) {
    for diagnostic in diagnostics {
        eprintln!("{:?}", miette::Report::new(diagnostic.clone()));
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rstest::{fixture, rstest};
    use tempfile::NamedTempFile;

    use super::*;

    fn create_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file
    }

    #[fixture]
    fn data_file() -> NamedTempFile {
        create_file(
            r#"{
  "parcels": [{"id": "42", "area": 150, "zone": "R1"}, {"id": "43", "area": 80}],
  "owners": [{"id": 7, "name": "Ada"}]
}"#,
        )
    }

    #[fixture]
    fn record_file() -> NamedTempFile {
        create_file(r#"{"quantity": 3, "price": 2, "parcel_id": "42"}"#)
    }

    async fn run(cli: Cli) -> miette::Result<Vec<serde_json::Value>> {
        let mut out = Vec::new();
        cli.run_with(&mut out).await?;
        Ok(String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect())
    }

    #[rstest]
    #[case::arithmetic("{quantity} * {price}", serde_json::json!(6), 1)]
    #[case::lookup("getFeature('parcels', 'id', {parcel_id}).area", serde_json::json!(150), 2)]
    #[case::syntax_error("{a +", serde_json::Value::Null, 1)]
    #[tokio::test]
    async fn test_run_expression(
        data_file: NamedTempFile,
        record_file: NamedTempFile,
        #[case] expr: &str,
        #[case] expected: serde_json::Value,
        #[case] rounds: usize,
    ) {
        let cli = Cli {
            data: Some(data_file.path().to_path_buf()),
            record: Some(record_file.path().to_path_buf()),
            latency_ms: Some(1),
            exprs: vec![expr.to_string()],
            ..Cli::default()
        };

        let output = run(cli).await.unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output[0]["expression"], serde_json::json!(expr));
        assert_eq!(output[0]["value"], expected);
        assert_eq!(output[0]["rounds"], serde_json::json!(rounds));
        assert_eq!(output[0]["settled"], serde_json::json!(true));
    }

    #[rstest]
    #[tokio::test]
    async fn test_run_filter_mode(record_file: NamedTempFile) {
        let cli = Cli {
            record: Some(record_file.path().to_path_buf()),
            filter: true,
            exprs: vec!["{id} = {parcel_id} and {area} >= 100".to_string()],
            ..Cli::default()
        };

        let output = run(cli).await.unwrap();
        assert_eq!(
            output[0]["value"],
            serde_json::json!([{"and": [["id", "=", "42"], ["area", ">=", 100]]}])
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_run_batch(data_file: NamedTempFile, record_file: NamedTempFile) {
        let cli = Cli {
            data: Some(data_file.path().to_path_buf()),
            record: Some(record_file.path().to_path_buf()),
            batch: vec![
                ("x".to_string(), "1 + 1".to_string()),
                (
                    "owner".to_string(),
                    "getFeature('owners', 'id', 7).name".to_string(),
                ),
            ],
            ..Cli::default()
        };

        let output = run(cli).await.unwrap();
        assert_eq!(
            output[0],
            serde_json::json!({"values": {"owner": "Ada", "x": 2}, "rounds": 2, "settled": true})
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_run_without_expression() {
        assert!(run(Cli::default()).await.is_err());
    }

    #[rstest]
    #[tokio::test]
    async fn test_run_missing_data_file() {
        let cli = Cli {
            data: Some(PathBuf::from("/nonexistent/datasets.json")),
            exprs: vec!["1".to_string()],
            ..Cli::default()
        };
        assert!(run(cli).await.is_err());
    }

    #[rstest]
    #[case::simple("x=1+1", Ok(("x".to_string(), "1+1".to_string())))]
    #[case::comparison("open={status} = 'open'", Ok(("open".to_string(), "{status} = 'open'".to_string())))]
    #[case::no_name("=1", Err("expected NAME=EXPR, got '=1'".to_string()))]
    #[case::no_separator("x", Err("expected NAME=EXPR, got 'x'".to_string()))]
    fn test_parse_named(#[case] s: &str, #[case] expected: Result<(String, String), String>) {
        assert_eq!(parse_named(s), expected);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli {
            crs: Some("EPSG:3857".to_string()),
            page_size: Some(10),
            pending_policy: Some(PendingPolicy::Detach),
            newlines: Some(NewlineMode::All),
            max_rounds: Some(0),
            ..Cli::default()
        };

        assert_eq!(
            cli.config(Config::default()),
            Config {
                crs: "EPSG:3857".to_string(),
                page_size: Some(10),
                pending_policy: PendingPolicy::Detach,
                newline_mode: NewlineMode::All,
                max_rounds: 1,
            }
        );
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "fexpr",
            "--filter",
            "--pending-policy",
            "detach",
            "--newlines",
            "all",
            "-b",
            "x=1",
            "{a} = 1",
        ])
        .unwrap();

        assert!(cli.filter);
        assert_eq!(cli.pending_policy, Some(PendingPolicy::Detach));
        assert_eq!(cli.newlines, Some(NewlineMode::All));
        assert_eq!(cli.batch, vec![("x".to_string(), "1".to_string())]);
        assert_eq!(cli.exprs, vec!["{a} = 1".to_string()]);
    }
}
