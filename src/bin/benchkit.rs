#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use benchkit::config::{build_backend, BackendConfig, BackendKind};
use benchkit::dataset::{load_questions, DatasetKind};
use benchkit::gateway::{MeteredBackend, TracingUsageSink};
use benchkit::records::{
    default_output_path, read_records, JsonlRecordWriter, OutputLine, RecordSink, SummaryLine,
};
use benchkit::runner::{run_questions, FailurePolicy, RunConfig};
use benchkit::scoring::{annotate_rows, summarize, Metric};
use benchkit::strategy::{Strategy, StrategyConfig, TreeFinal};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "benchkit", version, about = "Benchmark LLM reasoning strategies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a dataset with one strategy and score the results
    Run {
        /// gsm8k, arc, mmlu or jsonl
        #[arg(long)]
        dataset: String,
        /// Local JSONL export of the dataset
        #[arg(long)]
        data: PathBuf,
        /// openai, ollama or hf
        #[arg(long)]
        backend: String,
        /// Backend config file (.toml, .yaml/.yml or .json)
        #[arg(long)]
        backend_config: PathBuf,
        /// cot, sc or tot
        #[arg(long, default_value = "cot")]
        strategy: String,
        /// Self-consistency samples
        #[arg(long, default_value_t = 5)]
        k: usize,
        /// Tree search frontier size
        #[arg(long, default_value_t = 3)]
        breadth: usize,
        /// Tree search levels
        #[arg(long, default_value_t = 2)]
        depth: usize,
        /// How tree search produces its answer: rerun or leaf
        #[arg(long, default_value = "rerun")]
        tot_final: String,
        #[arg(long, default_value_t = 50)]
        max_samples: usize,
        /// accuracy, em, f1 or mc (defaults per dataset)
        #[arg(long)]
        metric: Option<String>,
        /// Results file (defaults under results/)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Questions in flight at once
        #[arg(long, default_value_t = 1)]
        parallel: usize,
        /// Stop at the first failed question instead of skipping it
        #[arg(long)]
        fail_fast: bool,
        /// Write per-record metric verdicts
        #[arg(long)]
        annotate: bool,
        #[arg(long, short)]
        verbose: bool,
    },
    /// Recompute the metric for a saved results file
    Score {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        metric: String,
        /// Also write annotated records here
        #[arg(long)]
        annotate_out: Option<PathBuf>,
    },
    /// List available backends
    Backends,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    init_logging(verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "benchkit=debug"
    } else {
        "benchkit=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> CliResult<bool> {
    match cli.command {
        Commands::Run {
            dataset,
            data,
            backend,
            backend_config,
            strategy,
            k,
            breadth,
            depth,
            tot_final,
            max_samples,
            metric,
            out,
            parallel,
            fail_fast,
            annotate,
            verbose: _,
        } => {
            // Every name and parameter is checked before the first backend call.
            let dataset: DatasetKind = dataset.parse()?;
            let backend_kind: BackendKind = backend.parse()?;
            let strategy: Strategy = strategy.parse()?;
            let tot_final: TreeFinal = tot_final.parse()?;
            let metric = match metric {
                Some(name) => name.parse::<Metric>()?,
                None => dataset.default_metric(),
            };
            let strategy_config = StrategyConfig::new(strategy, k, breadth, depth, tot_final)?;
            let run_config = RunConfig::new(strategy_config, metric)
                .failure_policy(if fail_fast {
                    FailurePolicy::Abort
                } else {
                    FailurePolicy::Skip
                })
                .parallel(parallel)
                .annotate(annotate);
            run_config.validate()?;

            let config = BackendConfig::load(backend_kind, &backend_config)?
                .with_api_key_fallback(std::env::var("OPENAI_API_KEY").ok());
            let backend = MeteredBackend::new(
                build_backend(&config)?,
                Arc::new(TracingUsageSink),
                "benchkit-run",
            );

            let questions = load_questions(dataset, &data, Some(max_samples))?;
            let out = out.unwrap_or_else(|| {
                default_output_path(dataset.as_str(), backend_kind.as_str(), strategy.as_str())
            });
            info!(
                dataset = %dataset,
                backend = %backend_kind,
                model = %config.params().model,
                questions = questions.len(),
                out = %out.display(),
                "loaded dataset"
            );

            let (writer, worker) = JsonlRecordWriter::create(&out)?;
            let sink: &dyn RecordSink = &writer;
            let result = run_questions(&backend, &questions, &run_config, Some(sink)).await;
            drop(writer);
            let written = worker.join()?;
            let report = result?;

            info!(lines = written, out = %out.display(), "results written");
            println!("[metrics] {}", serde_json::to_string(&report.summary)?);
            if !report.failures.is_empty() {
                eprintln!(
                    "{} of {} questions failed",
                    report.failures.len(),
                    questions.len()
                );
            }
            Ok(report.exit_ok())
        }

        Commands::Score {
            input,
            metric,
            annotate_out,
        } => {
            let metric: Metric = metric.parse()?;
            let records = read_records(&input)?;
            let summary = summarize(&records, metric);

            if let Some(path) = annotate_out {
                let (writer, worker) = JsonlRecordWriter::create(&path)?;
                for row in annotate_rows(&records, metric) {
                    writer.record(OutputLine::Annotated(row))?;
                }
                writer.record(OutputLine::Summary(SummaryLine::new(summary.clone(), None)))?;
                drop(writer);
                worker.join()?;
                eprintln!("annotated records written to {}", path.display());
            }

            println!("{}", serde_json::to_string(&summary)?);
            Ok(true)
        }

        Commands::Backends => {
            for kind in BackendKind::all() {
                println!("{}\t{}", kind.as_str(), kind.description());
            }
            Ok(true)
        }
    }
}
