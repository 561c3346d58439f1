use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use smard_datapipe::config::ConfigLoader;
use smard_datapipe::domain::DownloadTarget;
use smard_datapipe::download::{CategoryFetcher, DownloadJob, FetchParams};
use smard_datapipe::error::DatapipeError;
use smard_datapipe::exec::PythonKernel;
use smard_datapipe::output::{JsonOutput, OutputMode, print_run_summary};
use smard_datapipe::pipeline::{Pipeline, PipelineRun};
use smard_datapipe::report::ReportConverter;
use smard_datapipe::smard::SmardHttpClient;
use smard_datapipe::store::Store;

#[derive(Parser)]
#[command(name = "smard-dp")]
#[command(about = "SMARD energy-market data pipeline: categorized downloads and HTML reports")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable run results instead of the human summary.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download raw data for one category, or all of them")]
    Download(DownloadArgs),
    #[command(about = "Run downloads and declared reports in dependency order")]
    Pipeline(PipelineArgs),
    #[command(about = "Convert one analysis script to an HTML report")]
    Report(ReportArgs),
}

#[derive(Args)]
struct DownloadArgs {
    target: DownloadTarget,

    #[arg(long, help = "Re-fetch even if output already exists")]
    force: bool,

    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct PipelineArgs {
    #[arg(long, help = "Re-fetch downloads even if outputs already exist")]
    force: bool,

    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct ReportArgs {
    script: String,
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<DatapipeError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &DatapipeError) -> u8 {
    match error {
        DatapipeError::ConfigRead(_) | DatapipeError::ConfigParse(_) => 2,
        DatapipeError::SmardHttp(_) | DatapipeError::SmardStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<bool> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let store = Store::new().into_diagnostic()?;

    match cli.command {
        Commands::Download(args) => run_download(args, store, output_mode),
        Commands::Pipeline(args) => run_pipeline(args, store, output_mode),
        Commands::Report(args) => run_report(args, store, output_mode),
    }
}

fn build_fetcher(
    store: Store,
    config: Option<&str>,
) -> miette::Result<(CategoryFetcher<SmardHttpClient>, smard_datapipe::config::ResolvedConfig)> {
    let resolved = ConfigLoader::resolve(config).into_diagnostic()?;
    let client = SmardHttpClient::new().into_diagnostic()?;
    let params = FetchParams {
        region: resolved.region,
        resolution: resolved.resolution,
        start: resolved.start,
    };
    Ok((CategoryFetcher::new(store, client, params), resolved))
}

fn run_download(args: DownloadArgs, store: Store, output_mode: OutputMode) -> miette::Result<bool> {
    let (fetcher, _) = build_fetcher(store, args.config.as_deref())?;
    let job = DownloadJob::new(&fetcher);

    let mut run = PipelineRun::new(args.force);
    for category in args.target.expand() {
        run.push(job.run(category, args.force));
    }
    report_run(&run, output_mode)
}

fn run_pipeline(args: PipelineArgs, store: Store, output_mode: OutputMode) -> miette::Result<bool> {
    let (fetcher, resolved) = build_fetcher(store.clone(), args.config.as_deref())?;
    let kernel = PythonKernel::new();
    let converter = ReportConverter::new(store, kernel);
    let pipeline = Pipeline::new(&fetcher, &converter, &resolved.reports);

    let run = pipeline.run(args.force);
    report_run(&run, output_mode)
}

fn run_report(args: ReportArgs, store: Store, output_mode: OutputMode) -> miette::Result<bool> {
    let converter = ReportConverter::new(store, PythonKernel::new());

    let mut run = PipelineRun::new(false);
    run.push(converter.run(camino::Utf8Path::new(&args.script)));
    report_run(&run, output_mode)
}

fn report_run(run: &PipelineRun, output_mode: OutputMode) -> miette::Result<bool> {
    match output_mode {
        OutputMode::Json => JsonOutput::print_run(run).into_diagnostic()?,
        OutputMode::Human => print_run_summary(run),
    }
    Ok(run.is_success())
}
