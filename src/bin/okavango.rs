use std::path::Path;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use okavango::config::{ConfigLoader, ResolvedConfig};
use okavango::domain::{MERGE_TARGETS, MergeTarget};
use okavango::error::OkavangoError;
use okavango::fetch::{FetchAction, FetchResult, Fetcher, HttpFetcher, Retriever};
use okavango::merge::MergeSummary;
use okavango::output::{JsonOutput, OutputMode, RunReport, write_geojson};
use okavango::pipeline::{Pipeline, ProgressEvent, ProgressSink};

#[derive(Parser)]
#[command(name = "okavango")]
#[command(about = "Download environmental indicator datasets and join them onto a world map")]
#[command(version, author)]
struct Cli {
    /// JSON config file (defaults to okavango.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Download directory, overrides the config file
    #[arg(long, global = true)]
    dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Ensure every dataset is present in the download directory")]
    Fetch(FetchArgs),
    #[command(about = "Join already-downloaded datasets onto the world map")]
    Merge(MergeArgs),
    #[command(about = "Fetch, then merge")]
    Run(FetchArgs),
    #[command(about = "Merge and write one GeoJSON file per dataset")]
    Export(ExportArgs),
    #[command(about = "Load the raw indicator CSVs and report their shape")]
    Raw(JsonArgs),
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long)]
    force: bool,

    /// Print JSON; `run` prints one object with `fetch` and `merge` keys
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct MergeArgs {
    /// Only merge these dataset keys
    #[arg(long)]
    only: Vec<String>,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long)]
    out: Utf8PathBuf,

    #[arg(long)]
    only: Vec<String>,
}

#[derive(Args)]
struct JsonArgs {
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<OkavangoError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &OkavangoError) -> u8 {
    match error {
        OkavangoError::MissingFile(_)
        | OkavangoError::ConfigRead(_)
        | OkavangoError::ConfigParse(_)
        | OkavangoError::UnknownDataset(_) => 2,
        OkavangoError::Retrieval { .. }
        | OkavangoError::Http(_)
        | OkavangoError::HttpStatus { .. } => 3,
        other if other.is_data_error() => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(dir) = cli.dir {
        config.download_dir = dir;
    }

    match cli.command {
        Commands::Fetch(args) => {
            let pipeline = http_pipeline(&config)?;
            let mode = output_mode(args.json);
            let result = pipeline.fetch_all(args.force, sink_for(mode))?;
            print_fetch(&result, mode)
        }
        Commands::Run(args) => {
            let pipeline = http_pipeline(&config)?;
            let mode = output_mode(args.json);
            let (fetched, merged) = pipeline.run(args.force, sink_for(mode))?;
            match mode {
                OutputMode::Json => JsonOutput::print_run(&RunReport {
                    fetch: &fetched,
                    merge: merged.summaries(),
                })
                .into_diagnostic(),
                OutputMode::Human => {
                    print_fetch(&fetched, mode)?;
                    print_merge(&merged.summaries(), mode)
                }
            }
        }
        Commands::Merge(args) => {
            let pipeline = offline_pipeline(&config).with_targets(select_targets(&args.only)?);
            let merged = pipeline.process_and_merge()?;
            print_merge(&merged.summaries(), output_mode(args.json))
        }
        Commands::Export(args) => {
            let pipeline = offline_pipeline(&config).with_targets(select_targets(&args.only)?);
            let merged = pipeline.process_and_merge()?;
            for map in merged.iter() {
                let path = write_geojson(map, &args.out)?;
                println!("{} -> {path}", map.label);
            }
            Ok(())
        }
        Commands::Raw(args) => {
            let pipeline = offline_pipeline(&config);
            let datasets = pipeline.raw_dataset_info()?;
            match output_mode(args.json) {
                OutputMode::Json => JsonOutput::print_raw(&datasets).into_diagnostic(),
                OutputMode::Human => {
                    for dataset in &datasets {
                        println!(
                            "  {}: {} rows, {} columns",
                            dataset.key, dataset.rows, dataset.columns
                        );
                    }
                    Ok(())
                }
            }
        }
    }
}

fn output_mode(json: bool) -> OutputMode {
    if json {
        OutputMode::Json
    } else {
        OutputMode::Human
    }
}

fn sink_for(mode: OutputMode) -> &'static dyn ProgressSink {
    match mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Human => &ConsoleSink,
    }
}

fn http_pipeline(config: &ResolvedConfig) -> miette::Result<Pipeline<HttpFetcher>> {
    let fetcher = HttpFetcher::new(config.timeout)?;
    Ok(Pipeline::new(
        config.download_dir.clone(),
        Retriever::new(fetcher, config.retry),
    ))
}

fn offline_pipeline(config: &ResolvedConfig) -> Pipeline<NopFetcher> {
    Pipeline::new(
        config.download_dir.clone(),
        Retriever::new(NopFetcher, config.retry),
    )
}

fn select_targets(keys: &[String]) -> Result<Vec<MergeTarget>, OkavangoError> {
    if keys.is_empty() {
        return Ok(MERGE_TARGETS.to_vec());
    }
    keys.iter()
        .map(|key| MergeTarget::by_key(key).copied())
        .collect()
}

fn print_fetch(result: &FetchResult, mode: OutputMode) -> miette::Result<()> {
    match mode {
        OutputMode::Json => JsonOutput::print_fetch(result).into_diagnostic(),
        OutputMode::Human => {
            let green = "\x1b[32m";
            let cyan = "\x1b[36m";
            let reset = "\x1b[0m";

            println!("{cyan}Datasets ready: {}{reset}", result.items.len());
            for item in &result.items {
                let (label, color) = match item.action {
                    FetchAction::Existing => ("existing", green),
                    FetchAction::Download => ("downloaded", cyan),
                };
                println!("{color} - {} ({label}){reset}", item.path);
            }
            Ok(())
        }
    }
}

fn print_merge(summaries: &[MergeSummary], mode: OutputMode) -> miette::Result<()> {
    match mode {
        OutputMode::Json => JsonOutput::print_merge(summaries).into_diagnostic(),
        OutputMode::Human => {
            println!("Merged datasets:");
            for summary in summaries {
                println!(
                    "- {}: rows={}, merged_values={} (from column {:?})",
                    summary.label, summary.rows, summary.matched, summary.value_column
                );
            }
            Ok(())
        }
    }
}

struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({} ms)", event.message, elapsed.as_millis()),
            None => eprintln!("{}", event.message),
        }
    }
}

/// Stands in where a command never downloads.
struct NopFetcher;

impl Fetcher for NopFetcher {
    fn fetch(&self, url: &str, _destination: &Path) -> Result<(), OkavangoError> {
        Err(OkavangoError::Http(format!("offline command cannot fetch {url}")))
    }
}
