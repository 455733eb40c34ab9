use std::io;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hmdb_associations::app::{App, TracingProgress};
use hmdb_associations::config::{Config, ConfigLoader, ResolvedConfig};
use hmdb_associations::domain::MalformedPolicy;
use hmdb_associations::error::HmdbError;
use hmdb_associations::output::{AtomicFileSink, JsonLinesSink, JsonOutput};

#[derive(Parser)]
#[command(name = "hmdb-assoc")]
#[command(about = "Extract protein-metabolite association documents from HMDB XML exports")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Write association documents as JSON lines")]
    Extract(ExtractArgs),
    #[command(about = "Build the metabolite index and print a summary")]
    Index(SourceArgs),
}

#[derive(Args, Clone)]
struct SourceArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    data_folder: Option<String>,

    #[arg(long)]
    proteins: Option<String>,

    #[arg(long)]
    metabolites: Option<String>,
}

#[derive(Args, Clone)]
struct ExtractArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[arg(long)]
    output: Option<String>,

    #[arg(long, conflicts_with = "output")]
    stdout: bool,

    #[arg(long)]
    limit: Option<usize>,

    #[arg(long, value_enum)]
    on_malformed: Option<MalformedPolicy>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<HmdbError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HmdbError) -> u8 {
    match error {
        HmdbError::MissingConfig | HmdbError::ConfigRead(_) | HmdbError::MissingInput(_) => 2,
        HmdbError::Xml(_)
        | HmdbError::MissingElement { .. }
        | HmdbError::EmptyElement { .. }
        | HmdbError::Archive(_) => 3,
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
    match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Index(args) => run_index(args),
    }
}

fn resolve(source: &SourceArgs, overrides: Config) -> Result<ResolvedConfig, HmdbError> {
    let file = ConfigLoader::load_or_default(source.config.as_deref())?;
    let overrides = Config {
        data_folder: source.data_folder.clone(),
        protein_file: source.proteins.clone(),
        metabolite_file: source.metabolites.clone(),
        ..overrides
    };
    ConfigLoader::resolve_config(file.merge(overrides))
}

fn run_extract(args: ExtractArgs) -> miette::Result<()> {
    let overrides = Config {
        output: args.output.clone(),
        on_malformed: args.on_malformed,
        limit: args.limit,
        ..Config::default()
    };
    let mut config = resolve(&args.source, overrides)?;
    if args.stdout {
        config.output = None;
    }

    let app = App::new(config);
    match app.config().output.clone() {
        Some(path) => {
            let mut sink = AtomicFileSink::create(&path)?;
            let summary = app.run(&mut sink, &TracingProgress)?;
            JsonOutput::print_run(&summary).into_diagnostic()?;
        }
        None => {
            let mut sink = JsonLinesSink::new(io::BufWriter::new(io::stdout().lock()));
            let summary = app.run(&mut sink, &TracingProgress)?;
            info!(
                documents = summary.documents,
                proteins = summary.proteins,
                "documents written to stdout"
            );
        }
    }
    Ok(())
}

fn run_index(args: SourceArgs) -> miette::Result<()> {
    let config = resolve(&args, Config::default())?;
    let app = App::new(config);
    let summary = app.index(&TracingProgress)?;
    JsonOutput::print_index(&summary).into_diagnostic()?;
    Ok(())
}
