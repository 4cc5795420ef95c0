use std::fs::{self, File, OpenOptions};
use std::process::ExitCode;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use flowcell_delivery::app::{self, App, DeliveryRequest};
use flowcell_delivery::config::ConfigLoader;
use flowcell_delivery::deliver::DeliveryOptions;
use flowcell_delivery::domain::{LaneSelection, ProjectScope};
use flowcell_delivery::error::DeliveryError;
use flowcell_delivery::fastq::GlobFastqLocator;
use flowcell_delivery::lims::LimsHttpClient;
use flowcell_delivery::output::ConsoleOutput;
use flowcell_delivery::run_info::RunInfoSource;

const LOG_FILE: &str = "fc-deliver.log";

/// Given a directory with demultiplexed flowcell data and a project
/// description or lane list, copy the project's files into a project
/// directory. The pruned run information is written next to them as
/// project_run_info.yaml.
#[derive(Parser)]
#[command(name = "fc-deliver")]
#[command(about = "Deliver flowcell output into a project directory")]
#[command(version, author)]
struct Cli {
    /// YAML post-processing configuration
    config_file: Utf8PathBuf,

    /// Flowcell directory with demultiplexed output
    fc_dir: Utf8PathBuf,

    /// Project directory to deliver into
    project_dir: Utf8PathBuf,

    /// YAML run information, used instead of querying the LIMS
    run_info_yaml: Option<Utf8PathBuf>,

    /// Install flowcells in <project_dir>/<data_prefix>
    #[arg(short = 'd', long = "data_prefix")]
    data_prefix: Option<String>,

    /// Output directory name used instead of <date>_<flowcell>
    #[arg(short = 'a', long = "flowcell_alias")]
    flowcell_alias: Option<String>,

    /// Project description in the description field of the run information, or ALL
    #[arg(short = 'y', long = "project_desc")]
    project_desc: Option<String>,

    /// Comma-separated list of lane numbers, or ALL
    #[arg(short = 'l', long = "lanes")]
    lanes: Option<LaneSelection>,

    /// Move data instead of copying
    #[arg(short = 'm', long = "move_data")]
    move_data: bool,

    /// Only install the pruned run information file
    #[arg(short = 'i', long = "only_install_run_info")]
    only_install_run_info: bool,

    /// Only install fastq files
    #[arg(short = 'f', long = "only_install_fastq")]
    only_install_fastq: bool,

    /// List what would be delivered without touching the filesystem
    #[arg(short = 'n', long = "dry_run")]
    dry_run: bool,

    /// Print some more information
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        if let Some(err) = report.downcast_ref::<DeliveryError>() {
            // Scope errors were logged where they happened and end the run
            // without a failure status.
            if !err.is_scope() {
                eprintln!("{report:?}");
            }
            return ExitCode::from(map_exit_code(err));
        }
        eprintln!("{report:?}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DeliveryError) -> u8 {
    match error {
        DeliveryError::MissingScope | DeliveryError::EmptySelection(_) => 0,
        DeliveryError::FlowcellName(_) => 2,
        DeliveryError::Remote(_)
        | DeliveryError::LimsHttp(_)
        | DeliveryError::LimsStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let scope = ProjectScope {
        description: cli.project_desc.clone(),
        lanes: cli.lanes.clone(),
    };

    // Nothing is written below project_dir before the scope is known.
    let log_file = if cli.dry_run || scope.is_empty() {
        None
    } else {
        Some(open_log_file(&cli.project_dir).into_diagnostic()?)
    };
    init_tracing(cli.verbose, log_file);
    app::ensure_scope(&scope)?;

    let config = ConfigLoader::load(&cli.config_file)?;

    let request = DeliveryRequest {
        fc_dir: cli.fc_dir,
        project_dir: cli.project_dir,
        data_prefix: cli.data_prefix,
        flowcell_alias: cli.flowcell_alias,
        scope,
        options: DeliveryOptions {
            move_data: cli.move_data,
            dry_run: cli.dry_run,
            only_fastq: cli.only_install_fastq,
        },
        only_run_info: cli.only_install_run_info,
    };

    let app = App::new(GlobFastqLocator);
    match cli.run_info_yaml.as_deref() {
        Some(path) => {
            app.run(&request, RunInfoSource::File(path), &ConsoleOutput)?;
        }
        None => {
            let lims = LimsHttpClient::authenticate(&config.lims_credentials()?)?;
            app.run(&request, RunInfoSource::Lims(&lims), &ConsoleOutput)?;
        }
    }
    Ok(())
}

fn open_log_file(project_dir: &Utf8Path) -> std::io::Result<File> {
    let log_dir = project_dir.join("log");
    fs::create_dir_all(log_dir.as_std_path())?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE).as_std_path())
}

fn init_tracing(verbose: bool, log_file: Option<File>) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();
}
