use clap::Parser;
use parastudy::{
    config::{ConfigErrors, StudyConfig, DEFAULT_CONFIG},
    connection::{Connection, Connections},
    executors::Executors,
    materials::{MaterialCatalog, MaterialSource, NamedMaterials},
    permutations::{MicrostructurePermutations, PorosityPermutations, SingleBeadPermutations},
    progress::LogProgress,
    runner::RunFilter,
    study::{SimulationRow, SimulationStatus, SimulationType, Study},
};
use serde::de::DeserializeOwned;
use std::{fs, path::Path, path::PathBuf, process::ExitCode};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "parastudy")]
#[command(version)]
#[command(about = "Generate, run and track parametric studies of additive manufacturing simulations")]
struct Args {
    /// Config file, defaults are used when it does not exist
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Study file, overrides the one in the config
    #[arg(long, short = 's')]
    study: Option<PathBuf>,

    /// More output, repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Add permutations read from a YAML request file
    Generate {
        #[command(subcommand)]
        kind: GenerateCommands,
    },
    /// Run pending simulations
    Run {
        /// Only run simulations of these types
        #[arg(long = "type", value_delimiter = ',')]
        types: Option<Vec<SimulationType>>,
        /// Only run simulations with this priority
        #[arg(long)]
        priority: Option<i64>,
        /// Only run simulations of this iteration
        #[arg(long)]
        iteration: Option<i64>,
        /// Only run these simulations
        #[arg(long = "id", value_delimiter = ',')]
        ids: Option<Vec<String>>,
    },
    /// Set the status of simulations
    Status {
        status: SimulationStatus,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Set the priority of simulations
    Priority {
        priority: i64,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Set the iteration of simulations
    Iteration {
        iteration: i64,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Remove simulations
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Remove all simulations
    Clear,
    /// Print the simulations of the study
    Show,
    /// Write the study to a csv file
    Export { path: PathBuf },
    /// Add the simulations of a csv file
    Import { path: PathBuf },
}

#[derive(clap::Subcommand, Debug)]
enum GenerateCommands {
    SingleBead { request: PathBuf },
    Porosity { request: PathBuf },
    Microstructure { request: PathBuf },
}

fn load_config(path: &Path) -> Result<StudyConfig, ConfigErrors> {
    match StudyConfig::load(path) {
        Err(ConfigErrors::FileNotFound(_)) if path == Path::new(DEFAULT_CONFIG) => {
            info!("No config found, using defaults");
            Ok(StudyConfig::default())
        }
        result => result,
    }
}

fn read_request<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;

    serde_yaml::from_str(&content).map_err(|e| format!("Failed to parse {}: {e}", path.display()))
}

fn print_row(row: &SimulationRow) {
    println!(
        "{:<24} {:<15} {:<10} {:>4} {:>4} {:<16} {:>12.4e} {:>12.4e} {}",
        row.id,
        row.kind(),
        row.status,
        row.priority,
        row.iteration,
        row.material,
        row.build_rate,
        row.energy_density,
        row.error_message.as_deref().unwrap_or_default()
    );
}

fn run_simulations(
    config: &StudyConfig,
    study: &mut Study,
    filter: RunFilter,
) -> Result<(), String> {
    if config.preflight_checks() {
        return Err(ConfigErrors::Preflight.to_string());
    }

    let connections = config
        .connections
        .iter()
        .map(|(name, connection)| Connections::load(name, connection))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;

    let materials: Box<dyn MaterialSource> = match config.materials {
        Some(ref materials) => {
            Box::new(MaterialCatalog::load(&materials.path).map_err(|e| e.to_string())?)
        }
        None => Box::new(NamedMaterials),
    };

    let executor = Executors::load(config, connections).map_err(|e| e.to_string())?;
    let summary = study
        .run_simulations(&executor, materials.as_ref(), &filter, &LogProgress::new())
        .map_err(|e| e.to_string())?;

    let Executors::Local(ref local) = executor;
    for connection in local.connections() {
        let outstanding = connection.outstanding();
        if !outstanding.is_empty() {
            warn!(connection = %connection.name(), outstanding = ?outstanding, "Operations still outstanding");
        }
    }

    println!(
        "selected: {}, skipped: {}, completed: {}, failed: {}",
        summary.selected, summary.skipped, summary.completed, summary.failed
    );

    Ok(())
}

fn execute(args: Args) -> Result<(), String> {
    let config = load_config(&args.config).map_err(|e| e.to_string())?;
    let study_path = args.study.unwrap_or_else(|| config.study.path.clone());
    let mut study = Study::open(&study_path).map_err(|e| e.to_string())?;

    match args.command {
        Commands::Generate { kind } => {
            let count = match kind {
                GenerateCommands::SingleBead { request } => study
                    .generate_single_bead_permutations(&read_request::<SingleBeadPermutations>(
                        &request,
                    )?),
                GenerateCommands::Porosity { request } => study.generate_porosity_permutations(
                    &read_request::<PorosityPermutations>(&request)?,
                ),
                GenerateCommands::Microstructure { request } => study
                    .generate_microstructure_permutations(
                        &read_request::<MicrostructurePermutations>(&request)?,
                    ),
            }
            .map_err(|e| e.to_string())?;

            println!("Added {count} simulations");
        }
        Commands::Run {
            types,
            priority,
            iteration,
            ids,
        } => {
            let filter = RunFilter {
                types,
                priority,
                iteration,
                ids,
            };
            run_simulations(&config, &mut study, filter)?;
        }
        Commands::Status { status, ids } => {
            study.set_status(&ids, status).map_err(|e| e.to_string())?;
        }
        Commands::Priority { priority, ids } => {
            study.set_priority(&ids, priority).map_err(|e| e.to_string())?;
        }
        Commands::Iteration { iteration, ids } => {
            study.set_iteration(&ids, iteration).map_err(|e| e.to_string())?;
        }
        Commands::Remove { ids } => {
            study.remove(&ids).map_err(|e| e.to_string())?;
        }
        Commands::Clear => study.clear().map_err(|e| e.to_string())?,
        Commands::Show => {
            study.rows().iter().for_each(print_row);

            for (status, count) in study.status_counts() {
                println!("{status}: {count}");
            }
        }
        Commands::Export { path } => study.export_csv(&path).map_err(|e| e.to_string())?,
        Commands::Import { path } => {
            for rejected in study.import_csv(&path).map_err(|e| e.to_string())? {
                println!("rejected: {rejected}");
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error}");
            ExitCode::FAILURE
        }
    }
}
