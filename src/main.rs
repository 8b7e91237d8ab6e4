use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use quakefit_io::{EventName, ProblemReader, ResultWriter, TableReader};
use quakefit_misfit::MisfitEvaluation;
use quakefit_search::{Grid, GridSearchConfig, Partition, ProfileMode, ScoreSurface};

#[derive(Parser)]
#[command(name = "quakefit")]
#[command(about = "Grid-search seismic moment tensor and force source inversion")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for random grids that do not carry their own seed
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Search a source grid over all candidate origins of a problem file
    Search {
        /// Path to the JSON problem file
        #[arg(long)]
        problem: PathBuf,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Number of search workers (defaults to the thread pool size)
        #[arg(long)]
        workers: Option<usize>,

        /// Work partition: "contiguous" or "strided"
        #[arg(long, default_value = "contiguous")]
        partition: String,
    },

    /// Reduce a saved score surface to a profile along one axis
    Depth {
        /// Binary surface written by `search`
        #[arg(long, conflicts_with = "table", required_unless_present = "table")]
        surface: Option<PathBuf>,

        /// CSV score table written by `search`
        #[arg(long)]
        table: Option<PathBuf>,

        /// Event name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        event: String,

        /// Axis to profile along
        #[arg(long, default_value = "depth_in_m")]
        axis: String,

        /// Profile mode: "misfit", "likelihood", or "marginal"
        #[arg(long, default_value = "misfit")]
        mode: String,

        /// Data uncertainty for the likelihood and marginal modes
        #[arg(long)]
        sigma: Option<f64>,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct SearchOutput {
    event: String,
    grid: &'static str,
    n_sources: usize,
    n_origins: usize,
    best_index: usize,
    best_score: f64,
    magnitude: Option<f64>,
    depth_in_m: f64,
}

#[derive(Serialize)]
struct DepthOutput {
    event: String,
    surface: &'static str,
    axis: String,
    mode: &'static str,
    best_coordinate: Option<f64>,
    n_coordinates: usize,
}

fn parse_partition(s: &str) -> Result<Partition> {
    match s {
        "contiguous" => Ok(Partition::Contiguous),
        "strided" => Ok(Partition::Strided),
        other => anyhow::bail!("unknown partition: {other} (expected contiguous or strided)"),
    }
}

fn parse_mode(s: &str) -> Result<ProfileMode> {
    match s {
        "misfit" => Ok(ProfileMode::Misfit),
        "likelihood" => Ok(ProfileMode::Likelihood),
        "marginal" => Ok(ProfileMode::Marginal),
        other => anyhow::bail!("unknown profile mode: {other} (expected misfit, likelihood, or marginal)"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Search {
            problem,
            output_dir,
            workers,
            partition,
        } => {
            let partition = parse_partition(&partition)?;

            // 1. Read problem and build the grid
            let problem = ProblemReader::new(&problem)
                .read()
                .context("failed to read problem file")?;
            let grid = problem
                .grid
                .build(cli.seed)
                .context("failed to build source grid")?;
            info!(grid = problem.grid.name(), n_sources = grid.len(), "grid built");

            // 2. Search
            let mut config = GridSearchConfig::new().with_partition(partition);
            if let Some(workers) = workers {
                config = config.with_workers(workers)?;
            }
            let result = config
                .search(&problem.bands, grid.as_ref(), &problem.origins)
                .context("grid search failed")?;
            let best = result
                .best()
                .context("every grid point produced a NaN score")?;

            // 3. Re-evaluate the best fit with annotations
            let (source, origin) = result.best_source(grid.as_ref())?;
            let evaluations = problem
                .bands
                .iter()
                .map(|band| {
                    band.evaluate_annotated(&origin, &source)
                        .with_context(|| format!("failed to re-evaluate band {}", band.name))
                })
                .collect::<Result<Vec<MisfitEvaluation>>>()?;
            let named: Vec<(&str, &MisfitEvaluation)> = problem
                .bands
                .iter()
                .map(|band| band.name.as_str())
                .zip(&evaluations)
                .collect();

            // 4. Write artifacts
            let writer = ResultWriter::new(&output_dir, problem.event.clone())?;
            writer.write_search(problem.grid.name(), &result, &source, &named)?;
            writer.write_origins(&result)?;
            let surface = result
                .surface(grid.as_ref())
                .context("failed to build score surface")?;
            writer.write_surface(&surface)?;
            writer.write_table(&surface)?;
            surface
                .save(writer.surface_path())
                .context("failed to save binary surface")?;

            // 5. Print summary
            let output = SearchOutput {
                event: problem.event.to_string(),
                grid: problem.grid.name(),
                n_sources: result.n_sources(),
                n_origins: result.n_origins(),
                best_index: best.index,
                best_score: best.score,
                magnitude: source.magnitude(),
                depth_in_m: origin.depth_in_m,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Depth {
            surface,
            table,
            event,
            axis,
            mode,
            sigma,
            output_dir,
        } => {
            let mode = parse_mode(&mode)?;
            let event_name = EventName::new(event.clone())?;

            // 1. Load the surface
            let surface = match (surface, table) {
                (Some(path), _) => {
                    ScoreSurface::load(&path).context("failed to load binary surface")?
                }
                (None, Some(path)) => ScoreSurface::from(
                    TableReader::new(&path)
                        .read()
                        .context("failed to read score table")?,
                ),
                (None, None) => anyhow::bail!("one of --surface or --table is required"),
            };
            info!(
                variant = surface.variant_name(),
                n_values = surface.len(),
                "surface loaded"
            );

            // 2. Reduce
            let profile = surface
                .profile(&axis, mode, sigma)
                .with_context(|| format!("failed to compute {} profile", mode.as_str()))?;

            // 3. Write
            let writer = ResultWriter::new(&output_dir, event_name)?;
            writer.write_profile(&profile, mode, sigma)?;

            // 4. Print summary
            let best = match mode {
                ProfileMode::Misfit => profile.argmin(),
                _ => quakefit_search::argmin(
                    &profile.values.iter().map(|v| -v).collect::<Vec<_>>(),
                ),
            };
            let output = DepthOutput {
                event,
                surface: surface.variant_name(),
                axis,
                mode: mode.as_str(),
                best_coordinate: best.map(|i| profile.coordinates[i]),
                n_coordinates: profile.coordinates.len(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
