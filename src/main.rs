//! SOCIETAS - CLI Entry Point
//!
//! Cooperation-under-reputation simulator.

use clap::{Parser, Subcommand};
use societas::checkpoint::{Checkpoint, CheckpointManager};
use societas::{benchmark, Config, SimulationEngine};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Checkpoints kept in the output directory
const KEEP_CHECKPOINTS: usize = 10;

#[derive(Parser)]
#[command(name = "societas")]
#[command(version)]
#[command(about = "Agent-based simulator of cooperation under reputation and scarcity")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new simulation
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of ticks to simulate
        #[arg(short, long, default_value = "5000")]
        ticks: u64,

        /// Output directory for checkpoints and statistics
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Resume simulation from checkpoint
    Resume {
        /// Checkpoint file to resume from
        #[arg(short, long)]
        checkpoint: PathBuf,

        /// Number of additional ticks
        #[arg(short, long, default_value = "5000")]
        ticks: u64,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of ticks
        #[arg(short, long, default_value = "1000")]
        ticks: u64,

        /// Population size
        #[arg(short, long, default_value = "250")]
        population: usize,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn init_logging(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            ticks,
            output,
            seed,
            quiet,
        } => run_simulation(config, ticks, output, seed, quiet),

        Commands::Resume {
            checkpoint,
            ticks,
            output,
        } => resume_simulation(checkpoint, ticks, output),

        Commands::Benchmark { ticks, population } => {
            init_logging("info");
            run_benchmark(ticks, population)
        }

        Commands::Init { output } => {
            init_logging("info");
            generate_config(output)
        }
    }
}

fn run_simulation(
    config_path: PathBuf,
    ticks: u64,
    output: PathBuf,
    seed: Option<u64>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };
    init_logging(&config.logging.log_level);

    if config_path.exists() {
        log::info!("Loaded config from {:?}", config_path);
    } else {
        log::info!("{:?} not found, using default configuration", config_path);
    }

    let engine = match seed {
        Some(s) => SimulationEngine::new_with_seed(config, s)?,
        None => SimulationEngine::new(config)?,
    };

    println!("Starting simulation");
    println!("  Initial population: {}", engine.population());
    println!("  Grid size: {}x{}", engine.world().width(), engine.world().height());
    println!("  Birth protocol: {:?}", engine.config().population.birth_protocol);
    println!("  Seed: {}", engine.seed());
    println!("  Ticks: {}", ticks);
    println!();

    drive(engine, ticks, &output, quiet)
}

fn resume_simulation(
    checkpoint_path: PathBuf,
    ticks: u64,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let checkpoint = Checkpoint::load(&checkpoint_path)?;
    init_logging(&checkpoint.config.logging.log_level);
    let engine = SimulationEngine::from_checkpoint(checkpoint)?;

    println!("Resumed from {:?} at tick {}", checkpoint_path, engine.tick());
    println!("Population: {}", engine.population());
    println!("Running {} additional ticks", ticks);
    println!();

    drive(engine, ticks, &output, false)
}

/// Run ticks with periodic stats and checkpoints, then write the final outputs
fn drive(
    mut engine: SimulationEngine,
    ticks: u64,
    output: &Path,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(output)?;

    let mut checkpoint_mgr = CheckpointManager::new(
        output.to_string_lossy().to_string(),
        engine.config().logging.checkpoint_interval,
        KEEP_CHECKPOINTS,
    )?;

    let start = Instant::now();
    let start_tick = engine.tick();
    let target = start_tick + ticks;
    let stats_interval = engine.config().logging.stats_interval;

    while engine.tick() < target {
        engine.run_tick();

        if !quiet && engine.tick() % stats_interval == 0 {
            println!("{}", engine.stats().summary());
        }

        if checkpoint_mgr.should_save(engine.tick()) {
            if let Err(e) = checkpoint_mgr.save(&engine.create_checkpoint()) {
                log::error!("Checkpoint error: {}", e);
            }
        }

        if engine.is_extinct() {
            println!("\nPopulation extinct at tick {}", engine.tick());
            break;
        }
    }

    let elapsed = start.elapsed();
    let ran = engine.tick() - start_tick;
    let final_stats = engine.stats();

    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Ticks: {}", engine.tick());
    println!("Speed: {:.1} ticks/s", ran as f64 / elapsed.as_secs_f64().max(f64::EPSILON));
    println!("Final population: {}", engine.population());
    println!("Max generation: {}", final_stats.max_generation);
    println!("Average hidden size: {:.2}", final_stats.avg_hidden_size);

    let final_path = output.join("final.bin");
    engine.create_checkpoint().save(&final_path)?;
    println!("Final checkpoint: {:?}", final_path);

    let stats_path = output.join("stats_history.json");
    engine.stats_history.save(&stats_path.to_string_lossy())?;
    println!("Stats history: {:?}", stats_path);

    Ok(())
}

fn run_benchmark(ticks: u64, population: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== SOCIETAS Benchmark ===");
    println!("Ticks: {}", ticks);
    println!("Population: {}", population);
    println!();

    let result = benchmark(ticks, population)?;
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}
