//! # SOCIETAS
//!
//! Agent-based simulator of cooperation under reputation and scarcity.
//!
//! Agents live on a 2-D grid, meet a random neighbor every tick and decide,
//! through a small evolvable neural network, whether to cooperate, defect,
//! walk away or ignore the encounter. A public ledger turns past moves into
//! fame, upkeep drains wealth every tick, and the wealthy reproduce with
//! mutated brains.
//!
//! ## Features
//!
//! - **Evolvable brains**: hidden layers grow and shrink across generations
//! - **Reputation**: decaying public record, blurred by a transparency knob
//! - **Three birth protocols**: stay, displace the weakest, or launch a colony
//! - **Configurable**: YAML configuration files
//! - **Reproducible**: one seeded ChaCha8 stream drives every random draw
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use societas::{Config, SimulationEngine};
//!
//! let config = Config::default();
//! let mut engine = SimulationEngine::new_with_seed(config, 42).unwrap();
//!
//! engine.run(1000);
//!
//! println!("Population: {}", engine.population());
//! println!("{}", engine.stats().summary());
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use societas::Config;
//! use societas::config::BirthProtocol;
//!
//! let mut config = Config::default();
//! config.population.initial_agents = 200;
//! config.population.birth_protocol = BirthProtocol::Launch;
//! config.social.transparency = 0.8;
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Checkpoints
//!
//! ```rust,no_run
//! use societas::{Config, SimulationEngine};
//! use societas::checkpoint::Checkpoint;
//!
//! let mut engine = SimulationEngine::new(Config::default()).unwrap();
//! engine.run(1000);
//!
//! let checkpoint = engine.create_checkpoint();
//! checkpoint.save("checkpoint.bin").unwrap();
//!
//! let loaded = Checkpoint::load("checkpoint.bin").unwrap();
//! let restored = SimulationEngine::from_checkpoint(loaded).unwrap();
//! ```

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod neural;
pub mod social;
pub mod stats;
pub mod world;

// Re-export main types
pub use agent::{Action, Agent, AgentId, GameMove};
pub use config::{Config, ConfigError};
pub use engine::{SimulationEngine, TickCounters};
pub use social::SocialLedger;
pub use stats::TickStats;
pub use world::{Position, World};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark on a grid sized to fit the population
pub fn benchmark(ticks: u64, population: usize) -> Result<BenchmarkResult, ConfigError> {
    use std::time::Instant;

    let mut config = Config::default();
    let side = ((population * 2) as f64).sqrt().ceil() as usize;
    config.world.width = config.world.width.max(side);
    config.world.height = config.world.height.max(side);
    config.population.initial_agents = population;

    let mut engine = SimulationEngine::new_with_seed(config, 42)?;

    let start = Instant::now();
    let mut completed = 0;
    for _ in 0..ticks {
        engine.run_tick();
        completed += 1;
        if engine.is_extinct() {
            break;
        }
    }
    let elapsed = start.elapsed();

    Ok(BenchmarkResult {
        ticks: completed,
        initial_population: population,
        final_population: engine.population(),
        elapsed_secs: elapsed.as_secs_f64(),
        ticks_per_second: completed as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        max_generation: engine.stats().max_generation,
    })
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    /// Ticks actually run; fewer than requested if the population died out
    pub ticks: u64,
    pub initial_population: usize,
    pub final_population: usize,
    pub elapsed_secs: f64,
    pub ticks_per_second: f64,
    pub max_generation: u32,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Population: {} -> {}", self.initial_population, self.final_population)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} ticks/s", self.ticks_per_second)?;
        writeln!(f, "Max generation: {}", self.max_generation)?;
        Ok(())
    }
}
