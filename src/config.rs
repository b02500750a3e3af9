//! Configuration system for the society simulation.
//!
//! Supports YAML configuration files with sensible defaults.

use crate::agent::GameMove;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub world: WorldConfig,
    pub social: SocialConfig,
    pub economy: EconomyConfig,
    pub population: PopulationConfig,
    pub brain: BrainConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Grid shape and edge behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Geometry {
    /// Hard edges, out-of-range neighbors are skipped
    #[serde(alias = "square")]
    Bounded,
    /// Torus, coordinates wrap modulo the grid dimensions
    #[serde(alias = "torus")]
    Wraparound,
    /// Declared shape variant; behaves exactly like `Bounded`
    #[serde(alias = "l-shape")]
    Irregular,
}

impl Geometry {
    /// Whether offsets wrap around the grid edges
    #[inline]
    pub fn wraps(self) -> bool {
        matches!(self, Geometry::Wraparound)
    }
}

/// Where a child may be placed when the parent has no free neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BirthProtocol {
    Stay,
    Displace,
    Launch,
}

/// World/grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Grid width in cells
    pub width: usize,
    /// Grid height in cells
    pub height: usize,
    /// Edge behaviour
    pub geometry: Geometry,
}

/// Reputation ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    /// How much perceived fame reflects the true record (0.0 - 1.0)
    pub transparency: f32,
    /// Fraction of every counter forgotten per tick (0.0 - 1.0)
    pub fame_decay: f32,
    /// Moore radius for reputation. Neighbor logic is fixed at 1; other values are inert.
    pub fame_radius: u32,
    /// Fame reported for agents the ledger has never seen
    pub initial_fame: f32,
}

/// Prisoner's dilemma payoffs, keyed by (own move, opponent move)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoffMatrix {
    /// (C, C)
    pub reward: f32,
    /// (D, C)
    pub temptation: f32,
    /// (C, D)
    pub sucker: f32,
    /// (D, D)
    pub punishment: f32,
}

impl PayoffMatrix {
    /// Payoff received by a player who played `own` against `other`
    #[inline]
    pub fn payoff(&self, own: GameMove, other: GameMove) -> f32 {
        match (own, other) {
            (GameMove::Cooperate, GameMove::Cooperate) => self.reward,
            (GameMove::Defect, GameMove::Cooperate) => self.temptation,
            (GameMove::Cooperate, GameMove::Defect) => self.sucker,
            (GameMove::Defect, GameMove::Defect) => self.punishment,
        }
    }

    fn entries(&self) -> [f32; 4] {
        [self.reward, self.temptation, self.sucker, self.punishment]
    }
}

/// Economic constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    pub payoff_matrix: PayoffMatrix,
    /// Flat metabolic cost paid every tick
    pub base_existence_tax: f32,
    /// Cost per unit of memory capacity per tick
    pub cognitive_tax_rate: f32,
    /// Cost per hidden neuron per tick
    pub brain_tax_rate: f32,
    /// Charged on every successful move
    pub movement_tax: f32,
    /// Fee each player pays to enter a game
    pub interaction_cost: f32,
    /// Charged to a parent colonizing a distant cell (launch protocol)
    pub migration_tax: f32,
    /// Wealth a launching parent must hold on top of the migration tax
    pub launch_reserve: f32,
    /// Starting wealth of a launched child
    pub launch_stipend: f32,
}

/// Population and lifecycle rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of agents seeded at start
    pub initial_agents: usize,
    /// Wealth of seeded agents
    pub starting_points: f32,
    /// Minimum wealth to reproduce
    pub reproduction_threshold: f32,
    /// Probability used by every mutation operator
    pub mutation_rate: f32,
    pub birth_protocol: BirthProtocol,
    /// Agents older than this die
    pub max_age: u32,
    /// Chance per tick that an agent with no neighbors wanders
    pub isolated_move_probability: f32,
    /// Inclusive range for the memory capacity of seeded agents
    pub initial_memory: (u32, u32),
}

/// Neural genome configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainConfig {
    /// Number of decision inputs (fixed at 6)
    pub input_size: usize,
    /// Number of scored actions (fixed at 4)
    pub output_size: usize,
    /// Hidden layer size of seeded agents
    pub initial_hidden: usize,
    pub min_hidden: usize,
    pub max_hidden: usize,
    /// Standard deviation of Gaussian weight perturbations
    pub mutation_power: f32,
}

/// Logging and checkpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Ticks between checkpoints
    pub checkpoint_interval: u64,
    /// Ticks between stats history records
    pub stats_interval: u64,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            social: SocialConfig::default(),
            economy: EconomyConfig::default(),
            population: PopulationConfig::default(),
            brain: BrainConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 40,
            height: 40,
            geometry: Geometry::Bounded,
        }
    }
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            transparency: 0.3,
            fame_decay: 0.4,
            fame_radius: 1,
            initial_fame: 0.4,
        }
    }
}

impl Default for PayoffMatrix {
    fn default() -> Self {
        Self {
            reward: 4.0,
            temptation: 10.0,
            sucker: -6.0,
            punishment: -1.0,
        }
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            payoff_matrix: PayoffMatrix::default(),
            base_existence_tax: 1.5,
            cognitive_tax_rate: 0.05,
            brain_tax_rate: 0.05,
            movement_tax: 0.2,
            interaction_cost: 0.2,
            migration_tax: 20.0,
            launch_reserve: 50.0,
            launch_stipend: 50.0,
        }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            initial_agents: 250,
            starting_points: 150.0,
            reproduction_threshold: 300.0,
            mutation_rate: 0.1,
            birth_protocol: BirthProtocol::Displace,
            max_age: 500,
            isolated_move_probability: 0.1,
            initial_memory: (1, 20),
        }
    }
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            input_size: 6,
            output_size: 4,
            initial_hidden: 4,
            min_hidden: 1,
            max_hidden: 16,
            mutation_power: 0.1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 500,
            stats_interval: 10,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Total number of grid cells
    pub fn cell_count(&self) -> usize {
        self.world.width * self.world.height
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let world = &self.world;
        if world.width == 0 || world.height == 0 {
            return Err(ConfigError::invalid("grid width and height must be > 0"));
        }
        if self.population.initial_agents > self.cell_count() {
            return Err(ConfigError::invalid(
                "initial_agents cannot exceed the number of grid cells",
            ));
        }

        let social = &self.social;
        for (name, value) in [
            ("transparency", social.transparency),
            ("fame_decay", social.fame_decay),
            ("initial_fame", social.initial_fame),
            ("mutation_rate", self.population.mutation_rate),
            (
                "isolated_move_probability",
                self.population.isolated_move_probability,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self
            .economy
            .payoff_matrix
            .entries()
            .iter()
            .any(|p| !p.is_finite())
        {
            return Err(ConfigError::invalid("payoff matrix entries must be finite"));
        }

        let brain = &self.brain;
        if brain.input_size != 6 {
            return Err(ConfigError::invalid("brain.input_size must be 6"));
        }
        if brain.output_size != 4 {
            return Err(ConfigError::invalid("brain.output_size must be 4"));
        }
        if brain.min_hidden == 0 || brain.min_hidden > brain.max_hidden {
            return Err(ConfigError::invalid(
                "hidden bounds must satisfy 1 <= min_hidden <= max_hidden",
            ));
        }
        if !(brain.min_hidden..=brain.max_hidden).contains(&brain.initial_hidden) {
            return Err(ConfigError::invalid(
                "initial_hidden must lie within [min_hidden, max_hidden]",
            ));
        }
        if !(brain.mutation_power >= 0.0 && brain.mutation_power.is_finite()) {
            return Err(ConfigError::invalid("mutation_power must be finite and >= 0"));
        }

        let (mem_lo, mem_hi) = self.population.initial_memory;
        if mem_lo == 0 || mem_lo > mem_hi || mem_hi > 50 {
            return Err(ConfigError::invalid(
                "initial_memory must satisfy 1 <= low <= high <= 50",
            ));
        }
        if self.logging.stats_interval == 0 || self.logging.checkpoint_interval == 0 {
            return Err(ConfigError::invalid("logging intervals must be > 0"));
        }
        Ok(())
    }
}

/// Errors raised while loading or validating a configuration
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    Invalid(String),
}

impl ConfigError {
    fn invalid(msg: &str) -> Self {
        Self::Invalid(msg.to_string())
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e)
    }
}
