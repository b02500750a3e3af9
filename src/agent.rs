//! Agent structure: genome, private memory, ideology and decisions.

use crate::config::Config;
use crate::neural::{Brain, MutationConfig};
use crate::world::Position;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Number of decision inputs fed to the brain
pub const DECISION_INPUTS: usize = 6;

/// Number of scored actions
pub const ACTION_COUNT: usize = 4;

/// Hard bounds on heritable memory capacity
pub const MEMORY_CAPACITY_MIN: u32 = 1;
pub const MEMORY_CAPACITY_MAX: u32 = 50;

/// Wealth at which the points input saturates
const WEALTH_SCALE: f32 = 1000.0;

/// Weight kept by the old ideology on each update
const IDEOLOGY_RETENTION: f32 = 0.9;

/// Weight given to the observed move on each update
const IDEOLOGY_LEARNING_RATE: f32 = 0.1;

/// Half-width of the uniform noise applied to inherited ideology
const IDEOLOGY_NOISE: f32 = 0.1;

/// Ratio assumed for opponents never met in person
const UNKNOWN_HISTORY_RATIO: f32 = 0.5;

/// Unique, stable agent identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A move inside the two-player game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMove {
    Cooperate,
    Defect,
}

/// Everything a brain can choose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Cooperate,
    Defect,
    Move,
    Ignore,
}

impl Action {
    /// Output order of the brain
    pub const ALL: [Action; ACTION_COUNT] =
        [Action::Cooperate, Action::Defect, Action::Move, Action::Ignore];

    /// The game move, if this action enters the game at all
    #[inline]
    pub fn as_game_move(self) -> Option<GameMove> {
        match self {
            Action::Cooperate => Some(GameMove::Cooperate),
            Action::Defect => Some(GameMove::Defect),
            Action::Move | Action::Ignore => None,
        }
    }
}

impl From<GameMove> for Action {
    fn from(mv: GameMove) -> Self {
        match mv {
            GameMove::Cooperate => Action::Cooperate,
            GameMove::Defect => Action::Defect,
        }
    }
}

/// Heritable payload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Genome {
    pub brain: Brain,
    /// Moves remembered per opponent
    pub memory_capacity: u32,
    /// Ideology the agent was born with
    pub starting_ideology: f32,
}

impl Genome {
    /// Random genome for a seeded agent
    pub fn random<R: Rng + ?Sized>(config: &Config, rng: &mut R) -> Self {
        let brain = Brain::new_random(
            config.brain.input_size,
            config.brain.initial_hidden,
            config.brain.output_size,
            rng,
        );
        let (mem_lo, mem_hi) = config.population.initial_memory;

        Self {
            brain,
            memory_capacity: rng.gen_range(mem_lo..=mem_hi),
            starting_ideology: rng.gen::<f32>(),
        }
    }

    #[inline]
    pub fn hidden_size(&self) -> usize {
        self.brain.hidden_size()
    }
}

/// An agent in the simulation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    // Identity
    pub id: AgentId,
    pub generation: u32,
    pub parent: Option<AgentId>,

    // State
    pub points: f32,
    pub age: u32,
    pub position: Position,

    // Heredity and culture
    pub genome: Genome,
    /// Current willingness to cooperate, in [0, 1]
    pub ideology: f32,

    // Private experience: opponent -> their observed moves, oldest first
    memory: HashMap<AgentId, VecDeque<GameMove>>,
}

impl Agent {
    /// Create a seeded agent with a random genome
    pub fn new<R: Rng + ?Sized>(id: AgentId, position: Position, config: &Config, rng: &mut R) -> Self {
        let genome = Genome::random(config, rng);
        Self::with_genome(id, position, genome, config.population.starting_points)
    }

    /// Create an agent from an existing genome
    pub fn with_genome(id: AgentId, position: Position, genome: Genome, points: f32) -> Self {
        Self {
            id,
            generation: 0,
            parent: None,
            points,
            age: 0,
            position,
            ideology: genome.starting_ideology,
            genome,
            memory: HashMap::new(),
        }
    }

    /// Wealth is still positive
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.points > 0.0
    }

    /// Fraction of remembered moves by `opponent` that were cooperation
    pub fn history_ratio(&self, opponent: AgentId) -> f32 {
        match self.memory.get(&opponent) {
            Some(history) if !history.is_empty() => {
                let coops = history.iter().filter(|&&m| m == GameMove::Cooperate).count();
                coops as f32 / history.len() as f32
            }
            _ => UNKNOWN_HISTORY_RATIO,
        }
    }

    /// Build the brain input vector for a meeting with `opponent`
    pub fn decision_inputs(&self, opponent: AgentId, opponent_fame: f32, max_age: u32) -> [f32; DECISION_INPUTS] {
        let normalized_age = if max_age == 0 {
            1.0
        } else {
            (self.age as f32 / max_age as f32).min(1.0)
        };

        [
            (self.points / WEALTH_SCALE).min(1.0),
            normalized_age,
            opponent_fame,
            self.history_ratio(opponent),
            1.0, // bias
            self.ideology,
        ]
    }

    /// Choose an action against `opponent` with a single forward pass
    pub fn decide(&self, opponent: AgentId, opponent_fame: f32, max_age: u32) -> Action {
        let inputs = self.decision_inputs(opponent, opponent_fame, max_age);
        let outputs = self.genome.brain.forward(&inputs);
        Action::ALL[Brain::argmax(&outputs).min(ACTION_COUNT - 1)]
    }

    /// Remember a move by `opponent`, forgetting the oldest beyond capacity
    pub fn update_memory(&mut self, opponent: AgentId, observed: GameMove) {
        let capacity = self.genome.memory_capacity as usize;
        let history = self.memory.entry(opponent).or_default();
        history.push_back(observed);
        while history.len() > capacity {
            history.pop_front();
        }
    }

    /// Cultural learning: drift toward the opponent's behavior
    pub fn update_ideology(&mut self, opponent_move: GameMove) {
        let target = match opponent_move {
            GameMove::Cooperate => 1.0,
            GameMove::Defect => 0.0,
        };
        self.ideology = self.ideology * IDEOLOGY_RETENTION + target * IDEOLOGY_LEARNING_RATE;
    }

    /// Remembered moves of one opponent
    pub fn memory_of(&self, opponent: AgentId) -> Option<&VecDeque<GameMove>> {
        self.memory.get(&opponent)
    }

    /// Number of opponents with a private record
    pub fn known_opponents(&self) -> usize {
        self.memory.len()
    }

    /// Produce a child genome from this agent's genome and current ideology
    pub fn mutate<R: Rng + ?Sized>(&self, config: &MutationConfig, rng: &mut R) -> Genome {
        let rate = config.mutation_rate;

        let mut brain = self.genome.brain.clone();
        brain.mutate(config, rng);

        let mut memory_capacity = self.genome.memory_capacity;
        if rng.gen::<f32>() < rate {
            let delta = rng.gen_range(-2i64..=2);
            memory_capacity = (memory_capacity as i64 + delta)
                .clamp(MEMORY_CAPACITY_MIN as i64, MEMORY_CAPACITY_MAX as i64) as u32;
        }

        let mut starting_ideology = self.ideology;
        if rng.gen::<f32>() < rate {
            starting_ideology += rng.gen_range(-IDEOLOGY_NOISE..=IDEOLOGY_NOISE);
        }

        Genome {
            brain,
            memory_capacity,
            starting_ideology: starting_ideology.clamp(0.0, 1.0),
        }
    }
}
