//! Simulation engine - the per-tick state machine.
//!
//! One tick runs, in order: pairing & decision, resolution, taxation,
//! lifecycle (death and reproduction), ledger decay. Every random draw comes
//! from a single seeded generator, so a seed and a config fully determine a
//! run.

use crate::agent::{Action, Agent, AgentId, GameMove};
use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::config::{BirthProtocol, Config, ConfigError};
use crate::neural::MutationConfig;
use crate::social::SocialLedger;
use crate::stats::{StatsHistory, TickStats};
use crate::world::{Position, World};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A displacing parent must be richer than its weakest neighbor by this factor
const DISPLACEMENT_MARGIN: f32 = 1.2;

/// Random cells tried when a launching parent looks for a distant site
const LAUNCH_ATTEMPTS: usize = 10;

/// Event counts for the current tick, reset when a tick starts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickCounters {
    pub cooperations: usize,
    pub defections: usize,
    pub moves: usize,
    pub ignores: usize,
    pub deaths: usize,
    pub births: usize,
}

impl TickCounters {
    #[inline]
    fn record_move(&mut self, mv: GameMove) {
        match mv {
            GameMove::Cooperate => self.cooperations += 1,
            GameMove::Defect => self.defections += 1,
        }
    }
}

/// How a newborn is funded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Endowment {
    /// Parent halves its wealth and hands the other half to the child
    Split,
    /// Parent pays the migration tax, then halves; child gets the stipend
    Stipend,
}

/// Per-tick upkeep of an agent: existence, memory and brain size
pub fn upkeep(agent: &Agent, config: &Config) -> f32 {
    let eco = &config.economy;
    eco.base_existence_tax
        + agent.genome.memory_capacity as f32 * eco.cognitive_tax_rate
        + agent.genome.hidden_size() as f32 * eco.brain_tax_rate
}

fn pair_mut(agents: &mut [Agent], i: usize, j: usize) -> (&mut Agent, &mut Agent) {
    debug_assert_ne!(i, j);
    if i < j {
        let (left, right) = agents.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = agents.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

/// The simulation engine
pub struct SimulationEngine {
    // Population, in insertion order
    agents: Vec<Agent>,
    slots: HashMap<AgentId, usize>,

    // Shared state
    world: World,
    ledger: SocialLedger,

    // Clock and counters
    tick: u64,
    counters: TickCounters,

    // Configuration
    config: Config,
    mutation_config: MutationConfig,

    // Statistics
    pub stats_history: StatsHistory,

    // ID generation
    next_agent_id: u64,

    // Agents dropped from `slots` but still awaiting compaction
    retired: usize,

    // Random number generator (seeded for reproducibility)
    rng: ChaCha8Rng,
    seed: u64,
}

impl SimulationEngine {
    /// Create an engine seeded from entropy
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let seed = rand::thread_rng().gen();
        Self::new_with_seed(config, seed)
    }

    /// Create an engine with a specific seed for reproducibility
    pub fn new_with_seed(config: Config, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;

        if config.social.fame_radius != 1 {
            log::warn!(
                "fame_radius = {} is not used; neighborhoods are fixed at Moore radius 1",
                config.social.fame_radius
            );
        }

        let mut engine = Self {
            agents: Vec::with_capacity(config.population.initial_agents),
            slots: HashMap::new(),
            world: World::from_config(&config.world),
            ledger: SocialLedger::from_config(&config.social),
            tick: 0,
            counters: TickCounters::default(),
            mutation_config: MutationConfig::from_config(&config),
            stats_history: StatsHistory::new(config.logging.stats_interval),
            next_agent_id: 0,
            retired: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            config,
        };

        engine.seed_population();

        log::info!(
            "Engine created: population={}, grid={}x{} ({:?}), protocol={:?}, seed={}",
            engine.agents.len(),
            engine.world.width(),
            engine.world.height(),
            engine.world.geometry(),
            engine.config.population.birth_protocol,
            seed
        );

        Ok(engine)
    }

    /// Restore an engine from a checkpoint, rebuilding the grid from agent positions
    pub fn from_checkpoint(checkpoint: Checkpoint) -> Result<Self, CheckpointError> {
        checkpoint
            .config
            .validate()
            .map_err(|e| CheckpointError::InvalidFormat(e.to_string()))?;

        let mut world = World::from_config(&checkpoint.config.world);
        for agent in &checkpoint.agents {
            if !world.place(agent.id, agent.position) {
                return Err(CheckpointError::InvalidFormat(format!(
                    "agent {} cannot occupy {}",
                    agent.id, agent.position
                )));
            }
        }

        let mut engine = Self {
            agents: checkpoint.agents,
            slots: HashMap::new(),
            world,
            ledger: checkpoint.ledger,
            tick: checkpoint.tick,
            counters: checkpoint.counters,
            mutation_config: MutationConfig::from_config(&checkpoint.config),
            stats_history: checkpoint.stats_history,
            next_agent_id: checkpoint.next_agent_id,
            retired: 0,
            rng: checkpoint.rng,
            seed: checkpoint.random_seed,
            config: checkpoint.config,
        };
        engine.rebuild_slots(0);

        log::info!(
            "Engine restored at tick {}: population={}",
            engine.tick,
            engine.agents.len()
        );
        Ok(engine)
    }

    /// Create checkpoint of current state
    pub fn create_checkpoint(&self) -> Checkpoint {
        Checkpoint::new(
            self.tick,
            self.config.clone(),
            self.agents.clone(),
            self.ledger.clone(),
            self.counters,
            self.stats_history.clone(),
            self.next_agent_id,
            self.seed,
            self.rng.clone(),
        )
    }

    /// Place the initial population on distinct random cells
    fn seed_population(&mut self) {
        let cells = self.config.cell_count();
        let count = self.config.population.initial_agents.min(cells);
        let width = self.world.width();

        let picks = rand::seq::index::sample(&mut self.rng, cells, count).into_vec();
        for cell in picks {
            self.insert_agent(Position::new(cell % width, cell / width));
        }
    }

    /// Create a fresh random agent on an empty cell
    pub fn insert_agent(&mut self, pos: Position) -> Option<AgentId> {
        if !self.world.is_empty(pos) {
            return None;
        }
        let id = self.next_id();
        let agent = Agent::new(id, pos, &self.config, &mut self.rng);
        self.world.place(id, pos);
        self.push_agent(agent);
        Some(id)
    }

    fn next_id(&mut self) -> AgentId {
        let id = AgentId(self.next_agent_id);
        self.next_agent_id += 1;
        id
    }

    fn push_agent(&mut self, agent: Agent) {
        self.slots.insert(agent.id, self.agents.len());
        self.agents.push(agent);
    }

    fn rebuild_slots(&mut self, from: usize) {
        for (idx, agent) in self.agents.iter().enumerate().skip(from) {
            self.slots.insert(agent.id, idx);
        }
    }

    #[inline]
    fn slot(&self, id: AgentId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    /// Drop an agent from lookup and vacate its cell. The entry stays in
    /// `agents` until the next [`Self::compact`], so other slots stay valid.
    fn retire_agent(&mut self, id: AgentId) -> bool {
        let Some(idx) = self.slots.remove(&id) else {
            return false;
        };
        let pos = self.agents[idx].position;
        if self.world.get(pos) == Some(id) {
            self.world.vacate(pos);
        }
        self.retired += 1;
        true
    }

    /// Sweep retired agents out in one pass, keeping insertion order
    fn compact(&mut self) {
        if self.retired == 0 {
            return;
        }
        let slots = &self.slots;
        self.agents.retain(|a| slots.contains_key(&a.id));
        self.retired = 0;
        self.rebuild_slots(0);
    }

    /// Main simulation step
    pub fn run_tick(&mut self) {
        self.counters = TickCounters::default();

        // Phase 1-2: pairing, decisions and their resolution
        self.interaction_phase();

        // Phase 3: aging and upkeep
        self.taxation_phase();

        // Phase 4: death and reproduction
        self.lifecycle_phase();

        // Phase 5: ledger maintenance
        self.ledger.apply_fame_decay();
        self.tick += 1;

        if self.tick % self.stats_history.interval == 0 {
            self.stats_history.record(self.stats());
        }

        log::trace!(
            "tick {}: pop={} C={} D={} moves={} ignores={} births={} deaths={}",
            self.tick,
            self.agents.len(),
            self.counters.cooperations,
            self.counters.defections,
            self.counters.moves,
            self.counters.ignores,
            self.counters.births,
            self.counters.deaths
        );
    }

    /// Pair every unplayed agent with a random neighbor and resolve the meeting
    fn interaction_phase(&mut self) {
        let mut order: Vec<AgentId> = self.agents.iter().map(|a| a.id).collect();
        order.shuffle(&mut self.rng);
        let mut played: HashSet<AgentId> = HashSet::with_capacity(order.len());

        for id in order {
            if played.contains(&id) {
                continue;
            }
            let Some(idx) = self.slot(id) else { continue };
            if !self.agents[idx].is_alive() {
                continue;
            }

            let neighbors = self.world.neighbors(self.agents[idx].position);
            if neighbors.is_empty() {
                // Isolated agents wander without consulting their brain
                if self.rng.gen::<f32>() < self.config.population.isolated_move_probability
                    && self.relocate(idx)
                {
                    self.counters.moves += 1;
                }
                continue;
            }

            let Some(&other) = neighbors.choose(&mut self.rng) else { continue };
            if played.contains(&other) {
                continue;
            }
            let Some(jdx) = self.slot(other) else { continue };

            let max_age = self.config.population.max_age;
            let fame_a = self.ledger.get_fame(id);
            let fame_b = self.ledger.get_fame(other);
            let action_a = self.agents[idx].decide(other, fame_b, max_age);
            let action_b = self.agents[jdx].decide(id, fame_a, max_age);

            match (action_a.as_game_move(), action_b.as_game_move()) {
                (Some(move_a), Some(move_b)) => {
                    self.resolve_game(idx, jdx, move_a, move_b);
                    played.insert(id);
                    played.insert(other);
                }
                _ => {
                    self.avoid(idx, action_a);
                    self.avoid(jdx, action_b);
                }
            }
        }
    }

    /// Handle one side of an avoided meeting
    fn avoid(&mut self, idx: usize, action: Action) {
        match action {
            Action::Move => {
                self.counters.moves += 1;
                self.relocate(idx);
            }
            Action::Ignore => self.counters.ignores += 1,
            Action::Cooperate | Action::Defect => {}
        }
    }

    /// Step to a random free neighboring cell, paying the movement tax on success
    fn relocate(&mut self, idx: usize) -> bool {
        let pos = self.agents[idx].position;
        let Some(target) = self.world.find_empty_adjacent(pos, &mut self.rng) else {
            return false;
        };
        if self.world.move_agent(&mut self.agents[idx], target) {
            self.agents[idx].points -= self.config.economy.movement_tax;
            true
        } else {
            false
        }
    }

    /// Play one round of the game between two agents
    fn resolve_game(&mut self, i: usize, j: usize, move_a: GameMove, move_b: GameMove) {
        let economy = &self.config.economy;
        let matrix = economy.payoff_matrix;
        let cost = economy.interaction_cost;
        let (a, b) = pair_mut(&mut self.agents, i, j);

        a.points += matrix.payoff(move_a, move_b) - cost;
        b.points += matrix.payoff(move_b, move_a) - cost;

        self.counters.record_move(move_a);
        self.counters.record_move(move_b);

        a.update_memory(b.id, move_b);
        b.update_memory(a.id, move_a);
        self.ledger.record_action(a.id, move_a);
        self.ledger.record_action(b.id, move_b);
        a.update_ideology(move_b);
        b.update_ideology(move_a);
    }

    /// Age every agent and charge its upkeep
    fn taxation_phase(&mut self) {
        let config = &self.config;
        for agent in &mut self.agents {
            agent.age += 1;
            agent.points -= upkeep(agent, config);
        }
    }

    /// Remove the dead, then let the wealthy reproduce
    fn lifecycle_phase(&mut self) {
        let max_age = self.config.population.max_age;
        let threshold = self.config.population.reproduction_threshold;
        let roster: Vec<AgentId> = self.agents.iter().map(|a| a.id).collect();

        for id in roster {
            // Missing when displaced earlier in this phase
            let Some(idx) = self.slot(id) else { continue };
            let agent = &self.agents[idx];

            if !agent.is_alive() || agent.age > max_age {
                log::debug!(
                    "Agent {} died at {} (points={:.1}, age={})",
                    id,
                    agent.position,
                    agent.points,
                    agent.age
                );
                self.retire_agent(id);
                self.counters.deaths += 1;
                continue;
            }

            if agent.points >= threshold {
                self.give_birth(id);
            }
        }

        self.compact();
    }

    /// Try to give birth next to (or, under `launch`, far from) a parent.
    ///
    /// Returns the child's id, or `None` when the configured protocol finds
    /// no cell; the parent is then left untouched.
    pub fn reproduce(&mut self, parent_id: AgentId) -> Option<AgentId> {
        let child = self.give_birth(parent_id);
        self.compact();
        child
    }

    /// Reproduction without compaction; a displaced victim stays retired
    fn give_birth(&mut self, parent_id: AgentId) -> Option<AgentId> {
        let idx = self.slot(parent_id)?;
        let pos = self.agents[idx].position;

        let (target, endowment) = match self.world.find_empty_adjacent(pos, &mut self.rng) {
            Some(cell) => (cell, Endowment::Split),
            None => match self.config.population.birth_protocol {
                BirthProtocol::Stay => return None,
                BirthProtocol::Displace => (self.displace_weakest(parent_id)?, Endowment::Split),
                BirthProtocol::Launch => (self.launch_site(parent_id)?, Endowment::Stipend),
            },
        };

        let genome = self.agents[idx].mutate(&self.mutation_config, &mut self.rng);
        let child_id = self.next_id();
        if !self.world.place(child_id, target) {
            return None;
        }

        let economy = &self.config.economy;
        let parent = &mut self.agents[idx];
        let child_points = match endowment {
            Endowment::Split => {
                parent.points /= 2.0;
                parent.points
            }
            Endowment::Stipend => {
                parent.points = (parent.points - economy.migration_tax) / 2.0;
                economy.launch_stipend
            }
        };

        let mut child = Agent::with_genome(child_id, target, genome, child_points);
        child.generation = parent.generation + 1;
        child.parent = Some(parent_id);

        log::debug!(
            "Agent {} born at {} to {} ({:?}, hidden={})",
            child_id,
            target,
            parent_id,
            endowment,
            child.genome.hidden_size()
        );

        self.push_agent(child);
        self.counters.births += 1;
        Some(child_id)
    }

    /// Kill the poorest neighbor if the parent out-earns it by the margin,
    /// returning the freed cell
    fn displace_weakest(&mut self, parent_id: AgentId) -> Option<Position> {
        let parent = &self.agents[self.slot(parent_id)?];
        let weakest = self
            .world
            .neighbors(parent.position)
            .into_iter()
            .filter_map(|id| self.slot(id).map(|k| &self.agents[k]))
            .min_by(|a, b| a.points.total_cmp(&b.points))?;

        if parent.points <= weakest.points * DISPLACEMENT_MARGIN {
            return None;
        }

        let (victim, cell) = (weakest.id, weakest.position);
        log::debug!(
            "Agent {} displaced by {} at {} ({:.1} vs {:.1})",
            victim,
            parent_id,
            cell,
            weakest.points,
            parent.points
        );
        self.retire_agent(victim);
        self.counters.deaths += 1;
        Some(cell)
    }

    /// Sample distant cells for a colony; charges nothing, only checks affordability
    fn launch_site(&mut self, parent_id: AgentId) -> Option<Position> {
        let mut site = None;
        for _ in 0..LAUNCH_ATTEMPTS {
            let cell = self.world.random_cell(&mut self.rng);
            if self.world.is_empty(cell) {
                site = Some(cell);
                break;
            }
        }
        let site = site?;

        let economy = &self.config.economy;
        let parent = &self.agents[self.slot(parent_id)?];
        if parent.points >= economy.migration_tax + economy.launch_reserve {
            Some(site)
        } else {
            None
        }
    }

    /// Run simulation for specified number of ticks
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.run_tick();
        }
    }

    /// Run simulation with callback for progress updates
    pub fn run_with_callback<F>(&mut self, ticks: u64, mut callback: F)
    where
        F: FnMut(&SimulationEngine, u64),
    {
        for i in 0..ticks {
            self.run_tick();
            callback(self, i);
        }
    }

    /// Aggregate record for the tick that just completed
    pub fn stats(&self) -> TickStats {
        TickStats::collect(self.tick, &self.agents, &self.ledger, &self.counters)
    }

    /// Every cell points at its agent and every agent sits in its cell
    pub fn occupancy_consistent(&self) -> bool {
        self.world.occupied_count() == self.agents.len()
            && self
                .agents
                .iter()
                .all(|a| self.world.get(a.position) == Some(a.id))
    }

    /// Live agents in insertion order
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.slot(id).map(|idx| &self.agents[idx])
    }

    /// Mutable access for collaborators that set up scenarios.
    /// Position must be changed through the world, never directly.
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        let idx = self.slot(id)?;
        Some(&mut self.agents[idx])
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn ledger(&self) -> &SocialLedger {
        &self.ledger
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Counters of the last completed tick
    pub fn counters(&self) -> &TickCounters {
        &self.counters
    }

    /// Number of completed ticks
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Get current population count
    pub fn population(&self) -> usize {
        self.agents.len()
    }

    /// Check if population is extinct
    pub fn is_extinct(&self) -> bool {
        self.agents.is_empty()
    }

    /// Get seed for reproducibility
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Geometry;

    fn empty_config(width: usize, height: usize, protocol: BirthProtocol) -> Config {
        let mut config = Config::default();
        config.world.width = width;
        config.world.height = height;
        config.world.geometry = Geometry::Bounded;
        config.population.initial_agents = 0;
        config.population.birth_protocol = protocol;
        config
    }

    fn engine(config: Config) -> SimulationEngine {
        SimulationEngine::new_with_seed(config, 2024).unwrap()
    }

    fn spawn(engine: &mut SimulationEngine, x: usize, y: usize, points: f32) -> AgentId {
        let id = engine.insert_agent(Position::new(x, y)).unwrap();
        engine.agent_mut(id).unwrap().points = points;
        id
    }

    /// Fill every cell of a 3x3 grid except the centre and `skip`
    fn surround(engine: &mut SimulationEngine, skip: Option<(usize, usize)>, points: f32) -> Vec<AgentId> {
        let mut ids = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                if (x, y) == (1, 1) || Some((x, y)) == skip {
                    continue;
                }
                ids.push(spawn(engine, x, y, points));
            }
        }
        ids
    }

    /// Make an agent's brain always choose `action`: the bias input drives
    /// hidden neuron 0, which feeds only the chosen output
    fn pin(engine: &mut SimulationEngine, id: AgentId, action: Action) {
        let column = Action::ALL.iter().position(|&a| a == action).unwrap();
        let brain = &mut engine.agent_mut(id).unwrap().genome.brain;
        brain.input_weights.fill(0.0);
        brain.output_weights.fill(0.0);
        brain.input_weights[[4, 0]] = 1.0;
        brain.output_weights[[0, column]] = 3.0;
    }

    #[test]
    fn test_engine_creation() {
        let mut config = Config::default();
        config.world.width = 20;
        config.world.height = 20;
        config.population.initial_agents = 120;

        let engine = engine(config);
        assert_eq!(engine.population(), 120);
        assert_eq!(engine.tick(), 0);
        assert!(engine.occupancy_consistent());
    }

    #[test]
    fn test_full_grid_seeding() {
        let mut config = empty_config(4, 4, BirthProtocol::Stay);
        config.population.initial_agents = 16;
        let engine = engine(config);
        assert_eq!(engine.population(), 16);
        assert!(engine.occupancy_consistent());
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = Config::default();
        config.social.fame_decay = -0.1;
        assert!(SimulationEngine::new_with_seed(config, 1).is_err());
    }

    #[test]
    fn test_insert_rejects_occupied_cell() {
        let mut engine = engine(empty_config(5, 5, BirthProtocol::Stay));
        assert!(engine.insert_agent(Position::new(2, 2)).is_some());
        assert!(engine.insert_agent(Position::new(2, 2)).is_none());
        assert_eq!(engine.population(), 1);
    }

    #[test]
    fn test_wealth_conservation_on_interaction() {
        let config = empty_config(5, 5, BirthProtocol::Stay);
        let matrix = config.economy.payoff_matrix;
        let cost = config.economy.interaction_cost;
        let mut engine = engine(config);
        let a = spawn(&mut engine, 1, 1, 100.0);
        let b = spawn(&mut engine, 2, 1, 80.0);

        for (move_a, move_b) in [
            (GameMove::Cooperate, GameMove::Cooperate),
            (GameMove::Defect, GameMove::Cooperate),
            (GameMove::Cooperate, GameMove::Defect),
            (GameMove::Defect, GameMove::Defect),
        ] {
            let before = engine.agent(a).unwrap().points + engine.agent(b).unwrap().points;
            let (i, j) = (engine.slot(a).unwrap(), engine.slot(b).unwrap());
            engine.resolve_game(i, j, move_a, move_b);
            let after = engine.agent(a).unwrap().points + engine.agent(b).unwrap().points;

            let expected =
                before - 2.0 * cost + matrix.payoff(move_a, move_b) + matrix.payoff(move_b, move_a);
            assert!((after - expected).abs() < 1e-3, "{:?}/{:?}", move_a, move_b);
        }

        assert_eq!(engine.counters().cooperations, 4);
        assert_eq!(engine.counters().defections, 4);
        assert!(!engine.agent(a).unwrap().memory_of(b).unwrap().is_empty());
        assert!(engine.ledger().reputation(a).is_some());
    }

    #[test]
    fn test_game_updates_memory_ledger_and_ideology() {
        let mut engine = engine(empty_config(5, 5, BirthProtocol::Stay));
        let a = spawn(&mut engine, 1, 1, 100.0);
        let b = spawn(&mut engine, 2, 1, 100.0);
        engine.agent_mut(a).unwrap().ideology = 0.5;
        engine.agent_mut(b).unwrap().ideology = 0.5;

        let (i, j) = (engine.slot(a).unwrap(), engine.slot(b).unwrap());
        engine.resolve_game(i, j, GameMove::Defect, GameMove::Cooperate);

        let agent_a = engine.agent(a).unwrap();
        let agent_b = engine.agent(b).unwrap();
        assert_eq!(agent_a.memory_of(b).unwrap().back(), Some(&GameMove::Cooperate));
        assert_eq!(agent_b.memory_of(a).unwrap().back(), Some(&GameMove::Defect));
        assert!(agent_a.ideology > 0.5);
        assert!(agent_b.ideology < 0.5);
        assert_eq!(engine.ledger().reputation(a).unwrap().defections, 1.0);
        assert_eq!(engine.ledger().reputation(b).unwrap().cooperations, 1.0);
    }

    #[test]
    fn test_taxation_charges_upkeep() {
        let mut config = empty_config(5, 5, BirthProtocol::Stay);
        config.population.isolated_move_probability = 0.0;
        let mut engine = engine(config);
        let id = spawn(&mut engine, 2, 2, 100.0);
        let cost = upkeep(engine.agent(id).unwrap(), engine.config());

        engine.run_tick();

        let agent = engine.agent(id).unwrap();
        assert_eq!(agent.age, 1);
        assert!((agent.points - (100.0 - cost)).abs() < 1e-4);
    }

    #[test]
    fn test_bigger_brains_cost_more() {
        let mut engine = engine(empty_config(5, 5, BirthProtocol::Stay));
        let id = spawn(&mut engine, 2, 2, 100.0);
        let small = upkeep(engine.agent(id).unwrap(), engine.config());

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        engine.agent_mut(id).unwrap().genome.brain.grow_hidden(&mut rng);
        let big = upkeep(engine.agent(id).unwrap(), engine.config());

        assert!((big - small - engine.config().economy.brain_tax_rate).abs() < 1e-5);
    }

    #[test]
    fn test_extinction_scenario() {
        let mut engine = engine(empty_config(5, 5, BirthProtocol::Stay));
        let tax = engine.config().economy.base_existence_tax;
        spawn(&mut engine, 2, 2, tax * 0.5);

        engine.run_tick();
        assert_eq!(engine.population(), 0);
        assert!(engine.is_extinct());
        assert_eq!(engine.counters().deaths, 1);
        assert_eq!(engine.world().occupied_count(), 0);

        engine.run_tick();
        assert_eq!(*engine.counters(), TickCounters::default());
        let stats = engine.stats();
        assert_eq!(stats.tick, 2);
        assert_eq!(stats.population_count, 0);
        assert_eq!(stats.avg_wealth, 0.0);
        assert_eq!(stats.total_deaths, 0);
    }

    #[test]
    fn test_old_age_kills() {
        let mut config = empty_config(5, 5, BirthProtocol::Stay);
        config.population.max_age = 3;
        config.population.isolated_move_probability = 0.0;
        let mut engine = engine(config);
        let id = spawn(&mut engine, 2, 2, 250.0);
        engine.agent_mut(id).unwrap().age = 3;

        engine.run_tick();
        assert!(engine.agent(id).is_none());
        assert_eq!(engine.counters().deaths, 1);
    }

    #[test]
    fn test_stay_reproduction_into_single_free_cell() {
        let mut engine = engine(empty_config(3, 3, BirthProtocol::Stay));
        let parent = spawn(&mut engine, 1, 1, 400.0);
        surround(&mut engine, Some((0, 2)), 50.0);

        let child = engine.reproduce(parent).unwrap();

        let child = engine.agent(child).unwrap();
        assert_eq!(child.position, Position::new(0, 2));
        assert_eq!(child.points, 200.0);
        assert_eq!(child.parent, Some(parent));
        assert_eq!(child.generation, 1);
        assert_eq!(engine.agent(parent).unwrap().points, 200.0);
        assert_eq!(engine.population(), 9);
        assert_eq!(engine.counters().births, 1);
        assert!(engine.occupancy_consistent());
    }

    #[test]
    fn test_stay_without_space_is_noop() {
        let mut engine = engine(empty_config(3, 3, BirthProtocol::Stay));
        let parent = spawn(&mut engine, 1, 1, 400.0);
        surround(&mut engine, None, 10.0);

        assert!(engine.reproduce(parent).is_none());
        assert_eq!(engine.agent(parent).unwrap().points, 400.0);
        assert_eq!(engine.population(), 9);
    }

    #[test]
    fn test_displacement_requires_strict_margin() {
        let mut engine = engine(empty_config(3, 3, BirthProtocol::Displace));
        let parent = spawn(&mut engine, 1, 1, 119.99);
        let others = surround(&mut engine, None, 500.0);
        let weak = others[3];
        engine.agent_mut(weak).unwrap().points = 100.0;

        assert!(engine.reproduce(parent).is_none());
        engine.agent_mut(parent).unwrap().points = 120.0;
        assert!(engine.reproduce(parent).is_none());
        assert_eq!(engine.population(), 9);
        assert_eq!(engine.counters().deaths, 0);

        engine.agent_mut(parent).unwrap().points = 121.0;
        let weak_cell = engine.agent(weak).unwrap().position;
        let child = engine.reproduce(parent).unwrap();

        assert!(engine.agent(weak).is_none());
        assert_eq!(engine.agent(child).unwrap().position, weak_cell);
        assert_eq!(engine.agent(child).unwrap().points, 60.5);
        assert_eq!(engine.agent(parent).unwrap().points, 60.5);
        assert_eq!(engine.counters().deaths, 1);
        assert_eq!(engine.population(), 9);
        assert!(engine.occupancy_consistent());
    }

    #[test]
    fn test_launch_colonizes_distant_cell() {
        let mut config = empty_config(6, 6, BirthProtocol::Launch);
        config.economy.migration_tax = 20.0;
        config.economy.launch_reserve = 50.0;
        config.economy.launch_stipend = 40.0;
        let mut engine = engine(config);
        let parent = spawn(&mut engine, 0, 0, 400.0);
        for (x, y) in [(1, 0), (0, 1), (1, 1)] {
            spawn(&mut engine, x, y, 10.0);
        }

        let child = engine.reproduce(parent).unwrap();

        let child = engine.agent(child).unwrap();
        assert_eq!(child.points, 40.0);
        assert!(child.position.x > 1 || child.position.y > 1);
        assert_eq!(engine.agent(parent).unwrap().points, 190.0);
        assert!(engine.occupancy_consistent());
    }

    #[test]
    fn test_launch_requires_reserve() {
        let mut config = empty_config(6, 6, BirthProtocol::Launch);
        config.economy.migration_tax = 20.0;
        config.economy.launch_reserve = 50.0;
        let mut engine = engine(config);
        let parent = spawn(&mut engine, 0, 0, 69.0);
        for (x, y) in [(1, 0), (0, 1), (1, 1)] {
            spawn(&mut engine, x, y, 10.0);
        }

        assert!(engine.reproduce(parent).is_none());
        assert_eq!(engine.agent(parent).unwrap().points, 69.0);
        assert_eq!(engine.population(), 4);
    }

    #[test]
    fn test_lifecycle_reproduces_rich_agents() {
        let mut config = empty_config(5, 5, BirthProtocol::Stay);
        config.population.isolated_move_probability = 0.0;
        config.population.reproduction_threshold = 300.0;
        let mut engine = engine(config);
        let parent = spawn(&mut engine, 2, 2, 1000.0);

        engine.run_tick();

        assert_eq!(engine.population(), 2);
        assert_eq!(engine.counters().births, 1);
        assert!(engine.agent(parent).unwrap().points < 500.0);
    }

    #[test]
    fn test_occupancy_invariant_across_ticks() {
        for protocol in [BirthProtocol::Stay, BirthProtocol::Displace, BirthProtocol::Launch] {
            let mut config = empty_config(15, 15, protocol);
            config.world.geometry = Geometry::Wraparound;
            config.population.initial_agents = 120;
            config.population.reproduction_threshold = 160.0;
            let mut engine = engine(config);

            for _ in 0..40 {
                engine.run_tick();
                assert!(engine.occupancy_consistent(), "{:?} broke occupancy", protocol);
                for agent in engine.agents() {
                    assert!(agent.genome.brain.is_consistent());
                }
            }
        }
    }

    #[test]
    fn test_counters_reset_each_tick() {
        let mut config = empty_config(10, 10, BirthProtocol::Stay);
        config.population.initial_agents = 80;
        let mut engine = engine(config);

        engine.run_tick();
        let first = *engine.counters();
        assert!(first.cooperations + first.defections + first.moves + first.ignores > 0);

        for _ in 0..5 {
            engine.run_tick();
        }
        // Each agent plays at most once per tick
        let c = engine.counters();
        assert!(c.cooperations + c.defections <= engine.population() + c.deaths);
    }

    #[test]
    fn test_same_seed_same_run() {
        let mut config = empty_config(12, 12, BirthProtocol::Displace);
        config.population.initial_agents = 60;

        let mut first = SimulationEngine::new_with_seed(config.clone(), 77).unwrap();
        let mut second = SimulationEngine::new_with_seed(config, 77).unwrap();
        for _ in 0..25 {
            first.run_tick();
            second.run_tick();
            assert_eq!(first.counters(), second.counters());
        }

        assert_eq!(first.population(), second.population());
        let ids_a: Vec<_> = first.agents().iter().map(|a| (a.id, a.position)).collect();
        let ids_b: Vec<_> = second.agents().iter().map(|a| (a.id, a.position)).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_avoided_meeting_leaves_pair_unplayed() {
        // Two cells, no free space: every move fails
        let mut config = empty_config(2, 1, BirthProtocol::Stay);
        config.population.isolated_move_probability = 0.0;
        let mut engine = engine(config);
        let mover = spawn(&mut engine, 0, 0, 100.0);
        let idler = spawn(&mut engine, 1, 0, 100.0);
        pin(&mut engine, mover, Action::Move);
        pin(&mut engine, idler, Action::Ignore);

        engine.interaction_phase();

        // Neither side is marked played, so both start a meeting
        assert_eq!(engine.counters().moves, 2);
        assert_eq!(engine.counters().ignores, 2);
        assert_eq!(engine.counters().cooperations + engine.counters().defections, 0);

        let (m, i) = (engine.agent(mover).unwrap(), engine.agent(idler).unwrap());
        assert_eq!(m.points, 100.0, "failed moves are free");
        assert_eq!(i.points, 100.0);
        assert_eq!(m.position, Position::new(0, 0));
        assert_eq!(m.known_opponents(), 0);
        assert_eq!(i.known_opponents(), 0);
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_successful_move_pays_movement_tax() {
        let mut config = empty_config(5, 5, BirthProtocol::Stay);
        config.population.isolated_move_probability = 0.0;
        let tax = config.economy.movement_tax;
        let mut engine = engine(config);
        let mover = spawn(&mut engine, 1, 1, 100.0);
        let idler = spawn(&mut engine, 2, 1, 100.0);
        pin(&mut engine, mover, Action::Move);
        pin(&mut engine, idler, Action::Ignore);

        engine.interaction_phase();

        let counters = *engine.counters();
        assert!(counters.moves >= 1);
        assert_eq!(counters.moves, counters.ignores);
        assert_eq!(counters.cooperations + counters.defections, 0);

        let m = engine.agent(mover).unwrap();
        assert!((m.points - (100.0 - tax * counters.moves as f32)).abs() < 1e-4);
        assert_eq!(engine.agent(idler).unwrap().points, 100.0);
        assert!(engine.ledger().is_empty());
        assert!(engine.occupancy_consistent());
    }

    #[test]
    fn test_isolated_agent_wanders() {
        let mut config = empty_config(5, 5, BirthProtocol::Stay);
        config.population.isolated_move_probability = 1.0;
        let tax = config.economy.movement_tax;
        let mut engine = engine(config);
        let id = spawn(&mut engine, 2, 2, 100.0);

        engine.interaction_phase();

        let agent = engine.agent(id).unwrap();
        assert_eq!(engine.counters().moves, 1);
        assert_ne!(agent.position, Position::new(2, 2));
        assert!((agent.points - (100.0 - tax)).abs() < 1e-5);
        assert!(engine.occupancy_consistent());
    }

    #[test]
    fn test_deaths_keep_insertion_order() {
        let mut config = empty_config(5, 5, BirthProtocol::Stay);
        config.population.isolated_move_probability = 0.0;
        let mut engine = engine(config);
        // Non-adjacent cells, so nobody meets anyone
        let cells = [(0, 0), (2, 0), (4, 0), (0, 2), (2, 2), (4, 2)];
        let ids: Vec<AgentId> = cells
            .iter()
            .enumerate()
            .map(|(k, &(x, y))| spawn(&mut engine, x, y, if k % 2 == 0 { 1.0 } else { 100.0 }))
            .collect();

        engine.run_tick();

        assert_eq!(engine.counters().deaths, 3);
        let survivors: Vec<AgentId> = engine.agents().iter().map(|a| a.id).collect();
        assert_eq!(survivors, vec![ids[1], ids[3], ids[5]]);
        for id in survivors {
            assert_eq!(engine.agent(id).map(|a| a.id), Some(id));
        }
        for dead in [ids[0], ids[2], ids[4]] {
            assert!(engine.agent(dead).is_none());
        }
        assert!(engine.occupancy_consistent());
    }
}
