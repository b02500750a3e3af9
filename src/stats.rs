//! Statistics tracking for the simulation.

use crate::agent::Agent;
use crate::engine::TickCounters;
use crate::social::SocialLedger;
use serde::{Deserialize, Serialize};

/// Read-only aggregate record of one completed tick
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickStats {
    /// Number of completed ticks
    pub tick: u64,
    pub population_count: usize,
    /// Mean points across live agents
    pub avg_wealth: f32,
    /// Mean perceived fame across live agents
    pub avg_fame: f32,
    pub avg_memory_capacity: f32,
    pub avg_ideology: f32,
    /// Mean hidden-layer width
    pub avg_hidden_size: f32,
    pub total_cooperations: usize,
    pub total_defections: usize,
    pub total_moves: usize,
    pub total_ignores: usize,
    pub total_deaths: usize,
    /// Births this tick
    pub births: usize,
    /// Deepest lineage among the living
    pub max_generation: u32,
}

impl TickStats {
    /// Aggregate the live population and the tick's counters
    pub fn collect(
        tick: u64,
        agents: &[Agent],
        ledger: &SocialLedger,
        counters: &TickCounters,
    ) -> Self {
        let mut stats = Self {
            tick,
            population_count: agents.len(),
            total_cooperations: counters.cooperations,
            total_defections: counters.defections,
            total_moves: counters.moves,
            total_ignores: counters.ignores,
            total_deaths: counters.deaths,
            births: counters.births,
            ..Self::default()
        };

        if agents.is_empty() {
            return stats;
        }

        stats.avg_wealth = mean(agents, |a| a.points);
        stats.avg_fame = mean(agents, |a| ledger.get_fame(a.id));
        stats.avg_memory_capacity = mean(agents, |a| a.genome.memory_capacity as f32);
        stats.avg_ideology = mean(agents, |a| a.ideology);
        stats.avg_hidden_size = mean(agents, |a| a.genome.hidden_size() as f32);
        stats.max_generation = agents.iter().map(|a| a.generation).max().unwrap_or(0);

        stats
    }

    /// Cooperations as a share of all game moves this tick
    pub fn cooperation_rate(&self) -> Option<f32> {
        let total = self.total_cooperations + self.total_defections;
        if total == 0 {
            None
        } else {
            Some(self.total_cooperations as f32 / total as f32)
        }
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "T:{:6} | Pop:{:5} | Gen:{:3} | Wealth:{:7.1} | Fame:{:.2} | Ideo:{:.2} | Mem:{:4.1} | Brain:{:4.1} | C:{} D:{} M:{} I:{} | +{} -{}",
            self.tick,
            self.population_count,
            self.max_generation,
            self.avg_wealth,
            self.avg_fame,
            self.avg_ideology,
            self.avg_memory_capacity,
            self.avg_hidden_size,
            self.total_cooperations,
            self.total_defections,
            self.total_moves,
            self.total_ignores,
            self.births,
            self.total_deaths,
        )
    }
}

fn mean<F: Fn(&Agent) -> f32>(agents: &[Agent], f: F) -> f32 {
    agents.iter().map(f).sum::<f32>() / agents.len() as f32
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    /// All recorded stats snapshots
    pub snapshots: Vec<TickStats>,
    /// Recording interval in ticks
    pub interval: u64,
}

impl StatsHistory {
    /// Create new history with recording interval
    pub fn new(interval: u64) -> Self {
        Self {
            snapshots: Vec::new(),
            interval: interval.max(1),
        }
    }

    /// Record a stats snapshot
    pub fn record(&mut self, stats: TickStats) {
        self.snapshots.push(stats);
    }

    pub fn latest(&self) -> Option<&TickStats> {
        self.snapshots.last()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Get population over time
    pub fn population_series(&self) -> Vec<(u64, usize)> {
        self.snapshots
            .iter()
            .map(|s| (s.tick, s.population_count))
            .collect()
    }

    /// Get cooperation rate over time, skipping ticks without games
    pub fn cooperation_series(&self) -> Vec<(u64, f32)> {
        self.snapshots
            .iter()
            .filter_map(|s| s.cooperation_rate().map(|r| (s.tick, r)))
            .collect()
    }

    pub fn ideology_series(&self) -> Vec<(u64, f32)> {
        self.snapshots
            .iter()
            .map(|s| (s.tick, s.avg_ideology))
            .collect()
    }

    /// Get brain size over time
    pub fn brain_series(&self) -> Vec<(u64, f32)> {
        self.snapshots
            .iter()
            .map(|s| (s.tick, s.avg_hidden_size))
            .collect()
    }

    /// Save history to file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load history from file
    pub fn load(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
