//! Public reputation ("fame") ledger.
//!
//! Counters are continuous because decay shrinks them fractionally every
//! tick. Perceived fame is the cooperation ratio pulled toward neutral by
//! the configured transparency.

use crate::agent::{AgentId, GameMove};
use crate::config::SocialConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fame of an agent with a registry entry but no recorded weight
pub const NEUTRAL_FAME: f32 = 0.5;

/// Accumulated public record of one agent
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Reputation {
    pub cooperations: f64,
    pub defections: f64,
}

impl Reputation {
    /// Fraction of recorded weight that was cooperation, if any was recorded
    pub fn raw(&self) -> Option<f64> {
        let total = self.cooperations + self.defections;
        if total > 0.0 {
            Some(self.cooperations / total)
        } else {
            None
        }
    }
}

/// Global registry of public actions
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SocialLedger {
    registry: HashMap<AgentId, Reputation>,
    decay_rate: f32,
    transparency: f32,
    initial_fame: f32,
}

impl SocialLedger {
    pub fn new(decay_rate: f32, transparency: f32, initial_fame: f32) -> Self {
        Self {
            registry: HashMap::new(),
            decay_rate,
            transparency,
            initial_fame,
        }
    }

    pub fn from_config(config: &SocialConfig) -> Self {
        Self::new(config.fame_decay, config.transparency, config.initial_fame)
    }

    /// Count one public move, registering the agent if unseen
    pub fn record_action(&mut self, id: AgentId, mv: GameMove) {
        let entry = self.registry.entry(id).or_default();
        match mv {
            GameMove::Cooperate => entry.cooperations += 1.0,
            GameMove::Defect => entry.defections += 1.0,
        }
    }

    /// Perceived fame in [0, 1]
    pub fn get_fame(&self, id: AgentId) -> f32 {
        let Some(rep) = self.registry.get(&id) else {
            return self.initial_fame;
        };
        match rep.raw() {
            Some(raw) => {
                let perceived = 0.5 + (raw - 0.5) * self.transparency as f64;
                perceived as f32
            }
            None => NEUTRAL_FAME,
        }
    }

    /// Shrink every counter by the decay rate. Entries are never dropped.
    pub fn apply_fame_decay(&mut self) {
        let keep = 1.0 - self.decay_rate as f64;
        for rep in self.registry.values_mut() {
            rep.cooperations *= keep;
            rep.defections *= keep;
        }
    }

    /// Raw counters of a registered agent
    pub fn reputation(&self, id: AgentId) -> Option<&Reputation> {
        self.registry.get(&id)
    }

    /// Number of registered agents
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(transparency: f32) -> SocialLedger {
        SocialLedger::new(0.4, transparency, 0.4)
    }

    #[test]
    fn test_unknown_agent_gets_initial_fame() {
        let ledger = ledger(0.3);
        assert_eq!(ledger.get_fame(AgentId(42)), 0.4);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_transparency_scaling() {
        let mut opaque = ledger(0.0);
        let mut clear = ledger(1.0);
        let mut partial = ledger(0.5);
        for l in [&mut opaque, &mut clear, &mut partial] {
            l.record_action(AgentId(1), GameMove::Cooperate);
            l.record_action(AgentId(1), GameMove::Cooperate);
            l.record_action(AgentId(1), GameMove::Cooperate);
            l.record_action(AgentId(1), GameMove::Defect);
        }

        assert!((opaque.get_fame(AgentId(1)) - 0.5).abs() < 1e-6);
        assert!((clear.get_fame(AgentId(1)) - 0.75).abs() < 1e-6);
        assert!((partial.get_fame(AgentId(1)) - 0.625).abs() < 1e-6);
    }

    #[test]
    fn test_decay_shrinks_counters() {
        let mut ledger = ledger(1.0);
        ledger.record_action(AgentId(1), GameMove::Cooperate);
        ledger.record_action(AgentId(1), GameMove::Defect);
        ledger.record_action(AgentId(1), GameMove::Defect);
        let before = *ledger.reputation(AgentId(1)).unwrap();

        ledger.apply_fame_decay();
        let after = *ledger.reputation(AgentId(1)).unwrap();

        assert!(after.cooperations < before.cooperations);
        assert!(after.defections < before.defections);
        // decay_rate is f32, so the keep factor is only f32-accurate
        assert!((after.cooperations - 0.6).abs() < 1e-6);
        assert!((after.defections - 1.2).abs() < 1e-6);
        // Decay is proportional, so the ratio survives
        assert!((ledger.get_fame(AgentId(1)) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_decay_is_identity() {
        let mut ledger = SocialLedger::new(0.0, 1.0, 0.4);
        ledger.record_action(AgentId(3), GameMove::Defect);
        ledger.apply_fame_decay();
        assert_eq!(ledger.reputation(AgentId(3)).unwrap().defections, 1.0);
    }

    #[test]
    fn test_fame_stays_in_unit_interval() {
        let mut ledger = SocialLedger::new(0.9, 1.0, 0.4);
        for step in 0..500u64 {
            let id = AgentId(step % 7);
            let mv = if step % 3 == 0 { GameMove::Defect } else { GameMove::Cooperate };
            ledger.record_action(id, mv);
            if step % 2 == 0 {
                ledger.apply_fame_decay();
            }
            for probe in 0..8 {
                let fame = ledger.get_fame(AgentId(probe));
                assert!((0.0..=1.0).contains(&fame), "fame {} out of range", fame);
            }
        }
    }

    #[test]
    fn test_fully_decayed_entry_is_neutral() {
        let mut ledger = SocialLedger::new(1.0, 1.0, 0.4);
        ledger.record_action(AgentId(5), GameMove::Defect);
        ledger.apply_fame_decay();
        assert_eq!(ledger.get_fame(AgentId(5)), NEUTRAL_FAME);
    }
}
