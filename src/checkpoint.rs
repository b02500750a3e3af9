//! Checkpoint system for saving and loading simulation state.

use crate::agent::Agent;
use crate::config::Config;
use crate::engine::TickCounters;
use crate::social::SocialLedger;
use crate::stats::StatsHistory;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"SOCI";

/// Complete simulation state for checkpointing
#[derive(Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Version for compatibility checking
    pub version: u32,
    /// Completed ticks
    pub tick: u64,
    pub config: Config,
    /// Live agents in engine order
    pub agents: Vec<Agent>,
    pub ledger: SocialLedger,
    /// Counters of the last completed tick
    pub counters: TickCounters,
    pub stats_history: StatsHistory,
    /// Next agent ID
    pub next_agent_id: u64,
    /// Seed the run was started with
    pub random_seed: u64,
    /// Generator state, so a resumed run continues the same stream
    pub rng: ChaCha8Rng,
}

impl Checkpoint {
    /// Current checkpoint version
    pub const VERSION: u32 = 1;

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tick: u64,
        config: Config,
        agents: Vec<Agent>,
        ledger: SocialLedger,
        counters: TickCounters,
        stats_history: StatsHistory,
        next_agent_id: u64,
        random_seed: u64,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            version: Self::VERSION,
            tick,
            config,
            agents,
            ledger,
            counters,
            stats_history,
            next_agent_id,
            random_seed,
            rng,
        }
    }

    /// Save checkpoint to binary file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;

        Ok(())
    }

    /// Load checkpoint from binary file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(CheckpointError::InvalidFormat("Invalid magic bytes".to_string()));
        }

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let checkpoint: Checkpoint = bincode::deserialize(&buffer)?;

        if checkpoint.version != Self::VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: Self::VERSION,
                found: checkpoint.version,
            });
        }

        Ok(checkpoint)
    }

    /// Get approximate size in bytes
    pub fn size_bytes(&self) -> usize {
        bincode::serialized_size(self).unwrap_or(0) as usize
    }
}

/// Errors that can occur during checkpoint operations
#[derive(Debug)]
pub enum CheckpointError {
    Io(std::io::Error),
    Serialization(bincode::Error),
    InvalidFormat(String),
    VersionMismatch { expected: u32, found: u32 },
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            Self::VersionMismatch { expected, found } => {
                write!(f, "Version mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for CheckpointError {}

impl From<std::io::Error> for CheckpointError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<bincode::Error> for CheckpointError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e)
    }
}

/// `checkpoint_<digits>.bin`, the names written by [`CheckpointManager`]
fn is_rotated_name(name: &str) -> bool {
    name.strip_prefix("checkpoint_")
        .and_then(|rest| rest.strip_suffix(".bin"))
        .map_or(false, |tick| !tick.is_empty() && tick.bytes().all(|b| b.is_ascii_digit()))
}

/// Saves checkpoints on an interval and keeps only the newest few
pub struct CheckpointManager {
    pub base_dir: String,
    /// Ticks between checkpoints
    pub interval: u64,
    pub max_checkpoints: usize,
    last_checkpoint: u64,
}

impl CheckpointManager {
    pub fn new(base_dir: String, interval: u64, max_checkpoints: usize) -> Result<Self, CheckpointError> {
        std::fs::create_dir_all(&base_dir)?;

        Ok(Self {
            base_dir,
            interval: interval.max(1),
            max_checkpoints,
            last_checkpoint: 0,
        })
    }

    /// Check if a checkpoint should be saved
    pub fn should_save(&self, tick: u64) -> bool {
        tick > 0 && tick % self.interval == 0 && tick != self.last_checkpoint
    }

    pub fn checkpoint_path(&self, tick: u64) -> String {
        format!("{}/checkpoint_{:08}.bin", self.base_dir, tick)
    }

    /// Save checkpoint and rotate old files
    pub fn save(&mut self, checkpoint: &Checkpoint) -> Result<String, CheckpointError> {
        let path = self.checkpoint_path(checkpoint.tick);
        checkpoint.save(&path)?;
        self.last_checkpoint = checkpoint.tick;
        log::info!("Checkpoint saved: {}", path);

        self.cleanup()?;

        Ok(path)
    }

    fn checkpoint_files(&self) -> Result<Vec<std::fs::DirEntry>, CheckpointError> {
        let mut files: Vec<_> = std::fs::read_dir(&self.base_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| is_rotated_name(&entry.file_name().to_string_lossy()))
            .collect();
        // Zero-padded tick in the name keeps lexical order chronological
        files.sort_by_key(|e| e.file_name());
        Ok(files)
    }

    /// Remove old checkpoints beyond max limit
    fn cleanup(&self) -> Result<(), CheckpointError> {
        let files = self.checkpoint_files()?;
        if files.len() > self.max_checkpoints {
            let to_remove = files.len() - self.max_checkpoints;
            for entry in files.into_iter().take(to_remove) {
                log::debug!("Removing old checkpoint {:?}", entry.path());
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Find latest checkpoint in directory
    pub fn find_latest(&self) -> Option<String> {
        self.checkpoint_files()
            .ok()?
            .last()
            .map(|e| e.path().to_string_lossy().to_string())
    }
}
