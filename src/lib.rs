pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{EventoClient, MemoryState, MemoryStore, MoodleClient};
pub use config::{Selection, SyncConfig, SyncOptions};
pub use core::pipeline::{MemberOutcome, SelectedModule, SyncPipeline, TargetSettings};
pub use core::report::SyncStats;
pub use utils::error::{Result, SyncError};
