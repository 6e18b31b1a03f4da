// Adapters layer: concrete implementations of the domain ports.

pub mod evento;
pub mod memory;
pub mod moodle;

pub use evento::EventoClient;
pub use memory::{MemoryState, MemoryStore};
pub use moodle::MoodleClient;
