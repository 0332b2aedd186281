//! Mock transport: hook commands and Pebble calls resolved against the
//! working state instead of a real Juju agent.

pub mod backend;
pub mod fs;
pub mod pebble;

pub use backend::MockBackend;
pub use fs::FsArena;
pub use pebble::MockPebble;
