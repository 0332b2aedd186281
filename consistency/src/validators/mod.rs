//! One module per concern; each exposes `validate(&Scenario) -> ConsistencyReport`.

pub mod cloud_spec;
pub mod config;
pub mod containers;
pub mod event;
pub mod networks;
pub mod ports;
pub mod relations;
pub mod resources;
pub mod secrets;
pub mod storages;
pub mod stored_state;
