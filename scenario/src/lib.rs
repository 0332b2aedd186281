//! State-transition testing for Juju charms.
//!
//! A test declares the [`State`] a unit is in and the [`Event`] Juju
//! delivers; a [`Context`] runs the charm's handlers against a mocked model
//! and returns the state that results. Nothing talks to a real controller:
//! hook commands resolve against the state, Pebble against the container
//! definitions, and filesystems against temporary directories.
//!
//! # Entry Point
//!
//! ```
//! use ops_scenario::{on, Charm, Context, EventContext, Framework, Model};
//! use scenario_state::{CharmMeta, CharmSpec, Event, State, Status};
//!
//! struct Ruler;
//!
//! impl Charm for Ruler {
//!     fn init(framework: &mut Framework<Self>, _model: &mut Model<'_>) -> anyhow::Result<Self> {
//!         framework.observe(on::START, |_: &mut Ruler, ctx: &mut EventContext<'_>| {
//!             let model = ctx.model();
//!             let message = if model.is_leader() { "I rule" } else { "I am ruled" };
//!             model.set_unit_status(Status::active(message))?;
//!             Ok(())
//!         });
//!         Ok(Ruler)
//!     }
//! }
//!
//! let ctx = Context::<Ruler>::new(CharmSpec::new(CharmMeta::new("ruler")));
//! let before = State::new().with_leader(true);
//! let after = ctx.run(Event::Start, &before).unwrap();
//! assert_eq!(after.unit_status, Status::active("I rule"));
//! assert_eq!(before.unit_status, Status::Unknown);
//! ```
//!
//! # Crate Layout
//!
//! - [`context`]: the harness, id factories and recorded histories
//! - [`charm`]: the [`Charm`] trait, observer registration, [`EventContext`]
//! - [`model`]: the typed model handlers use
//! - [`backend`]: the hook-command and Pebble seams
//! - [`transport`]: their in-memory implementations
//! - [`dispatch`]: the run sequence
//! - [`env`], [`root`]: the hook environment and the charm's directory
//! - [`recorder`], [`config`], [`error`]: histories, settings, failures

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod backend;
pub mod charm;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod manager;
pub mod model;
pub mod recorder;
pub mod root;
pub mod transport;

pub use backend::{
    ExecOptions, ExecProcess, FileInfo, FileType, ModelBackend, NewSecret, PebbleClient,
    SecretInfo, SecretUpdate,
};
pub use charm::{on, Charm, EventContext, Framework, Handler};
pub use config::RuntimeConfig;
pub use context::{Context, ContextBuilder, EventFactory};
pub use env::HookEnvironment;
pub use error::{ErrorKind, ExecError, ModelError, ScenarioError};
pub use manager::Manager;
pub use model::Model;
pub use recorder::{EmittedEvent, EventOrigin, ExecArgs, JujuLogLine, LogLevel, Recorder};
pub use root::VirtualCharmRoot;
pub use scenario_state::{Event, State};
