//! The state model of a Juju unit, as seen by a charm under test.
//!
//! Everything here is a plain value: `Clone` produces an independent deep
//! copy and no component holds a reference to another. The engine in
//! `ops-scenario` takes a [`State`] in and hands a new one back.
//!
//! # Entry Point
//!
//! ```
//! use scenario_state::{Container, Relation, RelationId, State};
//!
//! let state = State::new()
//!     .with_leader(true)
//!     .with_relation(Relation::new(RelationId(1), "db"))
//!     .with_container(Container::new("workload"));
//! assert!(state.get_relation(RelationId(1)).is_ok());
//! assert!(state.get_container("other").is_err());
//! ```
//!
//! Charm metadata ([`CharmSpec`]) and the event vocabulary ([`Event`]) live
//! here too, since both the consistency checker and the engine need them.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod container;
pub mod deferred;
pub mod error;
pub mod event;
pub mod ids;
pub mod meta;
pub mod model_info;
pub mod network;
pub mod relation;
pub mod secret;
pub mod state;
pub mod status;
pub mod storage;
pub mod stored;
pub mod version;

pub use container::{
    Check, CheckInfo, CheckLevel, CheckStatus, Container, Exec, Layer, Mount, Notice, NoticeType,
    Override, Plan, Service, ServiceInfo, ServiceStatus, Startup,
};
pub use deferred::DeferredEvent;
pub use error::{LookupError, MetaError};
pub use event::{
    ActionEvent, CustomEvent, Event, NoticeRef, RelationEvent, RelationEventKind, RestoreError,
    SecretEvent, SecretEventKind, StorageEvent, StorageEventKind, WorkloadEvent,
    WorkloadEventKind,
};
pub use ids::{ActionId, NoticeId, RelationId, SecretId, StorageIndex};
pub use meta::{
    ActionMeta, ActionsSchema, CharmMeta, CharmSpec, ConfigOption, ConfigSchema, ConfigType,
    ContainerMeta, EndpointRole, RelationMeta, RelationScope, ResourceMeta, StorageMeta,
};
pub use model_info::{CloudCredential, CloudSpec, ModelInfo, ModelType};
pub use network::{Address, BindAddress, Network, Port, Protocol};
pub use relation::{
    AnyRelation, Databag, PeerRelation, Relation, RelationKind, SubordinateRelation,
};
pub use secret::{RotatePolicy, Secret, SecretContent, SecretOwner};
pub use state::{ConfigValue, State};
pub use status::Status;
pub use storage::{Resource, Storage};
pub use stored::StoredState;
pub use version::{InvalidVersion, JujuVersion, DEFAULT_JUJU_VERSION};
