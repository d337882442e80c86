//! # vigil-core
//!
//! **A fleet of desks, one dashboard.**
//!
//! `vigil-core` is the library behind the `vigil` monitoring agent: it
//! derives keys from operator passwords, binds cached credentials to a
//! machine fingerprint, reads and partially encrypts the sectioned
//! configuration document, samples host metrics with per-source fault
//! isolation, and publishes flat records to an InfluxDB v2 store.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vigil_core::collect::Sampler;
//! use vigil_core::config::ConfigDocument;
//! use vigil_core::publish::{HostIdentity, Publisher};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = ConfigDocument::load("config.ini")?;
//! let sampler = Sampler::with_default_sources(doc.monitored_paths());
//! let publisher = Publisher::from_config(&doc)?;
//! let identity = HostIdentity::from_config(&doc);
//!
//! let snapshot = sampler.sample();
//! let written = publisher.publish(&snapshot, &identity)?;
//! println!("wrote {written} records");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Password → key → config decryption, then Sources → Snapshot → flatten →
//! line protocol → store, on a fixed tick. A source that fails or panics
//! becomes an error marker in the snapshot; the other sources still report.
//! Only transport-level publish failures surface on the status flag, and
//! they clear on the next successful tick.

pub mod bootstrap;
pub mod collect;
pub mod config;
pub mod control;
pub mod credential;
pub mod error;
pub mod fingerprint;
pub mod keys;
pub mod publish;

pub use bootstrap::{Bootstrap, BootstrapState, DEFAULT_PASSWORD, PasswordSource};
pub use collect::{FieldMap, FieldValue, GroupResult, MetricSource, Sampler, Snapshot};
pub use config::{AnswerSource, ConfigDocument, MissingFields, RequiredAnswers, ensure_required};
pub use control::{AgentStatus, RunState, StatusSink, run_loop};
pub use credential::{CredentialStore, FileCredentialStore, StoredCredential};
pub use error::{AgentError, PublishError};
pub use fingerprint::machine_fingerprint;
pub use keys::{DerivedKey, derive_key};
pub use publish::{HostIdentity, Publisher, TelemetryRecord, flatten};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
