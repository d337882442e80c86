//! Metric sampling: sources, snapshots, and the fault-isolating sampler.
//!
//! Every metric group implements the [`MetricSource`] trait. The
//! [`Sampler`] invokes each registered source once per tick and assembles a
//! timestamped [`Snapshot`]. Failure isolation is the whole point: a source
//! that errors (or panics) becomes an `{error: …}` group in the snapshot
//! and never aborts the tick or disturbs its siblings.

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod network;
pub mod remote_access;
pub mod system;
pub mod updates;

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use chrono::{DateTime, Utc};
use log::error;
use serde::Serialize;

pub use cpu::CpuSource;
pub use disk::DiskSource;
pub use memory::MemorySource;
pub use network::NetworkSource;
pub use remote_access::RemoteAccessSource;
pub use system::SystemSource;
pub use updates::UpdateSource;

/// One scalar metric value. Only numerics and strings exist — the
/// publisher can forward every variant unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Named fields of one metric group.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Outcome of collecting one group: either its fields or an error marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupResult {
    Fields(FieldMap),
    Error { error: String },
}

impl GroupResult {
    /// Fields when the group collected successfully.
    pub fn fields(&self) -> Option<&FieldMap> {
        match self {
            Self::Fields(map) => Some(map),
            Self::Error { .. } => None,
        }
    }
}

/// A metric-group provider. Implementations are interchangeable as far as
/// the sampler is concerned; any failure is reported through the `Err`
/// string and isolated by the caller.
pub trait MetricSource: Send + Sync {
    /// Group name, used as the snapshot key and the `metric` tag.
    fn name(&self) -> &'static str;

    /// Collect the current values of this group.
    fn collect(&self) -> Result<FieldMap, String>;
}

/// One timestamped collection of all metric groups. Immutable after
/// creation; consumed by the publisher and then discarded.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Sampling instant, UTC.
    pub timestamp: DateTime<Utc>,
    /// Group name → collected fields or error marker.
    pub groups: BTreeMap<String, GroupResult>,
}

/// Invokes every registered source and assembles snapshots.
pub struct Sampler {
    sources: Vec<Box<dyn MetricSource>>,
}

impl Sampler {
    /// Sampler over an explicit source list.
    pub fn new(sources: Vec<Box<dyn MetricSource>>) -> Self {
        Self { sources }
    }

    /// The full default source set; `paths` are the monitored disk paths
    /// from the configuration document.
    pub fn with_default_sources(paths: Vec<String>) -> Self {
        Self::new(vec![
            Box::new(SystemSource),
            Box::new(CpuSource::new()),
            Box::new(MemorySource::new()),
            Box::new(DiskSource::new(paths)),
            Box::new(UpdateSource),
            Box::new(NetworkSource::new()),
            Box::new(RemoteAccessSource::default()),
        ])
    }

    /// Registered source count.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Take one snapshot. Per-source failures (including panics) are
    /// converted into error groups; the call itself cannot fail.
    pub fn sample(&self) -> Snapshot {
        let timestamp = Utc::now();
        let mut groups = BTreeMap::new();

        for source in &self.sources {
            let name = source.name();
            let result = match catch_unwind(AssertUnwindSafe(|| source.collect())) {
                Ok(Ok(fields)) => GroupResult::Fields(fields),
                Ok(Err(message)) => GroupResult::Error { error: message },
                Err(_) => GroupResult::Error {
                    error: format!("source {name} panicked"),
                },
            };
            if let GroupResult::Error { error } = &result {
                error!("metric source {name} failed: {error}");
            }
            groups.insert(name.to_string(), result);
        }

        Snapshot { timestamp, groups }
    }
}
