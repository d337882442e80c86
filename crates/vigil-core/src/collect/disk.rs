//! Disk metric group: combined usage over the monitored paths.
//!
//! The monitored-path list comes from the `disk` section of the
//! configuration document. Each path is resolved to the mounted filesystem
//! holding it; paths that match no mount are skipped with a warning, and
//! the group only errors when not a single path resolves.

use std::path::{Path, PathBuf};

use log::warn;
use sysinfo::Disks;

use super::{FieldMap, FieldValue, MetricSource};

pub struct DiskSource {
    paths: Vec<PathBuf>,
}

impl DiskSource {
    pub fn new(paths: Vec<String>) -> Self {
        Self {
            paths: paths.into_iter().map(PathBuf::from).collect(),
        }
    }
}

/// Combine `(total, free)` byte pairs into `(total, free, used_percent)`.
/// `None` when there is nothing to aggregate.
fn aggregate(usages: &[(u64, u64)]) -> Option<(u64, u64, f64)> {
    if usages.is_empty() {
        return None;
    }
    let total: u64 = usages.iter().map(|(t, _)| t).sum();
    let free: u64 = usages.iter().map(|(_, f)| f).sum();
    if total == 0 {
        return None;
    }
    let percent = (total - free) as f64 / total as f64 * 100.0;
    Some((total, free, percent))
}

/// Find the mounted filesystem holding `path`: the longest mount point that
/// is a prefix of it.
fn usage_for(disks: &Disks, path: &Path) -> Option<(u64, u64)> {
    disks
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().components().count())
        .map(|d| (d.total_space(), d.available_space()))
}

impl MetricSource for DiskSource {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn collect(&self) -> Result<FieldMap, String> {
        let disks = Disks::new_with_refreshed_list();

        let mut usages = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            match usage_for(&disks, path) {
                Some(usage) => usages.push(usage),
                None => warn!("monitored path {} matches no mounted disk", path.display()),
            }
        }

        let (total, free, percent) =
            aggregate(&usages).ok_or_else(|| "no valid monitored disk found".to_string())?;

        let mut fields = FieldMap::new();
        fields.insert("disk_total".to_string(), FieldValue::Integer(total as i64));
        fields.insert("disk_free".to_string(), FieldValue::Integer(free as i64));
        fields.insert("disk_percent".to_string(), FieldValue::Float(percent));
        Ok(fields)
    }
}
