//! RAM metric group: total, free, and used percentage.

use std::sync::Mutex;

use sysinfo::System;

use super::{FieldMap, FieldValue, MetricSource};

pub struct MemorySource {
    sys: Mutex<System>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn collect(&self) -> Result<FieldMap, String> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|_| "memory state poisoned".to_string())?;
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            return Err("total memory reported as zero".to_string());
        }
        let used = sys.used_memory();

        let mut fields = FieldMap::new();
        fields.insert("memory_total".to_string(), FieldValue::Integer(total as i64));
        fields.insert(
            "memory_free".to_string(),
            FieldValue::Integer(sys.free_memory() as i64),
        );
        fields.insert(
            "memory_percent".to_string(),
            FieldValue::Float(used as f64 / total as f64 * 100.0),
        );
        Ok(fields)
    }
}
