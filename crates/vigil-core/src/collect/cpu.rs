//! CPU load metric group.

use std::sync::Mutex;

use sysinfo::System;

use super::{FieldMap, FieldValue, MetricSource};

/// Global CPU utilisation. Keeps its own [`System`] handle because usage is
/// computed as a delta between two refreshes.
pub struct CpuSource {
    sys: Mutex<System>,
}

impl CpuSource {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }
}

impl Default for CpuSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for CpuSource {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn collect(&self) -> Result<FieldMap, String> {
        let mut sys = self.sys.lock().map_err(|_| "cpu state poisoned".to_string())?;
        sys.refresh_cpu_usage();
        // Two refreshes separated by the minimum interval give a usable
        // utilisation delta even on the very first tick.
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();

        let mut fields = FieldMap::new();
        fields.insert(
            "cpu_percent".to_string(),
            FieldValue::Float(f64::from(sys.global_cpu_usage())),
        );
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_a_percentage() {
        let source = CpuSource::new();
        let fields = source.collect().unwrap();
        match fields["cpu_percent"] {
            FieldValue::Float(pct) => assert!((0.0..=100.0).contains(&pct)),
            ref other => panic!("unexpected field value: {other:?}"),
        }
    }
}
