//! System identity metric group: host name, uptime, OS version.

use sysinfo::System;

use super::{FieldMap, FieldValue, MetricSource};

pub struct SystemSource;

/// Numeric build component of a kernel/OS version string: the third
/// dot-separated part when it parses as a number.
fn build_number(version: &str) -> Option<i64> {
    version.split('.').nth(2)?.parse().ok()
}

impl MetricSource for SystemSource {
    fn name(&self) -> &'static str {
        "system"
    }

    fn collect(&self) -> Result<FieldMap, String> {
        let mut fields = FieldMap::new();
        fields.insert(
            "hostname".to_string(),
            FieldValue::Text(System::host_name().unwrap_or_else(|| "unknown".to_string())),
        );
        fields.insert(
            "uptime_minutes".to_string(),
            FieldValue::Float((System::uptime() / 60) as f64),
        );

        let version = System::long_os_version()
            .or_else(System::os_version)
            .unwrap_or_else(|| "unknown".to_string());
        fields.insert("version".to_string(), FieldValue::Text(version));

        if let Some(build) = System::kernel_version().as_deref().and_then(build_number) {
            fields.insert("build_number".to_string(), FieldValue::Integer(build));
        }
        Ok(fields)
    }
}
