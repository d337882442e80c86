//! Telemetry record flattening and time-series store transport.
//!
//! A [`Snapshot`] is a tree keyed by group; the store wants flat points.
//! [`flatten`] turns each scalar field into one [`TelemetryRecord`] under
//! the fixed `pc` measurement, tagged with host, company and metric group.
//! [`Publisher`] encodes a batch as line protocol and posts it to an
//! InfluxDB v2 write endpoint. Error groups are skipped, never sent.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::collect::{FieldValue, Snapshot};
use crate::config::ConfigDocument;
use crate::error::{AgentError, PublishError};

/// Measurement name shared by every record the agent emits.
pub const MEASUREMENT: &str = "pc";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity tags attached to every record from this host.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    /// Operator-assigned machine name from the configuration, if any.
    pub configured_name: Option<String>,
    pub company: String,
}

impl HostIdentity {
    pub fn from_config(doc: &ConfigDocument) -> Self {
        Self {
            configured_name: doc.machine_name().map(str::to_string),
            company: doc.company().unwrap_or("unknown").to_string(),
        }
    }
}

/// One flat point: measurement, three tags, one scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub host: String,
    pub company: String,
    pub metric: String,
    pub field: String,
    pub value: FieldValue,
}

/// Flatten a snapshot into records. The host tag prefers the configured
/// machine name, then the sampled hostname, then `unknown`. Groups that
/// failed to collect produce no records.
pub fn flatten(snapshot: &Snapshot, identity: &HostIdentity) -> Vec<TelemetryRecord> {
    let host = identity
        .configured_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| sampled_hostname(snapshot));

    let mut records = Vec::new();
    for (group, result) in &snapshot.groups {
        let Some(fields) = result.fields() else {
            continue;
        };
        for (field, value) in fields {
            // NaN/infinity have no line-protocol representation and would
            // poison the whole batch.
            if let FieldValue::Float(v) = value
                && !v.is_finite()
            {
                continue;
            }
            records.push(TelemetryRecord {
                host: host.clone(),
                company: identity.company.clone(),
                metric: group.clone(),
                field: field.clone(),
                value: value.clone(),
            });
        }
    }
    records
}

fn sampled_hostname(snapshot: &Snapshot) -> String {
    snapshot
        .groups
        .get("system")
        .and_then(|r| r.fields())
        .and_then(|f| f.get("hostname"))
        .and_then(|v| match v {
            FieldValue::Text(name) => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_else(|| "unknown".to_string())
}

// --- line protocol ---------------------------------------------------------

/// Escape a measurement or tag value: commas, spaces and equals signs are
/// significant in line protocol.
fn escape_tag(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace(',', r"\,")
        .replace('=', r"\=")
        .replace(' ', r"\ ")
}

fn escape_field_text(value: &str) -> String {
    value.replace('\\', r"\\").replace('"', r#"\""#)
}

fn field_literal(value: &FieldValue) -> String {
    match value {
        FieldValue::Integer(v) => format!("{v}i"),
        FieldValue::Float(v) => format!("{v}"),
        FieldValue::Text(v) => format!("\"{}\"", escape_field_text(v)),
    }
}

/// One line-protocol line with a nanosecond timestamp.
fn encode_line(record: &TelemetryRecord, timestamp_nanos: i64) -> String {
    format!(
        "{},host={},company={},metric={} {}={} {}",
        MEASUREMENT,
        escape_tag(&record.host),
        escape_tag(&record.company),
        escape_tag(&record.metric),
        escape_tag(&record.field),
        field_literal(&record.value),
        timestamp_nanos,
    )
}

fn encode_batch(records: &[TelemetryRecord], timestamp_nanos: i64) -> String {
    records
        .iter()
        .map(|r| encode_line(r, timestamp_nanos))
        .collect::<Vec<_>>()
        .join("\n")
}

// --- transport -------------------------------------------------------------

/// Blocking client for an InfluxDB v2 write endpoint.
pub struct Publisher {
    client: Client,
    write_url: String,
    token: String,
}

impl Publisher {
    pub fn new(url: &str, token: &str, org: &str, bucket: &str) -> Result<Self, AgentError> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            write_url: format!(
                "{}/api/v2/write?org={org}&bucket={bucket}&precision=ns",
                url.trim_end_matches('/'),
            ),
            token: token.to_string(),
        })
    }

    /// Build a publisher from the `[influxdb]` configuration section. All
    /// four fields are required.
    pub fn from_config(doc: &ConfigDocument) -> Result<Self, AgentError> {
        Self::new(
            doc.require("influxdb", "url")?,
            doc.require("influxdb", "token")?,
            doc.require("influxdb", "org")?,
            doc.require("influxdb", "bucket")?,
        )
    }

    /// Send one snapshot. Returns the number of records written. A snapshot
    /// with no successful groups is a no-op, not a request.
    pub fn publish(
        &self,
        snapshot: &Snapshot,
        identity: &HostIdentity,
    ) -> Result<usize, PublishError> {
        let records = flatten(snapshot, identity);
        if records.is_empty() {
            return Ok(0);
        }

        let nanos = snapshot.timestamp.timestamp_nanos_opt().unwrap_or_default();
        let body = encode_batch(&records, nanos);
        let response = self
            .client
            .post(&self.write_url)
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(records.len())
    }
}
