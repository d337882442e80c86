//! Network throughput metric group.
//!
//! Throughput is a rate, so this source is stateful across ticks: it keeps
//! the previous counter totals and their timestamp. The very first
//! invocation in a process lifetime reports zero rather than a spurious
//! spike, and a zero or negative elapsed interval (clock weirdness,
//! back-to-back calls) is treated as zero throughput, never a division
//! error.

use std::sync::Mutex;
use std::time::Instant;

use sysinfo::Networks;

use super::{FieldMap, FieldValue, MetricSource};

/// Counter totals remembered from the previous tick.
struct LastReading {
    at: Instant,
    sent: u64,
    recv: u64,
}

pub struct NetworkSource {
    networks: Mutex<Networks>,
    last: Mutex<Option<LastReading>>,
}

impl NetworkSource {
    pub fn new() -> Self {
        Self {
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            last: Mutex::new(None),
        }
    }
}

impl Default for NetworkSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes per second between two cumulative counter readings. Counter
/// resets (now < prev) and nonpositive intervals both collapse to zero.
fn rate(prev: u64, now: u64, elapsed_secs: f64) -> u64 {
    if elapsed_secs <= 0.0 {
        return 0;
    }
    (now.saturating_sub(prev) as f64 / elapsed_secs) as u64
}

impl MetricSource for NetworkSource {
    fn name(&self) -> &'static str {
        "network"
    }

    fn collect(&self) -> Result<FieldMap, String> {
        let mut networks = self
            .networks
            .lock()
            .map_err(|_| "network state poisoned".to_string())?;
        networks.refresh();

        let now = Instant::now();
        let (sent, recv) = networks.iter().fold((0u64, 0u64), |(s, r), (_, data)| {
            (s + data.total_transmitted(), r + data.total_received())
        });

        let mut last = self
            .last
            .lock()
            .map_err(|_| "network state poisoned".to_string())?;
        let (sent_rate, recv_rate) = match last.as_ref() {
            None => (0, 0),
            Some(prev) => {
                let elapsed = now.duration_since(prev.at).as_secs_f64();
                (
                    rate(prev.sent, sent, elapsed),
                    rate(prev.recv, recv, elapsed),
                )
            }
        };
        *last = Some(LastReading {
            at: now,
            sent,
            recv,
        });

        let mut fields = FieldMap::new();
        fields.insert(
            "bytes_sent".to_string(),
            FieldValue::Integer(sent_rate as i64),
        );
        fields.insert(
            "bytes_recv".to_string(),
            FieldValue::Integer(recv_rate as i64),
        );
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_reports_zero() {
        let source = NetworkSource::new();
        let fields = source.collect().unwrap();
        assert_eq!(fields["bytes_sent"], FieldValue::Integer(0));
        assert_eq!(fields["bytes_recv"], FieldValue::Integer(0));
    }

    #[test]
    fn rate_over_one_second_is_the_delta() {
        assert_eq!(rate(1_000, 3_000, 1.0), 2_000);
    }

    #[test]
    fn rate_scales_with_the_interval() {
        assert_eq!(rate(0, 1_000, 0.5), 2_000);
        assert_eq!(rate(0, 1_000, 2.0), 500);
    }

    #[test]
    fn nonpositive_elapsed_is_zero_not_a_panic() {
        assert_eq!(rate(0, 1_000, 0.0), 0);
        assert_eq!(rate(0, 1_000, -3.0), 0);
    }

    #[test]
    fn counter_reset_is_zero() {
        assert_eq!(rate(5_000, 100, 1.0), 0);
    }

    #[test]
    fn second_call_yields_nonnegative_rates() {
        let source = NetworkSource::new();
        source.collect().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let fields = source.collect().unwrap();
        assert!(matches!(fields["bytes_sent"], FieldValue::Integer(v) if v >= 0));
        assert!(matches!(fields["bytes_recv"], FieldValue::Integer(v) if v >= 0));
    }
}
