//! Remote-access tool identifier metric group.
//!
//! Reads the AnyDesk client id from its system configuration file so fleet
//! operators can reach a machine straight from the dashboard. A host
//! without AnyDesk reports the `none` marker; that is not an error.

use std::path::PathBuf;

use super::{FieldMap, FieldValue, MetricSource};

pub struct RemoteAccessSource {
    conf_path: PathBuf,
}

impl RemoteAccessSource {
    pub fn new(conf_path: impl Into<PathBuf>) -> Self {
        Self {
            conf_path: conf_path.into(),
        }
    }
}

impl Default for RemoteAccessSource {
    fn default() -> Self {
        let path = if cfg!(windows) {
            r"C:\ProgramData\AnyDesk\system.conf"
        } else {
            "/etc/anydesk/system.conf"
        };
        Self::new(path)
    }
}

/// Extract the numeric `ad.anynet.id` value from a system.conf body.
fn parse_anynet_id(text: &str) -> Option<i64> {
    text.lines()
        .find(|l| l.starts_with("ad.anynet.id"))?
        .split('=')
        .nth(1)?
        .trim()
        .parse()
        .ok()
}

impl MetricSource for RemoteAccessSource {
    fn name(&self) -> &'static str {
        "anydesk"
    }

    fn collect(&self) -> Result<FieldMap, String> {
        let id = std::fs::read_to_string(&self.conf_path)
            .ok()
            .as_deref()
            .and_then(parse_anynet_id);

        let mut fields = FieldMap::new();
        fields.insert(
            "anydesk_id".to_string(),
            match id {
                Some(id) => FieldValue::Integer(id),
                None => FieldValue::Text("none".to_string()),
            },
        );
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_the_id_line() {
        let conf = "ad.ui.lang=en\nad.anynet.id=123456789\nad.anynet.alias=\n";
        assert_eq!(parse_anynet_id(conf), Some(123_456_789));
    }

    #[test]
    fn missing_or_malformed_id_is_none() {
        assert_eq!(parse_anynet_id(""), None);
        assert_eq!(parse_anynet_id("ad.anynet.id=not-a-number\n"), None);
        assert_eq!(parse_anynet_id("ad.ui.lang=en\n"), None);
    }

    #[test]
    fn missing_file_reports_none_marker() {
        let source = RemoteAccessSource::new("/nonexistent/anydesk/system.conf");
        let fields = source.collect().unwrap();
        assert_eq!(fields["anydesk_id"], FieldValue::Text("none".to_string()));
    }

    #[test]
    fn present_file_reports_the_id() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ad.anynet.id=987654321").unwrap();
        let source = RemoteAccessSource::new(file.path());
        let fields = source.collect().unwrap();
        assert_eq!(fields["anydesk_id"], FieldValue::Integer(987_654_321));
    }
}
