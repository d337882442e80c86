//! Sectioned configuration document: codec, storage, required fields.
//!
//! The on-disk shape is a plain sectioned key=value text file. A fixed set
//! of sections ([`PLAINTEXT_SECTIONS`]) is always stored in the clear:
//! `general` (machine name, company, tick interval), `disk` (the monitored
//! path list as a compact JSON array) and `auth`. Every other section is a
//! candidate for per-field encryption, handled in [`cipher`].
//!
//! Required-field handling is two-phase so the logic stays testable without
//! an interactive surface: [`missing_required`] is a pure query,
//! [`apply_required`] a pure mutation, and [`ensure_required`] composes the
//! two over an [`AnswerSource`] collaborator.

pub mod cipher;

use std::fs;
use std::path::Path;

use crate::error::AgentError;

/// Sections that are never encrypted.
pub const PLAINTEXT_SECTIONS: &[&str] = &["general", "disk", "auth"];

/// Section holding plaintext identity fields.
pub const GENERAL_SECTION: &str = "general";
/// Section holding the monitored-path list.
pub const DISK_SECTION: &str = "disk";

const NAME_KEY: &str = "name";
const COMPANY_KEY: &str = "company";
const PATHS_KEY: &str = "paths";

/// One named section: an unordered string→string mapping. Entry order is
/// preserved only so a decrypt/encrypt cycle round-trips the file verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    /// Section name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key/value pairs in file order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: String) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    fn set_each<F>(&mut self, mut f: F)
    where
        F: FnMut(&str, &str) -> Option<String>,
    {
        for (key, value) in &mut self.entries {
            if let Some(replacement) = f(key, value) {
                *value = replacement;
            }
        }
    }
}

/// An ordered set of named sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    sections: Vec<Section>,
}

impl ConfigDocument {
    /// Empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a sectioned key=value document.
    ///
    /// Blank lines and `;`/`#` comment lines are skipped. A key outside any
    /// section or a non-comment line without `=` is a parse error — storage
    /// level problems are fatal by policy, not patched over.
    pub fn parse(text: &str) -> Result<Self, AgentError> {
        let mut doc = Self::new();
        let mut current: Option<usize> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                doc.sections.push(Section::new(name.trim()));
                current = Some(doc.sections.len() - 1);
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(AgentError::ConfigParse {
                    line: idx + 1,
                    message: format!("expected `key = value`, got {line:?}"),
                });
            };
            let Some(section) = current else {
                return Err(AgentError::ConfigParse {
                    line: idx + 1,
                    message: "key/value pair before any [section] header".to_string(),
                });
            };
            doc.sections[section].set(key.trim(), value.trim().to_string());
        }
        Ok(doc)
    }

    /// Render back to the on-disk text shape.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            for (key, value) in &section.entries {
                out.push_str(key);
                out.push_str(" = ");
                out.push_str(value);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    /// Read and parse a document from disk. I/O failure is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| AgentError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Write the document to disk. I/O failure is fatal.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AgentError> {
        let path = path.as_ref();
        fs::write(path, self.render()).map_err(|source| AgentError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })
    }

    /// All sections in file order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Look up one value.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == section)
            .and_then(|s| s.get(key))
    }

    /// Set one value, creating the section if needed.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        let idx = match self.sections.iter().position(|s| s.name == section) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section::new(section));
                self.sections.len() - 1
            }
        };
        self.sections[idx].set(key, value.to_string());
    }

    /// Sections that are candidates for encryption, i.e. everything not in
    /// [`PLAINTEXT_SECTIONS`].
    pub fn encryptable_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections
            .iter()
            .filter(|s| !PLAINTEXT_SECTIONS.contains(&s.name.as_str()))
    }

    fn encryptable_sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.sections
            .iter_mut()
            .filter(|s| !PLAINTEXT_SECTIONS.contains(&s.name.as_str()))
    }

    /// Fetch a required value or fail with a [`AgentError::MissingField`].
    pub fn require(&self, section: &str, key: &str) -> Result<&str, AgentError> {
        self.get(section, key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AgentError::MissingField {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Configured machine name, if any.
    pub fn machine_name(&self) -> Option<&str> {
        self.get(GENERAL_SECTION, NAME_KEY).filter(|v| !v.is_empty())
    }

    /// Configured company tag, if any.
    pub fn company(&self) -> Option<&str> {
        self.get(GENERAL_SECTION, COMPANY_KEY)
            .filter(|v| !v.is_empty())
    }

    /// Monitored path list, decoded from the compact JSON array in the
    /// `disk` section. Falls back to the platform root when unset.
    pub fn monitored_paths(&self) -> Vec<String> {
        self.get(DISK_SECTION, PATHS_KEY)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .filter(|paths| !paths.is_empty())
            .unwrap_or_else(default_paths)
    }

    /// Sampling interval in seconds (`[general] interval_secs`), default 10.
    pub fn interval_secs(&self) -> u64 {
        self.get(GENERAL_SECTION, "interval_secs")
            .and_then(|v| v.parse().ok())
            .unwrap_or(10)
    }
}

fn default_paths() -> Vec<String> {
    if cfg!(windows) {
        vec!["C:\\".to_string()]
    } else {
        vec!["/".to_string()]
    }
}

// ---------------------------------------------------------------------------
// Required fields, two-phase
// ---------------------------------------------------------------------------

/// Which of the required plaintext fields are absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingFields {
    pub name: bool,
    pub company: bool,
    pub disk_paths: bool,
}

impl MissingFields {
    /// True when nothing is missing.
    pub fn is_empty(&self) -> bool {
        !(self.name || self.company || self.disk_paths)
    }
}

/// Pure query: which required fields does the document lack?
pub fn missing_required(doc: &ConfigDocument) -> MissingFields {
    MissingFields {
        name: doc.machine_name().is_none(),
        company: doc.company().is_none(),
        disk_paths: doc
            .get(DISK_SECTION, PATHS_KEY)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .is_none(),
    }
}

/// Answers collected for the missing fields. `None` leaves a field as-is.
#[derive(Debug, Clone, Default)]
pub struct RequiredAnswers {
    pub name: Option<String>,
    pub company: Option<String>,
    pub disk_paths: Option<Vec<String>>,
}

/// Pure mutation: write collected answers into the plaintext sections.
pub fn apply_required(doc: &mut ConfigDocument, answers: &RequiredAnswers) {
    if let Some(name) = &answers.name {
        doc.set(GENERAL_SECTION, NAME_KEY, name);
    }
    if let Some(company) = &answers.company {
        doc.set(GENERAL_SECTION, COMPANY_KEY, company);
    }
    if let Some(paths) = &answers.disk_paths {
        let encoded = serde_json::to_string(paths).unwrap_or_else(|_| "[]".to_string());
        doc.set(DISK_SECTION, PATHS_KEY, &encoded);
    }
}

/// Interactive collaborator that supplies the missing required fields.
/// The only interactive I/O in the whole configuration path goes through
/// this trait.
pub trait AnswerSource {
    fn machine_name(&mut self) -> Option<String>;
    fn company(&mut self) -> Option<String>;
    fn disk_paths(&mut self) -> Option<Vec<String>>;
}

/// Guarantee that machine name, company and at least one monitored path are
/// present, soliciting absent ones from `answers`. Returns whether the
/// document changed (the caller persists it then). Idempotent: with nothing
/// missing this is a no-op and `answers` is never consulted.
pub fn ensure_required(doc: &mut ConfigDocument, answers: &mut dyn AnswerSource) -> bool {
    let missing = missing_required(doc);
    if missing.is_empty() {
        return false;
    }
    let collected = RequiredAnswers {
        name: missing.name.then(|| answers.machine_name()).flatten(),
        company: missing.company.then(|| answers.company()).flatten(),
        disk_paths: missing.disk_paths.then(|| answers.disk_paths()).flatten(),
    };
    let changed = collected.name.is_some()
        || collected.company.is_some()
        || collected.disk_paths.is_some();
    apply_required(doc, &collected);
    changed
}
