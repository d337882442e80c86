//! `vigil sample` — one snapshot as JSON, for smoke tests and cron checks.
//!
//! Uses only plaintext configuration sections (the monitored-path list), so
//! it never asks for a password and works against an encrypted document.

use std::path::Path;

use log::warn;
use vigil_core::collect::Sampler;
use vigil_core::config::ConfigDocument;

pub fn run(config_path: &Path) {
    let paths = match ConfigDocument::load(config_path) {
        Ok(doc) => doc.monitored_paths(),
        Err(e) => {
            warn!("configuration unavailable ({e}), using platform default paths");
            ConfigDocument::new().monitored_paths()
        }
    };

    let sampler = Sampler::with_default_sources(paths);
    let snapshot = sampler.sample();
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
