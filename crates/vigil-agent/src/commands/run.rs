//! `vigil run` — the resident agent.
//!
//! Startup order matters: first-run setup writes back missing identity
//! fields, credential bootstrap resolves the working key (prompting only
//! when the cached credential does not match this machine), the document is
//! decrypted in memory, and only then does the scheduling loop start. The
//! console stays interactive while the loop runs on its own thread.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use vigil_core::bootstrap::Bootstrap;
use vigil_core::collect::Sampler;
use vigil_core::config::cipher::decrypt_document;
use vigil_core::config::{self, ConfigDocument};
use vigil_core::control::{self, AgentStatus, RunState, StatusSink};
use vigil_core::credential::FileCredentialStore;
use vigil_core::fingerprint::machine_fingerprint;
use vigil_core::publish::{HostIdentity, Publisher};

fn status_label(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Running => "running",
        AgentStatus::Paused => "paused",
        AgentStatus::Error => "error (will retry)",
    }
}

struct ConsoleStatus;

impl StatusSink for ConsoleStatus {
    fn status_changed(&self, status: AgentStatus) {
        println!("vigil status: {}", status_label(status));
    }
}

pub fn run(config_path: &Path, interval_override: Option<u64>) {
    let mut doc = match ConfigDocument::load(config_path) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // First-run setup: collect identity fields the document lacks and
    // persist them before anything else happens.
    let mut console = super::Console;
    if config::ensure_required(&mut doc, &mut console) {
        if let Err(e) = doc.save(config_path) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        info!("configuration updated with first-run answers");
    }

    let store = match FileCredentialStore::open_default() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let mut bootstrap = Bootstrap::new(&store, machine_fingerprint());
    let key = match bootstrap.resolve(&doc, &mut console) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    decrypt_document(&mut doc, &key);

    let publisher = match Publisher::from_config(&doc) {
        Ok(publisher) => publisher,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let identity = HostIdentity::from_config(&doc);
    let sampler = Sampler::with_default_sources(doc.monitored_paths());
    let interval = Duration::from_secs(interval_override.unwrap_or_else(|| doc.interval_secs()));

    let state = Arc::new(RunState::new());

    let ctrlc_state = state.clone();
    if let Err(e) = ctrlc::set_handler(move || ctrlc_state.request_shutdown()) {
        warn!("could not install Ctrl-C handler: {e}");
    }

    // Console command reader. Deliberately not joined: a read blocked on
    // stdin ends with the process.
    let command_state = state.clone();
    std::thread::spawn(move || {
        while let Some(cmd) = super::read_line("") {
            match cmd.as_str() {
                "pause" | "resume" | "toggle" => {
                    let running = command_state.toggle();
                    println!(
                        "vigil is now {}",
                        if running { "running" } else { "paused" }
                    );
                }
                "status" => println!("vigil status: {}", status_label(command_state.status())),
                "quit" | "exit" => {
                    command_state.request_shutdown();
                    break;
                }
                "" => {}
                other => println!("unknown command '{other}' (pause, status, quit)"),
            }
        }
    });

    println!(
        "vigil {} started, interval {}s (commands: pause, status, quit)",
        vigil_core::VERSION,
        interval.as_secs()
    );
    control::run_loop(&sampler, &publisher, &identity, &state, &ConsoleStatus, interval);
    println!("vigil stopped");
}
