//! `vigil encrypt` / `vigil decrypt` — offline configuration tooling.
//!
//! Lets an operator prepare an encrypted document on a workstation and ship
//! it to the monitored host, or recover a readable copy for editing.

use std::path::Path;

use vigil_core::bootstrap::validate_password;
use vigil_core::config::ConfigDocument;
use vigil_core::config::cipher::{decrypt_document, encrypt_document};
use vigil_core::keys::derive_key;

pub fn run(file: &Path, output: Option<&Path>, encrypt: bool) {
    let mut doc = match ConfigDocument::load(file) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let Some(password) = super::read_line("Password: ").filter(|p| !p.is_empty()) else {
        eprintln!("Error: a password is required");
        std::process::exit(1);
    };

    if !encrypt && !validate_password(&password, &doc) {
        eprintln!("Error: password does not match this document");
        std::process::exit(1);
    }

    let key = derive_key(&password);
    if encrypt {
        encrypt_document(&mut doc, &key);
    } else {
        decrypt_document(&mut doc, &key);
    }

    let target = output.unwrap_or(file);
    if let Err(e) = doc.save(target) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    println!(
        "Wrote {} document to {}",
        if encrypt { "encrypted" } else { "decrypted" },
        target.display()
    );
}
