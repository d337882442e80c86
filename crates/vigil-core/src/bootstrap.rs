//! Credential bootstrap: resolve the working key at startup.
//!
//! First run: prompt the operator (bounded at three attempts), validate the
//! password against the configuration document, persist the machine-bound
//! credential. Subsequent runs: try the known default password against the
//! document first, then against the stored credential, and only fall back
//! to prompting when both checks fail. Lockout is terminal — the caller
//! must exit with a visible failure, never continue unauthenticated.

use log::{error, info, warn};

use crate::config::ConfigDocument;
use crate::config::cipher::decrypt_field;
use crate::credential::{CredentialStore, credential_for, matches_stored};
use crate::error::AgentError;
use crate::keys::{DerivedKey, derive_key};

/// Password attempt budget before lockout.
pub const MAX_ATTEMPTS: u32 = 3;

/// Default password tried on non-first runs before prompting.
pub const DEFAULT_PASSWORD: &str =
    "e559bb3424a39d56e04456733d960020f4771e7c4eda548fbb793eba97c80ad9";

/// Bootstrap protocol states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    /// Secure store has no initialized credential yet.
    Uninitialized,
    /// Waiting on the operator; `attempts` failed so far.
    AwaitingPassword { attempts: u32 },
    /// A password was accepted; the working key is resolved.
    Verified,
    /// Attempt budget exhausted. Terminal.
    LockedOut,
}

/// Interactive collaborator that asks the operator for a password.
/// `None` means the operator cancelled.
pub trait PasswordSource {
    fn request_password(&mut self, attempt: u32, max_attempts: u32) -> Option<String>;
}

/// Validate a candidate password against the document by probe decryption.
///
/// Derives the key and attempts to open exactly one field of the first
/// non-exempt section; a document with no non-exempt sections accepts any
/// password. The probe is intentionally partial — a corrupted probe field
/// can falsely reject a correct password. Decrypting the full document here
/// would conflate field-level corruption (recoverable) with a wrong
/// password (retryable), so the imprecision is kept and documented.
pub fn validate_password(password: &str, doc: &ConfigDocument) -> bool {
    let key = derive_key(password);
    let probe = doc
        .encryptable_sections()
        .flat_map(|s| s.entries().iter())
        .next();
    match probe {
        None => true,
        Some((_, value)) => decrypt_field(&key, value).is_ok(),
    }
}

/// Drives the bootstrap state machine against a credential store and a
/// password source.
pub struct Bootstrap<'a, S: CredentialStore + ?Sized> {
    store: &'a S,
    fingerprint: String,
    state: BootstrapState,
}

impl<'a, S: CredentialStore + ?Sized> Bootstrap<'a, S> {
    pub fn new(store: &'a S, fingerprint: String) -> Self {
        Self {
            store,
            fingerprint,
            state: BootstrapState::Uninitialized,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Resolve the working key, prompting only when necessary.
    ///
    /// Credential-store I/O failures are fatal and propagate; exhausting the
    /// attempt budget returns [`AgentError::LockedOut`] with the machine in
    /// the terminal [`BootstrapState::LockedOut`] state.
    pub fn resolve(
        &mut self,
        doc: &ConfigDocument,
        prompt: &mut dyn PasswordSource,
    ) -> Result<DerivedKey, AgentError> {
        let stored = self.store.load()?;
        let first_run = !stored.as_ref().is_some_and(|c| c.initialized);

        if first_run {
            self.state = BootstrapState::Uninitialized;
            info!("first run detected, operator password required");
            return self.prompt_and_store(doc, prompt, true);
        }

        // Subsequent run: document probe first, stored credential second.
        if validate_password(DEFAULT_PASSWORD, doc) {
            self.state = BootstrapState::Verified;
            return Ok(derive_key(DEFAULT_PASSWORD));
        }
        if let Some(cred) = &stored
            && matches_stored(DEFAULT_PASSWORD, &self.fingerprint, cred)
        {
            self.state = BootstrapState::Verified;
            return Ok(derive_key(DEFAULT_PASSWORD));
        }

        warn!("cached credential rejected, operator authentication required");
        self.prompt_and_store(doc, prompt, false)
    }

    fn prompt_and_store(
        &mut self,
        doc: &ConfigDocument,
        prompt: &mut dyn PasswordSource,
        first_run: bool,
    ) -> Result<DerivedKey, AgentError> {
        self.state = BootstrapState::AwaitingPassword { attempts: 0 };

        for attempt in 1..=MAX_ATTEMPTS {
            let Some(password) = prompt.request_password(attempt, MAX_ATTEMPTS) else {
                error!("password entry cancelled by operator");
                return Err(AgentError::PasswordCancelled);
            };

            if validate_password(&password, doc) {
                // Persist (or refresh, when the operator changed the
                // password) the machine-bound commitment.
                self.store
                    .store(&credential_for(&password, &self.fingerprint))?;
                self.state = BootstrapState::Verified;
                if first_run {
                    info!("credential configured and stored for this machine");
                }
                return Ok(derive_key(&password));
            }

            self.state = BootstrapState::AwaitingPassword { attempts: attempt };
            warn!("incorrect password (attempt {attempt}/{MAX_ATTEMPTS})");
        }

        self.state = BootstrapState::LockedOut;
        Err(AgentError::LockedOut {
            attempts: MAX_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::config::cipher::encrypt_document;
    use crate::credential::StoredCredential;

    /// In-memory store for driving the machine in tests.
    #[derive(Default)]
    struct MemStore {
        slot: RefCell<Option<StoredCredential>>,
    }

    impl CredentialStore for MemStore {
        fn load(&self) -> Result<Option<StoredCredential>, AgentError> {
            Ok(self.slot.borrow().clone())
        }
        fn store(&self, credential: &StoredCredential) -> Result<(), AgentError> {
            *self.slot.borrow_mut() = Some(credential.clone());
            Ok(())
        }
    }

    /// Scripted password source; panics when consulted past its script.
    struct Scripted(Vec<Option<String>>);

    impl PasswordSource for Scripted {
        fn request_password(&mut self, _attempt: u32, _max: u32) -> Option<String> {
            assert!(!self.0.is_empty(), "password prompt consulted unexpectedly");
            self.0.remove(0)
        }
    }

    fn encrypted_doc(password: &str) -> ConfigDocument {
        let mut doc = ConfigDocument::parse(
            "[general]\nname = t\n\n[influxdb]\nurl = http://x\ntoken = y\n",
        )
        .unwrap();
        encrypt_document(&mut doc, &derive_key(password));
        doc
    }

    #[test]
    fn no_encrypted_sections_accepts_any_password() {
        let doc = ConfigDocument::parse("[general]\nname = t\n").unwrap();
        assert!(validate_password("anything at all", &doc));
    }

    #[test]
    fn probe_accepts_right_and_rejects_wrong() {
        let doc = encrypted_doc("s3cret");
        assert!(validate_password("s3cret", &doc));
        assert!(!validate_password("nope", &doc));
    }

    #[test]
    fn first_run_stores_credential_and_verifies() {
        let store = MemStore::default();
        let mut boot = Bootstrap::new(&store, "fp".to_string());
        let mut prompt = Scripted(vec![Some("s3cret".to_string())]);

        let key = boot.resolve(&encrypted_doc("s3cret"), &mut prompt).unwrap();
        assert_eq!(boot.state(), BootstrapState::Verified);
        assert_eq!(key.as_bytes(), derive_key("s3cret").as_bytes());

        let cred = store.load().unwrap().unwrap();
        assert!(cred.initialized);
        assert!(matches_stored("s3cret", "fp", &cred));
    }

    #[test]
    fn three_failures_lock_out() {
        let store = MemStore::default();
        let mut boot = Bootstrap::new(&store, "fp".to_string());
        let bad = |s: &str| Some(s.to_string());
        let mut prompt = Scripted(vec![bad("a"), bad("b"), bad("c")]);

        let err = boot
            .resolve(&encrypted_doc("s3cret"), &mut prompt)
            .unwrap_err();
        assert!(matches!(err, AgentError::LockedOut { attempts: 3 }));
        assert_eq!(boot.state(), BootstrapState::LockedOut);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn second_attempt_can_succeed() {
        let store = MemStore::default();
        let mut boot = Bootstrap::new(&store, "fp".to_string());
        let mut prompt = Scripted(vec![Some("wrong".to_string()), Some("s3cret".to_string())]);

        boot.resolve(&encrypted_doc("s3cret"), &mut prompt).unwrap();
        assert_eq!(boot.state(), BootstrapState::Verified);
    }

    #[test]
    fn cancelled_prompt_is_fatal() {
        let store = MemStore::default();
        let mut boot = Bootstrap::new(&store, "fp".to_string());
        let mut prompt = Scripted(vec![None]);

        let err = boot
            .resolve(&encrypted_doc("s3cret"), &mut prompt)
            .unwrap_err();
        assert!(matches!(err, AgentError::PasswordCancelled));
    }

    #[test]
    fn subsequent_run_skips_prompt_on_default_password() {
        let store = MemStore::default();
        store
            .store(&credential_for("something-else", "fp"))
            .unwrap();

        let mut boot = Bootstrap::new(&store, "fp".to_string());
        // Document encrypted with the default password: probe succeeds, the
        // prompt must never be consulted.
        let mut prompt = Scripted(vec![]);
        let key = boot
            .resolve(&encrypted_doc(DEFAULT_PASSWORD), &mut prompt)
            .unwrap();
        assert_eq!(boot.state(), BootstrapState::Verified);
        assert_eq!(key.as_bytes(), derive_key(DEFAULT_PASSWORD).as_bytes());
    }

    #[test]
    fn subsequent_run_falls_back_to_stored_credential() {
        let store = MemStore::default();
        store
            .store(&credential_for(DEFAULT_PASSWORD, "fp"))
            .unwrap();

        let mut boot = Bootstrap::new(&store, "fp".to_string());
        // Document rejects the default password, but the stored token
        // matches it: still no prompt.
        let mut prompt = Scripted(vec![]);
        let key = boot.resolve(&encrypted_doc("other"), &mut prompt).unwrap();
        assert_eq!(boot.state(), BootstrapState::Verified);
        assert_eq!(key.as_bytes(), derive_key(DEFAULT_PASSWORD).as_bytes());
    }

    #[test]
    fn subsequent_run_reprompts_when_both_checks_fail() {
        let store = MemStore::default();
        store.store(&credential_for("old", "fp")).unwrap();

        let mut boot = Bootstrap::new(&store, "fp".to_string());
        let mut prompt = Scripted(vec![Some("new".to_string())]);
        boot.resolve(&encrypted_doc("new"), &mut prompt).unwrap();
        assert_eq!(boot.state(), BootstrapState::Verified);

        // The freshly supplied password was re-stored.
        let cred = store.load().unwrap().unwrap();
        assert!(matches_stored("new", "fp", &cred));
    }
}
