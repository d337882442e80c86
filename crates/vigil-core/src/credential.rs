//! Machine-local stored credential.
//!
//! After the first successful bootstrap the agent persists a one-way
//! commitment to the operator password so later boots can self-authenticate
//! without prompting. The commitment is
//! `PBKDF2-HMAC-SHA256(password, salt = SHA256(fingerprint), 100_000)` —
//! bound to the physical machine through the fingerprint salt and useless
//! for recovering the password itself.
//!
//! The store is an external collaborator behind [`CredentialStore`]; the
//! shipped implementation is a namespaced JSON file under the OS-local data
//! directory, readable only with host privileges on the account.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AgentError;

/// PBKDF2 iteration count for the stored commitment.
pub const PBKDF2_ROUNDS: u32 = 100_000;

/// Namespace directory under the machine-local data dir.
const STORE_NAMESPACE: &str = "vigil";
const STORE_FILE: &str = "credential.json";

/// Persisted credential: the auth token commitment plus the initialized
/// marker that distinguishes first runs from subsequent ones. Never deleted
/// by normal operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCredential {
    /// Base64 of the PBKDF2 output.
    pub auth_token: String,
    /// Set once the first bootstrap succeeded.
    pub initialized: bool,
}

/// Compute the raw auth token for a password on this machine.
pub fn compute_auth_token(password: &str, fingerprint: &str) -> [u8; 32] {
    let salt: [u8; 32] = Sha256::digest(fingerprint.as_bytes()).into();
    let mut token = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ROUNDS, &mut token);
    token
}

/// Build the credential record for a freshly verified password.
pub fn credential_for(password: &str, fingerprint: &str) -> StoredCredential {
    StoredCredential {
        auth_token: BASE64.encode(compute_auth_token(password, fingerprint)),
        initialized: true,
    }
}

/// Check a candidate password against a stored credential.
pub fn matches_stored(password: &str, fingerprint: &str, stored: &StoredCredential) -> bool {
    let Ok(expected) = BASE64.decode(&stored.auth_token) else {
        return false;
    };
    expected.as_slice() == compute_auth_token(password, fingerprint)
}

/// Machine-scoped, namespaced credential persistence.
pub trait CredentialStore {
    /// Read the stored credential, `None` when nothing was ever persisted.
    fn load(&self) -> Result<Option<StoredCredential>, AgentError>;

    /// Persist (create or overwrite) the credential.
    fn store(&self, credential: &StoredCredential) -> Result<(), AgentError>;
}

/// JSON-file credential store under the OS-local data directory.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store at the conventional machine-local location
    /// (`<data_local_dir>/vigil/credential.json`).
    pub fn open_default() -> Result<Self, AgentError> {
        let base = dirs::data_local_dir().ok_or(AgentError::NoCredentialDir)?;
        Ok(Self {
            path: base.join(STORE_NAMESPACE).join(STORE_FILE),
        })
    }

    /// Store at an explicit path (tests, non-standard deployments).
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Where this store persists its record.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<StoredCredential>, AgentError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AgentError::CredentialIo {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AgentError::CredentialCorrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    fn store(&self, credential: &StoredCredential) -> Result<(), AgentError> {
        let io_err = |source| AgentError::CredentialIo {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let encoded = serde_json::to_string_pretty(credential).map_err(|e| {
            AgentError::CredentialCorrupt {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })?;
        fs::write(&self.path, encoded).map_err(io_err)
    }
}
