//! Error taxonomy for the agent core.
//!
//! Only two families exist: fatal conditions that must terminate the process
//! ([`AgentError`] — configuration/credential storage I/O, unparseable
//! documents, authentication lockout) and transient transmission failures
//! ([`PublishError`]) that the scheduling loop absorbs and retries on the
//! next tick. Field-level cryptographic failures and per-source collection
//! failures never become errors at all; they are logged where they happen.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal agent errors. Anything of this type reaching `main` terminates the
/// process with an operator-visible message.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Reading or writing the configuration document failed.
    #[error("configuration file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not a well-formed sectioned key=value
    /// file.
    #[error("configuration parse error at line {line}: {message}")]
    ConfigParse { line: usize, message: String },

    /// A field required to build a component is absent from the document.
    #[error("configuration field missing: [{section}] {key}")]
    MissingField { section: String, key: String },

    /// Reading or writing the machine-local credential store failed.
    #[error("credential store {path}: {source}")]
    CredentialIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential store holds data that cannot be decoded.
    #[error("credential store {path} is corrupt: {message}")]
    CredentialCorrupt { path: PathBuf, message: String },

    /// No usable location exists for the credential store on this host.
    #[error("no machine-local data directory available for the credential store")]
    NoCredentialDir,

    /// The operator exhausted the password attempt budget.
    #[error("authentication failed after {attempts} attempts")]
    LockedOut { attempts: u32 },

    /// The operator declined to supply a password.
    #[error("password entry cancelled; a password is required to start the agent")]
    PasswordCancelled,

    /// The HTTP client for the telemetry store could not be constructed.
    #[error("telemetry client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Transient telemetry transmission failure. Reported to the scheduling
/// loop, reflected on the status surface, and retried naturally on the next
/// tick — never fatal.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The write request could not be sent or the response not read.
    #[error("telemetry write request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("telemetry write rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}
