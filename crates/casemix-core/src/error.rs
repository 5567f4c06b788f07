use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CasemixError {
    // ── Table loading ────────────────────────────────────────────────────────
    #[error("malformed table file '{path}': {reason}")]
    InvalidTable { path: String, reason: String },

    #[error("unsupported table version {major}.{minor:02} in '{path}' (need >= 11.10)")]
    UnsupportedVersion { path: String, major: u16, minor: u16 },

    #[error("malformed price file '{path}': {reason}")]
    InvalidPriceFile { path: String, reason: String },

    #[error("malformed authorization file '{path}': {reason}")]
    InvalidAuthorizationFile { path: String, reason: String },

    #[error("no table index covers {0}")]
    NoIndexAtDate(NaiveDate),

    #[error("no table index available")]
    NoIndex,

    // ── Stay loading ─────────────────────────────────────────────────────────
    #[error("malformed stay file '{path}': {reason}")]
    InvalidStayFile { path: String, reason: String },

    #[error("cannot load '{path}' with unknown extension '{extension}'")]
    UnknownFormat { path: String, extension: String },

    #[error("stay pack error: {0}")]
    Pack(String),

    // ── Classification ───────────────────────────────────────────────────────
    #[error("corrupt decision tree: {0}")]
    CorruptTree(String),

    #[error("malformed code '{0}'")]
    MalformedCode(String),

    // ── I/O / serialization ──────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
