use thiserror::Error;

#[derive(Debug, Error)]
pub enum KcbError {
    #[error("Identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    #[error("Split error: {0}")]
    Split(#[from] SplitError),

    #[error("Occupied identifier: {0}")]
    Occupied(#[from] OccupiedIdentifierError),

    #[error("assembly `{0}` has no samples")]
    EmptyAssembly(String),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// The assembly identifier does not follow `<prefix>("."<digits>)+`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("malformed assembly identifier `{identifier}`: {reason}")]
    Malformed { identifier: String, reason: String },
}

impl IdentifierError {
    pub(crate) fn malformed(identifier: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures of a split operation. Always terminal for the current operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("assembly is nil")]
    MissingAssembly,

    #[error("group size {size} is out of range for {sample_count} samples")]
    InvalidGroupSize { size: u32, sample_count: u32 },

    #[error("part count {parts} is out of range for {sample_count} samples")]
    InvalidPartCount { parts: u32, sample_count: u32 },

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error("unit index of `{identifier}` overflows with {sample_count} samples")]
    IndexOverflow {
        identifier: String,
        sample_count: u32,
    },

    #[error("assembly `{identifier}` was modified concurrently")]
    StaleWrite { identifier: String },

    #[error("persistence failed: {0}")]
    Persistence(String),
}

/// A computed identifier collides with the range of a stored assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("identifier `{identifier}` overlaps the range reserved by `{occupied_by}`")]
pub struct OccupiedIdentifierError {
    pub identifier: String,
    pub occupied_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("procedure has no state history")]
    MissingHistory,

    #[error("another execution is still running")]
    NotExecutable,

    #[error("execution is already completed")]
    NotFinishable,

    #[error("assembly has to be collected first")]
    AwaitingCollection,

    #[error("procedure is already in its last state")]
    NoNextState,

    #[error("current state has not been finished yet")]
    CurrentStateOpen,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job has no assemblies and its chain does not create any")]
    MissingAssemblies,

    #[error("job is not pending")]
    NotPending,

    #[error("job is pending")]
    Pending,

    #[error("job is not processing")]
    NotProcessing,

    #[error("job is already finished")]
    AlreadyFinished,

    #[error("job is already cancelled")]
    AlreadyCancelled,

    #[error("job has no current procedure")]
    NoCurrentProcedure,

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("assembly `{0}` not found")]
    NotFound(String),

    #[error("assembly `{0}` was modified concurrently")]
    Conflict(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("configuration value `{0}` is missing")]
    Missing(String),

    #[error("configuration value `{key}` is invalid: {value}")]
    Invalid { key: String, value: String },
}
