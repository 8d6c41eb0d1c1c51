use std::fmt;

/// Machine-readable error codes for scripted runs and log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    StateNotFound,
    DistributionMismatch,
    RunCancelled,
    UnitFailed,
    CallbackFailed,
    WorkerPoolFailed,
    CacheCorrupted,
    ConfigParseError,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::StateNotFound => "E2001",
            Self::DistributionMismatch => "E2002",
            Self::RunCancelled => "E4001",
            Self::UnitFailed => "E4002",
            Self::CallbackFailed => "E4003",
            Self::WorkerPoolFailed => "E5001",
            Self::CacheCorrupted => "E3001",
            Self::ConfigParseError => "E1001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::StateNotFound => "Initial state not in cache",
            Self::DistributionMismatch => "Distribution length mismatch",
            Self::RunCancelled => "Batch run cancelled",
            Self::UnitFailed => "Simulation unit failed",
            Self::CallbackFailed => "Chunk callback failed",
            Self::WorkerPoolFailed => "Worker pool could not be created",
            Self::CacheCorrupted => "Stored cache is corrupted",
            Self::ConfigParseError => "Config file parse error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::StateNotFound => {
                Some("Pick an initial state produced by the edge generator for this graph.")
            }
            Self::DistributionMismatch => {
                Some("Supply one probability mass per vertex, in cache enumeration order.")
            }
            Self::RunCancelled => None,
            Self::UnitFailed => Some("Replay the reported seed on its own to reproduce."),
            Self::CallbackFailed => Some("Check the callback's output destination."),
            Self::WorkerPoolFailed => Some("Lower the worker count and retry."),
            Self::CacheCorrupted => Some("Recompile the graph and store the cache again."),
            Self::ConfigParseError => Some("Fix syntax in mpsim.toml and retry."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised while sampling trajectories or running batches.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The requested initial state is not a vertex of the compiled graph.
    #[error("state not found in cache: {0}")]
    StateNotFound(String),

    /// A supplied mass vector does not have one entry per vertex.
    #[error("distribution has {actual} entries, cache has {expected} vertices")]
    DistributionMismatch { expected: usize, actual: usize },

    /// A single trajectory observed a cancellation request and stopped early.
    #[error("trajectory for seed {seed} interrupted after {steps} steps")]
    Interrupted { seed: u64, steps: u64 },

    /// The run was cancelled while processing `chunk`.
    #[error("batch cancelled during chunk {chunk}")]
    Cancelled { chunk: usize },

    /// One unit of work in a chunk failed.
    #[error("chunk {chunk} failed for seed {seed}: {source}")]
    UnitFailed {
        chunk: usize,
        seed: u64,
        #[source]
        source: Box<SimError>,
    },

    /// A chunk callback returned an error.
    #[error("callback failed on chunk {chunk}: {reason}")]
    Callback { chunk: usize, reason: String },

    /// The per-chunk worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

impl SimError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::StateNotFound(_) => ErrorCode::StateNotFound,
            Self::DistributionMismatch { .. } => ErrorCode::DistributionMismatch,
            Self::Interrupted { .. } | Self::Cancelled { .. } => ErrorCode::RunCancelled,
            Self::UnitFailed { .. } => ErrorCode::UnitFailed,
            Self::Callback { .. } => ErrorCode::CallbackFailed,
            Self::WorkerPool(_) => ErrorCode::WorkerPoolFailed,
        }
    }

    /// True if this error, or the unit failure it wraps, is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Interrupted { .. } | Self::Cancelled { .. } => true,
            Self::UnitFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
