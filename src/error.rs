use thiserror::Error;

/// all failures that can surface from loading a graph or selecting a group
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// a row of an edge list could not be turned into an edge
    #[error("invalid edge in row {row}: {reason}")]
    InvalidEdge { row: usize, reason: String },

    #[error("invalid value '{value}' for --{name}")]
    InvalidArgument { name: String, value: String },

    #[error("unknown node label \"{0}\"")]
    UnknownNode(String),

    /// result accessors were called before `run()`
    #[error("group closeness has not been run yet")]
    NotRun,

    /// at least one worker of a selection round panicked, the group is discarded
    #[error("a worker panicked during selection round {round}")]
    WorkerPanicked { round: usize },

    /// no remaining node improves the farness (e.g. k exceeds the number of reachable nodes)
    #[error("no candidate with positive gain left in selection round {round}")]
    NoCandidate { round: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
