//! Error types for graph access

use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    /// An identity tried to write below another identity's `~` namespace
    #[error("{author} may not write into the namespace of {owner} ({path})")]
    ForeignNamespace {
        author: String,
        owner: String,
        path: String,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Graph store unavailable: {0}")]
    Unavailable(String),
}
