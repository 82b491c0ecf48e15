//! Error types for the worker pool and the tile renderer.
//!
//! Geometric misses are not errors: intersection routines return `None`.

use thiserror::Error;

/// Failures reported by [`WorkerPool`](crate::WorkerPool) and its task handles.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("cannot submit work to a worker pool that has been shut down")]
    ShutDown,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error("task was dropped before producing a result")]
    TaskLost,
}

/// Failures reported by [`render`](crate::render).
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("invalid render settings: {0}")]
    InvalidSettings(String),

    #[error("tile {tile} failed: {source}")]
    Tile {
        tile: usize,
        #[source]
        source: PoolError,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),
}
