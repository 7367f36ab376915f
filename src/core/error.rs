// SPDX-License-Identifier: GPL-2.0

//! Error types for BPF program generation.
//!
//! Generation failures are non-exceptional: a component that cannot satisfy
//! a constraint reports `None` and the caller retries with the same or a
//! broader budget. `GenError` covers what is left: the driver's retry budget
//! running out, catalogue lookups that miss (logical bugs naming the missing
//! key), and persistence I/O.

use thiserror::Error;

/// Result type alias for generator operations.
pub type Result<T> = core::result::Result<T, GenError>;

/// Errors surfaced by the generator entry points.
#[derive(Debug, Error)]
pub enum GenError {
    /// Program generation did not converge within the retry budget.
    #[error("program generation did not converge within {0} attempts")]
    NotConverged(usize),

    /// A helper enum was referenced that is not in the catalogue.
    #[error("unknown helper: {0}")]
    UnknownHelper(String),

    /// A program type name was referenced that is not in the catalogue.
    #[error("unknown program type: {0}")]
    UnknownProgType(String),

    /// A context struct name was referenced that is not in the catalogue.
    #[error("unknown context struct: {0}")]
    UnknownCtxStruct(String),

    /// A catalogue was built with an unparsable attribute value.
    #[error("bad catalogue attribute {key}: {value}")]
    BadCatalogAttr {
        /// Attribute key.
        key: String,
        /// Offending value.
        value: String,
    },

    /// A seed file name did not follow the `prog_<hexnanos>_<progtype>`
    /// convention.
    #[error("bad seed path: {0}")]
    BadSeedPath(String),

    /// Persistence I/O failure.
    #[error("seed i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence encoding/decoding failure.
    #[error("seed codec: {0}")]
    Codec(#[from] serde_json::Error),
}
