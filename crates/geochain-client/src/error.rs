// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for chains, codecs and execution.

use thiserror::Error;
use tonic::{Code, Status};

/// Failure carried by a chain or returned by an executor.
///
/// Builder-time variants are deferred: a chain that hits one keeps it and
/// hands the same value to every later call. The type is `Clone` so a binary
/// operation can adopt the error of its right-hand chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    /// A geometry or payload has no spatial reference.
    #[error("geometry has no spatial reference")]
    MissingSpatialReference,
    /// The payload carries no variant this client can read locally.
    #[error("unsupported geometry payload variant: {0}")]
    UnsupportedPayloadVariant(&'static str),
    /// The chain holds neither a pending operation nor inline geometry.
    #[error("left operand missing: chain has no geometry or pending operation")]
    MissingLeftOperand,
    /// The left operand was attached but carries no geometry input.
    #[error("left operand broken: inline geometry is empty")]
    BrokenLeftOperand,
    /// The right-hand chain holds neither a pending operation nor inline geometry.
    #[error("right operand missing: chain has no geometry or pending operation")]
    MissingRightOperand,
    /// The right operand was attached but carries no geometry input.
    #[error("right operand broken: inline geometry is empty")]
    BrokenRightOperand,
    /// A relate pattern that is not exactly nine characters.
    #[error("relate matrix must be 9 characters, got {0:?}")]
    InvalidRelateMatrix(String),
    /// The engine answered without the expected result parts.
    #[error("geometry service returned an incomplete result")]
    IncompleteResult,
    /// The service could not be reached.
    #[error("geometry service unavailable: {0}")]
    ServiceUnavailable(String),
    /// The RPC failed.
    #[error("geometry service error ({code}): {message}")]
    Transport {
        /// gRPC status code.
        code: Code,
        /// Status message from the transport or engine.
        message: String,
    },
    /// A geometry could not be written in the requested encoding.
    #[error("failed to encode geometry: {0}")]
    Encode(String),
    /// A payload could not be parsed.
    #[error("failed to decode geometry: {0}")]
    Decode(String),
    /// Operand references differ and the client rejects implicit reconciliation.
    #[error("spatial reference mismatch: {0}")]
    ReferenceMismatch(String),
}

impl From<Status> for ChainError {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::Unavailable => Self::ServiceUnavailable(status.message().to_string()),
            code => Self::Transport {
                code,
                message: status.message().to_string(),
            },
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ChainError>;
