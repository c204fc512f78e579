use thiserror::Error;

use crate::{abs::AbsError, sat::SatError};

use super::NodeId;

/// The result of an AIG, CNF or abstraction operation.
pub type Result<T> = std::result::Result<T, AigError>;

/// Error returned when an operation failed.
#[derive(Debug, Error)]
pub enum AigError {
    /// The node with given id does not exist.
    #[error("node with id={0} does not exist")]
    NodeDoesNotExist(NodeId),

    /// The latch with the given index does not exist.
    #[error("latch {0} does not exist")]
    NoSuchLatch(usize),

    /// The AIG has reached an invalid state. This should never happen.
    /// For example, an and gate refering to a fanin created after itself.
    #[error("the AIG has reached an invalid state - this should not happen - error: {0}")]
    InvalidState(String),

    /// Just forwarding a [`ParserError`].
    #[error("{0}")]
    ParserError(#[from] ParserError),

    /// Just forwarding a [`SatError`].
    #[error("{0}")]
    SatError(#[from] SatError),

    /// Just forwarding an [`AbsError`].
    #[error("{0}")]
    AbsError(#[from] AbsError),
}

/// Error returned when parsing from file failed.
///
/// It is defined here because the `parser` module is private.
#[derive(Debug, Error)]
pub enum ParserError {
    /// All features are not supported (only the basics in fact).
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Invalid token, something else was expected.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// An IO error occured (file doesn't exist, or doesn't have the right extension, ...).
    #[error("io error: {0}")]
    IoError(String),
}
