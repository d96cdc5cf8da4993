//! Result and error types for the core library

use std::fmt;

use thiserror::Error;

/// Steps of a transfer unit, used to say which one failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    CreateTransfer,
    CreateFromEntry,
    CreateToEntry,
    UpdateBalances,
}

impl TransferStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStep::CreateTransfer => "create transfer",
            TransferStep::CreateFromEntry => "create from entry",
            TransferStep::CreateToEntry => "create to entry",
            TransferStep::UpdateBalances => "update account balances",
        }
    }
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    /// The store rejected an insert, update or delete
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A unit failed and then failed to discard its effects as well.
    #[error("tx err: {cause}, discard err: {discard}")]
    DiscardFailed {
        cause: Box<Error>,
        discard: Box<Error>,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("transfer tx - failed to {step}: {source}")]
    TransferStep {
        step: TransferStep,
        #[source]
        source: Box<Error>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a constraint violation error
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Attach the failing transfer step to an error
    pub fn at_step(self, step: TransferStep) -> Self {
        Self::TransferStep {
            step,
            source: Box::new(self),
        }
    }

    /// Combine a unit failure with the failure to discard it
    pub fn discard_failed(cause: Error, discard: Error) -> Self {
        Self::DiscardFailed {
            cause: Box::new(cause),
            discard: Box::new(discard),
        }
    }

    /// The underlying error with any transfer step context removed.
    ///
    /// A `DiscardFailed` is returned as is; both halves matter to the caller.
    pub fn root(&self) -> &Error {
        match self {
            Error::TransferStep { source, .. } => source.root(),
            other => other,
        }
    }

    /// The transfer step this error was raised in, if any
    pub fn step(&self) -> Option<TransferStep> {
        match self {
            Error::TransferStep { step, .. } => Some(*step),
            Error::DiscardFailed { cause, .. } => cause.step(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound(_))
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self.root(), Error::ConstraintViolation(_))
    }

    pub fn is_lock_timeout(&self) -> bool {
        matches!(self.root(), Error::LockTimeout(_))
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
