//! Error types

use thiserror::Error;

use crate::domain::EntityId;

/// Failure raised by a channel handler or component hook
///
/// Handler failures are isolated by the bus: the error is logged and
/// delivery continues with the next handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),

    #[error("listener is already borrowed (re-entrant delivery)")]
    Reentrant,
}

impl HandlerError {
    /// Create a failure with a message
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// Rejection raised by the domain collaborator while applying a mutation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("mutation rejected: {0}")]
    Rejected(String),

    #[error("insufficient budget: need {needed}, have {available}")]
    InsufficientBudget { needed: u64, available: u64 },

    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),
}

/// Configuration could not be loaded
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
