// Service error types
// Configuration, graph-structure and flow-execution failures

use crate::graph::{GraphError, GraphErrorKind};

use std::sync::Arc;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors raised while building process graphs or scheduling flows.
///
/// Cloneable so the first failure of a cascade run can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("cyclic dependency: {0}")]
    CyclicDependency(String),

    #[error("duplicate flow name: {0}")]
    DuplicateFlow(String),

    #[error("flow '{flow}' reads and writes the same resource: {resource}")]
    SelfReferentialResource { flow: String, resource: String },

    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("{what} already assigned for process {process}")]
    AlreadyAssigned { process: String, what: &'static str },

    #[error("flow '{flow}' failed: {message}")]
    FlowFailed { flow: String, message: String },

    #[error("flow '{0}' was stopped")]
    FlowStopped(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn flow_failed(flow: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FlowFailed {
            flow: flow.into(),
            message: message.into(),
        }
    }

    /// True for errors detected while building graphs, before anything runs
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::CyclicDependency(_)
                | Self::DuplicateFlow(_)
                | Self::SelfReferentialResource { .. }
                | Self::InvalidGraph(_)
        )
    }
}

impl From<GraphError> for ServiceError {
    fn from(err: GraphError) -> Self {
        match err.kind {
            GraphErrorKind::CyclicDependency => Self::CyclicDependency(err.message),
            _ => Self::InvalidGraph(err.message),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_yaml::Error> for ServiceError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
