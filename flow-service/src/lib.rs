// Flow Service Library
// Process graph decomposition and dependency-aware scheduling of flows

pub mod cascade;
pub mod definition;
pub mod element;
pub mod error;
pub mod graph;
pub mod process;

mod dot;

// Re-export commonly used types
pub use error::{ServiceError, ServiceResult};

// Re-export graph types
pub use graph::{DirectedGraph, GraphError, GraphErrorKind};

// Re-export element types
pub use element::{ElementGraph, ElementId, ElementKind, ElementSubGraph, FlowElement};

// Re-export process types
pub use process::{
    DefaultProcessFactory, FlowNode, FlowStep, NodeGraph, Process, ProcessEdge, ProcessFactory,
    ProcessGraph, StepGraph,
};

// Re-export cascade types
pub use cascade::{
    CancellationContext, Cascade, CascadeConfig, CascadeConnector, CascadeEvent, CascadeStats,
    CascadeStatus, FileTap, Flow, FlowStats, FlowStatus, ProgressSender, SharedFlow, SharedTap,
    SkipStrategy, Tap,
};

// Re-export definition types
pub use definition::{CascadeDefinition, DefinitionParser, Plan, PlanDefinition, ShellFlow};
