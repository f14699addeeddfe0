// Definitions Module
// YAML descriptions of cascades of shell flows and of pre-partitioned plans

pub mod cascade;
pub mod models;
pub mod parser;
pub mod plan;
pub mod shell;

pub use models::{
    CascadeDefinition, FlowDefinition, NodeDefinition, PlanDefinition, SkipMode, StepDefinition,
    TapDefinition,
};
pub use parser::DefinitionParser;
pub use plan::Plan;
pub use shell::ShellFlow;
