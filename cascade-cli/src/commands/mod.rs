pub mod dot;
pub mod plan;
pub mod run;
pub mod validate;
