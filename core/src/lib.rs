pub mod config;
pub mod determinism;
pub mod incident;
pub mod llm;
pub mod slack;

pub mod error;

mod transport;
