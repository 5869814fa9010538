pub mod model;
pub mod prompt;
pub mod render;
pub mod response;
pub mod sanitize;
pub mod transcript;
pub mod workflow;
pub mod writer;
