pub mod client;
pub mod identity;
pub mod model;
pub mod thread_ref;
