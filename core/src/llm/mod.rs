pub mod chat;
pub mod interface;
