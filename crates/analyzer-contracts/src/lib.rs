pub mod chat;
pub mod config;
pub mod conversation;
pub mod prompts;
pub mod store;
