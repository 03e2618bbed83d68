pub mod critic;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod registry;
pub mod session;
