pub mod app;
pub mod bulk_delete;
pub mod cli;
pub mod errors;
pub mod gmail_api;
pub mod types;
