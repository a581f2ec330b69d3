pub mod arguments;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod events;
pub mod files;
pub mod git;
pub mod paths;
pub mod version;
