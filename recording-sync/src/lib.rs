pub mod cli;
pub mod gemini;
pub mod graphql;
pub mod load_config;
pub mod mongo;
pub mod xlsx;

pub use cli::{run, Cli, Commands};
