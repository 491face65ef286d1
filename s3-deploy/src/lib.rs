pub mod aws;
pub mod cli;
pub mod load_input;

pub use cli::{run, Cli, Commands};
