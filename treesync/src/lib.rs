pub mod channels;
pub mod cli;
pub mod config;
pub mod spool;
pub mod store;
pub mod worker;

pub use cli::{run, Cli, Commands};
