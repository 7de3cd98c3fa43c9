/// The current version of Gatehouse, sourced from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod logging;
pub mod webui;
