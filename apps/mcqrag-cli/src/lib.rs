pub mod app;
pub mod cli;
pub mod commands;
pub mod logging;

pub use cli::Cli;
pub use commands::run;
