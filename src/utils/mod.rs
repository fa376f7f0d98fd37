pub mod config;
pub mod run_log;
