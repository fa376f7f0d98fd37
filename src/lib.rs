pub mod driver;
pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;

// Re-export common items
pub use parser::{parse_request, select_scenarios};
pub use report::generate_report;
pub use runner::{poll_tasks, run_prompt};
