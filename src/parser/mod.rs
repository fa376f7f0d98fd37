pub mod intent;
pub mod scenarios;
pub mod types;

pub use intent::{extract_user_context, parse_request, select_scenarios};
pub use scenarios::{builtin_scenarios, load_scenarios, ScenarioError};
pub use types::{Action, Role, TestRequest, TestScenario, UserContext};
