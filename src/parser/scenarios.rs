//! Static scenario table and YAML overrides

use std::path::Path;

use super::types::{Action, TestScenario};

/// Name of the scenario used when nothing in a request scores
pub const FALLBACK_SCENARIO: &str = "comprehensive";

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scenario file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Scenario file {0} defines no scenarios")]
    Empty(String),

    #[error("Scenario file {0} has no '{FALLBACK_SCENARIO}' scenario")]
    MissingFallback(String),
}

fn scenario(
    name: &str,
    description: &str,
    keywords: &[&str],
    actions: &[Action],
    requires_auth: bool,
    priority: u8,
) -> TestScenario {
    TestScenario {
        name: name.to_string(),
        description: description.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        actions: actions.to_vec(),
        requires_auth,
        priority,
    }
}

/// The built-in scenario table
pub fn builtin_scenarios() -> Vec<TestScenario> {
    use Action::*;

    vec![
        scenario(
            "equipment_crud",
            "Create, read, update, and delete equipment",
            &["equipment", "crud", "create", "delete", "update", "item"],
            &[CreateEquipment, ListEquipment, EditEquipment, DeleteEquipment],
            true,
            1,
        ),
        scenario(
            "maintenance_workflow",
            "Create and manage maintenance schedules",
            &["maintenance", "schedule", "workflow", "activity"],
            &[CreateMaintenance, ListMaintenance, EditMaintenance],
            true,
            2,
        ),
        scenario(
            "authentication_test",
            "Test login, logout, and session management",
            &["login", "logout", "auth", "authenticate", "session"],
            &[TestLogin, TestLogout, TestSession],
            false,
            1,
        ),
        scenario(
            "permission_test",
            "Test access control and permissions",
            &["permission", "access", "unauthorized", "protected", "security"],
            &[TestUnauthorizedAccess, TestAuthorizedAccess],
            false,
            1,
        ),
        scenario(
            "navigation_test",
            "Explore all pages and navigation",
            &["explore", "navigation", "links", "pages", "every"],
            &[ExploreAllLinks, TestNavigation],
            false,
            3,
        ),
        scenario(
            "form_validation",
            "Test form validation and error handling",
            &["form", "validation", "error", "required", "fields"],
            &[TestFormValidation, TestErrorHandling],
            true,
            2,
        ),
        scenario(
            "data_integrity",
            "Test data consistency and integrity",
            &["data", "integrity", "consistency", "save", "persist"],
            &[TestDataSave, TestDataRetrieval],
            true,
            2,
        ),
        scenario(
            "interaction_test",
            "Click through every interactive element on the dashboard",
            &["click", "button", "interact", "element"],
            &[ExplorePageElements],
            true,
            3,
        ),
        scenario(
            FALLBACK_SCENARIO,
            "Comprehensive testing of all features",
            &["comprehensive", "everything"],
            &[
                TestLogin,
                TestPermissions,
                CreateEquipment,
                DeleteEquipment,
                ExploreAllLinks,
                TestLogout,
            ],
            false,
            1,
        ),
    ]
}

/// Load a scenario table from YAML (a list of scenarios)
pub fn load_scenarios(path: &Path) -> Result<Vec<TestScenario>, ScenarioError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: display.clone(),
        source,
    })?;
    parse_scenarios(&content, &display)
}

/// Parse a YAML scenario table; `origin` is only used in error messages
pub fn parse_scenarios(content: &str, origin: &str) -> Result<Vec<TestScenario>, ScenarioError> {
    let scenarios: Vec<TestScenario> =
        serde_yaml::from_str(content).map_err(|source| ScenarioError::Yaml {
            path: origin.to_string(),
            source,
        })?;

    if scenarios.is_empty() {
        return Err(ScenarioError::Empty(origin.to_string()));
    }
    if !scenarios.iter().any(|s| s.name == FALLBACK_SCENARIO) {
        return Err(ScenarioError::MissingFallback(origin.to_string()));
    }

    Ok(scenarios
        .into_iter()
        .map(|mut s| {
            s.keywords = s.keywords.iter().map(|k| k.to_lowercase()).collect();
            s
        })
        .collect())
}
