//! Free-text request dispatch
//!
//! Two selectors share the same input: `parse_request` maps a request to a
//! flat list of actions with rule-based priorities, and `select_scenarios`
//! scores the scenario table. Both are case-insensitive substring matchers.

use super::scenarios::FALLBACK_SCENARIO;
use super::types::{Action, Role, TestRequest, TestScenario, UserContext};
use crate::utils::config::Credentials;

const ACTION_VERBS: &[&str] = &[
    "create", "make", "add", "delete", "remove", "edit", "update", "test", "check", "verify",
];
const ENTITIES: &[&str] = &[
    "equipment",
    "maintenance",
    "user",
    "admin",
    "login",
    "permission",
];
const BROAD_SCOPE: &[&str] = &["all", "everything", "comprehensive"];

/// Maximum number of scenarios returned by `select_scenarios`
pub const MAX_SCENARIOS: usize = 3;

fn any_of(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn request(
    action: Action,
    priority: u8,
    flags: &[&'static str],
    description: &'static str,
) -> TestRequest {
    TestRequest {
        action,
        priority,
        flags: flags.to_vec(),
        description,
    }
}

/// Map a free-text request onto canned actions, ordered by priority
pub fn parse_request(text: &str) -> Vec<TestRequest> {
    let lower = text.to_lowercase();
    let mut requests = Vec::new();

    let creates = any_of(&lower, &["create", "make", "add"]);
    let lists = any_of(&lower, &["list", "view"]);

    if any_of(&lower, &["equipment", "item"]) {
        if creates {
            requests.push(request(
                Action::CreateEquipment,
                1,
                &["authenticated", "form_fill"],
                "Create new equipment with required fields",
            ));
        }
        if any_of(&lower, &["delete", "remove"]) {
            requests.push(request(
                Action::DeleteEquipment,
                2,
                &["authenticated", "confirmation"],
                "Delete equipment item",
            ));
        }
        if lists {
            requests.push(request(
                Action::ListEquipment,
                3,
                &["authenticated"],
                "View equipment list",
            ));
        }
    }

    if any_of(&lower, &["maintenance", "schedule"]) {
        if creates {
            requests.push(request(
                Action::CreateMaintenance,
                1,
                &["authenticated", "form_fill"],
                "Create new maintenance schedule",
            ));
        }
        if lists {
            requests.push(request(
                Action::ListMaintenance,
                3,
                &["authenticated"],
                "View maintenance list",
            ));
        }
    }

    if any_of(&lower, &["login", "authenticate"]) {
        requests.push(request(
            Action::TestLogin,
            1,
            &["auth_test"],
            "Test login functionality",
        ));
    }

    if any_of(&lower, &["logout", "sign out"]) {
        requests.push(request(
            Action::TestLogout,
            2,
            &["auth_test"],
            "Test logout functionality",
        ));
    }

    if any_of(&lower, &["permission", "access", "unauthorized"]) {
        requests.push(request(
            Action::TestPermissions,
            1,
            &["auth_test", "permission_test"],
            "Test permission access control",
        ));
    }

    if any_of(&lower, &["explore", "all links", "every page"]) {
        requests.push(request(
            Action::ExploreAllLinks,
            1,
            &["comprehensive", "link_test"],
            "Explore all links and pages",
        ));
    }

    if any_of(&lower, &["clear database", "danger zone", "reset database"]) {
        requests.push(request(
            Action::ClearDatabase,
            1,
            &["authenticated", "danger_zone"],
            "Test the Clear Database modal and operation",
        ));
    }

    if requests.is_empty() {
        requests.push(request(
            Action::ComprehensiveTest,
            1,
            &["comprehensive", "auth_test", "permission_test"],
            "Comprehensive testing of all features",
        ));
    }

    // Vec::sort_by_key is stable: equal priorities keep rule order
    requests.sort_by_key(|r| r.priority);
    requests
}

/// Relevance of one scenario for an already lower-cased request.
///
/// Verb, entity and scope bonuses only count once a scenario keyword has
/// matched, so a request sharing no keyword with a scenario scores zero.
pub fn score_scenario(scenario: &TestScenario, lower: &str) -> f64 {
    let keyword_hits = scenario
        .keywords
        .iter()
        .filter(|k| !k.is_empty() && lower.contains(k.as_str()))
        .count();
    if keyword_hits == 0 {
        return 0.0;
    }

    let verb_hits = ACTION_VERBS.iter().filter(|v| lower.contains(*v)).count();
    let entity_hits = ENTITIES.iter().filter(|e| lower.contains(*e)).count();

    let mut score = 2.0 * keyword_hits as f64 + verb_hits as f64 + 1.5 * entity_hits as f64;
    if any_of(lower, BROAD_SCOPE) {
        score += 3.0;
    }
    score
}

/// Pick the most relevant scenarios for a request.
///
/// Returns at most [`MAX_SCENARIOS`] scenarios by descending score (ties in
/// table order), or the fallback scenario alone when nothing scores.
pub fn select_scenarios<'a>(table: &'a [TestScenario], text: &str) -> Vec<&'a TestScenario> {
    let lower = text.to_lowercase();

    let mut scored: Vec<(&TestScenario, f64)> = table
        .iter()
        .map(|s| (s, score_scenario(s, &lower)))
        .filter(|(_, score)| *score > 0.0)
        .collect();

    if scored.is_empty() {
        return table
            .iter()
            .filter(|s| s.name == FALLBACK_SCENARIO)
            .take(1)
            .collect();
    }

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .take(MAX_SCENARIOS)
        .map(|(s, _)| s)
        .collect()
}

/// Work out which account a request wants to run as
pub fn extract_user_context(text: &str, admin: &Credentials) -> UserContext {
    let lower = text.to_lowercase();

    if lower.contains("as a technician") {
        UserContext {
            username: "demo_user_2".to_string(),
            password: "demo123".to_string(),
            role: Role::Technician,
        }
    } else if lower.contains("as a manager") {
        UserContext {
            username: "demo_user_3".to_string(),
            password: "demo123".to_string(),
            role: Role::Manager,
        }
    } else {
        UserContext {
            username: admin.username.clone(),
            password: admin.password.clone(),
            role: Role::Admin,
        }
    }
}
