use assert_cmd::Command;
use predicates::prelude::*;

fn smart_tester() -> Command {
    let mut cmd = Command::cargo_bin("smart-tester").unwrap();
    cmd.env_remove("TEST_REQUEST").env_remove("BASE_URL");
    cmd
}

#[test]
fn run_without_prompt_prints_usage() {
    smart_tester()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

fn plan_lines(prompt: &str) -> Vec<String> {
    let output = smart_tester()
        .env("NO_COLOR", "1")
        .args(["plan", prompt])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn plan_lists_actions_in_priority_order() {
    let lines = plan_lines("Make a new equipment with all req fields and delete it.");
    assert_eq!(lines.len(), 2, "{:?}", lines);
    assert!(lines[0].starts_with("1. create_equipment"), "{:?}", lines);
    assert!(lines[1].starts_with("2. delete_equipment"), "{:?}", lines);
}

#[test]
fn plan_keeps_request_order_within_a_priority() {
    let actions: Vec<String> = plan_lines("login, logout and check access")
        .iter()
        .filter_map(|line| line.split_whitespace().nth(1).map(str::to_string))
        .collect();
    assert_eq!(actions, vec!["test_login", "test_permissions", "test_logout"]);
}

#[test]
fn plan_falls_back_to_comprehensive_scenario() {
    smart_tester()
        .args(["plan", "--mode", "scenario", "zzz qqq"])
        .assert()
        .success()
        .stdout(predicate::str::contains("comprehensive"));
}

#[test]
fn unknown_mode_is_rejected() {
    smart_tester()
        .args(["plan", "--mode", "fast", "login"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown mode"));
}
