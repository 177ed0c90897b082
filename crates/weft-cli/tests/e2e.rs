//! End-to-end CLI workflows.
//!
//! Each test runs the `weft` binary as a subprocess against a vault in its
//! own temp directory and inspects the JSON outcome on stdout.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn weft_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("weft"));
    cmd.arg("--vault").arg(dir);
    cmd.env("WEFT_LOG", "error");
    cmd.env_remove("WEFT_FORMAT");
    cmd
}

/// Run with `--json` and return (success, outcome).
fn run_json(dir: &Path, args: &[&str]) -> (bool, Value) {
    let output = weft_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("weft should not crash");
    let outcome: Value = serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "invalid JSON from {args:?}: {err}\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    });
    (output.status.success(), outcome)
}

fn ok(dir: &Path, args: &[&str]) -> Value {
    let (success, outcome) = run_json(dir, args);
    assert!(success, "{args:?} failed: {outcome}");
    assert_eq!(outcome["success"], true);
    outcome["data"].clone()
}

fn fails_with(dir: &Path, args: &[&str], code: &str) -> Value {
    let (success, outcome) = run_json(dir, args);
    assert!(!success, "{args:?} should fail: {outcome}");
    assert_eq!(outcome["success"], false);
    assert_eq!(outcome["error"]["code"], code, "{outcome}");
    outcome
}

fn init_vault() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    ok(dir.path(), &["init"]);
    dir
}

fn create(dir: &Path, args: &[&str]) -> String {
    let mut full = vec!["create"];
    full.extend_from_slice(args);
    ok(dir, &full)["id"]
        .as_str()
        .expect("created id")
        .to_string()
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

#[test]
fn init_creates_index_and_default_config() {
    let dir = TempDir::new().expect("tempdir");
    let data = ok(dir.path(), &["init"]);
    assert_eq!(data["wrote_config"], true);
    assert!(dir.path().join(".weft/index.sqlite3").exists());
    let config = std::fs::read_to_string(dir.path().join(".weft/config.toml")).expect("config");
    assert!(config.contains("[densify]"));

    // Idempotent: a second init keeps the existing config.
    let again = ok(dir.path(), &["init"]);
    assert_eq!(again["wrote_config"], false);
}

#[test]
fn commands_outside_a_vault_fail_with_validation() {
    let dir = TempDir::new().expect("tempdir");
    fails_with(dir.path(), &["rank"], "VALIDATION");
}

#[test]
fn text_mode_prints_short_output_and_exit_code() {
    let dir = init_vault();
    weft_cmd(dir.path())
        .args(["create", "Tidal pools"])
        .assert()
        .success()
        .stdout(predicate::str::contains("id:").and(predicate::str::contains("note-")));

    weft_cmd(dir.path())
        .args(["undo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NO_HISTORY"));
}

#[test]
fn malformed_config_is_reported() {
    let dir = init_vault();
    std::fs::write(dir.path().join(".weft/config.toml"), "[densify\nmin_score = ").expect("write");
    fails_with(dir.path(), &["rank"], "CONFIG");
}

#[test]
fn check_reports_a_clean_vault() {
    let dir = init_vault();
    create(dir.path(), &["Estuaries"]);
    let data = ok(dir.path(), &["check"]);
    assert_eq!(data["nodes"], 1);
    assert_eq!(data["issues"].as_array().map(Vec::len), Some(0));
}

// ---------------------------------------------------------------------------
// Content and lifecycle
// ---------------------------------------------------------------------------

#[test]
fn create_link_and_update_notes() {
    let dir = init_vault();
    let rivers = create(dir.path(), &["Rivers", "--tag", "water"]);
    let deltas = create(dir.path(), &["Deltas", "--link", &format!("feeds={rivers}")]);
    assert!(rivers.starts_with("note-"));

    // Same title again returns the existing id with a warning.
    let (success, outcome) = run_json(dir.path(), &["create", "rivers"]);
    assert!(success);
    assert_eq!(outcome["data"]["id"], rivers.as_str());
    assert_eq!(outcome["data"]["existing"], true);
    assert!(!outcome["warnings"].as_array().expect("warnings").is_empty());

    let change = ok(dir.path(), &["link", &deltas]);
    assert_eq!(change["removed"].as_array().map(Vec::len), Some(1));
    assert_eq!(change["status"], "draft");

    let updated = ok(dir.path(), &["update", &rivers, "--title", "Great rivers", "--clear-tags"]);
    assert_eq!(updated["id"], rivers.as_str());

    fails_with(dir.path(), &["link", &deltas, "note-00000000"], "NOT_FOUND");
    fails_with(dir.path(), &["link", &deltas, &deltas], "VALIDATION");
}

#[test]
fn task_and_decision_lifecycles() {
    let dir = init_vault();
    let task = create(dir.path(), &["Write the index migration", "--type", "task"]);
    assert_eq!(task, "TASK-0001");

    let moved = ok(dir.path(), &["transition", &task, "active"]);
    assert_eq!(moved["from"], "open");
    assert_eq!(moved["to"], "active");
    let done = ok(dir.path(), &["transition", &task, "done"]);
    assert_eq!(done["closed"], true);
    fails_with(dir.path(), &["transition", &task, "active"], "INVALID_TRANSITION");

    let decision = create(dir.path(), &["Adopt SQLite", "--type", "decision"]);
    assert_eq!(decision, "DEC-0001");
    ok(dir.path(), &["transition", &decision, "accepted"]);

    let note = create(dir.path(), &["Lagoons"]);
    fails_with(dir.path(), &["transition", &note, "connected"], "INVALID_TRANSITION");
}

#[test]
fn maturity_session_and_archive() {
    let dir = init_vault();
    let note = create(dir.path(), &["Mangroves", "--maturity", "seedling"]);
    ok(dir.path(), &["maturity", &note, "budding"]);
    fails_with(dir.path(), &["maturity", &note, "seedling-plus"], "VALIDATION");

    let session = ok(dir.path(), &["session", "start", "Morning review"]);
    assert_eq!(session["id"], "SES-0001");
    let closed = ok(dir.path(), &["session", "close", "SES-0001"]);
    assert_eq!(closed["to"], "closed");
    fails_with(dir.path(), &["session", "close", &note], "VALIDATION");

    let archived = ok(dir.path(), &["archive", &note]);
    assert_eq!(archived["id"], note.as_str());
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

/// a → b → c → d, plus an isolated e.
fn chain(dir: &Path) -> Vec<String> {
    let e = create(dir, &["Isolated"]);
    let d = create(dir, &["Delta"]);
    let c = create(dir, &["Channel", "--link", &d]);
    let b = create(dir, &["Bank", "--link", &c]);
    let a = create(dir, &["Aquifer", "--link", &b]);
    vec![a, b, c, d, e]
}

#[test]
fn path_and_related_over_a_chain() {
    let dir = init_vault();
    let ids = chain(dir.path());

    let path = ok(dir.path(), &["path", &ids[0], &ids[3]]);
    assert_eq!(path["result"], "connected");
    assert_eq!(path["hops"], 3);

    let apart = ok(dir.path(), &["path", &ids[0], &ids[4]]);
    assert_eq!(apart["result"], "not_connected");

    let related = ok(dir.path(), &["related", &ids[0], "--depth", "3"]);
    let order: Vec<&str> = related
        .as_array()
        .expect("list")
        .iter()
        .filter_map(|s| s["id"].as_str())
        .collect();
    assert_eq!(order, vec![ids[1].as_str(), ids[2].as_str(), ids[3].as_str()]);

    fails_with(dir.path(), &["related", &ids[0], "--depth", "9"], "VALIDATION");
    fails_with(dir.path(), &["path", &ids[0], "note-00000000"], "NOT_FOUND");
}

#[test]
fn rank_bridges_themes_and_gaps_run() {
    let dir = init_vault();
    let ids = chain(dir.path());

    let rank = ok(dir.path(), &["rank", "--top", "3"]);
    assert_eq!(rank["nodes"], 5);
    assert_eq!(rank["ranked"].as_array().map(Vec::len), Some(3));

    let bridges = ok(dir.path(), &["bridges", "--top", "2"]);
    let top: Vec<&str> = bridges
        .as_array()
        .expect("list")
        .iter()
        .filter_map(|s| s["id"].as_str())
        .collect();
    assert!(top.contains(&ids[1].as_str()));
    assert!(top.contains(&ids[2].as_str()));

    let themes = ok(dir.path(), &["themes"]);
    assert!(!themes["clusters"].as_array().expect("clusters").is_empty());

    let gaps = ok(dir.path(), &["gaps"]);
    assert!(gaps["nodes"].is_array());
}

#[test]
fn optional_indexes_are_unavailable() {
    let dir = init_vault();
    let note = create(dir.path(), &["Fjords"]);
    fails_with(dir.path(), &["similar", &note], "CAPABILITY_UNAVAILABLE");
    fails_with(dir.path(), &["search", "fjords"], "CAPABILITY_UNAVAILABLE");
}

// ---------------------------------------------------------------------------
// Densification
// ---------------------------------------------------------------------------

fn rust_notes(dir: &Path) -> (String, String, String, String) {
    let tagged = |title: &str| {
        create(
            dir,
            &[title, "--tag", "rust", "--tag", "memory", "--topic", "lang/rust"],
        )
    };
    let b = tagged("Rust ownership borrowing rules");
    let c = tagged("Rust ownership");
    let d = create(dir, &["Sourdough baking", "--tag", "baking", "--topic", "home/kitchen"]);
    let a = tagged("Rust ownership borrowing");
    (a, b, c, d)
}

#[test]
fn reweave_connects_then_undo_restores() {
    let dir = init_vault();
    let (a, b, c, _d) = rust_notes(dir.path());

    let preview = ok(dir.path(), &["reweave", "--dry-run"]);
    assert_eq!(preview["source_id"], a.as_str());
    assert_eq!(preview["candidates"].as_array().map(Vec::len), Some(2));
    assert!(preview["log_id"].is_null());

    let report = ok(dir.path(), &["reweave", "--source", &a]);
    let mut targets: Vec<&str> = report["added"]
        .as_array()
        .expect("added")
        .iter()
        .filter_map(|e| e["target_id"].as_str())
        .collect();
    targets.sort_unstable();
    let mut expected = vec![b.as_str(), c.as_str()];
    expected.sort_unstable();
    assert_eq!(targets, expected);
    let log_id = report["log_id"].as_i64().expect("log id");

    let history = ok(dir.path(), &["log"]);
    assert_eq!(history[0]["log_id"], log_id);
    assert_eq!(history[0]["kind"], "connect");

    let undone = ok(dir.path(), &["undo"]);
    assert_eq!(undone["reverted_log_id"], log_id);
    assert_eq!(undone["removed"].as_array().map(Vec::len), Some(2));

    fails_with(dir.path(), &["undo"], "NO_HISTORY");
    fails_with(dir.path(), &["undo", &log_id.to_string()], "VALIDATION");
    fails_with(dir.path(), &["undo", "999"], "NOT_FOUND");
}

#[test]
fn reweave_reports_unresolved_mentions() {
    let dir = init_vault();
    let (a, _b, _c, d) = rust_notes(dir.path());
    let body = dir.path().join("body.md");
    std::fs::write(&body, "Ties into [[Sourdough baking]] and [[Nowhere]].").expect("body");

    let (success, outcome) = run_json(
        dir.path(),
        &["reweave", "--source", &a, "--body-file", body.to_str().expect("utf8 path")],
    );
    assert!(success, "{outcome}");
    let mention = outcome["data"]["added"]
        .as_array()
        .expect("added")
        .iter()
        .find(|e| e["target_id"] == d.as_str())
        .cloned()
        .expect("mentioned note is linked");
    assert_eq!(mention["edge_type"], "mentions");
    let warnings = outcome["warnings"].as_array().expect("warnings");
    assert!(warnings.iter().any(|w| w.as_str().is_some_and(|w| w.contains("Nowhere"))));
}

#[test]
fn prune_needs_history_and_keeps_strong_edges() {
    let dir = init_vault();
    fails_with(dir.path(), &["prune"], "NO_HISTORY");

    let (a, ..) = rust_notes(dir.path());
    ok(dir.path(), &["reweave", "--source", &a]);

    let (success, outcome) = run_json(dir.path(), &["prune"]);
    assert!(success, "{outcome}");
    assert_eq!(outcome["data"]["removed"].as_array().map(Vec::len), Some(0));
    assert!(outcome["data"]["log_id"].is_null());
    assert!(!outcome["warnings"].as_array().expect("warnings").is_empty());

    fails_with(dir.path(), &["prune", "--target", "note-00000000"], "NOT_FOUND");
}

#[test]
fn reweave_rejects_bad_sources() {
    let dir = init_vault();
    fails_with(dir.path(), &["reweave"], "VALIDATION");
    fails_with(dir.path(), &["reweave", "--source", "not an id"], "VALIDATION");
    fails_with(dir.path(), &["reweave", "--source", "note-00000000"], "NOT_FOUND");
}
