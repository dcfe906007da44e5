use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "epicgrid-cli-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn run_epicgrid<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_epicgrid");
    Command::new(bin)
        .args(args)
        .env_remove("EPICGRID_LOG")
        .output()
        .expect("epicgrid command should execute")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "command failed with status {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn assert_failure(output: &Output) {
    if output.status.success() {
        panic!(
            "command unexpectedly succeeded\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice::<Value>(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "expected valid JSON stdout, got error: {e}\nstdout:\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

const PROJECT_JSON: &str = r#"{
  "project": {"id": 1, "name": "Demo", "identifier": "demo"},
  "versions": [
    {"id": 10, "name": "Sprint 1", "effective_date": "2025-02-01"},
    {"id": 20, "name": "Sprint 2", "effective_date": "2025-03-01"}
  ],
  "users": [{"id": 7, "login": "ana", "firstname": "Ana", "lastname": "Lima"}],
  "members": [{"user_id": 7, "permissions": ["view_issues"]}],
  "statuses": [{"id": 1, "name": "New"}, {"id": 5, "name": "Closed", "is_closed": true}],
  "trackers": [
    {"id": 1, "name": "Epic"}, {"id": 2, "name": "Feature"}, {"id": 3, "name": "UserStory"},
    {"id": 4, "name": "Task"}, {"id": 5, "name": "Test"}, {"id": 6, "name": "Bug"}
  ]
}"#;

fn issue_line(id: u64, tracker: &str, subject: &str, parent: Option<u64>, version: Option<u64>) -> String {
    let mut issue = serde_json::json!({
        "id": id,
        "subject": subject,
        "tracker": tracker,
        "created_on": format!("2025-01-{:02}T00:00:00Z", id),
    });
    if let Some(parent) = parent {
        issue["parent_id"] = parent.into();
    }
    if let Some(version) = version {
        issue["fixed_version_id"] = version.into();
    }
    issue.to_string()
}

fn write_project(dir: &Path, lines: &[String]) {
    fs::write(dir.join("project.json"), PROJECT_JSON).expect("project.json should be written");
    fs::write(dir.join("issues.jsonl"), format!("{}\n", lines.join("\n")))
        .expect("issues.jsonl should be written");
}

fn write_sample_project(dir: &Path) {
    write_project(
        dir,
        &[
            issue_line(1, "Epic", "Alpha", None, None),
            issue_line(2, "Feature", "Login", Some(1), Some(10)),
            issue_line(3, "UserStory", "Sign in", Some(2), Some(10)),
            issue_line(4, "UserStory", "Sign out", Some(2), None),
            issue_line(5, "Task", "Form", Some(3), Some(10)),
            issue_line(6, "Test", "Form test", Some(3), Some(10)),
            issue_line(7, "Epic", "Beta", None, None),
        ],
    );
}

fn data_arg(dir: &Path) -> String {
    dir.display().to_string()
}

#[test]
fn grid_json_emits_index_and_entities() {
    let tmp = TempDirGuard::new("grid-json");
    write_sample_project(tmp.path());

    let output = run_epicgrid(["grid", "--data", &data_arg(tmp.path()), "--json"]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);

    assert_eq!(payload["grid"]["index"]["1:2:10"], serde_json::json!(["3"]));
    assert_eq!(payload["grid"]["index"]["1:2:none"], serde_json::json!(["4"]));
    assert_eq!(payload["grid"]["epic_order"], serde_json::json!(["1", "7"]));
    assert_eq!(payload["entities"]["user_stories"]["3"]["task_ids"], serde_json::json!(["5"]));
    assert_eq!(payload["metadata"]["api_version"], "v2");
    assert!(
        payload["metadata"]["request_id"]
            .as_str()
            .is_some_and(|id| id.starts_with("req_"))
    );
}

#[test]
fn grid_text_lists_epics_and_cells() {
    let tmp = TempDirGuard::new("grid-text");
    write_sample_project(tmp.path());

    let output = run_epicgrid([
        "grid",
        "--data",
        &data_arg(tmp.path()),
        "--epic-direction",
        "desc",
    ]);
    assert_success(&output);
    let text = stdout_text(&output);
    assert!(text.contains("Epic 1 Alpha"));
    assert!(text.contains("Feature 2 Login"));
    assert!(text.contains("[10] 3"));
    assert!(text.find("Epic 7 Beta") < text.find("Epic 1 Alpha"));
}

#[test]
fn grid_rejects_unknown_filter_key() {
    let tmp = TempDirGuard::new("grid-bad-filter");
    write_sample_project(tmp.path());

    let output = run_epicgrid([
        "grid",
        "--data",
        &data_arg(tmp.path()),
        "--filter",
        "colour_in=red",
    ]);
    assert_failure(&output);
}

#[test]
fn stats_reports_project_and_requires_id_for_epic_scope() {
    let tmp = TempDirGuard::new("stats");
    write_sample_project(tmp.path());
    let data = data_arg(tmp.path());

    let project = run_epicgrid(["stats", "--data", &data, "--json", "--today", "2025-02-15"]);
    assert_success(&project);
    let report = parse_json_stdout(&project);
    assert_eq!(report["total_issues"], 7);
    assert_eq!(report["by_tracker"]["UserStory"], 2);

    let epic = run_epicgrid(["stats", "--data", &data, "--scope", "epic", "--id", "1", "--json"]);
    assert_success(&epic);
    assert!(parse_json_stdout(&epic).is_object());

    assert_failure(&run_epicgrid(["stats", "--data", &data, "--scope", "epic"]));
    assert_failure(&run_epicgrid([
        "stats", "--data", &data, "--scope", "epic", "--id", "404",
    ]));
}

#[test]
fn check_accepts_valid_tree_and_rejects_misplaced_task() {
    let good = TempDirGuard::new("check-good");
    write_sample_project(good.path());
    let output = run_epicgrid(["check", "--data", &data_arg(good.path()), "--json"]);
    assert_success(&output);
    let report = parse_json_stdout(&output);
    assert_eq!(report["result"], "accepted");
    assert_eq!(report["checkKind"], "epicgrid.hierarchy.check.v1");

    let bad = TempDirGuard::new("check-bad");
    write_project(
        bad.path(),
        &[
            issue_line(1, "Epic", "Alpha", None, None),
            issue_line(2, "Task", "Stray", Some(1), None),
        ],
    );
    let output = run_epicgrid(["check", "--data", &data_arg(bad.path())]);
    assert_failure(&output);
    assert!(stdout_text(&output).contains("[hierarchy] FAIL"));
}

#[test]
fn board_applies_actions_in_order() {
    let tmp = TempDirGuard::new("board");
    write_sample_project(tmp.path());
    let actions = tmp.path().join("actions.json");
    fs::write(
        &actions,
        r#"[
  {"action": "reorderEpics", "sourceId": "7", "targetId": "1"},
  {"action": "reorderTasks", "sourceId": "99", "targetId": "5"},
  {"action": "reorderUserStories", "sourceId": "4", "targetId": "",
   "targetData": {"isAddButton": true, "featureId": "2"}}
]"#,
    )
    .expect("actions should be written");

    let output = run_epicgrid([
        "board",
        "--data",
        &data_arg(tmp.path()),
        "--actions",
        &actions.display().to_string(),
        "--json",
    ]);
    assert_success(&output);
    let result = parse_json_stdout(&output);
    assert_eq!(
        result["outcomes"],
        serde_json::json!([
            "reorderEpics reordered",
            "reorderTasks ignored:source_missing",
            "reorderUserStories appended",
        ])
    );
    assert_eq!(result["epic_order"], serde_json::json!(["7", "1"]));
}

#[test]
fn board_rejects_malformed_actions_file() {
    let tmp = TempDirGuard::new("board-bad");
    write_sample_project(tmp.path());
    let actions = tmp.path().join("actions.json");
    fs::write(&actions, r#"[{"action": "shuffle"}]"#).expect("actions should be written");

    let output = run_epicgrid([
        "board",
        "--data",
        &data_arg(tmp.path()),
        "--actions",
        &actions.display().to_string(),
    ]);
    assert_failure(&output);
}
