use epicgrid_core::{ProjectData, ProjectError, StoreError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard(PathBuf);

impl TempDirGuard {
    fn new(label: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "epicgrid-core-{label}-{}-{nanos}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self(path)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

const PROJECT_JSON: &str = r#"{
  "project": {"id": 1, "name": "Demo", "identifier": "demo"},
  "versions": [
    {"id": 20, "name": "Sprint 2", "effective_date": "2025-03-01"},
    {"id": 10, "name": "Sprint 1", "status": "closed"}
  ],
  "users": [{"id": 7, "login": "ana", "firstname": "Ana", "lastname": "Lima"}],
  "members": [{"user_id": 7, "permissions": ["view_issues"]}],
  "trackers": [{"id": 1, "name": "Epic"}, {"id": 2, "name": "Feature"}]
}"#;

fn write_fixture(dir: &Path, issues: &str) {
    fs::write(dir.join("project.json"), PROJECT_JSON).expect("project.json");
    fs::write(dir.join("issues.jsonl"), issues).expect("issues.jsonl");
}

#[test]
fn loads_project_directory_and_numbers_tree() {
    let tmp = TempDirGuard::new("load");
    write_fixture(
        tmp.path(),
        concat!(
            "{\"id\":1,\"subject\":\"E\",\"tracker\":\"Epic\",\"created_on\":\"2025-01-01T00:00:00Z\"}\n",
            "{\"id\":2,\"subject\":\"F\",\"tracker\":\"Feature\",\"parent_id\":1,\"created_on\":\"2025-01-02T00:00:00Z\"}\n",
        ),
    );

    let data = ProjectData::load_dir(tmp.path()).expect("project should load");
    assert_eq!(data.project.identifier, "demo");
    assert_eq!(data.versions.iter().map(|v| v.id).collect::<Vec<_>>(), vec![10, 20]);
    assert_eq!(data.issues.len(), 2);
    assert!(data.issues.is_descendant_of(2, 1));
    assert_eq!(data.member_users().len(), 1);
    assert_eq!(data.tracker_id("Feature"), Some(2));
}

#[test]
fn dangling_parent_fails_load() {
    let tmp = TempDirGuard::new("dangling");
    write_fixture(
        tmp.path(),
        "{\"id\":2,\"subject\":\"F\",\"tracker\":\"Feature\",\"parent_id\":1,\"created_on\":\"2025-01-02T00:00:00Z\"}\n",
    );

    match ProjectData::load_dir(tmp.path()) {
        Err(ProjectError::Store(StoreError::ParentNotFound { issue_id, parent_id })) => {
            assert_eq!((issue_id, parent_id), (2, 1));
        }
        other => panic!("expected dangling parent error, got {other:?}"),
    }
}

#[test]
fn save_and_reload_preserves_issues() {
    let src = TempDirGuard::new("save-src");
    write_fixture(
        src.path(),
        "{\"id\":1,\"subject\":\"E\",\"tracker\":\"Epic\",\"created_on\":\"2025-01-01T00:00:00Z\"}\n",
    );
    let data = ProjectData::load_dir(src.path()).expect("load");

    let dst = TempDirGuard::new("save-dst");
    data.save_dir(dst.path()).expect("save");
    let again = ProjectData::load_dir(dst.path()).expect("reload");
    assert_eq!(again.issues.issue(1), data.issues.issue(1));
    assert_eq!(again.versions, data.versions);
}
