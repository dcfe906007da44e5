use chrono::{TimeZone, Utc};
use epicgrid_board::{Board, BoardAction, CellMove, ReorderArgs, TargetData, reduce_all};
use epicgrid_core::{Issue, IssueId, Project, ProjectData, ProjectFile, Version};
use epicgrid_index::{GridPayload, GridRequest, ResponseStamp, present_grid};

fn issue(id: IssueId, tracker: &str, parent: Option<IssueId>) -> Issue {
    let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(id as i64);
    let mut issue = Issue::new(id, tracker, format!("{tracker} {id}"), created);
    issue.parent_id = parent;
    issue
}

fn payload() -> GridPayload {
    let file = ProjectFile {
        project: Project {
            id: 1,
            name: "Board".to_string(),
            identifier: "board".to_string(),
            description: String::new(),
        },
        versions: vec![Version::new(10, "V1"), Version::new(20, "V2")],
        users: Vec::new(),
        statuses: Vec::new(),
        trackers: Vec::new(),
        members: Vec::new(),
    };
    let data = ProjectData::new(
        file,
        vec![
            issue(1, "Epic", None),
            issue(2, "Feature", Some(1)).with_version(10),
            issue(3, "Feature", Some(1)),
            issue(4, "UserStory", Some(2)).with_version(10),
            issue(5, "UserStory", Some(2)),
            issue(6, "Task", Some(4)).with_version(10),
            issue(7, "Bug", Some(4)).with_version(10),
            issue(8, "Epic", None),
        ],
    )
    .expect("fixture project should build");
    let stamp = ResponseStamp {
        timestamp: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        request_id: "req_0123456789abcdef".to_string(),
    };
    present_grid(&data, &GridRequest::default(), true, &stamp)
}

#[test]
fn board_has_a_cell_for_every_epic_and_version() {
    let board = Board::from_payload(&payload());

    assert_eq!(board.cells.len(), 6);
    let cell = board.cell("1", "10").expect("cell 1:10");
    assert_eq!(cell.features.len(), 1);
    assert_eq!(cell.features[0].id, "2");
    assert_eq!(board.cell("1", "none").expect("cell 1:none").features[0].id, "3");
    assert!(board.cell("8", "20").expect("cell 8:20").features.is_empty());

    let story = board.story("4").expect("story 4");
    assert_eq!(story.version_id, "10");
    assert_eq!(story.tasks, vec!["6"]);
    assert_eq!(story.bugs, vec!["7"]);
    assert_eq!(board.story("5").expect("story 5").version_id, "none");
}

#[test]
fn board_round_trips_the_payload_index() {
    let payload = payload();
    let board = Board::from_payload(&payload);
    assert_eq!(board.grid_index(), payload.grid.index);
}

#[test]
fn empty_cell_accepts_a_feature_then_a_story() {
    let board = Board::from_payload(&payload());
    let actions = [
        BoardAction::ReorderFeatures(ReorderArgs::add_button(
            "3",
            TargetData {
                epic_id: Some("8".to_string()),
                version_id: Some("20".to_string()),
                ..TargetData::default()
            },
        )),
        BoardAction::MoveUserStoryToCell(CellMove {
            story_id: "5".to_string(),
            epic_id: "8".to_string(),
            feature_id: "3".to_string(),
            version_id: "20".to_string(),
        }),
    ];

    let next = reduce_all(&board, &actions);

    assert!(next.cell("1", "none").expect("cell 1:none").features.is_empty());
    assert_eq!(next.cell("8", "20").expect("cell 8:20").features[0].id, "3");
    let index = next.grid_index();
    assert_eq!(index["8:3:20"], vec!["5"]);
    assert_eq!(index["1:2:10"], vec!["4"]);
    assert!(!index.contains_key("1:2:none"));
    assert_eq!(board.grid_index().len(), 2);
}
