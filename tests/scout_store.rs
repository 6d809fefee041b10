use pickscout::scout_store::{ScoutSource, ScoutStore, ScoutSubmission};
use pickscout::variability::Comparison;

const SUBMISSION: &str = r#"{
  "event_key": "2026casj",
  "match_num": 12,
  "scouter_id": 7,
  "teams": [
    { "team_number": "254", "auto_climb": "Yes", "teleop_climb": "yes", "defense_pct": 20, "defended_against_pct": 50 },
    { "team_number": "1678", "auto_climb": "no", "teleop_climb": " YES ", "defense_pct": 60, "defended_against_pct": 0 },
    { "team_number": "971", "auto_climb": "", "teleop_climb": "no", "defense_pct": 0, "defended_against_pct": 10 }
  ],
  "rankings": {
    "Match Efficiency": {
      "HIGH": ["254"],
      "MID": ["1678"],
      "LOW": ["971"]
    },
    "Intake Efficiency": {
      "HIGH": ["971", "1678"]
    }
  }
}"#;

fn submission() -> ScoutSubmission {
    serde_json::from_str(SUBMISSION).expect("submission json")
}

fn comparison(team_a: i64, team_b: i64, diff: i32) -> Comparison {
    Comparison {
        team_a,
        team_b,
        diff,
    }
}

#[test]
fn tiers_expand_into_weighted_comparisons() {
    let mut store = ScoutStore::in_memory().expect("store");
    let summary = store.save_submission(&submission()).expect("save");
    assert_eq!(summary.teams_saved, 3);
    // A single tier implies no comparisons.
    assert_eq!(summary.comparisons_saved, 3);

    let comps = store
        .comparisons("2026casj", "Match Efficiency")
        .expect("comparisons");
    assert_eq!(
        comps,
        vec![
            comparison(254, 1678, 1),
            comparison(254, 971, 2),
            comparison(1678, 971, 1),
        ]
    );
    assert!(
        store
            .comparisons("2026casj", "Intake Efficiency")
            .expect("comparisons")
            .is_empty()
    );
    assert!(
        store
            .comparisons("2026cada", "Match Efficiency")
            .expect("comparisons")
            .is_empty()
    );
}

#[test]
fn aggregates_average_submissions() {
    let mut store = ScoutStore::in_memory().expect("store");
    store.save_submission(&submission()).expect("first save");
    let mut second = submission();
    second.match_num = 20;
    second.teams[0].auto_climb = "no".to_string();
    second.teams[0].defense_pct = 40;
    second.rankings.clear();
    store.save_submission(&second).expect("second save");

    let aggs = store.scout_aggregates("2026casj").expect("aggregates");
    assert_eq!(aggs.len(), 3);

    let a = &aggs["254"];
    assert_eq!(a.scouted_matches, 2);
    assert_eq!(a.defense_pct, 30.0);
    assert_eq!(a.defended_against_pct, 50.0);
    assert_eq!(a.auto_climb_rate, 0.5);
    assert_eq!(a.teleop_climb_rate, 1.0);

    let b = &aggs["1678"];
    assert_eq!(b.auto_climb_rate, 0.0);
    assert_eq!(b.teleop_climb_rate, 1.0);

    assert!(store.scout_aggregates("2026cada").expect("other").is_empty());
}

#[test]
fn clearing_removes_rows() {
    let mut store = ScoutStore::in_memory().expect("store");
    store.save_submission(&submission()).expect("save");
    let mut other = submission();
    other.event_key = "2026cada".to_string();
    store.save_submission(&other).expect("save other");

    assert_eq!(store.scouted_events().expect("events"), vec!["2026cada", "2026casj"]);

    let removed = store.clear_event("2026casj").expect("clear event");
    assert_eq!(removed, 6);
    assert_eq!(store.scouted_events().expect("events"), vec!["2026cada"]);
    assert!(
        store
            .comparisons("2026casj", "Match Efficiency")
            .expect("comparisons")
            .is_empty()
    );

    assert_eq!(store.clear_all().expect("clear all"), 6);
    assert!(store.scouted_events().expect("events").is_empty());
}

#[test]
fn unusable_db_directory_is_reported() {
    let blocker = std::env::temp_dir().join(format!("pickscout-blocker-{}", std::process::id()));
    std::fs::write(&blocker, b"not a directory").expect("write blocker file");

    let err = match ScoutStore::open(&blocker.join("nested").join("scout.sqlite")) {
        Ok(_) => panic!("open should fail under a regular file"),
        Err(err) => err,
    };
    std::fs::remove_file(&blocker).ok();
    assert!(format!("{err:#}").contains("create db directory"), "{err:#}");
}

#[test]
fn bad_team_numbers_fail_loudly() {
    let mut store = ScoutStore::in_memory().expect("store");
    let mut sub = submission();
    sub.rankings
        .get_mut("Match Efficiency")
        .expect("category")
        .values_mut()
        .for_each(|teams| teams.iter_mut().for_each(|t| *t = format!("frc{t}")));
    store.save_submission(&sub).expect("save");
    assert!(store.comparisons("2026casj", "Match Efficiency").is_err());
}
