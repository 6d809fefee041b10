use std::fs;
use std::path::PathBuf;

use pickscout::epa::{EpaConfig, compute_event_epa};
use pickscout::pairwise_api::parse_analysis_json;
use pickscout::tba::{CompLevel, ScoreBreakdown, parse_events_json, parse_matches_json};
use pickscout::variability::build_summary;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_tba_matches_fixture() {
    let raw = read_fixture("tba_matches.json");
    let rows = parse_matches_json(&raw).expect("fixture should parse");
    let keys: Vec<&str> = rows.iter().map(|m| m.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["2026casj_qm1", "2026casj_qm2", "2026casj_qm3", "2026casj_sf1m1"]
    );

    let qm1 = &rows[0];
    assert!(qm1.is_qualification());
    assert_eq!(qm1.red.teams, vec!["254", "1678", "971"]);
    assert_eq!(qm1.red.score, Some(64));
    assert_eq!(
        qm1.red.breakdown,
        Some(ScoreBreakdown {
            hub_score: 60,
            foul_points: 4
        })
    );

    // Older breakdowns only carry teleopPoints.
    assert_eq!(rows[1].red.breakdown.map(|b| b.hub_score), Some(70));

    let unplayed = &rows[2];
    assert!(!unplayed.is_played());
    assert_eq!(unplayed.red.score, None);
    assert_eq!(unplayed.blue.breakdown, None);

    assert_eq!(rows[3].comp_level, CompLevel::SemiFinal);
}

#[test]
fn empty_match_payloads_are_empty() {
    assert!(parse_matches_json("").expect("empty body").is_empty());
    assert!(parse_matches_json("null").expect("null body").is_empty());
    assert!(parse_matches_json("[]").expect("empty array").is_empty());
    assert!(parse_matches_json("{\"oops\": 1}").is_err());
}

#[test]
fn fixture_schedule_rates_only_played_qualifications() {
    let rows = parse_matches_json(&read_fixture("tba_matches.json")).expect("fixture");
    let ratings = compute_event_epa(&rows, EpaConfig::default());
    assert_eq!(ratings.len(), 6);
    assert!(ratings.iter().all(|e| e.offense.is_finite()));
}

#[test]
fn parses_tba_events_fixture() {
    let raw = read_fixture("tba_events.json");
    let events = parse_events_json(&raw).expect("fixture should parse");
    let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Championship", "Sacramento Regional", "Silicon Valley Regional"]
    );
    assert_eq!(events[0].start_date, None);
    assert_eq!(events[2].key, "2026casj");
    assert_eq!(events[2].start_date.as_deref(), Some("2026-03-25"));
}

#[test]
fn parses_pairwise_fixture_into_summary() {
    let raw = read_fixture("pairwise_analysis.json");
    let result = parse_analysis_json(&raw).expect("fixture should parse");
    assert_eq!(result.rankings.len(), 3);
    assert_eq!(result.stats.matrix_rank, 2);
    assert_eq!(result.validation.messages, vec!["ok"]);

    let summary = build_summary(&result);
    assert_eq!(summary.stability, 2.0);
    let teams: Vec<i64> = summary.variabilities.iter().map(|v| v.team).collect();
    assert_eq!(teams, vec![254, 1678, 971]);

    let raw: Vec<f64> = summary.variabilities.iter().map(|v| v.raw_variation).collect();
    assert!((raw[0] - 1.6).abs() < 1e-9);
    assert!((raw[1] - 1.2).abs() < 1e-9);
    assert_eq!(raw[2], 0.0);

    let norm: Vec<f64> = summary.variabilities.iter().map(|v| v.normalized).collect();
    assert!((norm[0] - 1.0).abs() < 1e-9);
    assert!((norm[1] - 0.75).abs() < 1e-9);
    assert_eq!(norm[2], 0.0);
}

#[test]
fn sparse_pairwise_payload_uses_defaults() {
    let result = parse_analysis_json("{\"rankings\": []}").expect("sparse payload");
    let summary = build_summary(&result);
    assert!(summary.variabilities.is_empty());
    assert!(summary.stability.is_nan());
    assert!(parse_analysis_json("not json").is_err());
}
