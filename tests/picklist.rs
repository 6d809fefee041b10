use std::collections::HashMap;

use pickscout::epa::TeamEpa;
use pickscout::picklist::{
    MatchRecord, PickInputs, PickVar, TeamVars, build_team_table, match_records, rank_teams,
};
use pickscout::scout_store::ScoutAggregate;
use pickscout::tba::{Alliance, CompLevel, EventMatch};
use pickscout::variability::{AnalysisSummary, FactorizationStats, TeamVariability};

fn epa(team: &str, offense: f64, defense: f64) -> TeamEpa {
    TeamEpa {
        team: team.to_string(),
        offense,
        defense,
        foul: 0.0,
    }
}

fn vars(epa: f64, climb: f64) -> TeamVars {
    TeamVars {
        epa,
        teleop_climb_rate: climb,
        ..TeamVars::default()
    }
}

fn table() -> Vec<(String, TeamVars)> {
    vec![
        ("254".to_string(), vars(40.0, 0.0)),
        ("1678".to_string(), vars(35.0, 1.0)),
        ("971".to_string(), vars(30.0, 0.5)),
    ]
}

fn scheduled(
    n: u32,
    level: CompLevel,
    red: &[&str],
    blue: &[&str],
    score: Option<(i32, i32)>,
) -> EventMatch {
    let side = |teams: &[&str], s: Option<i32>| Alliance {
        teams: teams.iter().map(|t| t.to_string()).collect(),
        score: s,
        breakdown: None,
    };
    EventMatch {
        key: format!("2026test_{n}"),
        match_number: n,
        comp_level: level,
        red: side(red, score.map(|s| s.0)),
        blue: side(blue, score.map(|s| s.1)),
    }
}

#[test]
fn formula_reorders_teams() {
    let list = rank_teams(&table(), "#epa + 25 * #teleop_climb_rate");
    assert!(list.formula_error.is_none());
    let order: Vec<&str> = list.rows.iter().map(|r| r.team.as_str()).collect();
    assert_eq!(order, vec!["1678", "971", "254"]);
    assert_eq!(list.rows[0].score, 60.0);
    assert!(list.rows.iter().all(|r| !r.fallback));
    assert_eq!(list.used_vars, vec!["epa", "teleop_climb_rate"]);
    assert_eq!(list.rows[0].vars[1].name, "teleop_climb_rate");
    assert_eq!(list.rows[0].vars[1].value, 1.0);
}

#[test]
fn malformed_formula_scores_by_epa() {
    for bad in ["#epa +", "(#epa", "#nope * 2", "#epa $ 3", ""] {
        let list = rank_teams(&table(), bad);
        assert!(list.formula_error.is_some(), "{bad:?} should be rejected");
        for row in &list.rows {
            let (_, v) = table()
                .into_iter()
                .find(|(t, _)| *t == row.team)
                .expect("team in table");
            assert_eq!(row.score, v.epa);
            assert!(row.fallback);
        }
        let order: Vec<&str> = list.rows.iter().map(|r| r.team.as_str()).collect();
        assert_eq!(order, vec!["254", "1678", "971"]);
    }
}

#[test]
fn per_team_failure_only_affects_that_team() {
    // Only 971 has no climb, so only it divides by zero.
    let mut t = table();
    t[0].1.teleop_climb_rate = 2.0;
    t[2].1.teleop_climb_rate = 0.0;
    let list = rank_teams(&t, "#epa / #teleop_climb_rate");
    assert!(list.formula_error.is_none());

    let row = list.rows.iter().find(|r| r.team == "971").expect("971 ranked");
    assert!(row.fallback);
    assert_eq!(row.score, 30.0);
    let row = list.rows.iter().find(|r| r.team == "1678").expect("1678 ranked");
    assert!(!row.fallback);
    assert_eq!(row.score, 35.0);
}

#[test]
fn equal_scores_keep_table_order() {
    let list = rank_teams(&table(), "1");
    let order: Vec<&str> = list.rows.iter().map(|r| r.team.as_str()).collect();
    assert_eq!(order, vec!["254", "1678", "971"]);
    assert!(list.used_vars.is_empty());
}

#[test]
fn signed_zero_scores_are_ties() {
    let t = vec![
        ("A".to_string(), vars(-5.0, 0.0)),
        ("B".to_string(), vars(5.0, 0.0)),
    ];
    let list = rank_teams(&t, "#epa * #wins");
    let order: Vec<&str> = list.rows.iter().map(|r| r.team.as_str()).collect();
    assert_eq!(order, vec!["A", "B"]);
    assert!(list.rows.iter().all(|r| r.score == 0.0 && !r.fallback));
}

#[test]
fn oversized_formula_falls_back_to_epa() {
    let flat = vec!["#epa"; 100_000].join(" + ");
    let nested = format!("{}#epa{}", "(".repeat(20_000), ")".repeat(20_000));
    for formula in [flat, nested] {
        let list = rank_teams(&table(), &formula);
        assert!(list.formula_error.is_some());
        assert_eq!(list.rows.len(), 3);
        for row in &list.rows {
            assert!(row.fallback);
        }
        let scores: Vec<f64> = list.rows.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![40.0, 35.0, 30.0]);
    }
}

#[test]
fn every_registry_variable_is_accepted() {
    let formula = PickVar::ALL
        .iter()
        .map(|v| format!("#{}", v.name()))
        .collect::<Vec<_>>()
        .join(" + ");
    let list = rank_teams(&table(), &formula);
    assert!(list.formula_error.is_none(), "{:?}", list.formula_error);
    assert_eq!(list.used_vars.len(), PickVar::ALL.len());
}

#[test]
fn records_count_qualification_appearances() {
    let schedule = vec![
        scheduled(1, CompLevel::Qualification, &["1", "2", "3"], &["4", "5", "6"], Some((50, 40))),
        scheduled(2, CompLevel::Qualification, &["1", "4", "7"], &["2", "5", "8"], Some((30, 30))),
        scheduled(3, CompLevel::Qualification, &["1", "5", "9"], &["2", "6", "7"], None),
        scheduled(1, CompLevel::Final, &["1", "2", "3"], &["4", "5", "6"], Some((90, 10))),
    ];
    let records = match_records(&schedule);

    assert_eq!(
        records["1"],
        MatchRecord {
            matches: 3,
            wins: 1,
            losses: 0
        }
    );
    assert_eq!(
        records["4"],
        MatchRecord {
            matches: 2,
            wins: 0,
            losses: 1
        }
    );
    assert_eq!(records["9"].matches, 1);
    assert_eq!(records["9"].wins + records["9"].losses, 0);
}

#[test]
fn table_joins_every_source() {
    let epa_rows = vec![epa("254", 40.0, 2.0), epa("1678", 35.0, 1.0)];
    let categories = vec![(
        "Match Efficiency".to_string(),
        AnalysisSummary {
            variabilities: vec![TeamVariability {
                team: 1678,
                raw_variation: 0.4,
                normalized: 0.25,
                rank: 1,
                ranking_score: 0.9,
            }],
            stability: 3.0,
            stats: FactorizationStats::default(),
        },
    )];
    let mut scouting = HashMap::new();
    scouting.insert(
        "971".to_string(),
        ScoutAggregate {
            defense_pct: 40.0,
            auto_climb_rate: 0.5,
            scouted_matches: 2,
            ..ScoutAggregate::default()
        },
    );
    let mut records = HashMap::new();
    records.insert(
        "254".to_string(),
        MatchRecord {
            matches: 4,
            wins: 3,
            losses: 1,
        },
    );

    let table = build_team_table(PickInputs {
        epa: &epa_rows,
        categories: &categories,
        scouting: &scouting,
        records: &records,
    });
    let teams: Vec<&str> = table.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(teams, vec!["254", "1678", "971"]);

    let (_, t254) = &table[0];
    assert_eq!(t254.defense_epa, 2.0);
    assert_eq!(t254.wins, 3);
    let (_, t1678) = &table[1];
    assert_eq!(t1678.match_efficiency, 0.9);
    assert_eq!(t1678.match_efficiency_var, 0.25);
    assert_eq!(t1678.intake_efficiency, 0.0);
    let (_, t971) = &table[2];
    assert_eq!(t971.epa, 0.0);
    assert_eq!(t971.defense_pct, 40.0);
    assert_eq!(t971.get(PickVar::AutoClimbRate), 0.5);
}
