use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

use pickscout::epa::{EpaConfig, compute_event_epa};
use pickscout::formula::Formula;
use pickscout::picklist::{TeamVars, rank_teams};
use pickscout::tba::{Alliance, CompLevel, EventMatch, ScoreBreakdown};

const TEAMS: usize = 60;
const QUALS: u32 = 90;
const FORMULA: &str = "#epa + 12 * #teleop_climb_rate - 0.5 * #foul_epa + (#wins - #losses) / 2";

fn synthetic_schedule(rng: &mut StdRng) -> Vec<EventMatch> {
    let roster: Vec<String> = (0..TEAMS).map(|i| (100 + i * 17).to_string()).collect();
    (1..=QUALS)
        .map(|n| {
            let picked: Vec<String> = roster.choose_multiple(&mut *rng, 6).cloned().collect();
            let mut side = |teams: &[String]| {
                let hub = rng.gen_range(20..140);
                let fouls = rng.gen_range(0..15);
                Alliance {
                    teams: teams.to_vec(),
                    score: Some(hub + fouls),
                    breakdown: Some(ScoreBreakdown {
                        hub_score: hub,
                        foul_points: fouls,
                    }),
                }
            };
            let red = side(&picked[..3]);
            let blue = side(&picked[3..]);
            EventMatch {
                key: format!("2026bench_qm{n}"),
                match_number: n,
                comp_level: CompLevel::Qualification,
                red,
                blue,
            }
        })
        .collect()
}

fn synthetic_table(rng: &mut StdRng) -> Vec<(String, TeamVars)> {
    (0..TEAMS)
        .map(|i| {
            let vars = TeamVars {
                epa: rng.gen_range(5.0..60.0),
                foul_epa: rng.gen_range(0.0..4.0),
                teleop_climb_rate: rng.gen_range(0.0..1.0),
                matches: 12,
                wins: rng.gen_range(0..12),
                losses: rng.gen_range(0..12),
                ..TeamVars::default()
            };
            ((100 + i * 17).to_string(), vars)
        })
        .collect()
}

fn bench_formula(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let table = synthetic_table(&mut rng);

    c.bench_function("formula_parse", |b| {
        b.iter(|| Formula::parse(black_box(FORMULA)).expect("valid formula"))
    });
    c.bench_function("rank_teams_event", |b| {
        b.iter(|| rank_teams(black_box(&table), black_box(FORMULA)))
    });
}

fn bench_epa(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let schedule = synthetic_schedule(&mut rng);

    c.bench_function("event_epa", |b| {
        b.iter(|| compute_event_epa(black_box(&schedule), EpaConfig::default()))
    });
}

criterion_group!(benches, bench_formula, bench_epa);
criterion_main!(benches);
