use std::collections::HashMap;

use serde::Serialize;

use crate::tba::{Alliance, EventMatch};

const ALLIANCE_SIZE: f64 = 3.0;

#[derive(Debug, Clone, Copy)]
pub struct EpaConfig {
    /// Offense learning rate.
    pub k: f64,
    pub def_k: f64,
    pub foul_k: f64,
    pub initial_offense: f64,
    /// Offense credited to a team the engine is not tracking.
    pub unknown_offense: f64,
}

impl Default for EpaConfig {
    fn default() -> Self {
        Self {
            k: 0.05,
            def_k: 0.1,
            foul_k: 0.5,
            initial_offense: 20.0,
            unknown_offense: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamEpa {
    pub team: String,
    pub offense: f64,
    pub defense: f64,
    pub foul: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct AllianceStrength {
    raw_offense: f64,
    defense: f64,
    foul_pred: f64,
}

#[derive(Debug, Clone, Copy)]
struct Deltas {
    offense: f64,
    defense: f64,
    foul: f64,
}

/// Per-event rating state. Ratings live only as long as the engine; nothing carries over
/// between events.
#[derive(Debug, Clone)]
pub struct EpaEngine {
    cfg: EpaConfig,
    ratings: Vec<TeamEpa>,
    index: HashMap<String, usize>,
}

impl EpaEngine {
    pub fn new(cfg: EpaConfig) -> Self {
        Self {
            cfg,
            ratings: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Start tracking `team` at the baseline rating. Returns false if it was already tracked.
    pub fn register(&mut self, team: &str) -> bool {
        if self.index.contains_key(team) {
            return false;
        }
        self.index.insert(team.to_string(), self.ratings.len());
        self.ratings.push(TeamEpa {
            team: team.to_string(),
            offense: self.cfg.initial_offense,
            defense: 0.0,
            foul: 0.0,
        });
        true
    }

    pub fn rating(&self, team: &str) -> Option<&TeamEpa> {
        self.index.get(team).map(|&i| &self.ratings[i])
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Apply one match. Returns false when the match is skipped: not a qualification match, or
    /// no usable breakdown (both hub scores zero).
    ///
    /// A match where only one alliance scored zero is still applied; a shutout is a real result.
    pub fn apply_match(&mut self, m: &EventMatch) -> bool {
        if !m.is_qualification() {
            return false;
        }
        let (red_actual, red_fouls) = breakdown_figures(&m.red);
        let (blue_actual, blue_fouls) = breakdown_figures(&m.blue);
        if red_actual == 0.0 && blue_actual == 0.0 {
            return false;
        }

        let red = self.strength(&m.red.teams);
        let blue = self.strength(&m.blue.teams);

        let red_deltas = self.deltas(&red, &blue, red_actual, blue_actual, blue_fouls);
        let blue_deltas = self.deltas(&blue, &red, blue_actual, red_actual, red_fouls);

        self.apply_deltas(&m.red.teams, red_deltas);
        self.apply_deltas(&m.blue.teams, blue_deltas);
        true
    }

    /// Current ratings, best offense first. Equal offense keeps discovery order.
    pub fn snapshot(&self) -> Vec<TeamEpa> {
        let mut out = self.ratings.clone();
        out.sort_by(|a, b| {
            b.offense
                .partial_cmp(&a.offense)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    fn strength(&self, teams: &[String]) -> AllianceStrength {
        teams
            .iter()
            .fold(AllianceStrength::default(), |mut acc, team| {
                match self.rating(team) {
                    Some(e) => {
                        acc.raw_offense += e.offense;
                        acc.defense += e.defense;
                        acc.foul_pred += e.foul;
                    }
                    None => acc.raw_offense += self.cfg.unknown_offense,
                }
                acc
            })
    }

    fn deltas(
        &self,
        own: &AllianceStrength,
        opp: &AllianceStrength,
        own_actual: f64,
        opp_actual: f64,
        opp_fouls: f64,
    ) -> Deltas {
        let expected = (own.raw_offense - opp.defense).max(0.0);
        Deltas {
            offense: (own_actual - expected) * self.cfg.k,
            defense: (opp.raw_offense - opp_actual) * self.cfg.def_k,
            foul: (opp_fouls - own.foul_pred) * self.cfg.foul_k,
        }
    }

    fn apply_deltas(&mut self, teams: &[String], deltas: Deltas) {
        for team in teams {
            let Some(&i) = self.index.get(team) else {
                continue;
            };
            let e = &mut self.ratings[i];
            e.offense += deltas.offense / ALLIANCE_SIZE;
            e.defense += deltas.defense / ALLIANCE_SIZE;
            e.foul += deltas.foul / ALLIANCE_SIZE;
        }
    }
}

fn breakdown_figures(alliance: &Alliance) -> (f64, f64) {
    alliance
        .breakdown
        .map(|b| (b.hub_score as f64, b.foul_points as f64))
        .unwrap_or((0.0, 0.0))
}

/// Rate one event. Every team appearing in a qualification match is tracked from the start,
/// then matches are applied in the order given, which must be chronological.
pub fn compute_event_epa(matches: &[EventMatch], cfg: EpaConfig) -> Vec<TeamEpa> {
    let mut engine = EpaEngine::new(cfg);
    for m in matches.iter().filter(|m| m.is_qualification()) {
        for team in m.red.teams.iter().chain(m.blue.teams.iter()) {
            engine.register(team);
        }
    }

    let applied = matches.iter().filter(|m| engine.apply_match(m)).count();
    tracing::debug!(
        teams = engine.len(),
        matches = matches.len(),
        applied,
        "computed event epa"
    );
    engine.snapshot()
}
