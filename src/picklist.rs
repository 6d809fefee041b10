use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::epa::TeamEpa;
use crate::formula::{Formula, FormulaError, find_vars};
use crate::scout_store::ScoutAggregate;
use crate::tba::EventMatch;
use crate::variability::AnalysisSummary;

/// The closed set of variables a pick-list formula may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PickVar {
    Epa,
    DefenseEpa,
    FoulEpa,
    DefensePct,
    DefendedAgainstPct,
    MatchEfficiency,
    MatchEfficiencyVar,
    IntakeEfficiency,
    IntakeEfficiencyVar,
    AutoClimbRate,
    TeleopClimbRate,
    Matches,
    Wins,
    Losses,
}

impl PickVar {
    pub const ALL: [PickVar; 14] = [
        PickVar::Epa,
        PickVar::DefenseEpa,
        PickVar::FoulEpa,
        PickVar::DefensePct,
        PickVar::DefendedAgainstPct,
        PickVar::MatchEfficiency,
        PickVar::MatchEfficiencyVar,
        PickVar::IntakeEfficiency,
        PickVar::IntakeEfficiencyVar,
        PickVar::AutoClimbRate,
        PickVar::TeleopClimbRate,
        PickVar::Matches,
        PickVar::Wins,
        PickVar::Losses,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PickVar::Epa => "epa",
            PickVar::DefenseEpa => "defense_epa",
            PickVar::FoulEpa => "foul_epa",
            PickVar::DefensePct => "defense_pct",
            PickVar::DefendedAgainstPct => "defended_against_pct",
            PickVar::MatchEfficiency => "match_efficiency",
            PickVar::MatchEfficiencyVar => "match_efficiency_var",
            PickVar::IntakeEfficiency => "intake_efficiency",
            PickVar::IntakeEfficiencyVar => "intake_efficiency_var",
            PickVar::AutoClimbRate => "auto_climb_rate",
            PickVar::TeleopClimbRate => "teleop_climb_rate",
            PickVar::Matches => "matches",
            PickVar::Wins => "wins",
            PickVar::Losses => "losses",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }
}

/// Pairwise categories with a slot in the variable namespace. Other categories are analyzed
/// but cannot be referenced from a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySlot {
    MatchEfficiency,
    IntakeEfficiency,
}

impl CategorySlot {
    pub fn from_category(category: &str) -> Option<Self> {
        let key = category.trim().to_lowercase().replace(' ', "_");
        match key.as_str() {
            // Older scouting configs shipped with the misspelling.
            "match_efficiency" | "match_efficency" => Some(CategorySlot::MatchEfficiency),
            "intake_efficiency" | "intake_efficency" => Some(CategorySlot::IntakeEfficiency),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub matches: u32,
    pub wins: u32,
    pub losses: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamVars {
    pub epa: f64,
    pub defense_epa: f64,
    pub foul_epa: f64,
    pub defense_pct: f64,
    pub defended_against_pct: f64,
    pub match_efficiency: f64,
    pub match_efficiency_var: f64,
    pub intake_efficiency: f64,
    pub intake_efficiency_var: f64,
    pub auto_climb_rate: f64,
    pub teleop_climb_rate: f64,
    pub matches: u32,
    pub wins: u32,
    pub losses: u32,
}

impl TeamVars {
    pub fn get(&self, var: PickVar) -> f64 {
        match var {
            PickVar::Epa => self.epa,
            PickVar::DefenseEpa => self.defense_epa,
            PickVar::FoulEpa => self.foul_epa,
            PickVar::DefensePct => self.defense_pct,
            PickVar::DefendedAgainstPct => self.defended_against_pct,
            PickVar::MatchEfficiency => self.match_efficiency,
            PickVar::MatchEfficiencyVar => self.match_efficiency_var,
            PickVar::IntakeEfficiency => self.intake_efficiency,
            PickVar::IntakeEfficiencyVar => self.intake_efficiency_var,
            PickVar::AutoClimbRate => self.auto_climb_rate,
            PickVar::TeleopClimbRate => self.teleop_climb_rate,
            PickVar::Matches => self.matches as f64,
            PickVar::Wins => self.wins as f64,
            PickVar::Losses => self.losses as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickValue {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickRow {
    pub team: String,
    pub score: f64,
    /// Values of the variables the formula references, in formula order.
    pub vars: Vec<PickValue>,
    /// Score is the team's EPA because the formula could not be evaluated for it.
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickList {
    pub formula: String,
    pub used_vars: Vec<String>,
    pub formula_error: Option<String>,
    pub rows: Vec<PickRow>,
}

/// Everything the compositor joins for one event.
#[derive(Debug, Clone, Copy)]
pub struct PickInputs<'a> {
    pub epa: &'a [TeamEpa],
    pub categories: &'a [(String, AnalysisSummary)],
    pub scouting: &'a HashMap<String, ScoutAggregate>,
    pub records: &'a HashMap<String, MatchRecord>,
}

/// Qualification appearances per team, with wins and losses counted for played matches only.
pub fn match_records(schedule: &[EventMatch]) -> HashMap<String, MatchRecord> {
    let mut out: HashMap<String, MatchRecord> = HashMap::new();
    for m in schedule.iter().filter(|m| m.is_qualification()) {
        let result = match (m.red.score, m.blue.score) {
            (Some(r), Some(b)) => Some(r.cmp(&b)),
            _ => None,
        };
        for team in &m.red.teams {
            tally(out.entry(team.clone()).or_default(), result);
        }
        for team in &m.blue.teams {
            tally(out.entry(team.clone()).or_default(), result.map(|o| o.reverse()));
        }
    }
    out
}

fn tally(record: &mut MatchRecord, result: Option<Ordering>) {
    record.matches += 1;
    match result {
        Some(Ordering::Greater) => record.wins += 1,
        Some(Ordering::Less) => record.losses += 1,
        _ => {}
    }
}

/// Join all sources into one variable table. Teams keep EPA ranking order; teams only seen by
/// other sources follow, in a deterministic order.
pub fn build_team_table(inputs: PickInputs<'_>) -> Vec<(String, TeamVars)> {
    let mut order: Vec<String> = Vec::new();
    let mut table: HashMap<String, TeamVars> = HashMap::new();

    for e in inputs.epa {
        let v = team_entry(&mut table, &mut order, &e.team);
        v.epa = e.offense;
        v.defense_epa = e.defense;
        v.foul_epa = e.foul;
    }

    for (category, summary) in inputs.categories {
        let Some(slot) = CategorySlot::from_category(category) else {
            continue;
        };
        for tv in &summary.variabilities {
            let v = team_entry(&mut table, &mut order, &tv.team.to_string());
            match slot {
                CategorySlot::MatchEfficiency => {
                    v.match_efficiency = tv.ranking_score;
                    v.match_efficiency_var = tv.normalized;
                }
                CategorySlot::IntakeEfficiency => {
                    v.intake_efficiency = tv.ranking_score;
                    v.intake_efficiency_var = tv.normalized;
                }
            }
        }
    }

    let mut scouted: Vec<(&String, &ScoutAggregate)> = inputs.scouting.iter().collect();
    scouted.sort_by(|a, b| a.0.cmp(b.0));
    for (team, agg) in scouted {
        let v = team_entry(&mut table, &mut order, team);
        v.defense_pct = agg.defense_pct;
        v.defended_against_pct = agg.defended_against_pct;
        v.auto_climb_rate = agg.auto_climb_rate;
        v.teleop_climb_rate = agg.teleop_climb_rate;
    }

    let mut recorded: Vec<(&String, &MatchRecord)> = inputs.records.iter().collect();
    recorded.sort_by(|a, b| a.0.cmp(b.0));
    for (team, rec) in recorded {
        let v = team_entry(&mut table, &mut order, team);
        v.matches = rec.matches;
        v.wins = rec.wins;
        v.losses = rec.losses;
    }

    order
        .into_iter()
        .filter_map(|team| {
            let vars = table.remove(&team)?;
            Some((team, vars))
        })
        .collect()
}

fn team_entry<'t>(
    table: &'t mut HashMap<String, TeamVars>,
    order: &mut Vec<String>,
    team: &str,
) -> &'t mut TeamVars {
    if !table.contains_key(team) {
        order.push(team.to_string());
    }
    table.entry(team.to_string()).or_default()
}

/// Score every team with `formula` and rank them, best first. A formula that fails for a team
/// scores that team by its EPA; the batch itself never fails.
pub fn rank_teams(table: &[(String, TeamVars)], formula: &str) -> PickList {
    let used_vars = find_vars(formula);
    let parsed = Formula::parse(formula)
        .and_then(|f| f.check_vars(|name| PickVar::from_name(name).is_some()).map(|_| f));
    let formula_error = parsed.as_ref().err().map(|e| e.to_string());
    if let Some(err) = &formula_error {
        tracing::warn!(formula, error = %err, "pick-list formula rejected, scoring by epa");
    }

    let mut rows: Vec<PickRow> = table
        .iter()
        .map(|(team, vars)| {
            let (score, fallback) = match &parsed {
                Ok(f) => match score_team(f, vars) {
                    Ok(score) => (score, false),
                    Err(err) => {
                        tracing::debug!(team = %team, error = %err, "formula failed for team");
                        (vars.epa, true)
                    }
                },
                Err(_) => (vars.epa, true),
            };
            let referenced = used_vars
                .iter()
                .filter_map(|name| {
                    PickVar::from_name(name).map(|var| PickValue {
                        name: name.clone(),
                        value: vars.get(var),
                    })
                })
                .collect();
            PickRow {
                team: team.clone(),
                score,
                vars: referenced,
                fallback,
            }
        })
        .collect();

    // NaN scores sink to the bottom; everything else descends, stable on ties (0.0 == -0.0).
    rows.sort_by(|a, b| {
        a.score
            .is_nan()
            .cmp(&b.score.is_nan())
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
    });

    PickList {
        formula: formula.to_string(),
        used_vars,
        formula_error,
        rows,
    }
}

fn score_team(formula: &Formula, vars: &TeamVars) -> Result<f64, FormulaError> {
    formula.eval_with(|name| PickVar::from_name(name).map(|var| vars.get(var)))
}
