use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::config::AppConfig;
use crate::epa::{TeamEpa, compute_event_epa};
use crate::pairwise_api::Factorizer;
use crate::picklist::{PickInputs, PickList, build_team_table, match_records, rank_teams};
use crate::scout_store::ScoutSource;
use crate::tba::{EventInfo, EventMatch, MatchSource};
use crate::ttl_cache::{Clock, TtlCache};
use crate::variability::{AnalysisSummary, FactorizationStats, TeamVariability, build_summary};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledVariability {
    #[serde(flatten)]
    pub variability: TeamVariability,
    /// Ranking score rescaled to -100..=100 across the category.
    pub display_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAnalysis {
    pub category: String,
    pub variabilities: Vec<ScaledVariability>,
    pub stability: f64,
    pub stats: FactorizationStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventAnalysis {
    pub event_key: String,
    pub generated_at: String,
    pub categories: Vec<CategoryAnalysis>,
    /// Mean stability over categories that had enough data; NaN when none did.
    pub stability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpaReport {
    pub event_key: String,
    pub generated_at: String,
    pub teams: Vec<TeamEpa>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickListReport {
    pub event_key: String,
    pub generated_at: String,
    pub picklist: PickList,
}

/// Request surfaces over the three collaborators. Each call recomputes its derived data; only
/// collaborator responses are cached.
pub struct ScoutService<M, F, S> {
    config: AppConfig,
    matches: M,
    factorizer: F,
    scouting: S,
    analysis_cache: TtlCache<String, AnalysisSummary>,
    schedule_cache: TtlCache<String, Vec<EventMatch>>,
    event_cache: TtlCache<i32, Vec<EventInfo>>,
}

impl<M, F, S> ScoutService<M, F, S>
where
    M: MatchSource,
    F: Factorizer,
    S: ScoutSource,
{
    pub fn new(config: AppConfig, matches: M, factorizer: F, scouting: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            matches,
            factorizer,
            scouting,
            analysis_cache: TtlCache::new(clock.clone()),
            schedule_cache: TtlCache::new(clock.clone()),
            event_cache: TtlCache::new(clock),
        }
    }

    /// Drop cached analyses for an event, e.g. after its scouting data was cleared.
    pub fn invalidate_event(&self, event_key: &str) {
        for category in &self.config.categories {
            self.analysis_cache.invalidate(&cache_key(event_key, category));
        }
        self.schedule_cache.invalidate(&event_key.to_string());
    }

    pub fn analyze_category(&self, event_key: &str, category: &str) -> Result<AnalysisSummary> {
        let comparisons = self
            .scouting
            .comparisons(event_key, category)
            .with_context(|| format!("load comparisons for {event_key}/{category}"))?;
        tracing::info!(
            event = event_key,
            category,
            comparisons = comparisons.len(),
            "pairwise analysis"
        );
        if comparisons.is_empty() {
            return Ok(AnalysisSummary::empty());
        }

        self.analysis_cache.get_or_compute(
            &cache_key(event_key, category),
            self.config.analysis_ttl,
            || {
                let result = self
                    .factorizer
                    .analyze(&comparisons)
                    .with_context(|| format!("factorization failed for {event_key}/{category}"))?;
                Ok(build_summary(&result))
            },
        )
    }

    pub fn run_analysis(&self, event_key: &str) -> Result<EventAnalysis> {
        let mut categories = Vec::new();
        for category in &self.config.categories {
            let summary = self.analyze_category(event_key, category)?;
            if !summary.has_data() {
                tracing::info!(event = event_key, category = %category, "insufficient pairwise data");
            }
            let scaled = display_scores(&summary.variabilities);
            categories.push(CategoryAnalysis {
                category: category.clone(),
                variabilities: summary
                    .variabilities
                    .into_iter()
                    .zip(scaled)
                    .map(|(variability, display_score)| ScaledVariability {
                        variability,
                        display_score,
                    })
                    .collect(),
                stability: summary.stability,
                stats: summary.stats,
            });
        }

        let stability = mean_stability(categories.iter().map(|c| c.stability));
        Ok(EventAnalysis {
            event_key: event_key.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            categories,
            stability,
        })
    }

    pub fn event_epa(&self, event_key: &str) -> Result<Vec<TeamEpa>> {
        let matches = self
            .matches
            .detailed_matches(event_key)
            .with_context(|| format!("load detailed matches for {event_key}"))?;
        Ok(compute_event_epa(&matches, self.config.epa))
    }

    pub fn epa_report(&self, event_key: &str) -> Result<EpaReport> {
        Ok(EpaReport {
            event_key: event_key.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            teams: self.event_epa(event_key)?,
        })
    }

    pub fn schedule(&self, event_key: &str) -> Result<Vec<EventMatch>> {
        self.schedule_cache.get_or_compute(
            &event_key.to_string(),
            self.config.schedule_ttl,
            || {
                self.matches
                    .simple_matches(event_key)
                    .with_context(|| format!("load match schedule for {event_key}"))
            },
        )
    }

    pub fn events(&self, year: i32) -> Result<Vec<EventInfo>> {
        self.event_cache
            .get_or_compute(&year, self.config.event_ttl, || {
                self.matches
                    .events(year)
                    .with_context(|| format!("load events for {year}"))
            })
    }

    pub fn run_picklist(&self, event_key: &str, formula: &str) -> Result<PickListReport> {
        tracing::info!(event = event_key, formula, "pick-list request");

        let epa = self.event_epa(event_key)?;
        let mut categories = Vec::with_capacity(self.config.categories.len());
        for category in &self.config.categories {
            categories.push((category.clone(), self.analyze_category(event_key, category)?));
        }
        let scouting = self
            .scouting
            .scout_aggregates(event_key)
            .with_context(|| format!("load scouting aggregates for {event_key}"))?;
        let records = match_records(&self.schedule(event_key)?);

        let table = build_team_table(PickInputs {
            epa: &epa,
            categories: &categories,
            scouting: &scouting,
            records: &records,
        });
        let picklist = rank_teams(&table, formula);
        tracing::info!(
            event = event_key,
            teams = picklist.rows.len(),
            fallbacks = picklist.rows.iter().filter(|r| r.fallback).count(),
            "pick-list ranked"
        );

        Ok(PickListReport {
            event_key: event_key.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            picklist,
        })
    }
}

fn cache_key(event_key: &str, category: &str) -> String {
    format!("{event_key}-{category}")
}

/// Rescale ranking scores onto -100..=100. A flat category maps to -100.
pub fn display_scores(rows: &[TeamVariability]) -> Vec<f64> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let (min, max) = rows.iter().fold((first.ranking_score, first.ranking_score), |(lo, hi), r| {
        (lo.min(r.ranking_score), hi.max(r.ranking_score))
    });
    let mut range = max - min;
    if range == 0.0 {
        range = 1.0;
    }
    rows.iter()
        .map(|r| ((r.ranking_score - min) / range) * 200.0 - 100.0)
        .collect()
}

pub fn mean_stability(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        return f64::NAN;
    }
    sum / n as f64
}
