use serde::{Deserialize, Serialize};

/// One signed preference judgment between two teams. Positive `diff` favors `team_a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(rename = "teamA")]
    pub team_a: i64,
    #[serde(rename = "teamB")]
    pub team_b: i64,
    pub diff: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRanking {
    pub rank: i64,
    pub score: f64,
    pub team: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorizationStats {
    #[serde(default)]
    pub condition_number: f64,
    #[serde(default)]
    pub consistency_ratio: f64,
    #[serde(default)]
    pub matrix_rank: i64,
    #[serde(default)]
    pub num_comparisons: i64,
    #[serde(default)]
    pub num_teams: i64,
}

/// Decomposition of the team-by-team comparison matrix as returned by the factorization service.
/// Rows of `u` are teams, columns are latent factors; `s` is in descending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Svd {
    #[serde(rename = "U", default)]
    pub u: Vec<Vec<f64>>,
    #[serde(default)]
    pub s: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorizationResult {
    #[serde(default)]
    pub rankings: Vec<TeamRanking>,
    #[serde(default)]
    pub stats: FactorizationStats,
    #[serde(default)]
    pub svd: Svd,
    #[serde(default)]
    pub validation: Validation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamVariability {
    pub team: i64,
    pub raw_variation: f64,
    #[serde(rename = "normalized_variation")]
    pub normalized: f64,
    pub rank: i64,
    pub ranking_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub variabilities: Vec<TeamVariability>,
    /// `S[0] / S[rank-1]`; NaN when the category has no usable data.
    pub stability: f64,
    pub stats: FactorizationStats,
}

impl AnalysisSummary {
    pub fn empty() -> Self {
        Self {
            variabilities: Vec::new(),
            stability: f64::NAN,
            stats: FactorizationStats::default(),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.variabilities.is_empty() && self.stability.is_finite()
    }
}

/// Reduce a factorization into per-team variability plus the category stability metric.
///
/// Rankings are paired with `U` rows by position; the service returns both in the same team
/// order. Extra rows on either side are dropped.
pub fn build_summary(result: &FactorizationResult) -> AnalysisSummary {
    let raw = raw_variation(&result.svd.u, &result.svd.s);
    let normalized = normalize(&raw);

    let variabilities = result
        .rankings
        .iter()
        .zip(raw.iter().zip(normalized.iter()))
        .map(|(r, (raw, norm))| TeamVariability {
            team: r.team,
            raw_variation: *raw,
            normalized: *norm,
            rank: r.rank,
            ranking_score: r.score,
        })
        .collect();

    AnalysisSummary {
        variabilities,
        stability: stability_metric(&result.svd.s, result.stats.matrix_rank),
        stats: result.stats.clone(),
    }
}

/// Spread of each team across the non-dominant factors. Factor 0 is the shared mean component
/// and never contributes. Missing matrix cells count as zero.
pub fn raw_variation(u: &[Vec<f64>], s: &[f64]) -> Vec<f64> {
    u.iter()
        .map(|row| {
            s.iter()
                .enumerate()
                .skip(1)
                .map(|(j, sv)| {
                    let v = row.get(j).copied().unwrap_or(0.0) * sv;
                    v * v
                })
                .sum::<f64>()
                .sqrt()
        })
        .collect()
}

/// Min-max scale into [0, 1]. A flat input maps to all zeros.
pub fn normalize(vals: &[f64]) -> Vec<f64> {
    let Some(first) = vals.first() else {
        return Vec::new();
    };
    let (min, max) = vals
        .iter()
        .fold((*first, *first), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if max == min {
        return vec![0.0; vals.len()];
    }
    let denom = max - min;
    vals.iter().map(|v| (v - min) / denom).collect()
}

pub fn stability_metric(singular_values: &[f64], matrix_rank: i64) -> f64 {
    if matrix_rank <= 0 || matrix_rank as usize > singular_values.len() {
        return f64::NAN;
    }
    singular_values[0] / singular_values[matrix_rank as usize - 1]
}
