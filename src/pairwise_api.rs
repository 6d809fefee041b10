use anyhow::{Context, Result};
use serde::Serialize;

use crate::http_client::post_json;
use crate::variability::{Comparison, FactorizationResult};

pub const PAIRWISE_DEFAULT_URL: &str = "https://www.pairwisetool.com/api/analyze_comparisons";

/// Hosted comparison-matrix factorization. The engine never factorizes locally.
pub trait Factorizer {
    fn analyze(&self, comparisons: &[Comparison]) -> Result<FactorizationResult>;
}

#[derive(Debug, Serialize)]
struct AnalysisRequest<'a> {
    comparisons: &'a [Comparison],
}

#[derive(Debug, Clone)]
pub struct PairwiseClient {
    url: String,
}

impl PairwiseClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Factorizer for PairwiseClient {
    fn analyze(&self, comparisons: &[Comparison]) -> Result<FactorizationResult> {
        let body = post_json(&self.url, &AnalysisRequest { comparisons })
            .context("pairwise analysis request failed")?;
        parse_analysis_json(&body)
    }
}

pub fn parse_analysis_json(raw: &str) -> Result<FactorizationResult> {
    serde_json::from_str(raw.trim()).context("invalid pairwise analysis json")
}
