use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::http_client::get_text;

pub const TBA_DEFAULT_BASE: &str = "https://www.thebluealliance.com/api/v3";
const TBA_AUTH_HEADER: &str = "X-TBA-Auth-Key";
const TEAM_KEY_PREFIX: &str = "frc";

// Tried in order; later games renamed the headline scoring field.
const HUB_SCORE_FIELDS: &[&str] = &["hubScore", "teleopPoints", "totalPoints"];
const FOUL_POINTS_FIELD: &str = "foulPoints";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CompLevel {
    Qualification,
    EighthFinal,
    QuarterFinal,
    SemiFinal,
    Final,
    Other,
}

impl CompLevel {
    pub fn from_code(code: &str) -> Self {
        match code {
            "qm" => CompLevel::Qualification,
            "ef" => CompLevel::EighthFinal,
            "qf" => CompLevel::QuarterFinal,
            "sf" => CompLevel::SemiFinal,
            "f" => CompLevel::Final,
            _ => CompLevel::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub hub_score: i32,
    pub foul_points: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Alliance {
    /// Team numbers with the `frc` prefix removed.
    pub teams: Vec<String>,
    /// Official alliance score; `None` until the match is played.
    pub score: Option<i32>,
    /// Present only on the detailed match listing.
    pub breakdown: Option<ScoreBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMatch {
    pub key: String,
    pub match_number: u32,
    pub comp_level: CompLevel,
    pub red: Alliance,
    pub blue: Alliance,
}

impl EventMatch {
    pub fn is_qualification(&self) -> bool {
        self.comp_level == CompLevel::Qualification
    }

    pub fn is_played(&self) -> bool {
        self.red.score.is_some() && self.blue.score.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventInfo {
    pub key: String,
    pub name: String,
    pub start_date: Option<String>,
}

/// Read access to the match/event data provider.
pub trait MatchSource {
    /// Schedule without score breakdowns.
    fn simple_matches(&self, event_key: &str) -> Result<Vec<EventMatch>>;
    /// Full match list with per-alliance score breakdowns.
    fn detailed_matches(&self, event_key: &str) -> Result<Vec<EventMatch>>;
    fn events(&self, year: i32) -> Result<Vec<EventInfo>>;
}

#[derive(Debug, Clone)]
pub struct TbaClient {
    base_url: String,
    auth_key: String,
}

impl TbaClient {
    pub fn new(base_url: impl Into<String>, auth_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_key: auth_key.into(),
        }
    }

    fn get(&self, path: &str) -> Result<String> {
        if self.auth_key.trim().is_empty() {
            return Err(anyhow::anyhow!("TBA_AUTH_KEY is not configured"));
        }
        let url = format!("{}{}", self.base_url, path);
        get_text(&url, &[(TBA_AUTH_HEADER, self.auth_key.as_str())])
    }
}

impl MatchSource for TbaClient {
    fn simple_matches(&self, event_key: &str) -> Result<Vec<EventMatch>> {
        let body = self
            .get(&format!("/event/{event_key}/matches/simple"))
            .with_context(|| format!("match schedule request failed for {event_key}"))?;
        parse_matches_json(&body)
    }

    fn detailed_matches(&self, event_key: &str) -> Result<Vec<EventMatch>> {
        let body = self
            .get(&format!("/event/{event_key}/matches"))
            .with_context(|| format!("detailed match request failed for {event_key}"))?;
        parse_matches_json(&body)
    }

    fn events(&self, year: i32) -> Result<Vec<EventInfo>> {
        let body = self
            .get(&format!("/events/{year}/simple"))
            .with_context(|| format!("event list request failed for {year}"))?;
        parse_events_json(&body)
    }
}

/// Parse a TBA match array. The result is in chronological order: competition level first,
/// then match number.
pub fn parse_matches_json(raw: &str) -> Result<Vec<EventMatch>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let v: Value = serde_json::from_str(trimmed).context("invalid match json")?;
    let arr = v.as_array().context("match json is not an array")?;

    let mut out: Vec<EventMatch> = arr.iter().filter_map(parse_match).collect();
    out.sort_by_key(|m| (m.comp_level, m.match_number));
    Ok(out)
}

pub fn parse_events_json(raw: &str) -> Result<Vec<EventInfo>> {
    let v: Value = serde_json::from_str(raw.trim()).context("invalid event json")?;
    let arr = v.as_array().context("event json is not an array")?;
    let mut out: Vec<EventInfo> = arr
        .iter()
        .filter_map(|item| {
            Some(EventInfo {
                key: item.get("key")?.as_str()?.to_string(),
                name: item
                    .get("name")
                    .and_then(|x| x.as_str())
                    .unwrap_or_default()
                    .to_string(),
                start_date: item
                    .get("start_date")
                    .and_then(|x| x.as_str())
                    .map(|s| s.to_string()),
            })
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name).then(a.key.cmp(&b.key)));
    Ok(out)
}

fn parse_match(v: &Value) -> Option<EventMatch> {
    let key = v.get("key")?.as_str()?.to_string();
    let match_number = v.get("match_number").and_then(|x| x.as_u64()).unwrap_or(0) as u32;
    let comp_level = CompLevel::from_code(
        v.get("comp_level")
            .and_then(|x| x.as_str())
            .unwrap_or_default(),
    );

    let alliances = v.get("alliances")?;
    let breakdown = v.get("score_breakdown").filter(|b| b.is_object());
    let red = parse_alliance(alliances.get("red")?, breakdown.and_then(|b| b.get("red")));
    let blue = parse_alliance(alliances.get("blue")?, breakdown.and_then(|b| b.get("blue")));

    Some(EventMatch {
        key,
        match_number,
        comp_level,
        red,
        blue,
    })
}

fn parse_alliance(alliance: &Value, breakdown: Option<&Value>) -> Alliance {
    let teams = alliance
        .get("team_keys")
        .and_then(|x| x.as_array())
        .map(|keys| {
            keys.iter()
                .filter_map(|k| k.as_str())
                .filter_map(team_number_from_key)
                .collect()
        })
        .unwrap_or_default();
    // TBA reports -1 for matches that have not been played yet.
    let score = alliance
        .get("score")
        .and_then(|x| x.as_i64())
        .filter(|s| *s >= 0)
        .map(|s| s as i32);
    let breakdown = breakdown.filter(|b| b.is_object()).map(|b| ScoreBreakdown {
        hub_score: hub_score(b),
        foul_points: numeric_field(b, FOUL_POINTS_FIELD).unwrap_or(0),
    });
    Alliance {
        teams,
        score,
        breakdown,
    }
}

pub fn team_number_from_key(key: &str) -> Option<String> {
    let number = key.strip_prefix(TEAM_KEY_PREFIX).unwrap_or(key).trim();
    if number.is_empty() {
        return None;
    }
    Some(number.to_string())
}

fn hub_score(breakdown: &Value) -> i32 {
    HUB_SCORE_FIELDS
        .iter()
        .find_map(|field| numeric_field(breakdown, field))
        .unwrap_or(0)
}

fn numeric_field(obj: &Value, field: &str) -> Option<i32> {
    obj.get(field).and_then(|x| x.as_f64()).map(|f| f as i32)
}
