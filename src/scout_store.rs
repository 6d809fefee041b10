use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, Transaction, params};
use serde::{Deserialize, Serialize};

use crate::variability::Comparison;

/// Tier a scouter placed a team in for one category during one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    High,
    Mid,
    Low,
}

impl Tier {
    pub fn weight(self) -> i32 {
        match self {
            Tier::High => 3,
            Tier::Mid => 2,
            Tier::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamScoutData {
    pub team_number: String,
    #[serde(default)]
    pub auto_path: String,
    #[serde(default)]
    pub auto_start_pos: String,
    #[serde(default)]
    pub auto_climb: String,
    #[serde(default)]
    pub teleop_climb: String,
    #[serde(default)]
    pub defense_pct: i32,
    #[serde(default)]
    pub defended_against_pct: i32,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoutSubmission {
    pub event_key: String,
    pub match_num: i64,
    pub scouter_id: i64,
    #[serde(default)]
    pub teams: Vec<TeamScoutData>,
    /// category -> tier -> team numbers
    #[serde(default)]
    pub rankings: HashMap<String, HashMap<Tier, Vec<String>>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveSummary {
    pub teams_saved: usize,
    pub comparisons_saved: usize,
}

/// Per-team averages over all scouted submissions at one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoutAggregate {
    pub defense_pct: f64,
    pub defended_against_pct: f64,
    pub scouted_matches: u32,
    pub auto_climb_rate: f64,
    pub teleop_climb_rate: f64,
}

/// Read side of the scouting data the engine consumes.
pub trait ScoutSource {
    fn comparisons(&self, event_key: &str, category: &str) -> Result<Vec<Comparison>>;
    fn scout_aggregates(&self, event_key: &str) -> Result<HashMap<String, ScoutAggregate>>;
}

pub struct ScoutStore {
    conn: Connection,
}

impl ScoutStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db directory {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Store a submission: one row per scouted team plus the pairwise comparisons implied by
    /// the tiered rankings.
    pub fn save_submission(&mut self, sub: &ScoutSubmission) -> Result<SaveSummary> {
        let created_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().context("begin submission transaction")?;

        for team in &sub.teams {
            tx.execute(
                "INSERT INTO scout_submissions (event_key, match_num, scouter_id, team_number, auto_path,
                    auto_start_pos, auto_climb, teleop_climb, defense_pct, defended_against_pct, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    sub.event_key,
                    sub.match_num,
                    sub.scouter_id,
                    team.team_number.trim(),
                    team.auto_path,
                    team.auto_start_pos,
                    team.auto_climb,
                    team.teleop_climb,
                    team.defense_pct,
                    team.defended_against_pct,
                    team.notes,
                    created_at,
                ],
            )
            .context("insert scout submission")?;
        }

        let mut comparisons_saved = 0usize;
        for (category, tiers) in &sub.rankings {
            for (better, worse) in tier_pairs() {
                let (Some(a_teams), Some(b_teams)) = (tiers.get(&better), tiers.get(&worse)) else {
                    continue;
                };
                let diff = better.weight() - worse.weight();
                for team_a in a_teams {
                    for team_b in b_teams {
                        insert_comparison(&tx, sub, category, team_a, team_b, diff, &created_at)?;
                        comparisons_saved += 1;
                    }
                }
            }
        }

        tx.commit().context("commit submission transaction")?;
        let summary = SaveSummary {
            teams_saved: sub.teams.len(),
            comparisons_saved,
        };
        tracing::info!(
            event = %sub.event_key,
            match_num = sub.match_num,
            scouter = sub.scouter_id,
            teams = summary.teams_saved,
            comparisons = summary.comparisons_saved,
            "saved scout submission"
        );
        Ok(summary)
    }

    pub fn clear_event(&self, event_key: &str) -> Result<usize> {
        let mut removed = self
            .conn
            .execute("DELETE FROM scout_submissions WHERE event_key = ?1", params![event_key])
            .context("delete event submissions")?;
        removed += self
            .conn
            .execute("DELETE FROM pairwise_scouting WHERE event_key = ?1", params![event_key])
            .context("delete event comparisons")?;
        tracing::info!(event = %event_key, rows = removed, "cleared event data");
        Ok(removed)
    }

    pub fn clear_all(&self) -> Result<usize> {
        let mut removed = self
            .conn
            .execute("DELETE FROM scout_submissions", [])
            .context("delete all submissions")?;
        removed += self
            .conn
            .execute("DELETE FROM pairwise_scouting", [])
            .context("delete all comparisons")?;
        tracing::info!(rows = removed, "cleared all scouting data");
        Ok(removed)
    }

    /// Events with at least one stored submission.
    pub fn scouted_events(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT event_key FROM scout_submissions ORDER BY event_key ASC")
            .context("prepare scouted events query")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("query scouted events")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode event row")?);
        }
        Ok(out)
    }
}

impl ScoutSource for ScoutStore {
    fn comparisons(&self, event_key: &str, category: &str) -> Result<Vec<Comparison>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT team_a, team_b, difference FROM pairwise_scouting
                 WHERE event_key = ?1 AND category = ?2
                 ORDER BY id ASC",
            )
            .context("prepare comparisons query")?;
        let rows = stmt
            .query_map(params![event_key, category], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i32>(2)?,
                ))
            })
            .context("query comparisons")?;

        let mut out = Vec::new();
        for row in rows {
            let (a, b, diff) = row.context("decode comparison row")?;
            let team_a = a
                .trim()
                .parse::<i64>()
                .with_context(|| format!("invalid team number {a:?}"))?;
            let team_b = b
                .trim()
                .parse::<i64>()
                .with_context(|| format!("invalid team number {b:?}"))?;
            out.push(Comparison {
                team_a,
                team_b,
                diff,
            });
        }
        Ok(out)
    }

    fn scout_aggregates(&self, event_key: &str) -> Result<HashMap<String, ScoutAggregate>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT team_number,
                       COALESCE(AVG(defense_pct), 0),
                       COALESCE(AVG(defended_against_pct), 0),
                       COUNT(*),
                       SUM(CASE WHEN LOWER(TRIM(auto_climb)) = 'yes' THEN 1 ELSE 0 END) * 1.0 / COUNT(*),
                       SUM(CASE WHEN LOWER(TRIM(teleop_climb)) = 'yes' THEN 1 ELSE 0 END) * 1.0 / COUNT(*)
                FROM scout_submissions
                WHERE event_key = ?1
                GROUP BY team_number
                "#,
            )
            .context("prepare scout aggregate query")?;
        let rows = stmt
            .query_map(params![event_key], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    ScoutAggregate {
                        defense_pct: row.get(1)?,
                        defended_against_pct: row.get(2)?,
                        scouted_matches: row.get::<_, u32>(3)?,
                        auto_climb_rate: row.get(4)?,
                        teleop_climb_rate: row.get(5)?,
                    },
                ))
            })
            .context("query scout aggregates")?;

        let mut out = HashMap::new();
        for row in rows {
            let (team, agg) = row.context("decode scout aggregate row")?;
            out.insert(team, agg);
        }
        Ok(out)
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS pairwise_scouting (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_key TEXT NOT NULL,
            match_num INTEGER NOT NULL,
            scouter_id INTEGER NOT NULL,
            category TEXT NOT NULL,
            team_a TEXT NOT NULL,
            team_b TEXT NOT NULL,
            difference INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pairwise_event_category
            ON pairwise_scouting(event_key, category);

        CREATE TABLE IF NOT EXISTS scout_submissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_key TEXT NOT NULL,
            match_num INTEGER NOT NULL,
            scouter_id INTEGER NOT NULL,
            team_number TEXT NOT NULL,
            auto_path TEXT NOT NULL,
            auto_start_pos TEXT NOT NULL,
            auto_climb TEXT NOT NULL,
            teleop_climb TEXT NOT NULL,
            defense_pct INTEGER NOT NULL,
            defended_against_pct INTEGER NOT NULL,
            notes TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_submissions_event ON scout_submissions(event_key);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

fn tier_pairs() -> [(Tier, Tier); 3] {
    [
        (Tier::High, Tier::Mid),
        (Tier::High, Tier::Low),
        (Tier::Mid, Tier::Low),
    ]
}

fn insert_comparison(
    tx: &Transaction<'_>,
    sub: &ScoutSubmission,
    category: &str,
    team_a: &str,
    team_b: &str,
    diff: i32,
    created_at: &str,
) -> Result<()> {
    tx.execute(
        "INSERT INTO pairwise_scouting (event_key, match_num, scouter_id, category, team_a, team_b, difference, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            sub.event_key,
            sub.match_num,
            sub.scouter_id,
            category,
            team_a.trim(),
            team_b.trim(),
            diff,
            created_at
        ],
    )
    .context("insert pairwise comparison")?;
    Ok(())
}
