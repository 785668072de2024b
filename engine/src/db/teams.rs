/// Team persistence
///
/// Teams are stored as whole JSON documents so fields added by the UI
/// survive a round trip; `name` is duplicated into a column for listing.
use anyhow::{Context, Result};
use sdk::types::{default_agents, Team};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use super::now_millis;

/// Name of the team seeded into an empty store
pub const DEFAULT_TEAM_NAME: &str = "Default";

#[derive(Clone)]
pub struct TeamRepository {
    pool: SqlitePool,
}

impl TeamRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All teams in creation order
    pub async fn get_teams(&self) -> Result<Vec<Team>> {
        let rows = sqlx::query("SELECT id, body FROM teams ORDER BY created_at ASC, rowid ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list teams")?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id: String = row.get("id");
                let body: String = row.get("body");
                match decode(&id, &body) {
                    Ok(team) => Some(team),
                    Err(e) => {
                        warn!("Skipping unreadable team {}: {}", id, e);
                        None
                    }
                }
            })
            .collect())
    }

    pub async fn get_team(&self, id: &str) -> Result<Option<Team>> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM teams WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch team")?;

        body.map(|b| decode(id, &b)).transpose()
    }

    /// Insert a team. A missing id is generated; a team without agents gets
    /// the default agents.
    pub async fn create_team(&self, mut team: Team) -> Result<Team> {
        let id = team
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        team.id = Some(id.clone());
        if team.agents.is_empty() {
            team.agents = default_agents();
        }

        let body = serde_json::to_string(&team).context("Failed to serialize team")?;
        let now = now_millis();

        sqlx::query("INSERT INTO teams (id, name, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&id)
            .bind(&team.name)
            .bind(body)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to create team")?;

        info!("Created team '{}' ({})", team.name, id);
        Ok(team)
    }

    /// Replace a team document. Returns `None` when the id is unknown.
    pub async fn update_team(&self, id: &str, mut team: Team) -> Result<Option<Team>> {
        team.id = Some(id.to_string());
        let body = serde_json::to_string(&team).context("Failed to serialize team")?;

        let result = sqlx::query("UPDATE teams SET name = ?, body = ?, updated_at = ? WHERE id = ?")
            .bind(&team.name)
            .bind(body)
            .bind(now_millis())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update team")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(team))
    }

    /// Returns false when the id is unknown
    pub async fn delete_team(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete team")?;

        Ok(result.rows_affected() > 0)
    }

    /// Seed the default team into an empty store. Returns how many teams were
    /// created.
    pub async fn initialize_teams(&self) -> Result<usize> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count teams")?;

        if existing > 0 {
            info!("Team store already holds {} teams, nothing to seed", existing);
            return Ok(0);
        }

        let mut team = Team::new(DEFAULT_TEAM_NAME, default_agents());
        team.description = Some("General purpose team: coding, web research and file reading".into());
        self.create_team(team).await?;
        Ok(1)
    }
}

fn decode(id: &str, body: &str) -> Result<Team> {
    let mut team: Team = serde_json::from_str(body).context("Failed to parse team document")?;
    team.id = Some(id.to_string());
    Ok(team)
}
