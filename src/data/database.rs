//! SQLite database management for game and boxscore data

use crate::features::SeverityTable;
use crate::{
    Conference, Division, Game, GameId, NflError, PlayerGameStat, PlayerId, Result, Team, TeamId,
};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                display_name TEXT NOT NULL,
                conference TEXT NOT NULL,
                division TEXT NOT NULL,
                logo TEXT,
                color TEXT
            );

            CREATE TABLE IF NOT EXISTS players (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY,
                gameday TEXT NOT NULL,
                season INTEGER NOT NULL,
                week INTEGER NOT NULL,
                home_team_id INTEGER NOT NULL REFERENCES teams(id),
                away_team_id INTEGER NOT NULL REFERENCES teams(id),
                home_score INTEGER NOT NULL,
                away_score INTEGER NOT NULL,
                home_third_down_pct REAL,
                away_third_down_pct REAL,
                home_time_possession REAL NOT NULL,
                away_time_possession REAL NOT NULL,
                temperature REAL,
                precipitation TEXT
            );

            CREATE TABLE IF NOT EXISTS boxscores (
                game_id INTEGER NOT NULL REFERENCES games(id),
                player_id INTEGER NOT NULL REFERENCES players(id),
                team_id INTEGER NOT NULL REFERENCES teams(id),
                stat TEXT NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (game_id, player_id, stat)
            );

            CREATE TABLE IF NOT EXISTS precipitation (
                descriptor TEXT PRIMARY KEY,
                severity INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_games_gameday ON games(gameday);
            CREATE INDEX IF NOT EXISTS idx_games_teams ON games(home_team_id, away_team_id);
            CREATE INDEX IF NOT EXISTS idx_games_season ON games(season);
            CREATE INDEX IF NOT EXISTS idx_boxscores_game ON boxscores(game_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== Team Operations ====================

    /// Insert or update a team (ids come from the upstream source)
    pub fn upsert_team(&self, team: &Team) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO teams (id, name, display_name, conference, division, logo, color)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                display_name = excluded.display_name,
                conference = excluded.conference,
                division = excluded.division,
                logo = COALESCE(excluded.logo, logo),
                color = COALESCE(excluded.color, color)
            "#,
            params![
                team.id.0,
                team.name,
                team.display_name,
                team.conference.code(),
                team.division.code(),
                team.logo,
                team.color,
            ],
        )?;
        Ok(())
    }

    /// Get team by ID
    pub fn get_team(&self, id: TeamId) -> Result<Team> {
        self.conn
            .query_row(
                "SELECT id, name, display_name, conference, division, logo, color
                 FROM teams WHERE id = ?1",
                params![id.0],
                Self::row_to_team,
            )
            .map_err(|_| NflError::TeamNotFound(id))
    }

    /// Get all teams
    pub fn get_all_teams(&self) -> Result<Vec<Team>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, display_name, conference, division, logo, color
             FROM teams ORDER BY name",
        )?;
        let teams = stmt
            .query_map([], Self::row_to_team)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(teams)
    }

    fn row_to_team(row: &rusqlite::Row) -> rusqlite::Result<Team> {
        let conference_code: String = row.get(3)?;
        let division_code: String = row.get(4)?;
        Ok(Team {
            id: TeamId(row.get(0)?),
            name: row.get(1)?,
            display_name: row.get(2)?,
            conference: Conference::from_code(&conference_code).unwrap_or(Conference::Afc),
            division: Division::from_code(&division_code).unwrap_or(Division::North),
            logo: row.get(5)?,
            color: row.get(6)?,
        })
    }

    // ==================== Player Operations ====================

    /// Insert or update a player
    pub fn upsert_player(&self, id: PlayerId, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO players (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![id.0, name],
        )?;
        Ok(())
    }

    // ==================== Game Operations ====================

    /// Insert or update a game. Weather columns are backfilled rather than
    /// overwritten, so a re-ingest without weather keeps earlier readings.
    pub fn upsert_game(&self, game: &Game) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO games (id, gameday, season, week, home_team_id, away_team_id,
                               home_score, away_score, home_third_down_pct, away_third_down_pct,
                               home_time_possession, away_time_possession,
                               temperature, precipitation)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(id) DO UPDATE SET
                gameday = excluded.gameday,
                season = excluded.season,
                week = excluded.week,
                home_team_id = excluded.home_team_id,
                away_team_id = excluded.away_team_id,
                home_score = excluded.home_score,
                away_score = excluded.away_score,
                home_third_down_pct = excluded.home_third_down_pct,
                away_third_down_pct = excluded.away_third_down_pct,
                home_time_possession = excluded.home_time_possession,
                away_time_possession = excluded.away_time_possession,
                temperature = COALESCE(excluded.temperature, temperature),
                precipitation = COALESCE(excluded.precipitation, precipitation)
            "#,
            params![
                game.id.0,
                game.gameday.format("%Y-%m-%d").to_string(),
                game.season,
                game.week,
                game.home_team.0,
                game.away_team.0,
                game.home_score,
                game.away_score,
                game.home_third_down_pct,
                game.away_third_down_pct,
                game.home_time_possession,
                game.away_time_possession,
                game.temperature,
                game.precipitation,
            ],
        )?;
        Ok(())
    }

    /// Attach a weather reading to an existing game
    pub fn set_game_weather(
        &self,
        game_id: GameId,
        temperature: Option<f64>,
        precipitation: Option<&str>,
    ) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE games SET
                temperature = COALESCE(?2, temperature),
                precipitation = COALESCE(?3, precipitation)
             WHERE id = ?1",
            params![game_id.0, temperature, precipitation],
        )?;
        if updated == 0 {
            return Err(NflError::GameNotFound(game_id));
        }
        Ok(())
    }

    /// Get game by ID
    pub fn get_game(&self, id: GameId) -> Result<Game> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM games WHERE id = ?1", GAME_COLUMNS),
                params![id.0],
                Self::row_to_game,
            )
            .map_err(|_| NflError::GameNotFound(id))
    }

    /// Get all games in a season, earliest first
    pub fn get_games_by_season(&self, season: u16) -> Result<Vec<Game>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM games WHERE season = ?1 ORDER BY gameday, id",
            GAME_COLUMNS
        ))?;
        let games = stmt
            .query_map(params![season], Self::row_to_game)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    /// Get the most recent games a team played strictly before the given
    /// date, most recent first. Returns fewer than `limit` rows when the
    /// team's history is short, and an empty vec when there is none.
    pub fn get_previous_games(
        &self,
        team: TeamId,
        before: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Game>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM games
             WHERE (home_team_id = ?1 OR away_team_id = ?1) AND gameday < ?2
             ORDER BY gameday DESC, id DESC
             LIMIT ?3",
            GAME_COLUMNS
        ))?;
        let games = stmt
            .query_map(
                params![team.0, before.format("%Y-%m-%d").to_string(), limit],
                Self::row_to_game,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    /// Game ids in a season with no weather reading attached
    pub fn games_missing_weather(&self, season: u16) -> Result<Vec<GameId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM games
             WHERE season = ?1 AND temperature IS NULL AND precipitation IS NULL
             ORDER BY gameday, id",
        )?;
        let ids = stmt
            .query_map(params![season], |row| Ok(GameId(row.get(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ==================== Boxscore Operations ====================

    /// Insert or update one player's statistical line for a game
    pub fn upsert_boxscore(&self, record: &PlayerGameStat) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO boxscores (game_id, player_id, team_id, stat, value)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(game_id, player_id, stat) DO UPDATE SET
                 team_id = excluded.team_id,
                 value = excluded.value",
        )?;
        for (stat, value) in &record.stats {
            stmt.execute(params![
                record.game.0,
                record.player.0,
                record.team.0,
                stat,
                value
            ])?;
        }
        Ok(())
    }

    /// Fetch every player line recorded for the given games in one query,
    /// rather than one query per game.
    pub fn get_boxscores(&self, game_ids: &[GameId]) -> Result<Vec<PlayerGameStat>> {
        if game_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = std::iter::repeat("?")
            .take(game_ids.len())
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT b.game_id, b.player_id, b.team_id, b.stat, b.value
             FROM boxscores b JOIN games g ON g.id = b.game_id
             WHERE b.game_id IN ({})
             ORDER BY g.gameday DESC, b.game_id DESC, b.player_id",
            placeholders
        ))?;

        let mut index: HashMap<(GameId, PlayerId), usize> = HashMap::new();
        let mut records: Vec<PlayerGameStat> = Vec::new();
        let mut rows = stmt.query(params_from_iter(game_ids.iter().map(|id| id.0)))?;
        while let Some(row) = rows.next()? {
            let game = GameId(row.get(0)?);
            let player = PlayerId(row.get(1)?);
            let team = TeamId(row.get(2)?);
            let stat: String = row.get(3)?;
            let value: f64 = row.get(4)?;
            let at = *index.entry((game, player)).or_insert_with(|| {
                records.push(PlayerGameStat {
                    game,
                    player,
                    team,
                    stats: HashMap::new(),
                });
                records.len() - 1
            });
            records[at].stats.insert(stat, value);
        }
        Ok(records)
    }

    // ==================== Weather Severity ====================

    /// Load the descriptor-to-severity table, falling back to the built-in
    /// default when none has been stored.
    pub fn load_severity_table(&self) -> Result<SeverityTable> {
        let mut stmt = self
            .conn
            .prepare("SELECT descriptor, severity FROM precipitation")?;
        let rows = stmt
            .query_map([], |row| {
                let descriptor: String = row.get(0)?;
                let severity: u8 = row.get(1)?;
                Ok((descriptor, severity))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if rows.is_empty() {
            return Ok(SeverityTable::default());
        }
        Ok(SeverityTable::from_rows(rows))
    }

    /// Replace the stored severity table
    pub fn save_severity_table(&self, table: &SeverityTable) -> Result<()> {
        self.conn.execute("DELETE FROM precipitation", [])?;
        let mut stmt = self
            .conn
            .prepare("INSERT INTO precipitation (descriptor, severity) VALUES (?1, ?2)")?;
        for (level, descriptors) in table.levels() {
            for descriptor in descriptors {
                stmt.execute(params![descriptor, level])?;
            }
        }
        Ok(())
    }

    fn row_to_game(row: &rusqlite::Row) -> rusqlite::Result<Game> {
        let gameday_str: String = row.get(1)?;
        // A corrupt date must not silently reorder windows
        let gameday = NaiveDate::parse_from_str(&gameday_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Game {
            id: GameId(row.get(0)?),
            gameday,
            season: row.get(2)?,
            week: row.get(3)?,
            home_team: TeamId(row.get(4)?),
            away_team: TeamId(row.get(5)?),
            home_score: row.get(6)?,
            away_score: row.get(7)?,
            home_third_down_pct: row.get(8)?,
            away_third_down_pct: row.get(9)?,
            home_time_possession: row.get(10)?,
            away_time_possession: row.get(11)?,
            temperature: row.get(12)?,
            precipitation: row.get(13)?,
        })
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let team_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))?;

        let game_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;

        let boxscore_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT game_id || ':' || player_id) FROM boxscores",
            [],
            |row| row.get(0),
        )?;

        let min_date: Option<String> = self
            .conn
            .query_row("SELECT MIN(gameday) FROM games", [], |row| row.get(0))
            .optional()?
            .flatten();

        let max_date: Option<String> = self
            .conn
            .query_row("SELECT MAX(gameday) FROM games", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(DatabaseStats {
            team_count: team_count as usize,
            game_count: game_count as usize,
            boxscore_count: boxscore_count as usize,
            earliest_game: min_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            latest_game: max_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        })
    }
}

const GAME_COLUMNS: &str = "id, gameday, season, week, home_team_id, away_team_id, \
     home_score, away_score, home_third_down_pct, away_third_down_pct, \
     home_time_possession, away_time_possession, temperature, precipitation";

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub team_count: usize,
    pub game_count: usize,
    pub boxscore_count: usize,
    pub earliest_game: Option<NaiveDate>,
    pub latest_game: Option<NaiveDate>,
}
