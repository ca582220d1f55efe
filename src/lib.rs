//! NFL historical game data pipeline
//!
//! Ingests game results and player boxscores into a local store and derives
//! per-game feature vectors from each team's recent history for training
//! win/loss classifiers.

pub mod data;
pub mod features;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Unique identifier for a team (ESPN-assigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

/// Unique identifier for a game (ESPN event id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameId(pub i64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Game({})", self.0)
    }
}

/// Unique identifier for a player (ESPN athlete id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player({})", self.0)
    }
}

/// NFL conference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conference {
    Afc,
    Nfc,
}

impl Conference {
    pub fn code(&self) -> &'static str {
        match self {
            Conference::Afc => "AFC",
            Conference::Nfc => "NFC",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_uppercase().as_str() {
            "AFC" => Some(Conference::Afc),
            "NFC" => Some(Conference::Nfc),
            _ => None,
        }
    }
}

/// Division within a conference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Division {
    North,
    South,
    East,
    West,
}

impl Division {
    pub fn code(&self) -> &'static str {
        match self {
            Division::North => "N",
            Division::South => "S",
            Division::East => "E",
            Division::West => "W",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_uppercase().as_str() {
            "N" => Some(Division::North),
            "S" => Some(Division::South),
            "E" => Some(Division::East),
            "W" => Some(Division::West),
            _ => None,
        }
    }
}

/// A franchise. Display names can change across seasons (relocations,
/// renames) without the id changing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub display_name: String,
    pub conference: Conference,
    pub division: Division,
    pub logo: Option<String>,
    pub color: Option<String>,
}

/// One played game.
///
/// Week numbering is flattened to one axis: regular-season weeks are
/// 1..=18, postseason weeks are offset by +18 (+17 before the 2021 season),
/// and preseason weeks are shifted down by 5 into non-positive numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub gameday: NaiveDate,
    pub season: u16,
    pub week: i16,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home_score: u32,
    pub away_score: u32,
    /// Third-down conversion rate in [0, 1]; zero attempts are recorded as 0.0
    /// at ingestion, older rows may be null.
    pub home_third_down_pct: Option<f64>,
    pub away_third_down_pct: Option<f64>,
    /// Time of possession in minutes
    pub home_time_possession: f64,
    pub away_time_possession: f64,
    pub temperature: Option<f64>,
    /// Free-text weather descriptor; severity classification happens at
    /// feature-build time, not here.
    pub precipitation: Option<String>,
}

impl Game {
    /// Which side won, or None for a tie. Tied games carry no label and are
    /// excluded from training datasets.
    pub fn label(&self) -> Option<Label> {
        match self.home_score.cmp(&self.away_score) {
            std::cmp::Ordering::Greater => Some(Label::Home),
            std::cmp::Ordering::Less => Some(Label::Away),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Training label: which side scored more points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Home,
    Away,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Home => write!(f, "Home"),
            Label::Away => write!(f, "Away"),
        }
    }
}

/// One player's statistical line for one game.
///
/// Stats are a sparse map keyed by lowercased stat name (`passingyards`,
/// `sacks`, ...); not every stat is present for every position. At most one
/// record exists per (game, player).
#[derive(Debug, Clone)]
pub struct PlayerGameStat {
    pub game: GameId,
    pub player: PlayerId,
    pub team: TeamId,
    pub stats: HashMap<String, f64>,
}

impl PlayerGameStat {
    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied()
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum NflError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Scraper failed for {source_name}: {message}")]
    Scraper { source_name: String, message: String },

    #[error("Game not found with ID: {0}")]
    GameNotFound(GameId),

    #[error("Team not found with ID: {0}")]
    TeamNotFound(TeamId),

    #[error("Aggregation received an empty sequence for {0}")]
    EmptySequence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, NflError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub output_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Rolling-window size: previous games fetched per team
    pub n_previous_games: usize,
    /// Aggregation method: "avg", "composite_avg" or "discounted_sum"
    pub aggregation: String,
    /// Discount factor in (0, 1] for the discounted_sum method
    pub discount_factor: f64,
    /// What to do when a team has no prior games: "error", "zero" or "skip"
    pub empty_history: String,
    pub features: FeatureLists,
}

/// Active feature names per category, validated into typed features before a
/// build starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureLists {
    pub team: Vec<String>,
    pub player: Vec<String>,
    pub game: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                database_path: "data/nfl.db".to_string(),
                output_path: "data/features.csv".to_string(),
            },
            build: BuildConfig {
                n_previous_games: 5,
                aggregation: "discounted_sum".to_string(),
                discount_factor: 0.9,
                empty_history: "error".to_string(),
                features: FeatureLists {
                    team: vec!["score".to_string(), "third_dwn_pct".to_string()],
                    player: vec![
                        "adjqbr".to_string(),
                        "passingyards".to_string(),
                        "rushingyards".to_string(),
                        "fumbles".to_string(),
                        "totaltackles".to_string(),
                        "sacks".to_string(),
                        "interceptions".to_string(),
                        "qbhits".to_string(),
                    ],
                    game: vec!["temperature".to_string(), "precipitation".to_string()],
                },
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NflError::Config(format!("Failed to read config file {}: {}", path, e)))?;
        toml::from_str(&content)
            .map_err(|e| NflError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NflError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_game(home_score: u32, away_score: u32) -> Game {
        Game {
            id: GameId(1),
            gameday: NaiveDate::from_ymd_opt(2023, 9, 10).unwrap(),
            season: 2023,
            week: 1,
            home_team: TeamId(1),
            away_team: TeamId(2),
            home_score,
            away_score,
            home_third_down_pct: None,
            away_third_down_pct: None,
            home_time_possession: 30.0,
            away_time_possession: 30.0,
            temperature: None,
            precipitation: None,
        }
    }

    #[test]
    fn label_follows_score() {
        assert_eq!(make_game(24, 17).label(), Some(Label::Home));
        assert_eq!(make_game(17, 24).label(), Some(Label::Away));
    }

    #[test]
    fn tied_game_has_no_label() {
        assert_eq!(make_game(20, 20).label(), None);
    }

    #[test]
    fn conference_division_codes_round_trip() {
        assert_eq!(Conference::from_code("afc"), Some(Conference::Afc));
        assert_eq!(Conference::Nfc.code(), "NFC");
        assert_eq!(Division::from_code("W"), Some(Division::West));
        assert_eq!(Division::North.code(), "N");
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.build.n_previous_games, 5);
        assert_eq!(parsed.build.aggregation, "discounted_sum");
        assert_eq!(parsed.build.features.team.len(), 2);
        assert_eq!(parsed.build.features.player.len(), 8);
    }
}
