//! ESPN API scraper for NFL games, teams and boxscores
//!
//! The scoreboard, summary and team endpoints return loosely-typed JSON
//! (numbers arrive as strings in several places), so everything is parsed
//! leniently and missing structure is reported as a scraper error naming the
//! path that failed.

use crate::{Conference, Division, GameId, NflError, PlayerGameStat, PlayerId, Result, Team, TeamId};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;

const SOURCE: &str = "espn";

/// A game as extracted from one scoreboard event, before boxscore and
/// weather enrichment
#[derive(Debug, Clone)]
pub struct ScrapedGame {
    pub id: GameId,
    pub gameday: NaiveDate,
    pub season: u16,
    /// Flattened week number: postseason weeks offset by +18 (+17 before
    /// the 2021 season), preseason weeks shifted down by 5
    pub week: i16,
    pub home_team: TeamId,
    pub home_name: String,
    pub home_display_name: String,
    pub home_score: u32,
    pub away_team: TeamId,
    pub away_name: String,
    pub away_display_name: String,
    pub away_score: u32,
}

/// Team-level totals read from a game summary
#[derive(Debug, Clone, Copy)]
pub struct BoxscoreTotals {
    /// Conversions over attempts; zero attempts read as 0.0
    pub home_third_down_pct: f64,
    pub away_third_down_pct: f64,
    /// Time of possession in minutes
    pub home_time_possession: f64,
    pub away_time_possession: f64,
}

/// Everything a game summary contributes: team totals, per-player stat
/// lines, and the athlete names seen along the way
#[derive(Debug)]
pub struct ScrapedBoxscore {
    pub totals: BoxscoreTotals,
    pub player_stats: Vec<PlayerGameStat>,
    pub player_names: Vec<(PlayerId, String)>,
}

/// Scraper for ESPN's public NFL API
pub struct EspnScraper {
    client: reqwest::blocking::Client,
}

impl Default for EspnScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl EspnScraper {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent("nflstats/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        EspnScraper { client }
    }

    fn scoreboard_url(year: u16) -> String {
        format!(
            "https://site.api.espn.com/apis/site/v2/sports/football/nfl/scoreboard?limit=1000&dates={}",
            year
        )
    }

    fn summary_url(game: GameId) -> String {
        format!(
            "https://site.api.espn.com/apis/site/v2/sports/football/nfl/summary?event={}",
            game.0
        )
    }

    fn team_url(team: TeamId) -> String {
        format!(
            "https://site.api.espn.com/apis/site/v2/sports/football/nfl/teams/{}",
            team.0
        )
    }

    /// Fetch the raw scoreboard events for a calendar year
    pub fn fetch_events(&self, year: u16) -> Result<Vec<Value>> {
        let body: Value = self.client.get(Self::scoreboard_url(year)).send()?.json()?;
        match body.get("events").and_then(Value::as_array) {
            Some(events) => Ok(events.clone()),
            None => Err(scrape_error(format!(
                "Scoreboard for {} has no events array",
                year
            ))),
        }
    }

    /// Fetch and parse the boxscore summary for one game
    pub fn fetch_boxscore(&self, game: GameId) -> Result<ScrapedBoxscore> {
        let body: Value = self.client.get(Self::summary_url(game)).send()?.json()?;
        let boxscore = body
            .get("boxscore")
            .ok_or_else(|| scrape_error(format!("Summary for {} has no boxscore", game)))?;
        parse_boxscore(game, boxscore)
    }

    /// Fetch one team's metadata
    pub fn fetch_team(&self, team: TeamId) -> Result<Team> {
        let body: Value = self.client.get(Self::team_url(team)).send()?.json()?;
        let data = body
            .get("team")
            .ok_or_else(|| scrape_error(format!("Team response for {} has no team", team)))?;
        parse_team(data)
    }
}

/// Pro bowl events carry the conference names (or the Rice/Irvin squads of
/// recent editions) in their short name; they carry no signal and skew
/// rolling stats, so ingestion drops them. The super bowl short name never
/// matches these.
pub fn is_pro_bowl(event: &Value) -> bool {
    let Some(short_name) = event.get("shortName").and_then(Value::as_str) else {
        return false;
    };
    short_name == "AFC VS NFC"
        || short_name == "NFC VS AFC"
        || short_name.contains("IRV")
        || short_name.contains("RIC")
}

/// Extract the game attributes from one scoreboard event
pub fn extract_game(event: &Value) -> Result<ScrapedGame> {
    let id = GameId(lenient_i64(require(event, "id")?, "id")?);
    let date_str = require(event, "date")?
        .as_str()
        .ok_or_else(|| scrape_error("Event date is not a string".to_string()))?;
    // Event dates look like 2023-09-10T17:00Z; only the day matters here
    let day = date_str.split('T').next().unwrap_or(date_str);
    let gameday = NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| scrape_error(format!("Unparseable event date: {}", date_str)))?;

    let season = lenient_i64(require(require(event, "season")?, "year")?, "season.year")? as u16;
    let season_type = lenient_i64(require(require(event, "season")?, "type")?, "season.type")?;
    let mut week = lenient_i64(require(require(event, "week")?, "number")?, "week.number")? as i16;
    // ESPN restarts the week count for the postseason and preseason
    if season_type == 3 {
        week += if season >= 2021 { 18 } else { 17 };
    } else if season_type == 1 {
        week -= 5;
    }

    let competition = event
        .get("competitions")
        .and_then(|c| c.get(0))
        .ok_or_else(|| scrape_error(format!("Event {} has no competitions", id)))?;
    let competitors = competition
        .get("competitors")
        .and_then(Value::as_array)
        .filter(|c| c.len() >= 2)
        .ok_or_else(|| scrape_error(format!("Event {} has no competitors", id)))?;

    // Before 2023 the short name lives under a different key
    let name_key = if season >= 2023 {
        "name"
    } else {
        "shortDisplayName"
    };
    let home = parse_competitor(&competitors[0], name_key)?;
    let away = parse_competitor(&competitors[1], name_key)?;

    Ok(ScrapedGame {
        id,
        gameday,
        season,
        week,
        home_team: home.0,
        home_name: home.1,
        home_display_name: home.2,
        home_score: home.3,
        away_team: away.0,
        away_name: away.1,
        away_display_name: away.2,
        away_score: away.3,
    })
}

fn parse_competitor(competitor: &Value, name_key: &str) -> Result<(TeamId, String, String, u32)> {
    let id = TeamId(lenient_i64(require(competitor, "id")?, "competitor.id")?);
    let team = require(competitor, "team")?;
    let name = require(team, name_key)?
        .as_str()
        .unwrap_or_default()
        .to_string();
    let display_name = require(team, "displayName")?
        .as_str()
        .unwrap_or_default()
        .to_string();
    let score = lenient_i64(require(competitor, "score")?, "competitor.score")? as u32;
    Ok((id, name, display_name, score))
}

/// Conference and division by ESPN group id
fn division_lookup(group: i64) -> Option<(Conference, Division)> {
    match group {
        12 => Some((Conference::Afc, Division::North)),
        13 => Some((Conference::Afc, Division::South)),
        4 => Some((Conference::Afc, Division::East)),
        6 => Some((Conference::Afc, Division::West)),
        10 => Some((Conference::Nfc, Division::North)),
        11 => Some((Conference::Nfc, Division::South)),
        1 => Some((Conference::Nfc, Division::East)),
        3 => Some((Conference::Nfc, Division::West)),
        _ => None,
    }
}

fn parse_team(data: &Value) -> Result<Team> {
    let id = TeamId(lenient_i64(require(data, "id")?, "team.id")?);
    let group = lenient_i64(require(require(data, "groups")?, "id")?, "team.groups.id")?;
    let (conference, division) = division_lookup(group)
        .ok_or_else(|| scrape_error(format!("Unknown division group {} for {}", group, id)))?;
    Ok(Team {
        id,
        name: require(data, "name")?.as_str().unwrap_or_default().to_string(),
        display_name: require(data, "displayName")?
            .as_str()
            .unwrap_or_default()
            .to_string(),
        conference,
        division,
        logo: data
            .get("logos")
            .and_then(|l| l.get(0))
            .and_then(|l| l.get("href"))
            .and_then(Value::as_str)
            .map(str::to_string),
        color: data.get("color").and_then(Value::as_str).map(str::to_string),
    })
}

/// Parse a summary's boxscore object into team totals and per-player lines
pub fn parse_boxscore(game: GameId, boxscore: &Value) -> Result<ScrapedBoxscore> {
    // Merge every stat category into one raw string map per athlete; the
    // interceptions key needs the merged view to disambiguate offense from
    // defense.
    let mut raw: HashMap<PlayerId, (TeamId, HashMap<String, String>)> = HashMap::new();
    let mut names: Vec<(PlayerId, String)> = Vec::new();

    for player_data in boxscore
        .get("players")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let Some(team) = player_data
            .get("team")
            .and_then(|t| t.get("id"))
            .and_then(|id| lenient_i64(id, "team.id").ok())
        else {
            continue;
        };
        let team = TeamId(team);
        for category in player_data
            .get("statistics")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let keys: Vec<&str> = category
                .get("keys")
                .and_then(Value::as_array)
                .map(|k| k.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            for athlete in category
                .get("athletes")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let Some(athlete_id) = athlete
                    .get("athlete")
                    .and_then(|a| a.get("id"))
                    .and_then(|id| lenient_i64(id, "athlete.id").ok())
                else {
                    continue;
                };
                let player = PlayerId(athlete_id);
                let stats: Vec<&str> = athlete
                    .get("stats")
                    .and_then(Value::as_array)
                    .map(|s| s.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                let entry = raw.entry(player).or_insert_with(|| (team, HashMap::new()));
                for (key, value) in keys.iter().zip(stats.iter()) {
                    entry.1.insert(key.to_string(), value.to_string());
                }
                if !names.iter().any(|(id, _)| *id == player) {
                    let name = athlete
                        .get("athlete")
                        .and_then(|a| a.get("displayName"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    names.push((player, name.to_string()));
                }
            }
        }
    }

    let player_stats = raw
        .into_iter()
        .map(|(player, (team, stats))| PlayerGameStat {
            game,
            player,
            team,
            stats: rowify_stats(&stats),
        })
        .collect();

    let teams = boxscore
        .get("teams")
        .and_then(Value::as_array)
        .filter(|t| t.len() >= 2)
        .ok_or_else(|| scrape_error("Boxscore has no team statistics".to_string()))?;
    let totals = BoxscoreTotals {
        home_third_down_pct: third_down_pct(&teams[0])?,
        away_third_down_pct: third_down_pct(&teams[1])?,
        home_time_possession: possession_minutes(&teams[0])?,
        away_time_possession: possession_minutes(&teams[1])?,
    };

    Ok(ScrapedBoxscore {
        totals,
        player_stats,
        player_names: names,
    })
}

/// Convert one athlete's raw stat strings to the stored numeric map.
/// Keys are lowercased; combined `x/y` stats split into two entries; values
/// that fail to parse read as 0.0.
fn rowify_stats(raw: &HashMap<String, String>) -> HashMap<String, f64> {
    let mut stats = HashMap::new();
    for (key, value) in raw {
        if key.starts_with("long") {
            continue;
        }
        match key.as_str() {
            "completions/passingAttempts" => {
                let (made, attempts) = split_pair(value, '/');
                stats.insert("passcompletions".to_string(), made);
                stats.insert("passattempts".to_string(), attempts);
            }
            "fieldGoalsMade/fieldGoalAttempts" => {
                let (made, attempts) = split_pair(value, '/');
                stats.insert("fieldgoalsmade".to_string(), made);
                stats.insert("fieldgoalattempts".to_string(), attempts);
            }
            "extraPointsMade/extraPointAttempts" => {
                let (made, attempts) = split_pair(value, '/');
                stats.insert("extrapointsmade".to_string(), made);
                stats.insert("extrapointattempts".to_string(), attempts);
            }
            // A passer's interceptions are throws, a defender's are takeaways
            "interceptions" => {
                let name = if raw.contains_key("QBRating") {
                    "interceptsthrown"
                } else {
                    "interceptions"
                };
                stats.insert(name.to_string(), safe_float(value));
            }
            "sacks-sackYardsLost" => {
                stats.insert("sackyardslost".to_string(), safe_float(value));
            }
            other => {
                stats.insert(other.to_lowercase(), safe_float(value));
            }
        }
    }
    stats
}

const THIRD_DOWN_EFF_INDEX: usize = 4;
const POSSESSION_INDEX: usize = 24;

fn team_statistic(team: &Value, index: usize) -> Result<String> {
    team.get("statistics")
        .and_then(|s| s.get(index))
        .and_then(|s| s.get("displayValue"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| scrape_error(format!("Boxscore team statistic {} missing", index)))
}

/// Third-down efficiency arrives as `conversions-attempts`; zero attempts
/// read as 0.0 rather than a division error
fn third_down_pct(team: &Value) -> Result<f64> {
    let display = team_statistic(team, THIRD_DOWN_EFF_INDEX)?;
    let (conversions, attempts) = split_pair(&display, '-');
    if attempts == 0.0 {
        return Ok(0.0);
    }
    Ok(conversions / attempts)
}

/// Time of possession arrives as `MM:SS`
fn possession_minutes(team: &Value) -> Result<f64> {
    let display = team_statistic(team, POSSESSION_INDEX)?;
    let (minutes, seconds) = split_pair(&display, ':');
    Ok(minutes + seconds / 60.0)
}

fn split_pair(value: &str, separator: char) -> (f64, f64) {
    let mut parts = value.split(separator);
    let first = safe_float(parts.next().unwrap_or(""));
    let second = safe_float(parts.next().unwrap_or(""));
    (first, second)
}

fn safe_float(value: &str) -> f64 {
    value.trim().parse().unwrap_or(0.0)
}

fn require<'a>(value: &'a Value, key: &str) -> Result<&'a Value> {
    value
        .get(key)
        .ok_or_else(|| scrape_error(format!("Missing field: {}", key)))
}

/// Accept both JSON numbers and numeric strings, which ESPN mixes freely
fn lenient_i64(value: &Value, context: &str) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| scrape_error(format!("Non-integer {}: {}", context, n))),
        Value::String(s) => s
            .parse()
            .map_err(|_| scrape_error(format!("Non-numeric {}: {}", context, s))),
        other => Err(scrape_error(format!("Unexpected {}: {}", context, other))),
    }
}

fn scrape_error(message: String) -> NflError {
    NflError::Scraper {
        source_name: SOURCE.to_string(),
        message,
    }
}
