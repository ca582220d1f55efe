//! Feature vector assembly
//!
//! Joins one target game with the rolling history of its two teams and
//! reduces everything to a single numeric row. Only data from games strictly
//! before the target's date is used, so rows are safe for training without
//! label leakage.

use super::aggregate::Aggregation;
use super::filter::{filter_boxscores_by_team, filter_by_team};
use super::weather::SeverityTable;
use super::{FeatureSet, GameFeature};
use crate::data::Database;
use crate::{BuildConfig, Game, GameId, Label, NflError, Result, TeamId};

/// What to do with a target game whose team has no prior games stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyHistoryPolicy {
    /// Fail the row with an error
    Error,
    /// Substitute a `[0.0]` sequence for the missing history
    Zero,
    /// Drop the row silently
    Skip,
}

impl EmptyHistoryPolicy {
    pub fn from_config(name: &str) -> Result<Self> {
        match name {
            "error" => Ok(EmptyHistoryPolicy::Error),
            "zero" => Ok(EmptyHistoryPolicy::Zero),
            "skip" => Ok(EmptyHistoryPolicy::Skip),
            other => Err(NflError::Config(format!(
                "Unknown empty-history policy: {} (expected error, zero or skip)",
                other
            ))),
        }
    }
}

/// One assembled training row. Values line up with
/// [`FeatureSet::columns`]; a `None` value (missing weather) becomes an
/// empty CSV cell.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub game: GameId,
    pub label: Label,
    pub values: Vec<Option<f64>>,
    /// One note per feature that fell back to a sentinel or stayed empty
    /// (boxscore zero sentinel, zeroed history, missing or unclassifiable
    /// weather). Empty for a fully clean row.
    pub degraded: Vec<String>,
}

/// Outcome of assembling one target game
#[derive(Debug, Clone)]
pub enum Assembled {
    Row(FeatureRow),
    /// Tied games carry no label and are never emitted
    SkippedTie,
    /// Dropped under [`EmptyHistoryPolicy::Skip`]
    SkippedEmptyHistory(TeamId),
}

/// Assembles feature rows against a store. All knobs are fixed at
/// construction; assembly itself is read-only.
pub struct FeatureAssembler<'a> {
    db: &'a Database,
    features: FeatureSet,
    aggregation: Aggregation,
    n_previous: usize,
    severity: SeverityTable,
    policy: EmptyHistoryPolicy,
}

impl<'a> FeatureAssembler<'a> {
    pub fn new(
        db: &'a Database,
        features: FeatureSet,
        aggregation: Aggregation,
        n_previous: usize,
        severity: SeverityTable,
        policy: EmptyHistoryPolicy,
    ) -> Self {
        FeatureAssembler {
            db,
            features,
            aggregation,
            n_previous,
            severity,
            policy,
        }
    }

    /// Validate build configuration and construct an assembler. Any invalid
    /// knob fails here, before the first row is touched.
    pub fn from_config(
        db: &'a Database,
        config: &BuildConfig,
        severity: SeverityTable,
    ) -> Result<Self> {
        if config.n_previous_games == 0 {
            return Err(NflError::Config(
                "n_previous_games must be at least 1".to_string(),
            ));
        }
        let features = FeatureSet::from_config(&config.features)?;
        let aggregation = Aggregation::from_config(&config.aggregation, config.discount_factor)?;
        let policy = EmptyHistoryPolicy::from_config(&config.empty_history)?;
        Ok(Self::new(
            db,
            features,
            aggregation,
            config.n_previous_games,
            severity,
            policy,
        ))
    }

    /// Output column names for this assembler's feature set and aggregation
    pub fn columns(&self) -> Vec<String> {
        self.features.columns(&self.aggregation)
    }

    /// Assemble the feature row for one target game
    pub fn assemble(&self, game: &Game) -> Result<Assembled> {
        let Some(label) = game.label() else {
            return Ok(Assembled::SkippedTie);
        };

        let home_window = self
            .db
            .get_previous_games(game.home_team, game.gameday, self.n_previous)?;
        let away_window = self
            .db
            .get_previous_games(game.away_team, game.gameday, self.n_previous)?;

        let mut degraded: Vec<String> = Vec::new();

        for (team, window) in [(game.home_team, &home_window), (game.away_team, &away_window)] {
            if window.is_empty() {
                match self.policy {
                    EmptyHistoryPolicy::Error => {
                        return Err(NflError::EmptySequence(format!(
                            "{} has no games before {} (target {})",
                            team, game.gameday, game.id
                        )));
                    }
                    EmptyHistoryPolicy::Skip => {
                        return Ok(Assembled::SkippedEmptyHistory(team));
                    }
                    EmptyHistoryPolicy::Zero => {
                        degraded.push(format!("{}: no stored history, zero sequence", team));
                    }
                }
            }
        }

        let mut values: Vec<Option<f64>> = Vec::new();

        for feature in &self.features.team {
            let home = team_sequence(&home_window, game.home_team, *feature);
            let away = team_sequence(&away_window, game.away_team, *feature);
            let out = self.aggregation.apply(feature.name(), &home, &away)?;
            values.extend(out.into_iter().map(Some));
        }

        if !self.features.player.is_empty() {
            // One batched fetch covers both windows; shared games appear once
            let mut window_ids: Vec<GameId> = home_window
                .iter()
                .chain(away_window.iter())
                .map(|g| g.id)
                .collect();
            window_ids.sort();
            window_ids.dedup();
            let rows = self.db.get_boxscores(&window_ids)?;

            for feature in &self.features.player {
                let key = feature.key();
                for (team, side) in [(game.home_team, "home"), (game.away_team, "away")] {
                    if !rows.iter().any(|r| r.team == team && r.stat(key).is_some()) {
                        degraded.push(format!("{} {}: no boxscore rows, zero sentinel", side, key));
                    }
                }
                let (home, away) =
                    filter_boxscores_by_team(&rows, game.home_team, game.away_team, *feature);
                let out = self.aggregation.apply(key, &home, &away)?;
                values.extend(out.into_iter().map(Some));
            }
        }

        for feature in &self.features.game {
            values.push(match feature {
                GameFeature::Temperature => {
                    if game.temperature.is_none() {
                        degraded.push("temperature missing".to_string());
                    }
                    game.temperature
                }
                GameFeature::Precipitation => match game.precipitation.as_deref() {
                    None => {
                        degraded.push("precipitation missing".to_string());
                        None
                    }
                    Some(text) => {
                        let level = self.severity.classify(Some(text));
                        if level.is_none() {
                            degraded.push(format!("precipitation unclassified: {}", text));
                        }
                        level.map(f64::from)
                    }
                },
            });
        }

        Ok(Assembled::Row(FeatureRow {
            game: game.id,
            label,
            values,
            degraded,
        }))
    }
}

/// A team's value sequence over its window, with the zero-policy sentinel
/// for an empty window
fn team_sequence(window: &[Game], team: TeamId, feature: super::TeamFeature) -> Vec<f64> {
    if window.is_empty() {
        return vec![0.0];
    }
    filter_by_team(window, team, feature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{PlayerFeature, TeamFeature};
    use crate::{Conference, Division, FeatureLists, PlayerGameStat, PlayerId, Team};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, d).unwrap()
    }

    fn seed_team(db: &Database, id: i64, name: &str) {
        db.upsert_team(&Team {
            id: TeamId(id),
            name: name.to_string(),
            display_name: name.to_string(),
            conference: Conference::Nfc,
            division: Division::East,
            logo: None,
            color: None,
        })
        .unwrap();
    }

    fn seed_game(db: &Database, id: i64, gameday: NaiveDate, home: i64, away: i64, hs: u32, as_: u32) -> Game {
        let game = Game {
            id: GameId(id),
            gameday,
            season: 2023,
            week: 1,
            home_team: TeamId(home),
            away_team: TeamId(away),
            home_score: hs,
            away_score: as_,
            home_third_down_pct: Some(0.5),
            away_third_down_pct: Some(0.25),
            home_time_possession: 30.0,
            away_time_possession: 30.0,
            temperature: None,
            precipitation: None,
        };
        db.upsert_game(&game).unwrap();
        game
    }

    fn seed_boxscore(db: &Database, game: i64, player: i64, team: i64, stat: &str, value: f64) {
        db.upsert_player(PlayerId(player), "Player").unwrap();
        let mut stats = HashMap::new();
        stats.insert(stat.to_string(), value);
        db.upsert_boxscore(&PlayerGameStat {
            game: GameId(game),
            player: PlayerId(player),
            team: TeamId(team),
            stats,
        })
        .unwrap();
    }

    fn assembler<'a>(
        db: &'a Database,
        features: FeatureSet,
        aggregation: Aggregation,
        policy: EmptyHistoryPolicy,
    ) -> FeatureAssembler<'a> {
        FeatureAssembler::new(db, features, aggregation, 5, SeverityTable::default(), policy)
    }

    fn score_only() -> FeatureSet {
        FeatureSet {
            team: vec![TeamFeature::Score],
            player: vec![],
            game: vec![],
        }
    }

    /// Two earlier games per side, then a target. Home team scored 20 and 10,
    /// away team 7 and 21.
    fn seed_history(db: &Database) -> Game {
        seed_team(db, 1, "Home");
        seed_team(db, 2, "Away");
        seed_team(db, 3, "Other");
        seed_game(db, 100, date(9, 3), 1, 3, 10, 0);
        seed_game(db, 101, date(9, 10), 1, 3, 20, 3);
        seed_game(db, 102, date(9, 3), 2, 3, 7, 0);
        seed_game(db, 103, date(9, 10), 3, 2, 14, 21);
        seed_game(db, 200, date(9, 17), 1, 2, 31, 17)
    }

    #[test]
    fn average_row_uses_only_prior_games() {
        let db = Database::in_memory().unwrap();
        let target = seed_history(&db);
        let asm = assembler(&db, score_only(), Aggregation::Average, EmptyHistoryPolicy::Error);
        let Assembled::Row(row) = asm.assemble(&target).unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(row.label, Label::Home);
        // home scores 10, 20 -> 15; away scores 7, 21 -> 14
        assert_eq!(row.values, vec![Some(15.0), Some(14.0)]);
        assert!(row.degraded.is_empty());
    }

    #[test]
    fn discounted_sum_weights_the_most_recent_game_fully() {
        let db = Database::in_memory().unwrap();
        let target = seed_history(&db);
        let asm = assembler(
            &db,
            score_only(),
            Aggregation::DiscountedSum { factor: 0.5 },
            EmptyHistoryPolicy::Error,
        );
        let Assembled::Row(row) = asm.assemble(&target).unwrap() else {
            panic!("expected a row");
        };
        // most recent first: home 20 + 10*0.5, away 21 + 7*0.5
        assert_eq!(row.values, vec![Some(25.0), Some(24.5)]);
    }

    #[test]
    fn composite_emits_one_signed_column() {
        let db = Database::in_memory().unwrap();
        let target = seed_history(&db);
        let asm = assembler(
            &db,
            score_only(),
            Aggregation::CompositeAverage,
            EmptyHistoryPolicy::Error,
        );
        assert_eq!(asm.columns(), vec!["score"]);
        let Assembled::Row(row) = asm.assemble(&target).unwrap() else {
            panic!("expected a row");
        };
        // mean(away) - mean(home) = 14 - 15; negative favors home
        assert_eq!(row.values, vec![Some(-1.0)]);
    }

    #[test]
    fn tied_target_is_skipped() {
        let db = Database::in_memory().unwrap();
        seed_history(&db);
        let tie = seed_game(&db, 201, date(9, 24), 1, 2, 20, 20);
        let asm = assembler(&db, score_only(), Aggregation::Average, EmptyHistoryPolicy::Error);
        assert!(matches!(asm.assemble(&tie).unwrap(), Assembled::SkippedTie));
    }

    #[test]
    fn empty_history_policies() {
        let db = Database::in_memory().unwrap();
        seed_team(&db, 1, "Home");
        seed_team(&db, 2, "Away");
        let opener = seed_game(&db, 300, date(9, 3), 1, 2, 24, 17);

        let asm = assembler(&db, score_only(), Aggregation::Average, EmptyHistoryPolicy::Error);
        assert!(matches!(
            asm.assemble(&opener),
            Err(NflError::EmptySequence(_))
        ));

        let asm = assembler(&db, score_only(), Aggregation::Average, EmptyHistoryPolicy::Skip);
        assert!(matches!(
            asm.assemble(&opener).unwrap(),
            Assembled::SkippedEmptyHistory(TeamId(1))
        ));

        let asm = assembler(&db, score_only(), Aggregation::Average, EmptyHistoryPolicy::Zero);
        let Assembled::Row(row) = asm.assemble(&opener).unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(row.values, vec![Some(0.0), Some(0.0)]);
        assert_eq!(row.degraded.len(), 2);
        assert!(row.degraded[0].contains("no stored history"));
    }

    #[test]
    fn player_stats_aggregate_over_both_windows() {
        let db = Database::in_memory().unwrap();
        let target = seed_history(&db);
        // Home team's QB across its two window games
        seed_boxscore(&db, 100, 10, 1, "passingyards", 200.0);
        seed_boxscore(&db, 101, 10, 1, "passingyards", 300.0);
        // Away team recorded the stat only once
        seed_boxscore(&db, 103, 20, 2, "passingyards", 150.0);

        let features = FeatureSet {
            team: vec![],
            player: vec![PlayerFeature::PassingYards],
            game: vec![],
        };
        let asm = assembler(&db, features, Aggregation::Average, EmptyHistoryPolicy::Error);
        let Assembled::Row(row) = asm.assemble(&target).unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(row.values, vec![Some(250.0), Some(150.0)]);
    }

    #[test]
    fn team_without_boxscore_rows_averages_the_sentinel() {
        let db = Database::in_memory().unwrap();
        let target = seed_history(&db);
        seed_boxscore(&db, 101, 10, 1, "sacks", 3.0);

        let features = FeatureSet {
            team: vec![],
            player: vec![PlayerFeature::Sacks],
            game: vec![],
        };
        let asm = assembler(&db, features, Aggregation::Average, EmptyHistoryPolicy::Error);
        let Assembled::Row(row) = asm.assemble(&target).unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(row.values, vec![Some(3.0), Some(0.0)]);
        assert_eq!(
            row.degraded,
            vec!["away sacks: no boxscore rows, zero sentinel".to_string()]
        );
    }

    #[test]
    fn weather_features_classify_or_stay_empty() {
        let db = Database::in_memory().unwrap();
        let mut target = seed_history(&db);
        target.temperature = Some(41.0);
        target.precipitation = Some("Light Rain".to_string());
        db.upsert_game(&target).unwrap();

        let features = FeatureSet {
            team: vec![],
            player: vec![],
            game: vec![GameFeature::Temperature, GameFeature::Precipitation],
        };
        let asm = assembler(&db, features.clone(), Aggregation::Average, EmptyHistoryPolicy::Error);
        let Assembled::Row(row) = asm.assemble(&target).unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(row.values, vec![Some(41.0), Some(3.0)]);
        assert!(row.degraded.is_empty());

        // Missing weather stays empty rather than defaulting
        target.temperature = None;
        target.precipitation = None;
        let Assembled::Row(row) = asm.assemble(&target).unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(row.values, vec![None, None]);
        assert_eq!(
            row.degraded,
            vec!["temperature missing".to_string(), "precipitation missing".to_string()]
        );
    }

    #[test]
    fn unclassifiable_precipitation_is_noted() {
        let db = Database::in_memory().unwrap();
        let mut target = seed_history(&db);
        target.temperature = Some(55.0);
        target.precipitation = Some("Windy".to_string());

        let features = FeatureSet {
            team: vec![],
            player: vec![],
            game: vec![GameFeature::Temperature, GameFeature::Precipitation],
        };
        let asm = assembler(&db, features, Aggregation::Average, EmptyHistoryPolicy::Error);
        let Assembled::Row(row) = asm.assemble(&target).unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(row.values, vec![Some(55.0), None]);
        assert_eq!(row.degraded, vec!["precipitation unclassified: Windy".to_string()]);
    }

    #[test]
    fn from_config_rejects_bad_knobs() {
        let db = Database::in_memory().unwrap();
        let mut config = BuildConfig {
            n_previous_games: 5,
            aggregation: "avg".to_string(),
            discount_factor: 0.9,
            empty_history: "error".to_string(),
            features: FeatureLists {
                team: vec!["score".to_string()],
                player: vec![],
                game: vec![],
            },
        };
        assert!(FeatureAssembler::from_config(&db, &config, SeverityTable::default()).is_ok());

        config.n_previous_games = 0;
        assert!(FeatureAssembler::from_config(&db, &config, SeverityTable::default()).is_err());

        config.n_previous_games = 5;
        config.empty_history = "panic".to_string();
        assert!(FeatureAssembler::from_config(&db, &config, SeverityTable::default()).is_err());
    }
}
