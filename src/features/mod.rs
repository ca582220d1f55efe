//! Feature engineering
//!
//! Turns a game plus the rolling history of its two teams into one numeric
//! feature row. Feature names from configuration are validated into the typed
//! enums here before any row is built, so an unknown name is a configuration
//! error rather than a mid-batch failure.

pub mod aggregate;
pub mod assembler;
pub mod filter;
pub mod weather;

pub use aggregate::Aggregation;
pub use assembler::{Assembled, EmptyHistoryPolicy, FeatureAssembler, FeatureRow};
pub use weather::SeverityTable;

use crate::{FeatureLists, Game, NflError, Result};

/// A team-level feature: one home and one away value per game row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamFeature {
    Score,
    ThirdDownPct,
}

impl TeamFeature {
    pub fn name(&self) -> &'static str {
        match self {
            TeamFeature::Score => "score",
            TeamFeature::ThirdDownPct => "third_dwn_pct",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "score" => Some(TeamFeature::Score),
            "third_dwn_pct" => Some(TeamFeature::ThirdDownPct),
            _ => None,
        }
    }

    /// Extract the home-side value. A null third-down rate reads as 0.0, the
    /// documented sentinel for zero attempts.
    pub fn home_value(&self, game: &Game) -> f64 {
        match self {
            TeamFeature::Score => game.home_score as f64,
            TeamFeature::ThirdDownPct => game.home_third_down_pct.unwrap_or(0.0),
        }
    }

    pub fn away_value(&self, game: &Game) -> f64 {
        match self {
            TeamFeature::Score => game.away_score as f64,
            TeamFeature::ThirdDownPct => game.away_third_down_pct.unwrap_or(0.0),
        }
    }
}

/// A player-level feature, summed per team per game from boxscore rows.
/// The key matches the lowercased stat name stored at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerFeature {
    AdjQbr,
    PassingYards,
    RushingYards,
    Fumbles,
    TotalTackles,
    Sacks,
    Interceptions,
    QbHits,
}

impl PlayerFeature {
    pub fn key(&self) -> &'static str {
        match self {
            PlayerFeature::AdjQbr => "adjqbr",
            PlayerFeature::PassingYards => "passingyards",
            PlayerFeature::RushingYards => "rushingyards",
            PlayerFeature::Fumbles => "fumbles",
            PlayerFeature::TotalTackles => "totaltackles",
            PlayerFeature::Sacks => "sacks",
            PlayerFeature::Interceptions => "interceptions",
            PlayerFeature::QbHits => "qbhits",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "adjqbr" => Some(PlayerFeature::AdjQbr),
            "passingyards" => Some(PlayerFeature::PassingYards),
            "rushingyards" => Some(PlayerFeature::RushingYards),
            "fumbles" => Some(PlayerFeature::Fumbles),
            "totaltackles" => Some(PlayerFeature::TotalTackles),
            "sacks" => Some(PlayerFeature::Sacks),
            "interceptions" => Some(PlayerFeature::Interceptions),
            "qbhits" => Some(PlayerFeature::QbHits),
            _ => None,
        }
    }
}

/// A game-level feature, independent of either team
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameFeature {
    Temperature,
    Precipitation,
}

impl GameFeature {
    /// Output column name. Precipitation is stored classified, so its column
    /// is `precip_severity` rather than the raw name.
    pub fn column(&self) -> &'static str {
        match self {
            GameFeature::Temperature => "temperature",
            GameFeature::Precipitation => "precip_severity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "temperature" => Some(GameFeature::Temperature),
            "precipitation" => Some(GameFeature::Precipitation),
            _ => None,
        }
    }
}

/// The validated set of active features for one build invocation
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub team: Vec<TeamFeature>,
    pub player: Vec<PlayerFeature>,
    pub game: Vec<GameFeature>,
}

impl FeatureSet {
    /// Validate configured feature names. Fails fast with a configuration
    /// error on any unknown name.
    pub fn from_config(lists: &FeatureLists) -> Result<Self> {
        let team = lists
            .team
            .iter()
            .map(|name| {
                TeamFeature::from_name(name)
                    .ok_or_else(|| NflError::Config(format!("Unknown team feature: {}", name)))
            })
            .collect::<Result<Vec<_>>>()?;

        let player = lists
            .player
            .iter()
            .map(|name| {
                PlayerFeature::from_name(name)
                    .ok_or_else(|| NflError::Config(format!("Unknown player feature: {}", name)))
            })
            .collect::<Result<Vec<_>>>()?;

        let game = lists
            .game
            .iter()
            .map(|name| {
                GameFeature::from_name(name)
                    .ok_or_else(|| NflError::Config(format!("Unknown game feature: {}", name)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FeatureSet { team, player, game })
    }

    /// Engineered column names, in row order, for the given aggregation.
    /// Composite aggregation emits one signed column per feature instead of a
    /// home/away pair.
    pub fn columns(&self, aggregation: &Aggregation) -> Vec<String> {
        let mut columns = Vec::new();
        for feature in &self.team {
            push_feature_columns(&mut columns, feature.name(), aggregation);
        }
        for feature in &self.player {
            push_feature_columns(&mut columns, feature.key(), aggregation);
        }
        for feature in &self.game {
            columns.push(feature.column().to_string());
        }
        columns
    }
}

fn push_feature_columns(columns: &mut Vec<String>, name: &str, aggregation: &Aggregation) {
    if aggregation.is_composite() {
        columns.push(name.to_string());
    } else {
        columns.push(format!("home_{}", name));
        columns.push(format!("away_{}", name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_feature_name_is_a_config_error() {
        let lists = FeatureLists {
            team: vec!["score".to_string(), "punts".to_string()],
            player: vec![],
            game: vec![],
        };
        let err = FeatureSet::from_config(&lists).unwrap_err();
        assert!(matches!(err, NflError::Config(_)));
    }

    #[test]
    fn valid_names_resolve() {
        let lists = FeatureLists {
            team: vec!["score".to_string()],
            player: vec!["sacks".to_string(), "qbhits".to_string()],
            game: vec!["precipitation".to_string()],
        };
        let set = FeatureSet::from_config(&lists).unwrap();
        assert_eq!(set.team, vec![TeamFeature::Score]);
        assert_eq!(set.player, vec![PlayerFeature::Sacks, PlayerFeature::QbHits]);
        assert_eq!(set.game, vec![GameFeature::Precipitation]);
    }

    #[test]
    fn composite_halves_column_width() {
        let set = FeatureSet {
            team: vec![TeamFeature::Score],
            player: vec![PlayerFeature::Sacks],
            game: vec![GameFeature::Temperature],
        };
        let pair = set.columns(&Aggregation::Average);
        assert_eq!(
            pair,
            vec!["home_score", "away_score", "home_sacks", "away_sacks", "temperature"]
        );
        let composite = set.columns(&Aggregation::CompositeAverage);
        assert_eq!(composite, vec!["score", "sacks", "temperature"]);
    }
}
