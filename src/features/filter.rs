//! Statistic filters
//!
//! Extract one feature's value sequence, attributable to one team, from a
//! window of historical games or boxscore rows. Input order is preserved:
//! the store delivers windows most-recent-game-first and the aggregation
//! strategies depend on that ordering.

use super::{PlayerFeature, TeamFeature};
use crate::{Game, PlayerGameStat, TeamId};

/// For every game the team appears in, take the value from the side it
/// played: the home value where it was home, the away value where it was
/// away. One value per qualifying game, in input order.
pub fn filter_by_team(games: &[Game], team: TeamId, feature: TeamFeature) -> Vec<f64> {
    let mut values = Vec::new();
    for game in games {
        if game.home_team == team {
            values.push(feature.home_value(game));
        }
        if game.away_team == team {
            values.push(feature.away_value(game));
        }
    }
    values
}

/// Sum a per-player stat into team totals per game, then split into the two
/// teams' sequences.
///
/// Rows missing the stat are excluded from the sum entirely, not counted as
/// zero, so a game where no player recorded the stat contributes no value at
/// all. Per-game totals keep first-seen game order from the input, which the
/// store delivers most-recent-first. A team with no qualifying rows yields
/// the `[0.0]` sentinel rather than an empty sequence; this keeps downstream
/// averages defined at the cost of biasing teams with no recorded history.
pub fn filter_boxscores_by_team(
    rows: &[PlayerGameStat],
    home_team: TeamId,
    away_team: TeamId,
    feature: PlayerFeature,
) -> (Vec<f64>, Vec<f64>) {
    let key = feature.key();
    let mut home_totals: Vec<(crate::GameId, f64)> = Vec::new();
    let mut away_totals: Vec<(crate::GameId, f64)> = Vec::new();

    for row in rows {
        let Some(value) = row.stat(key) else { continue };
        let totals = if row.team == home_team {
            &mut home_totals
        } else if row.team == away_team {
            &mut away_totals
        } else {
            continue;
        };
        match totals.iter_mut().find(|(game, _)| *game == row.game) {
            Some((_, total)) => *total += value,
            None => totals.push((row.game, value)),
        }
    }

    let home = sequence_or_sentinel(home_totals);
    let away = sequence_or_sentinel(away_totals);
    (home, away)
}

fn sequence_or_sentinel(totals: Vec<(crate::GameId, f64)>) -> Vec<f64> {
    if totals.is_empty() {
        vec![0.0]
    } else {
        totals.into_iter().map(|(_, value)| value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GameId, PlayerId};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn make_game(id: i64, home: i64, away: i64, home_score: u32, away_score: u32) -> Game {
        Game {
            id: GameId(id),
            gameday: NaiveDate::from_ymd_opt(2023, 9, 10).unwrap(),
            season: 2023,
            week: 1,
            home_team: TeamId(home),
            away_team: TeamId(away),
            home_score,
            away_score,
            home_third_down_pct: Some(0.4),
            away_third_down_pct: None,
            home_time_possession: 31.0,
            away_time_possession: 29.0,
            temperature: None,
            precipitation: None,
        }
    }

    fn make_row(game: i64, player: i64, team: i64, stats: &[(&str, f64)]) -> PlayerGameStat {
        PlayerGameStat {
            game: GameId(game),
            player: PlayerId(player),
            team: TeamId(team),
            stats: stats
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn team_values_come_from_the_side_played() {
        let games = vec![make_game(1, 1, 2, 10, 7), make_game(2, 2, 1, 3, 20)];
        let values = filter_by_team(&games, TeamId(1), TeamFeature::Score);
        assert_eq!(values, vec![10.0, 20.0]);
    }

    #[test]
    fn uninvolved_team_yields_nothing() {
        let games = vec![make_game(1, 1, 2, 10, 7)];
        assert!(filter_by_team(&games, TeamId(9), TeamFeature::Score).is_empty());
    }

    #[test]
    fn null_third_down_rate_reads_as_zero() {
        let games = vec![make_game(1, 1, 2, 10, 7)];
        assert_eq!(
            filter_by_team(&games, TeamId(2), TeamFeature::ThirdDownPct),
            vec![0.0]
        );
    }

    #[test]
    fn boxscores_sum_per_team_per_game() {
        let rows = vec![
            make_row(10, 100, 1, &[("passingyards", 250.0)]),
            make_row(10, 101, 1, &[("passingyards", 12.0)]),
            make_row(10, 200, 2, &[("passingyards", 301.0)]),
            make_row(11, 100, 1, &[("passingyards", 180.0)]),
        ];
        let (home, away) =
            filter_boxscores_by_team(&rows, TeamId(1), TeamId(2), PlayerFeature::PassingYards);
        assert_eq!(home, vec![262.0, 180.0]);
        assert_eq!(away, vec![301.0]);
    }

    #[test]
    fn missing_stat_rows_are_excluded_not_zeroed() {
        // Player 101 has no sacks stat at all; game 11 has no qualifying rows
        // for team 1 and must not appear in the sequence.
        let rows = vec![
            make_row(10, 100, 1, &[("sacks", 2.0)]),
            make_row(11, 101, 1, &[("passingyards", 200.0)]),
        ];
        let (home, _) =
            filter_boxscores_by_team(&rows, TeamId(1), TeamId(2), PlayerFeature::Sacks);
        assert_eq!(home, vec![2.0]);
    }

    #[test]
    fn team_without_rows_gets_zero_sentinel() {
        let rows = vec![make_row(10, 100, 1, &[("sacks", 2.0)])];
        let (home, away) =
            filter_boxscores_by_team(&rows, TeamId(1), TeamId(2), PlayerFeature::Sacks);
        assert_eq!(home, vec![2.0]);
        assert_eq!(away, vec![0.0]);
    }

    #[test]
    fn both_teams_empty_still_get_sentinels() {
        let (home, away) =
            filter_boxscores_by_team(&[], TeamId(1), TeamId(2), PlayerFeature::Sacks);
        assert_eq!(home, vec![0.0]);
        assert_eq!(away, vec![0.0]);
    }
}
