//! nflweather.com scraper
//!
//! Game pages carry per-quarter conditions as free text. The page URL is
//! built from the season, an era-dependent week slug and the two team
//! nicknames, which need their own era-dependent renames for Washington.

use crate::features::SeverityTable;
use crate::{NflError, Result};
use regex::Regex;
use scraper::Html;

const SOURCE: &str = "nflweather";

/// A parsed weather reading for one game
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    /// Mean temperature over the reported quarters, Fahrenheit
    pub temperature: f64,
    /// Raw descriptor text of the most severe quarter; the store keeps this
    /// verbatim and classification happens at feature-build time
    pub precipitation: Option<String>,
}

/// Scraper for nflweather.com game pages
pub struct WeatherScraper {
    client: reqwest::blocking::Client,
    severity: SeverityTable,
    quarter_pattern: Regex,
    whitespace: Regex,
}

impl WeatherScraper {
    pub fn new(severity: SeverityTable) -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent("nflstats/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        WeatherScraper {
            client,
            severity,
            // Quarter label, descriptor text, then the temperature
            quarter_pattern: Regex::new(r"(Kickoff|Q2|Q3|Q4)\s([a-zA-Z\s]*)([0-9]{1,3})")
                .expect("invalid quarter pattern"),
            whitespace: Regex::new(r"\s+").expect("invalid whitespace pattern"),
        }
    }

    /// Fetch the weather for one game. Returns Ok(None) when the page loads
    /// but no per-quarter conditions can be parsed from it.
    pub fn fetch_game_weather(
        &self,
        home_name: &str,
        away_name: &str,
        season: u16,
        week: i16,
    ) -> Result<Option<WeatherReport>> {
        let url = game_url(home_name, away_name, season, week);
        log::debug!("Fetching weather from {}", url);
        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(NflError::Scraper {
                source_name: SOURCE.to_string(),
                message: format!("HTTP {} for {}", response.status(), url),
            });
        }
        let html = response.text()?;
        let text = self.page_text(&html);
        Ok(self.parse_conditions(&text))
    }

    /// Strip a page down to single-space separated text
    fn page_text(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
        self.whitespace.replace_all(&text, " ").into_owned()
    }

    /// Parse per-quarter conditions out of page text. The reading averages
    /// the quarter temperatures and keeps the descriptor of the most severe
    /// quarter, falling back to the last quarter's text when nothing in the
    /// severity table matches.
    pub fn parse_conditions(&self, text: &str) -> Option<WeatherReport> {
        let mut quarters: Vec<(String, f64)> = Vec::new();
        for captures in self.quarter_pattern.captures_iter(text) {
            let descriptor = captures[2].trim().to_lowercase();
            let Ok(temperature) = captures[3].parse::<f64>() else {
                continue;
            };
            quarters.push((descriptor, temperature));
        }
        if quarters.is_empty() {
            return None;
        }

        let temperature =
            quarters.iter().map(|(_, t)| t).sum::<f64>() / quarters.len() as f64;

        let mut worst: Option<(u8, &str)> = None;
        for (descriptor, _) in &quarters {
            if let Some(level) = self.severity.worst_match(descriptor) {
                if worst.map_or(true, |(best, _)| level >= best) {
                    worst = Some((level, descriptor));
                }
            }
        }
        let precipitation = worst
            .map(|(_, descriptor)| descriptor.to_string())
            .or_else(|| {
                let last = &quarters[quarters.len() - 1].0;
                (!last.is_empty()).then(|| last.clone())
            });

        Some(WeatherReport {
            temperature,
            precipitation,
        })
    }
}

/// Build the nflweather.com page URL for one game
pub fn game_url(home_name: &str, away_name: &str, season: u16, week: i16) -> String {
    let (home, away) = rename_washington(home_name, away_name, season, week);
    // Only the last word of a nickname appears in the path
    let home = home.split_whitespace().last().unwrap_or(&home).to_string();
    let away = away.split_whitespace().last().unwrap_or(&away).to_string();
    format!(
        "https://www.nflweather.com/games/{}/{}/{}-at-{}",
        season,
        week_slug(season, week),
        away,
        home
    )
}

/// Washington's nflweather name depends on the era: redskins through 2019,
/// football team for most of 2020, then back to Washington for the
/// Commanders years.
fn rename_washington(
    home: &str,
    away: &str,
    season: u16,
    week: i16,
) -> (String, String) {
    let rename = |name: &str| -> String {
        if season > 2020 {
            if name == "Commanders" {
                return "Washington".to_string();
            }
        } else if season == 2020 {
            if name == "Washington" && (week < 12 || week == 15) {
                return if week > 2 {
                    "football%20team".to_string()
                } else {
                    "redskins".to_string()
                };
            }
        } else if name == "Washington" {
            return "redskins".to_string();
        }
        name.to_string()
    };
    (rename(home), rename(away))
}

/// Map the stored week encoding to the nflweather path segment
fn week_slug(season: u16, week: i16) -> String {
    // Through 2020 nflweather numbered the late postseason one week higher
    let week = if week >= 18 && season <= 2020 {
        week + 1
    } else {
        week
    };
    if week > 18 && season < 2023 {
        match week {
            19 => "wildcard-weekend".to_string(),
            20 => "divisional-playoffs".to_string(),
            21 => {
                if season > 2018 {
                    "%20conf-championships".to_string()
                } else {
                    "conf-championships".to_string()
                }
            }
            23 => "superbowl".to_string(),
            other => other.to_string(),
        }
    } else if week > 18 {
        match week {
            19 => "wild-card".to_string(),
            20 => "conference-championship".to_string(),
            other => other.to_string(),
        }
    } else if week < 0 && season >= 2023 {
        match week {
            -1 => "preseason-week-3".to_string(),
            -2 => "preseason-week-2".to_string(),
            -3 => "preseason-week-1".to_string(),
            -4 => "hall-of-fame-weekend".to_string(),
            other => other.to_string(),
        }
    } else if week <= 0 {
        match week {
            0 => "pre-season-week-4".to_string(),
            -1 => "pre-season-week-3".to_string(),
            -2 => "pre-season-week-2".to_string(),
            -3 | -4 => "pre-season-week-1".to_string(),
            other => other.to_string(),
        }
    } else {
        format!("week-{}", week)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_season_url() {
        assert_eq!(
            game_url("Browns", "Bengals", 2023, 5),
            "https://www.nflweather.com/games/2023/week-5/Bengals-at-Browns"
        );
    }

    #[test]
    fn postseason_slugs_by_era() {
        assert_eq!(week_slug(2022, 19), "wildcard-weekend");
        assert_eq!(week_slug(2022, 20), "divisional-playoffs");
        assert_eq!(week_slug(2022, 21), "%20conf-championships");
        assert_eq!(week_slug(2017, 20), "conf-championships");
        assert_eq!(week_slug(2022, 23), "superbowl");
        assert_eq!(week_slug(2023, 19), "wild-card");
        assert_eq!(week_slug(2023, 20), "conference-championship");
    }

    #[test]
    fn old_postseason_weeks_shift_up() {
        // A 2019 conference championship is stored as week 20 but lives at
        // the week-21 slug
        assert_eq!(week_slug(2019, 20), "%20conf-championships");
        assert_eq!(week_slug(2019, 22), "superbowl");
    }

    #[test]
    fn preseason_slugs_by_era() {
        assert_eq!(week_slug(2023, -4), "hall-of-fame-weekend");
        assert_eq!(week_slug(2023, -3), "preseason-week-1");
        assert_eq!(week_slug(2019, -4), "pre-season-week-1");
        assert_eq!(week_slug(2019, 0), "pre-season-week-4");
    }

    #[test]
    fn washington_renames_by_era() {
        assert!(game_url("Washington", "Cowboys", 2019, 5).contains("Cowboys-at-redskins"));
        assert!(game_url("Washington", "Cowboys", 2020, 2).contains("Cowboys-at-redskins"));
        assert!(
            game_url("Washington", "Cowboys", 2020, 7).contains("Cowboys-at-football%20team")
        );
        assert!(game_url("Commanders", "Cowboys", 2023, 5).contains("Cowboys-at-Washington"));
    }

    #[test]
    fn multi_word_nicknames_keep_the_last_word() {
        assert!(game_url("Football Team", "Giants", 2021, 2).contains("Giants-at-Team"));
    }

    fn scraper() -> WeatherScraper {
        WeatherScraper::new(SeverityTable::default())
    }

    #[test]
    fn parses_quarters_and_averages_temperature() {
        let text = "Kickoff Light Rain 55 Q2 Rain 54 Q3 Cloudy 53 Q4 Clear 50";
        let report = scraper().parse_conditions(text).unwrap();
        assert_eq!(report.temperature, 53.0);
        // rain outranks cloudy and clear
        assert_eq!(report.precipitation.as_deref(), Some("rain"));
    }

    #[test]
    fn unmatched_descriptors_fall_back_to_the_last_quarter() {
        let text = "Kickoff Windy 40 Q2 Breezy 41 Q3 Windy 42 Q4 Gusty 43";
        let report = scraper().parse_conditions(text).unwrap();
        assert_eq!(report.precipitation.as_deref(), Some("gusty"));
    }

    #[test]
    fn page_without_conditions_yields_none() {
        assert!(scraper().parse_conditions("no weather here").is_none());
    }

    #[test]
    fn dome_games_with_bare_temperatures_still_average() {
        let text = "Kickoff 72 Q2 72 Q3 72 Q4 72";
        let report = scraper().parse_conditions(text).unwrap();
        assert_eq!(report.temperature, 72.0);
        assert_eq!(report.precipitation, None);
    }
}
