//! NFL stats pipeline CLI
//!
//! Scrapes historical game data into a local SQLite store and builds
//! rolling-window feature datasets for win/loss classifiers.

use clap::{Parser, Subcommand};
use nflstats::{Config, Result};

#[derive(Parser)]
#[command(name = "nflstats")]
#[command(about = "NFL game data pipeline and feature builder", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one season's games, boxscores and weather into the store
    Ingest {
        /// Calendar year to scrape
        year: u16,
        /// Skip games on or before this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<chrono::NaiveDate>,
        /// Skip the weather scrape
        #[arg(long)]
        no_weather: bool,
    },
    /// Build a feature dataset from stored seasons
    Build {
        /// First season to include
        start_year: u16,
        /// Last season to include (defaults to start year)
        end_year: Option<u16>,
        /// Output CSV path (overrides config)
        #[arg(short, long)]
        output: Option<String>,
        /// Aggregation method (overrides config)
        #[arg(long)]
        aggregation: Option<String>,
        /// Rolling-window size (overrides config)
        #[arg(long)]
        window: Option<usize>,
    },
    /// Backfill weather for stored games that still lack it
    Weather {
        /// Season to backfill
        year: u16,
    },
    /// Show database status
    Status,
    /// Initialize a new project with default config
    Init,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Ingest {
            year,
            since,
            no_weather,
        } => commands::ingest(&config, year, since, no_weather),
        Commands::Build {
            start_year,
            end_year,
            output,
            aggregation,
            window,
        } => commands::build(&config, start_year, end_year, output, aggregation, window),
        Commands::Weather { year } => commands::weather(&config, year),
        Commands::Status => commands::status(&config),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use chrono::NaiveDate;
    use nflstats::data::scrapers::{with_retry, EspnScraper, WeatherScraper};
    use nflstats::data::{Database, DatasetBuilder};
    use nflstats::Game;
    use std::collections::HashSet;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        println!("Created data/ directory");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'nflstats ingest 2023' to fetch a season");
        println!("  3. Run 'nflstats build 2023' to generate a feature CSV");

        Ok(())
    }

    pub fn ingest(
        config: &Config,
        year: u16,
        since: Option<NaiveDate>,
        no_weather: bool,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let espn = EspnScraper::new();
        let weather = WeatherScraper::new(db.load_severity_table()?);

        println!("Getting NFL data for {}", year);
        let events = with_retry(|| espn.fetch_events(year), 3)?;

        let mut known_teams: HashSet<_> =
            db.get_all_teams()?.into_iter().map(|t| t.id).collect();
        let mut num_games = 0;
        let mut missing_weather = Vec::new();

        let progress = indicatif::ProgressBar::new(events.len() as u64);
        for event in &events {
            progress.inc(1);
            if nflstats::data::scrapers::espn::is_pro_bowl(event) {
                continue;
            }
            let scraped = nflstats::data::scrapers::espn::extract_game(event)?;
            if since.map_or(false, |cutoff| scraped.gameday <= cutoff) {
                log::debug!("Skipping {} before cutoff", scraped.id);
                continue;
            }

            for team in [scraped.home_team, scraped.away_team] {
                if !known_teams.contains(&team) {
                    db.upsert_team(&with_retry(|| espn.fetch_team(team), 3)?)?;
                    known_teams.insert(team);
                }
            }

            let boxscore = with_retry(|| espn.fetch_boxscore(scraped.id), 3)?;

            let report = if no_weather {
                None
            } else {
                match weather.fetch_game_weather(
                    &scraped.home_name,
                    &scraped.away_name,
                    scraped.season,
                    scraped.week,
                ) {
                    Ok(Some(report)) => Some(report),
                    Ok(None) => {
                        missing_weather.push(scraped.id);
                        None
                    }
                    Err(e) => {
                        log::warn!("Weather fetch failed for {}: {}", scraped.id, e);
                        missing_weather.push(scraped.id);
                        None
                    }
                }
            };

            db.upsert_game(&Game {
                id: scraped.id,
                gameday: scraped.gameday,
                season: scraped.season,
                week: scraped.week,
                home_team: scraped.home_team,
                away_team: scraped.away_team,
                home_score: scraped.home_score,
                away_score: scraped.away_score,
                home_third_down_pct: Some(boxscore.totals.home_third_down_pct),
                away_third_down_pct: Some(boxscore.totals.away_third_down_pct),
                home_time_possession: boxscore.totals.home_time_possession,
                away_time_possession: boxscore.totals.away_time_possession,
                temperature: report.as_ref().map(|r| r.temperature),
                precipitation: report.and_then(|r| r.precipitation),
            })?;

            for (player, name) in &boxscore.player_names {
                db.upsert_player(*player, name)?;
            }
            for line in &boxscore.player_stats {
                db.upsert_boxscore(line)?;
            }
            num_games += 1;
            log::debug!(
                "Game {} (week {} | {} at {}) on {}: {} boxscores",
                scraped.id,
                scraped.week,
                scraped.away_name,
                scraped.home_name,
                scraped.gameday,
                boxscore.player_stats.len()
            );
        }
        progress.finish_and_clear();

        println!("Collected data for {} games", num_games);
        if !missing_weather.is_empty() {
            println!(
                "Missing weather data for {} games: {:?}",
                missing_weather.len(),
                missing_weather
            );
        }
        Ok(())
    }

    pub fn build(
        config: &Config,
        start_year: u16,
        end_year: Option<u16>,
        output: Option<String>,
        aggregation: Option<String>,
        window: Option<usize>,
    ) -> Result<()> {
        let end_year = end_year.unwrap_or(start_year);
        let output = output.unwrap_or_else(|| config.data.output_path.clone());

        let mut build_config = config.build.clone();
        if let Some(aggregation) = aggregation {
            build_config.aggregation = aggregation;
        }
        if let Some(window) = window {
            build_config.n_previous_games = window;
        }

        let db = Database::open(&config.data.database_path)?;
        let builder = DatasetBuilder::from_config(&db, &build_config)?;
        let (dataset, report) = builder.build_seasons(start_year, end_year)?;
        dataset.write_csv(&output)?;

        println!(
            "Wrote {} rows x {} columns to {}",
            dataset.len(),
            dataset.columns.len(),
            output
        );
        println!(
            "Processed {} games: {} emitted, {} ties skipped, {} without history skipped",
            report.processed, report.emitted, report.skipped_ties, report.skipped_empty_history
        );
        if !report.degraded.is_empty() {
            println!(
                "{} emitted games used degraded features:",
                report.degraded.len()
            );
            for (game, notes) in &report.degraded {
                println!("  {}: {}", game, notes.join("; "));
            }
        }
        if !report.is_clean() {
            for (game, error) in &report.failures {
                eprintln!("Failed {}: {}", game, error);
            }
            eprintln!("{} games failed to assemble", report.failures.len());
            std::process::exit(1);
        }
        Ok(())
    }

    pub fn weather(config: &Config, year: u16) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let scraper = WeatherScraper::new(db.load_severity_table()?);

        let missing = db.games_missing_weather(year)?;
        if missing.is_empty() {
            println!("No stored {} games are missing weather", year);
            return Ok(());
        }
        println!("Backfilling weather for {} games", missing.len());

        let mut still_missing = Vec::new();
        let progress = indicatif::ProgressBar::new(missing.len() as u64);
        for id in &missing {
            progress.inc(1);
            let game = db.get_game(*id)?;
            let home = db.get_team(game.home_team)?;
            let away = db.get_team(game.away_team)?;
            match scraper.fetch_game_weather(&home.name, &away.name, game.season, game.week) {
                Ok(Some(report)) => {
                    db.set_game_weather(
                        *id,
                        Some(report.temperature),
                        report.precipitation.as_deref(),
                    )?;
                }
                Ok(None) => still_missing.push(*id),
                Err(e) => {
                    log::warn!("Weather fetch failed for {}: {}", id, e);
                    still_missing.push(*id);
                }
            }
        }
        progress.finish_and_clear();

        println!(
            "Filled weather for {} games",
            missing.len() - still_missing.len()
        );
        if !still_missing.is_empty() {
            println!(
                "Still missing weather for {} games: {:?}",
                still_missing.len(),
                still_missing
            );
        }
        Ok(())
    }

    pub fn status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database: {}", config.data.database_path);
        println!("  Teams:     {}", stats.team_count);
        println!("  Games:     {}", stats.game_count);
        println!("  Boxscores: {}", stats.boxscore_count);
        match (stats.earliest_game, stats.latest_game) {
            (Some(earliest), Some(latest)) => {
                println!("  Date range: {} to {}", earliest, latest);
            }
            _ => println!("  Date range: (no games)"),
        }
        Ok(())
    }
}
