//! Training dataset assembly
//!
//! Walks stored games season by season, assembles one feature row per
//! decided game and writes the result as CSV. A row that fails is recorded
//! and the walk continues, so one bad game does not abort a multi-season
//! build.

use crate::data::Database;
use crate::features::{Assembled, FeatureAssembler, FeatureRow};
use crate::{BuildConfig, GameId, NflError, Result};
use indicatif::ProgressBar;
use std::path::Path;

/// An assembled dataset: column names plus one row per emitted game
#[derive(Debug, Clone)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the dataset as CSV. Missing values (absent weather) become
    /// empty cells, not zeros.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = Vec::with_capacity(self.columns.len() + 2);
        header.push("game_id".to_string());
        header.extend(self.columns.iter().cloned());
        header.push("label".to_string());
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(row.game.0.to_string());
            for value in &row.values {
                record.push(match value {
                    Some(v) => v.to_string(),
                    None => String::new(),
                });
            }
            record.push(row.label.to_string());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Outcome counts for one build invocation. Failures carry the game they
/// belong to; the build itself always runs to completion. Degraded lists
/// every emitted game where some feature fell back to a sentinel or stayed
/// empty (missing weather, no boxscore rows).
#[derive(Debug, Default)]
pub struct BuildReport {
    pub processed: usize,
    pub emitted: usize,
    pub skipped_ties: usize,
    pub skipped_empty_history: usize,
    pub degraded: Vec<(GameId, Vec<String>)>,
    pub failures: Vec<(GameId, NflError)>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builds datasets from stored seasons with a fixed assembler
pub struct DatasetBuilder<'a> {
    db: &'a Database,
    assembler: FeatureAssembler<'a>,
}

impl<'a> DatasetBuilder<'a> {
    pub fn new(db: &'a Database, assembler: FeatureAssembler<'a>) -> Self {
        DatasetBuilder { db, assembler }
    }

    /// Construct from build configuration, loading the stored severity
    /// table. Configuration errors surface here, before any row is built.
    pub fn from_config(db: &'a Database, config: &BuildConfig) -> Result<Self> {
        let severity = db.load_severity_table()?;
        let assembler = FeatureAssembler::from_config(db, config, severity)?;
        Ok(Self::new(db, assembler))
    }

    /// Assemble every decided game in the inclusive season range,
    /// chronologically within each season.
    pub fn build_seasons(&self, start: u16, end: u16) -> Result<(Dataset, BuildReport)> {
        if start > end {
            return Err(NflError::Config(format!(
                "Season range is inverted: {} > {}",
                start, end
            )));
        }

        let mut games = Vec::new();
        for season in start..=end {
            games.extend(self.db.get_games_by_season(season)?);
        }
        log::info!(
            "Building dataset over {} games from seasons {}..={}",
            games.len(),
            start,
            end
        );

        let mut report = BuildReport::default();
        let mut rows = Vec::new();
        let progress = ProgressBar::new(games.len() as u64);
        for game in &games {
            report.processed += 1;
            match self.assembler.assemble(game) {
                Ok(Assembled::Row(row)) => {
                    if !row.degraded.is_empty() {
                        log::debug!("{} degraded: {}", row.game, row.degraded.join("; "));
                        report.degraded.push((row.game, row.degraded.clone()));
                    }
                    rows.push(row);
                }
                Ok(Assembled::SkippedTie) => {
                    report.skipped_ties += 1;
                    log::debug!("Skipping tied game {}", game.id);
                }
                Ok(Assembled::SkippedEmptyHistory(team)) => {
                    report.skipped_empty_history += 1;
                    log::debug!("Skipping {}: {} has no stored history", game.id, team);
                }
                Err(e) => {
                    log::warn!("Failed to assemble {}: {}", game.id, e);
                    report.failures.push((game.id, e));
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();
        report.emitted = rows.len();

        Ok((
            Dataset {
                columns: self.assembler.columns(),
                rows,
            },
            report,
        ))
    }
}
