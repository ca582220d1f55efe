//! Weather severity classification
//!
//! Scraped precipitation descriptors are inconsistent free text ("light
//! rain", "heavy thunderstorms"). Reducing them to a small ordinal scale
//! keeps the feature monotonic for classifiers at the cost of intensity
//! detail.

use std::collections::BTreeMap;

/// Ordinal severity table: level (smaller = milder) to descriptor
/// substrings. Immutable once constructed; components receive their own
/// table at construction rather than sharing mutable state.
#[derive(Debug, Clone)]
pub struct SeverityTable {
    levels: BTreeMap<u8, Vec<String>>,
}

impl Default for SeverityTable {
    fn default() -> Self {
        // Descriptors observed on nflweather.com, the weather data source
        Self::from_levels([
            (1, &["sun", "fair", "clear"][..]),
            (2, &["cloud", "overcast", "humid", "fog", "drizzle"][..]),
            (3, &["rain", "thunderstorms"][..]),
            (4, &["snow"][..]),
        ])
    }
}

impl SeverityTable {
    pub fn from_levels<'a>(levels: impl IntoIterator<Item = (u8, &'a [&'a str])>) -> Self {
        let levels = levels
            .into_iter()
            .map(|(level, descriptors)| {
                (
                    level,
                    descriptors.iter().map(|d| d.to_lowercase()).collect(),
                )
            })
            .collect();
        SeverityTable { levels }
    }

    /// Build from persisted (descriptor, severity) rows, e.g. the store's
    /// precipitation table
    pub fn from_rows(rows: impl IntoIterator<Item = (String, u8)>) -> Self {
        let mut levels: BTreeMap<u8, Vec<String>> = BTreeMap::new();
        for (descriptor, severity) in rows {
            levels.entry(severity).or_default().push(descriptor.to_lowercase());
        }
        SeverityTable { levels }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Levels in ascending severity with their descriptor substrings
    pub fn levels(&self) -> impl Iterator<Item = (u8, &[String])> {
        self.levels.iter().map(|(level, d)| (*level, d.as_slice()))
    }

    /// Classify a free-text descriptor to its severity level.
    ///
    /// Levels are inspected in ascending order and the first level with a
    /// case-insensitive substring match wins; a text matching several levels
    /// therefore resolves to the mildest. Returns None for null text or no
    /// match.
    pub fn classify(&self, text: Option<&str>) -> Option<u8> {
        let text = text?.to_lowercase();
        for (level, descriptors) in &self.levels {
            if descriptors.iter().any(|d| text.contains(d.as_str())) {
                return Some(*level);
            }
        }
        None
    }

    /// The highest-severity level matching the text, used by the ingester to
    /// pick the worst quarter of a game's weather.
    pub fn worst_match(&self, text: &str) -> Option<u8> {
        let text = text.to_lowercase();
        self.levels
            .iter()
            .rev()
            .find(|(_, descriptors)| descriptors.iter().any(|d| text.contains(d.as_str())))
            .map(|(level, _)| *level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_substring_case_insensitively() {
        let table = SeverityTable::default();
        assert_eq!(table.classify(Some("Heavy Thunderstorms")), Some(3));
        assert_eq!(table.classify(Some("partly cloudy")), Some(2));
        assert_eq!(table.classify(Some("light snow flurries")), Some(4));
    }

    #[test]
    fn null_or_unmatched_text_is_none() {
        let table = SeverityTable::default();
        assert_eq!(table.classify(None), None);
        assert_eq!(table.classify(Some("windy")), None);
    }

    #[test]
    fn ascending_level_is_inspected_first() {
        let table = SeverityTable::from_levels([(1, &["clear"][..]), (2, &["rain"][..])]);
        assert_eq!(table.classify(Some("light rain after clear skies")), Some(1));
    }

    #[test]
    fn worst_match_picks_the_highest_level() {
        let table = SeverityTable::default();
        assert_eq!(table.worst_match("clear then rain"), Some(3));
        assert_eq!(table.worst_match("breezy"), None);
    }

    #[test]
    fn persisted_rows_build_the_same_table() {
        let table = SeverityTable::from_rows([
            ("clear".to_string(), 1),
            ("rain".to_string(), 3),
            ("sun".to_string(), 1),
        ]);
        assert_eq!(table.classify(Some("sunny")), Some(1));
        assert_eq!(table.classify(Some("rain")), Some(3));
    }
}
