//! Aggregation strategies for rolling-window statistics
//!
//! Each strategy reduces the per-game value sequences produced by the
//! statistic filters to the scalar(s) written into a feature row. Sequences
//! arrive most-recent-game-first (the store's previous-games ordering), so
//! for the discounted sum index 0 carries weight 1 and older games decay
//! geometrically.

use crate::{NflError, Result};

/// How a feature's value sequences are reduced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    /// Arithmetic mean, one home and one away column per feature
    Average,
    /// `mean(away) - mean(home)`: a single signed column per feature.
    /// Negative values favor the home side.
    CompositeAverage,
    /// `Σ v[i] * factor^i` with the most recent game at index 0.
    /// A factor of 1.0 reduces to a plain sum.
    DiscountedSum { factor: f64 },
}

impl Aggregation {
    /// Resolve the configured method name. Unknown names and out-of-range
    /// discount factors are configuration errors, raised before any row is
    /// processed.
    pub fn from_config(name: &str, discount_factor: f64) -> Result<Self> {
        match name {
            "avg" => Ok(Aggregation::Average),
            "composite_avg" => Ok(Aggregation::CompositeAverage),
            "discounted_sum" => {
                if discount_factor <= 0.0 || discount_factor > 1.0 {
                    return Err(NflError::Config(format!(
                        "Discount factor must be in (0, 1], got {}",
                        discount_factor
                    )));
                }
                Ok(Aggregation::DiscountedSum {
                    factor: discount_factor,
                })
            }
            other => Err(NflError::Config(format!(
                "Unknown aggregation method: {} (expected avg, composite_avg or discounted_sum)",
                other
            ))),
        }
    }

    /// Composite aggregation produces one column per feature instead of a
    /// home/away pair.
    pub fn is_composite(&self) -> bool {
        matches!(self, Aggregation::CompositeAverage)
    }

    /// Reduce a home and an away sequence to this strategy's output values,
    /// in column order.
    pub fn apply(&self, feature: &str, home: &[f64], away: &[f64]) -> Result<Vec<f64>> {
        match self {
            Aggregation::Average => Ok(vec![
                average(feature, home)?,
                average(feature, away)?,
            ]),
            Aggregation::CompositeAverage => {
                Ok(vec![average(feature, away)? - average(feature, home)?])
            }
            Aggregation::DiscountedSum { factor } => Ok(vec![
                discounted_sum(home, *factor),
                discounted_sum(away, *factor),
            ]),
        }
    }
}

/// Arithmetic mean. Empty input is an error: the boxscore filter's sentinel
/// guarantees non-empty sequences on that path, and the team-game path
/// resolves emptiness via the assembler's policy before reaching here.
pub fn average(feature: &str, values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(NflError::EmptySequence(feature.to_string()));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Geometrically discounted sum over the sequence in input order
pub fn discounted_sum(values: &[f64], factor: f64) -> f64 {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| v * factor.powi(i as i32))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_the_arithmetic_mean() {
        assert_eq!(average("score", &[10.0, 20.0, 30.0]).unwrap(), 20.0);
    }

    #[test]
    fn average_of_singleton_is_identity() {
        assert_eq!(average("score", &[7.0]).unwrap(), 7.0);
    }

    #[test]
    fn average_of_empty_sequence_errors() {
        let err = average("score", &[]).unwrap_err();
        assert!(matches!(err, NflError::EmptySequence(_)));
    }

    #[test]
    fn composite_is_antisymmetric() {
        let a = [10.0, 14.0];
        let b = [3.0, 21.0, 6.0];
        let ab = Aggregation::CompositeAverage.apply("score", &a, &b).unwrap()[0];
        let ba = Aggregation::CompositeAverage.apply("score", &b, &a).unwrap()[0];
        assert_eq!(ab, -ba);
    }

    #[test]
    fn composite_of_singletons_is_their_difference() {
        let out = Aggregation::CompositeAverage
            .apply("score", &[10.0], &[17.0])
            .unwrap();
        assert_eq!(out, vec![7.0]);
    }

    #[test]
    fn discounted_sum_with_unit_factor_is_plain_sum() {
        let v = [3.0, 5.0, 8.0, 13.0];
        assert_eq!(discounted_sum(&v, 1.0), v.iter().sum::<f64>());
    }

    #[test]
    fn discounted_sum_of_singleton_is_identity() {
        assert_eq!(discounted_sum(&[42.0], 0.5), 42.0);
    }

    #[test]
    fn discount_weights_are_non_increasing() {
        let factor: f64 = 0.8;
        let weights: Vec<f64> = (0..6).map(|i| factor.powi(i)).collect();
        for pair in weights.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }

    #[test]
    fn discounted_sum_weights_index_zero_most() {
        // index 0 is the most recent game: 10*1 + 20*0.5 = 20
        assert_eq!(discounted_sum(&[10.0, 20.0], 0.5), 20.0);
    }

    #[test]
    fn unknown_method_name_is_a_config_error() {
        assert!(matches!(
            Aggregation::from_config("median", 0.9),
            Err(NflError::Config(_))
        ));
    }

    #[test]
    fn out_of_range_discount_factor_is_a_config_error() {
        assert!(Aggregation::from_config("discounted_sum", 0.0).is_err());
        assert!(Aggregation::from_config("discounted_sum", 1.5).is_err());
        assert!(Aggregation::from_config("discounted_sum", 1.0).is_ok());
    }
}
