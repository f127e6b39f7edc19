use crate::{
    config::TagBoostParams,
    document::fields,
    query::{FieldValueFactor, FunctionScoreQuery, Query},
};

/// Builds the score-only boosts applied inside each tag clause.
///
/// Restaurants whose matched tag has a higher average confidence or is used
/// more often rank higher. The boosts are optional clauses, so they never
/// decide whether a restaurant matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreComposer {
    params: TagBoostParams,
}

impl ScoreComposer {
    pub const fn new(params: TagBoostParams) -> Self {
        Self { params }
    }

    /// `ln(1.5 * avgConfidence)` with 0.1 for tags without a confidence, by default.
    pub fn confidence_boost(&self) -> FieldValueFactor {
        FieldValueFactor {
            field: fields::TAG_AVG_CONFIDENCE.to_string(),
            factor: self.params.confidence_factor,
            modifier: self.params.modifier,
            missing: Some(self.params.confidence_missing),
        }
    }

    /// `ln(1.2 * frequency)` with 1.0 for tags without a frequency, by default.
    pub fn frequency_boost(&self) -> FieldValueFactor {
        FieldValueFactor {
            field: fields::TAG_FREQUENCY.to_string(),
            factor: self.params.frequency_factor,
            modifier: self.params.modifier,
            missing: Some(self.params.frequency_missing),
        }
    }

    /// Both boosts as function-score clauses, ready to go into a `should`.
    pub fn boost_clauses(&self) -> [Query; 2] {
        [self.confidence_boost(), self.frequency_boost()].map(|fvf| {
            FunctionScoreQuery {
                query: None,
                functions: vec![fvf.into()],
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FieldValueModifier, ScoreFunction};

    #[test]
    fn test_default_boosts() {
        let composer = ScoreComposer::default();

        let confidence = composer.confidence_boost();
        assert_eq!(confidence.field, "tags.avgConfidence");
        assert_eq!(confidence.factor, 1.5);
        assert_eq!(confidence.modifier, FieldValueModifier::Ln);
        assert_eq!(confidence.missing, Some(0.1));

        let frequency = composer.frequency_boost();
        assert_eq!(frequency.field, "tags.frequency");
        assert_eq!(frequency.factor, 1.2);
        assert_eq!(frequency.missing, Some(1.0));
    }

    #[test]
    fn test_boosts_are_monotonic() {
        let composer = ScoreComposer::default();
        for boost in [composer.confidence_boost(), composer.frequency_boost()] {
            let values = [0.05, 0.1, 0.5, 0.9, 1.0, 3.0, 40.0];
            let scores: Vec<f64> = values
                .iter()
                .map(|v| boost.apply(Some(*v)).unwrap())
                .collect();
            assert!(scores.windows(2).all(|w| w[0] <= w[1]), "{scores:?}");
        }
    }

    #[test]
    fn test_missing_values_use_defaults() {
        let composer = ScoreComposer::default();
        let expected = (1.5_f64 * 0.1).ln();
        assert!((composer.confidence_boost().apply(None).unwrap() - expected).abs() < 1e-12);
        let expected = 1.2_f64.ln();
        assert!((composer.frequency_boost().apply(None).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_boost_clauses_wrap_one_function_each() {
        let clauses = ScoreComposer::default().boost_clauses();
        for clause in &clauses {
            let Query::FunctionScore(fs) = clause else {
                panic!("expected function score, got {clause:?}");
            };
            assert!(fs.query.is_none());
            assert_eq!(fs.functions.len(), 1);
            assert!(matches!(fs.functions[0], ScoreFunction::FieldValueFactor(_)));
        }
    }
}
