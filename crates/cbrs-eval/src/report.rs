//! Full fairness evaluation
//!
//! Runs every metric over one (recommendations, ground truth) pair and
//! collects the results in a `FairnessReport`.

use cbrs_core::{EvalConfig, GroupSpec, RatingFrame, UserGroups};
use serde::Serialize;

use crate::distribution::recs_long_tail_distr;
use crate::fairness::{
    catalog_coverage, delta_gap_by_group, gini_index_with_epsilon, pop_ratio_by_group,
    DeltaGapRow, GiniRow, PopRatioRow,
};
use crate::popularity::{pop_ratio_by_user, popular_items, split_user_in_groups};
use crate::{EvalError, MetricFrame, Result};

/// A group left out of one metric because its value is undefined
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedGroup {
    pub user_group: String,
    pub metric: &'static str,
    pub reason: String,
}

/// Results of a full evaluation
#[derive(Debug, Clone)]
pub struct FairnessReport {
    pub algorithm_name: String,
    pub gini: MetricFrame<GiniRow>,
    pub delta_gap: MetricFrame<DeltaGapRow>,
    pub pop_ratio: MetricFrame<PopRatioRow>,
    pub catalog_coverage: f64,
    pub long_tail: Vec<usize>,
    pub user_groups: UserGroups,
    pub popular_items: Vec<String>,
    /// Groups without a Delta-GAP or popularity-ratio row
    pub skipped_groups: Vec<SkippedGroup>,
}

impl FairnessReport {
    /// Mean Gini index over users (0 when there are none)
    pub fn mean_gini(&self) -> f64 {
        if self.gini.is_empty() {
            return 0.0;
        }
        self.gini.iter().map(|r| r.gini_index).sum::<f64>() / self.gini.len() as f64
    }

    /// Human-readable summary
    pub fn report(&self) -> String {
        let mut out = format!(
            "=== Fairness Report: {} ===\n\n\
             Users evaluated:   {}\n\
             Popular items:     {}\n\
             Mean Gini index:   {:.4}\n\
             Catalog coverage:  {:.1}%\n\
             Recommended items: {}\n\n",
            self.algorithm_name,
            self.gini.len(),
            self.popular_items.len(),
            self.mean_gini(),
            self.catalog_coverage,
            self.long_tail.len(),
        );

        out.push_str("Delta-GAP by group:\n");
        for row in &self.delta_gap {
            let size = self.user_groups.get(&row.user_group).map_or(0, |g| g.len());
            out.push_str(&format!(
                "  {:<12} {:>+9.4}  ({} users)\n",
                row.user_group, row.delta_gap, size
            ));
        }

        out.push_str("\nPopularity ratio (profile -> recs):\n");
        for row in &self.pop_ratio {
            out.push_str(&format!(
                "  {:<12} {:.3} -> {:.3}\n",
                row.user_group, row.profile_pop_ratio, row.recs_pop_ratio
            ));
        }

        if !self.skipped_groups.is_empty() {
            out.push_str("\nSkipped groups:\n");
            for skipped in &self.skipped_groups {
                out.push_str(&format!(
                    "  {:<12} {}: {}\n",
                    skipped.user_group, skipped.metric, skipped.reason
                ));
            }
        }

        out
    }
}

/// Runs the fairness metric suite
pub struct FairnessEvaluator {
    /// Share of items considered popular
    pop_percentage: f64,
    /// Gini epsilon
    epsilon: f64,
    /// Fixed user groups; when absent users are split by `group_specs`
    groups: Option<UserGroups>,
    /// Group fractions used to split users
    group_specs: Vec<GroupSpec>,
}

impl FairnessEvaluator {
    /// Create an evaluator with default settings
    pub fn new() -> Self {
        Self::from_config(&EvalConfig::default())
    }

    /// Create an evaluator from the metric configuration
    pub fn from_config(config: &EvalConfig) -> Self {
        Self {
            pop_percentage: config.pop_percentage,
            epsilon: config.gini_epsilon,
            groups: None,
            group_specs: config.user_groups.clone(),
        }
    }

    /// Set the share of popular items
    pub fn with_pop_percentage(mut self, pop_percentage: f64) -> Self {
        self.pop_percentage = pop_percentage;
        self
    }

    /// Set the Gini epsilon
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Use fixed user groups instead of splitting by popularity ratio
    pub fn with_groups(mut self, groups: UserGroups) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Set the group fractions used to split users
    pub fn with_group_specs(mut self, specs: Vec<GroupSpec>) -> Self {
        self.group_specs = specs;
        self
    }

    /// User groups used for the evaluation.
    ///
    /// Fixed groups are returned as-is. Otherwise the ground-truth users that
    /// received recommendations are split by profile popularity ratio.
    pub fn user_groups(
        &self,
        score_frame: &RatingFrame,
        truth_frame: &RatingFrame,
    ) -> Result<UserGroups> {
        let popular = popular_items(truth_frame, self.pop_percentage)?;
        self.resolve_groups(score_frame, truth_frame, &popular)
    }

    fn resolve_groups(
        &self,
        score_frame: &RatingFrame,
        truth_frame: &RatingFrame,
        popular: &[String],
    ) -> Result<UserGroups> {
        if let Some(groups) = &self.groups {
            return Ok(groups.clone());
        }

        let recommended = truth_frame.select_users(&score_frame.user_set());
        tracing::debug!(
            "Splitting {} of {} ground-truth users with recommendations",
            recommended.users().len(),
            truth_frame.users().len()
        );
        split_user_in_groups(&recommended, &self.group_specs, popular)
    }

    /// Evaluate recommendations against the ground truth.
    ///
    /// Groups whose Delta-GAP or popularity ratio is undefined are logged and
    /// listed in `skipped_groups`; the other metrics are still reported.
    pub fn evaluate(
        &self,
        algorithm_name: &str,
        score_frame: &RatingFrame,
        truth_frame: &RatingFrame,
    ) -> Result<FairnessReport> {
        tracing::info!(
            "Evaluating '{}': {} recommendations, {} ground-truth rows",
            algorithm_name,
            score_frame.len(),
            truth_frame.len()
        );

        let popular = popular_items(truth_frame, self.pop_percentage)?;
        let user_groups = self.resolve_groups(score_frame, truth_frame, &popular)?;
        let pop_ratio_by_users = pop_ratio_by_user(truth_frame, &popular);

        let mut skipped_groups = Vec::new();
        let delta_gap = keep_defined(
            "delta-gap",
            delta_gap_by_group(score_frame, truth_frame, &user_groups),
            &mut skipped_groups,
        )?;
        let pop_ratio = keep_defined(
            "pop-ratio",
            pop_ratio_by_group(&user_groups, score_frame, &popular, &pop_ratio_by_users),
            &mut skipped_groups,
        )?;

        Ok(FairnessReport {
            algorithm_name: algorithm_name.to_string(),
            gini: gini_index_with_epsilon(score_frame, self.epsilon),
            delta_gap,
            pop_ratio,
            catalog_coverage: catalog_coverage(score_frame, truth_frame)?,
            long_tail: recs_long_tail_distr(score_frame),
            user_groups,
            popular_items: popular,
            skipped_groups,
        })
    }
}

/// Collect the rows of the groups with a defined value; any other error aborts
fn keep_defined<R>(
    metric: &'static str,
    outcomes: Vec<(String, Result<R>)>,
    skipped: &mut Vec<SkippedGroup>,
) -> Result<MetricFrame<R>> {
    let mut rows = Vec::with_capacity(outcomes.len());
    for (user_group, outcome) in outcomes {
        match outcome {
            Ok(row) => rows.push(row),
            Err(EvalError::ZeroDenominator { detail, .. }) => {
                tracing::warn!("Skipping group '{}' for {}: {}", user_group, metric, detail);
                skipped.push(SkippedGroup {
                    user_group,
                    metric,
                    reason: detail,
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(MetricFrame::from_rows(rows))
}

impl Default for FairnessEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::GINI_EPSILON;

    fn truth() -> RatingFrame {
        RatingFrame::from_triples([
            ("u1", "a", 5.0),
            ("u1", "b", 4.0),
            ("u2", "a", 3.0),
            ("u2", "c", 2.0),
            ("u3", "d", 4.0),
            ("u3", "e", 1.0),
        ])
    }

    fn recs() -> RatingFrame {
        RatingFrame::from_triples([
            ("u1", "a", 0.9),
            ("u1", "c", 0.5),
            ("u2", "a", 0.8),
            ("u2", "b", 0.4),
            ("u3", "a", 0.7),
            ("u3", "d", 0.2),
        ])
    }

    #[test]
    fn test_evaluator_defaults() {
        let evaluator = FairnessEvaluator::new();
        assert!((evaluator.epsilon - GINI_EPSILON).abs() < f64::EPSILON);
        assert_eq!(evaluator.group_specs.len(), 3);
        assert!(evaluator.groups.is_none());
    }

    #[test]
    fn test_evaluate_with_fixed_groups() {
        let groups = UserGroups::new()
            .with_group("mainstream", ["u1", "u2"])
            .with_group("niche", ["u3"]);

        let report = FairnessEvaluator::new()
            .with_groups(groups)
            .evaluate("random", &recs(), &truth())
            .unwrap();

        assert_eq!(report.gini.len(), 3);
        assert_eq!(report.delta_gap.len(), 2);
        assert_eq!(report.pop_ratio.len(), 2);
        // truth has items a..e, recs cover a, b, c, d
        assert!((report.catalog_coverage - 80.0).abs() < 1e-9);
        assert_eq!(report.long_tail, vec![3, 1, 1, 1]);

        let text = report.report();
        assert!(text.contains("Fairness Report: random"));
        assert!(text.contains("mainstream"));
    }

    #[test]
    fn test_evaluate_splits_users_when_no_groups_given() {
        let report = FairnessEvaluator::new()
            .with_group_specs(vec![GroupSpec::new("high", 0.5), GroupSpec::new("low", 0.5)])
            .evaluate("random", &recs(), &truth())
            .unwrap();

        assert_eq!(report.user_groups.names(), vec!["high", "low"]);
        let total: usize = report.user_groups.iter().map(|g| g.users.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_evaluate_ignores_truth_users_without_recommendations() {
        // u4 and u5 are rated but never recommended
        let truth = RatingFrame::from_triples([
            ("u1", "a", 5.0),
            ("u1", "b", 4.0),
            ("u2", "a", 3.0),
            ("u2", "c", 2.0),
            ("u3", "d", 4.0),
            ("u3", "e", 1.0),
            ("u4", "a", 2.0),
            ("u5", "b", 3.0),
        ]);

        let report = FairnessEvaluator::new()
            .evaluate("algo", &recs(), &truth)
            .unwrap();

        assert_eq!(report.popular_items, vec!["a"]);
        assert_eq!(report.user_groups.get("bb_focused").map(|g| g.len()), Some(1));
        assert!(report.user_groups.get("bb_focused").unwrap().contains("u1"));
        assert!(report.user_groups.get("diverse").unwrap().contains("u2"));
        assert!(report.user_groups.get("niche").unwrap().contains("u3"));
        assert!(report.skipped_groups.is_empty());

        // recs popularity a=3, b=c=d=1; u3's profile average is (1 + 0) / 2
        let deltas: Vec<f64> = report.delta_gap.iter().map(|r| r.delta_gap).collect();
        assert_eq!(deltas.len(), 3);
        assert!(deltas[0].abs() < 1e-12);
        assert!(deltas[1].abs() < 1e-12);
        assert!((deltas[2] - 3.0).abs() < 1e-12);

        let recs_ratios: Vec<f64> = report.pop_ratio.iter().map(|r| r.recs_pop_ratio).collect();
        assert_eq!(recs_ratios, vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_evaluate_skips_degenerate_groups() {
        let groups = UserGroups::new()
            .with_group("ghosts", ["u9"])
            .with_group("everyone", ["u1", "u2", "u3"]);

        let report = FairnessEvaluator::new()
            .with_groups(groups)
            .evaluate("random", &recs(), &truth())
            .unwrap();

        assert_eq!(report.delta_gap.len(), 1);
        assert_eq!(report.delta_gap.rows()[0].user_group, "everyone");
        assert_eq!(report.pop_ratio.len(), 1);

        let skipped: Vec<(&str, &str)> = report
            .skipped_groups
            .iter()
            .map(|s| (s.user_group.as_str(), s.metric))
            .collect();
        assert_eq!(skipped, vec![("ghosts", "delta-gap"), ("ghosts", "pop-ratio")]);
        assert!(report.report().contains("Skipped groups"));
        // the remaining metrics are still computed
        assert_eq!(report.gini.len(), 3);
        assert!((report.catalog_coverage - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_gini_empty() {
        let report = FairnessReport {
            algorithm_name: "none".to_string(),
            gini: MetricFrame::default(),
            delta_gap: MetricFrame::default(),
            pop_ratio: MetricFrame::default(),
            catalog_coverage: 0.0,
            long_tail: Vec::new(),
            user_groups: UserGroups::new(),
            popular_items: Vec::new(),
            skipped_groups: Vec::new(),
        };
        assert_eq!(report.mean_gini(), 0.0);
    }
}
