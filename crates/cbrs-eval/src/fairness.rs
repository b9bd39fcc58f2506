//! Fairness metrics
//!
//! Gini index per user, Delta-GAP and popularity ratios per user group,
//! and catalog coverage.

use std::collections::BTreeSet;

use cbrs_core::{ItemPopularity, RatingFrame, UserGroups};
use serde::Serialize;

use crate::popularity::{
    avg_pop_by_users, calculate_delta_gap, calculate_gap, profile_pop_ratios, recs_pop_ratios,
    UserPopRatio,
};
use crate::{EvalError, MetricFrame, Result};

/// Offset added to every value so the Gini coefficient is defined for all-zero ratings
pub const GINI_EPSILON: f64 = 1e-7;

// ============================================================================
// Gini Index
// ============================================================================

/// Gini index of one user's ratings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GiniRow {
    #[serde(rename = "from")]
    pub user_id: String,
    #[serde(rename = "gini-index")]
    pub gini_index: f64,
}

/// Gini coefficient of a sequence of values.
///
/// If any value is negative the whole sequence is shifted by +1, then
/// `epsilon` is added to every value. With `x` sorted ascending and `i`
/// 1-based: `G = sum((2i - n - 1) * x_i) / (n * sum(x_i))`.
/// An empty or all-zero sequence yields 0.
pub fn gini(values: &[f64], epsilon: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let shift = if values.iter().any(|v| *v < 0.0) { 1.0 } else { 0.0 };
    let mut sorted: Vec<f64> = values.iter().map(|v| v + shift + epsilon).collect();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len() as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (2.0 * (i as f64 + 1.0) - n - 1.0) * x)
        .sum();
    let total: f64 = sorted.iter().sum();
    if total == 0.0 {
        return 0.0;
    }

    weighted / (n * total)
}

/// Gini index of each user's ratings, users in first-appearance order
pub fn gini_index(frame: &RatingFrame) -> MetricFrame<GiniRow> {
    gini_index_with_epsilon(frame, GINI_EPSILON)
}

/// Same as [`gini_index`] with a custom epsilon
pub fn gini_index_with_epsilon(frame: &RatingFrame, epsilon: f64) -> MetricFrame<GiniRow> {
    let rows: Vec<GiniRow> = frame
        .group_by_user()
        .into_iter()
        .map(|(user, records)| {
            let ratings: Vec<f64> = records.iter().map(|r| r.rating).collect();
            GiniRow {
                user_id: user.to_string(),
                gini_index: gini(&ratings, epsilon),
            }
        })
        .collect();

    tracing::debug!("Computed Gini index for {} users", rows.len());
    MetricFrame::from_rows(rows)
}

// ============================================================================
// Delta-GAP
// ============================================================================

/// Delta-GAP of one user group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaGapRow {
    pub user_group: String,
    #[serde(rename = "delta-gap")]
    pub delta_gap: f64,
}

/// Delta-GAP of each user group, failing on the first degenerate group.
///
/// Item popularity is counted on the recommendations and used to compute
/// the average popularity of both profiles and recommendation lists. The
/// recommendation-side GAP only considers group members that appear in
/// `truth_frame`.
pub fn delta_gap(
    score_frame: &RatingFrame,
    truth_frame: &RatingFrame,
    users_groups: &UserGroups,
) -> Result<MetricFrame<DeltaGapRow>> {
    let rows = delta_gap_by_group(score_frame, truth_frame, users_groups)
        .into_iter()
        .map(|(_, row)| row)
        .collect::<Result<Vec<_>>>()?;
    Ok(MetricFrame::from_rows(rows))
}

/// Delta-GAP outcome of every user group, in group order.
///
/// A group whose GAP cannot be computed gets an error entry without
/// affecting the other groups.
pub fn delta_gap_by_group(
    score_frame: &RatingFrame,
    truth_frame: &RatingFrame,
    users_groups: &UserGroups,
) -> Vec<(String, Result<DeltaGapRow>)> {
    let pop_by_items = ItemPopularity::from_frame(score_frame);
    let avg_pop_by_users_profiles = avg_pop_by_users(truth_frame, &pop_by_items, None);
    let recs_avg_pop_by_users = avg_pop_by_users(score_frame, &pop_by_items, None);

    let recommended_users = truth_frame.user_set();

    users_groups
        .iter()
        .map(|group| {
            let recommended: BTreeSet<String> = group
                .users
                .intersection(&recommended_users)
                .cloned()
                .collect();
            if recommended.len() < group.users.len() {
                tracing::warn!(
                    "Group '{}': {} of {} users have no ground-truth rows",
                    group.name,
                    group.users.len() - recommended.len(),
                    group.users.len()
                );
            }

            let row = calculate_gap(&recommended, &recs_avg_pop_by_users).and_then(|recs_gap| {
                let profile_gap = calculate_gap(&group.users, &avg_pop_by_users_profiles)?;
                let value = calculate_delta_gap(recs_gap, profile_gap)?;

                tracing::debug!(
                    "Group '{}': recs GAP {:.4}, profile GAP {:.4}, delta {:.4}",
                    group.name,
                    recs_gap,
                    profile_gap,
                    value
                );
                Ok(DeltaGapRow {
                    user_group: group.name.clone(),
                    delta_gap: value,
                })
            });

            (group.name.clone(), row)
        })
        .collect()
}

// ============================================================================
// Popularity Ratio: Profile vs Recommendations
// ============================================================================

/// Mean popularity ratios of one user group.
///
/// The per-user distributions are kept for box plots and are not part of
/// the serialized row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopRatioRow {
    pub user_group: String,
    pub profile_pop_ratio: f64,
    pub recs_pop_ratio: f64,
    #[serde(skip)]
    pub profile_ratios: Vec<f64>,
    #[serde(skip)]
    pub recs_ratios: Vec<f64>,
}

/// Share of popular items in profiles and in recommendations, per group
pub fn pop_ratio_profile_vs_recs(
    user_groups: &UserGroups,
    recs_frame: &RatingFrame,
    most_popular_items: &[String],
    pop_ratio_by_users: &MetricFrame<UserPopRatio>,
) -> Result<MetricFrame<PopRatioRow>> {
    let rows = pop_ratio_by_group(
        user_groups,
        recs_frame,
        most_popular_items,
        pop_ratio_by_users,
    )
    .into_iter()
    .map(|(_, row)| row)
    .collect::<Result<Vec<_>>>()?;
    Ok(MetricFrame::from_rows(rows))
}

/// Popularity-ratio outcome of every user group, in group order
pub fn pop_ratio_by_group(
    user_groups: &UserGroups,
    recs_frame: &RatingFrame,
    most_popular_items: &[String],
    pop_ratio_by_users: &MetricFrame<UserPopRatio>,
) -> Vec<(String, Result<PopRatioRow>)> {
    user_groups
        .iter()
        .map(|group| {
            let profile_ratios = profile_pop_ratios(&group.users, pop_ratio_by_users);
            let recs_ratios = recs_pop_ratios(&group.users, recs_frame, most_popular_items);

            let row = mean(&profile_ratios, "profile_pop_ratio", &group.name).and_then(
                |profile_pop_ratio| {
                    Ok(PopRatioRow {
                        user_group: group.name.clone(),
                        profile_pop_ratio,
                        recs_pop_ratio: mean(&recs_ratios, "recs_pop_ratio", &group.name)?,
                        profile_ratios,
                        recs_ratios,
                    })
                },
            );

            (group.name.clone(), row)
        })
        .collect()
}

fn mean(values: &[f64], metric: &'static str, group: &str) -> Result<f64> {
    if values.is_empty() {
        return Err(EvalError::ZeroDenominator {
            metric,
            detail: format!("group '{group}' has no users in the table"),
        });
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

// ============================================================================
// Catalog Coverage
// ============================================================================

/// Percentage of the items in `truth_frame` that appear in `score_frame`.
///
/// Computed as distinct recommended items over distinct truth items, so
/// recommended items outside the truth catalog still count.
pub fn catalog_coverage(score_frame: &RatingFrame, truth_frame: &RatingFrame) -> Result<f64> {
    let items = truth_frame.item_set();
    let covered_items = score_frame.item_set();

    if items.is_empty() {
        return Err(EvalError::ZeroDenominator {
            metric: "catalog-coverage",
            detail: "truth frame has no items".to_string(),
        });
    }

    let coverage = covered_items.len() as f64 / items.len() as f64 * 100.0;
    tracing::info!("Covered items: {} ({}%)", covered_items.len(), coverage);
    Ok(coverage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gini_single_value_is_zero() {
        assert_eq!(gini(&[4.0], GINI_EPSILON), 0.0);
    }

    #[test]
    fn test_gini_maximal_inequality() {
        // one non-zero value among n: G = (n - 1) / n without epsilon
        let g = gini(&[0.0, 0.0, 0.0, 10.0], 0.0);
        assert!((g - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_gini_negative_values_are_shifted() {
        // [-1, 0, 1] -> [0, 1, 2]
        let shifted = gini(&[-1.0, 0.0, 1.0], 0.0);
        let expected = gini(&[0.0, 1.0, 2.0], 0.0);
        assert!((shifted - expected).abs() < 1e-12);
    }

    #[test]
    fn test_gini_is_order_independent() {
        let a = gini(&[5.0, 1.0, 3.0], GINI_EPSILON);
        let b = gini(&[1.0, 3.0, 5.0], GINI_EPSILON);
        assert_eq!(a, b);
    }

    #[test]
    fn test_gini_index_rows() {
        let frame = RatingFrame::from_triples([
            ("u2", "i1", 3.0),
            ("u1", "i1", 1.0),
            ("u2", "i2", 3.0),
        ]);
        let result = gini_index(&frame);

        assert_eq!(result.len(), 2);
        assert_eq!(result.rows()[0].user_id, "u2");
        assert!(result.rows()[0].gini_index.abs() < 1e-9);
        assert_eq!(result.rows()[1].gini_index, 0.0);
    }

    #[test]
    fn test_coverage_counts_distinct_items() {
        let truth = RatingFrame::from_triples([("u1", "A", 1.0), ("u1", "B", 1.0)]);
        let score = RatingFrame::from_triples([("u1", "A", 0.5), ("u2", "A", 0.4)]);
        assert_eq!(catalog_coverage(&score, &truth).unwrap(), 50.0);
    }

    #[test]
    fn test_coverage_empty_truth() {
        let score = RatingFrame::from_triples([("u1", "A", 0.5)]);
        assert!(matches!(
            catalog_coverage(&score, &RatingFrame::new()),
            Err(EvalError::ZeroDenominator { .. })
        ));
    }

    #[test]
    fn test_gini_all_zero_without_epsilon() {
        assert_eq!(gini(&[0.0, 0.0, 0.0], 0.0), 0.0);
    }

    #[test]
    fn test_pop_ratio_group_means() {
        let popular = vec!["a".to_string(), "b".to_string()];
        let truth = RatingFrame::from_triples([
            ("u1", "a", 5.0),
            ("u1", "b", 4.0),
            ("u2", "a", 3.0),
            ("u2", "c", 2.0),
            ("u3", "c", 4.0),
            ("u3", "d", 1.0),
        ]);
        let recs = RatingFrame::from_triples([
            ("u1", "a", 0.9),
            ("u1", "z", 0.8),
            ("u2", "z", 0.7),
            ("u3", "a", 0.6),
            ("u3", "b", 0.5),
            ("u3", "c", 0.4),
            ("u3", "d", 0.3),
        ]);
        let groups = UserGroups::new()
            .with_group("mainstream", ["u1", "u2"])
            .with_group("niche", ["u3"]);
        let table = crate::popularity::pop_ratio_by_user(&truth, &popular);

        let result = pop_ratio_profile_vs_recs(&groups, &recs, &popular, &table).unwrap();
        let rows = result.rows();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_group, "mainstream");
        assert_eq!(rows[0].profile_ratios, vec![1.0, 0.5]);
        assert_eq!(rows[0].recs_ratios, vec![0.5, 0.0]);
        assert!((rows[0].profile_pop_ratio - 0.75).abs() < 1e-12);
        assert!((rows[0].recs_pop_ratio - 0.25).abs() < 1e-12);

        assert_eq!(rows[1].user_group, "niche");
        assert_eq!(rows[1].profile_ratios, vec![0.0]);
        assert_eq!(rows[1].recs_ratios, vec![0.5]);
        assert_eq!(rows[1].profile_pop_ratio, 0.0);
        assert!((rows[1].recs_pop_ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_delta_gap_by_group_isolates_failures() {
        let score = RatingFrame::from_triples([("u1", "a", 0.9), ("u2", "a", 0.8)]);
        let truth = RatingFrame::from_triples([("u1", "a", 4.0), ("u2", "a", 3.0)]);
        let groups = UserGroups::new()
            .with_group("absent", ["u9"])
            .with_group("present", ["u1", "u2"]);

        let outcomes = delta_gap_by_group(&score, &truth, &groups);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, "absent");
        assert!(matches!(
            outcomes[0].1,
            Err(EvalError::ZeroDenominator { metric: "gap", .. })
        ));
        let present = outcomes[1].1.as_ref().unwrap();
        assert_eq!(present.delta_gap, 0.0);

        assert!(delta_gap(&score, &truth, &groups).is_err());
    }

    #[test]
    fn test_pop_ratio_rejects_group_without_users() {
        let groups = UserGroups::new().with_group("ghosts", ["nobody"]);
        let recs = RatingFrame::from_triples([("u1", "a", 1.0)]);
        let table = MetricFrame::from_rows(vec![UserPopRatio {
            user_id: "u1".to_string(),
            popularity_ratio: 1.0,
        }]);

        let err = pop_ratio_profile_vs_recs(&groups, &recs, &["a".to_string()], &table)
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::ZeroDenominator {
                metric: "profile_pop_ratio",
                ..
            }
        ));
    }
}
