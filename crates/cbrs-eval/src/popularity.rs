//! Popularity utilities
//!
//! Building blocks shared by the group metrics: ranking of popular items,
//! per-user popularity ratios, average popularity of user profiles, GAP and
//! Delta-GAP, and splitting users into popularity-focused groups.

use std::collections::{BTreeSet, HashMap, HashSet};

use cbrs_core::{validate_group_specs, GroupSpec, ItemPopularity, RatingFrame, UserGroups};
use serde::Serialize;

use crate::{EvalError, MetricFrame, Result};

/// Share of a user's items that belong to the popular set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPopRatio {
    #[serde(rename = "from_id")]
    pub user_id: String,
    pub popularity_ratio: f64,
}

/// The most popular items of a frame, best first.
///
/// Returns the top `ceil(distinct_items * pop_percentage)` items by number
/// of occurrences.
pub fn popular_items(frame: &RatingFrame, pop_percentage: f64) -> Result<Vec<String>> {
    if !(pop_percentage > 0.0 && pop_percentage <= 1.0) {
        return Err(EvalError::InvalidArgument(format!(
            "pop_percentage must be in (0, 1], got {pop_percentage}"
        )));
    }

    let popularity = ItemPopularity::from_frame(frame);
    let top_n = (popularity.len() as f64 * pop_percentage).ceil() as usize;

    Ok(popularity
        .most_common_n(top_n)
        .into_iter()
        .map(|(item, _)| item.to_string())
        .collect())
}

/// Fraction of each user's rows whose item is in `most_pop_items`
pub fn pop_ratio_by_user(
    frame: &RatingFrame,
    most_pop_items: &[String],
) -> MetricFrame<UserPopRatio> {
    let popular: HashSet<&str> = most_pop_items.iter().map(String::as_str).collect();

    let rows = frame
        .group_by_user()
        .into_iter()
        .map(|(user, records)| {
            let popular_count = records
                .iter()
                .filter(|r| popular.contains(r.item_id.as_str()))
                .count();
            UserPopRatio {
                user_id: user.to_string(),
                popularity_ratio: popular_count as f64 / records.len() as f64,
            }
        })
        .collect();

    MetricFrame::from_rows(rows)
}

/// Average popularity of each user's items.
///
/// Items missing from `popularity` count as 0. When `group` is given, only
/// its members are computed.
pub fn avg_pop_by_users(
    frame: &RatingFrame,
    popularity: &ItemPopularity,
    group: Option<&BTreeSet<String>>,
) -> HashMap<String, f64> {
    frame
        .group_by_user()
        .into_iter()
        .filter(|(user, _)| group.map_or(true, |g| g.contains(*user)))
        .map(|(user, records)| {
            let total: usize = records.iter().map(|r| popularity.get(&r.item_id)).sum();
            (user.to_string(), total as f64 / records.len() as f64)
        })
        .collect()
}

/// Group Average Popularity: mean of the average popularity of the group
/// members that appear in `avg_pop_by_users`.
pub fn calculate_gap(group: &BTreeSet<String>, avg_pop_by_users: &HashMap<String, f64>) -> Result<f64> {
    let values: Vec<f64> = group
        .iter()
        .filter_map(|user| avg_pop_by_users.get(user).copied())
        .collect();

    if values.is_empty() {
        return Err(EvalError::ZeroDenominator {
            metric: "gap",
            detail: format!("none of the {} group members has a popularity value", group.len()),
        });
    }

    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Relative change of the recommendations' GAP with respect to the profiles' GAP
pub fn calculate_delta_gap(recs_gap: f64, profile_gap: f64) -> Result<f64> {
    if profile_gap == 0.0 {
        return Err(EvalError::ZeroDenominator {
            metric: "delta-gap",
            detail: "profile GAP is zero".to_string(),
        });
    }
    Ok((recs_gap - profile_gap) / profile_gap)
}

/// Profile popularity ratios of the group members, in table order
pub fn profile_pop_ratios(
    group: &BTreeSet<String>,
    pop_ratio_by_users: &MetricFrame<UserPopRatio>,
) -> Vec<f64> {
    pop_ratio_by_users
        .iter()
        .filter(|row| group.contains(&row.user_id))
        .map(|row| row.popularity_ratio)
        .collect()
}

/// Popularity ratios of the recommendation lists of the group members
pub fn recs_pop_ratios(
    group: &BTreeSet<String>,
    recs: &RatingFrame,
    most_pop_items: &[String],
) -> Vec<f64> {
    pop_ratio_by_user(&recs.select_users(group), most_pop_items)
        .into_rows()
        .into_iter()
        .map(|row| row.popularity_ratio)
        .collect()
}

/// Split the users of `frame` into consecutive groups by descending
/// popularity ratio.
///
/// Group boundaries sit at `round(n_users * cumulative_fraction)`; when the
/// fractions add up to 1 the last group takes whatever is left so that every
/// user is assigned.
pub fn split_user_in_groups(
    frame: &RatingFrame,
    groups: &[GroupSpec],
    pop_items: &[String],
) -> Result<UserGroups> {
    validate_group_specs(groups)?;

    let mut ratios = pop_ratio_by_user(frame, pop_items).into_rows();
    let num_users = ratios.len();
    if num_users < groups.len() {
        return Err(EvalError::InvalidArgument(format!(
            "cannot split {num_users} users into {} groups",
            groups.len()
        )));
    }

    // Stable: users with equal ratios keep their first-appearance order
    ratios.sort_by(|a, b| b.popularity_ratio.total_cmp(&a.popularity_ratio));

    let covers_all = (groups.iter().map(|g| g.fraction).sum::<f64>() - 1.0).abs() < 1e-9;
    let mut users_groups = UserGroups::new();
    let mut start = 0;
    let mut cumulative = 0.0;

    for (i, spec) in groups.iter().enumerate() {
        cumulative += spec.fraction;
        let end = if covers_all && i == groups.len() - 1 {
            num_users
        } else {
            ((num_users as f64 * cumulative).round() as usize).clamp(start, num_users)
        };

        if end == start {
            return Err(EvalError::InvalidArgument(format!(
                "group '{}' would be empty with {num_users} users",
                spec.name
            )));
        }

        users_groups.insert(
            spec.name.clone(),
            ratios[start..end].iter().map(|r| r.user_id.clone()),
        );
        tracing::debug!("Group '{}' gets {} users", spec.name, end - start);
        start = end;
    }

    Ok(users_groups)
}
