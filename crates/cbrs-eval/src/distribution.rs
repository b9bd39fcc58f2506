//! Recommendation frequency distributions
//!
//! Popularity vs recommendation frequency (scatter) and the long-tail
//! distribution of recommendations (line). The numeric sequences are
//! computed separately from the charts so they can be inspected directly.

use std::path::PathBuf;

use cbrs_core::{ItemPopularity, RatingFrame};

use crate::plot::{Chart, SvgSink};
use crate::Result;

/// Subdirectory of the plot root for popularity/recommendation charts
pub const POP_RECS_DIR: &str = "pop-recs";

/// Subdirectory of the plot root for long-tail charts
pub const LONG_TAIL_DIR: &str = "recs-long-tail-distr";

/// Per-item popularity and recommendation frequency, by descending popularity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopRecsCorrelation {
    /// Occurrences of each item in the ratings
    pub popularities: Vec<usize>,
    /// Occurrences of the same items in the recommendations
    pub recommendations: Vec<usize>,
    /// `popularities` restricted to recommended items
    pub popularities_no_zeros: Vec<usize>,
    /// `recommendations` restricted to recommended items
    pub recommendations_no_zeros: Vec<usize>,
    /// Whether at least one rated item was never recommended
    pub has_zeros: bool,
}

/// Pair the popularity of every rated item with how often it is recommended
pub fn pop_recs_correlation(recs: &RatingFrame, ratings: &RatingFrame) -> PopRecsCorrelation {
    let pop_by_items = ItemPopularity::from_frame(ratings);
    let recs_by_item = ItemPopularity::from_frame(recs);

    let mut corr = PopRecsCorrelation::default();
    for (item, pop) in pop_by_items.most_common() {
        let num_of_recs = recs_by_item.get(item);

        corr.popularities.push(pop);
        corr.recommendations.push(num_of_recs);

        if num_of_recs != 0 {
            corr.popularities_no_zeros.push(pop);
            corr.recommendations_no_zeros.push(num_of_recs);
        } else {
            corr.has_zeros = true;
        }
    }

    corr
}

/// Write the popularity/recommendation scatter plots under `{root}/pop-recs/`.
///
/// A second chart `{name}-no-zeros` is written when some rated items were
/// never recommended. `plot_file_name` defaults to the algorithm name.
pub fn render_pop_recs_correlation(
    corr: &PopRecsCorrelation,
    algorithm_name: &str,
    plot_file_name: Option<&str>,
    sink: &SvgSink,
) -> Result<Vec<PathBuf>> {
    let name = plot_file_name.unwrap_or(algorithm_name);
    let sink = sink.join(POP_RECS_DIR);

    let scatter = |pops: &[usize], recs: &[usize]| {
        Chart::scatter(
            algorithm_name,
            "Popularity",
            "Recommendation frequency",
            pops.iter()
                .zip(recs)
                .map(|(p, r)| (*p as f64, *r as f64))
                .collect(),
        )
    };

    let mut written = vec![sink.save(&scatter(&corr.popularities, &corr.recommendations), name)?];

    if corr.has_zeros {
        written.push(sink.save(
            &scatter(&corr.popularities_no_zeros, &corr.recommendations_no_zeros),
            &format!("{name}-no-zeros"),
        )?);
    }

    Ok(written)
}

/// Number of recommendations per item, most recommended first
pub fn recs_long_tail_distr(recs: &RatingFrame) -> Vec<usize> {
    ItemPopularity::from_frame(recs)
        .most_common()
        .into_iter()
        .map(|(_, count)| count)
        .collect()
}

/// Write the long-tail line plot to `{root}/recs-long-tail-distr/{name}.svg`.
///
/// `plot_file_name` defaults to the algorithm name.
pub fn render_recs_long_tail_distr(
    ordered_counts: &[usize],
    algorithm_name: &str,
    plot_file_name: Option<&str>,
    sink: &SvgSink,
) -> Result<PathBuf> {
    let name = plot_file_name.unwrap_or(algorithm_name);
    let values: Vec<f64> = ordered_counts.iter().map(|c| *c as f64).collect();

    let chart = Chart::line(
        algorithm_name,
        "Recommended items",
        "Num of recommendations",
        &values,
    );
    sink.join(LONG_TAIL_DIR).save(&chart, name)
}
