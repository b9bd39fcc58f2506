//! Subcommand implementations

use std::path::{Path, PathBuf};

use anyhow::Context;
use cbrs_core::{AppConfig, RatingFrame, UserGroups};
use cbrs_eval::{
    catalog_coverage, delta_gap, gini_index_with_epsilon, pop_ratio_by_user,
    pop_ratio_profile_vs_recs, pop_recs_correlation, popular_items, recs_long_tail_distr,
    render_pop_recs_correlation, render_recs_long_tail_distr, FairnessEvaluator, FairnessReport,
    MetricFrame, SvgSink,
};
use cbrs_parser::{load_user_groups, ReaderRegistry};
use serde::Serialize;

use crate::output::{print_frame, CoverageOutput, ReportOutput};

/// Loaded configuration plus the readers built from it
pub struct Session {
    config: AppConfig,
    registry: ReaderRegistry,
}

impl Session {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: ReaderRegistry::default(),
        }
    }

    /// Read a rating table, dispatching on the file extension
    pub fn load_frame(&self, path: &Path) -> anyhow::Result<RatingFrame> {
        let frame = self
            .registry
            .read(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        tracing::info!("Loaded {} rows from {}", frame.len(), path.display());
        Ok(frame)
    }

    /// User groups from a JSON file, or split from the ground-truth users
    /// that received recommendations
    pub fn user_groups(
        &self,
        groups_path: Option<&Path>,
        score: &RatingFrame,
        truth: &RatingFrame,
    ) -> anyhow::Result<UserGroups> {
        if let Some(path) = groups_path {
            return load_user_groups(path)
                .with_context(|| format!("failed to load user groups from {}", path.display()));
        }

        let groups = self.evaluator().user_groups(score, truth)?;
        tracing::debug!("Split users into groups {:?}", groups.names());
        Ok(groups)
    }

    fn evaluator(&self) -> FairnessEvaluator {
        FairnessEvaluator::from_config(&self.config.eval)
    }

    fn sink(&self) -> SvgSink {
        SvgSink::from_config(&self.config.plot)
    }

    fn emit<R: Serialize>(
        &self,
        frame: &MetricFrame<R>,
        output: Option<&Path>,
        json: bool,
    ) -> anyhow::Result<()> {
        if let Some(path) = output {
            frame.save_csv(path)?;
        }
        print_frame(frame, json)
    }

    pub fn gini(&self, recs: &Path, output: Option<&Path>, json: bool) -> anyhow::Result<()> {
        let score = self.load_frame(recs)?;
        let result = gini_index_with_epsilon(&score, self.config.eval.gini_epsilon);
        self.emit(&result, output, json)
    }

    pub fn delta_gap(
        &self,
        recs: &Path,
        truth: &Path,
        groups: Option<&Path>,
        output: Option<&Path>,
        json: bool,
    ) -> anyhow::Result<()> {
        let score = self.load_frame(recs)?;
        let truth = self.load_frame(truth)?;
        let groups = self.user_groups(groups, &score, &truth)?;

        let result = delta_gap(&score, &truth, &groups)?;
        self.emit(&result, output, json)
    }

    pub fn pop_ratio(
        &self,
        recs: &Path,
        truth: &Path,
        groups: Option<&Path>,
        output: Option<&Path>,
        json: bool,
    ) -> anyhow::Result<()> {
        let score = self.load_frame(recs)?;
        let truth = self.load_frame(truth)?;
        let groups = self.user_groups(groups, &score, &truth)?;

        let popular = popular_items(&truth, self.config.eval.pop_percentage)?;
        let ratios = pop_ratio_by_user(&truth, &popular);
        let result = pop_ratio_profile_vs_recs(&groups, &score, &popular, &ratios)?;
        self.emit(&result, output, json)
    }

    pub fn pop_recs(
        &self,
        recs: &Path,
        truth: &Path,
        algorithm: &str,
        name: Option<&str>,
    ) -> anyhow::Result<Vec<PathBuf>> {
        let score = self.load_frame(recs)?;
        let truth = self.load_frame(truth)?;

        let corr = pop_recs_correlation(&score, &truth);
        let written = render_pop_recs_correlation(&corr, algorithm, name, &self.sink())?;
        for path in &written {
            println!("{}", path.display());
        }
        Ok(written)
    }

    pub fn long_tail(
        &self,
        recs: &Path,
        algorithm: &str,
        name: Option<&str>,
    ) -> anyhow::Result<PathBuf> {
        let score = self.load_frame(recs)?;

        let counts = recs_long_tail_distr(&score);
        let path = render_recs_long_tail_distr(&counts, algorithm, name, &self.sink())?;
        println!("{}", path.display());
        Ok(path)
    }

    pub fn coverage(&self, recs: &Path, truth: &Path, json: bool) -> anyhow::Result<f64> {
        let score = self.load_frame(recs)?;
        let truth = self.load_frame(truth)?;

        let coverage = catalog_coverage(&score, &truth)?;
        if json {
            let out = CoverageOutput {
                catalog_coverage: coverage,
                recommended_items: score.item_set().len(),
                catalog_items: truth.item_set().len(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            println!("Catalog coverage: {coverage:.2}%");
        }
        Ok(coverage)
    }

    pub fn report(
        &self,
        recs: &Path,
        truth: &Path,
        algorithm: &str,
        groups: Option<&Path>,
        plots: bool,
        json: bool,
    ) -> anyhow::Result<FairnessReport> {
        let score = self.load_frame(recs)?;
        let truth = self.load_frame(truth)?;

        let mut evaluator = self.evaluator();
        if let Some(path) = groups {
            evaluator = evaluator.with_groups(self.user_groups(Some(path), &score, &truth)?);
        }
        let report = evaluator.evaluate(algorithm, &score, &truth)?;

        if plots {
            let sink = self.sink();
            let corr = pop_recs_correlation(&score, &truth);
            render_pop_recs_correlation(&corr, algorithm, None, &sink)?;
            render_recs_long_tail_distr(&report.long_tail, algorithm, None, &sink)?;
            tracing::info!("Charts written under {}", sink.dir().display());
        }

        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&ReportOutput::new(&report))?
            );
        } else {
            print!("{}", report.report());
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbrs_core::PlotConfig;

    const TRUTH: &str = "from_id,to_id,score\n\
                         u1,a,5\nu1,b,4\nu2,a,3\nu2,c,2\nu3,d,4\nu3,e,1\n\
                         u4,a,2\nu5,b,3\n";
    const RECS: &str = "from_id,to_id,score\n\
                        u1,a,0.9\nu1,c,0.5\nu2,a,0.8\nu2,b,0.4\nu3,a,0.7\nu3,d,0.2\n";

    fn session(plot_dir: &Path) -> Session {
        let config = AppConfig {
            plot: PlotConfig {
                output_dir: plot_dir.to_path_buf(),
                ..PlotConfig::default()
            },
            ..AppConfig::default()
        };
        Session::new(config)
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_gini_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let recs = write(dir.path(), "recs.csv", RECS);
        let out = dir.path().join("out").join("gini.csv");

        session(dir.path()).gini(&recs, Some(&out), false).unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("from,gini-index\n"));
        assert_eq!(written.lines().count(), 4);
    }

    #[test]
    fn test_user_groups_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let groups = write(dir.path(), "groups.json", r#"{"all": ["u1", "u2", "u3"]}"#);

        let groups = session(dir.path())
            .user_groups(Some(&groups), &RatingFrame::new(), &RatingFrame::new())
            .unwrap();
        assert_eq!(groups.names(), vec!["all"]);
        assert_eq!(groups.get("all").map(|g| g.len()), Some(3));
    }

    #[test]
    fn test_user_groups_split_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let s = session(dir.path());
        let truth = s.load_frame(&write(dir.path(), "truth.csv", TRUTH)).unwrap();
        let recs = s.load_frame(&write(dir.path(), "recs.csv", RECS)).unwrap();

        // u4 and u5 have no recommendations and are left out of the split
        let groups = s.user_groups(None, &recs, &truth).unwrap();
        let total: usize = groups.iter().map(|g| g.users.len()).sum();
        assert_eq!(total, 3);
        assert_eq!(groups.names(), vec!["bb_focused", "diverse", "niche"]);
    }

    #[test]
    fn test_delta_gap_with_unrecommended_truth_users() {
        let dir = tempfile::tempdir().unwrap();
        let recs = write(dir.path(), "recs.csv", RECS);
        let truth = write(dir.path(), "truth.csv", TRUTH);
        let out = dir.path().join("delta-gap.csv");

        session(dir.path())
            .delta_gap(&recs, &truth, None, Some(&out), false)
            .unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "user_group,delta-gap");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "niche,3.0");
    }

    #[test]
    fn test_report_with_plots() {
        let dir = tempfile::tempdir().unwrap();
        let recs = write(dir.path(), "recs.csv", RECS);
        let truth = write(dir.path(), "truth.csv", TRUTH);

        let report = session(dir.path())
            .report(&recs, &truth, "random", None, true, true)
            .unwrap();

        assert_eq!(report.algorithm_name, "random");
        assert_eq!(report.gini.len(), 3);
        assert_eq!(report.delta_gap.len(), 3);
        assert_eq!(report.pop_ratio.len(), 3);
        assert!(report.skipped_groups.is_empty());
        assert!((report.catalog_coverage - 80.0).abs() < 1e-9);
        assert!(dir.path().join("pop-recs").join("random.svg").exists());
        assert!(dir
            .path()
            .join("recs-long-tail-distr")
            .join("random.svg")
            .exists());
    }

    #[test]
    fn test_report_with_groups_file() {
        let dir = tempfile::tempdir().unwrap();
        let recs = write(dir.path(), "recs.csv", RECS);
        let truth = write(dir.path(), "truth.csv", TRUTH);
        let groups = write(
            dir.path(),
            "groups.json",
            r#"{"unseen": ["u4", "u5"], "seen": ["u1", "u2", "u3"]}"#,
        );

        let report = session(dir.path())
            .report(&recs, &truth, "random", Some(&groups), false, false)
            .unwrap();

        assert_eq!(report.user_groups.names(), vec!["unseen", "seen"]);
        assert_eq!(report.delta_gap.len(), 1);
        assert_eq!(report.delta_gap.rows()[0].user_group, "seen");
        assert!(report
            .skipped_groups
            .iter()
            .any(|s| s.user_group == "unseen" && s.metric == "delta-gap"));
    }

    #[test]
    fn test_coverage() {
        let dir = tempfile::tempdir().unwrap();
        let recs = write(dir.path(), "recs.csv", RECS);
        let truth = write(dir.path(), "truth.csv", TRUTH);

        let coverage = session(dir.path()).coverage(&recs, &truth, true).unwrap();
        assert!((coverage - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_plots_land_under_plot_dir() {
        let dir = tempfile::tempdir().unwrap();
        let recs = write(dir.path(), "recs.csv", RECS);
        let truth = write(dir.path(), "truth.csv", TRUTH);
        let s = session(dir.path());

        let written = s.pop_recs(&recs, &truth, "random", None).unwrap();
        assert_eq!(written[0], dir.path().join("pop-recs").join("random.svg"));

        let tail = s.long_tail(&recs, "random", Some("tail")).unwrap();
        assert_eq!(tail, dir.path().join("recs-long-tail-distr").join("tail.svg"));
    }

    #[test]
    fn test_missing_input_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = session(dir.path())
            .load_frame(&dir.path().join("nope.csv"))
            .unwrap_err();
        assert!(err.to_string().contains("nope.csv"));
    }
}
