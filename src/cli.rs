//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cluster::ClusterMode;
use crate::config::{ImageFormat, ReportConfig};
use crate::filter::{Attribute, Criterion};

/// Related-incident clustering and charts for terrorism incidents in South Asia
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the incident CSV file
    #[arg(short, long, global = true, default_value = "data/combined_data.csv")]
    pub input: PathBuf,

    /// JSON file overriding the report configuration
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the dataset overview, top groups, fatality table and cluster statistics
    Summary {
        /// Merge clusters that share any event id
        #[arg(long)]
        transitive: bool,
    },
    /// Print the related-event cluster table
    Clusters {
        /// Merge clusters that share any event id
        #[arg(long)]
        transitive: bool,

        /// Number of clusters to print
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Render every dashboard chart for a selection
    Report(ReportArgs),
}

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Directory receiving the chart files
    #[arg(short, long, default_value = "charts")]
    pub output_dir: PathBuf,

    /// Attribute shown in the frequency chart
    #[arg(short, long, value_enum, default_value = "target-type")]
    pub attribute: Attribute,

    /// Criterion splitting alternative attack types
    #[arg(long, value_enum, default_value = "personal-motive")]
    pub criterion: Criterion,

    /// Country for the map charts
    #[arg(long, default_value = "India")]
    pub country: String,

    /// Year for the map charts; defaults to the first year with related incidents
    #[arg(long)]
    pub year: Option<i32>,

    /// Merge clusters that share any event id
    #[arg(long)]
    pub transitive: bool,

    /// Plot one incident per related-event cluster
    #[arg(long)]
    pub dedupe: bool,

    /// Image format, overriding the config file
    #[arg(long, value_enum)]
    pub format: Option<ImageFormat>,
}

pub fn cluster_mode(transitive: bool) -> ClusterMode {
    if transitive {
        ClusterMode::Transitive
    } else {
        ClusterMode::Exact
    }
}

impl Args {
    /// Config file contents when `--config` is given, defaults otherwise,
    /// with command-line overrides applied last.
    pub fn load_config(&self) -> crate::Result<ReportConfig> {
        let mut config = match &self.config {
            Some(path) => ReportConfig::from_json_file(path)?,
            None => ReportConfig::default(),
        };
        if let Command::Report(report) = &self.command {
            if let Some(format) = report.format {
                config.image_format = format;
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_args() {
        let args = Args::try_parse_from([
            "gtd-atlas",
            "--input",
            "incidents.csv",
            "report",
            "--attribute",
            "alternative-attack-type",
            "--criterion",
            "illegitimate-warfare",
            "--country",
            "Sri Lanka",
            "--year",
            "2008",
            "--format",
            "svg",
            "--dedupe",
        ])
        .unwrap();

        assert_eq!(args.input, PathBuf::from("incidents.csv"));
        let Command::Report(report) = &args.command else {
            panic!("expected report command");
        };
        assert_eq!(report.attribute, Attribute::AlternativeAttackType);
        assert_eq!(report.criterion, Criterion::IllegitimateWarfare);
        assert_eq!(report.country, "Sri Lanka");
        assert_eq!(report.year, Some(2008));
        assert!(report.dedupe);
        assert!(!report.transitive);

        let config = args.load_config().unwrap();
        assert_eq!(config.image_format, ImageFormat::Svg);
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["gtd-atlas", "clusters", "--transitive"]).unwrap();
        assert_eq!(args.input, PathBuf::from("data/combined_data.csv"));
        assert!(!args.verbose);
        match args.command {
            Command::Clusters { transitive, limit } => {
                assert!(transitive);
                assert_eq!(limit, 20);
                assert_eq!(cluster_mode(transitive), ClusterMode::Transitive);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_attribute_rejected() {
        let result = Args::try_parse_from(["gtd-atlas", "report", "--attribute", "casualties"]);
        assert!(result.is_err());
    }
}
