//! gtd-atlas: related-incident clustering and charting for the South Asian
//! subset of the Global Terrorism Database
//!
//! This library loads the incident table with Polars, groups incidents that
//! reference each other into event clusters, derives the group-by statistics
//! behind the dashboard and renders its charts with Plotters.

pub mod aggregate;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod viz;

// Re-export public items for easier access
pub use aggregate::{fatality_ratio, year_country_stats, YearCountryStats};
pub use cli::Args;
pub use cluster::{assign_clusters, cluster_incidents, ClusterAssignment, ClusterMode, EventKey};
pub use config::ReportConfig;
pub use data::{load_dataset, Dataset, Incident};
pub use error::DataError;
pub use filter::{Attribute, Criterion, Selection};
pub use viz::{generate_report, render_chart, ReportRequest};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
