//! gtd-atlas: clustering, statistics and charts for South Asian terrorism incidents
//!
//! This is the main entrypoint that orchestrates data loading, clustering,
//! aggregation and chart rendering.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use gtd_atlas::aggregate::{overview, top_perpetrators, year_country_stats};
use gtd_atlas::cli::{cluster_mode, Command, ReportArgs};
use gtd_atlas::filter::available_years;
use gtd_atlas::{
    cluster_incidents, generate_report, load_dataset, Args, ClusterAssignment, Dataset,
    ReportConfig, ReportRequest, Selection,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.load_config()?;

    let start_time = Instant::now();
    let dataset = load_dataset(&args.input, &config)
        .with_context(|| format!("loading {}", args.input.display()))?;
    info!(
        incidents = dataset.len(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "data loaded"
    );

    match &args.command {
        Command::Summary { transitive } => run_summary(&dataset, &config, *transitive)?,
        Command::Clusters { transitive, limit } => run_clusters(&dataset, *transitive, *limit),
        Command::Report(report) => run_report(&dataset, &config, report)?,
    }

    debug!(elapsed_ms = start_time.elapsed().as_millis() as u64, "done");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "gtd_atlas=debug" } else { "gtd_atlas=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Print dataset description, top groups, fatality table and cluster statistics
fn run_summary(dataset: &Dataset, config: &ReportConfig, transitive: bool) -> Result<()> {
    let summary = overview(&dataset.incidents);

    println!("=== Dataset Overview ===");
    println!("Incidents: {}", summary.incidents);
    if let (Some(first), Some(last)) = (summary.first_year, summary.last_year) {
        println!("Years: {} - {}", first, last);
    }
    println!(
        "Confirmed terrorism: {}  Doubtful: {}",
        summary.confirmed, summary.doubtful
    );
    println!("Perpetrator groups: {}", summary.groups);
    println!("Killed: {:.0}  Wounded: {:.0}", summary.kills, summary.wounded);
    println!("\nIncidents by country:");
    for (country, count) in &summary.countries {
        println!("  {:<12} {:>7}", country, count);
    }

    println!("\n=== Top {} Perpetrator Groups ===", config.top_perpetrators);
    for share in top_perpetrators(&dataset.incidents, config.top_perpetrators) {
        println!(
            "  {:<50} {:>7} ({:.2}%)",
            share.name, share.incidents, share.percent
        );
    }

    println!("\n=== Fatality-Casualty Ratio ===");
    println!("  Year | Country      | Incidents |  Killed | Wounded | Ratio");
    println!("  -----|--------------|-----------|---------|---------|------");
    for row in year_country_stats(dataset)? {
        println!(
            "  {:4} | {:<12} | {:9} | {:7.0} | {:7.0} | {:.3}",
            row.year, row.country, row.incidents, row.kills, row.wounded, row.fatality_ratio
        );
    }

    let clusters = cluster_incidents(&dataset.incidents, cluster_mode(transitive));
    print_cluster_statistics(&clusters);
    Ok(())
}

fn print_cluster_statistics(clusters: &ClusterAssignment) {
    println!("\n=== Related Event Clusters ({:?}) ===", clusters.mode);
    println!("Clusters: {}", clusters.cluster_count());
    println!("Incidents in clusters: {}", clusters.clustered_records());
    println!("Distinct events: {}", clusters.distinct_events());
}

/// Print the largest clusters with their member ids
fn run_clusters(dataset: &Dataset, transitive: bool, limit: usize) {
    let clusters = cluster_incidents(&dataset.incidents, cluster_mode(transitive));
    print_cluster_statistics(&clusters);

    let sizes = clusters.cluster_sizes();
    let mut order: Vec<usize> = (0..clusters.cluster_count()).collect();
    order.sort_by(|a, b| sizes[*b].cmp(&sizes[*a]).then(a.cmp(b)));

    println!("\n  Cluster | Records | Members");
    println!("  --------|---------|--------");
    for cluster in order.into_iter().take(limit) {
        let members = clusters.members(cluster).unwrap_or_default().join(",");
        println!("  {:7} | {:7} | {}", cluster, sizes[cluster], members);
    }
}

/// Render every chart for the requested selection
fn run_report(dataset: &Dataset, config: &ReportConfig, report: &ReportArgs) -> Result<()> {
    let clusters = cluster_incidents(&dataset.incidents, cluster_mode(report.transitive));

    // the year picker offers years of related incidents in first-seen order
    let year = match report.year {
        Some(year) => year,
        None => available_years(&dataset.incidents, &clusters)
            .first()
            .copied()
            .or_else(|| dataset.incidents.first().map(|i| i.year))
            .unwrap_or_default(),
    };

    let request = ReportRequest {
        attribute: report.attribute,
        criterion: report.criterion,
        selection: Selection::new(report.country.clone(), year, config)?,
        dedupe: report.dedupe,
    };
    info!(
        attribute = ?request.attribute,
        country = %request.selection.country,
        year = request.selection.year,
        "rendering report"
    );

    let viz_start = Instant::now();
    let written = generate_report(dataset, &clusters, &request, config, &report.output_dir)?;

    println!("=== Report Complete ===");
    for path in &written {
        println!("  {}", path.display());
    }
    println!(
        "Rendered {} charts in {:.2}s",
        written.len(),
        viz_start.elapsed().as_secs_f64()
    );
    Ok(())
}
