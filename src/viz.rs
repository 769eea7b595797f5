//! Chart rendering using Plotters
//!
//! Every chart is a plain data struct implementing [`Chart`], so the same
//! drawing code targets both the bitmap and the SVG backend. The output file
//! extension picks the backend.

use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::Palette;
use tracing::{info, warn};

use crate::aggregate::{
    criteria_facets, top_perpetrators, year_country_stats, CountTable, CriteriaFacets, GroupShare,
    YearCountryStats,
};
use crate::cluster::ClusterAssignment;
use crate::config::ReportConfig;
use crate::data::Dataset;
use crate::filter::{
    frequency_selection, geo_points, select, Attribute, Criterion, FrequencySelection, GeoPoint,
    Selection,
};

/// Longitude/latitude box used when a map selection is empty
const SOUTH_ASIA_LON: Range<f64> = 60.0..98.0;
const SOUTH_ASIA_LAT: Range<f64> = 4.0..38.0;

const CRITERION_VALUES: [&str; 2] = ["No", "Yes"];

fn series_color(index: usize) -> RGBColor {
    let (r, g, b) = Palette99::COLORS[index % Palette99::COLORS.len()];
    RGBColor(r, g, b)
}

/// Something that can draw itself onto any Plotters backend
pub trait Chart {
    fn draw<DB>(&self, area: &DrawingArea<DB, Shift>, caption_size: f64) -> crate::Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static;
}

/// Render a chart to `path`, SVG for `.svg` files and PNG otherwise
pub fn render_chart<C: Chart>(chart: &C, path: &Path, config: &ReportConfig) -> crate::Result<()> {
    let size = config.chart_size();
    let caption_size = config.caption_size as f64;

    let is_svg = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);

    if is_svg {
        let root = SVGBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;
        chart.draw(&root, caption_size)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;
        chart.draw(&root, caption_size)?;
        root.present()?;
    }

    info!(path = %path.display(), "chart saved");
    Ok(())
}

/// Horizontal count bars, one series per hue
#[derive(Debug, Clone)]
pub struct FrequencyChart {
    pub title: String,
    pub axis_label: String,
    pub table: CountTable,
}

impl From<&FrequencySelection> for FrequencyChart {
    fn from(selection: &FrequencySelection) -> Self {
        let title = match selection.criterion {
            Some(criterion) => format!(
                "{} by {}",
                selection.attribute.axis_label(),
                criterion.title()
            ),
            None => format!("{} Frequency", selection.attribute.axis_label()),
        };
        Self {
            title,
            axis_label: selection.attribute.axis_label().to_string(),
            table: selection.table.clone(),
        }
    }
}

impl Chart for FrequencyChart {
    fn draw<DB>(&self, area: &DrawingArea<DB, Shift>, caption_size: f64) -> crate::Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let categories = &self.table.categories;
        let n = categories.len().max(1);
        let max_count = self
            .table
            .counts
            .iter()
            .flatten()
            .copied()
            .max()
            .unwrap_or(0)
            .max(1) as f64;

        let mut chart = ChartBuilder::on(area)
            .caption(&self.title, ("sans-serif", caption_size))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(240)
            .build_cartesian_2d(0f64..max_count * 1.1, -0.5f64..(n as f64 - 0.5))?;

        // most frequent category on top
        let row_of = |category: usize| (n - 1 - category) as f64;
        let label_of = |y: &f64| {
            let row = y.round();
            if (y - row).abs() > 1e-6 || row < 0.0 || row as usize >= n {
                return String::new();
            }
            categories
                .get(n - 1 - row as usize)
                .cloned()
                .unwrap_or_default()
        };

        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(n)
            .y_label_formatter(&label_of)
            .x_desc("Count")
            .y_desc(self.axis_label.as_str())
            .axis_desc_style(("sans-serif", 15))
            .draw()?;

        let hues = self.table.hues.len().max(1);
        let band = 0.8 / hues as f64;
        for (h, (hue, counts)) in self.table.hues.iter().zip(&self.table.counts).enumerate() {
            let color = series_color(h);
            let offset = -0.4 + band * h as f64;
            let series = chart.draw_series(counts.iter().enumerate().map(|(c, &count)| {
                let y0 = row_of(c) + offset;
                Rectangle::new([(0.0, y0), (count as f64, y0 + band)], color.filled())
            }))?;
            if hues > 1 {
                series
                    .label(hue.as_str())
                    .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
            }
        }

        if hues > 1 {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::LowerRight)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
        Ok(())
    }
}

/// Share of incidents for the most active perpetrator groups
#[derive(Debug, Clone)]
pub struct PerpetratorPie {
    pub shares: Vec<GroupShare>,
}

impl PerpetratorPie {
    /// Percentages are only printed for slices above 10% to keep small slices legible.
    pub fn labels(&self) -> Vec<String> {
        self.shares
            .iter()
            .map(|share| {
                if share.percent > 10.0 {
                    format!("{} ({:.2}%)", share.name, share.percent)
                } else {
                    share.name.clone()
                }
            })
            .collect()
    }
}

impl Chart for PerpetratorPie {
    fn draw<DB>(&self, area: &DrawingArea<DB, Shift>, caption_size: f64) -> crate::Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let area = area.titled("Terrorist Group Involvement", ("sans-serif", caption_size))?;
        let total: usize = self.shares.iter().map(|s| s.incidents).sum();
        if total == 0 {
            return Ok(());
        }

        let (width, height) = area.dim_in_pixel();
        let center = (width as i32 / 2, height as i32 / 2);
        let radius = width.min(height) as f64 * 0.3;
        let sizes: Vec<f64> = self.shares.iter().map(|s| s.incidents as f64).collect();
        let colors: Vec<RGBColor> = (0..self.shares.len()).map(series_color).collect();
        let labels = self.labels();

        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
        pie.start_angle(90.0);
        pie.label_style(("sans-serif", 14).into_font().color(&BLACK));
        area.draw(&pie)?;
        Ok(())
    }
}

/// Fatality ratio per year, one colored series per country, sized by incidents
#[derive(Debug, Clone)]
pub struct RatioScatter {
    pub stats: Vec<YearCountryStats>,
}

impl Chart for RatioScatter {
    fn draw<DB>(&self, area: &DrawingArea<DB, Shift>, caption_size: f64) -> crate::Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let first = self.stats.iter().map(|s| s.year).min().unwrap_or(1970);
        let last = self.stats.iter().map(|s| s.year).max().unwrap_or(2020);
        let max_incidents = self.stats.iter().map(|s| s.incidents).max().unwrap_or(1).max(1);

        let mut chart = ChartBuilder::on(area)
            .caption("Fatality-Casualty Ratio", ("sans-serif", caption_size))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d((first - 1) as f64..(last + 1) as f64, 0f64..1f64)?;

        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc("Kills / (Kills + Wounded + 1)")
            .x_label_formatter(&|x| format!("{:.0}", x))
            .axis_desc_style(("sans-serif", 15))
            .draw()?;

        let mut countries: Vec<&str> = self.stats.iter().map(|s| s.country.as_str()).collect();
        countries.sort_unstable();
        countries.dedup();

        for (i, country) in countries.iter().enumerate() {
            let color = series_color(i);
            chart
                .draw_series(
                    self.stats
                        .iter()
                        .filter(|s| s.country == *country)
                        .map(|s| {
                            let scale = (s.incidents as f64 / max_incidents as f64).sqrt();
                            let radius = 3 + (scale * 15.0) as i32;
                            Circle::new((s.year as f64, s.fatality_ratio), radius, color.mix(0.7).filled())
                        }),
                )?
                .label(*country)
                .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
        }

        if !countries.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
        Ok(())
    }
}

fn geo_bounds(points: &[GeoPoint]) -> (Range<f64>, Range<f64>) {
    if points.is_empty() {
        return (SOUTH_ASIA_LON, SOUTH_ASIA_LAT);
    }
    let fold = |f: fn(&GeoPoint) -> f64| {
        points.iter().map(f).fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
    };
    let (lon_min, lon_max) = fold(|p| p.longitude);
    let (lat_min, lat_max) = fold(|p| p.latitude);
    ((lon_min - 1.0)..(lon_max + 1.0), (lat_min - 1.0)..(lat_max + 1.0))
}

/// Shared axes for the two map charts
fn map_axes<'a, DB>(
    area: &'a DrawingArea<DB, Shift>,
    title: &str,
    points: &[GeoPoint],
    caption_size: f64,
) -> crate::Result<ChartContext<'a, DB, Cartesian2d<plotters::coord::types::RangedCoordf64, plotters::coord::types::RangedCoordf64>>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (lon, lat) = geo_bounds(points);
    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", caption_size))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(lon, lat)?;

    chart
        .configure_mesh()
        .x_desc("Longitude")
        .y_desc("Latitude")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;
    Ok(chart)
}

fn casualty_radius(casualties: f64, max_casualties: f64) -> i32 {
    if max_casualties <= 0.0 {
        return 3;
    }
    3 + ((casualties.max(0.0) / max_casualties).sqrt() * 18.0) as i32
}

/// Related incidents for one country and year, sized by casualties
#[derive(Debug, Clone)]
pub struct DensityMap {
    pub title: String,
    pub points: Vec<GeoPoint>,
}

impl Chart for DensityMap {
    fn draw<DB>(&self, area: &DrawingArea<DB, Shift>, caption_size: f64) -> crate::Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let mut chart = map_axes(area, &self.title, &self.points, caption_size)?;
        let max_casualties = self.points.iter().map(|p| p.casualties).fold(0.0, f64::max);

        chart.draw_series(self.points.iter().map(|p| {
            Circle::new(
                (p.longitude, p.latitude),
                casualty_radius(p.casualties, max_casualties),
                RED.mix(0.45).filled(),
            )
        }))?;
        Ok(())
    }
}

/// Incidents for one country and year, colored by attack type
#[derive(Debug, Clone)]
pub struct GeoScatter {
    pub title: String,
    pub points: Vec<GeoPoint>,
}

impl GeoScatter {
    pub fn attack_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.points.iter().map(|p| p.attack_type.as_str()).collect();
        types.sort_unstable();
        types.dedup();
        types
    }
}

impl Chart for GeoScatter {
    fn draw<DB>(&self, area: &DrawingArea<DB, Shift>, caption_size: f64) -> crate::Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let mut chart = map_axes(area, &self.title, &self.points, caption_size)?;
        let max_casualties = self.points.iter().map(|p| p.casualties).fold(0.0, f64::max);
        let attack_types = self.attack_types();

        for (i, attack_type) in attack_types.iter().enumerate() {
            let color = series_color(i);
            chart
                .draw_series(
                    self.points
                        .iter()
                        .filter(|p| p.attack_type == *attack_type)
                        .map(|p| {
                            Circle::new(
                                (p.longitude, p.latitude),
                                casualty_radius(p.casualties, max_casualties),
                                color.mix(0.7).filled(),
                            )
                        }),
                )?
                .label(*attack_type)
                .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
        }

        if !attack_types.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
        Ok(())
    }
}

/// crit1 counts in a 2x2 grid of (crit2 row, crit3 column) panels
#[derive(Debug, Clone)]
pub struct CriteriaGrid {
    pub title: String,
    pub facets: CriteriaFacets,
}

impl Chart for CriteriaGrid {
    fn draw<DB>(&self, area: &DrawingArea<DB, Shift>, caption_size: f64) -> crate::Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let area = area.titled(&self.title, ("sans-serif", caption_size))?;
        let panels = area.split_evenly((2, 2));
        let max_count = self
            .facets
            .panels
            .values()
            .flat_map(|panel| panel.values())
            .copied()
            .max()
            .unwrap_or(0)
            .max(1) as f64;

        for (idx, panel) in panels.iter().enumerate() {
            let crit2 = CRITERION_VALUES[idx / 2];
            let crit3 = CRITERION_VALUES[idx % 2];

            let mut chart = ChartBuilder::on(panel)
                .caption(
                    format!("crit2 = {} | crit3 = {}", crit2, crit3),
                    ("sans-serif", 16),
                )
                .margin(10)
                .x_label_area_size(30)
                .y_label_area_size(45)
                .build_cartesian_2d(-0.5f64..1.5f64, 0f64..max_count * 1.1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(2)
                .x_label_formatter(&|x| {
                    let idx = x.round();
                    if (x - idx).abs() > 1e-6 || !(0.0..=1.0).contains(&idx) {
                        String::new()
                    } else {
                        CRITERION_VALUES[idx as usize].to_string()
                    }
                })
                .x_desc("crit1")
                .draw()?;

            chart.draw_series(CRITERION_VALUES.iter().enumerate().map(|(x, crit1)| {
                let count = self.facets.count(crit2, crit3, crit1) as f64;
                Rectangle::new(
                    [(x as f64 - 0.35, 0.0), (x as f64 + 0.35, count)],
                    series_color(0).filled(),
                )
            }))?;
        }
        Ok(())
    }
}

/// Selections driving one report run
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub attribute: Attribute,
    pub criterion: Criterion,
    pub selection: Selection,
    /// Keep one incident per cluster on the maps
    pub dedupe: bool,
}

fn slug(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

fn attribute_slug(attribute: Attribute) -> String {
    slug(attribute.axis_label())
}

fn emit<C: Chart>(
    chart: &C,
    name: &str,
    output_dir: &Path,
    config: &ReportConfig,
    written: &mut Vec<PathBuf>,
) -> crate::Result<()> {
    let path = output_dir.join(format!("{}.{}", name, config.image_format.extension()));
    render_chart(chart, &path, config)?;
    written.push(path);
    Ok(())
}

/// Render every dashboard chart for the request into `output_dir`
///
/// # Returns
/// * Paths of the written files, in rendering order
pub fn generate_report(
    dataset: &Dataset,
    clusters: &ClusterAssignment,
    request: &ReportRequest,
    config: &ReportConfig,
    output_dir: &Path,
) -> crate::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    let pie = PerpetratorPie {
        shares: top_perpetrators(&dataset.incidents, config.top_perpetrators),
    };
    emit(&pie, "perpetrators", output_dir, config, &mut written)?;

    let frequency = FrequencyChart::from(&frequency_selection(
        &dataset.incidents,
        request.attribute,
        request.criterion,
    ));
    let name = format!("frequency_{}", attribute_slug(request.attribute));
    emit(&frequency, &name, output_dir, config, &mut written)?;

    let (confirmed, doubtful): (Vec<_>, Vec<_>) = dataset
        .incidents
        .iter()
        .partition(|i| i.is_confirmed_terrorism());
    let confirmed_grid = CriteriaGrid {
        title: "Terrorist Activities".to_string(),
        facets: criteria_facets(confirmed),
    };
    emit(&confirmed_grid, "criteria_confirmed", output_dir, config, &mut written)?;
    let doubtful_grid = CriteriaGrid {
        title: "Other Militant Attacks".to_string(),
        facets: criteria_facets(doubtful),
    };
    emit(&doubtful_grid, "criteria_doubtful", output_dir, config, &mut written)?;

    let ratios = RatioScatter {
        stats: year_country_stats(dataset)?,
    };
    emit(&ratios, "fatality_ratio", output_dir, config, &mut written)?;

    let selection = &request.selection;
    let suffix = format!("{}_{}", slug(&selection.country), selection.year);

    let related = geo_points(&dataset.incidents, clusters, true, request.dedupe);
    let density = DensityMap {
        title: format!(
            "Civilian Casualties in Related Attacks: {} {}",
            selection.country, selection.year
        ),
        points: select(&related, selection),
    };
    if density.points.is_empty() {
        warn!(country = %selection.country, year = selection.year, "no related incidents for selection");
    }
    emit(&density, &format!("density_{}", suffix), output_dir, config, &mut written)?;

    let all_points = geo_points(&dataset.incidents, clusters, false, request.dedupe);
    let scatter = GeoScatter {
        title: format!("Attack Types: {} {}", selection.country, selection.year),
        points: select(&all_points, selection),
    };
    emit(&scatter, &format!("attack_types_{}", suffix), output_dir, config, &mut written)?;

    Ok(written)
}
