//! Selection types and the pure filters applied before charting

use clap::ValueEnum;
use tracing::debug;

use crate::aggregate::{counts_by_hue, criterion_label, CountTable};
use crate::cluster::ClusterAssignment;
use crate::config::ReportConfig;
use crate::data::Incident;
use crate::error::DataError;

/// Attribute shown by the frequency chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Attribute {
    TargetType,
    AlternativeAttackType,
    Weapon,
    Country,
}

impl Attribute {
    pub fn axis_label(self) -> &'static str {
        match self {
            Attribute::TargetType => "Target Type",
            Attribute::AlternativeAttackType => "Alternative Attack Type",
            Attribute::Weapon => "Attack Weapon",
            Attribute::Country => "Country Of Attack",
        }
    }

    pub fn value(self, incident: &Incident) -> &str {
        match self {
            Attribute::TargetType => &incident.target_type,
            Attribute::AlternativeAttackType => &incident.alternative_attack_type,
            Attribute::Weapon => &incident.weapon_type,
            Attribute::Country => &incident.country,
        }
    }
}

/// Inclusion criterion used to split alternative attacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Criterion {
    /// crit1: political, economic, religious or social goal
    PersonalMotive,
    /// crit2: intention to coerce or intimidate a larger audience
    Coercion,
    /// crit3: outside legitimate warfare
    IllegitimateWarfare,
}

impl Criterion {
    pub fn title(self) -> &'static str {
        match self {
            Criterion::PersonalMotive => "Political, Economic or Religious Goal",
            Criterion::Coercion => "Coercion and Intimidation",
            Criterion::IllegitimateWarfare => "Illegitimate Warfare",
        }
    }

    pub fn value(self, incident: &Incident) -> Option<i64> {
        match self {
            Criterion::PersonalMotive => incident.crit1,
            Criterion::Coercion => incident.crit2,
            Criterion::IllegitimateWarfare => incident.crit3,
        }
    }
}

/// Data behind the frequency chart for one attribute selection
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencySelection {
    pub attribute: Attribute,
    /// Only set for alternative attack types
    pub criterion: Option<Criterion>,
    pub table: CountTable,
}

/// Count the chosen attribute
///
/// Target types count every incident. Alternative attack types, weapons and
/// countries count doubtful incidents only; alternative attack types are
/// further split by the criterion.
pub fn frequency_selection(
    incidents: &[Incident],
    attribute: Attribute,
    criterion: Criterion,
) -> FrequencySelection {
    let doubtful = incidents.iter().filter(|i| !i.is_confirmed_terrorism());
    match attribute {
        Attribute::TargetType => FrequencySelection {
            attribute,
            criterion: None,
            table: counts_by_hue(incidents, |i| attribute.value(i), |_| "Count"),
        },
        Attribute::AlternativeAttackType => FrequencySelection {
            attribute,
            criterion: Some(criterion),
            table: counts_by_hue(
                doubtful,
                |i| attribute.value(i),
                |i| criterion_label(criterion.value(i)),
            ),
        },
        Attribute::Weapon | Attribute::Country => FrequencySelection {
            attribute,
            criterion: None,
            table: counts_by_hue(doubtful, |i| attribute.value(i), |_| "Count"),
        },
    }
}

/// Geo-tagged incident ready for a map chart
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub event_id: String,
    pub year: i32,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub casualties: f64,
    pub attack_type: String,
    pub tooltip: String,
    pub cluster: Option<usize>,
}

/// Incidents with usable coordinates, tagged with their cluster label
///
/// With `clustered_only` the set is restricted to incidents that have related
/// events; with `dedupe` each cluster keeps only its first incident.
pub fn geo_points(
    incidents: &[Incident],
    clusters: &ClusterAssignment,
    clustered_only: bool,
    dedupe: bool,
) -> Vec<GeoPoint> {
    let rows: Vec<usize> = if dedupe {
        clusters.representatives()
    } else {
        (0..incidents.len()).collect()
    };

    rows.into_iter()
        .filter_map(|row| {
            let incident = incidents.get(row)?;
            let cluster = clusters.label(row);
            if clustered_only && cluster.is_none() {
                return None;
            }
            let (latitude, longitude) = incident.coordinates()?;
            Some(GeoPoint {
                event_id: incident.event_id.clone(),
                year: incident.year,
                country: incident.country.clone(),
                latitude,
                longitude,
                casualties: incident.casualties,
                attack_type: incident.attack_type.clone(),
                tooltip: incident.tooltip(),
                cluster,
            })
        })
        .collect()
}

/// A country/year pick from the map controls
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub country: String,
    pub year: i32,
}

impl Selection {
    /// Reject countries outside the configured region
    pub fn new(country: impl Into<String>, year: i32, config: &ReportConfig) -> crate::Result<Self> {
        let country = country.into();
        if !config.in_region(&country) {
            return Err(DataError::UnknownCountry(country).into());
        }
        Ok(Self { country, year })
    }

    pub fn matches(&self, point: &GeoPoint) -> bool {
        point.country == self.country && point.year == self.year
    }
}

/// Points for the selection; an empty result is a valid (blank) chart input.
pub fn select(points: &[GeoPoint], selection: &Selection) -> Vec<GeoPoint> {
    let selected: Vec<GeoPoint> = points
        .iter()
        .filter(|p| selection.matches(p))
        .cloned()
        .collect();
    debug!(
        country = %selection.country,
        year = selection.year,
        points = selected.len(),
        "selection applied"
    );
    selected
}

/// Distinct years of related incidents in first-seen order, as offered by
/// the year picker. Incidents without coordinates still contribute.
pub fn available_years(incidents: &[Incident], clusters: &ClusterAssignment) -> Vec<i32> {
    let mut years = Vec::new();
    for (row, incident) in incidents.iter().enumerate() {
        if clusters.label(row).is_some() && !years.contains(&incident.year) {
            years.push(incident.year);
        }
    }
    years
}
