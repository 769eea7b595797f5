//! Group-by statistics feeding the charts

use std::collections::{BTreeMap, HashMap};

use polars::prelude::*;

use crate::data::{Dataset, Incident};

/// Per-year, per-country totals
#[derive(Debug, Clone, PartialEq)]
pub struct YearCountryStats {
    pub year: i32,
    pub country: String,
    pub incidents: usize,
    pub kills: f64,
    pub wounded: f64,
    /// kills / (kills + wounded + 1), rounded to 3 places
    pub fatality_ratio: f64,
}

/// Fatality ratio with additive smoothing so zero casualties never divide by zero
///
/// Rounded to three decimals with ties going to the even digit.
pub fn fatality_ratio(kills: f64, wounded: f64) -> f64 {
    round_to(kills / (kills + wounded + 1.0), 3)
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round_ties_even() / scale
}

/// Group incidents by (year, country) and derive kill/wound totals
///
/// Rows come back ordered by year, then country.
pub fn year_country_stats(dataset: &Dataset) -> crate::Result<Vec<YearCountryStats>> {
    let grouped = dataset
        .frame
        .clone()
        .lazy()
        .group_by([col("iyear"), col("country")])
        .agg([
            col("eventid").count().alias("incidents"),
            col("nkill").sum().alias("kills"),
            col("nwound").sum().alias("wounded"),
        ])
        .collect()?;

    let years = grouped.column("iyear")?.cast(&DataType::Int64)?;
    let countries = grouped.column("country")?.cast(&DataType::String)?;
    let incidents = grouped.column("incidents")?.cast(&DataType::Int64)?;
    let kills = grouped.column("kills")?.cast(&DataType::Float64)?;
    let wounded = grouped.column("wounded")?.cast(&DataType::Float64)?;

    let mut stats: Vec<YearCountryStats> = years
        .i64()?
        .into_iter()
        .zip(countries.str()?.into_iter())
        .zip(incidents.i64()?.into_iter())
        .zip(kills.f64()?.into_iter().zip(wounded.f64()?.into_iter()))
        .filter_map(|(((year, country), count), (kills, wounded))| {
            let kills = kills.unwrap_or(0.0);
            let wounded = wounded.unwrap_or(0.0);
            Some(YearCountryStats {
                year: year? as i32,
                country: country?.to_string(),
                incidents: count.unwrap_or(0) as usize,
                kills,
                wounded,
                fatality_ratio: fatality_ratio(kills, wounded),
            })
        })
        .collect();

    stats.sort_by(|a, b| a.year.cmp(&b.year).then_with(|| a.country.cmp(&b.country)));
    Ok(stats)
}

/// Count incidents per category, most frequent first, ties by label
pub fn value_counts<'a, F>(incidents: impl IntoIterator<Item = &'a Incident>, key: F) -> Vec<(String, usize)>
where
    F: Fn(&Incident) -> &str,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for incident in incidents {
        *counts.entry(key(incident).to_string()).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// One slice of the perpetrator share chart
#[derive(Debug, Clone, PartialEq)]
pub struct GroupShare {
    pub name: String,
    pub incidents: usize,
    /// Percentage of the shown groups' total
    pub percent: f64,
}

/// The `n` groups responsible for the most incidents
pub fn top_perpetrators(incidents: &[Incident], n: usize) -> Vec<GroupShare> {
    let top: Vec<(String, usize)> = value_counts(incidents, |i| i.group_name.as_str())
        .into_iter()
        .take(n)
        .collect();
    let total: usize = top.iter().map(|(_, count)| count).sum();
    top.into_iter()
        .map(|(name, count)| GroupShare {
            name,
            incidents: count,
            percent: if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            },
        })
        .collect()
}

/// Label used for a 0/1 criterion value
pub fn criterion_label(value: Option<i64>) -> &'static str {
    match value {
        Some(0) => "No",
        Some(1) => "Yes",
        _ => "Unknown",
    }
}

/// Counts of a category split by a hue value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountTable {
    pub categories: Vec<String>,
    pub hues: Vec<String>,
    /// `counts[hue][category]`
    pub counts: Vec<Vec<usize>>,
}

impl CountTable {
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn count(&self, category: &str, hue: &str) -> usize {
        let c = self.categories.iter().position(|x| x == category);
        let h = self.hues.iter().position(|x| x == hue);
        match (c, h) {
            (Some(c), Some(h)) => self.counts[h][c],
            _ => 0,
        }
    }
}

/// Category counts split by a hue
///
/// Categories are ordered by total count like [`value_counts`]; hues are
/// sorted so "No" precedes "Yes".
pub fn counts_by_hue<'a, F, H>(
    incidents: impl IntoIterator<Item = &'a Incident>,
    key: F,
    hue: H,
) -> CountTable
where
    F: Fn(&Incident) -> &str,
    H: Fn(&Incident) -> &str,
{
    let incidents: Vec<&Incident> = incidents.into_iter().collect();
    let categories: Vec<String> = value_counts(incidents.iter().copied(), &key)
        .into_iter()
        .map(|(category, _)| category)
        .collect();
    let hues: Vec<String> = incidents
        .iter()
        .map(|&i| hue(i).to_string())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut counts = vec![vec![0; categories.len()]; hues.len()];
    for &incident in &incidents {
        let c = categories.iter().position(|x| x == key(incident));
        let h = hues.iter().position(|x| x == hue(incident));
        if let (Some(c), Some(h)) = (c, h) {
            counts[h][c] += 1;
        }
    }

    CountTable {
        categories,
        hues,
        counts,
    }
}

/// crit1 counts for every (crit2, crit3) panel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CriteriaFacets {
    /// Keyed by (crit2 label, crit3 label), each value maps crit1 label to count
    pub panels: BTreeMap<(String, String), BTreeMap<String, usize>>,
}

impl CriteriaFacets {
    pub fn count(&self, crit2: &str, crit3: &str, crit1: &str) -> usize {
        self.panels
            .get(&(crit2.to_string(), crit3.to_string()))
            .and_then(|panel| panel.get(crit1))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.panels.values().flat_map(|panel| panel.values()).sum()
    }
}

pub fn criteria_facets<'a>(incidents: impl IntoIterator<Item = &'a Incident>) -> CriteriaFacets {
    let mut facets = CriteriaFacets::default();
    for incident in incidents {
        let panel = facets
            .panels
            .entry((
                criterion_label(incident.crit2).to_string(),
                criterion_label(incident.crit3).to_string(),
            ))
            .or_default();
        *panel
            .entry(criterion_label(incident.crit1).to_string())
            .or_default() += 1;
    }
    facets
}

/// Headline numbers for the dataset description
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub incidents: usize,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub countries: Vec<(String, usize)>,
    pub groups: usize,
    pub kills: f64,
    pub wounded: f64,
    pub confirmed: usize,
    pub doubtful: usize,
}

pub fn overview(incidents: &[Incident]) -> Overview {
    let groups = value_counts(incidents, |i| i.group_name.as_str()).len();
    let confirmed = incidents.iter().filter(|i| i.is_confirmed_terrorism()).count();
    Overview {
        incidents: incidents.len(),
        first_year: incidents.iter().map(|i| i.year).min(),
        last_year: incidents.iter().map(|i| i.year).max(),
        countries: value_counts(incidents, |i| i.country.as_str()),
        groups,
        kills: incidents.iter().map(|i| i.kills).sum(),
        wounded: incidents.iter().map(|i| i.wounded).sum(),
        confirmed,
        doubtful: incidents.len() - confirmed,
    }
}
