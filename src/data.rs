//! Incident loading and column normalization using Polars

use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, info};

use crate::config::ReportConfig;
use crate::error::DataError;

/// Sentinel the dataset uses for unknown text values and empty related lists
pub const UNKNOWN: &str = "Unknown";

/// Columns the loader refuses to work without
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "eventid", "iyear", "country", "latitude", "longitude", "nkill", "nwound", "related",
];

/// One row of the incident table
#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    pub event_id: String,
    pub year: i32,
    /// 0 when unknown
    pub month: u32,
    /// 0 when unknown
    pub day: u32,
    pub country: String,
    pub province: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Perpetrator group name
    pub group_name: String,
    pub target_type: String,
    pub weapon_type: String,
    pub attack_type: String,
    pub alternative_attack_type: String,
    pub crit1: Option<i64>,
    pub crit2: Option<i64>,
    pub crit3: Option<i64>,
    /// `doubtterr`: 0 means confirmed terrorism
    pub doubt: Option<i64>,
    pub success: bool,
    pub kills: f64,
    pub wounded: f64,
    pub casualties: f64,
    /// Comma separated event ids, or [`UNKNOWN`]
    pub related: String,
}

impl Incident {
    /// Incident with every optional attribute unknown.
    pub fn new(event_id: impl Into<String>, year: i32, country: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            year,
            month: 0,
            day: 0,
            country: country.into(),
            province: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            latitude: None,
            longitude: None,
            group_name: UNKNOWN.to_string(),
            target_type: UNKNOWN.to_string(),
            weapon_type: UNKNOWN.to_string(),
            attack_type: UNKNOWN.to_string(),
            alternative_attack_type: UNKNOWN.to_string(),
            crit1: None,
            crit2: None,
            crit3: None,
            doubt: None,
            success: false,
            kills: 0.0,
            wounded: 0.0,
            casualties: 0.0,
            related: UNKNOWN.to_string(),
        }
    }

    /// Calendar date, if both month and day were recorded.
    pub fn date(&self) -> Option<NaiveDate> {
        if self.month == 0 || self.day == 0 {
            return None;
        }
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn is_confirmed_terrorism(&self) -> bool {
        self.doubt == Some(0)
    }

    pub fn has_related(&self) -> bool {
        self.related.trim() != UNKNOWN
    }

    pub fn tooltip(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

/// The loaded dataset: a normalized frame for group-by work and typed rows
#[derive(Debug)]
pub struct Dataset {
    /// Region-filtered frame with `eventid`, `iyear` as Int64 and `nkill`,
    /// `nwound` as Float64 with nulls zeroed
    pub frame: DataFrame,
    /// Typed rows in file order
    pub incidents: Vec<Incident>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}

/// Load the incident CSV and keep only rows from the configured region
///
/// # Arguments
/// * `file_path` - Path to the CSV file
/// * `config` - Supplies the region filter
///
/// # Returns
/// * `Dataset` holding the normalized frame and typed incidents
pub fn load_dataset(file_path: impl AsRef<Path>, config: &ReportConfig) -> crate::Result<Dataset> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Err(DataError::MissingFile(file_path.to_path_buf()).into());
    }

    let raw = LazyCsvReader::new(file_path)
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .finish()?
        .collect()?;
    let raw_rows = raw.height();
    debug!(rows = raw_rows, columns = raw.width(), "read csv");

    let names: Vec<String> = raw.get_column_names().iter().map(|c| c.to_string()).collect();
    for required in REQUIRED_COLUMNS {
        if !names.iter().any(|n| n == required) {
            return Err(DataError::MissingColumn(required.to_string()).into());
        }
    }

    let frame = raw
        .lazy()
        .with_columns([
            col("eventid").cast(DataType::Int64),
            col("iyear").cast(DataType::Int64),
            col("country").cast(DataType::String).fill_null(lit(UNKNOWN)),
            col("nkill").cast(DataType::Float64).fill_null(lit(0.0)),
            col("nwound").cast(DataType::Float64).fill_null(lit(0.0)),
            col("related").cast(DataType::String).fill_null(lit(UNKNOWN)),
        ])
        .filter(region_predicate(&config.region))
        .collect()?;

    if frame.height() == 0 {
        return Err(DataError::EmptyRegion.into());
    }

    let incidents = extract_incidents(&frame)?;
    info!(
        incidents = incidents.len(),
        outside_region = raw_rows - incidents.len(),
        "dataset loaded"
    );

    Ok(Dataset { frame, incidents })
}

fn region_predicate(region: &[String]) -> Expr {
    region
        .iter()
        .map(|country| col("country").eq(lit(country.as_str())))
        .reduce(|acc, next| acc.or(next))
        .unwrap_or_else(|| lit(false))
}

/// Column accessor that substitutes defaults for absent optional columns
struct Columns<'a> {
    frame: &'a DataFrame,
    names: Vec<String>,
}

impl<'a> Columns<'a> {
    fn new(frame: &'a DataFrame) -> Self {
        let names = frame.get_column_names().iter().map(|c| c.to_string()).collect();
        Self { frame, names }
    }

    fn has(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    fn text(&self, name: &str) -> crate::Result<Vec<String>> {
        if !self.has(name) {
            return Ok(vec![UNKNOWN.to_string(); self.frame.height()]);
        }
        let series = self.frame.column(name)?.cast(&DataType::String)?;
        let values = series
            .str()?
            .into_iter()
            .map(|value| match value.map(str::trim) {
                Some(v) if !v.is_empty() => v.to_string(),
                _ => UNKNOWN.to_string(),
            })
            .collect();
        Ok(values)
    }

    fn float(&self, name: &str) -> crate::Result<Vec<Option<f64>>> {
        if !self.has(name) {
            return Ok(vec![None; self.frame.height()]);
        }
        let series = self.frame.column(name)?.cast(&DataType::Float64)?;
        let values = series.f64()?.into_iter().collect();
        Ok(values)
    }

    fn int(&self, name: &str) -> crate::Result<Vec<Option<i64>>> {
        if !self.has(name) {
            return Ok(vec![None; self.frame.height()]);
        }
        let series = self.frame.column(name)?.cast(&DataType::Int64)?;
        let values = series.i64()?.into_iter().collect();
        Ok(values)
    }
}

fn required<T>(value: Option<T>, row: usize, column: &str) -> crate::Result<T> {
    value.ok_or_else(|| {
        DataError::MissingValue {
            row,
            column: column.to_string(),
        }
        .into()
    })
}

/// Convert the normalized frame into typed incidents
fn extract_incidents(frame: &DataFrame) -> crate::Result<Vec<Incident>> {
    let columns = Columns::new(frame);

    let event_ids = columns.int("eventid")?;
    let years = columns.int("iyear")?;
    let months = columns.int("imonth")?;
    let days = columns.int("iday")?;
    let countries = columns.text("country")?;
    let provinces = columns.text("province")?;
    let cities = columns.text("city")?;
    let latitudes = columns.float("latitude")?;
    let longitudes = columns.float("longitude")?;
    let groups = columns.text("gname")?;
    let targets = columns.text("targettype")?;
    let weapons = columns.text("weaptype")?;
    let attacks = columns.text("attacktype")?;
    let alternatives = columns.text("alternative_attack_type")?;
    let crit1 = columns.int("crit1")?;
    let crit2 = columns.int("crit2")?;
    let crit3 = columns.int("crit3")?;
    let doubts = columns.int("doubtterr")?;
    let successes = columns.int("success")?;
    let kills = columns.float("nkill")?;
    let wounded = columns.float("nwound")?;
    let casualties = columns.float("casualties")?;
    let related = columns.text("related")?;

    let mut incidents = Vec::with_capacity(frame.height());
    for row in 0..frame.height() {
        let event_id = required(event_ids[row], row, "eventid")?;
        let year = required(years[row], row, "iyear")?;
        let row_kills = kills[row].unwrap_or(0.0);
        let row_wounded = wounded[row].unwrap_or(0.0);

        incidents.push(Incident {
            event_id: event_id.to_string(),
            year: year as i32,
            month: months[row].unwrap_or(0).max(0) as u32,
            day: days[row].unwrap_or(0).max(0) as u32,
            country: countries[row].clone(),
            province: provinces[row].clone(),
            city: cities[row].clone(),
            latitude: latitudes[row],
            longitude: longitudes[row],
            group_name: groups[row].clone(),
            target_type: targets[row].clone(),
            weapon_type: weapons[row].clone(),
            attack_type: attacks[row].clone(),
            alternative_attack_type: alternatives[row].clone(),
            crit1: crit1[row],
            crit2: crit2[row],
            crit3: crit3[row],
            doubt: doubts[row],
            success: successes[row] == Some(1),
            kills: row_kills,
            wounded: row_wounded,
            casualties: casualties[row].unwrap_or(row_kills + row_wounded),
            related: related[row].clone(),
        });
    }

    Ok(incidents)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub(crate) const HEADER: &str = "eventid,iyear,imonth,iday,country,province,city,latitude,longitude,gname,targettype,weaptype,attacktype,alternative_attack_type,crit1,crit2,crit3,doubtterr,success,nkill,nwound,casualties,related";

    pub(crate) fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(file, "201001010001,2010,1,1,India,Assam,Guwahati,26.14,91.73,ULFA,Police,Explosives,Bombing/Explosion,Unknown,1,1,1,0,1,3,1,4,\"201001010002,201001010003\"").unwrap();
        writeln!(file, "201001010002,2010,1,1,India,Assam,Dispur,26.13,91.79,ULFA,Police,Explosives,Bombing/Explosion,Unknown,1,1,1,0,1,,2,2,\"201001010001,201001010003\"").unwrap();
        writeln!(file, "201001010003,2010,1,1,India,Assam,Jorhat,26.75,94.20,ULFA,Military,Firearms,Armed Assault,Unknown,1,1,1,0,1,1,0,1,\"201001010001,201001010002\"").unwrap();
        writeln!(file, "201105020001,2011,5,2,Pakistan,Punjab,Lahore,31.55,74.34,Taliban,Private Citizens & Property,Firearms,Armed Assault,Insurgency/Guerilla Action,1,0,0,1,1,5,10,15,Unknown").unwrap();
        writeln!(file, "201105030001,2011,5,3,Iraq,Baghdad,Baghdad,33.31,44.36,Unknown,Military,Explosives,Bombing/Explosion,Unknown,1,1,1,0,1,7,7,14,Unknown").unwrap();
        writeln!(file, "201206000001,2012,6,0,Nepal,Bagmati,,27.70,85.32,Maoists,Government (General),Incendiary,Facility/Infrastructure Attack,Intra/Inter-group Conflict,1,1,0,1,0,0,0,0,Unknown").unwrap();
        file
    }

    #[test]
    fn test_load_dataset_filters_region() {
        let test_file = create_test_csv();
        let dataset = load_dataset(test_file.path(), &ReportConfig::default()).unwrap();

        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.frame.height(), 5);
        assert!(dataset.incidents.iter().all(|i| i.country != "Iraq"));
    }

    #[test]
    fn test_incident_fields_normalized() {
        let test_file = create_test_csv();
        let dataset = load_dataset(test_file.path(), &ReportConfig::default()).unwrap();

        let first = &dataset.incidents[0];
        assert_eq!(first.event_id, "201001010001");
        assert_eq!(first.related, "201001010002,201001010003");
        assert_eq!(first.date(), NaiveDate::from_ymd_opt(2010, 1, 1));
        assert_eq!(first.tooltip(), "Guwahati, India");
        assert!(first.is_confirmed_terrorism());

        // blank nkill counts as zero
        assert_eq!(dataset.incidents[1].kills, 0.0);

        let nepal = dataset.incidents.iter().find(|i| i.country == "Nepal").unwrap();
        assert_eq!(nepal.city, UNKNOWN);
        assert_eq!(nepal.date(), None);
        assert!(!nepal.has_related());
        assert!(!nepal.success);
    }

    #[test]
    fn test_missing_file() {
        let err = load_dataset("does/not/exist.csv", &ReportConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataError>(), Some(DataError::MissingFile(_))));
    }

    #[test]
    fn test_missing_required_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "eventid,iyear,country,latitude,longitude,nkill,nwound").unwrap();
        writeln!(file, "201001010001,2010,India,26.1,91.7,1,0").unwrap();

        let err = load_dataset(file.path(), &ReportConfig::default()).unwrap_err();
        match err.downcast_ref::<DataError>() {
            Some(DataError::MissingColumn(name)) => assert_eq!(name, "related"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_optional_columns_default() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "eventid,iyear,country,latitude,longitude,nkill,nwound,related").unwrap();
        writeln!(file, "201001010001,2010,Bhutan,27.4,89.6,2,3,Unknown").unwrap();

        let dataset = load_dataset(file.path(), &ReportConfig::default()).unwrap();
        let incident = &dataset.incidents[0];
        assert_eq!(incident.group_name, UNKNOWN);
        assert_eq!(incident.casualties, 5.0);
        assert_eq!(incident.crit1, None);
        assert!(!incident.is_confirmed_terrorism());
    }

    #[test]
    fn test_empty_region() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "eventid,iyear,country,latitude,longitude,nkill,nwound,related").unwrap();
        writeln!(file, "201001010001,2010,Iraq,33.3,44.3,2,3,Unknown").unwrap();

        let err = load_dataset(file.path(), &ReportConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataError>(), Some(DataError::EmptyRegion)));
    }
}
