//! Integration tests for gtd-atlas

use gtd_atlas::aggregate::{overview, top_perpetrators};
use gtd_atlas::config::ImageFormat;
use gtd_atlas::filter::{available_years, geo_points, select};
use gtd_atlas::{
    cluster_incidents, generate_report, load_dataset, year_country_stats, Attribute,
    ClusterMode, Criterion, DataError, ReportConfig, ReportRequest, Selection,
};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

const HEADER: &str = "eventid,iyear,imonth,iday,country,province,city,latitude,longitude,gname,targettype,weaptype,attacktype,alternative_attack_type,crit1,crit2,crit3,doubtterr,success,nkill,nwound,casualties,related";

/// Create a test CSV file with sample incidents
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();

    // Three coordinated bombings listing each other
    writeln!(file, "200807260001,2008,7,26,India,Gujarat,Ahmedabad,23.02,72.57,Indian Mujahideen,Private Citizens & Property,Explosives,Bombing/Explosion,,1,1,1,0,1,10,40,50,\"200807260002, 200807260003\"").unwrap();
    writeln!(file, "200807260002,2008,7,26,India,Gujarat,Ahmedabad,23.03,72.58,Indian Mujahideen,Private Citizens & Property,Explosives,Bombing/Explosion,,1,1,1,0,1,8,30,38,\"200807260001,200807260003\"").unwrap();
    writeln!(file, "200807260003,2008,7,26,India,Gujarat,Ahmedabad,23.01,72.56,Indian Mujahideen,Business,Explosives,Bombing/Explosion,,1,1,1,0,1,2,10,12,\"200807260002,200807260001\"").unwrap();

    // A chain: the first lists only the second, the second lists both
    writeln!(file, "200901050001,2009,1,5,Pakistan,Sindh,Karachi,24.86,67.01,Tehrik-i-Taliban Pakistan (TTP),Police,Firearms,Armed Assault,,1,1,1,0,1,1,2,3,200901050002").unwrap();
    writeln!(file, "200901050002,2009,1,5,Pakistan,Sindh,Karachi,24.87,67.02,Tehrik-i-Taliban Pakistan (TTP),Police,Firearms,Armed Assault,,1,1,1,0,1,0,1,1,\"200901050001,200901050003\"").unwrap();

    // Unrelated incidents
    writeln!(file, "200903100001,2009,3,10,Sri Lanka,Northern,Jaffna,9.66,80.02,Liberation Tigers of Tamil Eelam (LTTE),Military,Explosives,Bombing/Explosion,Insurgency/Guerilla Action,1,0,0,1,1,4,6,10,Unknown").unwrap();
    writeln!(file, "200904010001,2009,4,1,Afghanistan,Kabul,Kabul,34.53,69.17,Taliban,Government (General),Firearms,Armed Assault,Insurgency/Guerilla Action,1,1,0,1,0,0,0,0,Unknown").unwrap();
    writeln!(file, "200905050001,2009,5,5,Syria,Damascus,Damascus,33.51,36.29,Unknown,Military,Explosives,Bombing/Explosion,,1,1,1,0,1,3,3,6,Unknown").unwrap();

    file
}

#[test]
fn test_full_pipeline() {
    let test_file = create_test_csv();
    let config = ReportConfig::default();

    // Load and filter to the region
    let dataset = load_dataset(test_file.path(), &config).unwrap();
    assert_eq!(dataset.len(), 7);
    assert!(dataset.incidents.iter().all(|i| config.in_region(&i.country)));

    // Exact clustering keeps the chain apart
    let clusters = cluster_incidents(&dataset.incidents, ClusterMode::Exact);
    assert_eq!(clusters.cluster_count(), 3);
    assert_eq!(clusters.label(0), Some(0));
    assert_eq!(clusters.label(1), Some(0));
    assert_eq!(clusters.label(2), Some(0));
    assert_eq!(clusters.label(3), Some(1));
    assert_eq!(clusters.label(4), Some(2));
    assert_eq!(clusters.label(5), None);
    assert_eq!(clusters.label(6), None);
    assert_eq!(clusters.clustered_records(), 5);
    // two unrelated incidents plus three clusters
    assert_eq!(clusters.distinct_events(), 5);

    // Statistics per year and country
    let stats = year_country_stats(&dataset).unwrap();
    let india = stats
        .iter()
        .find(|s| s.year == 2008 && s.country == "India")
        .unwrap();
    assert_eq!(india.incidents, 3);
    assert_eq!(india.kills, 20.0);
    assert_eq!(india.wounded, 80.0);
    assert_eq!(india.fatality_ratio, 0.198);

    let summary = overview(&dataset.incidents);
    assert_eq!(summary.incidents, 7);
    assert_eq!(summary.confirmed, 5);
    assert_eq!(summary.doubtful, 2);

    let groups = top_perpetrators(&dataset.incidents, 2);
    assert_eq!(groups[0].name, "Indian Mujahideen");
    assert_eq!(groups[0].incidents, 3);
}

#[test]
fn test_transitive_clustering_merges_chain() {
    let test_file = create_test_csv();
    let dataset = load_dataset(test_file.path(), &ReportConfig::default()).unwrap();

    let clusters = cluster_incidents(&dataset.incidents, ClusterMode::Transitive);
    assert_eq!(clusters.cluster_count(), 2);
    assert_eq!(clusters.label(3), clusters.label(4));
    assert_ne!(clusters.label(0), clusters.label(3));
    // two unrelated incidents plus the two merged clusters
    assert_eq!(clusters.distinct_events(), 4);
}

#[test]
fn test_map_selection() {
    let test_file = create_test_csv();
    let config = ReportConfig::default();
    let dataset = load_dataset(test_file.path(), &config).unwrap();
    let clusters = cluster_incidents(&dataset.incidents, ClusterMode::Exact);

    assert_eq!(available_years(&dataset.incidents, &clusters), vec![2008, 2009]);

    let related = geo_points(&dataset.incidents, &clusters, true, false);

    let selection = Selection::new("India", 2008, &config).unwrap();
    let points = select(&related, &selection);
    assert_eq!(points.len(), 3);
    assert_eq!(points[0].tooltip, "Ahmedabad, India");

    let deduped = geo_points(&dataset.incidents, &clusters, true, true);
    assert_eq!(select(&deduped, &selection).len(), 1);

    let err = Selection::new("Syria", 2009, &config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DataError>(),
        Some(DataError::UnknownCountry(_))
    ));
}

#[test]
fn test_report_generation() {
    let test_file = create_test_csv();
    let config = ReportConfig {
        image_format: ImageFormat::Svg,
        chart_width: 640,
        chart_height: 480,
        ..ReportConfig::default()
    };
    let dataset = load_dataset(test_file.path(), &config).unwrap();
    let clusters = cluster_incidents(&dataset.incidents, ClusterMode::Exact);

    let request = ReportRequest {
        attribute: Attribute::AlternativeAttackType,
        criterion: Criterion::Coercion,
        selection: Selection::new("Sri Lanka", 2009, &config).unwrap(),
        dedupe: false,
    };

    let output_dir = tempdir().unwrap();
    let written =
        generate_report(&dataset, &clusters, &request, &config, output_dir.path()).unwrap();

    assert_eq!(written.len(), 7);
    for path in &written {
        assert!(path.exists(), "missing chart {}", path.display());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("svg"));
    }
    assert!(output_dir
        .path()
        .join("frequency_alternative_attack_type.svg")
        .exists());
    // no related incidents in the selection still renders a blank map
    assert!(output_dir.path().join("density_sri_lanka_2009.svg").exists());
}
