use chrono::NaiveDate;
use site_distributor::{
    CsvSiteSource, PersistenceError, Schedule, ScheduleBuilder, Site, SiteId, SiteSource,
    load_schedule_from_json, save_schedule_to_csv, save_schedule_to_json, save_summary_to_json,
};
use std::fs;
use tempfile::{NamedTempFile, tempdir};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sample_schedule(n: i64) -> Schedule {
    let sites: Vec<Site> = (1..=n)
        .map(|id| Site::new(id).with_url(format!("https://site{id}.example")))
        .collect();
    ScheduleBuilder::new(d(2025, 1, 20))
        .build_from_sites(sites)
        .unwrap()
}

#[test]
fn json_save_and_load_preserves_schedule() {
    let schedule = sample_schedule(47);
    let tmp = NamedTempFile::new().unwrap();

    save_schedule_to_json(&schedule, tmp.path()).unwrap();
    let loaded = load_schedule_from_json(tmp.path()).unwrap();

    assert_eq!(loaded, schedule);
    assert_eq!(
        loaded.day(1).unwrap().sites()[0].site_url.as_deref(),
        Some("https://site1.example")
    );
}

#[test]
fn summary_file_lists_counts_only() {
    let schedule = sample_schedule(25);
    let tmp = NamedTempFile::new().unwrap();

    save_summary_to_json(&schedule.summary(), tmp.path()).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path()).unwrap()).unwrap();

    assert_eq!(value["total_sites"], 25);
    assert_eq!(value["days"], 21);
    assert_eq!(value["summary"]["day_1"]["sites_count"], 2);
    assert_eq!(value["summary"]["day_5"]["sites_count"], 1);
    assert_eq!(value["summary"]["day_13"]["date"], "2025-02-01");
    assert_eq!(value["summary"]["day_13"]["day_of_week"], "Saturday");
}

#[test]
fn tampered_document_is_rejected_on_load() {
    let schedule = sample_schedule(21);
    let mut value = serde_json::to_value(&schedule).unwrap();
    value["schedule"]["day_3"]["date"] = serde_json::json!("2025-03-01");

    let tmp = NamedTempFile::new().unwrap();
    fs::write(tmp.path(), serde_json::to_vec(&value).unwrap()).unwrap();

    let err = load_schedule_from_json(tmp.path()).unwrap_err();
    assert!(matches!(err, PersistenceError::Serialization(_)), "{err}");
}

#[test]
fn document_with_wrong_total_is_rejected() {
    let schedule = sample_schedule(21);
    let mut value = serde_json::to_value(&schedule).unwrap();
    value["total_sites"] = serde_json::json!(22);

    let result: Result<Schedule, _> = serde_json::from_value(value);
    assert!(result.is_err());
}

#[test]
fn csv_export_writes_one_line_per_assignment() {
    let schedule = sample_schedule(23);
    let tmp = NamedTempFile::new().unwrap();

    save_schedule_to_csv(&schedule, tmp.path()).unwrap();
    let contents = fs::read_to_string(tmp.path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();

    assert_eq!(lines[0], "day,date,day_of_week,site_id,site_url,site_name");
    assert_eq!(lines.len(), 24);
    assert_eq!(lines[1], "1,2025-01-20,Monday,1,https://site1.example,");
    assert_eq!(lines[3], "2,2025-01-21,Tuesday,3,https://site3.example,");
}

#[test]
fn csv_site_source_reads_rows_in_file_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sites.csv");
    fs::write(
        &path,
        "site_id,site_url,site_name,status\n\
         30,https://c.example,Gamma,1\n\
         10,https://a.example,,\n\
         abc-7,,Seven,1\n",
    )
    .unwrap();

    let sites = CsvSiteSource::new(&path).fetch_sites().unwrap();
    assert_eq!(sites.len(), 3);
    assert_eq!(sites[0].site_id, SiteId::Int(30));
    assert_eq!(sites[0].site_name.as_deref(), Some("Gamma"));
    assert_eq!(sites[0].status, Some(1));
    assert_eq!(sites[1].site_id, SiteId::Int(10));
    assert_eq!(sites[1].site_name, None);
    assert_eq!(sites[1].status, None);
    assert_eq!(sites[2].site_id, SiteId::Text("abc-7".into()));
}

#[test]
fn csv_site_ids_keep_leading_zeros() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sites.csv");
    fs::write(&path, "site_id\n007\n7\n").unwrap();

    let sites = CsvSiteSource::new(&path).fetch_sites().unwrap();
    assert_eq!(sites[0].site_id, SiteId::Text("007".into()));
    assert_eq!(sites[1].site_id, SiteId::Int(7));

    let schedule = ScheduleBuilder::new(d(2025, 1, 20))
        .build_from_sites(sites)
        .unwrap();
    let listed: Vec<SiteId> = schedule
        .rows()
        .into_iter()
        .flat_map(|row| row.list_sites)
        .collect();
    assert_eq!(listed, vec![SiteId::Text("007".into()), SiteId::Int(7)]);
}

#[test]
fn csv_site_source_requires_site_id() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sites.csv");
    fs::write(&path, "site_id,site_url\n,https://a.example\n").unwrap();

    let err = CsvSiteSource::new(&path).fetch_sites().unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidData(_)));
}

#[test]
fn missing_site_file_is_an_error() {
    let dir = tempdir().unwrap();
    let source = CsvSiteSource::new(dir.path().join("absent.csv"));
    assert!(source.fetch_sites().is_err());
}
