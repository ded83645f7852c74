use chrono::NaiveDate;
use embergrid_core::datastore::ActivityStore;
use embergrid_core::grid::{GridConfig, build};
use embergrid_core::record::ActivityRecord;
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn store_roundtrip_and_grid_build() {
    let temp = tempdir().expect("tempdir");
    let store = ActivityStore::open(temp.path()).expect("open store");

    let mut record = ActivityRecord::new(date(2025, 6, 14), 2);
    record.source = Some("import".to_string());
    store
        .append_records(vec![record, ActivityRecord::new(date(2025, 6, 15), 3)])
        .expect("append records");

    let records = store.load_records().expect("load records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].source.as_deref(), Some("import"));

    let today = date(2025, 6, 15);
    let grid = build(&records, today, &GridConfig::default()).expect("build grid");

    assert_eq!(grid.total_count, 5);
    let last = grid
        .weeks
        .last()
        .and_then(|week| week.iter().flatten().next_back())
        .expect("today's cell");
    assert_eq!(last.date, today);
    assert_eq!(last.count, 3);
}

#[test]
fn appended_duplicates_stay_in_order_and_the_newest_wins() {
    let temp = tempdir().expect("tempdir");
    let store = ActivityStore::open(temp.path()).expect("open store");

    store
        .append_records(vec![ActivityRecord::new(date(2025, 6, 10), 2)])
        .expect("first append");
    let records = store
        .append_records(vec![ActivityRecord::new(date(2025, 6, 10), 5)])
        .expect("second append");

    // Stable sort keeps the later append last for the repeated date.
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].count, 5);

    let grid = build(&records, date(2025, 6, 15), &GridConfig::default()).expect("build grid");
    let cell = grid
        .weeks
        .iter()
        .flat_map(|week| week.iter().flatten())
        .find(|cell| cell.date == date(2025, 6, 10))
        .expect("cell for duplicated date");
    assert_eq!(cell.count, 5);
    assert_eq!(grid.total_count, 5);
}

#[test]
fn unknown_json_fields_survive_the_store() {
    let temp = tempdir().expect("tempdir");
    let store = ActivityStore::open(temp.path()).expect("open store");

    std::fs::write(
        &store.records_path,
        "{\"date\":\"2025-06-01\",\"count\":4,\"repo\":\"embergrid\"}\n",
    )
    .expect("seed records file");

    let records = store.load_records().expect("load records");
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].extra.get("repo").and_then(|v| v.as_str()),
        Some("embergrid")
    );

    store.save_records(&records).expect("save records");
    let reloaded = store.load_records().expect("reload records");
    assert_eq!(reloaded, records);
}
