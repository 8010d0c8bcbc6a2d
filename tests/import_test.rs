use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::tempdir;

use listings_api::db::{self, DatabaseManager};
use listings_api::import::{ImportOptions, Importer};
use listings_api::repository::listings;

const HEADER: &str = "url,price,rooms,city,district,building_type,owner_type,has_parking";

fn write_csv(dir: &Path, name: &str, rows: &[&str]) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    fs::write(&path, content)?;
    Ok(path)
}

fn count(conn: &Connection, table: &str) -> Result<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
}

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/listings.csv")
}

#[test]
fn test_single_row_creates_listing_and_each_dimension() -> Result<()> {
    let dir = tempdir()?;
    let csv = write_csv(dir.path(), "one.csv", &["http://x/1,300000,2,,,,,"])?;
    let mut conn = db::open_in_memory()?;

    let summary = Importer::default().import_file(&mut conn, &csv)?;

    assert_eq!(summary.rows_seen, 1);
    assert_eq!(summary.created, 1);
    for table in ["listing", "location", "building", "owner", "features"] {
        assert_eq!(count(&conn, table)?, 1, "table {table}");
    }

    let stored = listings::find_by_url(&conn, "http://x/1")?.expect("listing stored");
    assert_eq!(stored.price_total_zl, Some(Decimal::from(300_000)));
    assert_eq!(stored.rooms, Some(2));
    Ok(())
}

#[test]
fn test_reimport_with_new_price_updates_in_place() -> Result<()> {
    let dir = tempdir()?;
    let first = write_csv(dir.path(), "first.csv", &["http://x/1,300000,2,Warszawa,Mokotów,blok,prywatny,tak"])?;
    let second = write_csv(dir.path(), "second.csv", &["http://x/1,310000,2,Warszawa,Mokotów,blok,prywatny,tak"])?;
    let mut conn = db::open_in_memory()?;
    let importer = Importer::default();

    importer.import_file(&mut conn, &first)?;
    let summary = importer.import_file(&mut conn, &second)?;

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.created, 0);
    assert_eq!(count(&conn, "listing")?, 1);
    let stored = listings::find_by_url(&conn, "http://x/1")?.expect("listing stored");
    assert_eq!(stored.price_total_zl, Some(Decimal::from(310_000)));
    Ok(())
}

#[test]
fn test_importing_twice_is_idempotent() -> Result<()> {
    let mut conn = db::open_in_memory()?;
    let importer = Importer::default();

    let first = importer.import_file(&mut conn, &fixture())?;
    let listings_after_first = count(&conn, "listing")?;
    let locations_after_first = count(&conn, "location")?;

    let second = importer.import_file(&mut conn, &fixture())?;

    assert_eq!(first.created, 4);
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped, 4);
    assert_eq!(second.dimensions_created.total(), 0);
    assert_eq!(count(&conn, "listing")?, listings_after_first);
    assert_eq!(count(&conn, "location")?, locations_after_first);
    Ok(())
}

#[test]
fn test_fixture_normalizes_polish_formats() -> Result<()> {
    let mut conn = db::open_in_memory()?;
    let summary = Importer::default().import_file(&mut conn, &fixture())?;

    assert_eq!(summary.rows_seen, 5);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].line, 5);
    assert_eq!(summary.failures[0].url, None);

    let first = listings::find_by_url(&conn, "https://example.com/offer/1")?.expect("offer 1");
    assert_eq!(first.price_total_zl, Some(Decimal::from(450_000)));
    assert_eq!(first.price_sqm_zl, Some(Decimal::from(9_000)));
    assert_eq!(first.area, Some(Decimal::from(50)));
    assert_eq!(first.date_posted.map(|d| d.to_string()).as_deref(), Some("2024-01-15"));
    assert_eq!(first.description_text.as_deref(), Some("Jasne mieszkanie"));

    let second = listings::find_by_url(&conn, "https://example.com/offer/2")?.expect("offer 2");
    assert_eq!(second.price_total_zl, Some(Decimal::from_str("620000.50")?));
    assert_eq!(second.area, Some(Decimal::from_str("72.5")?));

    // Unparseable price and date are stored as absent, the row still lands.
    let third = listings::find_by_url(&conn, "https://example.com/offer/3")?.expect("offer 3");
    assert_eq!(third.price_total_zl, None);
    assert_eq!(third.date_posted, None);
    assert_eq!(third.price_sqm_zl, Some(Decimal::from(7_100)));
    assert_eq!(summary.malformed_fields, 2);

    // Offers 1 and 4 share every dimension tuple.
    let fourth = listings::find_by_url(&conn, "https://example.com/offer/4")?.expect("offer 4");
    assert_eq!(first.location_id, fourth.location_id);
    assert_eq!(first.building_id, fourth.building_id);
    assert_eq!(first.owner_id, fourth.owner_id);
    assert_eq!(first.features_id, fourth.features_id);
    assert_eq!(count(&conn, "location")?, 3);
    Ok(())
}

#[test]
fn test_missing_url_is_rejected_and_run_continues() -> Result<()> {
    let dir = tempdir()?;
    let csv = write_csv(
        dir.path(),
        "gaps.csv",
        &[",250000,1,,,,,", "ftp://x/2,260000,1,,,,,", "http://x/3,270000,1,,,,,"],
    )?;
    let mut conn = db::open_in_memory()?;

    let summary = Importer::default().import_file(&mut conn, &csv)?;

    assert_eq!(summary.failed, 2);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.failures[0].line, 2);
    assert_eq!(summary.failures[1].line, 3);
    assert_eq!(summary.failures[1].url.as_deref(), Some("ftp://x/2"));
    assert_eq!(count(&conn, "listing")?, 1);
    // Rejected rows leave no dimension rows behind.
    assert_eq!(count(&conn, "location")?, 1);
    Ok(())
}

#[test]
fn test_malformed_number_keeps_row() -> Result<()> {
    let dir = tempdir()?;
    let csv = write_csv(dir.path(), "bad.csv", &["http://x/1,abc,dwa,,,,,"])?;
    let mut conn = db::open_in_memory()?;

    let summary = Importer::default().import_file(&mut conn, &csv)?;

    assert_eq!(summary.created, 1);
    assert_eq!(summary.malformed_fields, 2);
    let stored = listings::find_by_url(&conn, "http://x/1")?.expect("listing stored");
    assert_eq!(stored.price_total_zl, None);
    assert_eq!(stored.rooms, None);
    Ok(())
}

#[test]
fn test_header_with_only_url_column() -> Result<()> {
    let mut conn = db::open_in_memory()?;
    let summary = Importer::default().import_reader(&mut conn, "url\nhttps://example.com/a\n".as_bytes())?;
    assert_eq!(summary.created, 1);
    assert_eq!(count(&conn, "owner")?, 1);
    Ok(())
}

#[test]
fn test_storage_failure_aborts_and_rolls_back_batch() -> Result<()> {
    let dir = tempdir()?;
    let csv = write_csv(dir.path(), "rows.csv", &["http://x/1,1,1,,,,,", "http://x/2,2,1,,,,,"])?;
    let mut conn = db::open_in_memory()?;
    conn.execute_batch("DROP TABLE listing;")?;

    let result = Importer::new(ImportOptions { batch_size: 0 }).import_file(&mut conn, &csv);

    assert!(result.is_err());
    assert_eq!(count(&conn, "location")?, 0);
    Ok(())
}

#[test]
fn test_file_database_persists_between_connections() -> Result<()> {
    let dir = tempdir()?;
    let csv = write_csv(dir.path(), "one.csv", &["http://x/1,300000,2,,,,,"])?;
    let manager = DatabaseManager::new(dir.path().join("listings.db"));
    manager.run_migrations()?;

    {
        let mut conn = manager.get_connection()?;
        Importer::new(ImportOptions { batch_size: 1 }).import_file(&mut conn, &csv)?;
    }

    let conn = manager.get_connection()?;
    assert_eq!(listings::count(&conn)?, 1);
    Ok(())
}

#[test]
fn test_uppercase_header_imports_rows() -> Result<()> {
    let mut conn = db::open_in_memory()?;
    let csv = "URL,Price,City\nhttp://x/1,450 000 zł,Warszawa\n";

    let summary = Importer::default().import_reader(&mut conn, csv.as_bytes())?;

    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed, 0);
    let stored = listings::find_by_url(&conn, "http://x/1")?.expect("listing stored");
    assert_eq!(stored.price_total_zl, Some(Decimal::from(450_000)));
    Ok(())
}

#[test]
fn test_conflicting_header_fails_before_any_row() -> Result<()> {
    let mut conn = db::open_in_memory()?;
    let csv = "url,price,price_total_zl\nhttp://x/1,1,2\nhttp://x/2,3,4\n";

    let result = Importer::default().import_reader(&mut conn, csv.as_bytes());

    assert!(result.is_err());
    assert_eq!(count(&conn, "listing")?, 0);
    assert_eq!(count(&conn, "location")?, 0);
    Ok(())
}
