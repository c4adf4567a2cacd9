// ==========================================
// SQLite persistence tests
// ==========================================
// Goal: ledger, trips, aliases and configuration survive a reopen of the
// same database file; trips and batch commit together; the composite key is
// enforced by the database; live reservations survive another open
// ==========================================


use chrono::{Duration, Utc};
use nemt_trip_import::config::config_keys;
use nemt_trip_import::repository::{
    CommitOutcome, ImportLedger, Reservation, SqliteImportLedger, SqliteTripStore, TripStore,
};
use nemt_trip_import::{
    logging, ActualImportService, BatchStatus, ConfigManager, ImportBatch, MobilityType,
    StaticImportConfig, TripFilter, TripRecord,
};
use test_helpers::*;

fn trip(trip_id: &str, batch_id: &str, source_row: usize) -> TripRecord {
    let partition = main_partition();
    TripRecord {
        trip_id: trip_id.to_string(),
        service_date: service_date(),
        opco_id: partition.opco_id,
        broker_id: partition.broker_id,
        broker_account_id: partition.broker_account_id,
        driver_name: "Driver A".to_string(),
        vehicle_unit: Some("VAN-12".to_string()),
        mobility_type: MobilityType::Other("Bariatric".to_string()),
        routed_distance: Some(12.25),
        batch_id: batch_id.to_string(),
        source_row,
        imported_at: Utc::now(),
    }
}

fn batch(batch_id: &str, file_hash: &str) -> ImportBatch {
    ImportBatch {
        batch_id: batch_id.to_string(),
        file_name: format!("{}.csv", batch_id),
        file_hash: file_hash.to_string(),
        partition: main_partition(),
        status: BatchStatus::Committed,
        received_at: Utc::now(),
        committed_at: Some(Utc::now()),
        expected_rows: 2,
        imported_rows: 2,
        skipped_rows: 0,
        error_rows: 0,
        extracted_columns: Vec::new(),
        ignored_columns: Vec::new(),
        errors: Vec::new(),
        elapsed_ms: 0,
    }
}

#[tokio::test]
async fn test_commit_enforces_composite_key_atomically() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let ledger = SqliteImportLedger::new(&db_path).expect("Failed to open ledger");
    let store = SqliteTripStore::new(&db_path).expect("Failed to open store");

    ledger.reserve("h1", "b1").await.unwrap();
    let first = ledger
        .commit(batch("b1", "h1"), vec![trip("T1", "b1", 1), trip("T2", "b1", 2)])
        .await
        .unwrap();
    assert_eq!(first, CommitOutcome::Committed);

    ledger.reserve("h2", "b2").await.unwrap();
    let second = ledger
        .commit(batch("b2", "h2"), vec![trip("T2", "b2", 1), trip("T3", "b2", 2)])
        .await
        .unwrap();
    assert_eq!(
        second,
        CommitOutcome::KeyConflict(vec![trip("T2", "b2", 1).key()])
    );

    // nothing of the conflicting commit was written
    assert_eq!(store.count().await.unwrap(), 2);
    assert!(store.find_by_batch("b2").await.unwrap().is_empty());
    assert!(ledger.find_by_id("b2").await.unwrap().is_none());

    let retried = ledger
        .commit(batch("b2", "h2"), vec![trip("T3", "b2", 2)])
        .await
        .unwrap();
    assert_eq!(retried, CommitOutcome::Committed);
    assert_eq!(store.count().await.unwrap(), 3);
    assert_eq!(ledger.find_by_id("b2").await.unwrap().unwrap().batch_id, "b2");

    let stored = store
        .find_by_date(service_date(), &TripFilter::by_broker_account("MTM_MAIN"))
        .await
        .unwrap();
    let t1 = stored.iter().find(|t| t.trip_id == "T1").unwrap();
    assert_eq!(t1.mobility_type, MobilityType::Other("Bariatric".to_string()));
    assert_eq!(t1.vehicle_unit.as_deref(), Some("VAN-12"));
    assert_eq!(t1.routed_distance, Some(12.25));
}

#[tokio::test]
async fn test_commit_without_reservation_writes_no_trips() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let ledger = SqliteImportLedger::new(&db_path).expect("Failed to open ledger");
    let store = SqliteTripStore::new(&db_path).expect("Failed to open store");

    let result = ledger
        .commit(batch("b1", "h1"), vec![trip("T1", "b1", 1)])
        .await;

    assert!(result.is_err());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ledger_survives_reopen() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let content = trip_csv(&[("T1", "2025-01-15", "Driver A", "1.0")]);

    {
        let service = ActualImportService::open_sqlite(&db_path, StaticImportConfig::new())
            .expect("Failed to open service");
        let result = service
            .import_csv(&content, "day.csv", Some(main_partition()))
            .await
            .unwrap();
        assert!(result.success);
    }

    let reopened = ActualImportService::open_sqlite(&db_path, StaticImportConfig::new())
        .expect("Failed to reopen service");
    let again = reopened
        .import_csv(&content, "day.csv", Some(sahrawi_partition()))
        .await
        .unwrap();
    assert!(!again.success);
    assert!(again.errors[0].message.contains("already imported"));

    let trips = reopened
        .get_actual_trips_by_date(service_date(), &TripFilter::default())
        .await
        .unwrap();
    assert_eq!(trips.len(), 1);
    assert_eq!(trips[0].opco_id, "MAIN");
}

#[tokio::test]
async fn test_live_reservation_survives_second_open() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let holder = SqliteImportLedger::new(&db_path).expect("Failed to open ledger");
    assert_eq!(
        holder.reserve("h", "batch-a").await.unwrap(),
        Reservation::Reserved
    );

    // a second process opens the same database while batch-a is validating
    let other = ActualImportService::open_sqlite(&db_path, StaticImportConfig::new())
        .expect("Failed to open service");
    drop(other);
    let second = SqliteImportLedger::new(&db_path).expect("Failed to open ledger");

    assert_eq!(
        second.reserve("h", "batch-b").await.unwrap(),
        Reservation::AlreadyImported {
            batch_id: "batch-a".to_string()
        }
    );

    // the holder can still commit its reservation
    let outcome = holder
        .commit(batch("batch-a", "h"), vec![trip("T1", "batch-a", 1)])
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Committed);
}

#[tokio::test]
async fn test_expired_reservation_is_taken_over() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    {
        let ledger = SqliteImportLedger::new(&db_path).expect("Failed to open ledger");
        // reservation left behind by a process that died mid-import
        assert_eq!(
            ledger.reserve("abc123", "crashed-batch").await.unwrap(),
            Reservation::Reserved
        );
    }

    // within the lease the reservation still blocks
    let ledger = SqliteImportLedger::new(&db_path).expect("Failed to reopen ledger");
    assert!(matches!(
        ledger.reserve("abc123", "other-batch").await.unwrap(),
        Reservation::AlreadyImported { .. }
    ));

    let ledger = ledger.with_reservation_lease(Duration::zero());
    assert_eq!(ledger.purge_stale_reservations().unwrap(), 1);
    assert_eq!(
        ledger.reserve("abc123", "fresh-batch").await.unwrap(),
        Reservation::Reserved
    );
    // an uncommitted reservation never shows up as history
    assert!(ledger.find_by_hash("abc123").await.unwrap().is_none());

    // the crashed holder can no longer commit anything
    let store = SqliteTripStore::new(&db_path).expect("Failed to open store");
    assert!(ledger
        .commit(batch("crashed-batch", "abc123"), vec![trip("T1", "crashed-batch", 1)])
        .await
        .is_err());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_driver_aliases_survive_reopen() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    {
        let service = ActualImportService::open_sqlite(&db_path, StaticImportConfig::new())
            .expect("Failed to open service");
        service.add_driver_alias("John Smith", "Johnny S").unwrap();
        service
            .import_csv(
                &trip_csv(&[("T1", "2025-01-15", "JOHN SMITH", "1.0")]),
                "a.csv",
                Some(main_partition()),
            )
            .await
            .unwrap();
    }

    let reopened = ActualImportService::open_sqlite(&db_path, StaticImportConfig::new())
        .expect("Failed to reopen service");
    assert_eq!(
        reopened.get_canonical_driver_name("johnny s").unwrap(),
        "John Smith"
    );
    assert_eq!(
        reopened.get_driver_aliases("John Smith").unwrap(),
        vec!["JOHN SMITH", "John Smith", "Johnny S"]
    );

    let trips = reopened
        .get_actual_trips_by_driver_and_date("Johnny S", service_date())
        .await
        .unwrap();
    assert_eq!(trips.len(), 1);
    assert_eq!(trips[0].driver_name, "John Smith");
}

#[tokio::test]
async fn test_default_partition_from_stored_config() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let config = ConfigManager::new(&db_path).expect("Failed to open config");
    config
        .set_config_value(config_keys::DEFAULT_OPCO_ID, "SAHRAWI")
        .unwrap();
    config
        .set_config_value(config_keys::DEFAULT_BROKER_ID, "MODIVCARE")
        .unwrap();
    drop(config);

    let service = ActualImportService::open_sqlite_with_stored_config(&db_path)
        .expect("Failed to open service");
    let result = service
        .import_csv(
            &trip_csv(&[("T1", "2025-01-15", "Driver A", "1.0")]),
            "defaulted.csv",
            None,
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.opco_id, "SAHRAWI");
    assert_eq!(result.broker_account_id, "MODIVCARE_SAHRAWI");
}

#[tokio::test]
async fn test_stored_header_synonyms_extend_allowlist() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let config = ConfigManager::new(&db_path).expect("Failed to open config");
    config
        .set_config_value(
            config_keys::EXTRA_HEADER_SYNONYMS,
            r#"{"driver": ["Chauffeur"]}"#,
        )
        .unwrap();
    drop(config);

    let service = ActualImportService::open_sqlite_with_stored_config(&db_path)
        .expect("Failed to open service");
    let result = service
        .import_csv(
            "Trip ID,Date,Chauffeur\nT1,2025-01-15,Driver A\n",
            "vendor.csv",
            Some(main_partition()),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.extracted_columns, vec!["Trip ID", "Date", "Chauffeur"]);
    assert_eq!(result.imported_rows, 1);
}
