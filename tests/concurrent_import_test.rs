// ==========================================
// Concurrent import tests
// ==========================================
// Goal: identical submissions race on the content hash and exactly one wins;
// batch import of independent files commits each file once
// ==========================================


use futures::future::join_all;
use nemt_trip_import::{logging, BatchStatus, ImportFilter, TripFilter};
use std::sync::Arc;
use std::time::Instant;
use test_helpers::*;

#[tokio::test]
async fn test_identical_submissions_commit_once_in_memory() {
    logging::init_test();
    let service = memory_service();
    let content = trip_csv(&[
        ("T1", "2025-01-15", "Driver A", "1.0"),
        ("T2", "2025-01-15", "Driver A", "2.0"),
    ]);

    let attempts = (0..8).map(|i| {
        let name = format!("copy-{}.csv", i);
        let content = content.clone();
        let service = &service;
        async move { service.import_csv(&content, &name, Some(main_partition())).await }
    });
    let results = join_all(attempts).await;

    let committed: Vec<_> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .filter(|r| r.success)
        .collect();
    let rejected = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .filter(|r| r.status == BatchStatus::HashRejected)
        .count();

    assert_eq!(committed.len(), 1);
    assert_eq!(rejected, 7);
    assert_eq!(committed[0].imported_rows, 2);

    let trips = service
        .get_actual_trips_by_date(service_date(), &TripFilter::default())
        .await
        .unwrap();
    assert_eq!(trips.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_identical_submissions_commit_once_sqlite() {
    logging::init_test();
    let (_temp_file, _db_path, service) = sqlite_service().expect("Failed to open service");
    let service = Arc::new(service);
    let content = Arc::new(trip_csv(&[("T1", "2025-01-15", "Driver A", "1.0")]));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let service = service.clone();
            let content = content.clone();
            tokio::spawn(async move {
                service
                    .import_csv(&content, &format!("race-{}.csv", i), Some(main_partition()))
                    .await
            })
        })
        .collect();

    let mut committed = 0;
    let mut rejected = 0;
    for handle in handles {
        let result = handle.await.expect("task panicked").expect("import failed");
        if result.success {
            committed += 1;
        } else {
            assert!(result.errors[0].message.contains("already imported"));
            rejected += 1;
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(rejected, 5);

    let imports = service.get_imports(&ImportFilter::default()).await.unwrap();
    assert_eq!(imports.len(), 1);
}

#[tokio::test]
async fn test_batch_import_multiple_files() {
    logging::init_test();
    let (_temp_file, _db_path, service) = sqlite_service().expect("Failed to open service");

    let files = vec![
        fixture_path("trips_2025_01_15.csv"),
        fixture_path("trips_2025_01_16.csv"),
    ];

    let start = Instant::now();
    let results = service.batch_import(files, Some(main_partition())).await;
    let elapsed = start.elapsed();
    tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "batch import done");

    assert_eq!(results.len(), 2);
    for result in &results {
        let result = result.as_ref().expect("file import failed");
        assert!(result.success);
        assert!(result.is_complete);
        assert_eq!(result.error_rows, 0);
    }
    assert_eq!(results[0].as_ref().unwrap().imported_rows, 3);
    assert_eq!(results[1].as_ref().unwrap().imported_rows, 2);

    // "John Smith" and "john smith" are one driver
    let summary = service
        .get_driver_summary_by_date(service_date(), &TripFilter::default())
        .await
        .unwrap();
    assert_eq!(summary.len(), 2);
    let john = summary
        .iter()
        .find(|s| s.driver_name == "John Smith")
        .expect("John Smith missing");
    assert_eq!(john.completed_trips, 2);
    assert!((john.total_miles - 14.7).abs() < 1e-9);
}

#[tokio::test]
async fn test_batch_import_reports_missing_file_without_aborting() {
    logging::init_test();
    let service = memory_service();

    let files = vec![
        fixture_path("does_not_exist.csv"),
        fixture_path("trips_2025_01_16.csv"),
    ];
    let results = service.batch_import(files, Some(main_partition())).await;

    assert!(results[0].is_err());
    assert!(results[0].as_ref().unwrap_err().contains("does_not_exist.csv"));
    assert!(results[1].as_ref().unwrap().success);
}

#[tokio::test]
async fn test_same_file_twice_in_one_batch() {
    logging::init_test();
    let service = memory_service();

    let files = vec![
        fixture_path("trips_2025_01_15.csv"),
        fixture_path("trips_2025_01_15.csv"),
    ];
    let results = service.batch_import(files, Some(main_partition())).await;

    let committed = results
        .iter()
        .filter(|r| matches!(r, Ok(res) if res.success))
        .count();
    assert_eq!(committed, 1);
}
