// ==========================================
// Import pipeline integration tests
// ==========================================
// Full runs against a temp exchange tree and a file-backed store,
// driven through the public pipeline entry points.
// ==========================================

mod helpers;

use helpers::{meter_feed_line, ExchangeHarness};
use sap_meter_exchange::repository::{MeterRepository, UserRepository};
use sap_meter_exchange::{EntityKind, LockManager, RecordStatus, SourceTier};
use std::fs;

#[tokio::test]
async fn test_full_meter_import_flow() {
    let harness = ExchangeHarness::new();
    let feed = format!(
        "{}\n{}\n",
        meter_feed_line("MTR-1", "Acme", "A"),
        meter_feed_line("MTR-2", "Globex", "A"),
    );
    harness.write_feed(
        SourceTier::Production,
        EntityKind::Meter,
        "METER_LIST.csv",
        &feed,
    );

    let report = harness.import_pipeline().import_meters().await.unwrap();
    assert!(report.success);
    assert!(!report.skipped);
    assert_eq!(report.source_tier, Some(SourceTier::Production));
    assert_eq!(report.files, vec!["METER_LIST.csv"]);
    assert_eq!(report.created, 2);
    assert_eq!(report.updated, 0);
    assert_eq!(report.deactivated, 0);
    assert!(report.errors.is_empty());

    let meters = harness.meters();
    let mtr1 = meters.find_by_code("MTR-1").await.unwrap().unwrap();
    assert_eq!(mtr1.customer_name.as_deref(), Some("Acme"));
    assert_eq!(mtr1.status, RecordStatus::Active);
    assert_eq!(mtr1.measuring_point, 7);

    // The processed file moved out of the source directory
    let source_dir = harness.feed_dir(SourceTier::Production, EntityKind::Meter);
    assert!(fs::read_dir(&source_dir).unwrap().next().is_none());
    assert!(harness
        .archive_dir(EntityKind::Meter)
        .join("METER_LIST.csv")
        .exists());
}

#[tokio::test]
async fn test_reimport_creates_and_updates() {
    let harness = ExchangeHarness::new();
    let pipeline = harness.import_pipeline();

    harness.write_feed(
        SourceTier::Production,
        EntityKind::Meter,
        "METER_LIST.csv",
        &format!("{}\n", meter_feed_line("MTR-1", "Acme", "A")),
    );
    pipeline.import_meters().await.unwrap();

    // Next feed: MTR-1 changed, MTR-2 and MTR-3 new
    let feed = format!(
        "{}\n{}\n{}\n",
        meter_feed_line("MTR-1", "Initech", "A"),
        meter_feed_line("MTR-2", "Globex", "A"),
        meter_feed_line("MTR-3", "Hooli", "A"),
    );
    harness.write_feed(
        SourceTier::Production,
        EntityKind::Meter,
        "METER_LIST.csv",
        &feed,
    );
    let report = pipeline.import_meters().await.unwrap();
    assert_eq!(report.created, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.deactivated, 0);

    let mtr1 = harness
        .meters()
        .find_by_code("MTR-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mtr1.customer_name.as_deref(), Some("Initech"));
}

#[tokio::test]
async fn test_staging_tier_wins_over_production() {
    let harness = ExchangeHarness::new();
    harness.write_feed(
        SourceTier::Staging,
        EntityKind::Meter,
        "METER_LIST.csv",
        &format!("{}\n", meter_feed_line("MTR-STAGE", "Acme", "A")),
    );
    harness.write_feed(
        SourceTier::Production,
        EntityKind::Meter,
        "METER_LIST.csv",
        &format!("{}\n", meter_feed_line("MTR-PROD", "Acme", "A")),
    );

    let report = harness.import_pipeline().import_meters().await.unwrap();
    assert_eq!(report.source_tier, Some(SourceTier::Staging));

    let meters = harness.meters();
    assert!(meters.find_by_code("MTR-STAGE").await.unwrap().is_some());
    assert!(meters.find_by_code("MTR-PROD").await.unwrap().is_none());

    // The losing tier is untouched
    let prod_dir = harness.feed_dir(SourceTier::Production, EntityKind::Meter);
    assert!(prod_dir.join("METER_LIST.csv").exists());
}

#[tokio::test]
async fn test_empty_run_does_not_deactivate() {
    let harness = ExchangeHarness::new();
    let pipeline = harness.import_pipeline();

    harness.write_feed(
        SourceTier::Production,
        EntityKind::Meter,
        "METER_LIST.csv",
        &format!("{}\n", meter_feed_line("MTR-1", "Acme", "A")),
    );
    pipeline.import_meters().await.unwrap();

    // No feed files this cycle: the run is a successful no-op and the
    // absence policy must not fire.
    let report = pipeline.import_meters().await.unwrap();
    assert!(report.success);
    assert_eq!(report.deactivated, 0);

    let mtr1 = harness
        .meters()
        .find_by_code("MTR-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mtr1.status, RecordStatus::Active);
}

#[tokio::test]
async fn test_absent_meter_deactivated_on_next_feed() {
    let harness = ExchangeHarness::new();
    let pipeline = harness.import_pipeline();

    let feed = format!(
        "{}\n{}\n",
        meter_feed_line("MTR-1", "Acme", "A"),
        meter_feed_line("MTR-2", "Acme", "A"),
    );
    harness.write_feed(
        SourceTier::Production,
        EntityKind::Meter,
        "METER_LIST.csv",
        &feed,
    );
    pipeline.import_meters().await.unwrap();

    harness.write_feed(
        SourceTier::Production,
        EntityKind::Meter,
        "METER_LIST.csv",
        &format!("{}\n", meter_feed_line("MTR-1", "Acme", "A")),
    );
    let report = pipeline.import_meters().await.unwrap();
    assert_eq!(report.deactivated, 1);

    let mtr2 = harness
        .meters()
        .find_by_code("MTR-2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mtr2.status, RecordStatus::Inactive);
}

#[tokio::test]
async fn test_feed_without_any_identifier_does_not_deactivate() {
    let harness = ExchangeHarness::new();
    let pipeline = harness.import_pipeline();

    let feed = format!(
        "{}\n{}\n",
        meter_feed_line("MTR-1", "Acme", "A"),
        meter_feed_line("MTR-2", "Acme", "A"),
    );
    harness.write_feed(
        SourceTier::Production,
        EntityKind::Meter,
        "METER_LIST.csv",
        &feed,
    );
    pipeline.import_meters().await.unwrap();

    // Parseable feed, but a leading delimiter shifts every line so no
    // row carries a meter code. The absence pass must not treat this
    // as "every meter is gone".
    harness.write_feed(
        SourceTier::Production,
        EntityKind::Meter,
        "METER_LIST.csv",
        ";SN-1;S1;Acme;C-100;7;BE1;CO1;A\n;SN-2;S2;Acme;C-101;8;BE1;CO1;A\n",
    );
    let report = pipeline.import_meters().await.unwrap();
    assert!(report.success);
    assert_eq!(report.deactivated, 0);
    assert_eq!(report.errors.len(), 2);

    let meters = harness.meters();
    for code in ["MTR-1", "MTR-2"] {
        let meter = meters.find_by_code(code).await.unwrap().unwrap();
        assert_eq!(meter.status, RecordStatus::Active);
    }
}

#[tokio::test]
async fn test_malformed_file_stays_and_run_continues() {
    let harness = ExchangeHarness::new();
    // Invalid UTF-8, unreadable as CSV text
    harness.write_feed_bytes(
        SourceTier::Production,
        EntityKind::Meter,
        "A_BROKEN.csv",
        &[0xff, 0xfe, 0x00, 0x3b, 0xff],
    );
    harness.write_feed(
        SourceTier::Production,
        EntityKind::Meter,
        "B_GOOD.csv",
        &format!("{}\n", meter_feed_line("MTR-1", "Acme", "A")),
    );

    let report = harness.import_pipeline().import_meters().await.unwrap();
    assert!(report.success);
    assert_eq!(report.created, 1);
    assert_eq!(report.files, vec!["B_GOOD.csv"]);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("malformed file"));

    // The broken file stays for inspection; the good one is archived
    let source_dir = harness.feed_dir(SourceTier::Production, EntityKind::Meter);
    assert!(source_dir.join("A_BROKEN.csv").exists());
    assert!(!source_dir.join("B_GOOD.csv").exists());
}

#[tokio::test]
async fn test_held_lock_skips_run() {
    let harness = ExchangeHarness::new();
    let config = harness.config();
    harness.write_feed(
        SourceTier::Production,
        EntityKind::Meter,
        "METER_LIST.csv",
        &format!("{}\n", meter_feed_line("MTR-1", "Acme", "A")),
    );

    let lock = LockManager::new(&config.lock.lock_dir, 60);
    let _foreign = lock.acquire("importmetermaster").unwrap();

    let report = harness
        .import_pipeline_with(config)
        .import_meters()
        .await
        .unwrap();
    assert!(report.skipped);
    assert!(report.success);

    // Nothing was touched: no meters, feed file still in place
    assert!(harness
        .meters()
        .find_by_code("MTR-1")
        .await
        .unwrap()
        .is_none());
    assert!(harness
        .feed_dir(SourceTier::Production, EntityKind::Meter)
        .join("METER_LIST.csv")
        .exists());
}

#[tokio::test]
async fn test_user_import_maps_roles_and_rejects_unknown_codes() {
    let harness = ExchangeHarness::new();
    let feed = "jdoe;Jane;Doe;jane@example.org;ZADM;A\n\
                bwayne;Bruce;Wayne;bw@example.org;Z_NOPE;A\n";
    harness.write_feed(
        SourceTier::Production,
        EntityKind::User,
        "USER_LIST.csv",
        feed,
    );

    let report = harness.import_pipeline().import_users().await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("unmapped role"));

    let jdoe = harness
        .users()
        .find_by_username("jdoe")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(jdoe.role, "admin");
    assert_eq!(jdoe.status, RecordStatus::Active);
}
