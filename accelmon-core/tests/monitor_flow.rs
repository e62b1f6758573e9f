//! End-to-end flow: store -> pipeline -> alarms -> statistics -> report.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use accelmon_core::{
    generate_csv_report, generate_report_data, AlarmEngine, Axis, FixedClock, IngestionPipeline,
    MemoryStore, RawRecord, TelemetryStore, TimeWindow,
};

#[test]
fn ingestion_feeds_alarms_and_reports() {
    let store = MemoryStore::new();
    let clock = Arc::new(FixedClock::new(100_000));
    let pipeline = IngestionPipeline::new(Arc::new(store.clone()), clock.clone());

    let engine = Arc::new(AlarmEngine::new(clock.clone()));
    engine.set_threshold(Axis::X, -5.0, 5.0);

    let triggered = Arc::new(AtomicUsize::new(0));
    {
        let triggered = triggered.clone();
        engine.add_listener(Arc::new(move |_alarm| {
            triggered.fetch_add(1, Ordering::SeqCst);
        }));
    }

    // Wire alarm evaluation into the subscription fan-out, the way a host
    // application would.
    let engine_sub = engine.clone();
    let sub = pipeline.subscribe(move |snapshot| {
        engine_sub.check_thresholds(snapshot);
    });
    pipeline.stop_polling();

    // Two calm readings, then a violation, then recovery.
    store.append(&RawRecord::new(1.0, 0.0, 9.8, 90.0)).unwrap();
    store.append(&RawRecord::new(2.0, 0.0, 9.8, 91.0)).unwrap();
    pipeline.fetch_once();
    assert!(engine.active_alarms().is_empty());

    store.append(&RawRecord::new(7.5, 0.0, 9.8, 92.0)).unwrap();
    pipeline.fetch_once();
    assert_eq!(engine.active_alarms().len(), 1);
    assert_eq!(triggered.load(Ordering::SeqCst), 1);

    store.append(&RawRecord::new(1.5, 0.0, 9.8, 93.0)).unwrap();
    pipeline.fetch_once();
    assert!(engine.active_alarms().is_empty());
    assert_eq!(engine.history().len(), 1);

    // Report over the buffer the pipeline built.
    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.len(), 4);

    let report = generate_report_data(TimeWindow::minutes(30), &snapshot, clock.as_ref());
    assert_eq!(report.sample_count, 4);

    let csv = generate_csv_report(&report);
    assert!(csv.contains("STATISTICS"));
    assert!(csv.contains("RAW DATA"));
    assert!(csv.contains("Sample Count: 4"));

    drop(sub);
    assert!(!pipeline.is_polling());
}

#[test]
fn subscribers_see_every_cycle_in_order() {
    let store = MemoryStore::new();
    let clock = Arc::new(FixedClock::new(0));
    let pipeline = IngestionPipeline::new(Arc::new(store.clone()), clock);

    let lens: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let lens_cb = lens.clone();
    let _sub = pipeline.subscribe(move |snapshot| {
        lens_cb.lock().unwrap().push(snapshot.len());
    });
    pipeline.stop_polling();
    lens.lock().unwrap().clear();

    store.append(&RawRecord::new(1.0, 0.0, 0.0, 1.0)).unwrap();
    pipeline.fetch_once();
    pipeline.fetch_once(); // quiet cycle
    store.append(&RawRecord::new(2.0, 0.0, 0.0, 2.0)).unwrap();
    pipeline.fetch_once();

    assert_eq!(*lens.lock().unwrap(), vec![1, 1, 2]);
}

#[test]
fn clear_cold_starts_the_next_cycle() {
    let store = MemoryStore::new();
    let pipeline = IngestionPipeline::new(Arc::new(store.clone()), Arc::new(FixedClock::new(0)));

    store.append(&RawRecord::new(1.0, 0.0, 0.0, 10.0)).unwrap();
    pipeline.fetch_once();
    assert!(pipeline.clear());

    // Older data is admissible again after the reset.
    store.append(&RawRecord::new(2.0, 0.0, 0.0, 5.0)).unwrap();
    pipeline.fetch_once();
    assert_eq!(pipeline.snapshot().len(), 1);
    assert_eq!(pipeline.high_water_mark(), Some(5_000));
}
