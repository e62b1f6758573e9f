//! Property tests for the rolling buffer merge.

use accelmon_core::{Reading, RollingBuffer};
use proptest::collection::vec;
use proptest::prelude::*;

fn reading(ts: i64) -> Reading {
    Reading {
        id: format!("r{ts}"),
        x: ts as f64,
        y: 0.0,
        z: 0.0,
        timestamp: ts,
        is_prediction: false,
    }
}

fn timestamps(buffer: &RollingBuffer) -> Vec<i64> {
    buffer.snapshot().iter().map(|r| r.timestamp).collect()
}

proptest! {
    #[test]
    fn merge_is_idempotent(ts in vec(0i64..100_000, 0..40)) {
        let mut buffer = RollingBuffer::new();
        let batch: Vec<Reading> = ts.iter().map(|&t| reading(t)).collect();

        buffer.merge(batch.clone());
        let after_first = timestamps(&buffer);

        let admitted = buffer.merge(batch);
        prop_assert_eq!(admitted, 0);
        prop_assert_eq!(timestamps(&buffer), after_first);
    }

    #[test]
    fn high_water_mark_is_monotone(batches in vec(vec(0i64..100_000, 0..20), 1..10)) {
        let mut buffer = RollingBuffer::new();
        let mut last_mark = None;

        for batch in batches {
            buffer.merge(batch.into_iter().map(reading).collect());
            let mark = buffer.high_water_mark();
            if let (Some(prev), Some(cur)) = (last_mark, mark) {
                prop_assert!(cur >= prev);
            }
            if mark.is_some() {
                last_mark = mark;
            }
        }
    }

    #[test]
    fn buffer_stays_sorted_and_bounded(
        batches in vec(vec(0i64..100_000, 0..30), 1..8),
        capacity in 1usize..50,
    ) {
        let mut buffer = RollingBuffer::with_capacity(capacity);

        for batch in batches {
            buffer.merge(batch.into_iter().map(reading).collect());
            let ts = timestamps(&buffer);
            prop_assert!(ts.len() <= capacity);
            prop_assert!(ts.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn admitted_records_are_strictly_above_previous_mark(
        first in vec(0i64..50_000, 1..20),
        second in vec(0i64..100_000, 0..20),
    ) {
        let mut buffer = RollingBuffer::new();
        buffer.merge(first.into_iter().map(reading).collect());
        let mark = buffer.high_water_mark().unwrap();

        let before: Vec<i64> = timestamps(&buffer);
        buffer.merge(second.clone().into_iter().map(reading).collect());
        let after = timestamps(&buffer);

        let expected_new: usize = second.iter().filter(|&&t| t > mark).count();
        prop_assert_eq!(after.len(), (before.len() + expected_new).min(RollingBuffer::DEFAULT_CAPACITY));
    }
}
