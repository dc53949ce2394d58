// tests/snapshot_concurrency.rs
//
// Readers racing a publisher only ever observe whole snapshots.

use std::sync::Arc;

use chrono::Utc;
use doomsday_monitor::analyze;
use doomsday_monitor::model::{Feed, QuoteSnapshot, RawQuote};
use doomsday_monitor::snapshot::SnapshotSlot;

fn snapshot(gen: usize) -> QuoteSnapshot {
    // Every quote in generation `gen` carries the same price, so a torn
    // snapshot would show mixed prices.
    let price = 100.0 + gen as f64;
    let stocks = (0..10)
        .map(|i| analyze::quotes::score_quote(&RawQuote::new(format!("T{i}"), Some(price), Some(100.0))))
        .collect();
    analyze::quotes::build_snapshot(stocks, Utc::now())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_see_whole_old_or_whole_new() {
    let slot = Arc::new(SnapshotSlot::new(Feed::Quotes));
    slot.publish(snapshot(0));

    let writer = {
        let slot = slot.clone();
        tokio::spawn(async move {
            for gen in 1..=200 {
                slot.publish(snapshot(gen));
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let slot = slot.clone();
        readers.push(tokio::spawn(async move {
            let mut last_seen = 0.0_f64;
            for _ in 0..500 {
                let snap = slot.read().expect("published");
                let first = snap.stocks[0].current_price.unwrap();
                assert!(snap.stocks.iter().all(|q| q.current_price == Some(first)));
                assert_eq!(snap.stocks.len(), 10);
                // Aggregates belong to the same generation as the records:
                // price 100 + gen against a close of 100 is a gen % change.
                let implied = first - 100.0;
                assert!((snap.statistics.average_change_percent - implied).abs() < 1e-9);
                assert!((snap.statistics.max_change_percent - implied).abs() < 1e-9);
                assert!((snap.statistics.min_change_percent - implied).abs() < 1e-9);
                assert_eq!(snap.statistics.stocks_analyzed, 10);
                assert!(snap.stocks.iter().all(|q| q.change_percent == Some(implied)));
                // Generations only move forward for a single reader.
                assert!(first >= last_seen);
                last_seen = first;
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for r in readers {
        r.await.unwrap();
    }
    assert_eq!(slot.read().unwrap().stocks[0].current_price, Some(300.0));
}
