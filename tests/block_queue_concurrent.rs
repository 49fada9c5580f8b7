use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use sstf::{BlockQueue, ElevatorRegistry, Error, QueueConfig};

const SUBMITTERS: u64 = 4;
const PER_SUBMITTER: u64 = 500;

#[test]
fn concurrent_submit_and_dispatch_drain_everything() {
    let registry = ElevatorRegistry::with_defaults();
    let q = BlockQueue::new(
        QueueConfig {
            capacity: 64,
            merge: false,
            ..QueueConfig::default()
        },
        &registry,
    )
    .unwrap();
    let submitted = AtomicBool::new(false);

    let dispatched = thread::scope(|s| {
        let drainer = s.spawn(|| {
            let mut count: u64 = 0;
            let mut last: Option<u64> = None;
            loop {
                // Read the flag before dispatching so a `None` after it is final.
                let finished = submitted.load(Ordering::Acquire);
                match q.dispatch() {
                    Some(d) => {
                        assert_eq!(d.length, 1);
                        q.complete(d.id);
                        count += 1;
                        last = Some(d.start_sector);
                    }
                    None if finished => break,
                    None => thread::yield_now(),
                }
            }
            assert!(last.is_some());
            count
        });

        let submitters: Vec<_> = (0..SUBMITTERS)
            .map(|submitter| {
                let q = &q;
                s.spawn(move || {
                    for i in 0..PER_SUBMITTER {
                        // Sparse sectors so nothing is contiguous.
                        let sector = (i * SUBMITTERS + submitter) * 16;
                        loop {
                            match q.submit(sector, 1) {
                                Ok(_) => break,
                                Err(Error::TableExhausted { .. }) => thread::yield_now(),
                                Err(err) => panic!("submit failed: {err}"),
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in submitters {
            handle.join().unwrap();
        }
        submitted.store(true, Ordering::Release);

        drainer.join().unwrap()
    });

    assert_eq!(dispatched, SUBMITTERS * PER_SUBMITTER);
    assert_eq!(q.pending(), 0);
    assert_eq!(q.in_flight(), 0);
    assert!(q.shutdown().is_ok());
}

#[test]
fn dispatch_under_lock_is_always_queue_minimum() {
    let registry = ElevatorRegistry::with_defaults();
    let q = BlockQueue::new(QueueConfig::default(), &registry).unwrap();

    for sector in [900u64, 100, 500, 300, 700] {
        q.submit(sector, 1).unwrap();
    }

    let sectors: Vec<u64> = thread::scope(|s| {
        s.spawn(|| {
            let mut out = Vec::new();
            while let Some(d) = q.dispatch() {
                out.push(d.start_sector);
                q.complete(d.id);
            }
            out
        })
        .join()
        .unwrap()
    });

    assert_eq!(sectors, vec![100, 300, 500, 700, 900]);
    assert!(q.shutdown().is_ok());
}
