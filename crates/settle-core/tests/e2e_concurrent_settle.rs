//! E2E integration test: capability handles racing across threads.
//!
//! Validates:
//! 1. Exactly one settle call wins, no matter how many threads race.
//! 2. The stored outcome is the winner's.
//! 3. Reactions registered from several threads while the race is on each
//!    dispatch exactly once.
//! 4. No panics, no deadlocks, no unsafe code.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use settle_core::{ManualQueue, Outcome, Promise, Status, Value};

const ROUNDS: usize = 50;
const WRITERS: usize = 8;
const SUBSCRIBERS: usize = 4;
const SUBS_PER_THREAD: usize = 25;

// ═════════════════════════════════════════════════════════════════════════
// Test 1: 8 writers race on one capability pair
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn e2e_racing_writers_single_winner() {
    for round in 0..ROUNDS {
        let queue = ManualQueue::new();
        let (p, succeed, fail) = Promise::deferred(&queue.scheduler());
        let barrier = Arc::new(Barrier::new(WRITERS));
        let winners = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..WRITERS)
            .map(|w| {
                let succeed = succeed.clone();
                let fail = fail.clone();
                let barrier = Arc::clone(&barrier);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    barrier.wait();
                    let won = if w % 2 == 0 {
                        succeed.succeed(w as i64)
                    } else {
                        fail.fail(w as i64)
                    };
                    if won {
                        winners.lock().unwrap().push(w);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("writer thread panicked");
        }

        let winners = winners.lock().unwrap().clone();
        assert_eq!(winners.len(), 1, "round {round}: winners {winners:?}");
        let w = winners[0];
        let want = if w % 2 == 0 {
            Outcome::Succeeded(Value::Int(w as i64))
        } else {
            Outcome::Failed(Value::Int(w as i64))
        };
        assert_eq!(p.outcome(), Some(want), "round {round}");
        assert!(succeed.is_spent() && fail.is_spent());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Test 2: subscribers on several threads race with settlement
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn e2e_concurrent_subscribe_and_settle() {
    for round in 0..ROUNDS {
        let queue = ManualQueue::new();
        let (p, succeed, _) = Promise::deferred(&queue.scheduler());
        let barrier = Arc::new(Barrier::new(SUBSCRIBERS + 1));
        let hits = Arc::new(AtomicUsize::new(0));

        let subscribers: Vec<_> = (0..SUBSCRIBERS)
            .map(|_| {
                let p = p.clone();
                let barrier = Arc::clone(&barrier);
                let hits = Arc::clone(&hits);
                thread::spawn(move || {
                    barrier.wait();
                    (0..SUBS_PER_THREAD)
                        .map(|_| {
                            let hits = Arc::clone(&hits);
                            p.then(move |v| {
                                hits.fetch_add(1, Ordering::SeqCst);
                                Ok(v)
                            })
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        barrier.wait();
        assert!(succeed.succeed("raced"));

        let mut derived = Vec::new();
        for s in subscribers {
            derived.extend(s.join().expect("subscriber thread panicked"));
        }

        // Nothing ran on any of the racing threads.
        assert_eq!(hits.load(Ordering::SeqCst), 0, "round {round}");

        queue.run_until_idle();
        assert_eq!(
            hits.load(Ordering::SeqCst),
            SUBSCRIBERS * SUBS_PER_THREAD,
            "round {round}"
        );
        for d in &derived {
            assert_eq!(d.status(), Status::Succeeded);
            assert_eq!(d.outcome(), Some(Outcome::Succeeded(Value::from("raced"))));
        }
    }
}
