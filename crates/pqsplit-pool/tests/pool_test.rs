// Integration tests for pqsplit-pool
//
// Exercises concurrent execution, failure capture, backpressure and the
// discard-on-shutdown policy.

use std::collections::BTreeSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use pqsplit_pool::{PoolError, TaskError, WorkerPool};

#[test]
fn ten_tasks_on_four_workers_each_run_once() {
    let pool = WorkerPool::new(4, None).unwrap();
    let written = Arc::new(Mutex::new(Vec::new()));

    for index in 0..10u64 {
        let written = Arc::clone(&written);
        pool.submit_fire_and_forget(format!("partition-{}", index), move || {
            thread::sleep(Duration::from_millis(5 * (10 - index)));
            written.lock().push(index);
            Ok::<(), io::Error>(())
        })
        .unwrap();
    }

    pool.wait_idle();
    let written = written.lock().clone();
    assert_eq!(written.len(), 10, "no duplicate or missing index");
    let unique: BTreeSet<u64> = written.into_iter().collect();
    assert_eq!(unique, (0..10).collect::<BTreeSet<_>>());
    assert!(pool.take_failures().is_empty());
}

#[test]
fn submit_with_result_returns_values() {
    let pool = WorkerPool::new(2, Some(4)).unwrap();
    let handles: Vec<_> = (0..6)
        .map(|i| pool.submit_with_result(move || i * i).unwrap())
        .collect();

    let results: Vec<i32> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
    assert_eq!(results, vec![0, 1, 4, 9, 16, 25]);
}

#[test]
fn fire_and_forget_errors_and_panics_are_captured() {
    let pool = WorkerPool::new(2, None).unwrap();

    let ok_id = pool
        .submit_fire_and_forget("ok", || Ok::<(), io::Error>(()))
        .unwrap();
    let err_id = pool
        .submit_fire_and_forget("write", || {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        })
        .unwrap();
    let panic_id = pool
        .submit_fire_and_forget("boom", || -> Result<(), io::Error> { panic!("exploded") })
        .unwrap();

    pool.wait_idle();
    let mut failures = pool.take_failures();
    failures.sort_by_key(|f| f.task_id);

    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.task_id != ok_id));

    assert_eq!(failures[0].task_id, err_id);
    assert_eq!(failures[0].label, "write");
    let io_err = failures[0].error.downcast_ref::<io::Error>().unwrap();
    assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);

    assert_eq!(failures[1].task_id, panic_id);
    assert!(matches!(&failures[1].error, TaskError::Panicked(msg) if msg == "exploded"));
}

#[test]
fn panicking_task_with_result_reports_panic() {
    let pool = WorkerPool::new(1, None).unwrap();
    let handle = pool
        .submit_with_result(|| -> u32 { panic!("bad input") })
        .unwrap();
    assert_eq!(
        handle.wait(),
        Err(PoolError::Panicked("bad input".to_string()))
    );

    // The worker survives the panic
    let handle = pool.submit_with_result(|| 7).unwrap();
    assert_eq!(handle.wait(), Ok(7));
}

#[test]
fn shutdown_discards_queued_tasks() {
    let pool = WorkerPool::new(1, None).unwrap();
    let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);

    let running = pool
        .submit_with_result(move || {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
            "finished"
        })
        .unwrap();
    started_rx.recv().unwrap();

    let queued: Vec<_> = (0..3)
        .map(|i| pool.submit_with_result(move || i).unwrap())
        .collect();
    let ran_fire_and_forget = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&ran_fire_and_forget);
        pool.submit_fire_and_forget("late", move || {
            flag.store(true, Ordering::SeqCst);
            Ok::<(), io::Error>(())
        })
        .unwrap();
    }

    let opener = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        gate_tx.send(()).unwrap();
    });

    let report = pool.shutdown();
    opener.join().unwrap();

    // In-flight task completes, queued ones never start
    assert_eq!(running.wait(), Ok("finished"));
    for handle in queued {
        assert_eq!(handle.wait(), Err(PoolError::Discarded));
    }
    assert_eq!(report.discarded, 4);
    assert!(report.failures.is_empty());
    assert!(!ran_fire_and_forget.load(Ordering::SeqCst));
}

#[test]
fn bounded_queue_blocks_submitter() {
    let pool = Arc::new(WorkerPool::new(1, Some(1)).unwrap());
    let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);

    pool.submit_fire_and_forget("blocker", move || {
        started_tx.send(()).unwrap();
        gate_rx.recv().unwrap();
        Ok::<(), io::Error>(())
    })
    .unwrap();
    started_rx.recv().unwrap();

    // Fills the single queue slot
    pool.submit_fire_and_forget("queued", || Ok::<(), io::Error>(()))
        .unwrap();
    assert_eq!(pool.queued(), 1);

    let submitted = Arc::new(AtomicBool::new(false));
    let producer = {
        let pool = Arc::clone(&pool);
        let submitted = Arc::clone(&submitted);
        thread::spawn(move || {
            pool.submit_fire_and_forget("overflow", || Ok::<(), io::Error>(()))
                .unwrap();
            submitted.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(
        !submitted.load(Ordering::SeqCst),
        "producer should block while the queue is full"
    );

    gate_tx.send(()).unwrap();
    producer.join().unwrap();
    assert!(submitted.load(Ordering::SeqCst));

    pool.wait_idle();
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn zero_workers_is_rejected() {
    assert!(matches!(WorkerPool::new(0, None), Err(PoolError::NoWorkers)));
}

#[test]
fn try_wait_sees_finished_task() {
    let pool = WorkerPool::new(1, None).unwrap();
    let handle = pool.submit_with_result(|| 5u8).unwrap();
    pool.wait_idle();
    assert_eq!(handle.try_wait(), Some(Ok(5)));
    assert_eq!(pool.worker_count(), 1);
}
