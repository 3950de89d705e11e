use darkness::{AsyncControl, AsyncState, Error, ErrorKind, ExecutionStrategy, QueueBuilder, TaskQueue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < TIMEOUT {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

/// Posts a marker task and waits until the queue has run it.
fn drain(queue: &TaskQueue) {
    let (tx, rx) = mpsc::channel();
    queue.post(move || {
        let _ = tx.send(());
    });
    rx.recv_timeout(TIMEOUT).expect("queue did not drain");
}

#[test]
fn test_tasks_run_in_post_order() {
    let queue = QueueBuilder::new("fifo").build().unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..100 {
        let order = order.clone();
        queue.post(move || order.lock().unwrap().push(i));
    }

    queue.start();
    drain(&queue);
    queue.stop();

    let order = order.lock().unwrap();
    assert_eq!(*order, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_counter_scenario_applies_in_order() {
    let queue = QueueBuilder::new("counter").build().unwrap();
    queue.start();

    let counter = Arc::new(Mutex::new(0));
    let applied = Arc::new(Mutex::new(Vec::new()));

    for (label, delta) in [('A', 1), ('B', 10), ('C', 100)] {
        let counter = counter.clone();
        let applied = applied.clone();
        queue.post(move || {
            *counter.lock().unwrap() += delta;
            applied.lock().unwrap().push(label);
        });
    }

    drain(&queue);
    queue.stop();
    assert!(wait_until(|| queue.state() == AsyncState::Stopped));

    assert_eq!(*counter.lock().unwrap(), 111);
    assert_eq!(*applied.lock().unwrap(), ['A', 'B', 'C']);
}

#[test]
fn test_post_before_start_accumulates() {
    let queue = QueueBuilder::new("accumulate").build().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let counter = counter.clone();
        queue.post(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    assert_eq!(queue.state(), AsyncState::Free);
    assert_eq!(queue.pending_len(), 3);
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    queue.start();
    drain(&queue);

    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(queue.pending_len(), 0);
}

#[test]
fn test_start_while_busy_is_noop() {
    let queue = QueueBuilder::new("busy").build().unwrap();
    queue.start();

    assert!(wait_until(|| queue.worker_thread_id().is_some()));
    let worker = queue.worker_thread_id();

    queue.start();

    assert_eq!(queue.state(), AsyncState::Busy);
    assert_eq!(queue.worker_thread_id(), worker);

    drain(&queue);
    assert_eq!(queue.worker_thread_id(), worker);
}

#[test]
fn test_stop_on_free_queue_is_noop() {
    let queue = QueueBuilder::new("never-started").build().unwrap();

    queue.stop();

    assert_eq!(queue.state(), AsyncState::Free);
    assert_eq!(queue.worker_thread_id(), None);
}

#[test]
fn test_stop_discards_pending_tasks() {
    let queue = QueueBuilder::new("discard").build().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    queue.post(move || {
        let _ = entered_tx.send(());
        let _ = release_rx.recv();
    });

    for _ in 0..5 {
        let counter = counter.clone();
        queue.post(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    queue.start();
    entered_rx.recv_timeout(TIMEOUT).unwrap();

    queue.stop();
    assert_eq!(queue.state(), AsyncState::Stopping);
    assert_eq!(queue.pending_len(), 0);

    release_tx.send(()).unwrap();

    assert!(wait_until(|| queue.state() == AsyncState::Stopped));
    assert_eq!(queue.worker_thread_id(), None);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn test_restart_runs_only_tasks_posted_after_stop() {
    let queue = QueueBuilder::new("restart").build().unwrap();
    let ran = Arc::new(Mutex::new(Vec::new()));

    let (release_tx, release_rx) = mpsc::channel::<()>();
    queue.post(move || {
        let _ = release_rx.recv();
    });

    let before = ran.clone();
    queue.post(move || before.lock().unwrap().push("before-stop"));

    queue.start();
    queue.stop();
    // The gate task may already have been discarded along with its receiver.
    let _ = release_tx.send(());
    assert!(wait_until(|| queue.state() == AsyncState::Stopped));

    let after = ran.clone();
    queue.post(move || after.lock().unwrap().push("after-stop"));

    queue.start();
    assert_eq!(queue.state(), AsyncState::Busy);

    let after_start = ran.clone();
    queue.post(move || after_start.lock().unwrap().push("after-start"));

    drain(&queue);

    assert_eq!(*ran.lock().unwrap(), ["after-stop", "after-start"]);
}

#[test]
fn test_start_while_stopping_is_ignored_and_keeps_tasks() {
    let queue = QueueBuilder::new("stopping").build().unwrap();

    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (entered_tx, entered_rx) = mpsc::channel();
    queue.post(move || {
        let _ = entered_tx.send(());
        let _ = release_rx.recv();
    });

    queue.start();
    entered_rx.recv_timeout(TIMEOUT).unwrap();
    queue.stop();

    queue.start();
    assert_eq!(queue.state(), AsyncState::Stopping);

    let counter = Arc::new(AtomicUsize::new(0));
    let task_counter = counter.clone();
    queue.post(move || {
        task_counter.fetch_add(1, Ordering::SeqCst);
    });

    release_tx.send(()).unwrap();
    assert!(wait_until(|| queue.state() == AsyncState::Stopped));

    assert_eq!(queue.pending_len(), 1);

    queue.start();
    drain(&queue);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failing_task_does_not_stop_queue() {
    let failures = Arc::new(Mutex::new(Vec::<Error>::new()));
    let sink = failures.clone();

    let queue = QueueBuilder::new("failing")
        .on_error(move |error| sink.lock().unwrap().push(error))
        .build()
        .unwrap();

    let completed = Arc::new(AtomicUsize::new(0));

    queue.post(|| panic!("first"));
    let c = completed.clone();
    queue.post(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    queue.post(|| std::panic::panic_any(7_i32));
    let c = completed.clone();
    queue.post(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    queue.start();
    drain(&queue);

    assert_eq!(completed.load(Ordering::SeqCst), 2);
    assert_eq!(queue.state(), AsyncState::Busy);

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].kind(), ErrorKind::Task);
    assert_eq!(failures[0].to_string(), "task on `failing` panicked: first");
    assert_eq!(failures[1].kind(), ErrorKind::Unknown);
    assert_eq!(failures[1].origin(), Some("failing"));
}

#[test]
fn test_failing_task_without_handler_is_dropped() {
    let queue = QueueBuilder::new("no-handler").build().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    queue.post(|| panic!("ignored"));
    let c = counter.clone();
    queue.post(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    queue.start();
    drain(&queue);

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stop_from_inside_task() {
    let queue = Arc::new(QueueBuilder::new("self-stop").build().unwrap());
    let counter = Arc::new(AtomicUsize::new(0));

    let handle = queue.clone();
    queue.post(move || handle.stop());

    let c = counter.clone();
    queue.post(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    queue.start();

    assert!(wait_until(|| queue.state() == AsyncState::Stopped));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn test_task_can_post_to_own_queue() {
    let queue = Arc::new(QueueBuilder::new("repost").build().unwrap());
    let (tx, rx) = mpsc::channel();

    let handle = queue.clone();
    queue.post(move || {
        handle.post(move || {
            let _ = tx.send("nested");
        });
    });

    queue.start();

    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "nested");
    queue.stop();
}

#[test]
fn test_worker_thread_is_named_after_queue() {
    let queue = QueueBuilder::new("named-worker").build().unwrap();
    let (tx, rx) = mpsc::channel();

    queue.post(move || {
        let current = thread::current();
        let _ = tx.send((current.id(), current.name().map(str::to_owned)));
    });
    queue.start();

    let (id, name) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(name.as_deref(), Some("named-worker"));
    assert_eq!(queue.worker_thread_id(), Some(id));
    assert_ne!(id, thread::current().id());
}

#[test]
fn test_drop_waits_for_running_task() {
    let queue = QueueBuilder::new("drop").build().unwrap();
    let finished = Arc::new(AtomicUsize::new(0));
    let (entered_tx, entered_rx) = mpsc::channel();

    let f = finished.clone();
    queue.post(move || {
        let _ = entered_tx.send(());
        thread::sleep(Duration::from_millis(50));
        f.fetch_add(1, Ordering::SeqCst);
    });

    queue.start();
    entered_rx.recv_timeout(TIMEOUT).unwrap();

    drop(queue);

    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_posters_keep_per_thread_order() {
    let queue = QueueBuilder::new("posters").build().unwrap();
    queue.start();

    let seen = Arc::new(Mutex::new(Vec::new()));

    thread::scope(|scope| {
        for producer in 0..4 {
            let queue = &queue;
            let seen = seen.clone();
            scope.spawn(move || {
                for i in 0..50 {
                    let seen = seen.clone();
                    queue.post(move || seen.lock().unwrap().push((producer, i)));
                }
            });
        }
    });

    drain(&queue);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 200);
    for producer in 0..4 {
        let sequence: Vec<_> = seen.iter().filter(|(p, _)| *p == producer).map(|(_, i)| *i).collect();
        assert_eq!(sequence, (0..50).collect::<Vec<_>>());
    }
}

#[test]
fn test_empty_name_is_usage_error() {
    let err = TaskQueue::new("", None, ExecutionStrategy::DedicatedThread).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn test_queue_through_control_trait() {
    let queue = QueueBuilder::new("trait").build().unwrap();
    let control: &dyn AsyncControl = &queue;

    assert_eq!(control.name(), "trait");
    control.start();
    assert_eq!(control.state(), AsyncState::Busy);
    control.stop();
    assert!(wait_until(|| control.state() == AsyncState::Stopped));
}
