//! Example: hosting the main queue on the main thread
//!
//! A background queue does the "work", a periodic timer reports progress
//! back to the main queue, and the main queue stops itself after a few
//! ticks. Run with `RUST_LOG=darkness=debug` to see the lifecycle logs.

use darkness::{QueueRegistry, TimerBuilder, debug_exception_handler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const TICKS: usize = 5;

fn main() -> darkness::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let registry = QueueRegistry::global();
    let main_queue = registry.get_or_create_main(Some(debug_exception_handler()));
    let worker = registry.get_or_create_background("demo-worker", Some(debug_exception_handler()))?;
    worker.start();

    let ticks = Arc::new(AtomicUsize::new(0));

    // Each tick hands a job to the worker, which reports back on the main queue.
    let timer = {
        let ticks = ticks.clone();
        let main_queue = main_queue.clone();
        let worker = worker.clone();

        TimerBuilder::new()
            .name("demo-timer")
            .delay(Duration::from_millis(200))
            .task(move || {
                let tick = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                let main_queue = main_queue.clone();

                worker.post(move || {
                    let square = tick * tick;
                    let host = main_queue.clone();

                    main_queue.post(move || {
                        println!("tick {tick}: {square}");
                        if tick >= TICKS {
                            host.stop();
                        }
                    });
                });
            })
            .exception_handler(debug_exception_handler())
            .build()?
    };

    timer.start();

    // Runs the main loop here until the last tick stops it.
    main_queue.start();

    timer.stop();
    worker.stop();
    registry.kill_and_forget_all();

    println!("done after {} ticks", ticks.load(Ordering::SeqCst));

    Ok(())
}
