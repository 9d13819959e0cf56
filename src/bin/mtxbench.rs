//! Benchmark harness for whichever mutex algorithm this binary was
//! built with: `N` worker threads spin on a barrier flag, then
//! each increments a shared counter `L` times under the lock; the
//! harness verifies the final counter and reports elapsed wall and
//! user CPU time.
//!
//! Grounded on `main.c`'s `main()`/`worker()` pair: the barrier-flag
//! wait, the `getrusage(RUSAGE_SELF, ...)` call for user time, and the
//! two output formats are all direct ports. CLI parsing, logging and
//! error handling follow the `clap`/`log`/`thiserror` pattern used by
//! kata-containers' `kata-ctl` binary (see DESIGN.md).

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use kmtx::algorithms::SELECTED_NAME;
use kmtx::SelectedMutex;
use log::{debug, info};
use serde::Serialize;

const MAX_THREADS: usize = 128;
const MAX_LOOPS_SIMPLE: u64 = 1_000_000;
const MAX_FAIRNESS: u32 = 128;
const DEFAULT_FAIRNESS: u32 = 8;

#[derive(thiserror::Error, Debug)]
enum BenchError {
    #[error("invalid argument: {0}")]
    Cli(String),
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
    #[error("failed to query resource usage: {0}")]
    Rusage(String),
    #[error("counter mismatch: expected {expected}, observed {observed}")]
    CounterMismatch { expected: u64, observed: u64 },
}

impl BenchError {
    /// CLI validation is exit code 2; every other failure,
    /// including a counter mismatch, is exit code 1.
    fn exit_code(&self) -> u8 {
        match self {
            BenchError::Cli(_) => 2,
            _ => 1,
        }
    }
}

/// Drives the mutex algorithm this binary was built with.
#[derive(Parser, Debug)]
#[command(name = "mtxbench", version, about)]
struct Args {
    /// Number of worker threads. Defaults to the online CPU count.
    #[arg(short = 'n', long = "nthreads")]
    nthreads: Option<usize>,

    /// Iterations per worker.
    #[arg(short = 'l', long = "loops", default_value_t = MAX_LOOPS_SIMPLE)]
    loops: u64,

    /// Fairness threshold, used only by the `parkingfair` algorithm.
    #[arg(short = 'x', long = "fairness", default_value_t = DEFAULT_FAIRNESS)]
    fairness: u32,

    /// Print a single-line JSON record instead of human-readable text.
    #[arg(short = 'j', long = "json")]
    json: bool,

    /// Raise log verbosity.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Label to report as the active lock; informational only — the
    /// algorithm actually linked is fixed by the build's Cargo feature.
    #[arg(long = "lock")]
    lock: Option<String>,
}

#[derive(Serialize)]
struct BenchReport {
    lock: String,
    loops: u64,
    nthreads: usize,
    time: f64,
}

struct Validated {
    nthreads: usize,
    loops: u64,
    fairness: u32,
    json: bool,
    lock_label: String,
}

fn validate(args: Args) -> Result<Validated, BenchError> {
    let ncpus = num_cpus::get();
    let nthreads = args.nthreads.unwrap_or(ncpus);
    if nthreads == 0 || nthreads > MAX_THREADS {
        return Err(BenchError::Cli(format!(
            "-n must be between 1 and {MAX_THREADS}, got {nthreads}"
        )));
    }

    let loops_ceiling = if args.json {
        u64::MAX / (nthreads as u64)
    } else {
        MAX_LOOPS_SIMPLE
    };
    if args.loops == 0 || args.loops > loops_ceiling {
        return Err(BenchError::Cli(format!(
            "-l must be between 1 and {loops_ceiling}, got {}",
            args.loops
        )));
    }

    if args.fairness > MAX_FAIRNESS {
        return Err(BenchError::Cli(format!(
            "-x must be between 0 and {MAX_FAIRNESS}, got {}",
            args.fairness
        )));
    }

    Ok(Validated {
        nthreads,
        loops: args.loops,
        fairness: args.fairness,
        json: args.json,
        lock_label: args.lock.unwrap_or_else(|| SELECTED_NAME.to_string()),
    })
}

/// `getrusage(RUSAGE_SELF, ...)`'s user-time field, as a [`Duration`].
fn user_time() -> Result<Duration, BenchError> {
    unsafe {
        let mut ru: libc::rusage = std::mem::zeroed();
        if libc::getrusage(libc::RUSAGE_SELF, &mut ru) != 0 {
            return Err(BenchError::Rusage(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        Ok(Duration::new(
            ru.ru_utime.tv_sec as u64,
            (ru.ru_utime.tv_usec as u32) * 1_000,
        ))
    }
}

fn run(cfg: Validated) -> Result<(), BenchError> {
    #[cfg(feature = "parkingfair")]
    kmtx::algorithms::parkingfair::set_fairness_threshold(cfg.fairness);
    #[cfg(not(feature = "parkingfair"))]
    let _ = cfg.fairness;

    info!(
        "lock={} nthreads={} loops={}",
        cfg.lock_label, cfg.nthreads, cfg.loops
    );

    let mtx = Arc::new(SelectedMutex::new(0u64));
    let barrier = Arc::new(AtomicBool::new(false));
    let start_user = user_time()?;
    let start = Instant::now();

    let mut handles = Vec::with_capacity(cfg.nthreads);
    for i in 0..cfg.nthreads {
        let mtx = mtx.clone();
        let barrier = barrier.clone();
        let loops = cfg.loops;
        handles.push(
            thread::Builder::new().spawn(move || {
                while !barrier.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                for _ in 0..loops {
                    *mtx.enter() += 1;
                }
            })?,
        );
        debug!("spawned worker {i}");
    }

    barrier.store(true, Ordering::Release);
    debug!("barrier released, {} workers running", cfg.nthreads);
    for (i, h) in handles.into_iter().enumerate() {
        h.join().expect("worker thread panicked");
        debug!("worker {i} joined");
    }

    #[cfg(any(feature = "parking", feature = "parkingfair", feature = "wtflock"))]
    {
        let (parks, unparks) = kmtx::park_counts();
        debug!("parks={parks} unparks={unparks}");
    }

    let elapsed = start.elapsed();
    let user_elapsed = user_time()?.saturating_sub(start_user);

    let expected = cfg.nthreads as u64 * cfg.loops;
    let observed = *mtx.enter();
    if observed != expected {
        return Err(BenchError::CounterMismatch { expected, observed });
    }

    if cfg.json {
        let report = BenchReport {
            lock: cfg.lock_label,
            loops: cfg.loops,
            nthreads: cfg.nthreads,
            time: elapsed.as_secs_f64(),
        };
        println!(
            "{}",
            serde_json::to_string(&report).expect("report serializes")
        );
    } else {
        let secs = elapsed.as_secs();
        println!(
            "real time: {}h {}m {}.{:03}s, user time: {}.{:03}s",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60,
            elapsed.subsec_millis(),
            user_elapsed.as_secs(),
            user_elapsed.subsec_millis(),
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    let outcome = validate(args).and_then(run);
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mtxbench: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).expect("should parse")
    }

    #[test]
    fn defaults_fill_in_ncpus_and_loop_ceiling() {
        let v = validate(parse(&["mtxbench"])).unwrap();
        assert_eq!(v.loops, MAX_LOOPS_SIMPLE);
        assert!(v.nthreads >= 1);
    }

    #[test]
    fn rejects_zero_threads() {
        let err = validate(parse(&["mtxbench", "-n", "0"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rejects_loops_over_simple_ceiling() {
        let err = validate(parse(&["mtxbench", "-l", "2000000"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn json_mode_relaxes_loop_ceiling() {
        let v = validate(parse(&["mtxbench", "-j", "-l", "2000000"])).unwrap();
        assert_eq!(v.loops, 2_000_000);
    }

    #[test]
    fn rejects_fairness_over_ceiling() {
        let err = validate(parse(&["mtxbench", "-x", "200"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn counter_mismatch_is_exit_code_one() {
        let e = BenchError::CounterMismatch {
            expected: 10,
            observed: 9,
        };
        assert_eq!(e.exit_code(), 1);
    }

    #[test]
    fn lock_label_defaults_to_linked_algorithm() {
        let v = validate(parse(&["mtxbench"])).unwrap();
        assert_eq!(v.lock_label, SELECTED_NAME);
    }

    #[test]
    fn bench_report_serializes_to_a_flat_json_object() {
        let report = BenchReport {
            lock: "backoff".to_string(),
            loops: 1000,
            nthreads: 4,
            time: 0.25,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"lock":"backoff","loops":1000,"nthreads":4,"time":0.25}"#
        );
    }
}
