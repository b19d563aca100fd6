//! The core benchmark functionality.
//!
//! A benchmark populates the store with the initial dataset and then runs a fixed number of
//! transactions on every worker thread, each transaction type drawn from the configured mix.
//!
//! ## Configuration Format
//!
//! A benchmark configuration file is formatted in TOML. Besides the `[map]` section of the store
//! (see [`crate::stores`]), it consists of three optional sections:
//!
//! ```toml
//! [tpcc]
//! # dataset options, see crate::tpcc
//!
//! [mix]
//! # transaction mix, see crate::workload
//!
//! [benchmark]
//! # driver options, see BenchmarkOpt
//! ```
//!
//! A missing section falls back to its defaults. Any option can be overwritten via environment
//! variables without changing the content in the TOML file. For example, setting the environment
//! variable `benchmark.threads` overrides `threads` in `[benchmark]`.
//!
//! ## Output Format
//!
//! When a run finishes, one line is printed:
//!
//! ```txt
//! txns 1000 committed 995 aborted 5 duration 1.00 tpm 60000.00 new_order 450 payment 430 order_status 40 delivery 40 stock_level 40
//! ```
//!
//! Where:
//!
//! - `txns`: the transactions executed by all workers.
//! - `committed`/`aborted`: how many of them committed or aborted. Aborts are not retried.
//! - `duration`: the run time of the slowest worker, in seconds.
//! - `tpm`: throughput in transactions per minute, `txns * 60 / duration`.
//! - followed by the number of dispatches of each transaction type.
//!
//! When `latency` is `true`, the line is extended with the latency distribution of single
//! transactions, in microseconds:
//!
//! ```txt
//! min_us <i> max_us <a> avg_us <v> p50_us <m> p95_us <n> p99_us <p> p999_us <t>
//! ```

use crate::error::{Error, Result};
use crate::stores::{new_store, StoreOpt};
use crate::tpcc::populate::Loader;
use crate::tpcc::random::TpccRng;
use crate::tpcc::txn::{Executor, TpccTxn};
use crate::tpcc::{TpccConfig, TpccOpt};
use crate::workload::{MixOpt, TxnType, WorkloadMix};
use crate::{KVMap, KVMapHandle};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use hdrhistogram::Histogram;
use log::{debug, info, warn};
use quanta::Instant;
use serde::Deserialize;
use std::sync::Barrier;
use std::time::Duration;

// {{{ benchmark

/// The `[benchmark]` section.
///
/// The fields are optional to ease parsing from TOML; missing ones take their defaults.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BenchmarkOpt {
    /// Number of worker threads.
    ///
    /// Default: 1.
    pub threads: Option<usize>,

    /// How many transactions each worker executes.
    ///
    /// Default: 100000.
    pub txns: Option<u64>,

    /// Whether or not to record the latency of each transaction. Since measuring time is of extra
    /// cost, enabling latency measurement usually affects the throughput metrics.
    ///
    /// Default: false.
    pub latency: Option<bool>,

    /// Whether or not to pin worker `i` to CPU core `i` (modulo the number of cores).
    ///
    /// Default: false.
    pub pin: Option<bool>,
}

const DEFAULT_TXNS: u64 = 100_000;

/// A validated benchmark: everything needed to load the store and drive the workers.
#[derive(Debug, Clone)]
pub struct Benchmark {
    pub threads: usize,
    pub txns: u64,
    pub latency: bool,
    pub pin: bool,
    pub config: TpccConfig,
    pub mix: WorkloadMix,
}

impl Benchmark {
    pub fn new(opt: &BenchmarkOpt, tpcc: &TpccOpt, mix: &MixOpt) -> Result<Self> {
        let threads = opt.threads.unwrap_or(1);
        if threads == 0 {
            return Err(Error::Config("threads should be positive".into()));
        }
        let txns = opt.txns.unwrap_or(DEFAULT_TXNS);
        if txns == 0 {
            return Err(Error::Config("txns should be positive".into()));
        }
        Ok(Self {
            threads,
            txns,
            latency: opt.latency.unwrap_or(false),
            pin: opt.pin.unwrap_or(false),
            config: TpccConfig::new(tpcc)?,
            mix: WorkloadMix::new(mix)?,
        })
    }

    /// Runs the benchmark with the reference executor.
    pub fn run(&self, map: &dyn KVMap) -> Result<RunStats> {
        self.run_with(map, |_| TpccTxn::new(&self.config))
    }

    /// Runs the benchmark with one executor per worker, created by `executor(worker_id)`.
    ///
    /// Workers start together and share nothing but the store. The first worker error is
    /// returned after all workers have stopped.
    pub fn run_with<E, F>(&self, map: &dyn KVMap, executor: F) -> Result<RunStats>
    where
        E: Executor,
        F: Fn(usize) -> E + Sync,
    {
        debug!("Running benchmark {:?}", self);
        let barrier = Barrier::new(self.threads);
        let results: Vec<Result<RunStats>> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..self.threads)
                .map(|id| {
                    let barrier = &barrier;
                    let executor = &executor;
                    s.spawn(move || {
                        if self.pin {
                            pin(id);
                        }
                        let mut handle = map.handle();
                        let mut executor = executor(id);
                        let mut context = WorkerContext::new(id, &self.mix, self.latency);
                        barrier.wait();
                        run_worker(&mut context, &mut executor, &mut *handle, self.txns)
                    })
                })
                .collect();
            workers
                .into_iter()
                .map(|w| w.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        });

        let mut total = RunStats::new(self.latency)?;
        for r in results {
            total.merge(&r?);
        }
        Ok(total)
    }
}

fn pin(core: usize) {
    match core_affinity::get_core_ids() {
        Some(cores) if !cores.is_empty() => {
            if !core_affinity::set_for_current(cores[core % cores.len()]) {
                warn!("Failed to pin worker {}", core);
            }
        }
        _ => warn!("Core ids unavailable, worker {} is not pinned", core),
    }
}

// }}} benchmark

// {{{ stats

/// Counters of one worker or of a whole run.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub txns: u64,
    committed: [u64; 5],
    aborted: [u64; 5],
    /// Wall-clock time of the run. For merged stats, that of the slowest worker.
    pub duration: Duration,
    /// Latency histogram in ns, if enabled.
    latency: Option<Histogram<u64>>,
}

impl RunStats {
    fn new(latency: bool) -> Result<Self> {
        let latency = match latency {
            true => Some(
                Histogram::new(3)
                    .map_err(|e| Error::Config(format!("latency histogram: {}", e)))?,
            ),
            false => None,
        };
        Ok(Self {
            txns: 0,
            committed: [0; 5],
            aborted: [0; 5],
            duration: Duration::ZERO,
            latency,
        })
    }

    fn record(&mut self, txn: TxnType, committed: bool) {
        self.txns += 1;
        if committed {
            self.committed[txn.index()] += 1;
        } else {
            self.aborted[txn.index()] += 1;
        }
    }

    pub fn committed(&self) -> u64 {
        self.committed.iter().sum()
    }

    pub fn aborted(&self) -> u64 {
        self.aborted.iter().sum()
    }

    /// Executions of one transaction type, committed or not.
    pub fn dispatched(&self, txn: TxnType) -> u64 {
        self.committed[txn.index()] + self.aborted[txn.index()]
    }

    /// Transactions per minute.
    pub fn tpm(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.txns as f64 * 60.0 / secs
        } else {
            0.0
        }
    }

    pub fn latency(&self) -> Option<&Histogram<u64>> {
        self.latency.as_ref()
    }

    pub fn merge(&mut self, other: &RunStats) {
        self.txns += other.txns;
        for i in 0..self.committed.len() {
            self.committed[i] += other.committed[i];
            self.aborted[i] += other.aborted[i];
        }
        self.duration = self.duration.max(other.duration);
        if let (Some(hdr), Some(other)) = (self.latency.as_mut(), other.latency.as_ref()) {
            for v in other.iter_recorded() {
                hdr.saturating_record_n(v.value_iterated_to(), v.count_at_value());
            }
        }
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "txns {} committed {} aborted {} duration {:.2} tpm {:.2}",
            self.txns,
            self.committed(),
            self.aborted(),
            self.duration.as_secs_f64(),
            self.tpm()
        )?;
        for t in TxnType::ALL {
            write!(f, " {} {}", t.name(), self.dispatched(t))?;
        }
        if let Some(hdr) = self.latency.as_ref().filter(|h| !h.is_empty()) {
            write!(
                f,
                " min_us {:.2} max_us {:.2} avg_us {:.2} \
                 p50_us {:.2} p95_us {:.2} p99_us {:.2} p999_us {:.2}",
                hdr.min() as f64 / 1000.0,
                hdr.max() as f64 / 1000.0,
                hdr.mean() / 1000.0,
                hdr.value_at_quantile(0.50) as f64 / 1000.0,
                hdr.value_at_quantile(0.95) as f64 / 1000.0,
                hdr.value_at_quantile(0.99) as f64 / 1000.0,
                hdr.value_at_quantile(0.999) as f64 / 1000.0,
            )?;
        }
        Ok(())
    }
}

// }}} stats

// {{{ worker

/// Per-worker state. Each worker owns its generator, so no state is shared between workers.
pub struct WorkerContext<'a> {
    pub worker_id: usize,
    pub rng: TpccRng,
    pub mix: &'a WorkloadMix,
    pub latency: bool,
}

impl<'a> WorkerContext<'a> {
    pub fn new(worker_id: usize, mix: &'a WorkloadMix, latency: bool) -> Self {
        Self {
            worker_id,
            rng: TpccRng::for_worker(worker_id),
            mix,
            latency,
        }
    }
}

/// Executes exactly `txn_count` transactions on one worker.
///
/// Each iteration draws a transaction type from the mix and dispatches it. Aborted transactions
/// are counted and not retried; an executor error stops the worker.
pub fn run_worker(
    context: &mut WorkerContext,
    executor: &mut dyn Executor,
    handle: &mut dyn KVMapHandle,
    txn_count: u64,
) -> Result<RunStats> {
    let mut stats = RunStats::new(context.latency)?;
    let start = Instant::now();
    for _ in 0..txn_count {
        let txn = context.mix.sample(context.rng.next_u64())?;
        let txn_start = stats.latency.is_some().then(Instant::now);
        let committed = executor.execute(txn, handle, &mut context.rng)?;
        if let (Some(t), Some(hdr)) = (txn_start, stats.latency.as_mut()) {
            hdr.saturating_record(t.elapsed().as_nanos() as u64);
        }
        stats.record(txn, committed);
    }
    stats.duration = start.elapsed();
    debug!("Worker {} finished: {}", context.worker_id, stats);
    Ok(stats)
}

// }}} worker

// {{{ bencher

/// The whole configuration file.
#[derive(Deserialize, Clone, Debug)]
struct BenchmarkGroupOpt {
    map: StoreOpt,
    tpcc: Option<TpccOpt>,
    mix: Option<MixOpt>,
    benchmark: Option<BenchmarkOpt>,
}

/// Parses a configuration and creates the store and the benchmark it describes.
pub fn init(text: &str) -> Result<(Box<dyn KVMap>, Benchmark)> {
    let opt: BenchmarkGroupOpt = Figment::new()
        .merge(Toml::string(text))
        .merge(Env::raw())
        .extract()?;
    debug!("Creating benchmark with the following configurations: {:?}", opt);
    let benchmark = Benchmark::new(
        &opt.benchmark.unwrap_or_default(),
        &opt.tpcc.unwrap_or_default(),
        &opt.mix.unwrap_or_default(),
    )?;
    let map = new_store(&opt.map)?;
    Ok((map, benchmark))
}

/// Loads the dataset, runs the benchmark and prints the summary line.
pub fn bench(map: &dyn KVMap, benchmark: &Benchmark) -> Result<RunStats> {
    let loader = Loader::new(benchmark.config.clone());
    loader.load_all(&mut *map.handle())?;
    info!("Running {} workers", benchmark.threads);
    let stats = benchmark.run(map)?;
    println!("{}", stats);
    Ok(stats)
}

// }}} bencher

// {{{ tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    const SMOKE_BENCH: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/presets/benchmarks/smoke.toml"
    ));

    const MEMORY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/presets/stores/memory.toml"
    ));

    /// Counts dispatches per type without touching the store.
    #[derive(Clone, Default)]
    struct CountingTxn {
        counts: Arc<[AtomicU64; 5]>,
    }

    impl CountingTxn {
        fn bump(&self, t: TxnType) -> Result<bool> {
            self.counts[t.index()].fetch_add(1, Ordering::Relaxed);
            Ok(true)
        }

        fn count(&self, t: TxnType) -> u64 {
            self.counts[t.index()].load(Ordering::Relaxed)
        }
    }

    impl Executor for CountingTxn {
        fn new_order(&mut self, _: &mut dyn KVMapHandle, _: &mut TpccRng) -> Result<bool> {
            self.bump(TxnType::NewOrder)
        }

        fn payment(&mut self, _: &mut dyn KVMapHandle, _: &mut TpccRng) -> Result<bool> {
            self.bump(TxnType::Payment)
        }

        fn order_status(&mut self, _: &mut dyn KVMapHandle, _: &mut TpccRng) -> Result<bool> {
            self.bump(TxnType::OrderStatus)
        }

        fn delivery(&mut self, _: &mut dyn KVMapHandle, _: &mut TpccRng) -> Result<bool> {
            self.bump(TxnType::Delivery)
        }

        fn stock_level(&mut self, _: &mut dyn KVMapHandle, _: &mut TpccRng) -> Result<bool> {
            self.bump(TxnType::StockLevel)
        }
    }

    #[test]
    fn options_default() {
        let (_, b) = init("[map]\nname = \"memory\"").unwrap();
        assert_eq!(b.threads, 1);
        assert_eq!(b.txns, DEFAULT_TXNS);
        assert!(!b.latency);
        assert!(!b.pin);
        assert_eq!(b.config.scale.warehouses, 2);
        assert_eq!(b.mix.sample(45).unwrap(), TxnType::Payment);
    }

    #[test]
    fn options_are_applied() {
        let opt = r#"
            [map]
            name = "memory"
            shards = 4

            [tpcc]
            warehouses = 3
            districts = 2
            customers = 30
            items = 100
            now = 42

            [mix]
            new_order = 50
            payment = 50
            order_status = 0
            delivery = 0
            stock_level = 0

            [benchmark]
            threads = 4
            txns = 10
            latency = true
        "#;
        let (_, b) = init(opt).unwrap();
        assert_eq!(b.threads, 4);
        assert_eq!(b.txns, 10);
        assert!(b.latency);
        assert_eq!(b.config.scale.warehouses, 3);
        assert_eq!(b.config.scale.districts, 2);
        assert_eq!(b.config.now, 42);
        assert_eq!(b.mix.sample(50).unwrap(), TxnType::Payment);
        assert_eq!(b.mix.sample(99).unwrap(), TxnType::Payment);
    }

    #[test]
    fn invalid_options_are_config_errors() {
        let cases = [
            "[map]\nname = \"memory\"\n[benchmark]\nthreads = 0",
            "[map]\nname = \"memory\"\n[benchmark]\ntxns = 0",
            "[map]\nname = \"memory\"\n[mix]\nnew_order = 44",
            "[map]\nname = \"memory\"\n[tpcc]\nwarehouses = 0",
            "[map]\nname = \"nosuchmap\"",
            "[benchmark]\nthreads = 1",
            "[map\nname = \"memory\"",
        ];
        for opt in cases {
            let e = init(opt).err().unwrap();
            assert_eq!(e.kind(), ErrorKind::Config, "{}", opt);
        }
    }

    #[test]
    fn end_to_end_new_order_only() {
        let opt = r#"
            [map]
            name = "memory"

            [tpcc]
            warehouses = 1
            districts = 2
            customers = 3
            items = 100

            [mix]
            new_order = 100
            payment = 0
            order_status = 0
            delivery = 0
            stock_level = 0

            [benchmark]
            txns = 100
        "#;
        let (map, b) = init(opt).unwrap();
        let report = Loader::new(b.config.clone()).load_all(&mut *map.handle()).unwrap();
        assert!(report.total_inserted() > 0);
        let counter = CountingTxn::default();
        let stats = b.run_with(&*map, |_| counter.clone()).unwrap();
        assert_eq!(counter.count(TxnType::NewOrder), 100);
        for t in TxnType::ALL.into_iter().skip(1) {
            assert_eq!(counter.count(t), 0);
        }
        assert_eq!(stats.txns, 100);
        assert_eq!(stats.dispatched(TxnType::NewOrder), 100);
        assert_eq!(stats.committed(), 100);
        assert_eq!(stats.aborted(), 0);
    }

    #[test]
    fn worker_follows_the_mix() {
        let mix = WorkloadMix::new(&MixOpt::default()).unwrap();
        let map = crate::stores::memory::MemoryMap::new(1);
        let mut handle = map.handle();
        let mut context = WorkerContext::new(0, &mix, true);
        let mut counter = CountingTxn::default();
        let stats = run_worker(&mut context, &mut counter, &mut *handle, 10_000).unwrap();
        assert_eq!(stats.txns, 10_000);
        assert_eq!(stats.latency().unwrap().len(), 10_000);
        let new_order = stats.dispatched(TxnType::NewOrder);
        assert!(new_order > 4_000 && new_order < 5_000, "{}", new_order);
        let total: u64 = TxnType::ALL.iter().map(|t| counter.count(*t)).sum();
        assert_eq!(total, 10_000);
    }

    #[test]
    fn executor_errors_stop_the_run() {
        let opt = r#"
            [map]
            name = "memory"
            [benchmark]
            txns = 10
        "#;
        let (map, b) = init(opt).unwrap();
        // nothing loaded, the first read fails
        let e = b.run(&*map).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Decode);
    }

    #[test]
    fn stats_merge_and_print() {
        let mut a = RunStats::new(true).unwrap();
        a.record(TxnType::NewOrder, true);
        a.record(TxnType::NewOrder, false);
        a.latency.as_mut().unwrap().saturating_record(2_000);
        a.duration = Duration::from_secs(1);
        let mut b = RunStats::new(true).unwrap();
        b.record(TxnType::Delivery, true);
        b.latency.as_mut().unwrap().saturating_record(4_000);
        b.duration = Duration::from_secs(2);
        a.merge(&b);
        assert_eq!(a.txns, 3);
        assert_eq!(a.committed(), 2);
        assert_eq!(a.aborted(), 1);
        assert_eq!(a.duration, Duration::from_secs(2));
        assert_eq!(a.tpm(), 90.0);
        assert_eq!(a.latency().unwrap().len(), 2);
        let line = a.to_string();
        assert!(line.starts_with("txns 3 committed 2 aborted 1 duration 2.00 tpm 90.00"));
        assert!(line.contains("new_order 2 payment 0 order_status 0 delivery 1 stock_level 0"));
        assert!(line.contains("p99_us"));
    }

    fn example(map_opt: &str) {
        let _ = env_logger::try_init();
        let opt = map_opt.to_string() + "\n" + SMOKE_BENCH;
        let (map, b) = init(&opt).unwrap();
        let stats = bench(&*map, &b).unwrap();
        assert_eq!(stats.txns, b.txns * b.threads as u64);
        assert!(stats.committed() > 0);
    }

    #[test]
    fn example_memory() {
        example(MEMORY);
    }

    #[test]
    fn example_logstore() {
        let dir = tempfile::tempdir().unwrap();
        let opt = format!(
            "[map]\nname = \"logstore\"\npath = \"{}\"",
            dir.path().display()
        );
        example(&opt);
    }

    #[cfg(feature = "rocksdb")]
    #[test]
    fn example_rocksdb() {
        let dir = tempfile::tempdir().unwrap();
        let opt = format!(
            "[map]\nname = \"rocksdb\"\npath = \"{}\"",
            dir.path().display()
        );
        example(&opt);
    }
}

// }}} tests
