use crate::error::Result;
use crate::stores::registered;
use crate::tpcc::populate::Loader;
use clap::ValueHint::FilePath;
use clap::{Args, Parser, Subcommand};
use log::{debug, error};
use std::fs::read_to_string;

#[derive(Args, Debug)]
struct BenchArgs {
    #[arg(short = 's')]
    #[arg(value_hint = FilePath)]
    #[arg(help = "Path to the key-value store's TOML config file")]
    store_config: String,

    #[arg(short = 'b')]
    #[arg(value_hint = FilePath)]
    #[arg(help = "Path to the benchmark's TOML config file")]
    benchmark_config: String,
}

#[derive(Args, Debug)]
struct LoadArgs {
    #[command(flatten)]
    config: BenchArgs,

    #[arg(long)]
    #[arg(help = "Check the financial consistency rules after loading")]
    verify: bool,
}

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Load the dataset and run a benchmark")]
    Bench(BenchArgs),
    #[command(about = "Load the dataset only")]
    Load(LoadArgs),
    #[command(about = "List all registered key-value stores")]
    List,
}

fn read_config(args: &BenchArgs) -> Result<String> {
    let s = read_to_string(args.store_config.as_str())?;
    let b = read_to_string(args.benchmark_config.as_str())?;
    Ok(s + "\n" + &b)
}

fn bench_cli(args: &BenchArgs) -> Result<()> {
    let opt = read_config(args)?;
    let (map, benchmark) = crate::bench::init(&opt)?;
    crate::bench::bench(&*map, &benchmark)?;
    Ok(())
}

fn load_cli(args: &LoadArgs) -> Result<()> {
    let opt = read_config(&args.config)?;
    let (map, benchmark) = crate::bench::init(&opt)?;
    let loader = Loader::new(benchmark.config);
    let mut handle = map.handle();
    let report = loader.load_all(&mut *handle)?;
    println!("{}", report);
    if args.verify {
        let violations = loader.verify(&mut *handle)?;
        println!("violations {}", violations.len());
    }
    Ok(())
}

fn list_cli() {
    for name in registered() {
        println!("Registered map: {}", name);
    }
}

/// The default command line interface.
///
/// This function is public and can be called in a different crate. For example, one can integrate
/// their own key-value stores by registering the constructor function. Then, adding this function
/// will produce a benchmark binary that has the same usage as the one in this crate.
///
/// ## Usage
///
/// To get the usage of the command line interface, users can run:
///
/// ```bash
/// tpccbench -h
/// ```
///
/// The interface supports three modes, `bench`, `load` and `list`.
///
/// ### Benchmark Mode
///
/// Usage:
///
/// ```bash
/// tpccbench bench -s <STORE_CONFIG> -b <BENCH_CONFIG>
/// ```
///
/// Where `STORE_CONFIG` and `BENCH_CONFIG` are the paths to the key-value store and benchmark
/// configuration files, respectively. For their format, you can refer to the documentations of
/// [`crate::stores`] and [`crate::bench`]. The dataset is loaded first, then the transactions
/// run and one summary line is printed.
///
/// ### Load Mode
///
/// Usage:
///
/// ```bash
/// tpccbench load -s <STORE_CONFIG> -b <BENCH_CONFIG> [--verify]
/// ```
///
/// Only loads the dataset and prints the per-table record counts. With `--verify`, the store is
/// then checked against the TPC-C financial consistency rules and the number of violations is
/// printed.
///
/// ### List mode
///
/// Usage:
/// ``` bash
/// tpccbench list
/// ```
///
/// This command lists all registered key-value stores' names.
///
/// Any error is logged and the process exits with status 1. Set `RUST_LOG` to see the per-table
/// load counts (`info`) or the parsed configuration (`debug`).
pub fn cmdline() {
    env_logger::init();
    let cli = Cli::parse();
    debug!("Starting tpccbench with args: {:?}", cli);
    let result = match cli.command {
        Commands::Bench(args) => bench_cli(&args),
        Commands::Load(args) => load_cli(&args),
        Commands::List => {
            list_cli();
            Ok(())
        }
    };
    if let Err(e) = result {
        error!("{} error: {}", e.kind(), e);
        std::process::exit(1);
    }
}
