//! waterfall-engine CLI
//!
//! Run a deal's payment waterfalls from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Run every period in a periods file against a deal
//! waterfall-engine run --deal deal.json --periods periods.json
//!
//! # Output as JSON
//! waterfall-engine run --deal deal.json --periods periods.json --format json
//!
//! # Generate a collection schedule for testing
//! waterfall-engine generate --periods 20 --pool-balance 150000000
//! ```

use rust_decimal::Decimal;
use std::fs;
use std::process;
use waterfall_engine::core::frequency::PaymentFrequency;
use waterfall_engine::engine::config::{DealConfig, PeriodsFile};
use waterfall_engine::engine::report::DealSummary;
use waterfall_engine::engine::runner::{run_all_periods, PeriodOutcome};
use waterfall_engine::simulation::scenario::{generate_collections, ScenarioConfig};

fn print_usage() {
    eprintln!(
        r#"waterfall-engine: securitization cash-flow waterfalls

USAGE:
    waterfall-engine <COMMAND> [OPTIONS]

COMMANDS:
    run         Run a deal's revenue and redemption waterfalls period by period
    generate    Generate a collection schedule for an amortizing pool
    help        Show this message

OPTIONS (run):
    --deal <FILE>       Path to JSON deal configuration
    --periods <FILE>    Path to JSON period collections
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (generate):
    --periods <N>         Number of periods (default: 20)
    --pool-balance <X>    Collateral balance at closing (default: 150000000)
    --yield <R>           Annual collateral yield (default: 0.05)
    --prepayment <R>      Annual prepayment rate (default: 0.10)
    --frequency <F>       M, Q, S or Y (default: Q)
    --seed <N>            Random seed (default: 42)
    --output <FILE>       Write to file instead of stdout

Set RUST_LOG=debug to trace every limb payment.

EXAMPLES:
    waterfall-engine run --deal deal.json --periods periods.json
    waterfall-engine run --deal deal.json --periods periods.json --format json
    waterfall-engine generate --periods 40 --prepayment 0.15 --output periods.json"#
    );
}

#[derive(serde::Serialize)]
struct RunOutput<'a> {
    periods: &'a [PeriodOutcome],
    summary: DealSummary,
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    })
}

fn take_value(args: &[String], i: usize, flag: &str, what: &str) -> String {
    args.get(i).cloned().unwrap_or_else(|| {
        eprintln!("{} requires {}", flag, what);
        process::exit(1);
    })
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str, what: &str) -> T {
    take_value(args, i, flag, what).parse().unwrap_or_else(|_| {
        eprintln!("{} requires {}", flag, what);
        process::exit(1);
    })
}

fn cmd_run(args: &[String]) {
    let mut deal_path = None;
    let mut periods_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--deal" => {
                i += 1;
                deal_path = Some(take_value(args, i, "--deal", "a file path"));
            }
            "--periods" => {
                i += 1;
                periods_path = Some(take_value(args, i, "--periods", "a file path"));
            }
            "--format" => {
                i += 1;
                format = take_value(args, i, "--format", "'text' or 'json'");
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let (deal_path, periods_path) = match (deal_path, periods_path) {
        (Some(d), Some(p)) => (d, p),
        _ => {
            eprintln!("Error: --deal <FILE> and --periods <FILE> are required");
            process::exit(1);
        }
    };

    let mut deal = DealConfig::from_json(&read_file(&deal_path))
        .and_then(|config| config.build())
        .unwrap_or_else(|e| {
            eprintln!("Error loading deal '{}': {}", deal_path, e);
            process::exit(1);
        });
    let inputs = PeriodsFile::from_json(&read_file(&periods_path)).unwrap_or_else(|e| {
        eprintln!("Error loading periods '{}': {}", periods_path, e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "periods": [
    {{
      "revenue_collections": "1000000",
      "redemption_collections": "1500000",
      "pool_balance": "148500000"
    }}
  ]
}}"#
        );
        process::exit(1);
    });

    let outcomes = run_all_periods(&mut deal, &inputs.periods).unwrap_or_else(|e| {
        eprintln!("Error running deal '{}': {}", deal.name(), e);
        process::exit(1);
    });
    let summary = DealSummary::from_deal(&deal);

    if format == "json" {
        let output = RunOutput {
            periods: &outcomes,
            summary,
        };
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        for outcome in &outcomes {
            println!("{}", outcome.revenue);
            println!("{}", outcome.redemption);
        }
        println!("{}", summary);
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = ScenarioConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--periods" => {
                i += 1;
                config.periods = parse_value(args, i, "--periods", "a number");
            }
            "--pool-balance" => {
                i += 1;
                config.pool_balance =
                    parse_value::<Decimal>(args, i, "--pool-balance", "an amount");
            }
            "--yield" => {
                i += 1;
                config.annual_yield = parse_value::<Decimal>(args, i, "--yield", "a rate");
            }
            "--prepayment" => {
                i += 1;
                config.prepayment_rate = parse_value(args, i, "--prepayment", "a rate");
            }
            "--frequency" => {
                i += 1;
                config.frequency =
                    parse_value::<PaymentFrequency>(args, i, "--frequency", "one of M, Q, S, Y");
            }
            "--seed" => {
                i += 1;
                config.seed = parse_value(args, i, "--seed", "a number");
            }
            "--output" => {
                i += 1;
                output_path = Some(take_value(args, i, "--output", "a file path"));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let file = PeriodsFile {
        periods: generate_collections(&config),
    };
    let json = file.to_json().unwrap_or_else(|e| {
        eprintln!("Error serializing periods: {}", e);
        process::exit(1);
    });

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} periods from a {} pool → {}",
            file.periods.len(),
            config.pool_balance,
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "run" => cmd_run(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
