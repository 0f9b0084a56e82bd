//! storefront-ledger CLI
//!
//! Replay partner pricing, settlement and payout scenarios from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Replay a scenario file
//! storefront-ledger replay --input scenario.json
//!
//! # Override payout policy and emit JSON
//! storefront-ledger replay --input scenario.json --settings settings.json --format json
//!
//! # Generate a random scenario for testing
//! storefront-ledger generate --partners 5 --orders 200
//! ```

use std::fs;
use std::process;
use storefront_ledger::core::settings::PaymentSettings;
use storefront_ledger::simulation::load::{generate_scenario, LoadConfig};
use storefront_ledger::simulation::scenario::{replay, Scenario};

fn print_usage() {
    eprintln!(
        r#"storefront-ledger — partner pricing, balance and settlement engine

USAGE:
    storefront-ledger <COMMAND> [OPTIONS]

COMMANDS:
    replay      Replay a scenario and print every partner's statement
    generate    Generate a random scenario (for testing)
    help        Show this message

OPTIONS (replay):
    --input <FILE>      Path to JSON scenario file
    --settings <FILE>   Payment settings JSON (used when the scenario has none)
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (generate):
    --partners <N>      Number of partners (default: 5)
    --products <N>      Number of catalog products (default: 20)
    --orders <N>        Number of orders (default: 200)
    --output <FILE>     Write to file instead of stdout

ENVIRONMENT:
    RUST_LOG            Log filter (default: info)

EXAMPLES:
    storefront-ledger replay --input scenario.json
    storefront-ledger replay --input scenario.json --format json
    storefront-ledger generate --partners 3 --orders 50 --output scenario.json"#
    );
}

fn required_value(args: &[String], i: usize, flag: &str, what: &str) -> String {
    args.get(i).cloned().unwrap_or_else(|| {
        eprintln!("{} requires {}", flag, what);
        process::exit(1);
    })
}

fn numeric_value(args: &[String], i: usize, flag: &str) -> usize {
    args.get(i)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            eprintln!("{} requires a number", flag);
            process::exit(1);
        })
}

fn load_scenario(path: &str) -> Scenario {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    });

    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "steps": [
    {{ "op": "product", "id": "burger", "cost": "20.00" }},
    {{ "op": "price", "partner": "burger-lab", "product": "burger", "price": "28.00" }},
    {{ "op": "order", "label": "o1", "partner": "burger-lab", "items": [{{ "product": "burger", "quantity": 3 }}] }},
    {{ "op": "status", "order": "o1", "status": "delivered" }}
  ]
}}"#
        );
        process::exit(1);
    })
}

fn cmd_replay(args: &[String]) {
    let mut input_path = None;
    let mut settings_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(required_value(args, i, "--input", "a file path"));
            }
            "--settings" => {
                i += 1;
                settings_path = Some(required_value(args, i, "--settings", "a file path"));
            }
            "--format" => {
                i += 1;
                format = required_value(args, i, "--format", "'text' or 'json'");
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });

    let settings = match settings_path {
        Some(p) => PaymentSettings::from_json_file(&p).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        }),
        None => PaymentSettings::default(),
    };

    let scenario = load_scenario(&path);
    let report = replay(&scenario, settings).unwrap_or_else(|e| {
        eprintln!("Replay failed: {}", e);
        process::exit(2);
    });
    log::info!(
        "replayed {} step(s), {} rejected",
        report.applied + report.rejected.len(),
        report.rejected.len()
    );

    if format == "json" {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing report: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{}", report);
    }

    if report.statements.iter().any(|s| !s.consistent) {
        log::error!("at least one partner ledger failed reconciliation");
        process::exit(3);
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = LoadConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--partners" => {
                i += 1;
                config.partner_count = numeric_value(args, i, "--partners");
            }
            "--products" => {
                i += 1;
                config.product_count = numeric_value(args, i, "--products");
            }
            "--orders" => {
                i += 1;
                config.order_count = numeric_value(args, i, "--orders");
            }
            "--output" => {
                i += 1;
                output_path = Some(required_value(args, i, "--output", "a file path"));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let scenario = generate_scenario(&config);
    let json = serde_json::to_string_pretty(&scenario).unwrap_or_else(|e| {
        eprintln!("Error serializing scenario: {}", e);
        process::exit(1);
    });

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} steps across {} partners → {}",
            scenario.steps.len(),
            config.partner_count,
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "replay" => cmd_replay(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
