//! Username validation demo.
//!
//! Type usernames, one per line. Each line is fed to the pipeline as a new
//! value; results are printed as they arrive. Logs go to `signup.log`.
//!
//! Run with: cargo run -p rulepass --example signup

use std::fs::File;
use std::time::Duration;

use log::LevelFilter;
use rulepass::prelude::*;
use simplelog::{Config, WriteLogger};
use tokio::io::{AsyncBufReadExt, BufReader};

const TAKEN: &[&str] = &["admin", "root", "guest"];

/// Pretend to ask a server whether the name is free.
async fn is_available(name: String) -> bool {
    tokio::time::sleep(Duration::from_millis(800)).await;
    !TAKEN.contains(&name.as_str())
}

fn print_result(result: ValidationResult) {
    if !result.show_validation {
        return;
    }
    match (result.valid, result.error) {
        (None, _) => println!("  checking..."),
        (Some(true), _) => println!("  ok"),
        (Some(false), Some(error)) => println!("  invalid: {}", error),
        (Some(false), None) => println!("  invalid"),
    }
}

#[tokio::main]
async fn main() {
    // Initialize file logging
    if let Ok(log_file) = File::create("signup.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, Config::default(), log_file);
    }

    let pattern = match Rule::pattern(r"^[a-z0-9_]*$", "only lowercase letters, digits and _") {
        Ok(rule) => rule,
        Err(e) => {
            eprintln!("Error: {}", e);
            return;
        }
    };

    let rules = vec![
        Rule::required("a username is required"),
        Rule::min_length(3, "at least 3 characters"),
        Rule::max_length(16, "at most 16 characters"),
        pattern,
        Rule::check_async(is_available, "that name is taken"),
    ];

    let pipeline: ValidationPipeline<String> = ValidationPipeline::spawn(
        rules,
        print_result,
        PipelineConfig::default().with_debounce(Duration::from_millis(300)),
    );

    println!("Enter usernames (Ctrl-D to quit):");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Err(e) = pipeline.push(line.trim().to_string()) {
                    eprintln!("Error: {}", e);
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    // Let the last pass finish before tearing down.
    tokio::time::sleep(Duration::from_secs(2)).await;
    pipeline.shutdown().await;
}
