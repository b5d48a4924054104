use std::path::PathBuf;

use attenuation::constants::{DEFAULT_OUTPUT_DIR, POWER_TABLES_FILE_NAME, SIG_LEVEL, TARGET_POWER};
use attenuation::power::{
    format_correlation_table, format_effect_size_table, power_tables, save_power_tables,
};

const USAGE: &str = "Usage: attenuation-power [--output DIR]";

fn parse_args() -> String {
    let args: Vec<String> = std::env::args().collect();
    let mut output = DEFAULT_OUTPUT_DIR.to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--output" => {
                i += 1;
                if i < args.len() {
                    output = args[i].clone();
                }
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                println!();
                println!("Options:");
                println!("  --output DIR   Output directory (default: {DEFAULT_OUTPUT_DIR})");
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
        }
        i += 1;
    }
    output
}

fn run(output: &str) -> attenuation::Result<()> {
    let tables = power_tables()?;

    println!(
        "Required N at alpha = {}, power = {}",
        SIG_LEVEL, TARGET_POWER
    );
    println!();
    print!("{}", format_effect_size_table(&tables.effect_sizes));
    println!();
    print!("{}", format_correlation_table(&tables.correlations));
    println!();

    let path = PathBuf::from(output).join(POWER_TABLES_FILE_NAME);
    save_power_tables(&tables, &path)?;
    println!("  Tables: {}", path.display());
    Ok(())
}

fn main() {
    attenuation::env_config::init_tracing();
    if let Err(e) = attenuation::env_config::init_base_path() {
        eprintln!("Cannot enter base path: {e}");
        std::process::exit(1);
    }
    let output = parse_args();
    if let Err(e) = run(&output) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
