use std::path::PathBuf;

use attenuation::constants::{
    DATASET_CACHE_PATH, DATASET_URL, DEFAULT_OUTPUT_DIR, ICC_CONFIDENCE, RELIABILITY_FILE_NAME,
};
use attenuation::reliability::{
    estimate_reliability, format_icc_table, load_or_fetch, save_report, write_up, TrialFilter,
};

struct Args {
    data: String,
    url: String,
    output: String,
    filter: TrialFilter,
}

const USAGE: &str =
    "Usage: attenuation-reliability [--data PATH] [--url URL] [--method M] [--age-group G] [--output DIR]";

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut data = DATASET_CACHE_PATH.to_string();
    let mut url = DATASET_URL.to_string();
    let mut output = DEFAULT_OUTPUT_DIR.to_string();
    let mut filter = TrialFilter::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data" => {
                i += 1;
                if i < args.len() {
                    data = args[i].clone();
                }
            }
            "--url" => {
                i += 1;
                if i < args.len() {
                    url = args[i].clone();
                }
            }
            "--method" => {
                i += 1;
                if i < args.len() {
                    filter.method = Some(args[i].clone());
                }
            }
            "--age-group" => {
                i += 1;
                if i < args.len() {
                    filter.age_group = Some(args[i].clone());
                }
            }
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
                println!("  --data PATH      Cached trial CSV (default: {DATASET_CACHE_PATH})");
                println!("  --url URL        Download source on a cache miss");
                println!("  --method M       Keep only trials with this method");
                println!("  --age-group G    Keep only trials from this age group");
                println!("  --output DIR     Output directory (default: {DEFAULT_OUTPUT_DIR})");
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

    Args {
        data,
        url,
        output,
        filter,
    }
}

fn run(args: &Args) -> attenuation::Result<()> {
    let rows = load_or_fetch(&PathBuf::from(&args.data), &args.url)?;
    println!("Loaded {} trials from {}", rows.len(), args.data);

    let report = estimate_reliability(&rows, &args.filter, ICC_CONFIDENCE)?;
    println!();
    print!("{}", format_icc_table(&report));
    println!();
    println!("{}", write_up(&report));

    let path = PathBuf::from(&args.output).join(RELIABILITY_FILE_NAME);
    save_report(&report, &path)?;
    println!();
    println!("  Report: {}", path.display());
    Ok(())
}

fn main() {
    attenuation::env_config::init_tracing();
    if let Err(e) = attenuation::env_config::init_base_path() {
        eprintln!("Cannot enter base path: {e}");
        std::process::exit(1);
    }
    let args = parse_args();
    if let Err(e) = run(&args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
