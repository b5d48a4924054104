//! Full report: simulation + figure, power tables, reliability.

use std::path::PathBuf;
use std::time::Instant;

use attenuation::constants::{
    DATASET_CACHE_PATH, DATASET_URL, DEFAULT_OUTPUT_DIR, FIGURE_FILE_NAME, ICC_CONFIDENCE,
    LONG_RECORDS_FILE_NAME, POWER_TABLES_FILE_NAME, RELIABILITY_FILE_NAME, SIMULATION_SEED,
    SIMULATION_SIZE, SUMMARIES_FILE_NAME,
};
use attenuation::figure::render_figure;
use attenuation::power::{
    format_correlation_table, format_effect_size_table, power_tables, save_power_tables,
};
use attenuation::reliability::{
    estimate_reliability, format_icc_table, load_or_fetch, save_report, write_up, TrialFilter,
};
use attenuation::simulation::{
    aggregate_summaries, format_summary_table, save_long_records, save_statistics, simulate,
    to_long, SimulationConfig,
};

struct Args {
    size: usize,
    seed: u64,
    output: String,
    data: String,
    url: String,
    filter: TrialFilter,
    reliability: bool,
    figure: bool,
}

const USAGE: &str = "Usage: attenuation-report [--size N] [--seed S] [--output DIR] [--data PATH] [--url URL] [--method M] [--age-group G] [--no-reliability] [--no-figure]";

fn next_value(args: &[String], i: &mut usize) -> Option<String> {
    *i += 1;
    args.get(*i).cloned()
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

fn parse_args_from(args: &[String]) -> Args {
    let mut parsed = Args {
        size: SIMULATION_SIZE,
        seed: SIMULATION_SEED,
        output: DEFAULT_OUTPUT_DIR.to_string(),
        data: DATASET_CACHE_PATH.to_string(),
        url: DATASET_URL.to_string(),
        filter: TrialFilter::default(),
        reliability: true,
        figure: true,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].clone();
        match flag.as_str() {
            "--size" | "--seed" => {
                let Some(v) = next_value(args, &mut i) else { break };
                let ok = if flag == "--size" {
                    v.parse().map(|n| parsed.size = n).is_ok()
                } else {
                    v.parse().map(|s| parsed.seed = s).is_ok()
                };
                if !ok {
                    eprintln!("Invalid {flag} value: {v}");
                    std::process::exit(1);
                }
            }
            "--output" => parsed.output = next_value(args, &mut i).unwrap_or(parsed.output),
            "--data" => parsed.data = next_value(args, &mut i).unwrap_or(parsed.data),
            "--url" => parsed.url = next_value(args, &mut i).unwrap_or(parsed.url),
            "--method" => parsed.filter.method = next_value(args, &mut i),
            "--age-group" => parsed.filter.age_group = next_value(args, &mut i),
            "--no-reliability" => parsed.reliability = false,
            "--no-figure" => parsed.figure = false,
            "--help" | "-h" => {
                println!("{USAGE}");
                println!();
                println!("Runs the simulation, the power tables and the reliability estimate");
                println!("and writes every output to DIR (default: {DEFAULT_OUTPUT_DIR}).");
                println!("  --no-reliability   Skip the dataset download and ICC estimate");
                println!("  --no-figure        Skip the PNG figure");
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

    if parsed.size < 2 {
        eprintln!("Error: --size must be at least 2");
        std::process::exit(1);
    }
    parsed
}

fn run(args: &Args) -> attenuation::Result<()> {
    let out = PathBuf::from(&args.output);
    let start = Instant::now();

    // ── Simulation ──────────────────────────────────────────────────
    let config = SimulationConfig {
        size: args.size,
        seed: args.seed,
        ..SimulationConfig::default()
    };
    let data = simulate(&config)?;
    let long = to_long(&data);
    let summaries = aggregate_summaries(&long)?;
    println!("== Condition summaries (n = {}, seed = {}) ==", config.size, config.seed);
    print!("{}", format_summary_table(&summaries));
    save_long_records(&long, &out.join(LONG_RECORDS_FILE_NAME))?;
    save_statistics(&summaries, config.seed, config.size, &out.join(SUMMARIES_FILE_NAME))?;
    if args.figure {
        render_figure(&long, &summaries, &out.join(FIGURE_FILE_NAME))?;
    }

    // ── Power ───────────────────────────────────────────────────────
    let tables = power_tables()?;
    println!();
    println!("== Required N (alpha = {}, power = {}) ==", tables.sig_level, tables.power);
    print!("{}", format_effect_size_table(&tables.effect_sizes));
    println!();
    print!("{}", format_correlation_table(&tables.correlations));
    save_power_tables(&tables, &out.join(POWER_TABLES_FILE_NAME))?;

    // ── Reliability ─────────────────────────────────────────────────
    if args.reliability {
        let rows = load_or_fetch(&PathBuf::from(&args.data), &args.url)?;
        let report = estimate_reliability(&rows, &args.filter, ICC_CONFIDENCE)?;
        println!();
        println!("== Reliability ==");
        print!("{}", format_icc_table(&report));
        println!();
        println!("{}", write_up(&report));
        save_report(&report, &out.join(RELIABILITY_FILE_NAME))?;
    }

    println!();
    println!(
        "Outputs in {} ({:.1} s)",
        out.display(),
        start.elapsed().as_secs_f64()
    );
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

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(flags: &[&str]) -> Vec<String> {
        std::iter::once("attenuation-report")
            .chain(flags.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn figure_rendered_by_default() {
        let args = parse_args_from(&argv(&[]));
        assert!(args.figure);
        assert!(args.reliability);
    }

    #[test]
    fn no_figure_flag_skips_rendering() {
        let args = parse_args_from(&argv(&["--no-figure", "--size", "20"]));
        assert!(!args.figure);
        assert!(args.reliability);
        assert_eq!(args.size, 20);
    }
}
