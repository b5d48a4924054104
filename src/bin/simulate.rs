use std::path::PathBuf;
use std::time::Instant;

use attenuation::constants::{
    DEFAULT_OUTPUT_DIR, FIGURE_FILE_NAME, LONG_RECORDS_FILE_NAME, SIMULATION_SEED,
    SIMULATION_SIZE, SUMMARIES_FILE_NAME,
};
use attenuation::figure::render_figure;
use attenuation::simulation::{
    aggregate_summaries, format_summary_table, save_long_records, save_statistics, simulate,
    to_long, SimulationConfig,
};

struct Args {
    size: usize,
    seed: u64,
    output: String,
    figure: bool,
}

const USAGE: &str = "Usage: attenuation-simulate [--size N] [--seed S] [--output DIR] [--no-figure]";

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut size = SIMULATION_SIZE;
    let mut seed = SIMULATION_SEED;
    let mut output = DEFAULT_OUTPUT_DIR.to_string();
    let mut figure = true;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--size" => {
                i += 1;
                if i < args.len() {
                    size = args[i].parse().unwrap_or_else(|_| {
                        eprintln!("Invalid --size value: {}", args[i]);
                        std::process::exit(1);
                    });
                }
            }
            "--seed" => {
                i += 1;
                if i < args.len() {
                    seed = args[i].parse().unwrap_or_else(|_| {
                        eprintln!("Invalid --seed value: {}", args[i]);
                        std::process::exit(1);
                    });
                }
            }
            "--output" => {
                i += 1;
                if i < args.len() {
                    output = args[i].clone();
                }
            }
            "--no-figure" => {
                figure = false;
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                println!();
                println!("Options:");
                println!("  --size N       Subjects per condition (default: {SIMULATION_SIZE})");
                println!("  --seed S       RNG seed (default: {SIMULATION_SEED})");
                println!("  --output DIR   Output directory (default: {DEFAULT_OUTPUT_DIR})");
                println!("  --no-figure    Skip the PNG figure");
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

    if size < 2 {
        eprintln!("Error: --size must be at least 2");
        std::process::exit(1);
    }

    Args {
        size,
        seed,
        output,
        figure,
    }
}

fn run(args: &Args) -> attenuation::Result<()> {
    let config = SimulationConfig {
        size: args.size,
        seed: args.seed,
        ..SimulationConfig::default()
    };
    println!(
        "Attenuation simulation ({} subjects per condition, seed {})",
        config.size, config.seed
    );

    let t0 = Instant::now();
    let data = simulate(&config)?;
    let long = to_long(&data);
    let summaries = aggregate_summaries(&long)?;
    let sim_ms = t0.elapsed().as_secs_f64() * 1000.0;

    println!();
    print!("{}", format_summary_table(&summaries));
    println!();

    let out = PathBuf::from(&args.output);
    save_long_records(&long, &out.join(LONG_RECORDS_FILE_NAME))?;
    save_statistics(&summaries, config.seed, config.size, &out.join(SUMMARIES_FILE_NAME))?;
    println!("  Records:   {}", out.join(LONG_RECORDS_FILE_NAME).display());
    println!("  Summaries: {}", out.join(SUMMARIES_FILE_NAME).display());

    if args.figure {
        let t1 = Instant::now();
        render_figure(&long, &summaries, &out.join(FIGURE_FILE_NAME))?;
        println!(
            "  Figure:    {} ({:.0} ms)",
            out.join(FIGURE_FILE_NAME).display(),
            t1.elapsed().as_secs_f64() * 1000.0
        );
    }
    println!("  Simulation + aggregation: {:.1} ms", sim_ms);
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
