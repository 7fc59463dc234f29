use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use clap::Parser;
use log::{LevelFilter, debug, info};

use nassi::Options;
use nassi::document::output_name;
use nassi::interpreter::DEFAULT_MAX_STEPS;

#[derive(Parser, Debug)]
#[command(
    name = "nassi",
    about = "Draw a Python function as a Nassi-Shneiderman structogram (struktex LaTeX)"
)]
struct Cli {
    /// Python source file holding the function
    file: PathBuf,

    /// Function to draw (defaults to the first one in the file)
    #[arg(long, short = 'f')]
    function: Option<String>,

    /// Output file; used only if it ends in .tex, else structogram_<name>.tex
    #[arg(long, short = 'o')]
    output: Option<String>,

    /// Do not run the function to record its output
    #[arg(long)]
    no_dry_run: bool,

    /// Print the markup and the recorded output
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Answer input() calls of the dry run from this file instead of stdin
    #[arg(long)]
    stdin_file: Option<PathBuf>,

    /// Statements the dry run may execute before it is cut off
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: u64,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();

    let log_level = LevelFilter::from_str(&cli.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using 'warn' instead.", cli.log_level);
        LevelFilter::Warn
    });
    let log_level = if cli.verbose {
        log_level.max(LevelFilter::Debug)
    } else {
        log_level
    };
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();
    debug!(cli:?; "parsed arguments");

    let source = fs::read_to_string(&cli.file).unwrap_or_else(|e| {
        eprintln!("ERROR: failed to read {}: {e}", cli.file.display());
        process::exit(1);
    });

    let input: Box<dyn BufRead> = match &cli.stdin_file {
        Some(path) => match File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                eprintln!("ERROR: failed to open {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => Box::new(io::stdin().lock()),
    };

    let options = Options {
        dry_run: !cli.no_dry_run,
        verbose: cli.verbose,
        max_steps: cli.max_steps,
    };

    let structogram = match nassi::generate(&source, cli.function.as_deref(), &options, input) {
        Ok(structogram) => structogram,
        Err(e) => {
            eprintln!("ERROR: {e}");
            process::exit(1);
        }
    };

    let path = output_name(&structogram.function, cli.output.as_deref());
    if let Err(e) = fs::write(&path, &structogram.document) {
        eprintln!("ERROR: failed to write {path}: {e}");
        process::exit(1);
    }
    info!(path = path.as_str(); "structogram written");

    if options.verbose {
        println!("{}", structogram.report());
    }
    println!("Wrote {path}");
}
