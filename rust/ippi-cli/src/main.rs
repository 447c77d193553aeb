//! ippi: command-line interpreter for IPPcode programs.

use clap::{Parser as ClapParser, Subcommand};
use ippi_cli::colors::{bold, gray, green, red};
use ippi_cli::config::{IppiConfig, CONFIG_FILE};
use ippi_cli::runner::{self, CliError, INTERNAL_STATUS};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "ippi", version, about = "Interpreter for IPPcode programs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a program without running it
    Check {
        /// Path to the JSON program
        #[arg()]
        file: PathBuf,

        /// Print the instructions in execution order
        #[arg(long)]
        list: bool,
    },
    /// Validate and run a program
    Run {
        /// Path to the JSON program
        #[arg()]
        file: PathBuf,

        /// Read `read` input from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,

        /// Abort after this many instructions
        #[arg(long)]
        max_steps: Option<u64>,

        /// Log frame, call and diagnostic events to stderr
        #[arg(long, short)]
        verbose: bool,
    },
    /// Write a default ippi.toml in the current directory
    Init,
}

fn main() {
    let cli = Cli::parse();

    let config = match IppiConfig::load() {
        Ok(found) => found.map(|(_path, cfg)| cfg).unwrap_or_default(),
        Err(e) => fail(&CliError::from(e)),
    };
    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    init_logging(&config.log_directive(verbose));

    match cli.command {
        Commands::Check { file, list } => cmd_check(&file, list),
        Commands::Run {
            file,
            input,
            max_steps,
            verbose: _,
        } => cmd_run(&file, input.as_deref(), max_steps, &config),
        Commands::Init => cmd_init(),
    }
}

/// `RUST_LOG` when set, otherwise `directive`.
fn init_logging(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

fn fail(err: &CliError) -> ! {
    eprintln!("{} {}", red("error:"), err);
    std::process::exit(err.exit_code());
}

fn cmd_check(file: &Path, list: bool) {
    let program = runner::load_program(file).unwrap_or_else(|e| fail(&e));
    if list {
        for ins in program.instructions() {
            println!("{}", ins);
        }
    }
    println!(
        "{} {} {}",
        green("✓"),
        bold(&file.display().to_string()),
        gray(&format!(
            "{} instructions, {} labels",
            program.len(),
            program.label_count()
        ))
    );
}

fn cmd_run(file: &Path, input: Option<&Path>, max_steps: Option<u64>, config: &IppiConfig) {
    let program = runner::load_program(file).unwrap_or_else(|e| fail(&e));
    let options = config.exec_options(max_steps);

    let stdout = io::stdout();
    let mut output = BufWriter::new(stdout.lock());
    let result = match input {
        Some(path) => {
            let reader = File::open(path).map(BufReader::new).unwrap_or_else(|source| {
                fail(&CliError::Open {
                    path: path.to_path_buf(),
                    source,
                })
            });
            runner::run_program(program, &mut output, reader, options)
        }
        None => runner::run_program(program, &mut output, io::stdin().lock(), options),
    };

    match result {
        Ok(status) => std::process::exit(status.code()),
        Err(e) => fail(&e),
    }
}

fn cmd_init() {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        eprintln!("{} {} already exists, not overwriting", red("error:"), CONFIG_FILE);
        std::process::exit(INTERNAL_STATUS);
    }
    if let Err(e) = std::fs::write(path, IppiConfig::default_template()) {
        eprintln!("{} writing {}: {}", red("error:"), CONFIG_FILE, e);
        std::process::exit(INTERNAL_STATUS);
    }
    println!("{} {}", green("created"), CONFIG_FILE);
}
