use clap::{ArgAction, Parser as ClapParser, Subcommand};
use gql_lang::cli::{self, CheckOptions, CliError, RunOptions};
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(ClapParser)]
#[command(name = "gql")]
#[command(about = "GQL - A GraphQL-flavored query language over CSV and JSON tables")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG wins when set
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a GQL document against a data directory
    Run {
        /// Query file, or `-` for stdin (read from stdin when omitted)
        query: Option<PathBuf>,

        /// Directory holding the table files
        #[arg(short, long, default_value = "data")]
        data: PathBuf,

        /// SQLite database to read tables from instead of the data directory
        #[arg(long, value_name = "FILE", conflicts_with = "data")]
        db: Option<PathBuf>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Print the resolved syntax tree before the results
        #[arg(long)]
        show_ast: bool,
    },

    /// Validate a GQL document without reading any data
    Check {
        /// Query file, or `-` for stdin (read from stdin when omitted)
        query: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            query,
            data,
            db,
            pretty,
            show_ast,
        } => run(query.as_deref(), data, db, pretty, show_ast),
        Commands::Check { query } => check(query.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_query(path: Option<&Path>) -> Result<String, CliError> {
    match path {
        Some(path) if path != Path::new("-") => {
            fs::read_to_string(path).map_err(|source| CliError::ReadQuery {
                path: path.to_path_buf(),
                source,
            })
        }
        Some(_) => read_stdin(),
        None if !atty::is(atty::Stream::Stdin) => read_stdin(),
        None => Err(CliError::NoInput),
    }
}

fn read_stdin() -> Result<String, CliError> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn run(query: Option<&Path>, data: PathBuf, db: Option<PathBuf>, pretty: bool, show_ast: bool) -> Result<(), CliError> {
    let options = RunOptions {
        query: read_query(query)?,
        data_dir: data,
        database: db,
        pretty,
        show_ast,
    };

    let output = cli::execute_run(&options)?;
    for line in cli::format_printed(&output.printed) {
        eprintln!("{}", line);
    }
    if let Some(ast) = output.ast {
        println!("{}", ast);
    }
    println!("{}", output.json);
    Ok(())
}

fn check(query: Option<&Path>) -> Result<(), CliError> {
    let options = CheckOptions {
        query: read_query(query)?,
    };

    let result = cli::execute_check(&options)?;
    for line in cli::format_printed(&result.printed) {
        println!("{}", line);
    }
    println!(
        "Syntax is valid ({} blocks, {} macros)",
        result.blocks.len(),
        result.macros
    );
    Ok(())
}
