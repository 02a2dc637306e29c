use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::module::FsLoader;
use rox::parser::Parser;
use rox::scanner::{decode_source, Scanner};
use rox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Rox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Directory `import` paths are relative to
    #[arg(long, global = true, value_name = "DIR")]
    module_root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print the token stream as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a Rox program
    Run { filename: Option<PathBuf> },

    /// Starts an interactive session
    Repl,
}

/// Reads the contents of a file into a Vec<u8>
fn read_file(filename: &Path) -> Result<Vec<u8>> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'rox::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Static errors exit with 65, everything else that stops a unit with 70.
fn exit_code(err: &LoxError) -> i32 {
    if err.is_static() {
        65
    } else {
        70
    }
}

fn report_and_exit(err: LoxError) -> ! {
    debug!("Aborting: {:?}", err);
    eprintln!("{}", err);
    std::process::exit(exit_code(&err));
}

fn no_input(command: &str) -> ! {
    info!("No filepath provided for {}", command);
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

fn session(module_root: Option<PathBuf>) -> Interpreter {
    let root: PathBuf = module_root.unwrap_or_else(|| PathBuf::from("."));
    info!("Module root: {:?}", root);

    Interpreter::new().with_loader(Box::new(FsLoader::new(root)))
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    let buf = read_file(filename)?;
    let mut tokens: Vec<Token> = Vec::new();
    let mut tokenized = true;

    for token in Scanner::new(&buf) {
        match token {
            Ok(token) => {
                debug!("Scanned token: {}", token);

                if !json {
                    println!("{}", token);
                }
                tokens.push(token);
            }

            Err(e) => {
                tokenized = false;
                debug!("Tokenization debug: {}", e);
                eprintln!("{}", e);
            }
        }
    }

    if json {
        let rendered = serde_json::to_string_pretty(&tokens).context("Failed to encode tokens")?;
        println!("{}", rendered);
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code 65");
        std::process::exit(65);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn repl(mut interpreter: Interpreter) -> Result<()> {
    info!("Starting REPL");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush().context("Failed to flush prompt")?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;

        if read == 0 {
            println!();
            break;
        }

        if line.trim().is_empty() {
            continue;
        }

        match interpreter.run_repl_line(&line) {
            Ok(Some(value)) => println!("{}", value),
            Ok(None) => {}
            Err(e) => {
                debug!("REPL error: {:?}", e);
                eprintln!("{}", e);
            }
        }
    }

    info!("REPL finished");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        Builder::new()
            .filter_level(log::LevelFilter::Off)
            .parse_default_env()
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => match filename {
            Some(filename) => {
                info!("Running Tokenize subcommand");
                tokenize(&filename, json)?;
            }
            None => no_input("Tokenize"),
        },

        Commands::Parse { filename } => match filename {
            Some(filename) => {
                info!("Running Parse subcommand");
                let buf = read_file(&filename)?;

                let expr = rox::scanner::scan_tokens(&buf)
                    .and_then(|tokens| Parser::new(tokens).parse_expression())
                    .unwrap_or_else(|e| report_and_exit(e));

                let ast_str = AstPrinter::print(&expr);
                debug!("AST: {}", ast_str);
                println!("{}", ast_str);

                info!("Parse subcommand completed");
            }
            None => no_input("Parse"),
        },

        Commands::Evaluate { filename } => match filename {
            Some(filename) => {
                info!("Running Evaluate subcommand");
                let buf = read_file(&filename)?;
                let source = decode_source(buf).unwrap_or_else(|e| report_and_exit(e));

                let mut interpreter = session(args.module_root);

                match interpreter.eval_source(&source) {
                    Ok(value) => {
                        debug!("Evaluated to: {}", value);
                        println!("{}", value);
                    }
                    Err(e) => report_and_exit(e),
                }

                info!("Evaluate subcommand completed");
            }
            None => no_input("Evaluate"),
        },

        Commands::Run { filename } => match filename {
            Some(filename) => {
                info!("Running Run subcommand");
                let buf = read_file(&filename)?;
                let source = decode_source(buf).unwrap_or_else(|e| report_and_exit(e));
                info!("Provided input:\n {}", source);

                let module_root: Option<PathBuf> = args.module_root.or_else(|| {
                    filename
                        .parent()
                        .filter(|dir| !dir.as_os_str().is_empty())
                        .map(Path::to_path_buf)
                });

                let mut interpreter = session(module_root);

                match interpreter.run_source(&source) {
                    Ok(()) => info!("Program executed successfully"),
                    Err(e) => report_and_exit(e),
                }
            }
            None => no_input("Run"),
        },

        Commands::Repl => repl(session(args.module_root))?,
    }

    Ok(())
}
