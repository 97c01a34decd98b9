use clap::{Args, Parser, Subcommand};
use console::style;
use dvpl::{FileEvent, Mode, Tally, TraversalOptions, Walker};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "dvpl", version, about = "Convert files to and from DVPL containers (LZ4)")]
struct Cli {
    /// Only print failures and the final summary
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Log every file decision
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack every file under PATH into a .dvpl container
    Compress(ConvertArgs),
    /// Unpack every .dvpl container under PATH
    Decompress(ConvertArgs),
    /// Check every .dvpl container under PATH without writing anything
    Verify {
        /// File or directory (default: current directory)
        path: Option<PathBuf>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the footer of a single container
    Info {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ConvertArgs {
    /// File or directory (default: current directory)
    path: Option<PathBuf>,
    /// Keep the source files after conversion
    #[arg(short, long)]
    keep_originals: bool,
    /// Comma-separated extensions to skip, e.g. `.exe,.dll`
    #[arg(short, long, value_delimiter = ',')]
    ignore: Vec<String>,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    mode:       Mode,
    path:       &'a Path,
    #[serde(flatten)]
    tally:      Tally,
    elapsed_ms: u128,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {

        // ── Compress / Decompress ────────────────────────────────────────────
        Commands::Compress(args) => convert(Mode::Compress, args, cli.quiet),
        Commands::Decompress(args) => convert(Mode::Decompress, args, cli.quiet),

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { path, json } => {
            let opts = with_self_excluded(TraversalOptions::new(Mode::Verify));
            run(&opts, resolve_root(path)?, json, cli.quiet)
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, json } => {
            let data = std::fs::read(&input)?;
            let footer = match dvpl::inspect(&data) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("{} {}: {}", style("Invalid").red(), input.display(), e);
                    return Ok(ExitCode::from(1));
                }
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&footer)?);
                return Ok(ExitCode::SUCCESS);
            }
            let kind = footer
                .compression_type()
                .map(|k| k.name())
                .unwrap_or("unknown");
            println!("── DVPL container ───────────────────────────────────────");
            println!("  Path            {}", input.display());
            println!("  Original size   {} B", footer.original_size);
            println!("  Compressed size {} B", footer.compressed_size);
            println!("  CRC32           {:08x}", footer.crc32);
            println!("  Type            {} ({})", footer.kind, kind);
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn convert(mode: Mode, args: ConvertArgs, quiet: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let opts = with_self_excluded(
        TraversalOptions::new(mode)
            .keep_originals(args.keep_originals)
            .ignore(&args.ignore),
    );
    run(&opts, resolve_root(args.path)?, args.json, quiet)
}

fn run(opts: &TraversalOptions, root: PathBuf, json: bool, quiet: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mode = opts.mode;
    let started = Instant::now();
    let result = Walker::new(opts)
        .on_event(|event| report(event, mode, quiet || json))
        .run(&root);
    let elapsed = started.elapsed();

    let tally = match result {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} {}", style(format!("{} FAILED:", mode.name().to_uppercase())).red(), e);
            return Ok(ExitCode::from(2));
        }
    };

    if json {
        let summary = Summary { mode, path: &root, tally, elapsed_ms: elapsed.as_millis() };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{}. Successful: {}, Failed: {}, Ignored: {}",
            style(format!("{} FINISHED", mode.name().to_uppercase())).green(),
            style(tally.success).green(),
            style(tally.failure).red(),
            style(tally.ignored).yellow(),
        );
        print_elapsed(elapsed);
    }

    Ok(if tally.failure > 0 { ExitCode::from(1) } else { ExitCode::SUCCESS })
}

fn report(event: &FileEvent<'_>, mode: Mode, quiet: bool) {
    match event {
        FileEvent::Failed { path, error } => {
            println!("{} {} failed to {}: {}", style("File").red(), path.display(), mode.name(), style(error).red());
        }
        _ if quiet => {}
        FileEvent::Converted { source, output } => {
            println!("{} {} {} into {}", style("File").green(), source.display(), mode.past_tense(), style(output.display()).green());
        }
        FileEvent::Verified { path } => {
            println!("{} {} verified", style("File").green(), path.display());
        }
        FileEvent::Ignored { path, .. } => {
            println!("{} {}", style("Ignoring").yellow(), path.display());
        }
        // Logged through tracing by the walker.
        FileEvent::Skipped { .. } | FileEvent::RemoveFailed { .. } => {}
    }
}

fn print_elapsed(elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let text = if secs < 1.0 {
        style(format!("{} ms", elapsed.as_millis())).green()
    } else if secs < 60.0 {
        style(format!("{} s", secs.round() as u64)).yellow()
    } else {
        style(format!("{} min", (secs / 60.0).round() as u64)).red()
    };
    println!("Processing took {text}");
}

fn resolve_root(path: Option<PathBuf>) -> std::io::Result<PathBuf> {
    match path {
        Some(p) => Ok(p),
        None    => std::env::current_dir(),
    }
}

/// Keep the tool from packing its own executable when run from its folder.
fn with_self_excluded(opts: TraversalOptions) -> TraversalOptions {
    match std::env::current_exe() {
        Ok(exe) => opts.exclude(exe),
        Err(_)  => opts,
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else if quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
