//! markerlock CLI
//!
//! Usage:
//!   markerlock --replay frames.jsonl            # Replay a recorded observation log
//!   markerlock < frames.jsonl                   # Read batches from stdin
//!   markerlock --serve                          # HTTP API server
//!   markerlock --replay frames.jsonl --json     # JSON output

use clap::Parser;
use std::io::{self, BufReader};
use std::path::PathBuf;

use markerlock::core::{
    run_server, save_snapshot, MarkerSession, ObservationSource, ReplaySource, SessionDriver,
    SnapshotGenerator,
};
use markerlock::logger;
use markerlock::types::{AggregationMode, MarkerError, TickOutput, TrackerConfig, TrustMode};
use markerlock::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "markerlock",
    version = VERSION,
    about = "markerlock - Stable marker layouts and trust scores from noisy detections",
    long_about = "markerlock turns an unreliable stream of marker observations into\n\
                  debounced Detected/Lost events, robust locked poses and a trust score.\n\n\
                  Input is JSON lines, one batch per tick:\n  \
                  {\"time\": 0.1, \"observations\": [{\"id\": \"A\", \"position\": [x, y, z],\n  \
                  \"orientation\": [x, y, z, w]}]}\n\n\
                  Modes:\n  \
                  --replay FILE  Replay a recorded log\n  \
                  (default)      Read batches from stdin\n  \
                  --serve        HTTP API server mode\n\n\
                  Trust modes:\n  \
                  IDLE      - Nothing learned\n  \
                  SETUP     - Scanning and learning co-visibility\n  \
                  GAMEPLAY  - Layout locked, trust scored every tick"
)]
struct Args {
    /// Replay a JSON-lines observation log
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Place markers on detection instead of scanning then locking
    #[arg(long)]
    live_follow: bool,

    /// Override the scan window length (seconds)
    #[arg(long)]
    scan_duration: Option<f64>,

    /// Override the lost timeout (seconds)
    #[arg(long)]
    lost_timeout: Option<f64>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Print every tick, not only ticks with events
    #[arg(long)]
    verbose: bool,

    /// Diagnostic log level (off, error, warn, info, debug, trace);
    /// falls back to MARKERLOCK_LOG, then warn
    #[arg(long)]
    log_level: Option<String>,

    /// Directory for layout snapshots (default: ./layouts)
    #[arg(long, default_value = "./layouts")]
    snapshot_dir: String,

    /// Disable saving a layout snapshot after a replay locks
    #[arg(long)]
    no_snapshot: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let installed = match args.log_level.as_deref() {
        Some(name) => {
            let level = logger::parse_level(name).unwrap_or_else(|| {
                eprintln!("Unknown log level {:?}, using warn", name);
                log::LevelFilter::Warn
            });
            logger::init_with_level(level)
        }
        None => logger::init_from_env(log::LevelFilter::Warn),
    };
    if let Err(e) = installed {
        eprintln!("logger already installed: {}", e);
    }

    if args.serve {
        run_serve(&args).await;
        return;
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}: {}", e.reason().code(), e);
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let source = match &args.replay {
        Some(path) => match ReplaySource::open(path) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("Cannot open {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ReplaySource::from_reader(BufReader::new(io::stdin())),
    };

    if let Err(e) = run_replay(source, config, &args) {
        eprintln!("Replay failed: {}", e);
        std::process::exit(1);
    }
}

/// Config file (or defaults) with flag overrides applied, validated
fn load_config(args: &Args) -> Result<TrackerConfig, MarkerError> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::from_json_file(path)?,
        None => TrackerConfig::default(),
    };
    if args.live_follow {
        config.aggregation_mode = AggregationMode::LiveFollow;
    }
    if let Some(scan_duration) = args.scan_duration {
        config.scan_duration = scan_duration;
    }
    if let Some(lost_timeout) = args.lost_timeout {
        config.lost_timeout = lost_timeout;
    }
    config.validate()?;
    Ok(config)
}

/// Drive a session through every batch of `source`
fn run_replay(mut source: ReplaySource, config: TrackerConfig, args: &Args) -> Result<(), MarkerError> {
    let mut session = MarkerSession::new(config)?;

    print_header(args);

    let Some(first) = source.next_batch() else {
        println!("No observation batches.");
        return Ok(());
    };
    session.begin_setup(first.time)?;
    let output = session.tick(first.time, &first.observations);
    print_tick(&output, args);

    let mut driver = SessionDriver::new(session, Some(Box::new(source)));
    let ticks = driver.run(|output| print_tick(output, args)) + 1;
    let session = driver.into_session();

    println!();
    println!(
        "Ticks: {} | Locked: {} | Hits: {} | Trust: {:.3} ({})",
        ticks,
        session.aggregator().locked_count(),
        session.hits().total_hits(),
        session.current_trust(),
        session.trust_mode()
    );

    if !args.no_snapshot && session.locker_state().is_locked() {
        let snapshot = SnapshotGenerator::new().generate(session.aggregator(), session.trust())?;
        let path = save_snapshot(&snapshot, &args.snapshot_dir)?;
        let (cyan, reset) = if args.no_color { ("", "") } else { ("\x1b[36m", "\x1b[0m") };
        println!("{}  LAYOUT SAVED: {}{}", cyan, path, reset);
        println!("  Fingerprint: {}", &snapshot.fingerprint_hex()[..16]);
    }
    Ok(())
}

/// Print one tick according to the output flags
fn print_tick(output: &TickOutput, args: &Args) {
    if !output.has_events() && !args.verbose {
        return;
    }
    if args.json {
        match serde_json::to_string(output) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("tick output not serializable: {}", e),
        }
    } else if args.no_color {
        println!("{}", output.to_parseable_string());
    } else {
        println!("{}", output.to_terminal_string());
    }
}

/// Print header
fn print_header(args: &Args) {
    if args.json {
        return;
    }
    if args.no_color {
        println!("========================================");
        println!("  markerlock v{}", VERSION);
        println!("========================================");
    } else {
        println!(
            "\x1b[1m{} markerlock v{}\x1b[0m",
            TrustMode::Setup.emoji(),
            VERSION
        );
    }
    println!();
}

/// Run HTTP API server
async fn run_serve(args: &Args) {
    println!();
    println!("markerlock API server v{}", VERSION);
    println!();

    if let Err(e) = run_server(&args.addr).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
