mod server;

use anyhow::Result;
use logcast_file::{FileSnapshotSource, FileTailProvider};
use logcast_framework::{
    Broadcaster, HtmlEntryFormatter, StartPosition, TailDesc, desc::DEFAULT_LOG_FILE_PATH,
    spawn_provider_thread,
};
use server::{AppState, ServerDesc};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::{
    env, io,
    net::IpAddr,
    path::PathBuf,
    str::FromStr,
    sync::{Arc, atomic::Ordering},
    time::Duration,
};
use tokio::sync::watch;

fn print_usage() {
    eprintln!("Usage: logcast [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Streams lines appended to FILE (default: {}) to browser viewers.", DEFAULT_LOG_FILE_PATH);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --port, -p <PORT>        Listen port (default: 3000, env LOGCAST_PORT)");
    eprintln!("  --bind <ADDR>            Listen address (default: 127.0.0.1, env LOGCAST_BIND)");
    eprintln!("  --interval-ms <MS>       Poll interval in milliseconds (default: 1000)");
    eprintln!("  --chunk-size <BYTES>     Backward read chunk size (default: 1024)");
    eprintln!("  --batch-size <LINES>     Most new lines pushed per poll (default: 10)");
    eprintln!("  --snapshot-size <LINES>  Lines sent to a new viewer (default: 10)");
    eprintln!("  --from-start             Replay the file from the beginning on start-up");
    eprintln!("  --page <FILE>            Serve this landing page instead of the built-in one");
    eprintln!("  --verbose, -v            Log debug output");
    eprintln!("  --help, -h               Print this help message");
    eprintln!();
    eprintln!("The log file path can also be set with LOGCAST_LOG_FILE.");
}

struct Options {
    tail: TailDesc,
    server: ServerDesc,
    verbose: bool,
}

enum UsageOptions {
    Run(Box<Options>),
    Help,
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

fn parse_value<T: FromStr>(flag: &str, value: Option<&String>) -> Result<T, io::Error> {
    let value = value.ok_or_else(|| invalid(format!("Missing value for {}", flag)))?;
    value
        .parse()
        .map_err(|_| invalid(format!("Invalid value for {}: {}", flag, value)))
}

impl UsageOptions {
    /// `lookup_env` is `std::env::var` in production, injectable for tests
    fn from_args<E>(args: &[String], lookup_env: E) -> Result<Self, io::Error>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut tail = TailDesc::default();
        let mut server = ServerDesc::default();
        let mut verbose = false;

        if let Some(path) = lookup_env("LOGCAST_LOG_FILE") {
            tail.log_file_path = PathBuf::from(path);
        }
        if let Some(port) = lookup_env("LOGCAST_PORT") {
            server.port = parse_value("LOGCAST_PORT", Some(&port))?;
        }
        if let Some(bind) = lookup_env("LOGCAST_BIND") {
            server.bind = parse_value::<IpAddr>("LOGCAST_BIND", Some(&bind))?;
        }

        let mut file_given = false;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Self::Help),
                "--port" | "-p" => server.port = parse_value(arg, iter.next())?,
                "--bind" => server.bind = parse_value(arg, iter.next())?,
                "--interval-ms" => {
                    let ms: u64 = parse_value(arg, iter.next())?;
                    if ms == 0 {
                        return Err(invalid("--interval-ms must be positive".to_string()));
                    }
                    tail.poll_interval = Duration::from_millis(ms);
                }
                "--chunk-size" => {
                    tail.chunk_size = parse_value(arg, iter.next())?;
                    if tail.chunk_size == 0 {
                        return Err(invalid("--chunk-size must be positive".to_string()));
                    }
                }
                "--batch-size" => {
                    tail.batch_size = parse_value(arg, iter.next())?;
                    if tail.batch_size == 0 {
                        return Err(invalid("--batch-size must be positive".to_string()));
                    }
                }
                "--snapshot-size" => tail.snapshot_size = parse_value(arg, iter.next())?,
                "--from-start" => tail.start_position = StartPosition::Beginning,
                "--page" => server.page = Some(parse_value(arg, iter.next())?),
                "--verbose" | "-v" => verbose = true,
                flag if flag.starts_with('-') => {
                    return Err(invalid(format!("Unknown option: {}", flag)));
                }
                path => {
                    if file_given {
                        return Err(invalid("Only one log file can be tailed".to_string()));
                    }
                    tail.log_file_path = PathBuf::from(path);
                    file_given = true;
                }
            }
        }

        Ok(Self::Run(Box::new(Options {
            tail,
            server,
            verbose,
        })))
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str("logcast")
        .build();
    // a second init only fails if a logger is already installed
    let _ = TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto);
}

#[tokio::main]
async fn main() -> Result<()> {
    // Collect args excluding the binary name
    let args: Vec<String> = env::args().skip(1).collect();
    let options = match UsageOptions::from_args(&args, |key| env::var(key).ok()) {
        Ok(UsageOptions::Run(options)) => options,
        Ok(UsageOptions::Help) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{}", e);
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    init_logger(options.verbose);
    run(*options).await
}

async fn run(options: Options) -> Result<()> {
    let Options { tail, server, .. } = options;

    let broadcaster = Arc::new(Broadcaster::new(
        Arc::new(FileSnapshotSource::new(&tail)),
        Arc::new(HtmlEntryFormatter),
        tail.snapshot_size,
    ));

    // bind before spawning the poller so a taken port fails fast
    let listener = server::bind(&server).await?;

    let provider = FileTailProvider::new(&tail);
    let (provider_thread, provider_stop) =
        spawn_provider_thread(provider, broadcaster.clone(), tail.poll_interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Shutdown requested"),
            Err(e) => log::error!("Failed to listen for Ctrl-C: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let state = AppState {
        broadcaster,
        page: server.page.clone().map(Arc::new),
        shutdown: shutdown_rx.clone(),
    };
    let served = server::serve(listener, state, server::shutdown_signal(shutdown_rx)).await;

    provider_stop.store(true, Ordering::Relaxed);
    if tokio::task::spawn_blocking(move || provider_thread.join())
        .await
        .is_err()
    {
        log::error!("Provider thread panicked");
    }

    served
}
