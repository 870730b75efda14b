use clap::Parser;
use tracing_subscriber::EnvFilter;

use eqbc::cli::{self, CliArgs, StartupAction};
use eqbc::display::StdoutDisplay;
use eqbc::event_loop::EventLoop;
use eqbc::registry::ConnectionRegistry;
use eqbc::store::{self, FileStore};

/// Log to stderr; stdout belongs to the session display.
fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_env("EQBC_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(args.debug);

    let path = args.store.clone().unwrap_or_else(cli::default_store_path);
    let file_store = match FileStore::open(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("eqbc: can't open state file: {e}");
            std::process::exit(1);
        }
    };
    let state_line = format!("State file: {}", file_store.path().display());
    let store = store::shared(file_store);

    let last = ConnectionRegistry::new(store.clone()).load();
    let mut event_loop = EventLoop::new(store, Box::new(StdoutDisplay));

    let ver = env!("CARGO_PKG_VERSION");
    event_loop.push_output(&format!("eqbc version {ver}"));
    event_loop.push_output(&state_line);
    event_loop.push_output("Type `connect <host> <port> <name>', `/hotkeys', or `/quit'.");

    match args.startup(last.as_ref()) {
        StartupAction::Idle => {}
        StartupAction::Connect(target) => event_loop.connect(target).await,
        StartupAction::ReconnectLast => event_loop.reconnect().await,
    }

    if let Err(e) = event_loop.run().await {
        eprintln!("eqbc: {e}");
        std::process::exit(1);
    }
}
