//! `brld` entrypoint: parses the handful of flags this daemon accepts,
//! loads preferences, wires up the reactor-driven [`daemon::Daemon`], and
//! runs it until a termination signal (or a fatal bootstrap error) ends the
//! process with the appropriate exit code (spec §6 "Exit codes").

mod commands;
mod daemon;
mod drivers;

use std::path::PathBuf;
use std::sync::Once;

use clap::Parser;
use core_termination::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;

/// Command-line surface. The concrete driver/transport flags a real
/// deployment needs (serial port, key table, speech driver name, ...) are
/// an explicit spec Non-goal; this binary only exposes what the core
/// itself consumes.
#[derive(Parser, Debug)]
#[command(name = "brld", version, about = "Braille display and speech relay daemon")]
struct Args {
    /// Overrides preference-file discovery (see `core_config::discover`).
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Run one bootstrap-and-shutdown cycle instead of serving forever.
    /// Exists so packaging and smoke tests can verify the daemon starts
    /// cleanly without leaving a process behind.
    #[arg(long = "self-test")]
    self_test: bool,
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = std::path::Path::new(".");
    let file_appender = tracing_appender::rolling::never(log_dir, "brld.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .try_init()
    {
        Ok(()) => Some(guard),
        Err(_) => None, // a subscriber is already installed (e.g. under test harnesses)
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn main() {
    let args = Args::parse();
    let _log_guard = configure_logging();
    install_panic_hook();

    let config = match core_config::load_from(args.config.clone()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(target: "runtime", %err, "failed to load configuration");
            std::process::exit(ExitCode::Fatal.code());
        }
    };

    let mut daemon = match daemon::Daemon::new(config) {
        Ok(daemon) => daemon,
        Err(err) => {
            tracing::error!(target: "runtime", %err, "daemon bootstrap failed");
            std::process::exit(ExitCode::Fatal.code());
        }
    };

    if args.self_test {
        tracing::info!(target: "runtime", "self-test: bootstrap succeeded, exiting without serving");
        std::process::exit(ExitCode::Success.code());
    }

    match daemon.run() {
        Ok(()) => std::process::exit(ExitCode::Success.code()),
        Err(err) => {
            tracing::error!(target: "runtime", %err, "daemon exited with error");
            std::process::exit(ExitCode::Fatal.code());
        }
    }
}
