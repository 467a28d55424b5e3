//! dualcon - serial + telnet style console demo
//!
//! Runs the console on a workstation: the controlling terminal plays the
//! serial line and a TCP listener plays the telnet server. Type commands on
//! either side; everything printed shows up on both.
//!
//! # Quick Start
//!
//! ```text
//! dualcon                 # listen on port 23 (from config.toml)
//! dualcon -p 2323         # listen on port 2323
//! telnet localhost 2323   # join from another terminal
//! ```
//!
//! # Commands
//!
//! | Command | Action |
//! |---------|--------|
//! | help | List commands |
//! | echo <words...> | Print the words back |
//! | add <a> <b> | Add two numbers |
//! | autocr on/off | CR after LF |
//! | inputecho on/off | Keystroke echo on both channels |
//! | crossecho on/off | Mirror keystrokes across channels |
//! | sync on/off | Synchronous remote writes |
//! | timeout <ms> | Idle timeout (0 disables) |
//! | status | Show connections and options |
//! | quit | Exit |

use std::env;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dualcon::config::{data_dir, Config};
use dualcon::core::{Clock, EchoFlags};
use dualcon::host::{StdioChannel, TcpRemote};
use dualcon::{Arity, Channel, Console, ConsoleError, RemoteChannel};

type HostConsole = Console<StdioChannel, TcpRemote>;

/// Command line options
#[derive(Default)]
struct Args {
    port: Option<u16>,
    bind: Option<String>,
    timeout_ms: Option<u64>,
    no_echo: bool,
    config_path: Option<PathBuf>,
}

/// What the main loop should do after a command
enum Flow {
    Continue,
    Quit,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pause between polls
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn print_version() {
    eprintln!("dualcon {}", VERSION);
}

fn print_help() {
    eprintln!("dualcon {} - serial + network duplex console", VERSION);
    eprintln!();
    eprintln!("Usage: dualcon [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -p, --port <PORT>     TCP port to listen on (default 23)");
    eprintln!("  -b, --bind <ADDR>     Address to bind (default 0.0.0.0)");
    eprintln!("  -t, --timeout <MS>    Command idle timeout, 0 disables");
    eprintln!("      --no-echo         Disable keystroke echo");
    eprintln!("  -c, --config <PATH>   Configuration file");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.dualcon/config.toml");
    eprintln!("Log file:      ~/.dualcon/dualcon.log (level from DUALCON_LOG)");
    eprintln!();
    eprintln!("Exit: type 'quit' or press Ctrl+C");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    let value = |i: usize, what: &str| -> Result<String, String> {
        args.get(i).cloned().ok_or_else(|| format!("Missing {} argument", what))
    };

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-p" | "--port" => {
                i += 1;
                let port = value(i, "port")?;
                parsed.port = Some(port.parse().map_err(|_| format!("Invalid port: {}", port))?);
            }
            "-b" | "--bind" => {
                i += 1;
                parsed.bind = Some(value(i, "bind")?);
            }
            "-t" | "--timeout" => {
                i += 1;
                let ms = value(i, "timeout")?;
                parsed.timeout_ms = Some(ms.parse().map_err(|_| format!("Invalid timeout: {}", ms))?);
            }
            "--no-echo" => {
                parsed.no_echo = true;
            }
            "-c" | "--config" => {
                i += 1;
                parsed.config_path = Some(PathBuf::from(value(i, "config")?));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to ~/.dualcon/dualcon.log; stdout belongs to the console
fn init_logging() {
    let log_path = data_dir()
        .map(|dir| dir.join("dualcon.log"))
        .unwrap_or_else(|| PathBuf::from("dualcon.log"));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("DUALCON_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    // Command line overrides the file
    if let Some(port) = args.port {
        config.remote.port = port;
    }
    if let Some(bind) = &args.bind {
        config.remote.bind = bind.clone();
    }
    if let Some(ms) = args.timeout_ms {
        config.console.idle_timeout_ms = ms;
    }
    if args.no_echo {
        config.console.echo_local = false;
        config.console.echo_remote = false;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("dualcon {} starting...", VERSION);

    let config = load_config(&args)?;

    let remote = match TcpRemote::bind(config.listen_addr()) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to bind {}: {}", config.listen_addr(), e);
            return Err(e.into());
        }
    };
    let port = remote.port();
    let local = StdioChannel::start()?;

    let mut console = Console::new(local, remote);
    config.apply(&mut console);
    info!("Listening on {}", config.listen_addr());

    console.println(&format!("Server listening on port {}", port));
    console.println("Local console started");
    console.println("");
    let prompt = config.console.prompt.clone();
    console.cmd_init(Some(&prompt));

    run_main_loop(&mut console, &prompt);

    console.println("");
    console.flush();
    info!("dualcon exiting");
    Ok(())
}

/// Poll the console until the operator quits
fn run_main_loop(console: &mut HostConsole, prompt: &str) {
    loop {
        if console.local().interrupted() {
            info!("Interrupted");
            break;
        }

        if console.cmd_available() {
            let flow = handle_command(console);
            console.cmd_init(Some(prompt));
            if let Flow::Quit = flow {
                break;
            }
        } else {
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Parse an on/off parameter, reporting anything else
fn on_off(console: &mut HostConsole) -> Option<bool> {
    match console.cmd_param_str(1) {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => {
            console.send_error_message("Expected 'on' or 'off'.");
            None
        }
    }
}

fn handle_command(console: &mut HostConsole) -> Flow {
    if console.cmd_equal("help", Arity::Exactly(0)) {
        console.println("help | echo <words...> | add <a> <b> | autocr on|off");
        console.println("inputecho on|off | crossecho on|off | sync on|off");
        console.println("timeout <ms> | status | quit");
    } else if console.cmd_equal("echo", Arity::Any) {
        let words: Vec<String> = (1..=console.cmd_num_params())
            .filter_map(|n| console.cmd_param_str(n).map(str::to_string))
            .collect();
        console.println(&words.join(" "));
    } else if console.cmd_equal("add", Arity::Exactly(2)) {
        let sum = console.cmd_param_f64(1) + console.cmd_param_f64(2);
        let _ = write!(console, "{}\r\n", sum);
    } else if console.cmd_equal("autocr", Arity::Exactly(1)) {
        if let Some(on) = on_off(console) {
            console.set_auto_cr(on);
        }
    } else if console.cmd_equal("inputecho", Arity::Exactly(1)) {
        if let Some(on) = on_off(console) {
            console.set_input_echo_all(on);
        }
    } else if console.cmd_equal("crossecho", Arity::Exactly(1)) {
        if let Some(on) = on_off(console) {
            console.set_cross_echo(on);
        }
    } else if console.cmd_equal("sync", Arity::Exactly(1)) {
        if let Some(on) = on_off(console) {
            console.set_remote_sync(on);
        }
    } else if console.cmd_equal("timeout", Arity::Exactly(1)) {
        let ms = console.cmd_param_int(1).max(0) as u64;
        console.set_idle_timeout(ms);
        let effective = console.idle_timeout_ms();
        let _ = write!(console, "timeout={}ms\r\n", effective);
    } else if console.cmd_equal("status", Arity::Exactly(0)) {
        print_status(console);
    } else if console.cmd_equal("quit", Arity::Exactly(0)) {
        console.println("bye");
        return Flow::Quit;
    } else if is_unknown_command(console) {
        console.send_error(ConsoleError::InvalidCommand);
    }
    Flow::Continue
}

/// A complete line whose verb is not a built-in (or not even text).
///
/// Known verbs with a bad parameter count were already reported by `cmd_equal`.
fn is_unknown_command<L: Channel, R: RemoteChannel, C: Clock>(console: &Console<L, R, C>) -> bool {
    console.command().is_complete() && !console.cmd_verb().map_or(false, is_known_verb)
}

fn is_known_verb(verb: &str) -> bool {
    matches!(
        verb,
        "help" | "echo" | "add" | "autocr" | "inputecho" | "crossecho" | "sync" | "timeout" | "status" | "quit"
    )
}

fn print_status(console: &mut HostConsole) {
    let remote = console.check_connection();
    let peer = console
        .remote()
        .peer()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    let flags = console.echo_flags();
    let synced = console.is_remote_synced();
    let timeout = console.idle_timeout_ms();
    let on = |f: EchoFlags| if flags.contains(f) { "on" } else { "off" };

    let _ = write!(console, "remote: {} ({})\r\n", if remote { "connected" } else { "waiting" }, peer);
    let _ = write!(
        console,
        "autocr={} echo local={} remote={} crossecho={} sync={}\r\n",
        on(EchoFlags::AUTO_CR),
        on(EchoFlags::ECHO_LOCAL),
        on(EchoFlags::ECHO_REMOTE),
        on(EchoFlags::CROSS_ECHO),
        if synced { "on" } else { "off" },
    );
    let _ = write!(console, "timeout={}ms\r\n", timeout);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualcon::core::memory::{ManualClock, MemoryChannel, MemoryRemote};

    fn parsed(line: &[u8]) -> Console<MemoryChannel, MemoryRemote, ManualClock> {
        let mut console = Console::with_clock(MemoryChannel::new(), MemoryRemote::new(), ManualClock::new());
        console.local_mut().push_input(line);
        assert!(console.cmd_available());
        console
    }

    #[test]
    fn test_unknown_verbs_are_reported() {
        assert!(is_unknown_command(&parsed(b"bogus 1\n")));
        assert!(!is_unknown_command(&parsed(b"add 1\n")));
        assert!(!is_unknown_command(&parsed(b"status\n")));
    }

    #[test]
    fn test_non_text_verb_is_reported() {
        let console = parsed(b"\xff\xfe 1\n");
        assert_eq!(console.cmd_verb(), None);
        assert!(is_unknown_command(&console));
    }

    #[test]
    fn test_nothing_reported_without_a_line() {
        let mut console = Console::with_clock(MemoryChannel::new(), MemoryRemote::new(), ManualClock::new());
        console.local_mut().push_input(b"half");
        assert!(!console.cmd_available());
        assert!(!is_unknown_command(&console));
    }
}
