//! nasmond - host monitoring agent.
//!
//! Samples system, VM, share, container, ZFS and notification state on fixed
//! intervals and publishes each snapshot on the in-process hub.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use nasmon_core::collector::{CollectorKind, RealFs, SystemRunner};
use nasmon_core::config::{AgentConfig, Intervals, Paths};
use nasmon_core::hub::{DEFAULT_QUEUE_CAPACITY, Event, Hub, topics};
use nasmon_core::scheduler::spawn_all;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    #[value(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Host monitoring agent.
#[derive(Parser, Debug)]
#[command(name = "nasmond", about = "Host monitoring agent", version)]
struct Args {
    /// Log level.
    #[arg(long, value_enum, default_value = "warning", env = "NASMON_LOG_LEVEL")]
    log_level: LogLevel,

    /// Increase logging verbosity (-v for info, -vv for debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,

    /// Force debug logging.
    #[arg(long, env = "NASMON_DEBUG")]
    debug: bool,

    /// Path to /proc filesystem.
    #[arg(long, default_value = "/proc", env = "NASMON_PROC_PATH")]
    proc_path: PathBuf,

    /// Path to /sys filesystem (hwmon fallback for sensors).
    #[arg(long, default_value = "/sys", env = "NASMON_SYS_PATH")]
    sys_path: PathBuf,

    /// Share usage ini.
    #[arg(long, default_value = "/var/local/emhttp/shares.ini", env = "NASMON_SHARES_INI")]
    shares_ini: PathBuf,

    /// Directory with per-share `.cfg` files.
    #[arg(long, default_value = "/boot/config/shares", env = "NASMON_SHARE_CONFIG_DIR")]
    share_config_dir: PathBuf,

    /// Notification store with `unread/` and `archive/`.
    #[arg(long, default_value = "/tmp/notifications", env = "NASMON_NOTIFICATIONS_DIR")]
    notifications_dir: PathBuf,

    /// System collection interval in seconds (0 disables).
    #[arg(long, default_value = "5", env = "NASMON_SYSTEM_INTERVAL")]
    system_interval: u64,

    /// VM collection interval in seconds (0 disables).
    #[arg(long, default_value = "10", env = "NASMON_VM_INTERVAL")]
    vm_interval: u64,

    /// Share collection interval in seconds (0 disables).
    #[arg(long, default_value = "60", env = "NASMON_SHARE_INTERVAL")]
    share_interval: u64,

    /// Container collection interval in seconds (0 disables).
    #[arg(long, default_value = "10", env = "NASMON_DOCKER_INTERVAL")]
    docker_interval: u64,

    /// ZFS collection interval in seconds (0 disables).
    #[arg(long, default_value = "30", env = "NASMON_ZFS_INTERVAL")]
    zfs_interval: u64,

    /// Notification collection interval in seconds (0 disables).
    #[arg(long, default_value = "15", env = "NASMON_NOTIFICATION_INTERVAL")]
    notification_interval: u64,

    /// Queue length per subscriber and topic.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, env = "NASMON_HUB_CAPACITY")]
    hub_capacity: usize,

    /// Print every published event to stdout as one JSON line.
    #[arg(long, env = "NASMON_PRINT_EVENTS")]
    print_events: bool,
}

impl Args {
    fn level(&self) -> LogLevel {
        if self.debug {
            return LogLevel::Debug;
        }
        if self.quiet {
            return LogLevel::Error;
        }
        match self.verbose {
            0 => self.log_level,
            1 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    fn config(&self) -> AgentConfig {
        AgentConfig {
            intervals: Intervals {
                system: Duration::from_secs(self.system_interval),
                vm: Duration::from_secs(self.vm_interval),
                share: Duration::from_secs(self.share_interval),
                docker: Duration::from_secs(self.docker_interval),
                zfs: Duration::from_secs(self.zfs_interval),
                notification: Duration::from_secs(self.notification_interval),
            },
            paths: Paths {
                proc_root: self.proc_path.clone(),
                sys_root: self.sys_path.clone(),
                shares_ini: self.shares_ini.clone(),
                share_config_dir: self.share_config_dir.clone(),
                notifications_dir: self.notifications_dir.clone(),
            },
            hub_capacity: self.hub_capacity,
        }
    }
}

/// Initializes the tracing subscriber. `RUST_LOG` directives apply on top.
fn init_logging(level: LogLevel) {
    let level = level.directive();
    let mut directives = format!("nasmond={level},nasmon_core={level}");
    if let Ok(extra) = std::env::var("RUST_LOG") {
        directives.push(',');
        directives.push_str(&extra);
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_target(false)
        .init();
}

fn print_event(out: &mut impl Write, event: &Event) {
    let payload = match event.payload.to_json() {
        Ok(v) => v,
        Err(e) => {
            warn!(topic = %event.topic, error = %e, "payload not serializable");
            return;
        }
    };
    let line = serde_json::json!({
        "topic": &*event.topic,
        "published_at": event.published_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "payload": payload,
    });
    if let Err(e) = writeln!(out, "{line}") {
        warn!(error = %e, "failed to write event");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.level());

    let config = args.config();
    info!("nasmond {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        proc = %config.paths.proc_root.display(),
        sys = %config.paths.sys_root.display(),
        notifications = %config.paths.notifications_dir.display(),
        hub_capacity = config.hub_capacity,
        "configuration loaded"
    );

    let hub = Hub::new(config.hub_capacity);
    let token = CancellationToken::new();

    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("received shutdown signal");
        handler_token.cancel();
    }) {
        warn!("failed to set Ctrl-C handler: {}", e);
    }

    let printer = args.print_events.then(|| {
        let mut sub = hub.subscribe(&topics::ALL);
        let token = token.clone();
        tokio::spawn(async move {
            let mut stdout = std::io::stdout();
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    event = sub.recv() => match event {
                        Some(event) => print_event(&mut stdout, &event),
                        None => break,
                    },
                }
            }
        })
    });

    let collectors = CollectorKind::from_config(&config, Arc::new(RealFs::new()), Arc::new(SystemRunner::new()));
    if collectors.is_empty() {
        error!("all collectors are disabled, nothing to do");
        return ExitCode::FAILURE;
    }

    let set = spawn_all(collectors, &hub, &token);
    info!(collectors = ?set.names(), "collection started");

    token.cancelled().await;
    info!("shutting down...");
    set.shutdown().await;
    if let Some(printer) = printer {
        if let Err(e) = printer.await {
            warn!(error = %e, "event printer failed");
        }
    }

    info!(dropped_events = hub.dropped(), "shutdown complete");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_agent_config() {
        let args = Args::try_parse_from(["nasmond"]).unwrap();
        assert_eq!(args.config(), AgentConfig::default());
        assert_eq!(args.level(), LogLevel::Warning);
    }

    #[test]
    fn test_level_overrides() {
        let args = Args::try_parse_from(["nasmond", "--log-level", "error", "-v"]).unwrap();
        assert_eq!(args.level(), LogLevel::Info);
        let args = Args::try_parse_from(["nasmond", "-q", "--debug"]).unwrap();
        assert_eq!(args.level(), LogLevel::Debug);
        let args = Args::try_parse_from(["nasmond", "--log-level", "warn"]).unwrap();
        assert_eq!(args.level(), LogLevel::Warning);
    }

    #[test]
    fn test_zero_interval_flag() {
        let args = Args::try_parse_from(["nasmond", "--vm-interval", "0"]).unwrap();
        assert!(args.config().intervals.vm.is_zero());
    }

    #[test]
    fn test_print_event_writes_json_line() {
        let hub = Hub::new(4);
        let mut sub = hub.subscribe(&[topics::SYSTEM]);
        hub.publish(topics::SYSTEM, nasmon_core::hub::Payload::new(vec![1u32, 2]));
        let event = sub.try_recv().unwrap();

        let mut buf = Vec::new();
        print_event(&mut buf, &event);
        let line: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(line["topic"], "system_update");
        assert_eq!(line["payload"], serde_json::json!([1, 2]));
    }
}
