//! Operator console.
//!
//! Supported slash-commands:
//!   /status [name]            – list devices, or show one as JSON
//!   /open  <array> [user]     – request OPENING
//!   /warn  <array> [user]     – request WARN_CLOSE
//!   /close <array> [user]     – request CLOSING
//!   /claim <array> <user>     – claim the next request without sending one
//!   /report <arm> <state> [fault…] – inject a controller report
//!   /query <name> | /reset <name>  – device requests
//!   /events <name>            – event log of one device
//!   /enable | /disable [reason]
//!   /quit | /exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use iris_hal::HardwareEvent;
use iris_runtime::GateArmRegistry;
use iris_store::SqliteStore;
use iris_types::{DeviceRequest, GateArmState};
use tokio::sync::watch;

/// Requests typed at the console come from this host.
const CONSOLE_ORIGIN: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status(Option<String>),
    Request {
        array: String,
        target: GateArmState,
        user: Option<String>,
    },
    Claim {
        array: String,
        user: String,
    },
    Report {
        arm: String,
        state: GateArmState,
        fault: Option<String>,
    },
    Device {
        name: String,
        request: DeviceRequest,
    },
    Events(String),
    Enable,
    Disable(String),
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            return Err("empty command".to_string());
        };
        let mut arg = |what: &str| {
            words
                .next()
                .map(str::to_string)
                .ok_or_else(|| format!("{cmd}: missing {what}"))
        };
        let request = |target, array: String, user: Option<String>| Command::Request {
            array,
            target,
            user,
        };
        match cmd {
            "/help" => Ok(Command::Help),
            "/status" => Ok(Command::Status(arg("name").ok())),
            "/open" => Ok(request(GateArmState::Opening, arg("array")?, arg("user").ok())),
            "/warn" => Ok(request(GateArmState::WarnClose, arg("array")?, arg("user").ok())),
            "/close" => Ok(request(GateArmState::Closing, arg("array")?, arg("user").ok())),
            "/claim" => Ok(Command::Claim {
                array: arg("array")?,
                user: arg("user")?,
            }),
            "/report" => {
                let arm = arg("arm")?;
                let state = arg("state")?;
                let state = GateArmState::parse(&state)
                    .ok_or_else(|| format!("/report: unknown state {state}"))?;
                let fault: Vec<&str> = words.collect();
                let fault = (!fault.is_empty()).then(|| fault.join(" "));
                Ok(Command::Report { arm, state, fault })
            }
            "/query" => Ok(Command::Device {
                name: arg("name")?,
                request: DeviceRequest::QueryStatus,
            }),
            "/reset" => Ok(Command::Device {
                name: arg("name")?,
                request: DeviceRequest::ResetDevice,
            }),
            "/events" => Ok(Command::Events(arg("name")?)),
            "/enable" => Ok(Command::Enable),
            "/disable" => {
                let reason: Vec<&str> = words.collect();
                Ok(Command::Disable(if reason.is_empty() {
                    "operator".to_string()
                } else {
                    reason.join(" ")
                }))
            }
            "/quit" | "/exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command: '{other}'")),
        }
    }
}

/// Blocking console loop.  Returns when the operator quits, stdin closes,
/// or `shutdown` flips.
pub fn run(
    registry: Arc<GateArmRegistry>,
    store: Arc<SqliteStore>,
    shutdown: watch::Receiver<bool>,
) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        if *shutdown.borrow() {
            break;
        }
        print!("{} ", "iris>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }
        if line.trim().is_empty() {
            continue;
        }
        match Command::parse(&line) {
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                break;
            }
            Ok(cmd) => execute(&registry, &store, cmd),
            Err(e) => println!(
                "{} Type {} for available commands.",
                e.red(),
                "/help".bold()
            ),
        }
    }
}

fn execute(registry: &GateArmRegistry, store: &SqliteStore, cmd: Command) {
    match cmd {
        Command::Help => cmd_help(),
        Command::Status(None) => cmd_status(registry),
        Command::Status(Some(name)) => cmd_status_one(registry, &name),
        Command::Request {
            array,
            target,
            user,
        } => {
            if let Some(user) = user {
                match registry.set_owner_next(&array, Some(user)) {
                    Ok(true) => {}
                    Ok(false) => println!("{}", "Owner conflict: request is unattributed.".yellow()),
                    Err(e) => return println!("{}", e.to_string().red()),
                }
            }
            match registry.request_state_change(CONSOLE_ORIGIN, &array, target) {
                Ok(()) => println!("  {} {} requested", array.bold(), target),
                Err(e) => println!("  {}", e.to_string().red()),
            }
        }
        Command::Claim { array, user } => match registry.set_owner_next(&array, Some(user)) {
            Ok(true) => println!("  claimed {}", array.bold()),
            Ok(false) => println!("  {}", "Owner conflict: claim cleared.".yellow()),
            Err(e) => println!("  {}", e.to_string().red()),
        },
        Command::Report { arm, state, fault } => {
            registry.handle_hardware_event(HardwareEvent::ArmState { arm, state, fault });
        }
        Command::Device { name, request } => {
            if let Err(e) = registry.request_device(&name, request) {
                println!("  {}", e.to_string().red());
            }
        }
        Command::Events(name) => cmd_events(store, &name),
        Command::Enable => match registry.enable_system() {
            Ok(()) => println!("  {}", "Gate arm system enabled.".green()),
            Err(e) => println!("  {}", e.to_string().red()),
        },
        Command::Disable(reason) => {
            registry.disable_system("console", &reason);
            println!("  {}", "Gate arm system disabled.".yellow());
        }
        Command::Quit => {}
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "IRIS Gate Arm Commands".bold().underline());
    println!("  {}          – list arrays and arms", "/status [name]".bold().cyan());
    println!("  {}  – request open / warn / close", "/open|/warn|/close <array> [user]".bold().cyan());
    println!("  {}    – claim the next request", "/claim <array> <user>".bold().cyan());
    println!("  {} – inject a controller report", "/report <arm> <state> [fault]".bold().cyan());
    println!("  {}   – query status / reset device", "/query|/reset <name>".bold().cyan());
    println!("  {}         – device event log", "/events <name>".bold().cyan());
    println!("  {}  – system kill switch", "/enable  /disable [reason]".bold().cyan());
    println!("  {}            – exit", "/quit  /exit".bold().cyan());
    println!();
}

fn paint_state(state: GateArmState) -> colored::ColoredString {
    let s = state.as_str();
    match state {
        GateArmState::Closed => s.green(),
        GateArmState::Open | GateArmState::WarnClose => s.yellow(),
        GateArmState::Opening | GateArmState::Closing => s.cyan(),
        GateArmState::Fault | GateArmState::Unknown => s.red().bold(),
    }
}

fn cmd_status(registry: &GateArmRegistry) {
    let system = registry.services().system.clone();
    if system.is_enabled() {
        println!("  system: {}", "ENABLED".green().bold());
    } else {
        let why = system
            .disable_reason()
            .map(|d| format!(" ({}: {})", d.name, d.reason))
            .unwrap_or_default();
        println!("  system: {}{}", "DISABLED".red().bold(), why.dimmed());
    }
    for a in registry.arrays() {
        println!(
            "  {:<16} {:<11} {:<15} {}",
            a.name.bold(),
            paint_state(a.state),
            a.interlock.as_str(),
            a.members.join(", ").dimmed()
        );
    }
    for a in registry.arms() {
        let fault = a.fault.as_deref().unwrap_or("");
        let comm = if a.failed { "COMM FAIL" } else { "" };
        println!(
            "    {:<14} {:<11} {:<15} {} {}",
            a.name,
            paint_state(a.state),
            a.interlock.as_str(),
            comm.red(),
            fault.red()
        );
    }
}

fn cmd_status_one(registry: &GateArmRegistry, name: &str) {
    let json = if let Some(a) = registry.array_status(name) {
        serde_json::to_string_pretty(&a)
    } else if let Some(a) = registry.arm_status(name) {
        serde_json::to_string_pretty(&a)
    } else {
        return println!("  {} {}", "Unknown device:".red(), name);
    };
    match json {
        Ok(s) => println!("{s}"),
        Err(e) => println!("  {}", e.to_string().red()),
    }
}

fn cmd_events(store: &SqliteStore, name: &str) {
    match store.events(name) {
        Ok(events) if events.is_empty() => println!("  {}", "No events.".dimmed()),
        Ok(events) => {
            for ev in events {
                let when = ev.timestamp.with_timezone(&chrono::Local);
                println!(
                    "  {} {:<11} {:<10} {}",
                    when.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    paint_state(ev.state),
                    ev.owner.as_deref().unwrap_or("-"),
                    ev.fault.as_deref().unwrap_or("").red()
                );
            }
        }
        Err(e) => println!("  {}", e.to_string().red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_requests() {
        assert_eq!(
            Command::parse("/open ramp_a alice").unwrap(),
            Command::Request {
                array: "ramp_a".into(),
                target: GateArmState::Opening,
                user: Some("alice".into())
            }
        );
        assert_eq!(
            Command::parse("/warn ramp_a").unwrap(),
            Command::Request {
                array: "ramp_a".into(),
                target: GateArmState::WarnClose,
                user: None
            }
        );
        assert!(Command::parse("/close").is_err());
    }

    #[test]
    fn parses_reports_with_fault_text() {
        assert_eq!(
            Command::parse("/report ga_1 fault motor stalled").unwrap(),
            Command::Report {
                arm: "ga_1".into(),
                state: GateArmState::Fault,
                fault: Some("motor stalled".into())
            }
        );
        assert!(Command::parse("/report ga_1 sideways").is_err());
    }

    #[test]
    fn parses_system_commands() {
        assert_eq!(Command::parse("/enable").unwrap(), Command::Enable);
        assert_eq!(
            Command::parse("/disable").unwrap(),
            Command::Disable("operator".into())
        );
        assert_eq!(
            Command::parse("/disable crew on site").unwrap(),
            Command::Disable("crew on site".into())
        );
        assert_eq!(Command::parse("/exit").unwrap(), Command::Quit);
        assert!(Command::parse("/dance").is_err());
    }

    #[test]
    fn parses_device_requests() {
        assert_eq!(
            Command::parse("/reset ga_2").unwrap(),
            Command::Device {
                name: "ga_2".into(),
                request: DeviceRequest::ResetDevice
            }
        );
    }
}
