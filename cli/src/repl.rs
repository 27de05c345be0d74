//! Operator REPL
//!
//! Reads one command per line from stdin and prints a one-line outcome.
//! Logs go to stderr, so stdout stays readable.

use tokio::io::{AsyncBufReadExt, BufReader};

use texnouz_cp::ChargePoint;

const PROMPT: &str = "› ";

const HELP: &[(&str, &str)] = &[
    ("status", "show every EVSE and its transaction"),
    ("logs [filter]", "show the message history"),
    ("connect <evse>", "plug a vehicle in"),
    ("authorize <id_token>", "send Authorize"),
    ("event <type> <description>", "send a NotifyEvent"),
    ("charge <evse>", "start charging"),
    ("stop_charge <evse>", "stop charging"),
    ("disconnect <evse>", "unplug the vehicle"),
    ("quit | exit", "save state and leave"),
    ("help", "this list"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Status,
    Logs(Option<String>),
    Connect(u32),
    Authorize(String),
    Event { kind: String, description: String },
    Charge(u32),
    StopCharge(u32),
    Disconnect(u32),
    Quit,
    Help,
}

impl Command {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = parts.collect();

        let command = match name.to_lowercase().as_str() {
            "status" => Self::Status,
            "logs" => Self::Logs(args.first().map(|s| s.to_string())),
            "connect" => Self::Connect(evse_arg(name, &args)?),
            "charge" => Self::Charge(evse_arg(name, &args)?),
            "stop_charge" => Self::StopCharge(evse_arg(name, &args)?),
            "disconnect" => Self::Disconnect(evse_arg(name, &args)?),
            "authorize" => match args.first() {
                Some(token) => Self::Authorize(token.to_string()),
                None => return Err("Usage: authorize <id_token>".to_string()),
            },
            "event" => {
                if args.len() < 2 {
                    return Err("Usage: event <event_type> <description>".to_string());
                }
                Self::Event {
                    kind: args[0].to_string(),
                    description: args[1..].join(" "),
                }
            }
            "quit" | "exit" => Self::Quit,
            "help" => Self::Help,
            other => return Err(format!("Unknown command: {}", other)),
        };
        Ok(Some(command))
    }
}

fn evse_arg(name: &str, args: &[&str]) -> Result<u32, String> {
    args.first()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| format!("Usage: {} <evse_id>", name))
}

pub enum Outcome {
    Continue(Vec<String>),
    Quit,
}

pub async fn execute(cp: &ChargePoint, command: Command) -> Outcome {
    let lines = match command {
        Command::Status => {
            let mut lines = vec!["--- EVSE Status ---".to_string()];
            lines.extend(cp.status().iter().map(ToString::to_string));
            lines.push("-------------------".to_string());
            lines
        }
        Command::Logs(filter) => {
            let mut lines = vec!["--- Event History ---".to_string()];
            lines.extend(cp.history_lines(filter.as_deref()));
            lines.push("---------------------".to_string());
            lines
        }
        Command::Connect(evse_id) => vec![match cp.connect(evse_id).await {
            Ok(tx_id) => format!("EVSE {} Occupied, transaction {} started.", evse_id, tx_id),
            Err(e) => format!("Error starting transaction: {}", e),
        }],
        Command::Authorize(token) => vec![match cp.authorize(&token).await {
            Ok(status) => format!("Authorize {}: {:?}", token, status),
            Err(e) => format!("Error: {}", e),
        }],
        Command::Event { kind, description } => {
            vec![match cp.notify_event(&kind, &description).await {
                Ok(()) => format!(
                    "Sent NotifyEvent (Type: {}, Description: '{}')",
                    kind, description
                ),
                Err(e) => format!("Error: {}", e),
            }]
        }
        Command::Charge(evse_id) => vec![match cp.charge(evse_id).await {
            Ok(()) => format!("Charging started on EVSE {}.", evse_id),
            Err(e) => format!("Error: {}", e),
        }],
        Command::StopCharge(evse_id) => vec![match cp.stop_charge(evse_id).await {
            Ok(()) => format!("Charging stopped on EVSE {}.", evse_id),
            Err(e) => format!("Error: {}", e),
        }],
        Command::Disconnect(evse_id) => vec![match cp.disconnect(evse_id).await {
            Ok(()) => format!("EVSE {} is now Available.", evse_id),
            Err(e) => format!("Error: {}", e),
        }],
        Command::Help => {
            let mut lines = vec!["Available commands:".to_string()];
            lines.extend(
                HELP.iter()
                    .map(|(usage, about)| format!("  {:<28} {}", usage, about)),
            );
            lines
        }
        Command::Quit => return Outcome::Quit,
    };
    Outcome::Continue(lines)
}

/// Run until `quit`, end of input or a read error.
pub async fn run(cp: ChargePoint) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", PROMPT);
        flush_stdout();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                break;
            }
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match execute(&cp, command).await {
            Outcome::Continue(output) => {
                for line in output {
                    println!("{}", line);
                }
            }
            Outcome::Quit => break,
        }
    }
    println!("Exiting...");
}

fn flush_stdout() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}
