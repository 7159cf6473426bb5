//! enumctl - list running processes by systemd unit
//!
//! Talks to systemd over the system bus; requires systemd as PID 1.
//! -u lists the processes of user slices, -d those of active services.

use clap::{ArgGroup, Parser};
use enumctl::owner::user_name;
use enumctl::{init, Enumeration, Enumerator, ProcessRecord};

const USERS_PATTERN: &str = "user-*.slice";
const DAEMONS_PATTERN: &str = "*.service";

#[derive(Parser)]
#[command(name = "enumctl")]
#[command(about = "List running processes grouped by systemd unit")]
#[command(group(ArgGroup::new("mode").required(true).args(["users", "daemons", "pattern"])))]
struct Args {
    /// Show all users' processes
    #[arg(short = 'u', long)]
    users: bool,

    /// Show only active daemons
    #[arg(short = 'd', long)]
    daemons: bool,

    /// Show processes of units matching a glob (e.g. "*.scope")
    #[arg(short = 'p', long, value_parser = parse_pattern)]
    pattern: Option<String>,

    /// Show user names instead of uids
    #[arg(long)]
    names: bool,

    /// Print records as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn pattern(&self) -> &str {
        if self.users {
            USERS_PATTERN
        } else if self.daemons {
            DAEMONS_PATTERN
        } else {
            self.pattern.as_deref().unwrap_or(DAEMONS_PATTERN)
        }
    }

    /// Group rows under their unit name
    fn show_units(&self) -> bool {
        !self.users
    }
}

fn parse_pattern(s: &str) -> Result<String, String> {
    glob::Pattern::new(s)
        .map(|_| s.to_string())
        .map_err(|e| format!("invalid unit pattern: {}", e))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("enumctl: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if !init::is_systemd_booted() {
        return Err("systemd is not running as the init process".into());
    }

    let enumerator = Enumerator::connect()?;
    let result = enumerator.run(args.pattern())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_table(&result, args);
    }

    Ok(())
}

fn print_table(result: &Enumeration, args: &Args) {
    println!("{:<10} {:>8}  {}", "UID", "PID", "COMMAND");

    let mut current_unit: Option<&str> = None;
    for process in &result.processes {
        if args.show_units() && current_unit != Some(process.unit.as_str()) {
            println!("● {}", process.unit);
            current_unit = Some(process.unit.as_str());
        }
        println!(
            "{:<10} {:>8}  {}",
            format_owner(process, args.names),
            process.pid,
            process.cmdline
        );
    }

    println!();
    println!(
        "{} processes in {} units",
        result.processes.len(),
        result.units
    );
    if !result.skipped.is_empty() {
        println!("{} units could not be read", result.skipped.len());
    }
}

fn format_owner(process: &ProcessRecord, names: bool) -> String {
    match process.owner.uid() {
        None => "?".to_string(),
        Some(uid) if names => user_name(uid).unwrap_or_else(|| uid.to_string()),
        Some(uid) => uid.to_string(),
    }
}
