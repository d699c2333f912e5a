//! Pulse CLI: runs JSON-described signal networks through the simulator.
//!
//! Provides `pulse run` for timed simulation with optional VCD output,
//! `pulse eval` for evaluating a single signal and `pulse check` for
//! validating a `pulse.toml` run configuration.

#![warn(missing_docs)]

mod check;
mod eval;
mod netlist_file;
mod pipeline;
mod run;

use std::process;

use clap::{Parser, Subcommand};
use tracing::Level;

/// Pulse, a discrete-event simulator for signal networks.
#[derive(Parser, Debug)]
#[command(name = "pulse", version, about = "Pulse signal network simulator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output, including simulation traces.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `pulse.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate a netlist for a fixed amount of virtual time.
    Run(RunArgs),
    /// Evaluate the value of one signal.
    Eval(EvalArgs),
    /// Validate the run configuration and print the effective settings.
    Check,
}

/// Arguments for the `pulse run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Netlist description (JSON).
    pub netlist: String,

    /// Simulation time limit (e.g., "500ps", "10ns"). Overrides `sim.until`.
    #[arg(long)]
    pub time: Option<String>,

    /// Write a VCD waveform to this path.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Disable waveform recording even if the configuration enables it.
    #[arg(long, conflicts_with = "output")]
    pub no_waveform: bool,

    /// Log every update and evaluation.
    #[arg(long)]
    pub log: bool,
}

/// Arguments for the `pulse eval` subcommand.
#[derive(Parser, Debug)]
pub struct EvalArgs {
    /// Netlist description (JSON).
    pub netlist: String,

    /// Name of the signal to evaluate.
    pub signal: String,

    /// Run a timed simulation of the signal's inputs instead of evaluating
    /// its operator tree in dependency order.
    #[arg(long)]
    pub timed: bool,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, &global),
        Command::Eval(ref args) => eval::run(args, &global),
        Command::Check => check::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

fn init_logging(global: &GlobalArgs) {
    tracing_subscriber::fmt()
        .with_max_level(log_level(global))
        .with_writer(std::io::stderr)
        .init();
}

fn log_level(global: &GlobalArgs) -> Level {
    if global.verbose {
        Level::DEBUG
    } else if global.quiet {
        Level::ERROR
    } else {
        Level::WARN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_run_default() {
        let cli = Cli::parse_from(["pulse", "run", "net.json"]);
        match cli.command {
            Command::Run(ref args) => {
                assert_eq!(args.netlist, "net.json");
                assert!(args.time.is_none());
                assert!(args.output.is_none());
                assert!(!args.no_waveform);
                assert!(!args.log);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_run_with_args() {
        let cli = Cli::parse_from([
            "pulse",
            "run",
            "net.json",
            "--time",
            "10ns",
            "--output",
            "out/trace.vcd",
            "--log",
        ]);
        match cli.command {
            Command::Run(ref args) => {
                assert_eq!(args.time.as_deref(), Some("10ns"));
                assert_eq!(args.output.as_deref(), Some("out/trace.vcd"));
                assert!(args.log);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn output_conflicts_with_no_waveform() {
        let res = Cli::try_parse_from([
            "pulse",
            "run",
            "net.json",
            "--output",
            "a.vcd",
            "--no-waveform",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn parse_eval() {
        let cli = Cli::parse_from(["pulse", "eval", "net.json", "y", "--timed"]);
        match cli.command {
            Command::Eval(ref args) => {
                assert_eq!(args.signal, "y");
                assert!(args.timed);
            }
            _ => panic!("expected Eval command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["pulse", "--quiet", "--config", "ci.toml", "check"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("ci.toml"));
        assert!(matches!(cli.command, Command::Check));
    }

    #[test]
    fn verbose_wins_over_quiet() {
        let global = GlobalArgs {
            quiet: true,
            verbose: true,
            config: None,
        };
        assert_eq!(log_level(&global), Level::DEBUG);
    }
}
