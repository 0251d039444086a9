use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use opentelemetry::KeyValue;
use tracing::{info, warn};

use cosim_config::{CosimConfig, STRATEGY_SEQUENTIAL, STRATEGY_WORKER_POOL};
use cosim_core::time::{format_seconds, MILLI_SECOND};
use cosim_engine::{Engine, EngineParams};
use cosim_simulator::{CallLog, Scenario};
use cosim_telemetry::{ActivityMonitor, EventLogger, MetricsRecorder, MonitorFanout};

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "cosim", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario to its end time
    Run(RunArgs),
    /// Load and validate a scenario and the configuration without running
    Validate(ValidateArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Sequential,
    WorkerPool,
}

impl Strategy {
    fn as_config(self) -> &'static str {
        match self {
            Strategy::Sequential => STRATEGY_SEQUENTIAL,
            Strategy::WorkerPool => STRATEGY_WORKER_POOL,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Scenario file (YAML)
    #[arg(short, long)]
    pub scenario: PathBuf,
    /// Configuration file; defaults to config/cosim.yaml plus COSIM_ENV overlays
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: ValidateArgs,
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,
    /// Worker threads for the worker-pool strategy
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
    /// End time in milliseconds of simulation time
    #[arg(long)]
    pub end_time_ms: Option<u64>,
    /// Watchdog timeout in seconds, 0 disables it
    #[arg(long)]
    pub watchdog_s: Option<u64>,
    /// Slow the run down to at most `factor` times real time
    #[arg(long)]
    pub realtime_brake: Option<u32>,
    /// Print prometheus metrics after the run
    #[arg(long)]
    pub metrics: bool,
    /// Write SIM/EVT/MSG/PRL lines to the cosim::activity log target
    #[arg(long)]
    pub activity_log: bool,
}

impl RunArgs {
    /// Command line flags win over the scenario, which wins over the
    /// configuration files.
    pub fn apply(&self, config: &mut CosimConfig, scenario: &Scenario) -> anyhow::Result<()> {
        let engine = &mut config.engine;
        if let Some(end_time) = scenario.end_time_ns {
            engine.end_time_ns = end_time;
        }
        if let Some(end_time_ms) = self.end_time_ms {
            engine.end_time_ns = end_time_ms.saturating_mul(MILLI_SECOND);
        }
        if engine.end_time_ns == 0 {
            bail!("end time must be positive");
        }
        if let Some(strategy) = self.strategy {
            engine.strategy = strategy.as_config().to_string();
        }
        if let Some(threads) = self.threads {
            if threads == 0 {
                bail!("--threads must be at least 1");
            }
            engine.threads = threads;
        }
        if let Some(watchdog) = self.watchdog_s {
            engine.watchdog_timeout_s = watchdog;
        }
        if let Some(factor) = self.realtime_brake {
            engine.realtime_brake = factor;
        }
        config.telemetry.metrics |= self.metrics;
        config.telemetry.activity_log |= self.activity_log;
        Ok(())
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run(&args),
        Commands::Validate(args) => validate(&args),
    }
}

fn load(input: &ValidateArgs) -> anyhow::Result<(Scenario, CosimConfig)> {
    let scenario = Scenario::load(&input.scenario)
        .with_context(|| format!("loading scenario {}", input.scenario.display()))?;
    let config = load_config(input.config.as_deref())?;
    Ok((scenario, config))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CosimConfig> {
    let config = match path {
        Some(path) => CosimConfig::load_from_path(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => CosimConfig::load().context("loading configuration")?,
    };
    Ok(config)
}

fn validate(args: &ValidateArgs) -> anyhow::Result<()> {
    let (scenario, config) = load(args)?;
    scenario.build(&CallLog::new())?;
    println!(
        "scenario '{}' is valid: {} federates, strategy {}, end time {}",
        scenario.federation_id,
        scenario.federates.len(),
        config.engine.strategy,
        format_seconds(scenario.end_time_ns.unwrap_or(config.engine.end_time_ns))
    );
    Ok(())
}

fn run(args: &RunArgs) -> anyhow::Result<()> {
    let (scenario, mut config) = load(&args.input)?;
    args.apply(&mut config, &scenario)?;

    if let Err(err) = EventLogger::init(&config.telemetry.log_filter) {
        warn!("Logging was already initialized: {err}");
    }

    let federation = Arc::new(scenario.build(&CallLog::new())?);
    let params = EngineParams::from(&config.engine);

    let mut monitor = MonitorFanout::new();
    let metrics = if config.telemetry.metrics {
        let metrics = Arc::new(MetricsRecorder::new()?);
        monitor = monitor.with(metrics.clone());
        Some(metrics)
    } else {
        None
    };
    if config.telemetry.activity_log {
        monitor = monitor.with(Arc::new(ActivityMonitor::new(
            federation.clone(),
            params.end_time,
        )));
    }

    EventLogger::log_event(
        "run_started",
        vec![
            KeyValue::new("federation", scenario.federation_id.clone()),
            KeyValue::new("strategy", params.strategy.name()),
            KeyValue::new("federates", scenario.federates.len() as i64),
        ],
    );

    let engine = Engine::new(federation, Arc::new(monitor), params)?;
    let result = engine.run_simulation();

    if let Some(metrics) = metrics.filter(|_| args.metrics) {
        println!("{}", metrics.gather_metrics()?);
    }

    match result {
        Ok(report) => {
            info!("Simulation of '{}' finished", report.federation_id);
            println!("{report}");
            Ok(())
        }
        Err(err) => Err(CliError::RunFailed {
            federation: scenario.federation_id,
            status_code: err.status_code(),
            source: err,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCENARIO: &str = r#"
federation_id: cli
end_time_ns: 50
federates:
  - id: a
    steps_ns: [0, 10, 50]
  - id: b
    lookahead_ns: 5
    steps_ns: [10, 20]
"#;

    fn scenario_file(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    fn parse(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn parses_run_flags() {
        let args = parse(&[
            "cosim",
            "run",
            "--scenario",
            "s.yaml",
            "--strategy",
            "worker-pool",
            "-j",
            "3",
            "--watchdog-s",
            "0",
        ]);
        assert_eq!(args.input.scenario, PathBuf::from("s.yaml"));
        assert_eq!(args.strategy, Some(Strategy::WorkerPool));
        assert_eq!(args.threads, Some(3));
        assert_eq!(args.watchdog_s, Some(0));
        assert!(!args.metrics);
    }

    #[test]
    fn flags_override_scenario_and_config() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        let mut config = CosimConfig::default();

        parse(&["cosim", "run", "-s", "s.yaml"])
            .apply(&mut config, &scenario)
            .unwrap();
        assert_eq!(config.engine.end_time_ns, 50);

        parse(&["cosim", "run", "-s", "s.yaml", "--end-time-ms", "2", "--strategy", "worker-pool"])
            .apply(&mut config, &scenario)
            .unwrap();
        assert_eq!(config.engine.end_time_ns, 2 * MILLI_SECOND);
        assert!(config.engine.is_worker_pool());

        let err = parse(&["cosim", "run", "-s", "s.yaml", "-j", "0"])
            .apply(&mut config, &scenario)
            .unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn runs_a_scenario_end_to_end() {
        let file = scenario_file(SCENARIO);
        let config = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(config.path(), "engine:\n  watchdog_timeout_s: 0\n").unwrap();
        let cli = Cli::try_parse_from([
            "cosim",
            "run",
            "-s",
            file.path().to_str().unwrap(),
            "-c",
            config.path().to_str().unwrap(),
            "--strategy",
            "worker-pool",
            "-j",
            "2",
        ])
        .unwrap();
        run_command(cli).unwrap();
    }

    #[test]
    fn failed_run_maps_to_exit_code() {
        let file = scenario_file(
            r#"
federation_id: broken
end_time_ns: 50
federates:
  - id: a
    steps_ns: [0, 10]
    fault:
      at_ns: 10
      kind: fail
"#,
        );
        let cli = Cli::try_parse_from(["cosim", "run", "-s", file.path().to_str().unwrap()]).unwrap();
        let err = run_command(cli).unwrap_err();
        let cli_err = err.downcast_ref::<CliError>().unwrap();
        assert_eq!(cli_err.exit_code(), 1);
        assert!(matches!(cli_err, CliError::RunFailed { status_code: -1, .. }));
    }
}
