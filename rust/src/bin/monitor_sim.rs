use clap::Parser;
use elasticbuf::driver::{self, DriverConfig};
use elasticbuf::error::DriverError;
use elasticbuf::observer::{EventLog, Fanout, Observer, TracingObserver};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Producer/consumer simulation over a self-resizing Monitor
#[derive(Parser, Debug)]
#[command(name = "monitor_sim", version)]
struct Args {
    /// Number of producer threads
    #[arg(short = 'p', long)]
    producers: Option<usize>,

    /// Number of consumer threads
    #[arg(short = 'c', long)]
    consumers: Option<usize>,

    /// Initial buffer capacity
    #[arg(short = 's', long = "size")]
    initial_capacity: Option<usize>,

    /// Seconds each consumer keeps consuming
    #[arg(short = 't', long = "wait")]
    consumer_budget_secs: Option<u64>,

    /// Items emitted by each producer
    #[arg(long)]
    items: Option<usize>,

    /// Pause after each produced item, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Extra random pause of up to this many milliseconds per item
    #[arg(long)]
    jitter_ms: Option<u64>,

    /// Shrink only at 1/8 occupancy instead of 1/4
    #[arg(long)]
    damped: bool,

    /// JSON config file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Append every event as a JSON line to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Print the run report as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins if set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn to_config(&self) -> Result<DriverConfig, DriverError> {
        let mut config = match &self.config {
            Some(path) => DriverConfig::from_json_file(path)?,
            None => DriverConfig::default(),
        };

        if let Some(producers) = self.producers {
            config.producers = producers;
        }
        if let Some(consumers) = self.consumers {
            config.consumers = consumers;
        }
        if let Some(capacity) = self.initial_capacity {
            config.initial_capacity = capacity;
        }
        if let Some(secs) = self.consumer_budget_secs {
            config.consumer_budget_secs = secs;
        }
        if let Some(items) = self.items {
            config.items_per_producer = items;
        }
        if let Some(delay) = self.delay_ms {
            config.produce_delay_ms = delay;
        }
        if let Some(jitter) = self.jitter_ms {
            config.produce_jitter_ms = jitter;
        }
        if self.damped {
            config.damped_resize = true;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match simulate(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("monitor_sim: {e}");
            ExitCode::FAILURE
        }
    }
}

fn simulate(args: &Args) -> Result<(), DriverError> {
    let config = args.to_config()?;

    let mut observers: Vec<Arc<dyn Observer>> = vec![Arc::new(TracingObserver)];
    let mut writer = None;
    if let Some(path) = &args.log_file {
        let (log, log_writer) = EventLog::create(path)?;
        observers.push(Arc::new(log));
        writer = Some(log_writer);
    }

    // the fanout (and every EventLog handle inside it) is dropped when run returns
    let report = driver::run(&config, Arc::new(Fanout::new(observers)))?;

    if let Some(writer) = writer {
        let written = writer.finish()?;
        tracing::info!(events = written, "event log flushed");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }
    Ok(())
}
