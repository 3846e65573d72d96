use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use rr_sched::client::{describe_reply, Submitter};
use rr_sched::config::{MemoryConfig, SchedulerConfig};
use rr_sched::scheduler::Tick;
use rr_sched::server::{self, SchedulerServer, ShutdownReport};
use rr_sched::shutdown::install_shutdown_handler;
use rr_sched::transport::{local_channel, JobDescriptor};

#[derive(Parser, Debug)]
#[command(name = "rr-sched")]
#[command(version)]
#[command(about = "Round-robin CPU scheduler simulator with paged memory")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the scheduler, accepting jobs on a Unix socket
    Server(ServerArgs),

    /// Submit one job to a running scheduler and wait for its result
    Submit(SubmitArgs),

    /// Run the scheduler in-process against a random workload
    Simulate(SimulateArgs),
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct MemoryArgs {
    /// Total memory in bytes (rounded up to a power of two)
    #[arg(default_value = "1024")]
    total_memory: usize,

    /// Page size in bytes (rounded up to a power of two)
    #[arg(default_value = "64")]
    page_size: usize,

    /// Round-robin quantum in ticks
    #[arg(default_value = "4")]
    quantum: Tick,
}

#[derive(Parser, Debug)]
struct ServerArgs {
    #[command(flatten)]
    memory: MemoryArgs,

    /// Number of ticks to run before shutting down
    #[arg(long, default_value = "50")]
    ticks: Tick,

    /// Wall-clock milliseconds per tick
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Directory for the submission socket and reply sockets
    #[arg(long, default_value = ".")]
    socket_dir: PathBuf,

    /// Give up on a reply after this many milliseconds
    #[arg(long, default_value = "500")]
    reply_timeout_ms: u64,

    /// Output format for the final statistics
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Parser, Debug)]
struct SubmitArgs {
    /// Total CPU burst in ticks
    burst: Tick,

    /// Memory required in bytes
    memory: u32,

    /// Directory holding the scheduler's submission socket
    #[arg(long, default_value = ".")]
    socket_dir: PathBuf,

    /// Give up waiting for the result after this many milliseconds
    #[arg(long, default_value = "300000")]
    wait_ms: u64,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    #[command(flatten)]
    memory: MemoryArgs,

    /// Number of jobs to generate
    #[arg(long, default_value = "20")]
    jobs: u32,

    /// Largest burst a generated job may ask for
    #[arg(long, default_value = "12")]
    max_burst: Tick,

    /// Largest memory request a generated job may make
    #[arg(long, default_value = "512")]
    max_memory: u32,

    /// Seed for the workload generator
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Number of ticks to run
    #[arg(long, default_value = "50")]
    ticks: Tick,

    /// Wall-clock milliseconds per tick
    #[arg(long, default_value = "0")]
    tick_ms: u64,

    /// Output format for the final statistics
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

impl MemoryArgs {
    fn config(&self) -> SchedulerConfig {
        SchedulerConfig::new(
            MemoryConfig::new(self.total_memory, self.page_size),
            self.quantum,
        )
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn print_report(
    report: &ShutdownReport,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            let stats = &report.stats;
            println!();
            println!("CPU Scheduling Statistics");
            println!("{}", "=".repeat(40));
            println!("Elapsed ticks:       {}", stats.elapsed_ticks);
            println!("CPU utilization:     {:.6}", stats.utilization);
            println!("Average turnaround:  {:.6}", stats.average_turnaround);
            println!("Average wait:        {:.6}", stats.average_wait);
            println!("Completed jobs:      {}", stats.completed);
            println!("Aborted at shutdown: {}", report.aborted);
            if report.replies_dropped > 0 {
                println!("Undelivered replies: {}", report.replies_dropped);
            }
        }
    }
    Ok(())
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let mut config = args
        .memory
        .config()
        .with_total_ticks(args.ticks)
        .with_tick_interval_ms(args.tick_ms)
        .with_socket_dir(args.socket_dir);
    config.reply_timeout_ms = args.reply_timeout_ms;
    config.validate()?;

    tracing::info!(
        total_memory = config.memory.total_memory,
        page_size = config.memory.page_size,
        quantum = config.quantum,
        total_ticks = config.total_ticks,
        socket_dir = %config.socket_dir.display(),
        "Starting rr-sched server"
    );

    let shutdown = install_shutdown_handler()?;
    let report = server::serve(config, shutdown).await?;
    print_report(&report, &args.output)
}

async fn run_submit(args: SubmitArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    println!("Sending job #{}", std::process::id());
    println!("Total burst: {}", args.burst);
    println!("Requesting {}B memory", args.memory);

    let submitter = Submitter::new(args.socket_dir)
        .with_reply_wait(std::time::Duration::from_millis(args.wait_ms));
    let reply = submitter.submit(args.burst, args.memory).await?;
    println!("{}", describe_reply(&reply));
    Ok(())
}

async fn run_simulation(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = args
        .memory
        .config()
        .with_total_ticks(args.ticks)
        .with_tick_interval_ms(args.tick_ms);
    config.validate()?;

    let (submitter, inbound, replies) = local_channel(args.jobs.max(1) as usize);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut pending = Vec::with_capacity(args.jobs as usize);
    for id in 1..=args.jobs {
        let burst = rng.gen_range(1..=args.max_burst.max(1));
        let memory = rng.gen_range(1..=args.max_memory.max(1));
        let rx = submitter.try_submit(JobDescriptor::for_submitter(id, burst, memory))?;
        pending.push((id, rx));
    }
    // Routes close once the server is done, so unadmitted jobs resolve too
    drop(submitter);

    let shutdown = install_shutdown_handler()?;
    let server = SchedulerServer::new(config, inbound, replies)?;
    let report = server.run(shutdown).await;

    for (id, rx) in pending {
        match rx.await {
            Ok(reply) => println!("{}", describe_reply(&reply)),
            Err(_) => println!("Job #{}: never admitted before the run ended", id),
        }
    }
    print_report(&report, &args.output)
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => run_server(server_args).await?,
        Commands::Submit(submit_args) => run_submit(submit_args).await?,
        Commands::Simulate(simulate_args) => run_simulation(simulate_args).await?,
    }

    Ok(())
}
