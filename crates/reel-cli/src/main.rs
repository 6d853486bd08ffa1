//! reel: probe connectivity through interactive CLI sessions.
//!
//! Each subcommand spawns a session, runs a ping probe against a target
//! through it, and exits with the probe's outcome: 0 success, 1 failure,
//! 2 error. Success is silent; failures and diagnostics go to stderr.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reel::session::{DEFAULT_CLI, DEFAULT_SHELL};
use reel::{
    Chain, ClusterExec, EchoLogger, ExecTarget, Outcome, PingProbe, Probe, PtySpawner, Reel,
    Result, Shell, SpawnOptions, Ssh,
};

#[derive(Debug, Parser)]
#[command(
    name = "reel",
    version,
    about = "Expect-style automation for interactive CLI sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ping a host from a local shell and classify the result
    Ping(PingArgs),
    /// Ping a target from a shell on a remote host, over ssh
    Ssh(SshArgs),
    /// Ping a target from inside a cluster pod container
    Exec(ExecArgs),
}

#[derive(Debug, Args)]
struct PingArgs {
    /// Destination host or address
    host: String,

    /// Number of requests to send; 0 pings until the timeout trips
    #[arg(short = 'c', long, default_value_t = 1)]
    count: u32,

    /// Per-step timeout in seconds
    #[arg(short, long, default_value_t = 2)]
    timeout: u64,
}

#[derive(Debug, Args)]
struct SshArgs {
    /// Remote user
    user: String,

    /// Remote host
    host: String,

    /// Address to ping from the remote shell
    target: String,

    /// Number of requests to send; 0 pings until the timeout trips
    #[arg(short = 'c', long, default_value_t = 5)]
    count: u32,

    /// Extra argument passed to the ssh client (repeatable)
    #[arg(long = "ssh-arg")]
    ssh_args: Vec<String>,

    /// Per-step timeout in seconds
    #[arg(short, long, default_value_t = 2)]
    timeout: u64,
}

#[derive(Debug, Args)]
struct ExecArgs {
    /// Pod name
    pod: String,

    /// Container name within the pod
    container: String,

    /// Address to ping from inside the container
    target: String,

    /// Namespace the pod lives in
    #[arg(short = 'n', long, default_value = "default")]
    namespace: String,

    /// Cluster CLI program
    #[arg(long, default_value = DEFAULT_CLI)]
    cli: String,

    /// Shell to start inside the container
    #[arg(long, default_value = DEFAULT_SHELL)]
    shell: String,

    /// Number of requests to send; 0 pings until the timeout trips
    #[arg(short = 'c', long, default_value_t = 5)]
    count: u32,

    /// Per-step timeout in seconds
    #[arg(short, long, default_value_t = 2)]
    timeout: u64,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(outcome) => {
            if outcome != Outcome::Success {
                eprintln!("{outcome}");
            }
            std::process::exit(outcome.exit_code());
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(Outcome::Error.exit_code());
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Command) -> Result<Outcome> {
    match command {
        Command::Ping(args) => ping(args).await,
        Command::Ssh(args) => ssh(args).await,
        Command::Exec(args) => exec(args).await,
    }
}

async fn ping(args: PingArgs) -> Result<Outcome> {
    let timeout = Duration::from_secs(args.timeout);
    let spawner = PtySpawner::new();
    let mut shell = Shell::spawn(&spawner, timeout, &SpawnOptions::new())?;
    tracing::info!(host = %args.host, count = args.count, "Pinging from a local shell");

    let outcome = probe_target(shell.context_mut(), args.host, args.count, timeout).await;
    shell.close().await?;
    outcome
}

async fn ssh(args: SshArgs) -> Result<Outcome> {
    let timeout = Duration::from_secs(args.timeout);
    let spawner = PtySpawner::new();
    let mut session = Ssh::spawn(
        &spawner,
        args.user,
        args.host,
        &args.ssh_args,
        timeout,
        &SpawnOptions::new(),
    )?;
    tracing::info!(
        user = %session.user(),
        host = %session.host(),
        target = %args.target,
        "Pinging from a remote shell"
    );

    let outcome = probe_target(session.context_mut(), args.target, args.count, timeout).await;
    session.close().await?;
    outcome
}

async fn exec(args: ExecArgs) -> Result<Outcome> {
    let timeout = Duration::from_secs(args.timeout);
    let spawner = PtySpawner::new();
    let exec_target = ExecTarget::new(args.pod, args.container, args.namespace);
    let mut session = ClusterExec::spawn_with(
        &spawner,
        exec_target,
        args.cli,
        args.shell,
        timeout,
        &SpawnOptions::new(),
    )?;
    tracing::info!(
        container = %session.target(),
        target = %args.target,
        "Pinging from a cluster shell"
    );

    let outcome = probe_target(session.context_mut(), args.target, args.count, timeout).await;
    session.close().await?;
    outcome
}

/// Run a ping probe against `target` over a live session.
///
/// A `count` of zero sends an unbounded ping that the probe interrupts
/// when its timeout trips.
async fn probe_target(
    ctx: &mut reel::Context,
    target: String,
    count: u32,
    timeout: Duration,
) -> Result<Outcome> {
    let count = (count > 0).then_some(count);
    let mut logger = EchoLogger::new();
    let mut probe = PingProbe::new(target, count, timeout);
    let mut chain = Chain::new().with(&mut logger).with(&mut probe);
    let result = Reel::new(ctx).run(&mut chain).await;
    drop(chain);
    result?;

    tracing::info!(
        transmitted = probe.transmitted(),
        received = probe.received(),
        outcome = %probe.outcome(),
        "Ping probe finished"
    );
    Ok(probe.outcome())
}
