//! gearwire CLI Client
//!
//! Submit jobs to a job server and run admin commands.

use std::process;

use clap::{Parser, Subcommand};
use gearwire::protocol::{AdminCommand, DEFAULT_PORT};
use gearwire::{Config, Connection, JobRequest, JobState, Priority};
use tracing_subscriber::{fmt, EnvFilter};

/// gearwire CLI
#[derive(Parser, Debug)]
#[command(name = "gearwire-cli")]
#[command(about = "CLI client for Gearman job servers")]
#[command(version)]
struct Args {
    /// Job server address (host:port)
    #[arg(short, long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Read timeout in milliseconds (0 = wait forever)
    #[arg(short, long, default_value = "30000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a job and wait for its result
    Submit {
        /// Function name
        task: String,

        /// Job payload
        data: String,

        /// De-duplication token
        #[arg(short, long, default_value = "")]
        unique: String,

        /// normal, high or low
        #[arg(short, long, default_value = "normal")]
        priority: Priority,

        /// Do not wait for the job to finish
        #[arg(short, long)]
        background: bool,
    },

    /// Run an admin command (status, version, workers, maxqueue, shutdown)
    Admin {
        command: AdminCommand,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gearwire=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("gearwire CLI v{}", gearwire::VERSION);
    tracing::info!("Job server: {}", args.server);

    let config = Config::builder()
        .server_addr(&args.server)
        .read_timeout_ms(args.timeout_ms)
        .build();

    if let Err(e) = run(config, args.command) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(config: Config, command: Commands) -> gearwire::Result<()> {
    let mut connection = Connection::connect(config)?;

    match command {
        Commands::Submit {
            task,
            data,
            unique,
            priority,
            background,
        } => {
            let request = JobRequest::new(task, unique, data)
                .priority(priority)
                .background(background)
                .shared();

            connection.submit(&request)?;
            connection.wait_for(std::slice::from_ref(&request))?;

            let request = request.lock();
            let handle = request
                .handle()
                .map(|h| String::from_utf8_lossy(h).into_owned())
                .unwrap_or_default();

            match request.state {
                JobState::Complete => {
                    let result = request.result.clone().unwrap_or_default();
                    println!("{}", String::from_utf8_lossy(&result));
                }
                JobState::Failed => {
                    eprintln!("job {} failed", handle);
                    process::exit(2);
                }
                state => println!("job {} {}", handle, state),
            }
        }
        Commands::Admin { command } => {
            for line in connection.admin(command)? {
                println!("{}", line);
            }
        }
    }

    Ok(())
}
