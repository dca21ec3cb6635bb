//! huddle CLI - Main entry point

mod daemon;
mod tasks;
mod tools;

use clap::{Parser, Subcommand};
use huddle_foundation::{ChatroomId, Role};
use huddle_supervisor::HuddleContext;
use huddle_task::{TaskOrigin, TaskStatus};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// huddle - multi-agent chatroom coordinator
#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the background supervisor
    Daemon {
        #[command(subcommand)]
        action: DaemonCommand,
    },
    /// Create, move and inspect tasks
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },
    /// List agent tools and their capabilities
    Tools,
    /// List the models a tool can run
    Models {
        /// Tool id (claude, pi, opencode)
        tool: String,
    },
}

#[derive(Subcommand, Debug)]
enum DaemonCommand {
    /// Start the supervisor in the background
    Start,
    /// Stop the background supervisor and its agents
    Stop,
    /// Show the supervisor and agent processes
    Status,
    /// Run the supervisor in the foreground
    Run,
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Create a task in its origin's initial status
    Create {
        /// Chatroom the task belongs to
        #[arg(short, long)]
        chatroom: ChatroomId,
        /// chat or backlog
        #[arg(short, long, default_value = "chat")]
        origin: TaskOrigin,
        /// Task description
        content: String,
    },
    /// Move a task to another status
    Move {
        /// Task id (or a unique prefix)
        id: String,
        /// Target status
        status: TaskStatus,
        /// Role requesting the move
        #[arg(long = "as", default_value = "user")]
        actor: Role,
        /// Role to assign when entering pending or backlog_acknowledged
        #[arg(long)]
        assign: Option<Role>,
    },
    /// Claim an actionable task for a role
    Claim {
        /// Task id (or a unique prefix)
        id: String,
        /// Claiming role
        #[arg(long = "as")]
        actor: Role,
    },
    /// List tasks, oldest first
    List {
        #[arg(short, long)]
        chatroom: Option<ChatroomId>,
        #[arg(short, long)]
        origin: Option<TaskOrigin>,
        #[arg(short, long)]
        status: Option<TaskStatus>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one task
    Show {
        /// Task id (or a unique prefix)
        id: String,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let context = HuddleContext::load()?;

    match args.command {
        Command::Daemon { action } => match action {
            DaemonCommand::Start => daemon::start(&context, args.debug),
            DaemonCommand::Stop => daemon::stop(&context).await,
            DaemonCommand::Status => daemon::status(&context),
            DaemonCommand::Run => daemon::run(&context).await,
        },
        Command::Task { action } => match action {
            TaskCommand::Create {
                chatroom,
                origin,
                content,
            } => tasks::create(&context, chatroom, origin, &content),
            TaskCommand::Move {
                id,
                status,
                actor,
                assign,
            } => tasks::move_task(&context, &id, status, actor, assign),
            TaskCommand::Claim { id, actor } => tasks::claim(&context, &id, actor),
            TaskCommand::List {
                chatroom,
                origin,
                status,
                json,
            } => tasks::list(&context, chatroom, origin, status, json),
            TaskCommand::Show { id, json } => tasks::show(&context, &id, json),
        },
        Command::Tools => tools::list_tools(&context),
        Command::Models { tool } => tools::list_models(&context, &tool).await,
    }
}
