use crate::brief::{run_merge, run_placeholders, MergeArgs, PlaceholdersArgs};
use crate::server;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sender_compliance::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Sender Compliance",
    about = "Run the numbering compliance service or work with brief templates offline",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect or merge DOCX brief templates without the service
    Brief {
        #[command(subcommand)]
        command: BriefCommand,
    },
}

#[derive(Subcommand, Debug)]
enum BriefCommand {
    /// Substitute a JSON object of bindings into a template
    Merge(MergeArgs),
    /// List the placeholders a template declares, in document order
    Placeholders(PlaceholdersArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum KindArg {
    #[value(name = "10dlc")]
    TenDlc,
    #[default]
    #[value(name = "toll-free")]
    TollFree,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// DOCX brief template to publish before accepting requests
    #[arg(long)]
    pub(crate) brief_template: Option<PathBuf>,
    /// Provider the startup template belongs to
    #[arg(long, default_value_t = 1)]
    pub(crate) template_provider: u64,
    /// Numbering kind the startup template serves
    #[arg(long, value_enum, default_value_t = KindArg::TollFree)]
    pub(crate) template_kind: KindArg,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs {
            template_provider: 1,
            ..ServeArgs::default()
        }));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Brief {
            command: BriefCommand::Merge(args),
        } => run_merge(args),
        Command::Brief {
            command: BriefCommand::Placeholders(args),
        } => run_placeholders(args),
    }
}
