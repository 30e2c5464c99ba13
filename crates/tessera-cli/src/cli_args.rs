use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera session client")]
pub struct Cli {
    #[arg(long, env = "TESSERA_PUBLISHABLE_KEY")]
    pub publishable_key: Option<String>,
    #[arg(long, env = "TESSERA_BASE_URL", help = "Overrides the URL derived from the key")]
    pub base_url: Option<String>,
    #[arg(long, env = "TESSERA_APPLICATION_ID")]
    pub application_id: Option<String>,
    #[arg(long, env = "TESSERA_CONFIG_PATH")]
    pub config: Option<String>,
    #[arg(long, value_enum, default_value_t = StoreKind::Keyring)]
    pub store: StoreKind,
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// OS keychain
    Keyring,
    /// Process memory; nothing survives the command
    Memory,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(about = "Print a session token")]
    Token(TokenArgs),
    #[command(about = "Fetch the current client snapshot")]
    Client,
    #[command(about = "End all sessions and forget local state")]
    SignOut(SignOutArgs),
    #[command(about = "List pipeline stages in order")]
    Stages,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::Client => "client",
            Self::SignOut(_) => "sign-out",
            Self::Stages => "stages",
        }
    }
}

#[derive(Args)]
pub struct TokenArgs {
    #[arg(long)]
    pub session: String,
    #[arg(long)]
    pub template: Option<String>,
    #[arg(long)]
    pub skip_cache: bool,
}

#[derive(Args)]
pub struct SignOutArgs {
    #[arg(long, help = "Skip the server call")]
    pub local: bool,
}
