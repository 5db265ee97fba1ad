use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "wallet-agent")]
#[command(author = "tokenary")]
#[command(version)]
#[command(about = "Headless wallet agent: routes dapp requests through authentication")]
pub struct Args {
    /// Data directory path (logs)
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Config file (defaults to agent.toml in the config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Always ask for the password instead of biometrics
    #[arg(long)]
    pub no_biometrics: bool,

    /// Start as if a wallet password was already created
    #[arg(long)]
    pub has_password: bool,

    /// Initial pasteboard content, e.g. a wc: session link
    #[arg(short, long)]
    pub link: Option<String>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
