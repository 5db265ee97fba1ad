use color_eyre::Result;
use tracing::info;

use wallet_agent::{
    agent::{Agent, Collaborators},
    config::Config,
    infra::{
        biometrics::PromptAuthenticator, credentials::MemoryCredentialStore,
        pasteboard::{MemoryPasteboard, PasteboardSource},
        sessions::SessionRegistry,
    },
};

mod cli;
mod console;
mod errors;
mod logging;

fn main() -> Result<()> {
    let args = cli::Args::parse_args();

    if let Some(ref data_dir) = args.data_dir {
        // SAFETY: still single-threaded, the runtime and its workers are built below
        unsafe {
            std::env::set_var("WALLET_AGENT_DATA", data_dir);
        }
    }

    errors::install_hooks()?;
    let log_path = logging::init()?;
    eprintln!("wallet-agent: logging to {}", log_path.display());

    let config = Config::new(args.config.as_deref(), args.no_biometrics)?;
    info!("Starting with {:?}", config);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(args, config))
}

async fn run(args: cli::Args, config: Config) -> Result<()> {
    let pasteboard = match args.link {
        Some(ref link) => MemoryPasteboard::with_contents(link.clone()),
        None => MemoryPasteboard::new(),
    };
    let authenticator = PromptAuthenticator::new(config.biometrics);
    let credentials = MemoryCredentialStore::new(args.has_password);
    let presenter = console::ConsolePresenter::new();

    let mut agent = Agent::new(
        config,
        Collaborators {
            source: Box::new(PasteboardSource::new(pasteboard.clone())),
            authenticator: Box::new(authenticator.clone()),
            credentials: Box::new(credentials.clone()),
            sessions: Box::new(SessionRegistry::new()),
            presenter: Box::new(presenter.clone()),
        },
    );

    let console = console::Console {
        handle: agent.handle(),
        presenter,
        pasteboard,
        authenticator,
        credentials,
    };
    let console_task = tokio::spawn(console.run());

    agent.run().await?;

    console_task.abort();
    Ok(())
}
