use anyhow::Result;
use clap::Parser;
use dualchat::config::Config;
use dualchat::console::{self, MenuChoice, ModeExit};
use dualchat::conversation::{Conversation, ProviderMode, Role};
use dualchat::llm::{Backend, LlmClient};
use dualchat::request::build_messages_request;
use dualchat::session::ChatSession;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "dualchat",
    about = "Console chat with a chat-completion provider and an extended-reasoning provider"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "dualchat.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start chatting in one mode without the menu
    Chat {
        /// Provider mode: chat or reasoning
        #[arg(long, default_value = "chat")]
        mode: ProviderMode,

        /// Enable web search for this session
        #[arg(long)]
        web_search: bool,
    },

    /// Delete the saved conversation history
    Clear,

    /// Send one reasoning request and dump the raw response structure
    Probe {
        /// Prompt to send
        #[arg(default_value = "Explain the Pythagorean theorem")]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dualchat=warn")),
        )
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;
    config.validate()?;

    if let Some(Command::Clear) = cli.command {
        let path = &config.session.history_file;
        Conversation::empty(ProviderMode::Chat, false, config.session.system_prompt.clone())
            .clear(Some(path.as_path()));
        println!("History cleared: {}", path.display());
        return Ok(());
    }

    let client = match LlmClient::from_config(&config) {
        Ok(client) => client,
        Err(e) if e.is_fatal() => {
            let var = &config.api.key_env;
            eprintln!("Error: {e}");
            eprintln!("Create a .env file next to the program and add {var}=your_key");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    match cli.command {
        Some(Command::Chat { mode, web_search }) => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut session = ChatSession::start(&config, mode, web_search, &client);
            console::run_mode(&mut session, &mut lines).await?;
            Ok(())
        }
        Some(Command::Probe { prompt }) => probe(&config, &client, prompt).await,
        Some(Command::Clear) | None => run_menu(&config, &client).await,
    }
}

async fn run_menu(config: &Config, client: &LlmClient) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!("{}", console::menu_text());
        print!("\nSelect mode: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\nGoodbye!");
            return Ok(());
        };

        match console::parse_menu_choice(&line) {
            Some(MenuChoice::Quit) => {
                println!("\nGoodbye!");
                return Ok(());
            }
            Some(MenuChoice::Mode(mode)) => {
                let Some(web_search) = console::ask_web_search(&mut lines).await? else {
                    return Ok(());
                };
                let mut session = ChatSession::start(config, mode, web_search, client);
                match console::run_mode(&mut session, &mut lines).await? {
                    ModeExit::Sentinel | ModeExit::Interrupted => continue,
                    ModeExit::EndOfInput => return Ok(()),
                }
            }
            None => println!("\nInvalid choice. Please enter 0, 1 or 2.\n"),
        }
    }
}

async fn probe(config: &Config, client: &LlmClient, prompt: String) -> Result<()> {
    let mut conversation = Conversation::seeded(
        ProviderMode::Reasoning,
        false,
        config.session.system_prompt.clone(),
    );
    conversation.append(Role::User, prompt)?;
    let request = build_messages_request(&conversation, &config.reasoning, false);

    println!("model: {}", request.model);
    println!("thinking budget: {}\n", request.thinking.budget_tokens);

    let response = client.create_message(&request).await?;
    println!("{}\n", serde_json::to_string_pretty(&response)?);
    println!("{}", console::describe_response(&response));
    Ok(())
}
