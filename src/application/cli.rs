#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::path;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgGroup;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ChatEndpoint;
use crate::domain::models::ChatError;
use crate::domain::models::Session;
use crate::domain::services::help_text;
use crate::domain::services::SessionStore;
use crate::infrastructure::storage::FileStorage;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

pub fn format_session(idx: usize, session: &Session) -> String {
    let mut line = session
        .messages
        .last()
        .map(|message| {
            return message
                .content
                .split('\n')
                .next()
                .unwrap_or_default()
                .to_string();
        })
        .unwrap_or_default();

    if line.chars().count() >= 70 {
        line = format!("{}...", line.chars().take(67).collect::<String>());
    }

    let mut res = format!(
        "{}. {} (ID: {}, Messages: {}, Updated: {})",
        idx + 1,
        Paint::new(&session.title).bold(),
        session.id,
        session.messages.len(),
        session.updated_at.format("%Y-%m-%d %H:%M")
    );
    if !line.is_empty() {
        res = format!("{res}\n   {}", Paint::new(line).dimmed());
    }

    return res;
}

/// Session management from the command line skips the visit marker, listing
/// sessions shouldn't count as having visited.
async fn load_store() -> Result<SessionStore> {
    let storage = FileStorage::new(
        path::PathBuf::from(Config::get(ConfigKey::DataDir)),
        None,
    );
    return SessionStore::load(Arc::new(storage)).await;
}

fn resolve_session_id(store: &SessionStore, reference: &str) -> Result<String> {
    match store.resolve_session(reference) {
        Some(session) => return Ok(session.id.to_string()),
        None => return Err(ChatError::UnknownSessionId(reference.to_string()).into()),
    }
}

async fn print_sessions_list() -> Result<()> {
    let store = load_store().await?;
    let sessions = store
        .sessions_by_recency()
        .iter()
        .enumerate()
        .map(|(idx, session)| {
            return format_session(idx, session);
        })
        .collect::<Vec<String>>();

    if sessions.is_empty() {
        println!("There are no sessions available. You should start your first one!");
    } else {
        println!("{}", sessions.join("\n"));
    }

    return Ok(());
}

async fn rename_session(matches: &ArgMatches) -> Result<()> {
    let mut store = load_store().await?;
    let reference = matches
        .get_one::<String>(&ConfigKey::SessionID.to_string())
        .map(|e| return e.to_string())
        .unwrap_or_default();
    let title = matches
        .get_one::<String>("title")
        .map(|e| return e.trim().to_string())
        .unwrap_or_default();

    if title.is_empty() {
        return Err(ChatError::EmptyTitle.into());
    }

    let session_id = resolve_session_id(&store, &reference)?;
    store.rename_session(&session_id, &title).await?;
    println!("Renamed session {session_id} to \"{title}\"");

    return Ok(());
}

async fn delete_sessions(matches: &ArgMatches) -> Result<()> {
    let mut store = load_store().await?;

    if let Some(reference) = matches.get_one::<String>(&ConfigKey::SessionID.to_string()) {
        let session_id = resolve_session_id(&store, reference)?;
        store.delete_session(&session_id).await?;
        println!("Deleted session {session_id}");
    } else if matches.get_flag("all") {
        store.clear_sessions().await?;
        println!("Deleted all sessions");
    } else {
        subcommand_sessions_delete().print_long_help()?;
    }

    return Ok(());
}

async fn load_config_from_session(session_reference: &str) -> Result<()> {
    let store = load_store().await?;
    let session_id = resolve_session_id(&store, session_reference)?;
    Config::set(ConfigKey::SessionID, &session_id);

    return Ok(());
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn arg_session_id(help: &str) -> Arg {
    return Arg::new(ConfigKey::SessionID.to_string())
        .short('i')
        .long("id")
        .help(help.to_string())
        .num_args(1);
}

fn subcommand_sessions_delete() -> Command {
    return Command::new("delete")
        .about("Delete one or all sessions.")
        .arg(arg_session_id("Session ID, or its index from `sessions list`."))
        .arg(
            clap::Arg::new("all")
                .long("all")
                .help("Delete all sessions.")
                .action(ArgAction::SetTrue),
        )
        .group(
            ArgGroup::new("delete-args")
                .args([ConfigKey::SessionID.to_string(), "all".to_string()])
                .required(true),
        );
}

fn subcommand_chat() -> Command {
    return Command::new("chat")
        .about("Start chatting. Resumes the last session when run again from the same shell.")
        .arg(
            Arg::new(ConfigKey::Prompt.to_string())
                .short('p')
                .long(ConfigKey::Prompt.to_string())
                .num_args(1)
                .help("Starts a new session with this message and sends it right away."),
        );
}

fn subcommand_sessions() -> Command {
    return Command::new("sessions")
        .about("Manage past chat sessions.")
        .arg_required_else_help(true)
        .subcommand(Command::new("dir").about("Print the sessions data directory path."))
        .subcommand(Command::new("list").about("List all sessions, most recently updated first."))
        .subcommand(
            Command::new("open")
                .about("Open a previous session by ID, or its index from `sessions list`.")
                .arg(arg_session_id("Session ID, or its index from `sessions list`.").required(true)),
        )
        .subcommand(
            Command::new("rename")
                .about("Rename a session.")
                .arg(arg_session_id("Session ID, or its index from `sessions list`.").required(true))
                .arg(
                    Arg::new("title")
                        .short('t')
                        .long("title")
                        .help("The new title.")
                        .num_args(1)
                        .required(true),
                ),
        )
        .subcommand(subcommand_sessions_delete());
}

pub fn build() -> Command {
    let commands_text = help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") {
                return Paint::new(format!("CHAT {line}"))
                    .underline()
                    .bold()
                    .to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");

    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("parley")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_chat())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_sessions())
        .arg(
            Arg::new(ConfigKey::ApiURL.to_string())
                .long(ConfigKey::ApiURL.to_string())
                .env("PARLEY_API_URL")
                .num_args(1)
                .help(format!("Base URL of the chat API. [default: {}]", Config::default(ConfigKey::ApiURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::BackendHealthCheckTimeout.to_string())
                .long(ConfigKey::BackendHealthCheckTimeout.to_string())
                .env("PARLEY_BACKEND_HEALTH_CHECK_TIMEOUT")
                .num_args(1)
                .help(format!("Time to wait in milliseconds before timing out when doing a healthcheck for the chat API. [default: {}]", Config::default(ConfigKey::BackendHealthCheckTimeout)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::BackendTimeout.to_string())
                .long(ConfigKey::BackendTimeout.to_string())
                .env("PARLEY_BACKEND_TIMEOUT")
                .num_args(1)
                .help(format!("Time to wait in milliseconds for an answer before showing the apology message. 0 waits forever. [default: {}]", Config::default(ConfigKey::BackendTimeout)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("PARLEY_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::DataDir.to_string())
                .long(ConfigKey::DataDir.to_string())
                .env("PARLEY_DATA_DIR")
                .num_args(1)
                .help(format!("Directory chat sessions are stored in. [default: {}]", Config::default(ConfigKey::DataDir)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::Endpoint.to_string())
                .short('e')
                .long(ConfigKey::Endpoint.to_string())
                .env("PARLEY_ENDPOINT")
                .num_args(1)
                .help(format!("Which API route plain messages are sent to. [default: {}]", Config::default(ConfigKey::Endpoint)))
                .value_parser(PossibleValuesParser::new(ChatEndpoint::VARIANTS))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::VisitID.to_string())
                .long(ConfigKey::VisitID.to_string())
                .env("PARLEY_VISIT_ID")
                .num_args(1)
                .hide(true)
                .help("Identifies the current visit. Defaults to the parent process id.")
                .global(true),
        );
}

/// Returns whether the chat front-end should start.
pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("chat", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
            return Ok(false);
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        Some(("sessions", subcmd_matches)) => {
            match subcmd_matches.subcommand() {
                Some(("dir", dir_matches)) => {
                    Config::load(build(), vec![&matches, subcmd_matches, dir_matches]).await?;
                    println!("{}", Config::get(ConfigKey::DataDir));
                }
                Some(("list", list_matches)) => {
                    Config::load(build(), vec![&matches, subcmd_matches, list_matches]).await?;
                    print_sessions_list().await?;
                }
                Some(("open", open_matches)) => {
                    Config::load(build(), vec![&matches, subcmd_matches, open_matches]).await?;
                    let reference = Config::get(ConfigKey::SessionID);
                    load_config_from_session(&reference).await?;
                    return Ok(true);
                }
                Some(("rename", rename_matches)) => {
                    Config::load(build(), vec![&matches, subcmd_matches, rename_matches]).await?;
                    rename_session(rename_matches).await?;
                }
                Some(("delete", delete_matches)) => {
                    Config::load(build(), vec![&matches, subcmd_matches, delete_matches]).await?;
                    delete_sessions(delete_matches).await?;
                }
                _ => {
                    subcommand_sessions().print_long_help()?;
                }
            }

            return Ok(false);
        }
        _ => {
            Config::load(build(), vec![&matches]).await?;
        }
    }

    return Ok(true);
}
