//! Terminal client for the streaming answer service.

mod view;

use answer_stream::init_observability;
use answer_stream::prelude::*;
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt as _;
use tokio::task::JoinHandle;

use crate::view::TerminalView;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "answer", about = "Ask the answer service from the terminal")]
struct Cli {
    /// Base URL of the answer service
    #[arg(long, global = true, env = "ANSWER_STREAM_BASE_URL")]
    base_url: Option<String>,

    /// Model id; defaults to the first model in the saved settings
    #[arg(long, global = true)]
    model: Option<String>,

    /// Search engine override
    #[arg(long, global = true)]
    engine: Option<String>,

    #[arg(long, global = true)]
    max_results: Option<u32>,

    #[arg(long, global = true)]
    max_iterations: Option<u32>,

    /// Continue an existing conversation
    #[arg(long, global = true)]
    session: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Interactive loop (default)
    Chat,
    /// Ask one question and print the rendered answer
    Ask {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// List saved conversations
    History,
    /// Print a saved conversation
    Show { id: String },
    /// Delete a saved conversation
    Delete { id: String },
    /// Delete every saved conversation
    ClearHistory,
    /// Print the saved settings as JSON
    Settings,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _ = dotenvy::dotenv();
    init_observability();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "answer failed");
        eprintln!("{}", failure_message(err.as_ref()));
        std::process::exit(1);
    }
}

/// One-line report of `err` and its causes for stderr.
fn failure_message(err: &dyn std::error::Error) -> String {
    let mut message = format!("answer: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.base_url(base_url.clone());
    }
    let api = ApiClient::new(config.clone())?;

    match cli.command.as_ref().unwrap_or(&Command::Chat) {
        Command::Chat => {
            let (session, options) = prepare_session(&cli, &api, config).await?;
            interactive(session, options).await
        }
        Command::Ask { query } => {
            let (session, options) = prepare_session(&cli, &api, config).await?;
            ask(session, &query.join(" "), &options).await
        }
        Command::History => {
            for chat in api.fetch_history().await? {
                println!("{}\t{}\t{}", chat.id, chat.timestamp, chat.title);
            }
            Ok(())
        }
        Command::Show { id } => {
            let record = api.fetch_chat(id).await?;
            let renderer = CitationRenderer::default();
            for message in &record.messages {
                if message.is_assistant() {
                    println!("{}", renderer.render_history(&message.content));
                } else {
                    println!("> {}", message.content);
                }
            }
            Ok(())
        }
        Command::Delete { id } => {
            api.delete_chat(id).await?;
            eprintln!("deleted {id}");
            Ok(())
        }
        Command::ClearHistory => {
            api.clear_history().await?;
            eprintln!("history cleared");
            Ok(())
        }
        Command::Settings => {
            let settings = api.fetch_settings().await?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

async fn prepare_session(
    cli: &Cli,
    api: &ApiClient,
    config: ClientConfig,
) -> CliResult<(ChatSession, QueryOptions)> {
    let settings = match api.fetch_settings().await {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %err, "using default settings");
            Settings::default()
        }
    };
    let session = ChatSession::http(config)?;
    session.set_session_id(cli.session.clone());
    Ok((session, query_options(cli, &settings)))
}

fn query_options(cli: &Cli, settings: &Settings) -> QueryOptions {
    let mut options = settings.query_options(cli.model.as_deref());
    if let Some(engine) = &cli.engine {
        options = options.search_engine(engine.clone());
    }
    if let Some(max_results) = cli.max_results {
        options = options.max_results(max_results);
    }
    if let Some(max_iterations) = cli.max_iterations {
        options = options.max_iterations(max_iterations);
    }
    options
}

async fn ask(session: ChatSession, query: &str, options: &QueryOptions) -> CliResult<()> {
    let canceller = {
        let session = session.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                session.cancel();
            }
        })
    };
    let mut view = TerminalView::default();
    let result = session.send(query, options, &mut view).await;
    canceller.abort();
    view.finish();

    if !view.html().is_empty() {
        println!("{}", view.html());
    }
    match result? {
        Outcome::Completed { session_id, .. } => {
            if let Some(session_id) = session_id {
                eprintln!("session: {session_id}");
            }
        }
        Outcome::Cancelled { .. } => eprintln!("stopped"),
    }
    Ok(())
}

async fn interactive(session: ChatSession, options: QueryOptions) -> CliResult<()> {
    eprintln!("Type a question. /new starts a new conversation, /quit exits.");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut running: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {}
                    "/quit" => break,
                    "/new" => {
                        session.cancel();
                        session.set_session_id(None);
                        eprintln!("new conversation");
                    }
                    query => running = Some(spawn_request(&session, query.to_string(), options.clone())),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if !session.cancel() {
                    break;
                }
            }
        }
    }

    session.cancel();
    if let Some(task) = running {
        let _ = task.await;
    }
    Ok(())
}

fn spawn_request(session: &ChatSession, query: String, options: QueryOptions) -> JoinHandle<()> {
    let session = session.clone();
    tokio::spawn(async move {
        let mut view = TerminalView::default();
        let result = session.send(&query, &options, &mut view).await;
        view.finish();
        if matches!(
            result,
            Ok(Outcome::Cancelled {
                reason: CancelReason::Superseded,
                ..
            })
        ) {
            return;
        }
        if !view.html().is_empty() {
            println!("{}", view.html());
        }
        if let Err(err) = result {
            tracing::error!(error = %err, "request failed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_after_subcommand_are_accepted() {
        let cli = Cli::try_parse_from([
            "answer",
            "ask",
            "what",
            "is",
            "rust",
            "--engine",
            "duckduckgo",
            "--max-results",
            "3",
        ])
        .expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::Ask {
                query: vec!["what".into(), "is".into(), "rust".into()]
            })
        );
        assert_eq!(cli.engine.as_deref(), Some("duckduckgo"));
        assert_eq!(cli.max_results, Some(3));
    }

    #[test]
    fn flags_override_saved_settings() {
        let cli = Cli::try_parse_from([
            "answer",
            "--model",
            "m2",
            "--max-iterations",
            "2",
            "clear-history",
        ])
        .expect("parse");
        let settings = Settings {
            model_id: "m1,m2".into(),
            ..Settings::default()
        };
        let options = query_options(&cli, &settings);
        assert_eq!(options.model.as_deref(), Some("m2"));
        assert_eq!(options.max_iterations, 2);
        assert_eq!(options.max_results, 8);
        assert_eq!(cli.command, Some(Command::ClearHistory));
    }

    #[test]
    fn failure_message_includes_causes() {
        let err = ClientError::Validation("query is empty".into());
        let message = failure_message(&err);
        assert!(message.starts_with("answer: "));
        assert!(message.contains("query is empty"));

        let io = std::io::Error::other(ClientError::Validation("bad id".into()));
        let message = failure_message(&io);
        assert!(message.starts_with("answer: "));
        assert!(message.contains("bad id"));
    }
}
