use clap::{ArgAction, Parser, Subcommand};
use relay_events::RemoteEventSource;
use relay_store::{Conversation, FsChatSaver, MemoryConversationStore, load_chat};
use relay_transcript::{
    RenderNode, RenderSink, TextSink, TokenReplacer, ToolConfig, TurnDriver,
    to_structured_messages,
};
use serde_json::Value;
use std::io::{BufRead, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const SANDBOX_OUTPUT_PREFIX: &str = "sandbox:data/output";
const PUBLIC_OUTPUT_PREFIX: &str = "/output";

#[derive(Parser, Debug)]
#[command(name = "relay-cli")]
#[command(about = "Console host for the Relay stream-to-state adapter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Chat(ChatArgs),
    Replay(ReplayArgs),
}

#[derive(clap::Args, Debug)]
struct ChatArgs {
    /// Reasoning-service stream endpoint.
    #[arg(long, env = "RELAY_URL")]
    url: String,
    #[arg(long)]
    session_id: Option<String>,
    #[arg(long, default_value = "energy")]
    db_name: String,
    #[arg(long, default_value = "local")]
    owner: String,
    /// Directory where finished chats are checkpointed.
    #[arg(long, default_value = "chats")]
    chats_dir: PathBuf,
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(clap::Args, Debug)]
struct ReplayArgs {
    /// A chat file written by a previous session.
    #[arg(long)]
    file: PathBuf,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(args) => chat_command(args).await,
        Commands::Replay(args) => replay_command(args),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

async fn chat_command(args: ChatArgs) -> Result<ExitCode, String> {
    init_tracing(args.verbose);

    let session_id = args
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let saver = Arc::new(FsChatSaver::new(&args.chats_dir).map_err(|error| error.to_string())?);
    let store = Arc::new(
        MemoryConversationStore::new(session_id.clone()).with_saver(saver, args.owner.clone()),
    );
    let source = Arc::new(RemoteEventSource::new(args.url));
    let driver = TurnDriver::new(
        store,
        source,
        ToolConfig::for_session(&session_id, &args.db_name),
    );

    println!("session {session_id} (empty line to quit)");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().map_err(|error| error.to_string())?;
        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|error| error.to_string())?;
        let line = line.trim();
        if read == 0 || line.is_empty() {
            break;
        }

        let mut sink = ConsoleRenderSink::new();
        let outcome = driver
            .submit(line, Vec::new(), &mut sink)
            .await
            .map_err(|error| error.to_string())?;
        if let Some(error) = outcome.error {
            eprintln!("turn failed: {error}");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn replay_command(args: ReplayArgs) -> Result<ExitCode, String> {
    let chat = load_chat(&args.file).map_err(|error| error.to_string())?;
    let conversation = Conversation {
        id: chat.id.clone(),
        messages: chat.messages,
    };
    let structured = to_structured_messages(&conversation);

    if args.json {
        let json = serde_json::to_string_pretty(&structured).map_err(|error| error.to_string())?;
        println!("{json}");
    } else {
        println!("chat: {} ({})", chat.title, chat.id);
        for message in &structured {
            match message {
                relay_transcript::StructuredMessage::Human { content } => {
                    for part in content {
                        match part {
                            relay_store::UserContent::Text { text } => println!("[human] {text}"),
                            relay_store::UserContent::Image { url } => {
                                println!("[human] <image {url}>")
                            }
                        }
                    }
                }
                relay_transcript::StructuredMessage::Ai {
                    content,
                    tool_calls,
                } => {
                    if !content.is_empty() {
                        println!("[ai] {content}");
                    }
                    for call in tool_calls {
                        println!("[ai] call {} ({})", call.tool_name, call.args);
                    }
                }
                relay_transcript::StructuredMessage::Tool {
                    tool_call_id,
                    content,
                } => println!("[tool {tool_call_id}] {content}"),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Render sink that prints the live transcript to stdout, rewriting
/// sandbox output paths to their public form as tokens stream in.
struct ConsoleRenderSink;

impl ConsoleRenderSink {
    fn new() -> Self {
        Self
    }
}

impl RenderSink for ConsoleRenderSink {
    fn append(&mut self, node: RenderNode) {
        match node {
            RenderNode::Separator => println!(),
            RenderNode::User(message) => {
                for part in &message.content {
                    match part {
                        relay_store::UserContent::Text { text } => println!("you: {text}"),
                        relay_store::UserContent::Image { url } => {
                            println!("you: <image {url}>")
                        }
                    }
                }
            }
            RenderNode::TextStream { label } => {
                if let Some(label) = label {
                    println!("-- {label} --");
                }
            }
            RenderNode::ToolCall { tool_name, args } => print_tool_call(&tool_name, &args),
            RenderNode::ToolResult { tool_name, result } => {
                if let Some(response) = &result.response {
                    println!("[{tool_name}] {response}");
                }
                for file in &result.files {
                    println!("[{tool_name}] file: {} -> {}", file.name, file.download_link);
                }
                for image in &result.images {
                    println!("[{tool_name}] image: {image}");
                }
                if let Some(note) = &result.note {
                    println!("[{tool_name}] note: {note}");
                }
                if let Some(error) = &result.error {
                    println!("[{tool_name}] error: {error}");
                }
            }
            RenderNode::Error { message } => eprintln!("{message}"),
        }
    }

    fn text_sink(&mut self) -> Box<dyn TextSink> {
        Box::new(ConsoleTextSink {
            replacer: TokenReplacer::new(SANDBOX_OUTPUT_PREFIX, PUBLIC_OUTPUT_PREFIX),
        })
    }

    fn done(&mut self) {
        println!();
    }
}

/// Code tools render their argument in a fenced block; everything else
/// prints compact JSON.
fn print_tool_call(tool_name: &str, args: &Value) {
    let code = match tool_name {
        "python" | "r" => args.get("code").or_else(|| args.get("query")),
        "sql_query" | "df_query" | "neo4j_query" => args.get("query"),
        _ => None,
    }
    .and_then(Value::as_str);

    match code {
        Some(code) => {
            let lang = match tool_name {
                "python" => "python",
                "r" => "r",
                "neo4j_query" => "cypher",
                _ => "sql",
            };
            println!("[{tool_name}]");
            println!("```{lang}");
            println!("{code}");
            println!("```");
        }
        // Specialist tools take a plain task description.
        None => match args.get("task").and_then(Value::as_str) {
            Some(task) => println!("[{tool_name}] {task}"),
            None => println!("[{tool_name}] {args}"),
        },
    }
}

struct ConsoleTextSink {
    replacer: TokenReplacer,
}

impl TextSink for ConsoleTextSink {
    fn update(&mut self, delta: &str) {
        let out = self.replacer.push(delta);
        if !out.is_empty() {
            print!("{out}");
            let _ = std::io::stdout().flush();
        }
    }

    fn done(&mut self) {
        let out = self.replacer.flush();
        if !out.is_empty() {
            print!("{out}");
        }
        println!();
    }
}
