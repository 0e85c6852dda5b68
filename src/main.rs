mod client;
mod config;
mod error;
mod output;
mod search;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::search::{export_params, search_params, window_params};
use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::{fs, io};

#[derive(Parser)]
#[command(
    name = "hepctl",
    version,
    about = "CLI for the HEPIC SIP capture and analysis platform"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "API host URL override for this invocation (otherwise read from config)"
    )]
    host: Option<String>,

    #[arg(
        long,
        global = true,
        help = "API token override for this invocation (otherwise read from config)"
    )]
    token: Option<String>,

    #[arg(
        long,
        short = 'f',
        global = true,
        value_name = "FORMAT",
        help = "Output format: json, table, yaml (unknown values fall back to json)"
    )]
    format: Option<String>,

    #[arg(long, global = true, help = "Enable debug logging to stderr")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the configuration (pass --host/--token or answer prompts)
    Init,
    /// Show the current configuration (token masked)
    ConfigShow,
    /// Show version information
    Version {
        #[arg(long, help = "Also fetch API and UI versions from the server")]
        remote: bool,
    },
    /// Search and inspect SIP call data
    #[command(subcommand)]
    Call(CallCommand),
    /// Export call data as PCAP, SIPp, or plain text
    #[command(subcommand)]
    Export(ExportCommand),
    /// Import capture data into the platform
    #[command(subcommand)]
    Import(ImportCommand),
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage capture agents
    #[command(subcommand)]
    Agent(AgentCommand),
    /// Search and download call recordings
    #[command(subcommand)]
    Recording(RecordingCommand),
    /// Manage lawful call interceptions
    #[command(subcommand)]
    Interception(InterceptionCommand),
    /// Query platform statistics
    #[command(subcommand)]
    Statistic(StatisticCommand),
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(clap::Args)]
struct SearchArgs {
    #[arg(long, value_name = "TIME", help = "Start time (RFC3339, YYYY-MM-DD, or unix ms)")]
    from: String,
    #[arg(long, value_name = "TIME", help = "End time (default: now)")]
    to: Option<String>,
    #[arg(long, help = "Filter by caller (from_user)")]
    caller: Option<String>,
    #[arg(long, help = "Filter by callee (ruri_user)")]
    callee: Option<String>,
    #[arg(long = "call-id", help = "Filter by SIP Call-ID")]
    call_id: Option<String>,
}

#[derive(Subcommand)]
enum CallCommand {
    /// Search for SIP call data
    Search(SearchArgs),
    /// Search for raw SIP messages
    Message(SearchArgs),
    /// Decode SIP messages
    Decode(SearchArgs),
    /// Fetch the full transaction for matching calls
    Transaction(SearchArgs),
    /// Fetch the quality report log for matching calls
    Report(SearchArgs),
}

#[derive(clap::Args)]
struct ExportArgs {
    #[arg(long = "call-id", help = "Call ID to export")]
    call_id: String,
    #[arg(long, value_name = "TIME", help = "Start time (RFC3339, YYYY-MM-DD, or unix ms)")]
    from: Option<String>,
    #[arg(long, value_name = "TIME", help = "End time")]
    to: Option<String>,
    #[arg(long, short = 'o', value_name = "FILE", help = "Output file path")]
    output: PathBuf,
}

#[derive(Subcommand)]
enum ExportCommand {
    /// Export call data as a PCAP capture file
    Pcap(ExportArgs),
    /// Export messages in SIPp scenario format
    Sipp(ExportArgs),
    /// Export messages as plain text
    Text(ExportArgs),
    /// Export the transaction archive for a call
    Archive(ExportArgs),
    /// Export the transaction report for a call
    Report(ExportArgs),
}

#[derive(Subcommand)]
enum ImportCommand {
    /// Import a PCAP file
    Pcap {
        #[arg(long, value_name = "FILE", help = "Path to the PCAP file to import")]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// List all users
    List,
    /// Create a user from a JSON payload
    Create {
        #[arg(long, value_name = "JSON", help = "Inline JSON body")]
        body: Option<String>,
        #[arg(long, value_name = "FILE", help = "Path to JSON body")]
        body_file: Option<PathBuf>,
    },
    /// Update a user by UUID
    Update {
        #[arg(value_name = "UUID")]
        uuid: String,
        #[arg(long, value_name = "JSON", help = "Inline JSON body")]
        body: Option<String>,
        #[arg(long, value_name = "FILE", help = "Path to JSON body")]
        body_file: Option<PathBuf>,
    },
    /// Delete a user by UUID
    Delete {
        #[arg(value_name = "UUID")]
        uuid: String,
    },
    /// Import users from a CSV file
    Import {
        #[arg(long, value_name = "FILE", help = "Path to the CSV file to import")]
        file: PathBuf,
    },
    /// Change a user's password
    Password {
        #[arg(value_name = "UUID")]
        uuid: String,
        #[arg(long, help = "New password")]
        password: String,
    },
    /// List user groups
    Groups,
}

#[derive(Subcommand)]
enum AgentCommand {
    /// List all registered capture agents
    List,
    /// Fetch an agent by UUID
    Get {
        #[arg(value_name = "UUID")]
        uuid: String,
    },
    /// Update an agent by UUID
    Update {
        #[arg(value_name = "UUID")]
        uuid: String,
        #[arg(long, value_name = "JSON", help = "Inline JSON body")]
        body: Option<String>,
        #[arg(long, value_name = "FILE", help = "Path to JSON body")]
        body_file: Option<PathBuf>,
    },
    /// Delete an agent by UUID
    Delete {
        #[arg(value_name = "UUID")]
        uuid: String,
    },
    /// List agents of a given type
    Types {
        #[arg(value_name = "TYPE")]
        agent_type: String,
    },
    /// Search agents by GUID and type
    Search {
        #[arg(long, help = "Agent GUID to search for")]
        guid: String,
        #[arg(long = "type", value_name = "TYPE", help = "Agent type to search for")]
        agent_type: String,
    },
}

#[derive(Subcommand)]
enum RecordingCommand {
    /// Search recordings in a time window
    Search {
        #[arg(long, value_name = "TIME", help = "Start time (RFC3339, YYYY-MM-DD, or unix ms)")]
        from: Option<String>,
        #[arg(long, value_name = "TIME", help = "End time")]
        to: Option<String>,
    },
    /// Fetch recording metadata by UUID
    Info {
        #[arg(value_name = "UUID")]
        uuid: String,
    },
    /// Download a recording file (audio or PCAP) by UUID
    Download {
        #[arg(value_name = "UUID")]
        uuid: String,
        #[arg(long = "type", value_name = "TYPE", default_value = "audio", help = "Download type: audio, pcap")]
        download_type: String,
        #[arg(long, short = 'o', value_name = "FILE", help = "Output file path")]
        output: PathBuf,
    },
}

#[derive(clap::Args)]
struct InterceptionArgs {
    #[arg(long, help = "Caller number or pattern to intercept")]
    caller: Option<String>,
    #[arg(long, help = "Callee number or pattern to intercept")]
    callee: Option<String>,
    #[arg(long, help = "Description of the interception")]
    description: Option<String>,
    #[arg(long, help = "IP address to filter")]
    ip: Option<String>,
    #[arg(long, value_name = "BOOL", help = "Enable or disable the interception")]
    status: Option<bool>,
    #[arg(long = "start-date", value_name = "TIME", help = "Start date for the interception")]
    start_date: Option<String>,
    #[arg(long = "stop-date", value_name = "TIME", help = "Stop date for the interception")]
    stop_date: Option<String>,
}

#[derive(Subcommand)]
enum InterceptionCommand {
    /// List active interceptions
    List,
    /// Create a new interception
    Create(InterceptionArgs),
    /// Update an interception by UUID
    Update {
        #[arg(value_name = "UUID")]
        uuid: String,
        #[command(flatten)]
        args: InterceptionArgs,
    },
    /// Delete an interception by UUID (asks for confirmation without --force)
    Delete {
        #[arg(value_name = "UUID")]
        uuid: String,
        #[arg(long, help = "Skip the confirmation prompt")]
        force: bool,
    },
}

#[derive(Subcommand)]
enum StatisticCommand {
    /// Show database statistics
    Db,
    /// Query statistical data with a JSON payload
    Data {
        #[arg(long, value_name = "JSON", help = "Inline JSON body")]
        body: Option<String>,
        #[arg(long, value_name = "FILE", help = "Path to JSON body")]
        body_file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        output::print_error(&err);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "hepctl=debug" } else { "hepctl=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Init => {
            return run_init(cli.host, cli.token, cli.format);
        }
        Commands::ConfigShow => {
            let mut cfg = config::load()?;
            if cfg.token.is_some() {
                cfg.token = Some("*****".into());
            }
            return output::print(&config::resolve_format(cli.format), &serde_json::to_value(&cfg)?);
        }
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin, &mut io::stdout()),
                CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin, &mut io::stdout()),
                CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin, &mut io::stdout()),
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut io::stdout())
                }
            }
            return Ok(());
        }
        Commands::Version { remote: false } => {
            return output::print(&config::resolve_format(cli.format), &build_info());
        }
        _ => {}
    }

    let effective = config::resolve(cli.host, cli.token, cli.format)?;
    let client = ApiClient::new(&effective.host, &effective.token)?;
    let format = effective.format.as_str();

    match cli.command {
        Commands::Version { remote: true } => {
            let api: Value = client.get("/version/api/info")?;
            let ui: Value = client.get("/version/ui/info")?;
            let mut info = build_info();
            info["api"] = api;
            info["ui"] = ui;
            output::print(format, &info)
        }
        Commands::Call(command) => {
            let (path, args) = match command {
                CallCommand::Search(args) => ("/search/call/data", args),
                CallCommand::Message(args) => ("/search/call/message", args),
                CallCommand::Decode(args) => ("/search/call/decode/message", args),
                CallCommand::Transaction(args) => ("/call/transaction", args),
                CallCommand::Report(args) => ("/call/report/log", args),
            };
            let params = search_params(
                &args.from,
                args.to.as_deref(),
                args.caller.as_deref(),
                args.callee.as_deref(),
                args.call_id.as_deref(),
            )?;
            run_post(&client, path, &serde_json::to_value(&params)?, format)
        }
        Commands::Export(command) => {
            let (path, args) = match command {
                ExportCommand::Pcap(args) => ("/export/call/data/pcap", args),
                ExportCommand::Sipp(args) => ("/export/call/messages/sipp", args),
                ExportCommand::Text(args) => ("/export/call/messages/text", args),
                ExportCommand::Archive(args) => ("/export/call/transaction/archive", args),
                ExportCommand::Report(args) => ("/export/call/transaction/report", args),
            };
            let params = export_params(args.from.as_deref(), args.to.as_deref(), &args.call_id)?;
            let body = client.post_raw(path, Some(&params))?;
            let written = write_to_file(body, &args.output)?;
            eprintln!("Exported {} bytes to {}", written, args.output.display());
            Ok(())
        }
        Commands::Import(ImportCommand::Pcap { file }) => {
            let result: Value = client.post_form_file("/import/data/pcap", "file", &file)?;
            output::print(format, &result)
        }
        Commands::User(command) => match command {
            UserCommand::List => run_get(&client, "/users", format),
            UserCommand::Create { body, body_file } => {
                let payload = require_body(&body, &body_file)?;
                run_post(&client, "/users", &payload, format)
            }
            UserCommand::Update {
                uuid,
                body,
                body_file,
            } => {
                let payload = require_body(&body, &body_file)?;
                let result: Value = client.put(&format!("/users/{uuid}"), Some(&payload))?;
                output::print(format, &result)
            }
            UserCommand::Delete { uuid } => {
                let result: Value = client.delete(&format!("/users/{uuid}"))?;
                output::print(format, &result)
            }
            UserCommand::Import { file } => {
                let result: Value = client.post_form_file("/users/import", "file", &file)?;
                output::print(format, &result)
            }
            UserCommand::Password { uuid, password } => {
                let result: Value = client.put(
                    &format!("/users/update/password/{uuid}"),
                    Some(&json!({ "password": password })),
                )?;
                output::print(format, &result)
            }
            UserCommand::Groups => run_get(&client, "/users/groups", format),
        },
        Commands::Agent(command) => match command {
            AgentCommand::List => run_get(&client, "/agent/subscribe", format),
            AgentCommand::Get { uuid } => {
                run_get(&client, &format!("/agent/subscribe/{uuid}"), format)
            }
            AgentCommand::Update {
                uuid,
                body,
                body_file,
            } => {
                let payload = require_body(&body, &body_file)?;
                let result: Value =
                    client.put(&format!("/agent/subscribe/{uuid}"), Some(&payload))?;
                output::print(format, &result)
            }
            AgentCommand::Delete { uuid } => {
                let result: Value = client.delete(&format!("/agent/subscribe/{uuid}"))?;
                output::print(format, &result)
            }
            AgentCommand::Types { agent_type } => {
                run_get(&client, &format!("/agent/type/{agent_type}"), format)
            }
            AgentCommand::Search { guid, agent_type } => {
                let result: Value = client
                    .post::<Value, ()>(&format!("/agent/search/{guid}/{agent_type}"), None)?;
                output::print(format, &result)
            }
        },
        Commands::Recording(command) => match command {
            RecordingCommand::Search { from, to } => {
                let params = window_params(from.as_deref(), to.as_deref())?;
                run_post(&client, "/recording/search", &serde_json::to_value(&params)?, format)
            }
            RecordingCommand::Info { uuid } => {
                run_get(&client, &format!("/recording/info/{uuid}"), format)
            }
            RecordingCommand::Download {
                uuid,
                download_type,
                output,
            } => {
                if download_type != "audio" && download_type != "pcap" {
                    return Err(anyhow!(
                        "invalid download type {download_type:?}: must be 'audio' or 'pcap'"
                    ));
                }
                let body = client.get_raw(&format!("/recording/download/{download_type}/{uuid}"))?;
                let written = write_to_file(body, &output)?;
                eprintln!("Downloaded {} bytes to {}", written, output.display());
                Ok(())
            }
        },
        Commands::Interception(command) => match command {
            InterceptionCommand::List => run_get(&client, "/interceptions", format),
            InterceptionCommand::Create(args) => {
                run_post(&client, "/interceptions", &interception_body(&args), format)
            }
            InterceptionCommand::Update { uuid, args } => {
                let result: Value = client
                    .put(&format!("/interceptions/{uuid}"), Some(&interception_body(&args)))?;
                output::print(format, &result)
            }
            InterceptionCommand::Delete { uuid, force } => {
                if !force
                    && !confirm(&format!(
                        "Are you sure you want to delete interception {uuid}? [y/N] "
                    ))?
                {
                    eprintln!("Deletion cancelled.");
                    return Ok(());
                }
                let result: Value = client.delete(&format!("/interceptions/{uuid}"))?;
                output::print(format, &result)
            }
        },
        Commands::Statistic(command) => match command {
            StatisticCommand::Db => run_get(&client, "/statistic/_db", format),
            StatisticCommand::Data { body, body_file } => {
                let payload = require_body(&body, &body_file)?;
                run_post(&client, "/statistic/data", &payload, format)
            }
        },
        Commands::Init
        | Commands::ConfigShow
        | Commands::Completion { .. }
        | Commands::Version { .. } => unreachable!("handled earlier"),
    }
}

fn run_get(client: &ApiClient, path: &str, format: &str) -> Result<()> {
    let result: Value = client.get(path)?;
    output::print(format, &result)
}

fn run_post(client: &ApiClient, path: &str, body: &Value, format: &str) -> Result<()> {
    let result: Value = client.post(path, Some(body))?;
    output::print(format, &result)
}

fn build_info() -> Value {
    json!({ "name": "hepctl", "version": env!("CARGO_PKG_VERSION") })
}

fn run_init(host: Option<String>, token: Option<String>, format: Option<String>) -> Result<()> {
    let host = match host {
        Some(host) => host,
        None => prompt("HEPIC API host URL: ")?,
    };
    let token = match token {
        Some(token) => token,
        None => prompt("API token: ")?,
    };

    let host = host.trim().trim_end_matches('/').to_string();
    let token = token.trim().to_string();
    if host.is_empty() {
        return Err(anyhow!("host is required"));
    }
    if token.is_empty() {
        return Err(anyhow!("token is required"));
    }

    eprintln!("Validating connection to {host}...");
    let client = ApiClient::new(&host, &token)?;
    if let Err(err) = client.get::<Value>("/version/api/info") {
        if err
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_auth_failure)
        {
            return Err(err.context("authentication failed; check your API token"));
        }
        return Err(err.context("connection validation failed"));
    }

    let path = config::save(&config::Config {
        host: Some(host.clone()),
        token: Some(token),
        format: None,
    })?;

    output::print(
        &config::resolve_format(format),
        &json!({
            "status": "ok",
            "config_path": path.display().to_string(),
            "host": host,
        }),
    )
}

/// Builds the interception payload from whichever filter flags were set.
/// Unset flags are omitted so an update only touches the given fields.
fn interception_body(args: &InterceptionArgs) -> Value {
    let mut body = serde_json::Map::new();
    if let Some(caller) = &args.caller {
        body.insert("search_caller".into(), json!(caller));
    }
    if let Some(callee) = &args.callee {
        body.insert("search_callee".into(), json!(callee));
    }
    if let Some(description) = &args.description {
        body.insert("description".into(), json!(description));
    }
    if let Some(ip) = &args.ip {
        body.insert("search_ip".into(), json!(ip));
    }
    if let Some(status) = args.status {
        body.insert("status".into(), json!(status));
    }
    if let Some(start) = &args.start_date {
        body.insert("start_date".into(), json!(start));
    }
    if let Some(stop) = &args.stop_date {
        body.insert("stop_date".into(), json!(stop));
    }
    Value::Object(body)
}

fn confirm(label: &str) -> Result<bool> {
    let answer = prompt(label)?;
    Ok(answer.eq_ignore_ascii_case("y"))
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{label}");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading input")?;
    Ok(line.trim().to_string())
}

/// Writes a raw response body to `path`, returning the number of bytes
/// written. The body is consumed and the connection released on all paths.
fn write_to_file(mut body: impl Read, path: &Path) -> Result<u64> {
    let mut file = fs::File::create(path)
        .with_context(|| format!("creating output file {}", path.display()))?;
    io::copy(&mut body, &mut file)
        .with_context(|| format!("writing output file {}", path.display()))
}

fn require_body(body: &Option<String>, body_file: &Option<PathBuf>) -> Result<Value> {
    parse_body(body, body_file)?
        .ok_or_else(|| anyhow!("Provide --body or --body-file with JSON content"))
}

fn parse_body(body: &Option<String>, body_file: &Option<PathBuf>) -> Result<Option<Value>> {
    match (body, body_file) {
        (Some(inline), None) => {
            let value = serde_json::from_str(inline).context("parsing --body as JSON")?;
            Ok(Some(value))
        }
        (None, Some(path)) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading body file {}", path.display()))?;
            let value = serde_json::from_str(&content).context("parsing --body-file as JSON")?;
            Ok(Some(value))
        }
        (None, None) => Ok(None),
        (Some(_), Some(_)) => Err(anyhow!("use only one of --body or --body-file")),
    }
}
