//! Purpose: `snipserve` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Successful command output is JSON on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `to_exit_code`.
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;

mod command_dispatch;
mod serve;

use snipserve::core::error::{Error, ErrorKind, to_exit_code};
use snipserve::discovery::default_snippets_dir;
use snipserve::invoker::DEFAULT_MAX_DEPTH;
use snipserve::registry::{Registry, RegistryOptions};

const DEFAULT_BIND: &str = "127.0.0.1:8000";
const DEFAULT_PROJECT_NAME: &str = "Snippet Service";
const DEFAULT_API_PREFIX: &str = "/api";
const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:5173"];
const DEFAULT_DATABASE_URL: &str = "sqlite:///./sql_app.db";
const DEFAULT_MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    // Still single-threaded here; no runtime exists yet.
    snipserve::clock::init_local_offset();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint(clap_error_hint(&err)));
            }
        },
    };

    let context = Context {
        snippets_dir: cli.snippets_dir.unwrap_or_else(default_snippets_dir),
        max_call_depth: cli.max_call_depth,
    };

    command_dispatch::dispatch_command(cli.command, context)
}

#[derive(Parser)]
#[command(
    name = "snipserve",
    version,
    about = "Discover code snippets and serve each one as a JSON endpoint",
    long_about = None,
    after_help = r#"EXAMPLES
  $ snipserve serve
  $ snipserve serve --bind 0.0.0.0:8000 --api-prefix /v1
  $ snipserve list
  $ snipserve invoke add_two_numbers --params '{"a": 2, "b": 3}'"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "SNIPSERVE_SNIPPETS_DIR",
        help = "Directory scanned for snippet sources (default: the crate's src/snippets)",
        value_hint = ValueHint::DirPath
    )]
    snippets_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_MAX_DEPTH,
        help = "Maximum nesting of snippet-to-snippet calls"
    )]
    max_call_depth: usize,

    #[command(subcommand)]
    command: Command,
}

struct Context {
    snippets_dir: PathBuf,
    max_call_depth: usize,
}

impl Context {
    fn load_registry(&self, api_prefix: &str) -> Result<Registry, Error> {
        Registry::load_compiled(
            &self.snippets_dir,
            RegistryOptions {
                api_prefix: api_prefix.to_string(),
                max_depth: self.max_call_depth,
            },
        )
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Serve snippets over HTTP",
        long_about = r#"Discover snippets, register one POST route per snippet, and serve JSON.

Routes:
  GET  /health
  GET  <prefix>/snippets
  POST <prefix>/snippets/<name>
  GET  <prefix>/snippets/<name>/code"#,
        after_help = r#"EXAMPLES
  $ snipserve serve
  $ snipserve serve --cors-origin http://localhost:3000 --cors-origin http://localhost:5173
  $ API_PREFIX=/v1 snipserve serve check"#
    )]
    Serve {
        #[command(subcommand)]
        subcommand: Option<ServeSubcommand>,
        #[command(flatten)]
        run: ServeRunArgs,
    },
    #[command(
        about = "List discovered snippets",
        long_about = r#"Print the snippet catalogue, plus any sources that failed to load."#
    )]
    List {
        #[arg(
            long,
            env = "API_PREFIX",
            default_value = DEFAULT_API_PREFIX,
            help = "Path prefix used when rendering endpoints"
        )]
        api_prefix: String,
    },
    #[command(
        arg_required_else_help = true,
        about = "Invoke one snippet and print its result",
        after_help = r#"EXAMPLES
  $ snipserve invoke find_primes --params '{"limit": "20"}'
  $ snipserve invoke current_time"#
    )]
    Invoke {
        #[arg(help = "Snippet name")]
        name: String,
        #[arg(long, default_value = "{}", help = "Parameters as a JSON object")]
        params: String,
    },
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ snipserve completion bash > ~/.local/share/bash-completion/completions/snipserve
  $ snipserve completion zsh > ~/.zfunc/_snipserve
  $ snipserve completion fish > ~/.config/fish/completions/snipserve.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ServeSubcommand {
    #[command(
        about = "Validate serve config and print effective routes without starting",
        after_help = r#"NOTES
  - Exits non-zero when config is invalid
  - Does not bind sockets"#
    )]
    Check,
}

#[derive(Args)]
struct ServeRunArgs {
    #[arg(
        long,
        env = "SNIPSERVE_BIND",
        default_value = DEFAULT_BIND,
        help = "Bind address",
        help_heading = "Connection"
    )]
    bind: String,
    #[arg(
        long,
        env = "PROJECT_NAME",
        default_value = DEFAULT_PROJECT_NAME,
        help = "Project title shown in startup logs",
        help_heading = "Connection"
    )]
    project_name: String,
    #[arg(
        long,
        env = "API_PREFIX",
        default_value = DEFAULT_API_PREFIX,
        help = "Path prefix for snippet routes (empty for none)",
        help_heading = "Connection"
    )]
    api_prefix: String,
    #[arg(
        long = "cors-origin",
        value_name = "ORIGIN",
        env = "BACKEND_CORS_ORIGINS",
        value_delimiter = ',',
        default_values = DEFAULT_CORS_ORIGINS,
        help = "Allow browser requests from this origin (repeatable; empty disables CORS)",
        help_heading = "Connection"
    )]
    cors_origin: Vec<String>,
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = DEFAULT_DATABASE_URL,
        help = "Storage connection string (reserved; snippets do not use it)",
        help_heading = "Storage"
    )]
    database_url: String,
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_BODY_BYTES,
        help = "Max request body size in bytes",
        help_heading = "Safety"
    )]
    max_body_bytes: u64,
}

fn serve_config_from_run_args(run: ServeRunArgs, context: &Context) -> Result<serve::ServeConfig, Error> {
    let bind: SocketAddr = run.bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid bind address")
            .with_hint("Use a host:port value like 127.0.0.1:8000.")
    })?;
    let cors_allowed_origins = run
        .cors_origin
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();
    Ok(serve::ServeConfig {
        bind,
        project_name: run.project_name,
        api_prefix: run.api_prefix,
        cors_allowed_origins,
        database_url: run.database_url,
        snippets_dir: context.snippets_dir.clone(),
        max_body_bytes: run.max_body_bytes,
        max_call_depth: context.max_call_depth,
    })
}

fn serve_check_json(config: &serve::ServeConfig, registry: &Registry) -> Value {
    let routes: Vec<Value> = registry
        .names()
        .iter()
        .map(|name| json!({ "method": "POST", "path": registry.endpoint(name) }))
        .chain(
            registry
                .source_names()
                .map(|name| json!({ "method": "GET", "path": registry.code_endpoint(name) })),
        )
        .collect();
    json!({
        "check": {
            "status": "valid",
            "project_name": config.project_name,
            "bind": config.bind.to_string(),
            "api_prefix": config.api_prefix,
            "catalogue": registry.catalogue_path(),
            "cors_allowed_origins": config.cors_allowed_origins,
            "database_url": config.database_url,
            "snippets_dir": display_path(&config.snippets_dir),
            "max_body_bytes": config.max_body_bytes,
            "max_call_depth": config.max_call_depth,
            "routes": routes,
            "skipped": skipped_json(registry),
        }
    })
}

fn skipped_json(registry: &Registry) -> Vec<Value> {
    registry
        .skipped()
        .iter()
        .map(|skipped| json!({ "name": skipped.name, "reason": skipped.reason }))
        .collect()
}

fn parse_params(data: &str) -> Result<Value, Error> {
    let value: Value = serde_json::from_str(data).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid json")
            .with_hint("Provide a JSON object (e.g. '{\"a\": 1}').")
            .with_source(err)
    })?;
    if !value.is_object() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("params must be a JSON object")
            .with_hint("Wrap values in an object (e.g. '{\"limit\": \"10\"}')."));
    }
    Ok(value)
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

fn emit_json(value: Value) {
    let encoded = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    let json = encoded.unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(err.detail()));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(snippet) = err.snippet() {
        inner.insert("snippet".to_string(), json!(snippet));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(display_path(path)));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", err.detail())];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(snippet) = err.snippet() {
        lines.push(format!("snippet: {snippet}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", display_path(path)));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);
    let Some(usage) = usage else {
        return "Try `snipserve --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "snipserve") else {
        return "Try `snipserve --help`.".to_string();
    };
    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect();
    if parts.is_empty() {
        return "Try `snipserve --help`.".to_string();
    }
    format!("Try `snipserve {} --help`.", parts.join(" "))
}
