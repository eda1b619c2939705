//! Purpose: Hold top-level CLI command dispatch for `snipserve`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: `serve` and `invoke` run on a multi-thread tokio runtime.

use super::*;

pub(super) fn dispatch_command(command: Command, context: Context) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "snipserve", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Serve { subcommand, run } => match subcommand {
            Some(ServeSubcommand::Check) => {
                let config = serve_config_from_run_args(run, &context)?;
                serve::validate_config(&config)?;
                serve::init_tracing("warn");
                let registry = context.load_registry(&config.api_prefix)?;
                emit_json(serve_check_json(&config, &registry));
                Ok(RunOutcome::ok())
            }
            None => {
                let config = serve_config_from_run_args(run, &context)?;
                let runtime = build_runtime()?;
                runtime.block_on(serve::serve(config))?;
                Ok(RunOutcome::ok())
            }
        },
        Command::List { api_prefix } => {
            serve::init_tracing("warn");
            let registry = context.load_registry(&api_prefix)?;
            let snippets = serde_json::to_value(registry.catalogue()).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode catalogue")
                    .with_source(err)
            })?;
            emit_json(json!({
                "snippets": snippets,
                "skipped": skipped_json(&registry),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Invoke { name, params } => {
            let params = parse_params(&params)?;
            serve::init_tracing("warn");
            let registry = context.load_registry(DEFAULT_API_PREFIX)?;
            if !registry.invoker().contains(&name) {
                return Err(Error::new(ErrorKind::NotFound)
                    .with_message(format!("snippet {name} not found"))
                    .with_snippet(name)
                    .with_hint("Run `snipserve list` to see available snippets."));
            }
            let runtime = build_runtime()?;
            let value = runtime.block_on(registry.invoker().invoke(&name, params))?;
            emit_json(value);
            Ok(RunOutcome::ok())
        }
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime, Error> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start runtime")
                .with_source(err)
        })
}
