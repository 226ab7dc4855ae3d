use clap::Parser;
use tracing_subscriber::EnvFilter;
use tuneconf::{
    cli::commands::{
        doctor::DoctorCommand, inspect::InspectCommand, list::ListCommand, new::NewCommand,
        CommandHandler, CommandResult,
    },
    cli::{Cli, Commands},
    config::Settings,
    Result,
};

/// Logs go to stderr so stdout stays machine-readable
fn initialize_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_handler(cli: Cli) -> Result<Box<dyn CommandHandler>> {
    let (mut settings, settings_file) = Settings::discover(cli.settings.as_deref())?;
    cli.apply_overrides(&mut settings);
    settings.validate()?;

    let handler: Box<dyn CommandHandler> = match cli.command {
        Commands::List { catalog, json } => Box::new(ListCommand::new(settings, catalog, json)),
        Commands::New {
            from,
            template,
            token,
            new_version,
            dataset,
            reuse_dataset,
            strategy,
            yes,
            json,
        } => Box::new(NewCommand {
            settings,
            from,
            template,
            token,
            version: new_version,
            dataset,
            reuse_dataset,
            strategy,
            yes,
            json,
        }),
        Commands::Inspect { folder, dataset } => {
            Box::new(InspectCommand::new(settings, folder, dataset))
        }
        Commands::Doctor => Box::new(DoctorCommand::new(settings, settings_file)),
    };
    Ok(handler)
}

fn main() {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level);
    tracing::debug!(command = cli.command.name(), "Starting");

    let result = match build_handler(cli) {
        Ok(handler) => handler.execute().unwrap_or_else(CommandResult::from),
        Err(e) => CommandResult::from(e),
    };

    match &result {
        CommandResult::Success(Some(msg)) => println!("{}", msg),
        CommandResult::Success(None) => {}
        CommandResult::Warning(msg) => eprintln!("⚠️  {}", msg),
        CommandResult::Error(msg) | CommandResult::Rejected(msg) => eprintln!("Error: {}", msg),
    }
    std::process::exit(result.exit_code());
}
