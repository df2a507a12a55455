#![warn(missing_docs)]
//! # rpa-console binary
//!
//! Command-line shell over the console service.

use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rpa_console_app::{
    AppError, Console, ConsoleSettings, app_version, build_console, init_tracing,
    redact_sensitive,
};
use rpa_console_core::{DEFAULT_RUN_INTERVAL_SECS, RunMode, RunPhase, TemplateSlot};
use rpa_console_store::{EmailSettings, SmsSettings};
use tracing::error;

#[derive(Parser)]
#[command(name = "rpa-console", version = app_version())]
#[command(about = "Configure and drive the remote RPA job")]
struct Cli {
    #[command(flatten)]
    settings: ConsoleSettings,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate the eight launch prerequisites.
    Check,
    /// Start the job, then follow its status until it ends.
    Start(StartArgs),
    /// Print the current server status once.
    Status,
    /// Print recent job logs.
    Logs,
    /// Stop the job.
    Stop,
    /// Run the personal-info extraction.
    PersonalInfo,
    /// Send one SMS.
    Sms(SmsArgs),
    /// Print the stored configuration (secrets masked).
    ShowConfig,
    /// Save the email section.
    SetEmail(SetEmailArgs),
    /// Save the SMS section.
    SetSms(SetSmsArgs),
}

#[derive(Args)]
struct StartArgs {
    /// Repeat passes instead of running once.
    #[arg(long)]
    continuous: bool,
    /// Seconds between continuous passes.
    #[arg(long, default_value_t = DEFAULT_RUN_INTERVAL_SECS)]
    interval: u32,
}

#[derive(Clone, Copy, ValueEnum)]
enum TemplateArg {
    A,
    B,
}

#[derive(Args)]
struct SmsArgs {
    /// Recipient number.
    phone: String,
    /// Message text; required unless a template is used.
    message: Option<String>,
    /// Use a stored template.
    #[arg(long, value_enum)]
    template: Option<TemplateArg>,
}

#[derive(Args)]
struct SetEmailArgs {
    #[arg(long)]
    address: String,
    #[arg(long, env = "RPA_CONSOLE_APP_PASSWORD", hide_env_values = true)]
    app_password: String,
    #[arg(long, env = "RPA_CONSOLE_SITE_PASSWORD", hide_env_values = true)]
    site_password: String,
}

#[derive(Args)]
struct SetSmsArgs {
    #[arg(long)]
    api_url: String,
    #[arg(long)]
    api_id: String,
    #[arg(long, env = "RPA_CONSOLE_SMS_API_PASSWORD", hide_env_values = true)]
    api_password: String,
    #[arg(long, default_value = "")]
    text_a: String,
    #[arg(long, default_value = "")]
    text_b: String,
}

/// CLI entry point.
#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let result = match build_console(&cli.settings) {
        Ok(console) => {
            let outcome = run(&console, cli.command).await;
            console.teardown();
            outcome
        }
        Err(error) => Err(error),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(stage = "cli", action = "run", error = %redact_sensitive(&error.to_string()), "command failed");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(console: &Console, command: Command) -> Result<(), AppError> {
    match command {
        Command::Check => {
            console.refresh_checks().await?;
            print_checks(console);
        }
        Command::Start(args) => {
            let mode = if args.continuous {
                Some(RunMode::continuous(args.interval)?)
            } else {
                Some(RunMode::Single)
            };
            console.refresh_checks().await?;
            print_checks(console);
            let snapshot = console.start(mode).await?;
            println!("{}", snapshot.status_text);
            follow(console).await;
        }
        Command::Status => println!("{}", console.status_line().await?),
        Command::Logs => {
            let page = console.logs().await?;
            println!("{} of {} lines", page.logs.len(), page.total_logs);
            for entry in page.logs {
                println!("{} [{}] {}", entry.timestamp, entry.channel, entry.message);
            }
        }
        Command::Stop => match console.stop().await? {
            Some(seconds) => println!("Stopped after {seconds}s"),
            None => println!("Stopped"),
        },
        Command::PersonalInfo => {
            let results = console.fetch_personal_info().await?;
            println!("{} result(s) saved to history", results.len());
            for result in results {
                println!("{result}");
            }
        }
        Command::Sms(args) => {
            let slot = args.template.map(|template| match template {
                TemplateArg::A => TemplateSlot::A,
                TemplateArg::B => TemplateSlot::B,
            });
            let message = console.sms_message(slot, args.message)?;
            let status = console.send_sms(&args.phone, &message, Utc::now()).await?;
            let view = console.view();
            let detail = view
                .sms_history
                .entries()
                .next()
                .and_then(|entry| entry.status_info.clone())
                .unwrap_or_default();
            println!("{} {detail}", status.label());
        }
        Command::ShowConfig => println!("{:#?}", console.rpa_config()?),
        Command::SetEmail(args) => {
            console.update_email_settings(EmailSettings {
                address: args.address,
                app_password: args.app_password,
                site_password: args.site_password,
            })?;
            println!("Email settings saved");
        }
        Command::SetSms(args) => {
            let record = console.update_sms_settings(SmsSettings {
                api_url: args.api_url,
                api_id: args.api_id,
                api_password: args.api_password,
                sms_text_a: args.text_a,
                sms_text_b: args.text_b,
            })?;
            println!("SMS settings saved (provider: {})", record.sms_config.provider);
        }
    }
    Ok(())
}

fn print_checks(console: &Console) {
    let view = console.view();
    for line in view.render_checks() {
        println!("{line}");
    }
    if let Some(banner) = view.incomplete_banner() {
        println!("{banner}");
    }
}

async fn follow(console: &Console) {
    let mut last = String::new();
    loop {
        let view = console.view();
        if view.status_text != last {
            println!("{}", view.status_text);
            last = view.status_text;
        }
        if !matches!(view.run_phase, RunPhase::Starting | RunPhase::Running) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
