use clap::{Parser, Subcommand};
use relay_broker::PusherSubscriber;
use relay_core::{
    config::quiet_window_from_env_value, constants, Field, RelayError, SubscriberConfig, Topic,
};
use relay_dashboard::{render, LiveView};
use relay_emitter::{FormSession, FormSync, HttpPublisher, SubmitError};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Real-time patient form relay CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the staff dashboard live
    Watch {
        /// Append each frame instead of redrawing the screen
        #[arg(long)]
        no_clear: bool,
    },
    /// Fill in the patient form from stdin
    ///
    /// One command per line: `field=value`, `submit`, `clear`, `show` or `quit`.
    Fill {
        /// Relay publish endpoint (overrides RELAY_ENDPOINT)
        #[arg(long)]
        endpoint: Option<String>,
    },
}

/// One line of `fill` input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Set(Field, String),
    Submit,
    Clear,
    Show,
    Quit,
    Blank,
}

fn parse_line(line: &str) -> Result<Input, RelayError> {
    let line = line.trim();
    match line {
        "" => Ok(Input::Blank),
        "submit" => Ok(Input::Submit),
        "clear" => Ok(Input::Clear),
        "show" => Ok(Input::Show),
        "quit" | "exit" => Ok(Input::Quit),
        _ => {
            let (name, value) = line.split_once('=').ok_or_else(|| {
                RelayError::InvalidInput(format!("expected field=value, got {line}"))
            })?;
            Ok(Input::Set(name.trim().parse()?, value.trim().to_owned()))
        }
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Watch { no_clear }) => watch(no_clear).await,
        Some(Commands::Fill { endpoint }) => fill(endpoint).await,
        None => {
            println!("Use 'relay --help' for commands");
            Ok(())
        }
    }
}

async fn watch(no_clear: bool) -> anyhow::Result<()> {
    let config = SubscriberConfig::from_lookup(env_lookup)?;
    let topic = Topic::from_lookup(env_lookup)?;
    let subscriber = PusherSubscriber::new(config);

    let mut view = LiveView::mount(&subscriber, &topic).await?;
    draw(&view, no_clear);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            outcome = view.step() => match outcome {
                Some(outcome) => {
                    tracing::debug!("dashboard event: {outcome:?}");
                    draw(&view, no_clear);
                }
                None => {
                    tracing::warn!("subscription ended");
                    break;
                }
            },
        }
    }

    view.unmount().await;
    Ok(())
}

fn draw(view: &LiveView, no_clear: bool) {
    if !no_clear {
        print!("\x1B[2J\x1B[H");
    }
    println!("{}", render(view.state()));
}

async fn fill(endpoint: Option<String>) -> anyhow::Result<()> {
    let endpoint = endpoint
        .or_else(|| env_lookup(constants::ENV_RELAY_ENDPOINT))
        .unwrap_or_else(|| constants::DEFAULT_ENDPOINT_URL.into());
    let quiet = quiet_window_from_env_value(env_lookup(constants::ENV_RELAY_DEBOUNCE_MS))?;

    tracing::info!("-- Relaying form edits to {} ({} ms quiet window)", endpoint, quiet.as_millis());
    let publisher = HttpPublisher::new(endpoint)?;
    let mut session = FormSession::new(FormSync::spawn(Arc::new(publisher), quiet));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = match parse_line(&line) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match input {
            Input::Set(field, value) => session.set_field(field, value),
            Input::Submit => match session.submit(chrono::Local::now().date_naive()).await {
                Ok(_) => println!("Form submitted successfully!"),
                Err(SubmitError::Invalid(errors)) => {
                    for (field, message) in errors.iter() {
                        println!("{}: {}", field.label(), message);
                    }
                }
                Err(e) => eprintln!("Submission failed: {e}"),
            },
            Input::Clear => session.clear(),
            Input::Show => println!("{}", serde_json::to_string_pretty(session.form())?),
            Input::Quit => break,
            Input::Blank => {}
        }
    }

    session.close().await;
    Ok(())
}
