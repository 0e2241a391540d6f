use clap::{Parser, Subcommand};
use client::{
    config::{Config, parse_position},
    models::LatLng,
    push::{on_notification_click, on_push},
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Device position as `lat,lon`, overrides ALERT_POSITION
    #[arg(long, value_parser = parse_position)]
    position: Option<LatLng>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep the live map updated until interrupted
    Watch,

    /// Send an emergency alert from the current position
    Report {
        #[arg(long)]
        description: Option<String>,
    },

    /// Show the unread notification count
    Notifications {
        #[arg(long)]
        clear: bool,
    },

    /// Render the notification a push payload would show
    Push { payload: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    client::init_tracing();

    let args = Args::parse();

    let mut config = Config::load()?;
    if args.position.is_some() {
        config.position = args.position;
    }

    match args.command {
        Command::Watch => client::watch(config).await?,
        Command::Report { description } => {
            let report = client::send_report(&config, description).await?;
            println!("Emergency alert sent from {}", report.address);
        }
        Command::Notifications { clear } => {
            let count = client::unread_notifications(&config, clear).await?;
            println!("Unread notifications: {count}");
        }
        Command::Push { payload } => {
            let notification = on_push(payload.as_deref().map(str::as_bytes))?;

            println!("{}", notification.title);
            println!("{}", serde_json::to_string_pretty(&notification)?);
            println!("On click: {:?}", on_notification_click(&notification));
        }
    }

    Ok(())
}
