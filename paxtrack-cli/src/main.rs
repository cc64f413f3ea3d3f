use std::{collections::HashMap, net::SocketAddr, time::Duration};

use chrono::Local;
use clap::Parser;
use paxtrack::{
    Command as PaxtrackCommand, Config, Error, Paxtrack, board,
    pax::{AssistanceStatus, ManualPassenger},
    roster_message, sheet, stats, writeback,
};
use qrcode::{QrCode, QrResult, render::unicode};
use tokio::{
    signal,
    sync::{mpsc, oneshot},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    info!("Starting Paxtrack binary...");
    if let Err(e) = run(args).await {
        error!("Error: {e:?}");
    } else {
        info!("Paxtrack has been terminated.");
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.to_config()?;

    let (paxtrack, command_sender) = Paxtrack::new(config)?;
    let (ready_sender, ready_receiver) = oneshot::channel();
    let paxtrack_task = tokio::spawn(async move { paxtrack.run(ready_sender).await });
    ready_receiver
        .await
        .expect("ready channel shouldn't be closed")?;

    match args.command {
        Command::Daemonize => {
            handle_status(&command_sender).await;
            daemonize().await;
        }
        Command::Status => {
            handle_status(&command_sender).await;
        }
        Command::List { all } => {
            handle_list(&command_sender, all).await;
        }
        Command::Stats => {
            handle_stats(&command_sender).await;
        }
        Command::Refresh => {
            handle_refresh(&command_sender).await;
        }
        Command::Add {
            last_name,
            first_name,
            flight_number,
            departure_time,
            assistance,
        } => {
            handle_add(
                &command_sender,
                ManualPassenger {
                    last_name,
                    first_name: first_name.unwrap_or_default(),
                    flight_number,
                    departure_time_text: departure_time,
                    assistance: AssistanceStatus::from_code(&assistance),
                },
            )
            .await;
        }
        Command::Select { pax_id } => {
            handle_select(&command_sender, pax_id).await;
        }
        Command::TogglePriority { id } => {
            handle_toggle_priority(&command_sender, id).await;
        }
        Command::MarkAssisted { id } => {
            handle_mark_assisted(&command_sender, id).await;
        }
        Command::Remove { id } => {
            handle_remove(&command_sender, id).await;
        }
        Command::Watch => {
            handle_watch(&command_sender).await;
        }
    }

    // Shutdown Paxtrack.
    command_sender
        .send(PaxtrackCommand::Shutdown)
        .await
        .inspect_err(|e| {
            error!("Channel send error: {e}");
        })?;
    info!("Waiting for Paxtrack to terminate...");
    if let Err(e) = paxtrack_task.await {
        error!("Failed to wait until Paxtrack is terminated: {e}");
    }
    Ok(())
}

/// A future that resolves when a termination signal is received.
async fn daemonize() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Termination signal received");
}

async fn handle_status(command_sender: &mpsc::Sender<PaxtrackCommand>) {
    info!("Handling status command");
    let (reply_sender, reply_receiver) = oneshot::channel();
    if let Err(e) = command_sender
        .send(PaxtrackCommand::Status { reply_sender })
        .await
    {
        error!("Channel send error: {e}");
        return;
    }
    let Ok(status) = reply_receiver.await else {
        error!("Failed to receive status reply");
        return;
    };

    println!("============================");
    println!(" Status");
    println!("============================");
    println!(
        "{}",
        serde_json::to_string_pretty(&status).expect("Status should be serializable")
    );

    match generate_qr(
        serde_json::to_string(&status)
            .expect("Status should be serializable")
            .as_bytes(),
    ) {
        Ok(code) => {
            println!("{code}");
        }
        Err(e) => {
            error!("Failed to generate QR code: {e}");
        }
    }
}

fn generate_qr(data: &[u8]) -> QrResult<String> {
    let image = QrCode::new(data)?
        .render::<unicode::Dense1x2>()
        .quiet_zone(true)
        .module_dimensions(1, 1)
        .build();
    Ok(image)
}

async fn fetch_records(
    command_sender: &mpsc::Sender<PaxtrackCommand>,
) -> Option<Vec<paxtrack::pax::PassengerRecord>> {
    let (reply_sender, reply_receiver) = oneshot::channel();
    if let Err(e) = command_sender
        .send(PaxtrackCommand::Roster(roster_message::Message::List {
            reply_sender,
        }))
        .await
    {
        error!("Channel send error: {e}");
        return None;
    }
    match reply_receiver.await {
        Ok(records) => Some(records),
        Err(e) => {
            error!("Failed to receive the roster: {e:?}");
            None
        }
    }
}

async fn handle_list(command_sender: &mpsc::Sender<PaxtrackCommand>, all: bool) {
    let Some(records) = fetch_records(command_sender).await else {
        return;
    };
    let now = Local::now().naive_local();
    let entries = board::assemble(&records, now, all);
    let counters = board::counters(&entries);
    println!(
        "{}",
        serde_json::to_string_pretty(&entries).expect("Board should be serializable")
    );
    println!(
        "{} waiting, {} priority",
        counters.waiting, counters.priority
    );
}

async fn handle_stats(command_sender: &mpsc::Sender<PaxtrackCommand>) {
    let Some(records) = fetch_records(command_sender).await else {
        return;
    };
    let summary = stats::Summary::compute(&records, Local::now().naive_local());
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).expect("Summary should be serializable")
    );
}

async fn handle_refresh(command_sender: &mpsc::Sender<PaxtrackCommand>) {
    info!("Triggering a refresh cycle");
    let (reply_sender, reply_receiver) = oneshot::channel();
    if let Err(e) = command_sender
        .send(PaxtrackCommand::Refresh { reply_sender })
        .await
    {
        error!("Channel send error: {e}");
        return;
    }
    match reply_receiver.await {
        Ok(Ok(outcome)) => info!(
            "Refreshed: {} rows, {} changed, {} agent events",
            outcome.rows, outcome.changed, outcome.events
        ),
        Ok(Err(e)) => error!("Refresh failed: {e}"),
        Err(e) => error!("Failed to receive reply: {e:?}"),
    }
}

async fn handle_add(command_sender: &mpsc::Sender<PaxtrackCommand>, passenger: ManualPassenger) {
    let (msg, reply_receiver) = roster_message::AddManualMessage { passenger }.into();
    if let Err(e) = command_sender.send(PaxtrackCommand::Roster(msg)).await {
        error!("Channel send error: {e}");
        return;
    }
    match reply_receiver.await {
        Ok(record) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&record).expect("Record should be serializable")
            );
        }
        Err(e) => error!("Failed to receive reply: {e:?}"),
    }
}

async fn handle_select(command_sender: &mpsc::Sender<PaxtrackCommand>, pax_id: String) {
    info!("Selecting passenger {pax_id} from the source");
    let (reply_sender, reply_receiver) = oneshot::channel();
    if let Err(e) = command_sender
        .send(PaxtrackCommand::AddSelected {
            pax_id: pax_id.into(),
            reply_sender,
        })
        .await
    {
        error!("Channel send error: {e}");
        return;
    }
    match reply_receiver.await {
        Ok(Ok(record)) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&record).expect("Record should be serializable")
            );
        }
        Ok(Err(e)) => error!("Failed to select passenger: {e}"),
        Err(e) => error!("Failed to receive reply: {e:?}"),
    }
}

async fn handle_toggle_priority(command_sender: &mpsc::Sender<PaxtrackCommand>, id: String) {
    let (msg, reply_receiver) = roster_message::TogglePriorityMessage { id: id.into() }.into();
    if let Err(e) = command_sender.send(PaxtrackCommand::Roster(msg)).await {
        error!("Channel send error: {e}");
        return;
    }
    match reply_receiver.await {
        Ok(Ok(record)) => info!(
            "Passenger {} priority is now {}",
            record.last_name, record.is_priority
        ),
        Ok(Err(e)) => error!("Failed to toggle priority: {e}"),
        Err(e) => error!("Failed to receive reply: {e:?}"),
    }
}

async fn handle_mark_assisted(command_sender: &mpsc::Sender<PaxtrackCommand>, id: String) {
    let (msg, reply_receiver) = roster_message::MarkAssistedMessage { id: id.into() }.into();
    if let Err(e) = command_sender.send(PaxtrackCommand::Roster(msg)).await {
        error!("Channel send error: {e}");
        return;
    }
    match reply_receiver.await {
        Ok(Ok(record)) => info!(
            "Passenger {} marked assisted at {}",
            record.last_name,
            record.assisted_at_text.as_deref().unwrap_or("-")
        ),
        Ok(Err(e)) => error!("Failed to mark assisted: {e}"),
        Err(e) => error!("Failed to receive reply: {e:?}"),
    }
}

async fn handle_remove(command_sender: &mpsc::Sender<PaxtrackCommand>, id: String) {
    let (msg, reply_receiver) = roster_message::RemoveMessage { id: id.into() }.into();
    if let Err(e) = command_sender.send(PaxtrackCommand::Roster(msg)).await {
        error!("Channel send error: {e}");
        return;
    }
    match reply_receiver.await {
        Ok(Ok(())) => info!("Passenger removed"),
        Ok(Err(e)) => error!("Failed to remove passenger: {e}"),
        Err(e) => error!("Failed to receive reply: {e:?}"),
    }
}

async fn handle_watch(command_sender: &mpsc::Sender<PaxtrackCommand>) {
    info!("Watching agent status changes, Ctrl+C to stop");
    let (reply_sender, reply_receiver) = oneshot::channel();
    if let Err(e) = command_sender
        .send(PaxtrackCommand::Roster(roster_message::Message::Subscribe {
            reply_sender,
        }))
        .await
    {
        error!("Channel send error: {e}");
        return;
    }
    let Ok(mut events) = reply_receiver.await else {
        error!("Failed to subscribe to agent events");
        return;
    };

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!(
                    "{}",
                    serde_json::to_string(&event).expect("Event should be serializable")
                ),
                Err(e) => {
                    error!("Event stream closed: {e}");
                    return;
                }
            },
            _ = signal::ctrl_c() => {
                info!("Stopped watching");
                return;
            }
        }
    }
}

#[derive(Debug, Parser)]
struct Args {
    #[clap(long, default_value = paxtrack::config::DEFAULT_SITE_ID)]
    site: String,
    #[clap(long)]
    sheet_id: String,
    #[clap(long, default_value = sheet::DEFAULT_RANGE)]
    range: String,
    #[clap(long)]
    api_key: Option<String>,
    #[clap(long)]
    source_endpoint: Option<Url>,
    #[clap(long, value_parser = humantime::parse_duration)]
    source_timeout: Option<Duration>,
    /// Script endpoint for persisting local edits; omit to disable
    /// write-back.
    #[clap(long)]
    writeback_url: Option<Url>,
    #[clap(long, default_value = "")]
    writeback_token: String,
    /// Per-site write-back sheet mapping, as SITE=SHEET_ID pairs.
    #[clap(long = "site-sheet", value_parser = parse_site_sheet)]
    site_sheets: Vec<(String, String)>,
    #[clap(long)]
    rest_addr: Option<SocketAddr>,
    #[clap(long, value_parser = humantime::parse_duration)]
    refresh_interval: Option<Duration>,
    #[clap(long, value_parser = humantime::parse_duration)]
    refresh_initial_delay: Option<Duration>,
    #[clap(long, value_parser = humantime::parse_duration)]
    assisted_linger: Option<Duration>,
    #[clap(subcommand)]
    command: Command,
}

fn parse_site_sheet(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((site, sheet_id)) if !site.is_empty() && !sheet_id.is_empty() => {
            Ok((site.to_string(), sheet_id.to_string()))
        }
        _ => Err(format!("expected SITE=SHEET_ID, got {value:?}")),
    }
}

impl Args {
    fn to_config(&self) -> Result<Config, Error> {
        let mut source = sheet::Config::new(self.sheet_id.clone());
        source.range = self.range.clone();
        source.api_key = self.api_key.clone();
        if let Some(endpoint) = &self.source_endpoint {
            source.endpoint = endpoint.clone();
        }
        if let Some(timeout) = self.source_timeout {
            source.timeout = timeout;
        }

        let mut config = Config {
            site_id: self.site.clone(),
            sites: self
                .site_sheets
                .iter()
                .cloned()
                .collect::<HashMap<_, _>>(),
            source,
            writeback: None,
            refresh_interval: self
                .refresh_interval
                .unwrap_or(paxtrack::config::DEFAULT_REFRESH_INTERVAL),
            refresh_initial_delay: self
                .refresh_initial_delay
                .unwrap_or(paxtrack::config::DEFAULT_REFRESH_INITIAL_DELAY),
            roster: self
                .assisted_linger
                .map(|assisted_linger| paxtrack::RosterConfig { assisted_linger })
                .unwrap_or_default(),
            rest: self
                .rest_addr
                .map_or(Default::default(), |addr| paxtrack::RestConfig { addr }),
        };

        if let Some(webapp_url) = &self.writeback_url {
            config.writeback = Some(writeback::Config {
                webapp_url: webapp_url.clone(),
                site_id: config.site_id.clone(),
                sheet_id: config.sheet_id_for_site()?.to_string(),
                token: self.writeback_token.clone(),
            });
        }

        Ok(config)
    }
}

#[derive(Debug, Parser)]
enum Command {
    /// Run the board until a termination signal arrives.
    Daemonize,
    Status,
    /// Print the display board; --all includes passed departures.
    List {
        #[clap(long)]
        all: bool,
    },
    Stats,
    /// Trigger a refresh cycle outside the periodic schedule.
    Refresh,
    /// Track a passenger that is not in the source.
    Add {
        #[clap(long)]
        last_name: String,
        #[clap(long)]
        first_name: Option<String>,
        #[clap(long)]
        flight_number: String,
        #[clap(long)]
        departure_time: String,
        #[clap(long, default_value = "WCHR")]
        assistance: String,
    },
    /// Track a passenger surfaced by the source.
    Select {
        pax_id: String,
    },
    TogglePriority {
        id: String,
    },
    MarkAssisted {
        id: String,
    },
    Remove {
        id: String,
    },
    /// Stream agent-status change events.
    Watch,
}
