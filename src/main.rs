/*
 * gnss-module: GNSS positioning module controller.
 * This framework is shipped under Mozilla Public V2 license.
 */
use env_logger::{Builder, Target};

use log::{debug, error, info, warn};

use tokio::{
    signal,
    sync::mpsc::{Receiver, Sender},
};

use std::io::Write;

use gnss_module::{
    AppDataKind, Error, LifecycleBus, LifecycleEvent, Module, OutputEvent,
    device::{interface::Interface, replay::Replay},
    runtime::Runtime,
};

mod cli;

use crate::cli::Cli;

/// Prints each [OutputEvent] as one JSON line,
/// notifies every concluded session.
async fn print_events(mut output: Receiver<OutputEvent>, concluded: Sender<()>) {
    let mut stdout = std::io::stdout();

    while let Some(event) = output.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => {
                if let Err(e) = writeln!(stdout, "{}", line) {
                    error!("stdout: {}", e);
                    break;
                }
            },
            Err(e) => error!("{} - serialization error: {}", event, e),
        }

        if session_concluded(&event) {
            let _ = concluded.try_send(());
        }
    }
}

/// [OutputEvent::Timeout] always follows [OutputEvent::Inactive]
/// and is not counted.
fn session_concluded(event: &OutputEvent) -> bool {
    matches!(event, OutputEvent::Inactive | OutputEvent::ShutdownReady)
}

/// Submits the lifecycle sequence and `requests` periodic position requests.
/// Each request waits for its session to conclude, at most `period`.
async fn application(
    bus: LifecycleBus,
    requests: usize,
    period: std::time::Duration,
    mut concluded: Receiver<()>,
) -> Result<(), Error> {
    bus.submit(LifecycleEvent::AppStarted).await?;
    bus.submit(LifecycleEvent::ModemInitialized).await?;

    for nth in 0..requests {
        if nth > 0 {
            tokio::time::sleep(period).await;
        }

        info!("position request #{}", nth + 1);

        bus.submit(LifecycleEvent::DataRequested(vec![AppDataKind::Gnss]))
            .await?;

        match tokio::time::timeout(period, concluded.recv()).await {
            Ok(Some(_)) => {},
            Ok(None) => break,
            Err(_) => warn!("position request #{} not concluded", nth + 1),
        }
    }

    Ok(())
}

#[tokio::main]
pub async fn main() -> Result<(), Error> {
    let mut builder = Builder::from_default_env();

    builder
        .target(Target::Stdout)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    let deploy_time = Runtime::host_time()?;

    // cli
    let cli = Cli::new();
    let settings = cli.settings()?;
    let requests = cli.requests()?;
    let period = cli.period()?;

    let filepath = cli
        .filepath()
        .ok_or_else(|| Error::Settings("missing recording".to_string()))?;

    // AT interface
    let interface = match cli.serial_port() {
        Some(port) => {
            let baud_rate = cli.baud_rate()?;
            Interface::open_serial_port(port, baud_rate).map_err(|source| Error::Toggle {
                command: format!("open {}", port),
                source,
            })?
        },
        None => {
            warn!("no modem port: hardware toggles acknowledged locally");
            Interface::Loopback
        },
    };

    // receiver
    let replay = Replay::open_file(filepath)?;

    let (module, bus, output) = Module::new(
        settings.clone(),
        replay,
        Box::new(interface),
        Box::new(Runtime::new(deploy_time)),
    )?;

    info!(
        "{} - module deployed ({} board, {} format)",
        deploy_time, settings.board, settings.format
    );

    let worker = tokio::spawn(module.run());

    let (concluded_tx, concluded_rx) = tokio::sync::mpsc::channel(requests.max(1));
    let printer = tokio::spawn(print_events(output, concluded_tx));

    let period = std::time::Duration::from_nanos(period.total_nanoseconds().max(0) as u64);

    let app = application(bus.clone(), requests, period, concluded_rx);

    let app_result = tokio::select! {
        result = app => result,
        _ = signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        },
    };

    if let Err(e) = &app_result {
        debug!("application stopped: {}", e);
    }

    // worker may have exited already
    let _ = bus.submit(LifecycleEvent::ShutdownRequested).await;
    drop(bus);

    let worker_result = worker
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    let _ = printer.await;

    // the worker error explains a closed bus
    worker_result?;
    app_result
}
