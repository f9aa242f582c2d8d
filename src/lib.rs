//! Cuerig: gesture-triggered episode recording for a robot-arm rig.
//!
//! A monitor thread classifies camera frames and debounces "open" and "chip"
//! gestures into the shared session. The main thread homes the arm, waits for
//! an episode to start and records it until the session says stop.

pub mod config;
pub mod gesture;
pub mod monitor;
pub mod notify;
pub mod orchestrator;
pub mod recording;
pub mod robot;
pub mod session;
pub mod vision;

use config::Config;
use gesture::{GestureDebouncer, LabelMap};
use monitor::{MonitorSettings, spawn_monitor};
use notify::{LogNotificationPort, NotificationPort, Notifier};
use orchestrator::ControlLoop;
use recording::{RecordingSink, TimedRecording};
use robot::{RobotDriver, SimulatedArm};
use session::{SessionMachine, SharedSession};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use vision::VisionPipeline;

/// Collaborators plugged into the harness
pub struct Collaborators<R, S, P> {
    pub robot: R,
    pub sink: S,
    pub port: P,
    /// `None` runs the fixed-timer fallback instead of detection
    pub vision: Option<VisionPipeline>,
}

fn init_logging() {
    use tracing_subscriber::prelude::*;

    /// Format timestamps using the system's local time via chrono
    struct LocalTimer;
    impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
        fn format_time(
            &self,
            w: &mut tracing_subscriber::fmt::format::Writer<'_>,
        ) -> std::fmt::Result {
            write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
        }
    }

    let log_dir = config::get_log_dir();
    let _ = std::fs::create_dir_all(&log_dir);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("cuerig-debug.log"))
        .ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(file) = log_file {
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_timer(LocalTimer)
            .with_ansi(false);
        let stdout_layer = tracing_subscriber::fmt::layer().with_timer(LocalTimer);
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(LocalTimer)
            .init();
    }
}

/// Watch operator input: Enter ends the current episode early, Ctrl-C
/// requests termination
fn watch_interrupt(shared: Arc<SharedSession>) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(operator_input(
                &shared,
                tokio::io::BufReader::new(tokio::io::stdin()),
                tokio::signal::ctrl_c(),
            ));
        })?;
    Ok(())
}

/// Apply operator lines from `input` until `interrupt` resolves
///
/// Input is read until EOF or a read error; the interrupt is awaited after
/// that.
async fn operator_input<R, F>(shared: &SharedSession, input: R, interrupt: F)
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(interrupt);
    let mut lines = input.lines();
    let mut reading = true;

    loop {
        tokio::select! {
            biased;
            line = lines.next_line(), if reading => match line {
                Ok(Some(_)) => {
                    if shared.request_exit_early() {
                        tracing::info!("Operator ended the episode early");
                    } else {
                        tracing::debug!("Exit request ignored, no episode recording");
                    }
                }
                Ok(None) => reading = false,
                Err(e) => {
                    tracing::warn!("Operator input unavailable: {}", e);
                    reading = false;
                }
            },
            result = &mut interrupt => {
                match result {
                    Ok(()) => {
                        tracing::info!("Interrupted, shutting down");
                        shared.request_termination();
                    }
                    Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
                }
                return;
            }
        }
    }
}

/// Wire the session, monitor and control loop together and run until
/// termination
///
/// The monitor is stopped and the arm disconnected on every exit path.
/// Returns the number of episodes started.
pub fn run_harness<R, S, P>(
    config: &Config,
    shared: Arc<SharedSession>,
    collaborators: Collaborators<R, S, P>,
) -> anyhow::Result<u32>
where
    R: RobotDriver,
    S: RecordingSink,
    P: NotificationPort + 'static,
{
    let Collaborators {
        mut robot,
        sink,
        port,
        vision,
    } = collaborators;

    let notifier = Notifier::from_config(port, &config.notification)?;
    if config.notification.announce_on_start {
        notifier.announce();
    }

    let machine = SessionMachine::new(
        shared.clone(),
        GestureDebouncer::from_config(&config.debounce),
        LabelMap::from_config(&config.labels),
        notifier,
    );
    let settings = MonitorSettings::from_config(&config.debounce, &config.fallback);
    let monitor = spawn_monitor(machine, vision, settings)?;
    tracing::info!("Monitor running in {:?} mode", monitor.mode());

    if let Err(e) = robot.connect() {
        shared.request_termination();
        monitor.join();
        return Err(e.context("Failed to connect arm"));
    }

    let mut control = ControlLoop::new(shared, robot, sink, config.homing.clone());
    let result = control.run();
    let episodes = control.shutdown(Some(monitor));

    match result {
        Ok(_) => Ok(episodes),
        Err(e) => {
            tracing::error!("Control loop failed: {:#}", e);
            Err(e)
        }
    }
}

/// Load config, set up logging and run the harness with bundled collaborators
pub fn run() -> anyhow::Result<()> {
    init_logging();
    tracing::info!("Cuerig starting");

    let config = config::load().unwrap_or_else(|e| {
        tracing::error!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    let dataset_id = config.recording.dataset_id(&chrono::Local::now());
    tracing::info!(
        dataset = %dataset_id,
        task = %config.recording.task_description,
        fps = config.recording.fps,
        "Dataset configured"
    );

    let shared = Arc::new(SharedSession::new());
    if let Err(e) = watch_interrupt(shared.clone()) {
        tracing::warn!("Operator input handling unavailable: {}", e);
    }

    // No camera or classifier backend is bundled; detection runs in fallback.
    let collaborators = Collaborators {
        robot: SimulatedArm::default(),
        sink: TimedRecording::from_config(&config.recording),
        port: LogNotificationPort::new(config.notification.device_address.clone()),
        vision: None,
    };

    run_harness(&config, shared, collaborators)?;
    Ok(())
}
