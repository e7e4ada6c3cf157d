// Process runtime: sequence runs, teleop loop, and the zenoh edges
//
// A sequence runs on a blocking thread (the scheduler paces itself) while the
// async side feeds vision samples and watches for Ctrl-C / SIGTERM. Teleop is a fixed
// rate loop with a watchdog: if the client stops sending control requests the
// base is commanded to neutral until requests resume.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::command::{RunOutcome, Scheduler};
use crate::config::{CMD_TIMEOUT, TOPIC_CMD_BASE, TOPIC_HEALTH, TOPIC_VISION_TARGET, loop_period};
use crate::messages::{ControlRequest, DriveSignal, RuntimeHealth, TargetObservation};
use crate::motor::{Hardware, RobotHardware};
use crate::sequence;
use crate::vision::{TargetFeed, TargetPublisher};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What the process should do once the hardware is up
#[derive(Debug, Clone)]
pub enum Mode {
    /// Run a command sequence (the built-in one when `path` is None),
    /// optionally followed by teleop
    Sequence {
        path: Option<PathBuf>,
        then_teleop: bool,
    },
    /// Forward control requests only
    Teleop,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub port: String,
    pub baud: u32,
    pub loop_hz: u64,
    pub mode: Mode,
}

/// Teleop watchdog state
pub struct Teleop {
    latest: Option<ControlRequest>,
    received_at: Instant,
    timeout: Duration,
    health: RuntimeHealth,
}

impl Teleop {
    pub fn new() -> Self {
        Self::with_timeout(CMD_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            latest: None,
            received_at: Instant::now(),
            timeout,
            health: RuntimeHealth::CmdStale, // Start stale until first request
        }
    }

    /// Process incoming control request
    pub fn on_request(&mut self, req: ControlRequest) {
        self.latest = Some(req);
        self.received_at = Instant::now();
    }

    /// Signal to send this cycle, neutral when the request is stale
    pub fn compute_signal(&mut self) -> DriveSignal {
        let age = self.received_at.elapsed();

        match self.latest {
            Some(ref req) if age <= self.timeout => {
                if self.health != RuntimeHealth::Ok {
                    info!("Control requests active");
                }
                self.health = RuntimeHealth::Ok;
                DriveSignal::from(req)
            }
            Some(_) => {
                if self.health != RuntimeHealth::CmdStale {
                    warn!("Control request stale ({:?} old), stopping robot", age);
                }
                self.health = RuntimeHealth::CmdStale;
                DriveSignal::neutral()
            }
            None => {
                // No request ever received
                self.health = RuntimeHealth::CmdStale;
                DriveSignal::neutral()
            }
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }
}

impl Default for Teleop {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves when the process is asked to shut down: Ctrl-C, or SIGTERM on unix.
///
/// The SIGTERM listener is installed when this is called, not when the
/// returned future is first polled.
pub fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    #[cfg(unix)]
    let terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(term) => Some(term),
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            None
        }
    };

    async move {
        let interrupt = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminated = async move {
            match terminate {
                Some(mut term) => {
                    term.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        #[cfg(not(unix))]
        let terminated = std::future::pending::<()>();

        tokio::select! {
            _ = interrupt => info!("Interrupt received"),
            _ = terminated => info!("Terminate received"),
        }
    }
}

/// Run the scheduler on a blocking thread, aborting it on Ctrl-C or SIGTERM.
///
/// Hands the hardware back once every command has been stopped.
pub async fn run_scheduler<H>(hw: H, scheduler: Scheduler) -> Result<(H, RunOutcome), BoxError>
where
    H: Hardware + Send + 'static,
{
    run_scheduler_until(hw, scheduler, shutdown_signal()).await
}

/// Run the scheduler on a blocking thread, aborting it when `shutdown` resolves
pub async fn run_scheduler_until<H, F>(
    mut hw: H,
    mut scheduler: Scheduler,
    shutdown: F,
) -> Result<(H, RunOutcome), BoxError>
where
    H: Hardware + Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let abort = scheduler.abort_handle();
    let watcher = tokio::spawn(async move {
        shutdown.await;
        warn!("Shutdown requested, aborting sequence");
        abort.abort();
    });

    let result = tokio::task::spawn_blocking(move || {
        let outcome = scheduler.run(&mut hw);
        (hw, outcome)
    })
    .await;

    watcher.abort();
    Ok(result?)
}

/// Forward vision detections from zenoh into a target feed
pub async fn bridge_vision(
    session: &zenoh::Session,
    publisher: TargetPublisher,
) -> Result<JoinHandle<()>, BoxError> {
    let subscriber = session.declare_subscriber(TOPIC_VISION_TARGET).await?;
    info!("Subscribed to: {}", TOPIC_VISION_TARGET);

    Ok(tokio::spawn(async move {
        while let Ok(sample) = subscriber.recv_async().await {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<TargetObservation>(&payload) {
                Ok(observation) => publisher.publish(observation),
                Err(e) => warn!("Failed to parse target observation: {}", e),
            }
        }
    }))
}

/// Fixed-rate teleop loop; returns on Ctrl-C or SIGTERM
pub async fn teleop(
    session: &zenoh::Session,
    hw: &mut dyn Hardware,
    loop_hz: u64,
) -> Result<(), BoxError> {
    let subscriber = session.declare_subscriber(TOPIC_CMD_BASE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut teleop = Teleop::new();
    let mut tick = interval(loop_period(loop_hz));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!(
        "Teleop started: {}Hz loop, {}ms watchdog timeout",
        loop_hz,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD_BASE);
    info!("Publishing to: {}", TOPIC_HEALTH);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Leaving teleop");
                break;
            }
            _ = tick.tick() => {}
        }

        // 1. Drain all pending requests (non-blocking), keep latest
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ControlRequest>(&payload) {
                Ok(req) => teleop.on_request(req),
                Err(e) => warn!("Failed to parse control request: {}", e),
            }
        }

        // 2. Compute signal (includes watchdog logic) and drive
        let signal = teleop.compute_signal();
        hw.tick();
        hw.drive(signal);

        // 3. Publish health
        let health_json = serde_json::to_string(&teleop.health())?;
        pub_health.put(health_json).await?;
    }

    hw.neutral();
    Ok(())
}

/// Bring up the hardware and run the selected mode
pub async fn run(opts: Options) -> Result<(), BoxError> {
    // Load the sequence before touching the hardware so a bad file never moves the robot
    let commands = match &opts.mode {
        Mode::Sequence { path: Some(path), .. } => Some(sequence::load(path)?),
        Mode::Sequence { path: None, .. } => {
            info!("No sequence file given, using built-in target centering");
            Some(sequence::build_commands(&sequence::default_steps())?)
        }
        Mode::Teleop => None,
    };

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    let (feed, target_publisher) = TargetFeed::new();
    let vision_task = bridge_vision(&session, target_publisher).await?;

    let mut hw = RobotHardware::open(&opts.port, opts.baud)?.with_vision(feed);
    hw.neutral();

    if let Some(commands) = commands {
        let scheduler = Scheduler::new(commands).with_loop_hz(opts.loop_hz);
        let (returned, outcome) = run_scheduler(hw, scheduler).await?;
        hw = returned;

        let then_teleop = matches!(opts.mode, Mode::Sequence { then_teleop: true, .. });
        if then_teleop && outcome == RunOutcome::Completed {
            teleop(&session, &mut hw, opts.loop_hz).await?;
        }
    } else {
        teleop(&session, &mut hw, opts.loop_hz).await?;
    }

    vision_task.abort();
    if let Err(e) = hw.shutdown() {
        error!("Failed to park actuator: {}", e);
        return Err(e.into());
    }
    Ok(())
}
