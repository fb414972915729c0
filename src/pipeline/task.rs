use std::future::Future;
use std::pin::Pin;

use anyhow::{anyhow, Result};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::bins::{AcceptedCategories, BinPreset};
use crate::detect::{ClassifierBackend, Detection};
use crate::frame::{Frame, FrameSize};
use crate::notify::{LogNotifier, Notifier};
use crate::pipeline::controller::{
    Admission, Completion, FrameController, PipelineSnapshot, Ticket,
};
use crate::stats::StatisticsSnapshot;
use crate::triage::{Rejection, Verdict};

const EVENT_CAPACITY: usize = 64;

/// Events broadcast to display and notification consumers.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    /// An admitted frame had new dimensions.
    FrameResized(FrameSize),
    /// A classification result was applied.
    Batch {
        active_detection: Option<String>,
        detections: Vec<Detection>,
        verdict: Verdict,
        failed: bool,
        statistics: StatisticsSnapshot,
    },
    /// The largest detection was rejected; cooldown started.
    Rejected(Rejection),
    /// Cooldown elapsed; monitoring resumed.
    CooldownFinished,
    /// The active backend was replaced.
    BackendSwapped {
        name: &'static str,
        discarded_pending: bool,
    },
}

enum Control {
    SetPaused(bool),
    SetAccepted(AcceptedCategories),
    SwapBackend(Box<dyn ClassifierBackend>),
    ReloadBackend,
    Shutdown,
}

type DetectOutput = (Box<dyn ClassifierBackend>, Ticket, Result<Vec<Detection>>);
type PendingDetect = Pin<Box<dyn Future<Output = DetectOutput> + Send>>;

/// Handle to a running pipeline session. Cheap to clone.
#[derive(Clone)]
pub struct PipelineHandle {
    frames: mpsc::Sender<Frame>,
    control: mpsc::UnboundedSender<Control>,
    events: broadcast::Sender<PipelineEvent>,
    snapshot: watch::Receiver<PipelineSnapshot>,
}

impl PipelineHandle {
    /// Push a frame without waiting. Returns `false` when the frame was dropped
    /// at the inbox because the previous frame has not been picked up yet, or
    /// the session is closed.
    pub fn submit_frame(&self, frame: Frame) -> bool {
        self.frames.try_send(frame).is_ok()
    }

    /// External pause signal. While paused, frames are dropped unclassified.
    pub fn set_paused(&self, paused: bool) -> Result<()> {
        self.send(Control::SetPaused(paused))
    }

    pub fn set_accepted(&self, accepted: AcceptedCategories) -> Result<()> {
        self.send(Control::SetAccepted(accepted))
    }

    /// Replace the accepted set with the defaults of a bin.
    pub fn select_bin(&self, bin: BinPreset) -> Result<()> {
        self.set_accepted(bin.accepted())
    }

    /// Make `backend` the active classifier. A classification still pending on
    /// the old backend is dropped and its result never applied.
    pub fn swap_backend(&self, backend: Box<dyn ClassifierBackend>) -> Result<()> {
        self.send(Control::SwapBackend(backend))
    }

    /// Ask the active backend to drop and reload its model state.
    pub fn reload_backend(&self) -> Result<()> {
        self.send(Control::ReloadBackend)
    }

    /// Tear the session down. A running cooldown is cancelled with it.
    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    fn send(&self, control: Control) -> Result<()> {
        self.control
            .send(control)
            .map_err(|_| anyhow!("pipeline session closed"))
    }
}

/// Frame pipeline task.
///
/// Runs as one task on one loop. The only suspension points are the backend
/// call and the cooldown timer; everything else completes synchronously within
/// a single `select!` arm, so control messages never interleave with a step.
pub struct Pipeline {
    controller: FrameController,
    backend: Option<Box<dyn ClassifierBackend>>,
    backend_name: &'static str,
    backend_ready: bool,
    pending: Option<PendingDetect>,
    reload_requested: bool,
    notifier: Box<dyn Notifier>,
    frames: mpsc::Receiver<Frame>,
    control: mpsc::UnboundedReceiver<Control>,
    events: broadcast::Sender<PipelineEvent>,
    snapshot: watch::Sender<PipelineSnapshot>,
}

impl Pipeline {
    pub fn new(
        backend: Box<dyn ClassifierBackend>,
        accepted: AcceptedCategories,
    ) -> (Self, PipelineHandle) {
        let controller = FrameController::new(accepted);
        let backend_name = backend.name();
        let backend_ready = backend.is_ready();
        let (frames_tx, frames_rx) = mpsc::channel(1);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot_tx, snapshot_rx) =
            watch::channel(controller.snapshot(backend_name, backend_ready));

        let pipeline = Self {
            controller,
            backend: Some(backend),
            backend_name,
            backend_ready,
            pending: None,
            reload_requested: false,
            notifier: Box::new(LogNotifier),
            frames: frames_rx,
            control: control_rx,
            events: events_tx.clone(),
            snapshot: snapshot_tx,
        };
        let handle = PipelineHandle {
            frames: frames_tx,
            control: control_tx,
            events: events_tx,
            snapshot: snapshot_rx,
        };
        (pipeline, handle)
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Run the session on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        log::info!(
            "pipeline started: backend={}, accepted=[{}]",
            self.backend_name,
            self.controller.accepted()
        );
        loop {
            let deadline = self.controller.cooldown_deadline();
            tokio::select! {
                biased;
                control = self.control.recv() => match control {
                    Some(Control::Shutdown) | None => break,
                    Some(control) => self.handle_control(control),
                },
                _ = cooldown_elapsed(deadline) => self.finish_cooldown(),
                (backend, ticket, result) = next_result(&mut self.pending) => {
                    self.finish_detect(backend, ticket, result)
                }
                frame = self.frames.recv() => match frame {
                    Some(frame) => self.handle_frame(frame),
                    None => break,
                },
            }
            self.publish_snapshot();
        }

        let stats = self.controller.statistics().snapshot();
        log::info!(
            "pipeline stopped: detections={} rejections={} acceptance={}%",
            stats.detection_count,
            stats.rejection_count,
            stats.acceptance_rate
        );
    }

    fn handle_frame(&mut self, frame: Frame) {
        let ticket = match self.controller.admit(frame.size()) {
            Admission::Classify(ticket) => ticket,
            Admission::Dropped(_) => return,
        };
        if let Some(size) = ticket.resized {
            log::debug!("frame size changed to {}", size);
            self.emit(PipelineEvent::FrameResized(size));
        }

        let Some(mut backend) = self.backend.take() else {
            // Backend is only absent while a call is pending, and the guard
            // refuses frames then.
            log::error!("no backend available for admitted frame");
            self.controller.switch_backend();
            return;
        };
        self.pending = Some(Box::pin(async move {
            let result = backend.detect(&frame).await;
            (backend, ticket, result)
        }));
    }

    fn finish_detect(
        &mut self,
        mut backend: Box<dyn ClassifierBackend>,
        ticket: Ticket,
        result: Result<Vec<Detection>>,
    ) {
        let report = match self.controller.complete(ticket, result, Instant::now()) {
            Completion::Applied(report) => report,
            Completion::Discarded => return,
        };

        if std::mem::take(&mut self.reload_requested) {
            reload(backend.as_mut());
        }
        self.backend = Some(backend);

        let aggregator = self.controller.aggregator();
        let event = PipelineEvent::Batch {
            active_detection: aggregator.active_detection().map(str::to_string),
            detections: aggregator.detections().to_vec(),
            verdict: report.verdict.clone(),
            failed: report.failed,
            statistics: self.controller.statistics().snapshot(),
        };
        self.emit(event);

        if let Verdict::Rejected(rejection) = report.verdict {
            self.notifier.rejected(&rejection);
            self.emit(PipelineEvent::Rejected(rejection));
        }
    }

    fn finish_cooldown(&mut self) {
        if self.controller.expire_cooldown(Instant::now()) {
            log::info!("cooldown finished, monitoring resumed");
            self.emit(PipelineEvent::CooldownFinished);
        }
    }

    fn handle_control(&mut self, control: Control) {
        match control {
            Control::SetPaused(paused) => {
                if paused != self.controller.is_paused() {
                    log::info!("pipeline {}", if paused { "paused" } else { "resumed" });
                }
                self.controller.set_paused(paused);
            }
            Control::SetAccepted(accepted) => {
                log::info!("accepted categories: [{}]", accepted);
                self.controller.set_accepted(accepted);
            }
            Control::SwapBackend(backend) => {
                let discarded_pending = self.pending.take().is_some();
                self.controller.switch_backend();
                if discarded_pending {
                    log::info!(
                        "discarding in-flight classification from {}",
                        self.backend_name
                    );
                }
                self.backend_name = backend.name();
                self.backend = Some(backend);
                self.reload_requested = false;
                log::info!("classifier backend is now {}", self.backend_name);
                self.emit(PipelineEvent::BackendSwapped {
                    name: self.backend_name,
                    discarded_pending,
                });
            }
            Control::ReloadBackend => match self.backend.as_mut() {
                Some(backend) => reload(backend.as_mut()),
                None => self.reload_requested = true,
            },
            Control::Shutdown => {}
        }
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish_snapshot(&mut self) {
        // While a call is pending the backend is moved out; keep the last reading.
        if let Some(backend) = &self.backend {
            self.backend_ready = backend.is_ready();
        }
        self.snapshot
            .send_replace(self.controller.snapshot(self.backend_name, self.backend_ready));
    }
}

fn reload(backend: &mut dyn ClassifierBackend) {
    match backend.reload() {
        Ok(()) => log::info!(
            "{}: model state reset, reloading on next frame",
            backend.name()
        ),
        Err(e) => log::warn!("{}: reload failed: {:#}", backend.name(), e),
    }
}

async fn next_result(pending: &mut Option<PendingDetect>) -> DetectOutput {
    match pending.as_mut() {
        Some(fut) => {
            let output = fut.await;
            *pending = None;
            output
        }
        None => std::future::pending().await,
    }
}

async fn cooldown_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
