//! The detection loop.
//!
//! One processing thread per run owns the frame source, the detector,
//! the counter, and the alarm exclusively. The control side only touches
//! two atomic flags (run, pause) and the join handle; stop is
//! synchronous and takes effect at the next frame boundary, never
//! interrupting an in-flight inference call.
//!
//! State machine: Idle -> Running <-> Paused -> Stopped. Stopped is
//! terminal; a fresh `DetectionLoop` is needed to run again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::alarm::DefectAlarm;
use crate::annotate::annotate;
use crate::count::{counter_for, CountingPolicy, ItemCounter};
use crate::detect::{DetectorBackend, InferenceOptions, ItemClass};
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::{ClassificationEvent, FrameSummary};

/// Bounded wait between run/pause flag polls while the worker is paused.
const PAUSE_POLL: Duration = Duration::from_millis(25);

/// Events emitted by the processing thread, in frame order. The channel
/// disconnects when the run ends.
#[derive(Debug)]
pub enum PipelineEvent {
    /// Copy of the processed frame with detection outlines drawn on.
    FrameAnnotated(Frame),
    /// A committed per-item classification.
    Classified(ClassificationEvent),
    /// Per-processed-frame metrics with running totals.
    Summary(FrameSummary),
    /// The consecutive-defect alarm fired.
    Warning(String),
    /// Terminal and informational run messages.
    LogMessage(String),
}

/// Knobs for one inspection run. Validated by configuration loading;
/// the loop trusts them.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub inference: InferenceOptions,
    /// Only every Nth consumed frame is sent to the detector (1 = every
    /// frame). Skipped frames are consumed from the source and dropped.
    pub frame_skip: u32,
    pub counting_policy: CountingPolicy,
    /// Boundary height fraction for the line-crossing policy.
    pub line_fraction: f32,
    pub consecutive_damaged_threshold: u32,
    /// Whether a fired alarm also pauses the loop, or only warns.
    pub pause_on_alarm: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            inference: InferenceOptions::default(),
            frame_skip: 1,
            counting_policy: CountingPolicy::LineCrossing,
            line_fraction: 0.35,
            consecutive_damaged_threshold: 10,
            pause_on_alarm: false,
        }
    }
}

/// Externally observable loop state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// The only state shared across the thread boundary.
#[derive(Debug, Default)]
struct RunControl {
    running: AtomicBool,
    paused: AtomicBool,
}

pub struct DetectionLoop {
    settings: PipelineSettings,
    control: Arc<RunControl>,
    worker: Option<JoinHandle<()>>,
    started: bool,
}

impl DetectionLoop {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            control: Arc::new(RunControl::default()),
            worker: None,
            started: false,
        }
    }

    /// Open the source and enter the processing cycle on a dedicated
    /// thread. Valid only from Idle. A source that fails to open, or a
    /// detector that fails warm-up, leaves the loop in Idle and the run
    /// never starts.
    pub fn start<F>(
        &mut self,
        open: F,
        mut detector: Box<dyn DetectorBackend>,
    ) -> Result<Receiver<PipelineEvent>>
    where
        F: FnOnce() -> Result<Box<dyn FrameSource>>,
    {
        if self.started {
            return Err(anyhow!("detection loop already started; create a new one"));
        }

        detector
            .warm_up()
            .map_err(|err| anyhow::Error::new(PipelineError::ModelLoad(err)))?;
        let source = open().map_err(|err| anyhow::Error::new(PipelineError::SourceOpen(err)))?;

        let counter = counter_for(self.settings.counting_policy, self.settings.line_fraction);
        let alarm = DefectAlarm::new(self.settings.consecutive_damaged_threshold);
        let (events_tx, events_rx) = mpsc::channel();

        self.control.running.store(true, Ordering::SeqCst);
        self.control.paused.store(false, Ordering::SeqCst);
        let control = Arc::clone(&self.control);
        let settings = self.settings.clone();

        self.worker = Some(thread::spawn(move || {
            run_worker(source, detector, counter, alarm, settings, control, events_tx);
        }));
        self.started = true;

        log::info!(
            "detection loop running (policy={}, frame_skip={})",
            self.settings.counting_policy,
            self.settings.frame_skip
        );
        Ok(events_rx)
    }

    /// Suspend frame acquisition. The worker idles on a bounded sleep
    /// until resumed or stopped.
    pub fn pause(&self) {
        if self.control.running.load(Ordering::SeqCst) {
            self.control.paused.store(true, Ordering::SeqCst);
        }
    }

    pub fn resume(&self) {
        self.control.paused.store(false, Ordering::SeqCst);
    }

    /// Signal the worker to exit and block until it has released the
    /// frame source. Takes effect at the next frame boundary; an
    /// in-flight inference call is never interrupted. Idempotent.
    pub fn stop(&mut self) {
        self.control.running.store(false, Ordering::SeqCst);
        self.control.paused.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("detection worker panicked");
            }
        }
    }

    pub fn state(&self) -> LoopState {
        if !self.started {
            return LoopState::Idle;
        }
        let finished = self.worker.as_ref().map_or(true, |w| w.is_finished());
        if finished || !self.control.running.load(Ordering::SeqCst) {
            return LoopState::Stopped;
        }
        if self.control.paused.load(Ordering::SeqCst) {
            LoopState::Paused
        } else {
            LoopState::Running
        }
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    mut source: Box<dyn FrameSource>,
    mut detector: Box<dyn DetectorBackend>,
    mut counter: Box<dyn ItemCounter>,
    mut alarm: DefectAlarm,
    settings: PipelineSettings,
    control: Arc<RunControl>,
    events: Sender<PipelineEvent>,
) {
    let mut frame_index: u64 = 0;
    let mut damaged_total: u64 = 0;
    let mut intact_total: u64 = 0;

    while control.running.load(Ordering::SeqCst) {
        if control.paused.load(Ordering::SeqCst) {
            thread::sleep(PAUSE_POLL);
            continue;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                let message = format!("end of stream after {} frames", frame_index);
                log::info!("{}", message);
                let _ = events.send(PipelineEvent::LogMessage(message));
                break;
            }
            Err(err) => {
                let cause = PipelineError::SourceRead(err);
                log::warn!("{}", cause);
                let _ = events.send(PipelineEvent::LogMessage(cause.to_string()));
                break;
            }
        };

        frame_index += 1;
        if (frame_index - 1) % settings.frame_skip as u64 != 0 {
            continue;
        }

        let started = Instant::now();
        let detections = match detector.infer(&frame, &settings.inference) {
            Ok(detections) => detections,
            Err(err) => {
                let cause = PipelineError::Inference(err);
                log::error!("{}", cause);
                let _ = events.send(PipelineEvent::LogMessage(cause.to_string()));
                break;
            }
        };

        let committed = counter.observe(&detections, frame.height);
        let processing_time = started.elapsed();

        let damaged_frame = committed
            .iter()
            .filter(|ev| ev.class == ItemClass::Damaged)
            .count() as u32;
        let intact_frame = committed.len() as u32 - damaged_frame;
        damaged_total += damaged_frame as u64;
        intact_total += intact_frame as u64;

        let _ = events.send(PipelineEvent::FrameAnnotated(annotate(&frame, &detections)));
        for event in committed {
            let _ = events.send(PipelineEvent::Classified(event));
        }
        let _ = events.send(PipelineEvent::Summary(FrameSummary {
            frame_index,
            objects_detected: detections.len(),
            processing_time,
            damaged: damaged_total,
            intact: intact_total,
        }));

        if alarm.observe(damaged_frame) {
            let message = format!(
                "{} consecutive damaged items detected",
                alarm.threshold()
            );
            log::warn!("{}", message);
            let _ = events.send(PipelineEvent::Warning(message));
            if settings.pause_on_alarm {
                control.paused.store(true, Ordering::SeqCst);
            }
        }
    }

    source.close();
    control.running.store(false, Ordering::SeqCst);
}
