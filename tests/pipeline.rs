//! End-to-end tests for the detection loop: frame-skip routing, count
//! invariants under both policies, alarm behavior, and stop semantics.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use beltwatch::{
    BoundingBox, CountingPolicy, Detection, DetectionLoop, DetectorBackend, Frame, FrameSource,
    InferenceOptions, ItemClass, LoopState, PipelineEvent, PipelineSettings, ScriptedSource,
    StubBackend,
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn frame(seq: u64) -> Frame {
    Frame::new(
        vec![0u8; (WIDTH * HEIGHT * 3) as usize],
        WIDTH,
        HEIGHT,
        3,
        seq,
    )
    .expect("frame")
}

fn frames(count: u64) -> Vec<Frame> {
    (1..=count).map(frame).collect()
}

fn det(mid_x: f32, bottom: f32, class: ItemClass) -> Detection {
    Detection::new(
        BoundingBox::new(mid_x - 4.0, bottom - 10.0, mid_x + 4.0, bottom),
        class,
        0.9,
    )
}

fn settings(policy: CountingPolicy) -> PipelineSettings {
    PipelineSettings {
        inference: InferenceOptions::default(),
        frame_skip: 1,
        counting_policy: policy,
        line_fraction: 0.5,
        consecutive_damaged_threshold: 10,
        pause_on_alarm: false,
    }
}

/// Drain every event; returns once the worker has exited.
fn collect(rx: Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    rx.iter().collect()
}

fn summaries(events: &[PipelineEvent]) -> Vec<&beltwatch::FrameSummary> {
    events
        .iter()
        .filter_map(|ev| match ev {
            PipelineEvent::Summary(summary) => Some(summary),
            _ => None,
        })
        .collect()
}

fn classified_counts(events: &[PipelineEvent]) -> (u64, u64) {
    let mut damaged = 0;
    let mut intact = 0;
    for ev in events {
        if let PipelineEvent::Classified(c) = ev {
            match c.class {
                ItemClass::Damaged => damaged += 1,
                ItemClass::Intact => intact += 1,
            }
        }
    }
    (damaged, intact)
}

fn warnings(events: &[PipelineEvent]) -> usize {
    events
        .iter()
        .filter(|ev| matches!(ev, PipelineEvent::Warning(_)))
        .count()
}

/// Detector that records which frame sequence numbers reached inference.
struct RecordingDetector {
    seen: Arc<Mutex<Vec<u64>>>,
}

impl DetectorBackend for RecordingDetector {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn infer(&mut self, frame: &Frame, _opts: &InferenceOptions) -> Result<Vec<Detection>> {
        self.seen.lock().expect("lock").push(frame.seq);
        Ok(Vec::new())
    }
}

/// Detector that blocks in inference, for stop-at-frame-boundary tests.
struct SlowDetector {
    delay: Duration,
}

impl DetectorBackend for SlowDetector {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn infer(&mut self, _frame: &Frame, _opts: &InferenceOptions) -> Result<Vec<Detection>> {
        thread::sleep(self.delay);
        Ok(Vec::new())
    }
}

struct FailingDetector;

impl DetectorBackend for FailingDetector {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn infer(&mut self, _frame: &Frame, _opts: &InferenceOptions) -> Result<Vec<Detection>> {
        Err(anyhow!("backend exploded"))
    }
}

/// Source that yields some frames then a hard read failure.
struct FailingSource {
    remaining: u64,
    seq: u64,
}

impl FrameSource for FailingSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.remaining == 0 {
            return Err(anyhow!("device disappeared"));
        }
        self.remaining -= 1;
        self.seq += 1;
        Ok(Some(frame(self.seq)))
    }

    fn close(&mut self) {}
}

#[test]
fn frame_skip_routes_every_nth_frame_to_the_detector() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let detector = RecordingDetector {
        seen: Arc::clone(&seen),
    };

    let mut pipeline = DetectionLoop::new(PipelineSettings {
        frame_skip: 3,
        ..settings(CountingPolicy::PerFrame)
    });
    let rx = pipeline
        .start(
            || Ok(Box::new(ScriptedSource::new(frames(10))) as Box<dyn FrameSource>),
            Box::new(detector),
        )
        .expect("start");

    let events = collect(rx);

    let inferred = seen.lock().expect("lock").clone();
    assert_eq!(inferred, vec![1, 4, 7, 10]);

    let indices: Vec<u64> = summaries(&events).iter().map(|s| s.frame_index).collect();
    assert_eq!(indices, vec![1, 4, 7, 10]);
    assert_eq!(pipeline.state(), LoopState::Stopped);
}

#[test]
fn totals_match_committed_events_under_per_frame_policy() {
    let script = vec![
        vec![
            det(10.0, 30.0, ItemClass::Damaged),
            det(40.0, 30.0, ItemClass::Intact),
        ],
        vec![det(10.0, 31.0, ItemClass::Damaged)],
        vec![],
        vec![
            det(20.0, 10.0, ItemClass::Intact),
            det(50.0, 12.0, ItemClass::Intact),
        ],
    ];

    let mut pipeline = DetectionLoop::new(settings(CountingPolicy::PerFrame));
    let rx = pipeline
        .start(
            || Ok(Box::new(ScriptedSource::new(frames(4))) as Box<dyn FrameSource>),
            Box::new(StubBackend::scripted(script)),
        )
        .expect("start");

    let events = collect(rx);
    let (damaged, intact) = classified_counts(&events);
    assert_eq!((damaged, intact), (2, 3));

    let last = *summaries(&events).last().expect("summary");
    assert_eq!(last.damaged, damaged);
    assert_eq!(last.intact, intact);
    assert_eq!(last.total(), damaged + intact);
}

#[test]
fn totals_match_committed_events_under_line_crossing_policy() {
    // Boundary sits at 24 (fraction 0.5 of height 48). One damaged item
    // descends across it; one intact item stays below the whole time.
    let script = vec![
        vec![
            det(32.0, 10.0, ItemClass::Damaged),
            det(10.0, 30.0, ItemClass::Intact),
        ],
        vec![
            det(32.0, 20.0, ItemClass::Damaged),
            det(10.0, 35.0, ItemClass::Intact),
        ],
        vec![
            det(32.0, 28.0, ItemClass::Damaged),
            det(10.0, 40.0, ItemClass::Intact),
        ],
    ];

    let mut pipeline = DetectionLoop::new(settings(CountingPolicy::LineCrossing));
    let rx = pipeline
        .start(
            || Ok(Box::new(ScriptedSource::new(frames(3))) as Box<dyn FrameSource>),
            Box::new(StubBackend::scripted(script)),
        )
        .expect("start");

    let events = collect(rx);
    let (damaged, intact) = classified_counts(&events);
    assert_eq!((damaged, intact), (1, 0), "only the crossing commits");

    let last = *summaries(&events).last().expect("summary");
    assert_eq!(last.damaged, 1);
    assert_eq!(last.intact, 0);
    assert_eq!(last.total(), 1);
}

#[test]
fn alarm_fires_exactly_once_for_ten_consecutive_damaged_frames() {
    let script: Vec<Vec<Detection>> = (0..10)
        .map(|_| vec![det(10.0, 30.0, ItemClass::Damaged)])
        .collect();

    let mut pipeline = DetectionLoop::new(settings(CountingPolicy::PerFrame));
    let rx = pipeline
        .start(
            || Ok(Box::new(ScriptedSource::new(frames(10))) as Box<dyn FrameSource>),
            Box::new(StubBackend::scripted(script)),
        )
        .expect("start");

    let events = collect(rx);
    assert_eq!(warnings(&events), 1);
}

#[test]
fn clean_frame_resets_the_alarm_streak() {
    let mut script: Vec<Vec<Detection>> = (0..10)
        .map(|_| vec![det(10.0, 30.0, ItemClass::Damaged)])
        .collect();
    script[5] = Vec::new();

    let mut pipeline = DetectionLoop::new(settings(CountingPolicy::PerFrame));
    let rx = pipeline
        .start(
            || Ok(Box::new(ScriptedSource::new(frames(10))) as Box<dyn FrameSource>),
            Box::new(StubBackend::scripted(script)),
        )
        .expect("start");

    let events = collect(rx);
    assert_eq!(warnings(&events), 0);
}

#[test]
fn alarm_can_pause_the_loop_when_configured() {
    let script: Vec<Vec<Detection>> = (0..3)
        .map(|_| vec![det(10.0, 30.0, ItemClass::Damaged)])
        .collect();

    let mut pipeline = DetectionLoop::new(PipelineSettings {
        consecutive_damaged_threshold: 3,
        pause_on_alarm: true,
        ..settings(CountingPolicy::PerFrame)
    });
    let rx = pipeline
        .start(
            || Ok(Box::new(ScriptedSource::new(frames(8))) as Box<dyn FrameSource>),
            Box::new(StubBackend::scripted(script)),
        )
        .expect("start");

    // Drain until the warning arrives.
    let mut seen_warning = false;
    let mut events_before_pause = Vec::new();
    while !seen_warning {
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(PipelineEvent::Warning(_)) => seen_warning = true,
            Ok(event) => events_before_pause.push(event),
            Err(err) => panic!("warning never arrived: {}", err),
        }
    }

    // The worker pauses itself right after the warning.
    let deadline = Instant::now() + Duration::from_secs(5);
    while pipeline.state() != LoopState::Paused {
        assert!(Instant::now() < deadline, "loop never paused");
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(summaries(&events_before_pause).len(), 3);

    pipeline.resume();
    let rest = collect(rx);
    // Remaining five frames flow after resume; the script is exhausted
    // so they commit nothing.
    assert_eq!(summaries(&rest).len(), 5);
    assert_eq!(pipeline.state(), LoopState::Stopped);
}

#[test]
fn stop_blocks_until_in_flight_inference_finishes_and_is_idempotent() {
    let mut pipeline = DetectionLoop::new(settings(CountingPolicy::PerFrame));
    let rx = pipeline
        .start(
            || {
                Ok(Box::new(ScriptedSource::new(frames(1000))) as Box<dyn FrameSource>)
            },
            Box::new(SlowDetector {
                delay: Duration::from_millis(150),
            }),
        )
        .expect("start");

    // Let the worker get into an inference call.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(pipeline.state(), LoopState::Running);

    pipeline.stop();
    assert_eq!(pipeline.state(), LoopState::Stopped);

    // The worker is gone, so the channel must be disconnected once drained.
    loop {
        match rx.recv_timeout(Duration::from_millis(10)) {
            Ok(_) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => panic!("channel still connected after stop"),
        }
    }

    // Second stop is a no-op, not an error.
    pipeline.stop();
    assert_eq!(pipeline.state(), LoopState::Stopped);
}

#[test]
fn pause_suspends_frame_acquisition() {
    let mut pipeline = DetectionLoop::new(settings(CountingPolicy::PerFrame));
    let rx = pipeline
        .start(
            || Ok(Box::new(ScriptedSource::new(frames(200))) as Box<dyn FrameSource>),
            Box::new(SlowDetector {
                delay: Duration::from_millis(10),
            }),
        )
        .expect("start");

    thread::sleep(Duration::from_millis(30));
    pipeline.pause();
    assert_eq!(pipeline.state(), LoopState::Paused);

    // Drain whatever was emitted before the pause took effect, then
    // verify the stream stays quiet while paused.
    while rx.recv_timeout(Duration::from_millis(100)).is_ok() {}
    assert!(matches!(
        rx.recv_timeout(Duration::from_millis(100)),
        Err(RecvTimeoutError::Timeout)
    ));

    pipeline.resume();
    assert_eq!(pipeline.state(), LoopState::Running);
    pipeline.stop();
}

#[test]
fn source_read_failure_stops_the_run_cleanly() {
    let mut pipeline = DetectionLoop::new(settings(CountingPolicy::PerFrame));
    let rx = pipeline
        .start(
            || Ok(Box::new(FailingSource { remaining: 2, seq: 0 }) as Box<dyn FrameSource>),
            Box::new(StubBackend::scripted(vec![])),
        )
        .expect("start");

    let events = collect(rx);
    assert_eq!(summaries(&events).len(), 2);
    let terminal = events
        .iter()
        .filter_map(|ev| match ev {
            PipelineEvent::LogMessage(text) => Some(text.as_str()),
            _ => None,
        })
        .last()
        .expect("terminal log message");
    assert!(terminal.contains("read failed"), "got '{}'", terminal);
    assert_eq!(pipeline.state(), LoopState::Stopped);
}

#[test]
fn inference_failure_is_fatal_to_the_run() {
    let mut pipeline = DetectionLoop::new(settings(CountingPolicy::PerFrame));
    let rx = pipeline
        .start(
            || Ok(Box::new(ScriptedSource::new(frames(5))) as Box<dyn FrameSource>),
            Box::new(FailingDetector),
        )
        .expect("start");

    let events = collect(rx);
    assert_eq!(summaries(&events).len(), 0, "no frame completes");
    let terminal = events
        .iter()
        .filter_map(|ev| match ev {
            PipelineEvent::LogMessage(text) => Some(text.as_str()),
            _ => None,
        })
        .last()
        .expect("terminal log message");
    assert!(terminal.contains("inference failed"), "got '{}'", terminal);
    assert_eq!(pipeline.state(), LoopState::Stopped);
}

#[test]
fn open_failure_leaves_the_loop_idle() {
    let mut pipeline = DetectionLoop::new(settings(CountingPolicy::PerFrame));
    let result = pipeline.start(
        || Err(anyhow!("no such device")),
        Box::new(StubBackend::scripted(vec![])),
    );
    assert!(result.is_err());
    assert_eq!(pipeline.state(), LoopState::Idle);
}

#[test]
fn started_loop_cannot_be_started_again() {
    let mut pipeline = DetectionLoop::new(settings(CountingPolicy::PerFrame));
    let _rx = pipeline
        .start(
            || Ok(Box::new(ScriptedSource::new(frames(1))) as Box<dyn FrameSource>),
            Box::new(StubBackend::scripted(vec![])),
        )
        .expect("start");

    let second = pipeline.start(
        || Ok(Box::new(ScriptedSource::new(frames(1))) as Box<dyn FrameSource>),
        Box::new(StubBackend::scripted(vec![])),
    );
    assert!(second.is_err());
}
