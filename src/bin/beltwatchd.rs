//! beltwatchd - headless inspection daemon.
//!
//! This daemon:
//! 1. Pulls frames from the configured video origin
//! 2. Runs the detector on every Nth frame
//! 3. Deduplicates items with the configured counting policy
//! 4. Watches the consecutive-defect alarm
//! 5. Appends committed classifications to the report database

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use beltwatch::{
    open_source, BeltwatchConfig, DetectionLoop, DetectorBackend, PipelineEvent, ReportRow,
    ReportStore, SourceSettings, StubBackend,
};

fn main() -> Result<()> {
    // Initialize logging (simple stderr)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = BeltwatchConfig::load()?;
    log::info!("beltwatchd {} starting", env!("CARGO_PKG_VERSION"));
    log::info!(
        "source={}, policy={}, frame_skip={}, confidence={:.2}",
        cfg.source,
        cfg.counting_policy,
        cfg.frame_skip,
        cfg.confidence_threshold
    );
    log::info!(
        "alarm threshold={} pause_on_alarm={}",
        cfg.consecutive_damaged_threshold,
        cfg.pause_on_alarm
    );

    let mut store = ReportStore::open(&cfg.db_path)?;
    let detector = build_detector(&cfg)?;
    let source_settings = SourceSettings::default();

    let mut pipeline = DetectionLoop::new(cfg.pipeline_settings());
    let origin = cfg.source.clone();
    let events = pipeline.start(
        move || open_source(&origin, &source_settings),
        detector,
    )?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        })?;
    }

    log::info!("beltwatchd running. writing report to {}", cfg.db_path);

    loop {
        if interrupted.swap(false, Ordering::SeqCst) {
            log::info!("interrupt received, stopping");
            pipeline.stop();
        }
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(event) => handle_event(event, &mut store)?,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    pipeline.stop();
    log::info!("beltwatchd exiting. report at {}", cfg.db_path);
    Ok(())
}

fn handle_event(event: PipelineEvent, store: &mut ReportStore) -> Result<()> {
    match event {
        PipelineEvent::FrameAnnotated(frame) => {
            log::debug!("annotated frame {} available", frame.seq);
        }
        PipelineEvent::Classified(classification) => {
            log::info!(
                "{}: {}",
                classification.class,
                classification.detail
            );
            store.append(&ReportRow::from(classification))?;
        }
        PipelineEvent::Summary(summary) => {
            log::info!(
                "frame {}: {} objects, {:.1} ms, damaged={} intact={}",
                summary.frame_index,
                summary.objects_detected,
                summary.processing_time.as_secs_f64() * 1000.0,
                summary.damaged,
                summary.intact
            );
        }
        PipelineEvent::Warning(text) => log::warn!("{}", text),
        PipelineEvent::LogMessage(text) => log::info!("{}", text),
    }
    Ok(())
}

fn build_detector(cfg: &BeltwatchConfig) -> Result<Box<dyn DetectorBackend>> {
    match &cfg.model_path {
        Some(model_path) => {
            #[cfg(feature = "backend-tract")]
            {
                let settings = SourceSettings::default();
                let backend =
                    beltwatch::detect::TractBackend::new(model_path, settings.width, settings.height)?;
                Ok(Box::new(backend))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                anyhow::bail!(
                    "model_path {} set but beltwatch was built without the backend-tract feature",
                    model_path
                )
            }
        }
        None => {
            log::warn!("no model_path configured; using the stub detector");
            Ok(Box::new(StubBackend::new()))
        }
    }
}
