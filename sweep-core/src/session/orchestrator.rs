//! Session orchestrator
//! 
//! Runs N sweep passes on a worker thread and feeds every completed pass
//! into the aggregation engine. State machine:
//! 
//! ```text
//! Idle -> Running(pass i of N) -> Idle | Aborted
//! ```
//! 
//! Only one session runs at a time. Cancellation is cooperative and checked
//! between steps; an abandoned pass never produces a record.

use super::events::{Presentation, ProgressUpdate, SessionEvent};
use crate::aggregate::{AggregationEngine, SpectrumViews, SweepRecord};
use crate::error::{FaultKind, FaultReport, SessionError};
use crate::hardware::Receiver;
use crate::storage::{export_views, ExportSettings};
use crate::sweep::{BandTable, ConfigError, Location, ScanConfig, SweepConfig, SweepController, SweepPoint};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    
    /// Sweeping pass `pass` (1-based) of `passes`
    Running { pass: usize, passes: usize },
    
    /// Stopped before all passes completed
    Aborted,
}

/// Per-session options
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub passes: usize,
    
    /// Clear max-hold before the first pass
    pub reset_max_hold_on_start: bool,
    
    /// Write CSV views after every pass
    pub export: Option<ExportSettings>,
    
    /// Stored with every record
    pub location: Option<Location>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            passes: 1,
            reset_max_hold_on_start: false,
            export: None,
            location: None,
        }
    }
}

impl SessionSettings {
    pub fn from_scan_config(scan: &ScanConfig) -> Result<Self, ConfigError> {
        let export = if scan.dry_run {
            ExportSettings::dry_run(&scan.data_directory)
        } else {
            ExportSettings::new(&scan.data_directory)
        };
        
        Ok(Self {
            passes: scan.passes()?,
            reset_max_hold_on_start: scan.reset_max_hold_on_start,
            export: Some(export),
            location: Some(scan.location.clone()),
        })
    }
}

/// What a finished session did
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionSummary {
    pub passes_completed: usize,
    pub records_persisted: usize,
    pub faults: Vec<FaultReport>,
    pub final_state: SessionState,
}

/// Snapshot for a control surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    #[serde(flatten)]
    pub state: SessionState,
    pub dry_run: bool,
    pub selected_band: Option<String>,
    pub available_bands: Vec<String>,
    pub location: Option<Location>,
    pub sweeps_averaged: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Millisecond timestamp strictly after `previous`
fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(3);
    match previous {
        Some(prev) if now <= prev => prev.trunc_subsecs(3) + Duration::milliseconds(1),
        _ => now,
    }
}

struct PassRunner<'a> {
    settings: &'a SessionSettings,
    presentation: &'a mut dyn Presentation,
    summary: SessionSummary,
}

impl<'a> PassRunner<'a> {
    fn fault(&mut self, report: FaultReport) {
        self.presentation.on_event(SessionEvent::Fault(report.clone()));
        self.summary.faults.push(report);
    }
    
    /// Ingest a finished pass; persistence and export faults are reported
    fn complete(&mut self, pass: usize, record: SweepRecord, engine: &Mutex<AggregationEngine>) -> SpectrumViews {
        let (views, unrounded) = {
            let mut engine = lock(engine);
            let dry_run = engine.is_dry_run();
            match engine.ingest(record) {
                Ok(_) if !dry_run => self.summary.records_persisted += 1,
                Ok(_) => {}
                Err(e) => {
                    let report = FaultReport::from_error(pass, &SessionError::Persistence(e));
                    self.fault(report);
                }
            }
            (engine.views(), engine.unrounded_views())
        };
        
        if let Some(export) = &self.settings.export {
            if let Err(e) = export_views(export, &unrounded) {
                error!("CSV export failed after pass {}: {}", pass, e);
                let report = FaultReport::from_error(pass, &SessionError::Persistence(e));
                self.fault(report);
            }
        }
        views
    }
}

/// Run `settings.passes` sweeps and aggregate each one
/// 
/// The receiver must already be configured. `state` tracks progress for
/// observers and ends as `Idle`, or `Aborted` if `cancel` was raised.
pub fn run_passes<R: Receiver + ?Sized>(
    config: &SweepConfig,
    settings: &SessionSettings,
    receiver: &mut R,
    engine: &Mutex<AggregationEngine>,
    state: &Mutex<SessionState>,
    cancel: &AtomicBool,
    presentation: &mut dyn Presentation,
) -> SessionSummary {
    let passes = settings.passes;
    let mut runner = PassRunner {
        settings,
        presentation,
        summary: SessionSummary::default(),
    };
    let mut last_timestamp = lock(engine).state().recent().map(|r| r.timestamp());
    let mut aborted = false;
    
    for pass in 1..=passes {
        if cancel.load(Ordering::SeqCst) {
            aborted = true;
            break;
        }
        *lock(state) = SessionState::Running { pass, passes };
        info!("Starting pass {}/{}", pass, passes);
        
        let controller = match SweepController::new(config, &mut *receiver) {
            Ok(controller) => controller,
            Err(e) => {
                runner.fault(FaultReport::from_error(pass, &SessionError::Processing(e)));
                aborted = true;
                break;
            }
        };
        
        let (points, step_faults, cancelled) = {
            let presentation = &mut *runner.presentation;
            let mut on_progress = |freq_hz: f64, percent: f64| {
                presentation.on_event(SessionEvent::Progress(ProgressUpdate {
                    pass,
                    passes,
                    freq_hz,
                    percent,
                }));
            };
            let mut controller = controller.with_progress(&mut on_progress).with_cancel(cancel);
            let points: Vec<SweepPoint> = controller.by_ref().collect();
            (points, controller.take_faults(), controller.was_cancelled())
        };
        
        for step in &step_faults {
            runner.fault(FaultReport::step(pass, step.freq_hz, &step.error));
        }
        
        if cancelled {
            info!("Pass {}/{} cancelled after {} steps", pass, passes, points.len());
            aborted = true;
            break;
        }
        
        if points.is_empty() {
            warn!("Pass {}/{} produced no usable steps", pass, passes);
            runner.fault(FaultReport::new(FaultKind::Processing, pass, "no usable steps in pass"));
            continue;
        }
        
        let timestamp = next_timestamp(last_timestamp);
        let record = match SweepRecord::from_points(
            timestamp,
            &points,
            Some(config.clone()),
            settings.location.clone(),
        ) {
            Ok(record) => record,
            Err(e) => {
                runner.fault(FaultReport::new(FaultKind::Processing, pass, e.to_string()));
                continue;
            }
        };
        last_timestamp = Some(timestamp);
        
        let views = runner.complete(pass, record, engine);
        runner.summary.passes_completed += 1;
        info!("Completed pass {}/{} ({} points)", pass, passes, points.len());
        runner.presentation.on_event(SessionEvent::PassComplete { pass, passes, views });
    }
    
    // A stop during the last step still lets that pass finish
    if !aborted && cancel.load(Ordering::SeqCst) {
        info!("Stop requested during final pass");
        aborted = true;
    }
    
    let final_state = if aborted {
        SessionState::Aborted
    } else {
        SessionState::Idle
    };
    *lock(state) = final_state;
    runner.summary.final_state = final_state;
    runner.presentation.on_event(SessionEvent::Finished { state: final_state });
    runner.summary
}

/// Start/stop control over background sweep sessions
pub struct SweepSession {
    config: SweepConfig,
    settings: SessionSettings,
    engine: Arc<Mutex<AggregationEngine>>,
    state: Arc<Mutex<SessionState>>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<SessionSummary>>,
    selected_band: Option<String>,
    available_bands: Vec<String>,
    dry_run: bool,
}

impl SweepSession {
    pub fn new(config: SweepConfig, settings: SessionSettings, engine: AggregationEngine) -> Self {
        let dry_run = engine.is_dry_run();
        Self {
            config,
            settings,
            engine: Arc::new(Mutex::new(engine)),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            cancel: Arc::new(AtomicBool::new(false)),
            worker: None,
            selected_band: None,
            available_bands: Vec::new(),
            dry_run,
        }
    }
    
    /// Band information reported by `status`
    pub fn with_bands(mut self, selected_band: Option<String>, bands: &BandTable) -> Self {
        self.selected_band = selected_band;
        self.available_bands = bands.names();
        self
    }
    
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }
    
    /// Replace the sweep plan used by the next `start`
    /// 
    /// # Returns
    /// `AlreadyRunning` while a session is in progress
    pub fn set_config(&mut self, config: SweepConfig) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        self.config = config;
        Ok(())
    }
    
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
    
    /// Takes effect on the next `start`
    pub fn settings_mut(&mut self) -> &mut SessionSettings {
        &mut self.settings
    }
    
    pub fn engine(&self) -> &Arc<Mutex<AggregationEngine>> {
        &self.engine
    }
    
    /// Configure `receiver` and start sweeping on a worker thread
    /// 
    /// # Arguments
    /// * `receiver` - Exclusively owned for the session; closed when it ends
    /// * `presentation` - Receives progress, views and faults
    /// 
    /// # Returns
    /// `AlreadyRunning` if a session is in progress, `Hardware` if the
    /// receiver cannot be configured
    pub fn start<R>(&mut self, mut receiver: R, mut presentation: Box<dyn Presentation>) -> Result<(), SessionError>
    where
        R: Receiver + Send + 'static,
    {
        let previous = {
            let mut state = lock(&self.state);
            if matches!(*state, SessionState::Running { .. }) {
                return Err(SessionError::AlreadyRunning);
            }
            let previous = *state;
            *state = SessionState::Running {
                pass: 1,
                passes: self.settings.passes,
            };
            previous
        };
        
        // Previous worker has already left the Running state
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        
        if let Err(e) = receiver.configure(&self.config.tuner_settings()) {
            error!("Receiver initialization failed: {}", e);
            if let Err(close_err) = receiver.close() {
                warn!("Failed to close receiver: {}", close_err);
            }
            *lock(&self.state) = previous;
            return Err(SessionError::Hardware(e));
        }
        
        if self.settings.reset_max_hold_on_start {
            lock(&self.engine).reset_max_hold();
        }
        self.cancel.store(false, Ordering::SeqCst);
        
        let config = self.config.clone();
        let settings = self.settings.clone();
        let engine = Arc::clone(&self.engine);
        let state = Arc::clone(&self.state);
        let cancel = Arc::clone(&self.cancel);
        
        let handle = std::thread::spawn(move || {
            let summary = run_passes(
                &config,
                &settings,
                &mut receiver,
                &engine,
                &state,
                &cancel,
                presentation.as_mut(),
            );
            if let Err(e) = receiver.close() {
                warn!("{}", e);
            }
            summary
        });
        
        self.worker = Some(handle);
        info!("Sweep session started ({} passes)", self.settings.passes);
        Ok(())
    }
    
    /// Request cancellation and wait for the worker
    /// 
    /// Returns `None` if no session was started since the last stop/wait.
    pub fn stop(&mut self) -> Result<Option<SessionSummary>, SessionError> {
        self.cancel.store(true, Ordering::SeqCst);
        self.join()
    }
    
    /// Wait for the current session to finish all passes
    pub fn wait(&mut self) -> Result<Option<SessionSummary>, SessionError> {
        self.join()
    }
    
    fn join(&mut self) -> Result<Option<SessionSummary>, SessionError> {
        let Some(handle) = self.worker.take() else {
            return Ok(None);
        };
        match handle.join() {
            Ok(summary) => Ok(Some(summary)),
            Err(_) => {
                error!("Sweep worker panicked");
                *lock(&self.state) = SessionState::Aborted;
                Err(SessionError::WorkerPanicked)
            }
        }
    }
    
    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }
    
    pub fn is_running(&self) -> bool {
        matches!(self.state(), SessionState::Running { .. })
    }
    
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state(),
            dry_run: self.dry_run,
            selected_band: self.selected_band.clone(),
            available_bands: self.available_bands.clone(),
            location: self.settings.location.clone(),
            sweeps_averaged: lock(&self.engine).state().window_len(),
        }
    }
    
    /// Latest recent / average / max-hold views in dBm
    pub fn views(&self) -> SpectrumViews {
        lock(&self.engine).views()
    }
}

impl Drop for SweepSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.stop();
        }
    }
}
