//! Mapper loop: instrument reports in, GIP reports out
//!
//! [`MapperThread`] owns one background worker at a time. Each iteration the
//! worker reads an input report from the [`DevicePort`], converts it into a
//! [`GipReport`], forwards it to the [`ControllerSink`] and checks it for a
//! termination sentinel.
//!
//! # Threads
//!
//! Two actors share an instance: the caller's thread (`start`, `stop`,
//! `wait`, `dispose`) and the worker. They communicate only through two
//! atomic flags:
//!
//! - `stop_requested`: written by both sides, read by the worker at the top of
//!   every iteration
//! - `active`: set by `start` before the worker runs, cleared by the worker as
//!   its very last action, after teardown
//!
//! `is_running() == false` therefore implies the sink is disconnected and the
//! device closed.
//!
//! # Ownership
//!
//! The device and sink are moved into the worker for the length of a run and
//! come back through its `JoinHandle`. `dispose` hands the device back to the
//! caller unclosed so it can be reused.
//!
//! # Cancellation
//!
//! Cooperative only. A stop request is observed after the in-flight device
//! read returns, so `stop()` blocks for as long as the device blocks.
//!
//! # Panics
//!
//! A panic raised by the device, converter or sink is caught at the loop
//! boundary and handled like any other step failure: recorded, then torn
//! down. This needs `panic = "unwind"`; with `panic = "abort"` the process
//! ends instead.

use crate::config::MapperConfig;
use crate::diagnostic::{DiagnosticSink, ErrorLogWriter, Incident};
use crate::error::{MapperError, MapperResult, panic_message};
use crate::ports::{ControllerSink, DevicePort, GipConverter};
use crate::state::{AtomicMapperState, MapperState, RunExit, RunSummary};
use crossbeam::channel::SendError;
use gip_report::{GipReport, TerminationRequest};
use std::{
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};
use tracing::{debug, error, info, trace, warn};

/// Device and sink, held by whichever side currently owns the run.
struct Parts<D, S> {
    device: D,
    sink: S,
}

/// What the worker hands back when it exits.
struct WorkerExit<D, S> {
    parts: Parts<D, S>,
    summary: RunSummary,
}

/// Background loop bridging one instrument to one virtual controller.
pub struct MapperThread<D, S>
where
    D: DevicePort + 'static,
    S: ControllerSink + 'static,
{
    config: MapperConfig,
    diagnostics: Arc<dyn DiagnosticSink>,

    /// Present while idle; moved into the worker during a run
    parts: Option<Parts<D, S>>,

    /// Worker handle; `None` when no worker has been spawned or it was joined
    worker: Option<JoinHandle<Option<WorkerExit<D, S>>>>,

    stop_requested: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    state: Arc<AtomicMapperState>,

    last_run: Option<RunSummary>,
}

impl<D, S> MapperThread<D, S>
where
    D: DevicePort + 'static,
    S: ControllerSink + 'static,
{
    /// Create an idle mapper with the default configuration.
    pub fn new(device: D, sink: S) -> Self {
        let config = MapperConfig::default();
        let diagnostics: Arc<dyn DiagnosticSink> =
            Arc::new(ErrorLogWriter::new(&config.error_dir));

        Self {
            config,
            diagnostics,
            parts: Some(Parts { device, sink }),
            worker: None,
            stop_requested: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicMapperState::new(MapperState::Idle)),
            last_run: None,
        }
    }

    /// Create an idle mapper with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(device: D, sink: S, config: MapperConfig) -> MapperResult<Self> {
        config.validate()?;
        let mut mapper = Self::new(device, sink);
        mapper.diagnostics = Arc::new(ErrorLogWriter::new(&config.error_dir));
        mapper.config = config;
        Ok(mapper)
    }

    /// Replace the diagnostic sink used for loop failures.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Start the worker. Does nothing if it is already running.
    ///
    /// Opens the device, connects the controller sink and spawns the worker.
    /// When this returns `Ok`, [`is_running`](Self::is_running) is true until
    /// the worker exits.
    ///
    /// # Errors
    ///
    /// Fails if the device cannot be opened, reports a zero read length, the
    /// sink cannot connect, or the thread cannot be spawned. The instance is
    /// left idle with the device closed.
    pub fn start(&mut self) -> MapperResult<()> {
        if self.is_running() {
            debug!("Mapper already running");
            return Ok(());
        }

        // A worker that ended on its own still holds the device and sink.
        if let Some(handle) = self.worker.take() {
            self.join_worker(handle)?;
        }

        let Some(mut parts) = self.parts.take() else {
            return Err(MapperError::ResourcesUnavailable);
        };

        self.state.store(MapperState::Starting);
        let device_name = parts.device.description();
        info!(device = %device_name, "Starting mapper");

        if let Err(e) = parts.device.open() {
            return Err(self.abort_start(parts, e.into(), false));
        }

        let read_length = parts.device.read_length();
        if read_length == 0 {
            return Err(self.abort_start(parts, MapperError::InvalidReadLength(0), true));
        }

        if let Err(e) = parts.sink.connect() {
            return Err(self.abort_start(parts, e.into(), true));
        }

        let context = WorkerContext {
            converter: parts.device.converter(),
            parts,
            read_length,
            device_name,
            yield_between_iterations: self.config.yield_between_iterations,
            stop_requested: Arc::clone(&self.stop_requested),
            active: Arc::clone(&self.active),
            state: Arc::clone(&self.state),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        // The context travels over a channel so a failed spawn leaves it with
        // us and teardown still runs.
        let (handoff_tx, handoff_rx) = crossbeam::channel::bounded::<WorkerContext<D, S>>(1);
        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || handoff_rx.recv().ok().map(WorkerContext::run));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let parts = context.release();
                return Err(self.abort_start(parts, MapperError::spawn(e.to_string()), true));
            }
        };

        self.stop_requested.store(false, Ordering::Release);
        self.active.store(true, Ordering::Release);
        self.state.store(MapperState::Running);

        if let Err(SendError(context)) = handoff_tx.send(context) {
            self.active.store(false, Ordering::Release);
            if handle.join().is_err() {
                error!("Mapper thread panicked before receiving its context");
            }
            let parts = context.release();
            return Err(self.abort_start(
                parts,
                MapperError::spawn("worker exited before receiving its context"),
                true,
            ));
        }

        self.worker = Some(handle);
        info!(read_length, "Mapper started");
        Ok(())
    }

    /// Stop the worker and wait for it to release the device and sink.
    ///
    /// Does nothing if no worker exists. There is no timeout: if the device
    /// never returns from its blocking read, this never returns either.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::WorkerPanicked`] if the worker panicked.
    pub fn stop(&mut self) -> MapperResult<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        if self.active.load(Ordering::Acquire) {
            info!("Stopping mapper");
            self.state.store(MapperState::Stopping);
        }
        self.stop_requested.store(true, Ordering::Release);

        self.join_worker(handle)
    }

    /// Block until the worker exits on its own, without requesting a stop.
    ///
    /// Returns the summary of the most recent run, if any. Meant for runs that
    /// end through a sentinel or a failure; a worker that never sees either
    /// keeps this blocked.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::WorkerPanicked`] if the worker panicked.
    pub fn wait(&mut self) -> MapperResult<Option<&RunSummary>> {
        if let Some(handle) = self.worker.take() {
            self.join_worker(handle)?;
        }
        Ok(self.last_run.as_ref())
    }

    /// Stop the worker, release the controller sink and hand the device back.
    ///
    /// The device is not closed beyond the run's own teardown and is not
    /// disposed.
    ///
    /// # Errors
    ///
    /// Fails if the worker panicked, in which case the device was lost.
    pub fn dispose(mut self) -> MapperResult<D> {
        self.stop()?;

        let Parts { device, mut sink } = self
            .parts
            .take()
            .ok_or(MapperError::ResourcesUnavailable)?;
        sink.dispose();

        debug!("Mapper disposed");
        Ok(device)
    }

    /// True while a worker holds the device and sink.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MapperState {
        self.state.load()
    }

    /// Summary of the most recent run that has been joined.
    pub fn last_run(&self) -> Option<&RunSummary> {
        self.last_run.as_ref()
    }

    /// Configuration this mapper was built with.
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// The device, while no run holds it.
    pub fn device(&self) -> Option<&D> {
        self.parts.as_ref().map(|parts| &parts.device)
    }

    /// The controller sink, while no run holds it.
    pub fn sink(&self) -> Option<&S> {
        self.parts.as_ref().map(|parts| &parts.sink)
    }

    fn join_worker(&mut self, handle: JoinHandle<Option<WorkerExit<D, S>>>) -> MapperResult<()> {
        let joined = handle.join();
        self.state.store(MapperState::Idle);

        match joined {
            Ok(Some(WorkerExit { parts, summary })) => {
                info!(
                    reports_forwarded = summary.reports_forwarded,
                    exit = ?summary.exit,
                    "Mapper stopped"
                );
                self.parts = Some(parts);
                self.last_run = Some(summary);
                Ok(())
            }
            Ok(None) => {
                warn!("Mapper thread exited without a run");
                Err(MapperError::ResourcesUnavailable)
            }
            Err(_) => {
                error!("Mapper thread panicked");
                self.active.store(false, Ordering::Release);
                Err(MapperError::WorkerPanicked)
            }
        }
    }

    /// Undo a partially completed `start`, keeping the parts for a later try.
    fn abort_start(
        &mut self,
        mut parts: Parts<D, S>,
        err: MapperError,
        close_device: bool,
    ) -> MapperError {
        warn!(error = %err, "Mapper failed to start");
        if close_device {
            if let Err(e) = parts.device.close() {
                warn!(error = %e, "Failed to close device after aborted start");
            }
        }
        self.parts = Some(parts);
        self.state.store(MapperState::Idle);
        err
    }
}

impl<D, S> Drop for MapperThread<D, S>
where
    D: DevicePort + 'static,
    S: ControllerSink + 'static,
{
    fn drop(&mut self) {
        if self.worker.is_none() {
            return;
        }
        if self.is_running() {
            warn!("Mapper dropped while still running - forcing stop");
        }
        if let Err(e) = self.stop() {
            error!(error = %e, "Failed to stop mapper on drop");
        }
    }
}

/// Everything the worker needs for one run.
struct WorkerContext<D, S> {
    parts: Parts<D, S>,
    converter: GipConverter,
    read_length: usize,
    device_name: String,
    yield_between_iterations: bool,
    stop_requested: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    state: Arc<AtomicMapperState>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<D: DevicePort, S: ControllerSink> WorkerContext<D, S> {
    /// Worker thread body.
    fn run(mut self) -> WorkerExit<D, S> {
        // Declared first so it drops last, after teardown.
        let _exit = ExitSignal {
            active: Arc::clone(&self.active),
            state: Arc::clone(&self.state),
        };

        debug!(device = %self.device_name, "Mapper thread started");

        let mut reports_forwarded = 0u64;
        let pumped = panic::catch_unwind(AssertUnwindSafe(|| self.pump(&mut reports_forwarded)))
            .unwrap_or_else(|payload| Err(MapperError::step_panicked(&*payload)));

        let exit = match pumped {
            Ok(None) => RunExit::Stopped,
            Ok(Some(request)) => RunExit::Sentinel(request),
            Err(err) => {
                let diagnostic = self.report_failure(&err, reports_forwarded);
                RunExit::Failed {
                    error: err.to_string(),
                    diagnostic,
                }
            }
        };

        self.state.store(MapperState::Stopping);
        self.teardown();

        WorkerExit {
            parts: self.parts,
            summary: RunSummary {
                reports_forwarded,
                exit,
            },
        }
    }

    /// Read, convert, forward until a stop is requested or a step fails.
    fn pump(&mut self, reports_forwarded: &mut u64) -> MapperResult<Option<TerminationRequest>> {
        let mut input_report = vec![0u8; self.read_length];
        let mut gip_report = GipReport::zeroed();
        let mut termination = None;

        while !self.stop_requested.load(Ordering::Acquire) {
            self.parts.device.read(&mut input_report)?;
            (self.converter)(&input_report, &mut gip_report)?;
            self.parts.sink.send(&gip_report)?;
            *reports_forwarded = reports_forwarded.saturating_add(1);
            trace!(seq = *reports_forwarded, flags = gip_report.flag_byte(), "Report forwarded");

            if let Some(request) = gip_report.termination_request() {
                info!(%request, reports_forwarded = *reports_forwarded, "Termination sentinel received");
                termination = Some(request);
                self.stop_requested.store(true, Ordering::Release);
            }

            if self.yield_between_iterations {
                thread::yield_now();
            }
        }

        Ok(termination)
    }

    fn report_failure(&self, err: &MapperError, reports_forwarded: u64) -> Option<PathBuf> {
        error!(
            device = %self.device_name,
            error = %err,
            reports_forwarded,
            "Mapper loop failed"
        );

        let incident = Incident::capture(self.device_name.as_str(), reports_forwarded, err);
        let diagnostics = &self.diagnostics;
        match panic::catch_unwind(AssertUnwindSafe(|| diagnostics.record(&incident))) {
            Ok(Ok(location)) => {
                if let Some(path) = &location {
                    info!(path = %path.display(), "Diagnostic record written");
                }
                location
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to persist diagnostic record");
                None
            }
            Err(payload) => {
                error!(panic = %panic_message(&*payload), "Diagnostic sink panicked");
                None
            }
        }
    }

    /// Disconnect the sink, then close the device.
    ///
    /// Errors and panics are logged only; a failing step never skips the next.
    fn teardown(&mut self) {
        let Parts { device, sink } = &mut self.parts;

        match panic::catch_unwind(AssertUnwindSafe(|| sink.disconnect())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to disconnect controller sink"),
            Err(payload) => error!(
                panic = %panic_message(&*payload),
                "Controller sink panicked while disconnecting"
            ),
        }
        match panic::catch_unwind(AssertUnwindSafe(|| device.close())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to close device"),
            Err(payload) => error!(
                panic = %panic_message(&*payload),
                "Device panicked while closing"
            ),
        }
        debug!("Mapper resources released");
    }

    /// Tear down a context that never reached the worker.
    fn release(mut self) -> Parts<D, S> {
        if let Err(e) = self.parts.sink.disconnect() {
            warn!(error = %e, "Failed to disconnect controller sink");
        }
        self.parts
    }
}

/// Marks the worker gone when dropped.
///
/// Panics from the device, converter and sink are caught inside the run, so
/// this only fires on an unwind for a fault in the worker itself.
struct ExitSignal {
    active: Arc<AtomicBool>,
    state: Arc<AtomicMapperState>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        self.state.store(MapperState::Idle);
        self.active.store(false, Ordering::Release);
    }
}
