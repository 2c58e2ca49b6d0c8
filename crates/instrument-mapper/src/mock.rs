//! Scripted collaborators for tests and benches.
//!
//! The device and sink record everything they see into a shared
//! [`MockJournal`], so a test can keep observing after both have been moved
//! into the mapper.

use crate::diagnostic::{DiagnosticSink, Incident};
use crate::error::{ConvertError, DeviceError, DiagnosticError, DiagnosticResult, SinkError};
use crate::ports::{ControllerSink, DevicePort, GipConverter};
use gip_report::GipReport;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Something a mock collaborator observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    DeviceOpened,
    DeviceClosed,
    SinkConnected,
    SinkDisconnected,
    ReportSent(GipReport),
    SinkDisposed,
}

impl MockEvent {
    fn is_lifecycle(&self) -> bool {
        !matches!(self, Self::ReportSent(_))
    }
}

#[derive(Debug, Default)]
struct JournalState {
    events: Vec<MockEvent>,
    read_threads: Vec<String>,
    sent: usize,
}

#[derive(Debug, Default)]
struct JournalShared {
    state: Mutex<JournalState>,
    changed: Condvar,
}

/// Ordered log shared by a mock device and sink.
#[derive(Debug, Clone, Default)]
pub struct MockJournal {
    shared: Arc<JournalShared>,
}

impl MockJournal {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: MockEvent) {
        let mut state = self.shared.state.lock();
        if matches!(event, MockEvent::ReportSent(_)) {
            state.sent = state.sent.saturating_add(1);
        }
        state.events.push(event);
        self.shared.changed.notify_all();
    }

    fn push_read_thread(&self, name: String) {
        self.shared.state.lock().read_threads.push(name);
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.shared.state.lock().events.clone()
    }

    /// Everything except forwarded reports.
    pub fn lifecycle_events(&self) -> Vec<MockEvent> {
        self.shared
            .state
            .lock()
            .events
            .iter()
            .filter(|event| event.is_lifecycle())
            .cloned()
            .collect()
    }

    pub fn sent_reports(&self) -> Vec<GipReport> {
        self.shared
            .state
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::ReportSent(report) => Some(*report),
                _ => None,
            })
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.shared.state.lock().sent
    }

    pub fn count(&self, event: &MockEvent) -> usize {
        self.shared
            .state
            .lock()
            .events
            .iter()
            .filter(|e| *e == event)
            .count()
    }

    /// Name of the thread that performed the reads, once per device open.
    pub fn read_threads(&self) -> Vec<String> {
        self.shared.state.lock().read_threads.clone()
    }

    /// Block until at least `count` reports were sent. False on timeout.
    pub fn wait_for_sent(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock();
        while state.sent < count {
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .changed
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return state.sent >= count;
                    }
                }
                None => self.shared.changed.wait(&mut state),
            }
        }
        true
    }

    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        state.events.clear();
        state.read_threads.clear();
        state.sent = 0;
    }
}

/// One scripted result of [`MockDevicePort::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRead {
    Report(Vec<u8>),
    Fail(DeviceError),
}

/// Copies the input into the start of the GIP report and zeroes the rest.
///
/// The first input byte becomes the flag byte, so scripts can drive sentinel
/// detection directly.
pub fn passthrough_converter(input: &[u8], report: &mut GipReport) -> Result<(), ConvertError> {
    if input.is_empty() {
        return Err(ConvertError::InputTooShort {
            needed: 1,
            actual: 0,
        });
    }
    report.clear();
    for (dst, src) in report.as_mut_bytes().iter_mut().zip(input) {
        *dst = *src;
    }
    Ok(())
}

/// Scripted instrument.
///
/// Reads are served from a queue of [`MockRead`]s. Once the queue is empty the
/// device either repeats its idle report (after a short pause, like a real
/// device polling at a fixed rate) or reports a disconnect.
#[derive(Debug)]
pub struct MockDevicePort {
    read_length: usize,
    script: VecDeque<MockRead>,
    idle_report: Option<Vec<u8>>,
    idle_interval: Duration,
    open_error: Option<DeviceError>,
    close_error: Option<DeviceError>,
    converter: GipConverter,
    description: String,
    is_open: bool,
    thread_recorded: bool,
    journal: MockJournal,
}

impl MockDevicePort {
    pub fn new(read_length: usize) -> Self {
        Self {
            read_length,
            script: VecDeque::new(),
            idle_report: None,
            idle_interval: Duration::from_millis(1),
            open_error: None,
            close_error: None,
            converter: passthrough_converter,
            description: "mock instrument".to_string(),
            is_open: false,
            thread_recorded: false,
            journal: MockJournal::new(),
        }
    }

    /// Queue reports to be returned in order.
    pub fn with_reads<I>(mut self, reports: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        self.script
            .extend(reports.into_iter().map(MockRead::Report));
        self
    }

    pub fn with_script<I>(mut self, script: I) -> Self
    where
        I: IntoIterator<Item = MockRead>,
    {
        self.script.extend(script);
        self
    }

    pub fn with_read_failure(mut self, error: DeviceError) -> Self {
        self.script.push_back(MockRead::Fail(error));
        self
    }

    pub fn with_idle_report(mut self, report: Vec<u8>) -> Self {
        self.idle_report = Some(report);
        self
    }

    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn with_open_failure(mut self, error: DeviceError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn with_close_failure(mut self, error: DeviceError) -> Self {
        self.close_error = Some(error);
        self
    }

    pub fn with_converter(mut self, converter: GipConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_journal(mut self, journal: MockJournal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> MockJournal {
        self.journal.clone()
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Scripted reads not yet consumed.
    pub fn remaining_script(&self) -> usize {
        self.script.len()
    }

    fn fill(buffer: &mut [u8], report: &[u8]) -> Result<(), DeviceError> {
        if report.len() < buffer.len() {
            return Err(DeviceError::ShortRead {
                expected: buffer.len(),
                actual: report.len(),
            });
        }
        for (dst, src) in buffer.iter_mut().zip(report) {
            *dst = *src;
        }
        Ok(())
    }
}

impl DevicePort for MockDevicePort {
    fn open(&mut self) -> Result<(), DeviceError> {
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        self.is_open = true;
        self.thread_recorded = false;
        self.journal.push(MockEvent::DeviceOpened);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if !self.is_open {
            return Err(DeviceError::NotOpen);
        }
        self.is_open = false;
        self.journal.push(MockEvent::DeviceClosed);
        match &self.close_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn read_length(&self) -> usize {
        self.read_length
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), DeviceError> {
        if !self.is_open {
            return Err(DeviceError::NotOpen);
        }
        if !self.thread_recorded {
            self.thread_recorded = true;
            let name = thread::current().name().unwrap_or("<unnamed>").to_string();
            self.journal.push_read_thread(name);
        }

        match self.script.pop_front() {
            Some(MockRead::Report(report)) => Self::fill(buffer, &report),
            Some(MockRead::Fail(err)) => Err(err),
            None => match &self.idle_report {
                Some(report) => {
                    thread::sleep(self.idle_interval);
                    Self::fill(buffer, report)
                }
                None => Err(DeviceError::Disconnected),
            },
        }
    }

    fn converter(&self) -> GipConverter {
        self.converter
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// Virtual controller that records what it is sent.
#[derive(Debug)]
pub struct MockControllerSink {
    journal: MockJournal,
    connected: bool,
    connect_error: Option<SinkError>,
    disconnect_error: Option<SinkError>,
    /// 1-based send that fails, and how
    send_failure: Option<(u64, SinkError)>,
    sends: u64,
}

impl MockControllerSink {
    pub fn new(journal: MockJournal) -> Self {
        Self {
            journal,
            connected: false,
            connect_error: None,
            disconnect_error: None,
            send_failure: None,
            sends: 0,
        }
    }

    pub fn with_connect_failure(mut self, error: SinkError) -> Self {
        self.connect_error = Some(error);
        self
    }

    pub fn with_disconnect_failure(mut self, error: SinkError) -> Self {
        self.disconnect_error = Some(error);
        self
    }

    /// Fail the `nth` send (1-based) of every run.
    pub fn with_send_failure_at(mut self, nth: u64, error: SinkError) -> Self {
        self.send_failure = Some((nth, error));
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl ControllerSink for MockControllerSink {
    fn connect(&mut self) -> Result<(), SinkError> {
        if let Some(err) = &self.connect_error {
            return Err(err.clone());
        }
        self.connected = true;
        self.sends = 0;
        self.journal.push(MockEvent::SinkConnected);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), SinkError> {
        if !self.connected {
            return Err(SinkError::NotConnected);
        }
        self.connected = false;
        self.journal.push(MockEvent::SinkDisconnected);
        match &self.disconnect_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn send(&mut self, report: &GipReport) -> Result<(), SinkError> {
        if !self.connected {
            return Err(SinkError::NotConnected);
        }
        self.sends = self.sends.saturating_add(1);
        if let Some((nth, err)) = &self.send_failure {
            if *nth == self.sends {
                return Err(err.clone());
            }
        }
        self.journal.push(MockEvent::ReportSent(*report));
        Ok(())
    }

    fn dispose(&mut self) {
        self.journal.push(MockEvent::SinkDisposed);
    }
}

/// Keeps incidents in memory instead of writing files.
#[derive(Debug, Clone, Default)]
pub struct MemoryDiagnosticSink {
    incidents: Arc<Mutex<Vec<Incident>>>,
    failure: Option<DiagnosticError>,
}

impl MemoryDiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every `record` call fails with `error`.
    pub fn failing(error: DiagnosticError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn incidents(&self) -> Vec<Incident> {
        self.incidents.lock().clone()
    }
}

impl DiagnosticSink for MemoryDiagnosticSink {
    fn record(&self, incident: &Incident) -> DiagnosticResult<Option<PathBuf>> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.incidents.lock().push(incident.clone());
        Ok(None)
    }
}
