//! # instrument-mapper
//!
//! Bridges a musical-instrument controller to a virtual GIP gamepad.
//!
//! A [`MapperThread`] runs one background worker that repeatedly:
//!
//! 1. blocks on the [`DevicePort`] for one input report
//! 2. converts it into a 14-byte [`GipReport`](gip_report::GipReport) with the
//!    device's [`GipConverter`]
//! 3. forwards the result to the [`ControllerSink`]
//! 4. stops itself if the report carries a termination sentinel (guide button,
//!    or menu and view held together)
//!
//! The first failing step ends the run. The worker records an [`Incident`]
//! through its [`DiagnosticSink`] (by default an `errors/` directory next to
//! the executable), then disconnects the sink and closes the device.
//!
//! ## Modules
//!
//! - [`mapper`] - Lifecycle controller and worker loop
//! - [`ports`] - Device and controller traits
//! - [`diagnostic`] - Failure records and the file writer
//! - [`config`] - Mapper configuration
//! - [`state`] - Lifecycle state and run summaries
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```rust
//! use instrument_mapper::prelude::*;
//!
//! struct Pad(u8);
//!
//! impl DevicePort for Pad {
//!     fn open(&mut self) -> Result<(), DeviceError> { Ok(()) }
//!     fn close(&mut self) -> Result<(), DeviceError> { Ok(()) }
//!     fn read_length(&self) -> usize { 1 }
//!     fn read(&mut self, buffer: &mut [u8]) -> Result<(), DeviceError> {
//!         // Third report presses guide.
//!         self.0 += 1;
//!         buffer.fill(if self.0 == 3 { 0x02 } else { 0x00 });
//!         Ok(())
//!     }
//!     fn converter(&self) -> GipConverter {
//!         |input, report| {
//!             report.clear();
//!             report.as_mut_bytes()[0] = input[0];
//!             Ok(())
//!         }
//!     }
//! }
//!
//! struct Sink;
//!
//! impl ControllerSink for Sink {
//!     fn connect(&mut self) -> Result<(), SinkError> { Ok(()) }
//!     fn disconnect(&mut self) -> Result<(), SinkError> { Ok(()) }
//!     fn send(&mut self, _report: &GipReport) -> Result<(), SinkError> { Ok(()) }
//! }
//!
//! # fn main() -> Result<(), MapperError> {
//! let mut mapper = MapperThread::new(Pad(0), Sink);
//! mapper.start()?;
//!
//! let summary = mapper.wait()?.cloned();
//! assert!(!mapper.is_running());
//! assert_eq!(summary.map(|s| s.reports_forwarded), Some(3));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod mapper;
pub mod ports;
pub mod state;

#[cfg(feature = "mock")]
#[cfg_attr(docsrs, doc(cfg(feature = "mock")))]
pub mod mock;

pub mod prelude;

pub use config::{MapperConfig, MapperConfigBuilder};
pub use diagnostic::{DiagnosticSink, ErrorLogWriter, Incident};
pub use error::{
    ConvertError, DeviceError, DiagnosticError, DiagnosticResult, MapperError, MapperResult,
    SinkError,
};
pub use mapper::MapperThread;
pub use ports::{ControllerSink, DevicePort, GipConverter};
pub use state::{MapperState, RunExit, RunSummary};
