//! Prelude for instrument-mapper.
//!
//! Re-exports the types needed to implement the ports and drive a mapper.

pub use crate::config::{MapperConfig, MapperConfigBuilder};
pub use crate::diagnostic::{DiagnosticSink, ErrorLogWriter, Incident};
pub use crate::error::{
    ConvertError, DeviceError, DiagnosticError, MapperError, MapperResult, SinkError,
};
pub use crate::mapper::MapperThread;
pub use crate::ports::{ControllerSink, DevicePort, GipConverter};
pub use crate::state::{MapperState, RunExit, RunSummary};
pub use gip_report::{GipFlags, GipReport, TerminationRequest};
