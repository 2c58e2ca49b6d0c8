//! Port traits for the mapper's external collaborators
//!
//! The mapper loop only talks to hardware and to the virtual controller
//! through these traits. Implementations live outside this crate (a HID
//! driver, a virtual bus client); the `mock` feature adds scripted doubles.

use crate::error::{ConvertError, DeviceError, SinkError};
use gip_report::GipReport;

/// Converts one device input report into a GIP report, in place.
///
/// A plain function pointer: converters cannot capture state, so they cannot
/// hold on to either buffer past the call.
pub type GipConverter = fn(&[u8], &mut GipReport) -> Result<(), ConvertError>;

/// Physical instrument the mapper reads from.
///
/// The mapper opens the port when a run starts and closes it when the run
/// ends. It never disposes of the port; the same port can serve several runs
/// or several mapper instances in turn.
pub trait DevicePort: Send {
    /// Open the device for reading.
    fn open(&mut self) -> Result<(), DeviceError>;

    /// Close the device. Called once per run during teardown.
    fn close(&mut self) -> Result<(), DeviceError>;

    /// Length in bytes of one input report.
    fn read_length(&self) -> usize;

    /// Block until one full input report has been written into `buffer`.
    ///
    /// `buffer` is exactly [`DevicePort::read_length`] bytes and keeps its
    /// previous contents; implementations must overwrite all of it.
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), DeviceError>;

    /// Converter for this device's report format.
    fn converter(&self) -> GipConverter;

    /// Human-readable name used in logs and diagnostic records.
    fn description(&self) -> String {
        "instrument".to_string()
    }
}

/// Virtual gamepad endpoint receiving GIP reports.
pub trait ControllerSink: Send {
    fn connect(&mut self) -> Result<(), SinkError>;

    fn disconnect(&mut self) -> Result<(), SinkError>;

    fn send(&mut self, report: &GipReport) -> Result<(), SinkError>;

    /// Release any resources held beyond the connection.
    fn dispose(&mut self) {}
}

impl<T: DevicePort + ?Sized> DevicePort for Box<T> {
    fn open(&mut self) -> Result<(), DeviceError> {
        (**self).open()
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        (**self).close()
    }

    fn read_length(&self) -> usize {
        (**self).read_length()
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), DeviceError> {
        (**self).read(buffer)
    }

    fn converter(&self) -> GipConverter {
        (**self).converter()
    }

    fn description(&self) -> String {
        (**self).description()
    }
}

impl<T: ControllerSink + ?Sized> ControllerSink for Box<T> {
    fn connect(&mut self) -> Result<(), SinkError> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<(), SinkError> {
        (**self).disconnect()
    }

    fn send(&mut self, report: &GipReport) -> Result<(), SinkError> {
        (**self).send(report)
    }

    fn dispose(&mut self) {
        (**self).dispose();
    }
}
