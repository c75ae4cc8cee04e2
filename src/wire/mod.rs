//! Wire module: the seam between the core and the transport below it.
//!
//! The core consumes four streams per axis: a pulse-delta command
//! output, an encoder count input, a digital input scan and an output
//! register write, plus optional typed drive-command frames. Anything
//! that provides those streams (a fieldbus master, a pulse card
//! driver, a simulator) implements [`Wire`].

mod drive;
mod loopback;
mod stepdir;

pub use drive::{DriveCommand, DriveReply, ReturnMode};
pub use loopback::{LoopbackWire, SwitchModel};
pub use stepdir::StepDirWire;

use crate::error::{Error, Result};
use crate::signal::{InputBits, OutputBits};
use crate::units::AxisId;

/// Transport seam consumed by the controller once per control cycle.
pub trait Wire {
    /// Deliver a signed pulse delta for this cycle. Sign is direction.
    fn write_pulses(&mut self, axis: AxisId, delta: i64);

    /// Latest encoder count for the axis.
    fn read_encoder(&mut self, axis: AxisId) -> i64;

    /// Sample the raw digital input lines.
    fn scan_inputs(&mut self, axis: AxisId) -> InputBits;

    /// Write the output register image.
    fn write_outputs(&mut self, axis: AxisId, outputs: OutputBits);

    /// Submit a drive command frame. The reply is fetched with
    /// [`Wire::poll_drive`]; transports without a drive link keep the
    /// default `Unsupported`.
    fn send_drive(&mut self, _axis: AxisId, _command: &DriveCommand) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Poll for a drive reply submitted earlier. `None` means still
    /// in flight.
    fn poll_drive(&mut self, _axis: AxisId) -> Option<DriveReply> {
        None
    }
}
