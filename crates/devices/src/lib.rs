//! Host-side device emulation for the target bridge.
//!
//! A simulated processor issues numbered commands over a narrow channel; the
//! devices here service them by reading and writing target memory (through
//! [`tether_memory::TargetMemory`]) and performing real host I/O. The
//! [`DeviceRegistry`] routes each command to a [`Device`] by id; the device
//! indexes its [`CommandTable`] by command id. Stateful devices (console,
//! stream) make deferred progress in `tick`, which the scheduling loop calls
//! once per cycle.
//!
//! Everything is single-threaded and cooperative: no handler blocks, socket
//! I/O is non-blocking, and "no progress yet" is encoded in the protocol
//! (zero-size descriptors, queued reads) rather than surfaced as an error.

#![deny(unsafe_code)]

pub mod command;
pub mod console;
pub mod device;
pub mod disk;
pub mod error;
pub mod registry;
pub mod request;
pub mod stream;

mod sys;

pub use command::{Command, Responder, IDENTITY_SIZE, MAX_COMMANDS, MAX_DEVICES};
pub use console::{ConsoleBackend, ConsoleDevice, StdioConsole};
pub use device::{CommandTable, Device, Handler, NullDevice, IDENTIFY_COMMAND};
pub use disk::DiskDevice;
pub use error::{DeviceError, Result};
pub use registry::DeviceRegistry;
pub use request::{Request, REQUEST_SIZE};
pub use stream::{StreamDevice, StreamPoll};
