//! Emitter Device Binding
//!
//! This crate wraps the simulator's emitter device, a radio-like transmitter
//! that sends byte payloads to receivers in the same simulated world.
//!
//! An [`Emitter`] looks up its device once and forwards each send to the
//! native layer through [`wb_ffi::NativeController`]:
//!
//! - **Text** is sent NUL-terminated, with a length of character count + 1
//! - **Bytes** are sent with an explicit length, forwarded untouched
//! - Anything else is rejected without reaching the native layer
//!
//! Rejections come back as [`SendError`]. Callers that want the historical
//! behavior of printing a diagnostic and carrying on can use
//! [`Emitter::send_or_report`].
//!
//! # Example
//!
//! ```rust
//! use wb_emitter::{Emitter, SendError};
//! use wb_sim::SimulatedController;
//!
//! let emitter = Emitter::new(SimulatedController::new(), "emitter").unwrap();
//!
//! emitter.send("hello", None).unwrap();
//! emitter.send(b"\x01\x02", Some(2)).unwrap();
//! assert_eq!(emitter.send(b"\x01\x02", None), Err(SendError::MissingLength));
//!
//! let sent = emitter.controller().sent();
//! assert_eq!(sent[0].length, 6);
//! assert_eq!(sent[1].data, vec![1, 2]);
//! ```

pub mod emitter;
pub mod error;
pub mod payload;

pub use emitter::{Emitter, DIAGNOSTIC_PREFIX};
pub use error::{EmitterError, SendError};
pub use payload::Payload;
pub use wb_ffi::{DeviceTag, NativeController};
