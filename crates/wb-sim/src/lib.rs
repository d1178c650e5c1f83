//! Simulated Controller Library
//!
//! This crate provides an in-process stand-in for the simulator's native
//! controller library, so device wrappers can be exercised without a running
//! simulation:
//!
//! - **SimulatedController**: hands out device tags and records every lookup
//!   and every emitter send exactly as it was received
//!
//! # Example
//!
//! ```rust
//! use wb_ffi::NativeController;
//! use wb_sim::SimulatedController;
//!
//! let sim = SimulatedController::new();
//! let tag = sim.robot_get_device(c"emitter");
//! sim.emitter_send(tag, b"hi\0", 3);
//!
//! let frame = sim.take_sent().remove(0);
//! assert_eq!(frame.length, 3);
//! assert_eq!(frame.as_text(), Some("hi"));
//! ```

pub mod controller;

pub use controller::{Lookup, SentFrame, SimulatedController};
