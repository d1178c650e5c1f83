//! Recording controller simulation
//!
//! Behaves like the native layer from the caller's point of view: every
//! lookup returns a fresh tag and every send is accepted. Nothing is cached
//! by name, so two lookups of the same device yield two different tags.

use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wb_ffi::{DeviceTag, NativeController, RawDeviceTag};

/// A device lookup as seen by the native layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    /// Name bytes exactly as received, including the terminating NUL
    pub name: Vec<u8>,
    /// Tag handed back to the caller
    pub tag: DeviceTag,
}

/// One emitter send as seen by the native layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentFrame {
    /// Emitter the payload was sent through
    pub tag: DeviceTag,
    /// Payload bytes exactly as received
    pub data: Vec<u8>,
    /// Length argument exactly as received
    pub length: i32,
}

impl SentFrame {
    /// Decode a NUL-terminated text payload
    ///
    /// Returns `None` when the payload does not end in a NUL byte or is not
    /// valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        let (last, body) = self.data.split_last()?;
        if *last != 0 {
            return None;
        }
        std::str::from_utf8(body).ok()
    }
}

#[derive(Debug)]
struct SimState {
    next_tag: RawDeviceTag,
    lookups: Vec<Lookup>,
    sent: Vec<SentFrame>,
    names: HashMap<DeviceTag, String>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            next_tag: 1,
            lookups: Vec::new(),
            sent: Vec::new(),
            names: HashMap::new(),
        }
    }
}

/// A simulated native controller library
#[derive(Debug, Default)]
pub struct SimulatedController {
    /// Device names that exist in the simulated robot
    devices: Vec<String>,
    /// Resolve unknown names to the null tag instead of a fresh one
    strict: bool,
    state: Mutex<SimState>,
}

impl SimulatedController {
    /// Create a simulated controller that resolves any device name
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a device present in the simulated robot
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.devices.push(name.into());
        self
    }

    /// Only resolve declared devices; everything else gets the null tag
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Every lookup received so far, in order
    pub fn lookups(&self) -> Vec<Lookup> {
        self.lock().lookups.clone()
    }

    /// Every send received so far, in order
    pub fn sent(&self) -> Vec<SentFrame> {
        self.lock().sent.clone()
    }

    /// Drain the recorded sends
    pub fn take_sent(&self) -> Vec<SentFrame> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Number of sends received so far
    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }

    /// Name a tag was issued for, if it was issued by this controller
    pub fn device_name(&self, tag: DeviceTag) -> Option<String> {
        self.lock().names.get(&tag).cloned()
    }

    /// Forget all recorded traffic; issued tags are never reused
    pub fn clear(&self) {
        let mut state = self.lock();
        state.lookups.clear();
        state.sent.clear();
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_known(&self, name: &str) -> bool {
        !self.strict || self.devices.iter().any(|d| d == name)
    }
}

impl NativeController for SimulatedController {
    fn robot_get_device(&self, name: &CStr) -> DeviceTag {
        let device_name = name.to_string_lossy().into_owned();
        let mut state = self.lock();

        let tag = if !self.is_known(&device_name) {
            warn!("Simulated robot has no device named {:?}", device_name);
            DeviceTag::NULL
        } else if state.next_tag == RawDeviceTag::MAX {
            warn!("Simulated controller ran out of device tags");
            DeviceTag::NULL
        } else {
            let tag = DeviceTag(state.next_tag);
            state.next_tag += 1;
            state.names.insert(tag, device_name.clone());
            tag
        };

        debug!("Simulated lookup {:?} -> {}", device_name, tag);
        state.lookups.push(Lookup {
            name: name.to_bytes_with_nul().to_vec(),
            tag,
        });
        tag
    }

    fn emitter_send(&self, tag: DeviceTag, data: &[u8], length: i32) {
        debug!(
            "Simulated send on {}: {} bytes, length {}",
            tag,
            data.len(),
            length
        );
        self.lock().sent.push(SentFrame {
            tag,
            data: data.to_vec(),
            length,
        });
    }
}
