//! Native Controller Binding
//!
//! This crate is the foreign-function seam between Rust device wrappers and
//! the simulator's native controller library. It provides:
//!
//! - **DeviceTag**: the opaque reference the native layer hands out for a device
//! - **NativeController**: the two native calls the emitter binding depends on
//! - **ControllerLibrary**: a `libloading`-backed implementation over the real
//!   shared library
//!
//! Device wrappers take any `NativeController`, so they can be driven by the
//! real library in a controller process or by a fake in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::ffi::CString;
//! use wb_ffi::{ControllerLibrary, NativeController};
//!
//! let lib = ControllerLibrary::from_env().unwrap();
//! let name = CString::new("emitter").unwrap();
//! let tag = lib.robot_get_device(&name);
//!
//! lib.emitter_send(tag, b"ping\0", 5);
//! ```

pub mod error;
pub mod library;

use std::ffi::CStr;
use std::fmt;
use std::sync::Arc;

pub use error::FfiError;
pub use library::{library_file_name, ControllerLibrary};

/// Raw tag type used by the C API (`WbDeviceTag`)
pub type RawDeviceTag = u16;

/// Opaque reference to a device inside the running simulation
///
/// Tags are handed out by the native layer and never interpreted here. A tag
/// of `0` is what the native layer returns for an unknown device name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceTag(pub RawDeviceTag);

impl DeviceTag {
    /// The tag the native layer reports for a device it could not find
    pub const NULL: DeviceTag = DeviceTag(0);

    /// Returns the raw tag value
    pub fn raw(self) -> RawDeviceTag {
        self.0
    }

    /// Whether this is the native "no such device" tag
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl fmt::Display for DeviceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The native calls a device wrapper forwards to
///
/// Implementations must pass arguments through untouched: no caching of
/// lookups by name, no validation of `length` against `data`.
pub trait NativeController {
    /// Resolve a device name within the running robot (`wb_robot_get_device`)
    fn robot_get_device(&self, name: &CStr) -> DeviceTag;

    /// Transmit `length` bytes of `data` through an emitter (`wb_emitter_send`)
    fn emitter_send(&self, tag: DeviceTag, data: &[u8], length: i32);
}

impl<T: NativeController + ?Sized> NativeController for &T {
    fn robot_get_device(&self, name: &CStr) -> DeviceTag {
        (**self).robot_get_device(name)
    }

    fn emitter_send(&self, tag: DeviceTag, data: &[u8], length: i32) {
        (**self).emitter_send(tag, data, length)
    }
}

impl<T: NativeController + ?Sized> NativeController for Arc<T> {
    fn robot_get_device(&self, name: &CStr) -> DeviceTag {
        (**self).robot_get_device(name)
    }

    fn emitter_send(&self, tag: DeviceTag, data: &[u8], length: i32) {
        (**self).emitter_send(tag, data, length)
    }
}

impl<T: NativeController + ?Sized> NativeController for Box<T> {
    fn robot_get_device(&self, name: &CStr) -> DeviceTag {
        (**self).robot_get_device(name)
    }

    fn emitter_send(&self, tag: DeviceTag, data: &[u8], length: i32) {
        (**self).emitter_send(tag, data, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        names: RefCell<Vec<Vec<u8>>>,
        sends: RefCell<Vec<(DeviceTag, Vec<u8>, i32)>>,
    }

    impl NativeController for Recorder {
        fn robot_get_device(&self, name: &CStr) -> DeviceTag {
            self.names.borrow_mut().push(name.to_bytes_with_nul().to_vec());
            DeviceTag(7)
        }

        fn emitter_send(&self, tag: DeviceTag, data: &[u8], length: i32) {
            self.sends.borrow_mut().push((tag, data.to_vec(), length));
        }
    }

    fn lookup_through<C: NativeController>(controller: C) -> DeviceTag {
        controller.robot_get_device(c"em1")
    }

    #[test]
    fn test_null_tag() {
        assert!(DeviceTag::NULL.is_null());
        assert!(!DeviceTag(3).is_null());
        assert_eq!(DeviceTag(3).raw(), 3);
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(DeviceTag(42).to_string(), "#42");
    }

    #[test]
    fn test_reference_forwards() {
        let recorder = Recorder::default();
        assert_eq!(lookup_through(&recorder), DeviceTag(7));
        assert_eq!(recorder.names.borrow()[0], b"em1\0");
    }

    #[test]
    fn test_box_forwards_send_untouched() {
        let boxed: Box<Recorder> = Box::default();
        boxed.emitter_send(DeviceTag(7), b"abc", 99);

        let sends = boxed.sends.borrow();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0], (DeviceTag(7), b"abc".to_vec(), 99));
    }

    #[test]
    fn test_arc_dyn_forwards() {
        let recorder = Arc::new(Recorder::default());
        let shared: Arc<dyn NativeController> = recorder.clone();
        assert_eq!(lookup_through(shared), DeviceTag(7));
        assert_eq!(recorder.names.borrow().len(), 1);
    }
}
