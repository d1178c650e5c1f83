//! Emitter device handle
//!
//! An [`Emitter`] resolves its device name once and then forwards every send
//! to the native layer. The tag is never revalidated; if the device goes
//! away, what happens is up to the native layer.

use std::ffi::CString;
use std::fmt;
use std::io::{self, Write};

use tracing::{debug, warn};
use wb_ffi::{DeviceTag, NativeController};

use crate::error::{EmitterError, SendError};
use crate::payload::Payload;

/// Prefix of every diagnostic written in compatibility mode
pub const DIAGNOSTIC_PREFIX: &str = "Emitter.send(): ";

/// A simulated radio transmitter bound to one device of the running robot
pub struct Emitter<C: NativeController> {
    name: String,
    tag: DeviceTag,
    controller: C,
}

impl<C: NativeController> fmt::Debug for Emitter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("controller", &"<native>")
            .finish()
    }
}

impl<C: NativeController> Emitter<C> {
    /// Look up the emitter called `name` and bind to it
    ///
    /// The returned tag is stored as-is; a null tag only shows up later as
    /// whatever the native layer does with it.
    pub fn new(controller: C, name: &str) -> Result<Self, EmitterError> {
        let c_name = CString::new(name).map_err(|e| EmitterError::InvalidDeviceName {
            name: name.to_string(),
            position: e.nul_position(),
        })?;

        let tag = controller.robot_get_device(&c_name);
        if tag.is_null() {
            warn!("Device lookup for emitter {:?} returned a null tag", name);
        } else {
            debug!("Bound emitter {:?} to {}", name, tag);
        }

        Ok(Self {
            name: name.to_string(),
            tag,
            controller,
        })
    }

    /// Device name this emitter was created with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native reference obtained at construction
    pub fn tag(&self) -> DeviceTag {
        self.tag
    }

    /// The native layer this emitter forwards to
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Send a message, dispatching on its kind
    ///
    /// - Text is sent NUL-terminated with a length of its character count
    ///   plus one. `length` is ignored.
    /// - Bytes require `length`, which is forwarded untouched.
    /// - Anything else is rejected.
    ///
    /// Rejected messages never reach the native layer.
    pub fn send(&self, message: impl Into<Payload>, length: Option<i32>) -> Result<(), SendError> {
        match message.into() {
            Payload::Text(text) => self.send_text(&text),
            Payload::Bytes(data) => match length {
                Some(length) => {
                    self.send_bytes(&data, length);
                    Ok(())
                }
                None => Err(SendError::MissingLength),
            },
            Payload::Unsupported(type_name) => Err(SendError::UnsupportedType { type_name }),
        }
    }

    /// Send text as a NUL-terminated string
    ///
    /// The length counts characters, not bytes, plus one for the terminator.
    /// The native string handling expects exactly this, so multi-byte text
    /// gets a length shorter than its encoded size.
    pub fn send_text(&self, text: &str) -> Result<(), SendError> {
        let chars = text.chars().count();
        let length = chars
            .checked_add(1)
            .and_then(|n| i32::try_from(n).ok())
            .ok_or(SendError::TextTooLong { chars })?;

        let mut buffer = Vec::with_capacity(text.len() + 1);
        buffer.extend_from_slice(text.as_bytes());
        buffer.push(0);

        debug!("{} sending text, length {}", self.tag, length);
        self.controller.emitter_send(self.tag, &buffer, length);
        Ok(())
    }

    /// Send `length` bytes of `data`
    ///
    /// `length` is not checked against `data.len()`.
    pub fn send_bytes(&self, data: &[u8], length: i32) {
        debug!(
            "{} sending {} byte buffer, length {}",
            self.tag,
            data.len(),
            length
        );
        self.controller.emitter_send(self.tag, data, length);
    }

    /// Send a message, reporting rejections on standard error
    ///
    /// Compatibility mode: the caller never sees a failure, only the
    /// `Emitter.send(): ...` diagnostic line.
    pub fn send_or_report(&self, message: impl Into<Payload>, length: Option<i32>) {
        let stderr = io::stderr();
        self.send_or_report_to(message, length, &mut stderr.lock());
    }

    /// Send a message, reporting rejections to `sink`
    pub fn send_or_report_to<W: Write + ?Sized>(
        &self,
        message: impl Into<Payload>,
        length: Option<i32>,
        sink: &mut W,
    ) {
        if let Err(e) = self.send(message, length) {
            warn!("Emitter {:?} rejected send: {}", self.name, e);
            // Diagnostics are best-effort, like printing to stderr
            let _ = writeln!(sink, "{}{}", DIAGNOSTIC_PREFIX, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::ffi::CStr;

    #[derive(Default)]
    struct FakeController {
        lookups: RefCell<Vec<Vec<u8>>>,
        sends: RefCell<Vec<(DeviceTag, Vec<u8>, i32)>>,
    }

    impl NativeController for FakeController {
        fn robot_get_device(&self, name: &CStr) -> DeviceTag {
            self.lookups.borrow_mut().push(name.to_bytes_with_nul().to_vec());
            DeviceTag(5)
        }

        fn emitter_send(&self, tag: DeviceTag, data: &[u8], length: i32) {
            self.sends.borrow_mut().push((tag, data.to_vec(), length));
        }
    }

    fn emitter() -> Emitter<FakeController> {
        Emitter::new(FakeController::default(), "em1").unwrap()
    }

    #[test]
    fn test_new_looks_up_nul_terminated_name() {
        let em = emitter();
        assert_eq!(em.name(), "em1");
        assert_eq!(em.tag(), DeviceTag(5));
        assert_eq!(em.controller().lookups.borrow()[0], b"em1\0");
    }

    #[test]
    fn test_new_rejects_interior_nul() {
        let err = Emitter::new(FakeController::default(), "em\01").unwrap_err();
        assert_eq!(
            err,
            EmitterError::InvalidDeviceName {
                name: "em\01".to_string(),
                position: 2,
            }
        );
    }

    #[test]
    fn test_text_length_counts_characters() {
        let em = emitter();
        em.send("héllo", None).unwrap();

        let sends = em.controller().sends.borrow();
        let (tag, data, length) = &sends[0];
        assert_eq!(*tag, DeviceTag(5));
        assert_eq!(data, "héllo\0".as_bytes());
        assert_eq!(*length, 6);
    }

    #[test]
    fn test_text_ignores_length_argument() {
        let em = emitter();
        em.send("abc", Some(100)).unwrap();
        assert_eq!(em.controller().sends.borrow()[0].2, 4);
    }

    #[test]
    fn test_empty_text_sends_terminator() {
        let em = emitter();
        em.send_text("").unwrap();
        assert_eq!(em.controller().sends.borrow()[0], (DeviceTag(5), vec![0], 1));
    }

    #[test]
    fn test_bytes_forward_length_untouched() {
        let em = emitter();
        em.send(b"\x01\x02\x03", Some(2)).unwrap();
        em.send(vec![9u8], Some(64)).unwrap();
        em.send_bytes(&[], -1);

        let sends = em.controller().sends.borrow();
        assert_eq!(sends[0], (DeviceTag(5), vec![1, 2, 3], 2));
        assert_eq!(sends[1], (DeviceTag(5), vec![9], 64));
        assert_eq!(sends[2], (DeviceTag(5), vec![], -1));
    }

    #[test]
    fn test_bytes_without_length_rejected() {
        let em = emitter();
        assert_eq!(em.send(b"abc", None), Err(SendError::MissingLength));
        assert!(em.controller().sends.borrow().is_empty());
    }

    #[test]
    fn test_unsupported_rejected() {
        let em = emitter();
        assert_eq!(
            em.send(42i64, Some(8)),
            Err(SendError::UnsupportedType { type_name: "i64" })
        );
        assert!(em.controller().sends.borrow().is_empty());
    }

    #[test]
    fn test_report_writes_diagnostics() {
        let em = emitter();
        let mut sink = Vec::new();

        em.send_or_report_to(b"abc", None, &mut sink);
        em.send_or_report_to(3.5f32, None, &mut sink);
        em.send_or_report_to("fine", None, &mut sink);

        let out = String::from_utf8(sink).unwrap();
        assert_eq!(
            out,
            "Emitter.send(): missing byte buffer length\nEmitter.send(): unsupported data type\n"
        );
        assert_eq!(em.controller().sends.borrow().len(), 1);
    }

    #[test]
    fn test_debug_hides_controller() {
        let em = emitter();
        let debug = format!("{:?}", em);
        assert!(debug.contains("em1"));
        assert!(debug.contains("<native>"));
    }
}
