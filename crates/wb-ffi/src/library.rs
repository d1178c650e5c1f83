//! Dynamic binding to the native controller library
//!
//! The controller library ships with the simulator under
//! `<WEBOTS_HOME>/lib/controller/`. Symbols are resolved once when the
//! library is opened and the `Library` is kept alive alongside them.

use std::borrow::Cow;
use std::env;
use std::ffi::{c_char, c_int, c_void, CStr};
use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::{debug, info, trace};

use crate::error::FfiError;
use crate::{DeviceTag, NativeController, RawDeviceTag};

type GetDeviceFn = unsafe extern "C" fn(name: *const c_char) -> RawDeviceTag;
type EmitterSendFn =
    unsafe extern "C" fn(tag: RawDeviceTag, data: *const c_void, size: c_int) -> c_int;
type RobotInitFn = unsafe extern "C" fn() -> c_int;
type RobotStepFn = unsafe extern "C" fn(duration: c_int) -> c_int;
type RobotCleanupFn = unsafe extern "C" fn();

/// File name of the controller library on the current platform
pub fn library_file_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "Controller.dll"
    } else if cfg!(target_os = "macos") {
        "libController.dylib"
    } else {
        "libController.so"
    }
}

/// A loaded native controller library
///
/// Byte sends with a length larger than the payload are zero-padded to that
/// length before crossing into C; see the `emitter_send` implementation.
pub struct ControllerLibrary {
    path: PathBuf,
    get_device: GetDeviceFn,
    emitter_send: EmitterSendFn,
    robot_init: Option<RobotInitFn>,
    robot_step: Option<RobotStepFn>,
    robot_cleanup: Option<RobotCleanupFn>,
    // Must outlive every function pointer above
    _library: Library,
}

impl std::fmt::Debug for ControllerLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerLibrary")
            .field("path", &self.path)
            .field("library", &"<native>")
            .finish()
    }
}

impl ControllerLibrary {
    /// Load the controller library from an explicit file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FfiError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(FfiError::LibraryNotFound(path));
        }

        // SAFETY: loading the controller library runs its initializers, which
        // is the documented way of using it from a controller process.
        let library = unsafe { Library::new(&path) }.map_err(|source| FfiError::Load {
            path: path.clone(),
            source,
        })?;

        // SAFETY: the signatures match the declarations in the controller's
        // C headers.
        let (get_device, emitter_send, robot_init, robot_step, robot_cleanup) = unsafe {
            (
                required::<GetDeviceFn>(&library, "wb_robot_get_device")?,
                required::<EmitterSendFn>(&library, "wb_emitter_send")?,
                optional::<RobotInitFn>(&library, "wb_robot_init"),
                optional::<RobotStepFn>(&library, "wb_robot_step"),
                optional::<RobotCleanupFn>(&library, "wb_robot_cleanup"),
            )
        };

        info!("Loaded controller library {}", path.display());

        Ok(Self {
            path,
            get_device,
            emitter_send,
            robot_init,
            robot_step,
            robot_cleanup,
            _library: library,
        })
    }

    /// Load the controller library from a simulator installation directory
    pub fn from_webots_home(home: impl AsRef<Path>) -> Result<Self, FfiError> {
        Self::open(Self::path_in_home(home))
    }

    /// Load the controller library from the installation named by `WEBOTS_HOME`
    pub fn from_env() -> Result<Self, FfiError> {
        let home = env::var_os("WEBOTS_HOME").ok_or(FfiError::WebotsHomeUnset)?;
        Self::from_webots_home(home)
    }

    /// Path of the controller library inside an installation directory
    pub fn path_in_home(home: impl AsRef<Path>) -> PathBuf {
        home.as_ref()
            .join("lib")
            .join("controller")
            .join(library_file_name())
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Attach this process to the simulation (`wb_robot_init`)
    pub fn robot_init(&self) -> Result<i32, FfiError> {
        let init = self.robot_init.ok_or(FfiError::MissingSymbol("wb_robot_init"))?;
        // SAFETY: takes no arguments; resolved from the loaded library.
        Ok(unsafe { init() })
    }

    /// Advance the simulation by `duration_ms` (`wb_robot_step`)
    ///
    /// Returns `-1` once the simulator has asked the controller to quit.
    pub fn robot_step(&self, duration_ms: i32) -> Result<i32, FfiError> {
        let step = self.robot_step.ok_or(FfiError::MissingSymbol("wb_robot_step"))?;
        // SAFETY: plain integer argument.
        Ok(unsafe { step(duration_ms) })
    }

    /// Detach from the simulation (`wb_robot_cleanup`)
    pub fn robot_cleanup(&self) -> Result<(), FfiError> {
        let cleanup = self
            .robot_cleanup
            .ok_or(FfiError::MissingSymbol("wb_robot_cleanup"))?;
        // SAFETY: takes no arguments; resolved from the loaded library.
        unsafe { cleanup() };
        Ok(())
    }
}

impl NativeController for ControllerLibrary {
    fn robot_get_device(&self, name: &CStr) -> DeviceTag {
        // SAFETY: `name` is NUL-terminated and outlives the call.
        let raw = unsafe { (self.get_device)(name.as_ptr()) };
        DeviceTag(raw)
    }

    /// Forward a send to `wb_emitter_send`
    ///
    /// When `length` exceeds `data.len()`, the payload is first copied into a
    /// zero-filled buffer of `length` bytes so the native side only reads
    /// Rust-owned memory. That copy is made on every such call: a one-byte
    /// payload sent with `i32::MAX` allocates and clears about 2 GiB. Pass
    /// lengths that match the data to stay on the borrowed, copy-free path.
    fn emitter_send(&self, tag: DeviceTag, data: &[u8], length: i32) {
        let buffer = readable_buffer(data, length);
        // SAFETY: `buffer` holds at least `length` bytes when `length` is
        // positive, so the native side stays inside Rust-owned memory.
        let status = unsafe { (self.emitter_send)(tag.raw(), buffer.as_ptr().cast(), length) };
        trace!("wb_emitter_send({}, {} bytes) returned {}", tag, length, status);
    }
}

#[cfg(all(test, unix))]
impl ControllerLibrary {
    /// Build a library around in-process functions with the native signatures
    fn with_symbols(get_device: GetDeviceFn, emitter_send: EmitterSendFn) -> Self {
        Self {
            path: PathBuf::from("<in-process>"),
            get_device,
            emitter_send,
            robot_init: None,
            robot_step: None,
            robot_cleanup: None,
            _library: libloading::os::unix::Library::this().into(),
        }
    }
}

/// Extend `data` with zeros so that `length` bytes can be read from it
///
/// The length handed to C is never changed; only the memory behind the
/// pointer grows.
pub(crate) fn readable_buffer(data: &[u8], length: i32) -> Cow<'_, [u8]> {
    let wanted = usize::try_from(length).unwrap_or(0);
    if wanted <= data.len() {
        return Cow::Borrowed(data);
    }

    debug!(
        "Padding {}-byte payload to requested length {}",
        data.len(),
        wanted
    );
    let mut padded = Vec::with_capacity(wanted);
    padded.extend_from_slice(data);
    padded.resize(wanted, 0);
    Cow::Owned(padded)
}

/// # Safety
///
/// `T` must be the exact function pointer type of the exported symbol.
unsafe fn required<T: Copy>(library: &Library, name: &'static str) -> Result<T, FfiError> {
    optional(library, name).ok_or(FfiError::MissingSymbol(name))
}

/// # Safety
///
/// `T` must be the exact function pointer type of the exported symbol.
unsafe fn optional<T: Copy>(library: &Library, name: &'static str) -> Option<T> {
    library.get::<T>(name.as_bytes()).ok().map(|symbol| *symbol)
}


#[cfg(all(test, unix))]
mod native_call_tests {
    use super::*;
    use std::cell::RefCell;

    type SendLog = Vec<(RawDeviceTag, Vec<u8>, c_int)>;

    thread_local! {
        static LOOKUPS: RefCell<Vec<Vec<u8>>> = const { RefCell::new(Vec::new()) };
        static SENDS: RefCell<SendLog> = const { RefCell::new(Vec::new()) };
    }

    unsafe extern "C" fn fake_get_device(name: *const c_char) -> RawDeviceTag {
        let name = unsafe { CStr::from_ptr(name) };
        LOOKUPS.with(|l| l.borrow_mut().push(name.to_bytes_with_nul().to_vec()));
        3
    }

    unsafe extern "C" fn fake_emitter_send(
        tag: RawDeviceTag,
        data: *const c_void,
        size: c_int,
    ) -> c_int {
        // Reads exactly `size` bytes, the way the controller library does
        let len = usize::try_from(size).unwrap_or(0);
        let bytes = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) };
        SENDS.with(|s| s.borrow_mut().push((tag, bytes.to_vec(), size)));
        1
    }

    fn library() -> ControllerLibrary {
        LOOKUPS.with(|l| l.borrow_mut().clear());
        SENDS.with(|s| s.borrow_mut().clear());
        ControllerLibrary::with_symbols(fake_get_device, fake_emitter_send)
    }

    fn sends() -> SendLog {
        SENDS.with(|s| s.borrow().clone())
    }

    #[test]
    fn test_lookup_passes_nul_terminated_name() {
        let lib = library();
        let tag = lib.robot_get_device(c"em1");

        assert_eq!(tag, DeviceTag(3));
        LOOKUPS.with(|l| assert_eq!(l.borrow()[0], b"em1\0"));
    }

    #[test]
    fn test_send_passes_tag_data_and_length() {
        let lib = library();
        lib.emitter_send(DeviceTag(3), b"hi\0", 3);

        assert_eq!(sends(), vec![(3, b"hi\0".to_vec(), 3)]);
    }

    #[test]
    fn test_send_with_long_length_reads_padding() {
        let lib = library();
        lib.emitter_send(DeviceTag(3), b"x", 4);

        assert_eq!(sends(), vec![(3, b"x\0\0\0".to_vec(), 4)]);
    }

    #[test]
    fn test_send_with_short_length_reads_prefix() {
        let lib = library();
        lib.emitter_send(DeviceTag(9), b"abcdef", 2);

        assert_eq!(sends(), vec![(9, b"ab".to_vec(), 2)]);
    }

    #[test]
    fn test_missing_lifecycle_symbols() {
        let lib = library();

        assert!(matches!(
            lib.robot_step(32),
            Err(FfiError::MissingSymbol("wb_robot_step"))
        ));
        assert!(matches!(
            lib.robot_cleanup(),
            Err(FfiError::MissingSymbol("wb_robot_cleanup"))
        ));
    }
}
