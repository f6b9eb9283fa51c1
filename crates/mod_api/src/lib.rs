//! # Mod API
//!
//! The contract between the mod loader and the native modules it discovers.
//!
//! A mod is a dynamic library that exports a single `mod_manifest` symbol. The
//! manifest lists every type the module wants the loader to know about, the
//! markers attached to each type, and the name of the `extern "C"` initializer
//! of each plugin entry point. The loader reads the manifest, resolves the
//! initializer symbols, and decides which types are plugins.
//!
//! ## Writing a mod
//!
//! ```rust,ignore
//! use mod_api::{declare_mod, PluginEntry, PluginError};
//!
//! pub struct WeatherPlugin;
//!
//! impl PluginEntry for WeatherPlugin {
//!     fn initialize() -> Result<(), PluginError> {
//!         // One-time setup
//!         Ok(())
//!     }
//! }
//!
//! declare_mod! {
//!     module: "weather",
//!     plugins: [WeatherPlugin => weather_plugin_init],
//! }
//! ```
//!
//! Type identities come from [`std::any::type_name`], so a plugin's identity
//! is its fully-qualified Rust path (`weather::WeatherPlugin`).

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::ffi::CString;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

/// Name of the manifest symbol every mod exports.
pub const MANIFEST_SYMBOL: &str = "mod_manifest";

/// Marker identifying a type as a plugin entry point.
pub const PLUGIN_ENTRY_MARKER: &str = "plugin_entry";

/// Initializer completed.
pub const INIT_OK: i32 = 0;
/// Initializer returned an error.
pub const INIT_FAILED: i32 = 1;
/// Initializer panicked; the panic was caught at the FFI boundary.
pub const INIT_PANICKED: i32 = 2;

/// Signature of the exported manifest function.
pub type ManifestFn = unsafe extern "C" fn() -> *const c_char;

/// Size of the buffer the loader hands each initializer for its failure reason.
pub const INIT_REASON_CAPACITY: usize = 512;

/// Signature of an exported plugin initializer.
///
/// On failure the initializer writes a NUL-terminated reason into `reason`,
/// which holds `capacity` bytes.
pub type InitFn = unsafe extern "C" fn(reason: *mut c_char, capacity: usize) -> i32;

/// The shape of an exported type as far as the loader cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// A concrete type the loader may initialize.
    Class,
    /// A base type that only exists to be specialized.
    Abstract,
    /// A trait-like contract.
    Interface,
    /// Plain data.
    Struct,
    Enum,
}

impl TypeKind {
    /// Only concrete classes can act as plugin entry points.
    pub fn is_instantiable(&self) -> bool {
        matches!(self, TypeKind::Class)
    }
}

/// One exported type in a module manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDecl {
    /// Fully-qualified type path
    pub path: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub markers: Vec<String>,
    /// Exported `extern "C"` initializer, if the type has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_symbol: Option<String>,
}

impl ExportDecl {
    pub fn new(path: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            markers: Vec::new(),
            init_symbol: None,
        }
    }

    /// A concrete plugin entry point with its initializer symbol.
    pub fn plugin(path: impl Into<String>, init_symbol: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: TypeKind::Class,
            markers: vec![PLUGIN_ENTRY_MARKER.to_string()],
            init_symbol: Some(init_symbol.into()),
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }
}

/// Everything a module tells the loader about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModManifest {
    /// Module name, used for self-exclusion and display fallbacks
    pub module: String,
    pub exports: Vec<ExportDecl>,
}

impl ModManifest {
    pub fn new(module: impl Into<String>, exports: Vec<ExportDecl>) -> Self {
        Self {
            module: module.into(),
            exports,
        }
    }
}

/// Serializes a manifest into the NUL-terminated form returned by `mod_manifest`.
pub fn encode_manifest(manifest: &ModManifest) -> CString {
    let json = serde_json::to_string(manifest).unwrap_or_default();
    CString::new(json).unwrap_or_default()
}

/// Parses the JSON produced by [`encode_manifest`].
pub fn decode_manifest(json: &str) -> Result<ModManifest, serde_json::Error> {
    serde_json::from_str(json)
}

/// Errors a plugin initializer can report.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
    #[error("Missing resource: {0}")]
    MissingResource(String),
}

/// Implemented by every plugin entry point.
///
/// `initialize` is the type's one-time setup. The loader calls it at most once
/// per process, and only when the plugin's toggle is enabled.
pub trait PluginEntry {
    fn initialize() -> Result<(), PluginError>;
}

/// Runs an initializer and converts its outcome into an FFI status code plus
/// the failure reason, if any.
///
/// Panics are caught here so they never unwind across the `extern "C"`
/// boundary.
///
/// # Returns
///
/// * `(INIT_OK, None)` when the initializer succeeded
/// * `(INIT_FAILED, Some(error))` when it returned an error
/// * `(INIT_PANICKED, Some(panic message))` when it panicked
pub fn guard_init<F>(init: F) -> (i32, Option<String>)
where
    F: FnOnce() -> Result<(), PluginError>,
{
    match catch_unwind(AssertUnwindSafe(init)) {
        Ok(Ok(())) => (INIT_OK, None),
        Ok(Err(e)) => (INIT_FAILED, Some(e.to_string())),
        Err(panic) => (INIT_PANICKED, Some(panic_message(panic))),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Copies `reason` into a caller-owned buffer as a NUL-terminated string,
/// truncated to fit. Null or empty buffers are left alone.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `capacity` bytes.
pub unsafe fn write_reason(reason: &str, buffer: *mut c_char, capacity: usize) {
    if buffer.is_null() || capacity == 0 {
        return;
    }

    let bytes = reason.as_bytes();
    let bytes = &bytes[..bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len())];
    let len = bytes.len().min(capacity - 1);

    std::ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buffer, len);
    *buffer.add(len) = 0;
}

/// Exports an `extern "C"` initializer for a [`PluginEntry`] type.
#[macro_export]
macro_rules! plugin_init {
    ($symbol:ident => $plugin:ty) => {
        /// # Safety
        ///
        /// `reason` must be null or valid for writes of `capacity` bytes.
        #[no_mangle]
        pub unsafe extern "C" fn $symbol(
            reason: *mut ::std::os::raw::c_char,
            capacity: usize,
        ) -> i32 {
            let (status, failure) =
                $crate::guard_init(<$plugin as $crate::PluginEntry>::initialize);
            if let Some(failure) = failure {
                $crate::write_reason(&failure, reason, capacity);
            }
            status
        }
    };
}

/// Declares a mod: exports one initializer per plugin plus the `mod_manifest`
/// symbol describing the module.
///
/// ```rust,ignore
/// declare_mod! {
///     module: "greeter",
///     plugins: [GreeterPlugin => greeter_plugin_init],
///     exports: [
///         dyn BaseGreeter: Abstract => mod_api::PLUGIN_ENTRY_MARKER,
///         Formatter: Struct,
///     ],
/// }
/// ```
#[macro_export]
macro_rules! declare_mod {
    (
        module: $module:expr,
        plugins: [ $( $plugin:ty => $symbol:ident ),* $(,)? ]
        $(, exports: [ $( $export:ty : $kind:ident $( => $marker:expr )? ),* $(,)? ] )?
        $(,)?
    ) => {
        $( $crate::plugin_init!($symbol => $plugin); )*

        #[no_mangle]
        pub extern "C" fn mod_manifest() -> *const ::std::os::raw::c_char {
            static MANIFEST: ::std::sync::OnceLock<::std::ffi::CString> =
                ::std::sync::OnceLock::new();

            MANIFEST
                .get_or_init(|| {
                    #[allow(unused_mut)]
                    let mut exports = ::std::vec::Vec::new();
                    $(
                        exports.push($crate::ExportDecl::plugin(
                            ::std::any::type_name::<$plugin>(),
                            stringify!($symbol),
                        ));
                    )*
                    $($(
                        exports.push(
                            $crate::ExportDecl::new(
                                ::std::any::type_name::<$export>(),
                                $crate::TypeKind::$kind,
                            )
                            $( .with_marker($marker) )?
                        );
                    )*)?
                    $crate::encode_manifest(&$crate::ModManifest::new($module, exports))
                })
                .as_ptr()
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Succeeds;
    impl PluginEntry for Succeeds {
        fn initialize() -> Result<(), PluginError> {
            Ok(())
        }
    }

    #[test]
    fn test_manifest_json_shape() {
        let manifest = ModManifest::new(
            "weather",
            vec![
                ExportDecl::plugin("weather::WeatherPlugin", "weather_init"),
                ExportDecl::new("weather::Forecast", TypeKind::Struct),
            ],
        );

        let encoded = encode_manifest(&manifest);
        let json = encoded.to_str().unwrap();
        assert!(json.contains("\"kind\":\"class\""));
        assert!(json.contains("\"plugin_entry\""));

        let decoded = decode_manifest(json).unwrap();
        assert_eq!(decoded, manifest);
        assert!(decoded.exports[0].has_marker(PLUGIN_ENTRY_MARKER));
        assert!(!decoded.exports[1].has_marker(PLUGIN_ENTRY_MARKER));
    }

    #[test]
    fn test_decode_defaults_missing_fields() {
        let decoded =
            decode_manifest(r#"{"module":"m","exports":[{"path":"m::A","kind":"abstract"}]}"#)
                .unwrap();
        assert!(decoded.exports[0].markers.is_empty());
        assert!(decoded.exports[0].init_symbol.is_none());
        assert!(!decoded.exports[0].kind.is_instantiable());
    }

    #[test]
    fn test_guard_init_status_codes() {
        assert_eq!(guard_init(Succeeds::initialize), (INIT_OK, None));
        assert_eq!(
            guard_init(|| Err(PluginError::MissingResource("config".into()))),
            (INIT_FAILED, Some("Missing resource: config".to_string()))
        );
        assert_eq!(guard_init(|| panic!("boom")), (INIT_PANICKED, Some("boom".to_string())));
    }

    #[test]
    fn test_write_reason_truncates_and_terminates() {
        let mut buffer = [0x7f as c_char; 8];
        unsafe { write_reason("a long failure reason", buffer.as_mut_ptr(), buffer.len()) };

        let written = unsafe { std::ffi::CStr::from_ptr(buffer.as_ptr()) };
        assert_eq!(written.to_str().unwrap(), "a long ");

        // Null buffers are ignored
        unsafe { write_reason("ignored", std::ptr::null_mut(), 16) };
    }

    #[test]
    fn test_only_classes_are_instantiable() {
        assert!(TypeKind::Class.is_instantiable());
        for kind in [TypeKind::Abstract, TypeKind::Interface, TypeKind::Struct, TypeKind::Enum] {
            assert!(!kind.is_instantiable());
        }
    }
}
