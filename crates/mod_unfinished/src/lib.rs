//! A mod that only half exists.
//!
//! Its manifest lists one working plugin, one plugin that refuses to start,
//! several plugins whose initializers were never compiled in, and a plugin
//! entry point with no initializer at all. Loading it yields a partially
//! loaded module with more unresolved types than the loader reports.

use mod_api::{
    encode_manifest, plugin_init, ExportDecl, ModManifest, PluginEntry, PluginError, TypeKind,
    PLUGIN_ENTRY_MARKER,
};
use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::OnceLock;

/// Initializers listed in the manifest but missing from the library.
pub const MISSING_INITIALIZERS: usize = 6;

/// Starts normally.
pub struct Survivor;

impl PluginEntry for Survivor {
    fn initialize() -> Result<(), PluginError> {
        Ok(())
    }
}

/// Refuses to start without its data file.
pub struct Refuser;

impl PluginEntry for Refuser {
    fn initialize() -> Result<(), PluginError> {
        Err(PluginError::MissingResource("refuser.dat".to_string()))
    }
}

plugin_init!(survivor_init => Survivor);
plugin_init!(refuser_init => Refuser);

fn manifest() -> ModManifest {
    let mut exports = vec![
        ExportDecl::plugin(std::any::type_name::<Survivor>(), "survivor_init"),
        ExportDecl::plugin(std::any::type_name::<Refuser>(), "refuser_init"),
    ];
    for i in 0..MISSING_INITIALIZERS {
        exports.push(ExportDecl::plugin(
            format!("mod_unfinished::Ghost{}", i),
            format!("ghost_{}_init", i),
        ));
    }
    exports.push(
        ExportDecl::new("mod_unfinished::Hollow", TypeKind::Class).with_marker(PLUGIN_ENTRY_MARKER),
    );
    ModManifest::new("unfinished", exports)
}

#[no_mangle]
pub extern "C" fn mod_manifest() -> *const c_char {
    static MANIFEST: OnceLock<CString> = OnceLock::new();
    MANIFEST.get_or_init(|| encode_manifest(&manifest())).as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mod_api::{decode_manifest, INIT_FAILED, INIT_REASON_CAPACITY};
    use std::ffi::CStr;

    #[test]
    fn test_manifest_outnumbers_exported_initializers() {
        let raw = unsafe { CStr::from_ptr(mod_manifest()) };
        let manifest = decode_manifest(raw.to_str().unwrap()).unwrap();

        assert_eq!(manifest.module, "unfinished");
        assert_eq!(manifest.exports.len(), 2 + MISSING_INITIALIZERS + 1);
        assert!(manifest.exports.last().unwrap().init_symbol.is_none());
    }

    #[test]
    fn test_refuser_writes_its_reason() {
        let mut reason = [0 as c_char; INIT_REASON_CAPACITY];
        let status = unsafe { refuser_init(reason.as_mut_ptr(), reason.len()) };
        let reason = unsafe { CStr::from_ptr(reason.as_ptr()) };

        assert_eq!(status, INIT_FAILED);
        assert_eq!(reason.to_str().unwrap(), "Missing resource: refuser.dat");
    }
}
