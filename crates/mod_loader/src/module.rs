//! Loaded modules, their exported types, and the loaders that produce them.
//!
//! Two loaders are provided: [`DylibLoader`] opens native libraries with
//! `libloading` and reads their `mod_manifest` export, and [`InProcessLoader`]
//! serves modules that are linked into the host binary.

use crate::error::{InitFault, LoadError};
use crate::scanner::ModuleFile;
use libloading::Library;
use mod_api::{
    decode_manifest, ExportDecl, InitFn, ManifestFn, ModManifest, PluginEntry, TypeKind,
    INIT_OK, INIT_PANICKED, INIT_REASON_CAPACITY, MANIFEST_SYMBOL, PLUGIN_ENTRY_MARKER,
};
use std::os::raw::c_char;
use std::any::Any;
use std::collections::HashMap;
use std::ffi::CStr;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Init Hook
// ============================================================================

type InitCall = dyn Fn() -> Result<(), InitFault> + Send + Sync;

/// A plugin type's one-time initializer.
///
/// Clones share the same "fired" flag, so a type is initialized at most once
/// no matter how many descriptors point at it.
#[derive(Clone)]
pub struct InitHook {
    call: Arc<InitCall>,
    fired: Arc<AtomicBool>,
}

impl InitHook {
    pub fn new<F>(call: F) -> Self
    where
        F: Fn() -> Result<(), InitFault> + Send + Sync + 'static,
    {
        Self {
            call: Arc::new(call),
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Initializer for a plugin type linked into the host.
    pub fn from_entry<P: PluginEntry + 'static>() -> Self {
        Self::new(|| P::initialize().map_err(|e| InitFault::Error(e.to_string())))
    }

    /// Initializer exported by a native library. The library stays loaded for
    /// as long as the hook exists.
    fn native(library: Arc<Library>, init: InitFn) -> Self {
        Self::new(move || {
            let _library = &library;
            let mut reason = [0 as c_char; INIT_REASON_CAPACITY];
            let status = unsafe { init(reason.as_mut_ptr(), reason.len()) };
            let reason = unsafe { CStr::from_ptr(reason.as_ptr()) }
                .to_string_lossy()
                .into_owned();

            match status {
                INIT_OK => Ok(()),
                INIT_PANICKED if reason.is_empty() => {
                    Err(InitFault::Panicked("panic caught inside the mod".to_string()))
                }
                INIT_PANICKED => Err(InitFault::Panicked(reason)),
                status => Err(InitFault::Failed { status, reason }),
            }
        })
    }

    /// Runs the initializer unless it already ran. Panics are caught and
    /// reported as [`InitFault::Panicked`].
    pub fn fire(&self) -> Result<(), InitFault> {
        if self.fired.swap(true, Ordering::SeqCst) {
            return Err(InitFault::AlreadyInitialized);
        }

        catch_unwind(AssertUnwindSafe(|| (self.call)()))
            .map_err(|panic| InitFault::Panicked(panic_message(panic)))?
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for InitHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitHook")
            .field("fired", &self.has_fired())
            .finish_non_exhaustive()
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

// ============================================================================
// Exported Types and Modules
// ============================================================================

/// A type exported by a loaded module.
#[derive(Debug, Clone)]
pub struct ExportedType {
    path: String,
    kind: TypeKind,
    markers: Vec<String>,
    init: Option<InitHook>,
}

impl ExportedType {
    pub fn new(path: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            markers: Vec::new(),
            init: None,
        }
    }

    /// A concrete, marked plugin entry point.
    pub fn plugin(path: impl Into<String>, init: InitHook) -> Self {
        Self::new(path, TypeKind::Class)
            .with_marker(PLUGIN_ENTRY_MARKER)
            .with_init(init)
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    pub fn with_init(mut self, init: InitHook) -> Self {
        self.init = Some(init);
        self
    }

    /// Fully-qualified type path
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn simple_name(&self) -> &str {
        simple_name_of(&self.path)
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }

    pub fn init(&self) -> Option<&InitHook> {
        self.init.as_ref()
    }
}

/// Last path segment of a type path, without generics or a `dyn` prefix.
pub fn simple_name_of(path: &str) -> &str {
    let path = path.strip_prefix("dyn ").unwrap_or(path);
    let path = path.split('<').next().unwrap_or(path);
    path.rsplit("::").next().unwrap_or(path)
}

/// A module that loaded fully or partially.
#[derive(Debug)]
pub struct LoadedModule {
    name: String,
    path: PathBuf,
    types: Vec<ExportedType>,
    /// Keeps native code mapped while the module is in use
    _library: Option<Arc<Library>>,
}

impl LoadedModule {
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>, types: Vec<ExportedType>) -> Self {
        Self {
            name: name.into(),
            path: path.as_ref().to_path_buf(),
            types,
            _library: None,
        }
    }

    fn with_library(mut self, library: Arc<Library>) -> Self {
        self._library = Some(library);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exported types in declaration order
    pub fn types(&self) -> &[ExportedType] {
        &self.types
    }
}

/// Loads a module file and reports its exported types.
pub trait ModuleLoader {
    fn load(&self, file: &ModuleFile) -> Result<LoadedModule, LoadError>;
}

// ============================================================================
// Native Loader
// ============================================================================

/// Loads native mods through `libloading`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl DylibLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for DylibLoader {
    fn load(&self, file: &ModuleFile) -> Result<LoadedModule, LoadError> {
        let path = file.path.as_path();
        debug!("Loading mod library from: {}", path.display());

        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::NotAModule {
            path: path.to_path_buf(),
            reason: format!("Failed to load library: {}", e),
        })?;

        let manifest_fn: ManifestFn = unsafe {
            *library
                .get::<ManifestFn>(MANIFEST_SYMBOL.as_bytes())
                .map_err(|e| LoadError::NotAModule {
                    path: path.to_path_buf(),
                    reason: format!("Failed to find {} function: {}", MANIFEST_SYMBOL, e),
                })?
        };

        let manifest = unsafe { read_manifest(path, manifest_fn()) }?;

        let library = Arc::new(library);
        let mut types = Vec::with_capacity(manifest.exports.len());
        let mut causes = Vec::new();

        for decl in manifest.exports {
            match resolve_export(&library, decl) {
                Ok(exported) => types.push(exported),
                Err(cause) => causes.push(cause),
            }
        }

        debug!(
            "Mod {} exports {} resolved type(s)",
            manifest.module,
            types.len()
        );

        let module = LoadedModule::new(manifest.module, path, types).with_library(library);
        if causes.is_empty() {
            Ok(module)
        } else {
            Err(LoadError::PartiallyLoaded { module, causes })
        }
    }
}

/// Decodes the string returned by a module's manifest function.
///
/// # Safety
///
/// `raw` must be null or point to a NUL-terminated string that stays valid for
/// the duration of the call.
unsafe fn read_manifest(path: &Path, raw: *const c_char) -> Result<ModManifest, LoadError> {
    if raw.is_null() {
        return Err(LoadError::Fault {
            path: path.to_path_buf(),
            reason: format!("{} returned null pointer", MANIFEST_SYMBOL),
        });
    }

    let json = CStr::from_ptr(raw).to_str().map_err(|e| LoadError::Fault {
        path: path.to_path_buf(),
        reason: format!("Manifest is not valid UTF-8: {}", e),
    })?;

    decode_manifest(json).map_err(|e| LoadError::Fault {
        path: path.to_path_buf(),
        reason: format!("Malformed manifest: {}", e),
    })
}

/// Resolves one manifest entry against the library's symbol table.
fn resolve_export(library: &Arc<Library>, decl: ExportDecl) -> Result<ExportedType, String> {
    let init = match &decl.init_symbol {
        Some(symbol) => {
            let init: InitFn = unsafe {
                *library.get::<InitFn>(symbol.as_bytes()).map_err(|e| {
                    format!("{}: initializer `{}` not found: {}", decl.path, symbol, e)
                })?
            };
            Some(InitHook::native(library.clone(), init))
        }
        None if decl.kind.is_instantiable() && decl.has_marker(PLUGIN_ENTRY_MARKER) => {
            return Err(format!(
                "{}: plugin entry point exports no initializer",
                decl.path
            ));
        }
        None => None,
    };

    Ok(ExportedType {
        path: decl.path,
        kind: decl.kind,
        markers: decl.markers,
        init,
    })
}

// ============================================================================
// In-Process Loader
// ============================================================================

/// A module linked into the host, served under a file name.
#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    name: String,
    types: Vec<ExportedType>,
    unresolved: Vec<String>,
    fault: Option<String>,
}

impl ModuleDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            unresolved: Vec::new(),
            fault: None,
        }
    }

    /// Exports a [`PluginEntry`] type under its Rust type path.
    pub fn plugin<P: PluginEntry + 'static>(self) -> Self {
        let path = std::any::type_name::<P>();
        self.export(ExportedType::plugin(path, InitHook::from_entry::<P>()))
    }

    pub fn export(mut self, exported: ExportedType) -> Self {
        self.types.push(exported);
        self
    }

    /// Declares an export that fails to resolve, making loads partial.
    pub fn unresolved(mut self, cause: impl Into<String>) -> Self {
        self.unresolved.push(cause.into());
        self
    }

    /// Makes every load of this module fail outright.
    pub fn faulty(mut self, reason: impl Into<String>) -> Self {
        self.fault = Some(reason.into());
        self
    }
}

/// Serves [`ModuleDefinition`]s keyed by module file name.
#[derive(Debug, Default, Clone)]
pub struct InProcessLoader {
    modules: HashMap<String, ModuleDefinition>,
}

impl InProcessLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, file_name: impl Into<String>, module: ModuleDefinition) -> Self {
        self.modules.insert(file_name.into(), module);
        self
    }
}

impl ModuleLoader for InProcessLoader {
    fn load(&self, file: &ModuleFile) -> Result<LoadedModule, LoadError> {
        let file_name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let definition = self
            .modules
            .get(&file_name)
            .ok_or_else(|| LoadError::NotAModule {
                path: file.path.clone(),
                reason: "no linked module is registered under this file name".to_string(),
            })?;

        if let Some(reason) = &definition.fault {
            return Err(LoadError::Fault {
                path: file.path.clone(),
                reason: reason.clone(),
            });
        }

        let module = LoadedModule::new(&definition.name, &file.path, definition.types.clone());
        if definition.unresolved.is_empty() {
            Ok(module)
        } else {
            Err(LoadError::PartiallyLoaded {
                module,
                causes: definition.unresolved.clone(),
            })
        }
    }
}
