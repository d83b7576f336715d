// src/introspect.rs

//! SDV module introspection
//!
//! An SDV module is a dynamic library with the `.sdv` extension exporting
//! three C symbols: `GetModuleFactory`, `HasActiveObjects` and
//! `GetManifest`. The embedded component manifest is retrieved by loading
//! the module and calling `GetManifest`; the handle is released before
//! returning on every path (the library unloads on drop).
//!
//! Introspection is never fatal: a file that is not an SDV module, cannot
//! be loaded, or lacks any of the three symbols yields an empty manifest
//! and therefore a module with zero components.
//!
//! Loading a module executes its initialization code. Callers opt into
//! that explicitly with the `trusted` flag; without it every module is
//! treated as having no embedded manifest.

use libloading::{Library, Symbol};
use std::ffi::CStr;
use std::os::raw::{c_char, c_uint, c_void};
use std::path::Path;
use tracing::debug;

/// Extension identifying introspectable modules.
pub const MODULE_EXTENSION: &str = "sdv";

type GetModuleFactoryFn = unsafe extern "C" fn(c_uint) -> *mut c_void;
type HasActiveObjectsFn = unsafe extern "C" fn() -> bool;
type GetManifestFn = unsafe extern "C" fn() -> *const c_char;

/// Read the component manifest embedded in a module binary.
///
/// Returns an empty string unless the file has the `.sdv` extension, the
/// caller passed `trusted`, the module loads, all three introspection
/// symbols resolve, and `GetManifest` returns non-empty UTF-8.
pub fn read_module_manifest(path: &Path, trusted: bool) -> String {
    if path.extension().and_then(|e| e.to_str()) != Some(MODULE_EXTENSION) {
        return String::new();
    }
    if !path.exists() {
        return String::new();
    }
    if !trusted {
        debug!(
            "skipping introspection of {} (module loading not trusted)",
            path.display()
        );
        return String::new();
    }

    // SAFETY: loading runs the module's initializers; the caller accepted
    // that by setting `trusted`. The library handle drops at the end of
    // this scope, releasing the module on every return path.
    let library = match unsafe { Library::new(path) } {
        Ok(lib) => lib,
        Err(e) => {
            debug!("could not load module {}: {}", path.display(), e);
            return String::new();
        }
    };

    // All three symbols must be present for this to count as an SDV module.
    // SAFETY: signatures match the module introspection ABI.
    let factory: Result<Symbol<GetModuleFactoryFn>, _> =
        unsafe { library.get(b"GetModuleFactory\0") };
    let active: Result<Symbol<HasActiveObjectsFn>, _> =
        unsafe { library.get(b"HasActiveObjects\0") };
    let manifest: Result<Symbol<GetManifestFn>, _> = unsafe { library.get(b"GetManifest\0") };

    let (Ok(_factory), Ok(_active), Ok(manifest)) = (factory, active, manifest) else {
        debug!(
            "{} does not export the introspection symbols",
            path.display()
        );
        return String::new();
    };

    // SAFETY: GetManifest returns a NUL-terminated string in static
    // storage, or NULL; the pointer is only read while the library is
    // still loaded.
    let text = unsafe {
        let ptr = manifest();
        if ptr.is_null() {
            return String::new();
        }
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    };

    text
}
