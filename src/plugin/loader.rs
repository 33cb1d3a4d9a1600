//! Plugin module discovery.
//!
//! A module is a file the host can turn into a list of plugin factories.
//! [`DylibModuleLoader`] opens native shared libraries exporting
//! [`ENTRY_SYMBOL`](super::ENTRY_SYMBOL); [`StaticModuleLoader`] maps file
//! stems to factories compiled into the host binary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::contract::Plugin;
use super::{PluginError, PluginResult};

/// Builds plugin instances of one type.
pub trait PluginFactory: Send + Sync {
    /// Name of the plugin type, for logs.
    fn type_name(&self) -> &str;

    /// Create a fresh instance.
    fn create(&self) -> anyhow::Result<Box<dyn Plugin>>;
}

/// Factory for any `Default`-constructible plugin.
pub struct DefaultFactory<P> {
    _marker: std::marker::PhantomData<fn() -> P>,
}

impl<P> DefaultFactory<P> {
    pub fn new() -> Self {
        Self { _marker: std::marker::PhantomData }
    }
}

impl<P> Default for DefaultFactory<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Plugin + Default + 'static> PluginFactory for DefaultFactory<P> {
    fn type_name(&self) -> &str {
        std::any::type_name::<P>()
    }

    fn create(&self) -> anyhow::Result<Box<dyn Plugin>> {
        Ok(Box::new(P::default()))
    }
}

/// The set of factories a module exports.
#[derive(Default)]
pub struct PluginExport {
    factories: Vec<Box<dyn PluginFactory>>,
}

impl PluginExport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory(&mut self, factory: Box<dyn PluginFactory>) -> &mut Self {
        self.factories.push(factory);
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn into_factories(self) -> Vec<Box<dyn PluginFactory>> {
        self.factories
    }
}

/// Declare the entry point of a dynamic plugin module.
///
/// Takes one or more expressions evaluating to [`PluginFactory`] values.
///
/// ```ignore
/// use launcher_host::declare_plugins;
/// use launcher_host::plugin::DefaultFactory;
///
/// declare_plugins!(DefaultFactory::<MyPlugin>::new());
/// ```
#[macro_export]
macro_rules! declare_plugins {
    ($($factory:expr),+ $(,)?) => {
        #[no_mangle]
        pub extern "C" fn launcher_plugin_entrypoint() -> *mut $crate::plugin::PluginExport {
            let mut export = $crate::plugin::PluginExport::new();
            $(export.register_factory(Box::new($factory));)+
            Box::into_raw(Box::new(export))
        }
    };
}

/// Keeps a loaded module alive for as long as any plugin from it exists.
pub struct ModuleHandle {
    path: PathBuf,
    #[cfg(feature = "dylib")]
    _library: Option<libloading::Library>,
}

impl ModuleHandle {
    /// Handle for a module with no native library behind it.
    pub fn detached(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            #[cfg(feature = "dylib")]
            _library: None,
        }
    }

    /// Path the module was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle").field("path", &self.path).finish_non_exhaustive()
    }
}

/// A loaded module: its factories and the handle that keeps them valid.
///
/// Factories are declared first so they drop before the library.
pub struct PluginModule {
    pub factories: Vec<Box<dyn PluginFactory>>,
    pub handle: ModuleHandle,
}

/// Turns module files into plugin factories.
pub trait ModuleLoader: Send + Sync {
    /// Whether `path` looks like a module this loader understands.
    fn is_module(&self, path: &Path) -> bool;

    /// Load the module at `path`.
    fn load(&self, path: &Path) -> PluginResult<PluginModule>;
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

type ModuleBuilder = Arc<dyn Fn() -> PluginExport + Send + Sync>;

/// Loader for modules compiled into the host.
///
/// A file `<plugins>/<stem>.<ext>` selects the module registered under
/// `<stem>`; the file's contents are ignored.
pub struct StaticModuleLoader {
    extension: String,
    modules: HashMap<String, ModuleBuilder>,
}

impl StaticModuleLoader {
    /// Loader matching files with `extension`.
    pub fn new(extension: impl Into<String>) -> Self {
        Self { extension: extension.into(), modules: HashMap::new() }
    }

    /// Register a module under a file stem.
    pub fn register(
        mut self,
        stem: impl Into<String>,
        build: impl Fn() -> PluginExport + Send + Sync + 'static,
    ) -> Self {
        self.modules.insert(stem.into(), Arc::new(build));
        self
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn is_module(&self, path: &Path) -> bool {
        has_extension(path, &self.extension)
    }

    fn load(&self, path: &Path) -> PluginResult<PluginModule> {
        if !path.exists() {
            return Err(PluginError::NotFound(path.to_path_buf()));
        }

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let build = self.modules.get(stem).ok_or_else(|| {
            PluginError::LoadError(format!("no built-in module named '{stem}'"))
        })?;

        Ok(PluginModule { factories: build().into_factories(), handle: ModuleHandle::detached(path) })
    }
}

#[cfg(feature = "dylib")]
pub use dylib::DylibModuleLoader;

#[cfg(feature = "dylib")]
#[allow(unsafe_code)]
mod dylib {
    use std::path::Path;

    use libloading::Library;

    use super::{has_extension, ModuleHandle, ModuleLoader, PluginExport, PluginModule};
    use crate::plugin::{PluginError, PluginResult, ENTRY_SYMBOL};

    type EntryPoint = extern "C" fn() -> *mut PluginExport;

    /// Loader for native shared libraries built with
    /// [`declare_plugins!`](crate::declare_plugins).
    ///
    /// Modules must be built with the same compiler and `launcher-host`
    /// version as the host; the exported factories are Rust trait objects.
    pub struct DylibModuleLoader {
        extension: String,
    }

    impl DylibModuleLoader {
        pub fn new(extension: impl Into<String>) -> Self {
            Self { extension: extension.into() }
        }
    }

    impl Default for DylibModuleLoader {
        fn default() -> Self {
            Self::new(std::env::consts::DLL_EXTENSION)
        }
    }

    impl ModuleLoader for DylibModuleLoader {
        fn is_module(&self, path: &Path) -> bool {
            has_extension(path, &self.extension)
        }

        fn load(&self, path: &Path) -> PluginResult<PluginModule> {
            if !path.exists() {
                return Err(PluginError::NotFound(path.to_path_buf()));
            }

            // SAFETY: loading a library runs its initializers; plugin modules
            // are trusted code with full host privileges.
            let library = unsafe { Library::new(path) }
                .map_err(|e| PluginError::LoadError(format!("{}: {e}", path.display())))?;

            // SAFETY: the symbol type matches the one `declare_plugins!` emits.
            let export = unsafe {
                let entry = library.get::<EntryPoint>(ENTRY_SYMBOL.as_bytes()).map_err(|e| {
                    PluginError::LoadError(format!("missing entry symbol in {}: {e}", path.display()))
                })?;
                let raw = entry();
                if raw.is_null() {
                    return Err(PluginError::LoadError(format!(
                        "entry point in {} returned null",
                        path.display()
                    )));
                }
                Box::from_raw(raw)
            };

            Ok(PluginModule {
                factories: export.into_factories(),
                handle: ModuleHandle { path: path.to_path_buf(), _library: Some(library) },
            })
        }
    }
}

/// Loader used when none is configured.
pub fn default_loader(extension: &str) -> Box<dyn ModuleLoader> {
    #[cfg(feature = "dylib")]
    {
        Box::new(DylibModuleLoader::new(extension))
    }
    #[cfg(not(feature = "dylib"))]
    {
        Box::new(StaticModuleLoader::new(extension))
    }
}
