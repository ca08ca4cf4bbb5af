//! Detour registration
//!
//! Patching machine code is left to a [`DetourBackend`]. This module finds
//! hook targets by signature, keeps track of what was installed under which
//! [`HookCategory`], and hands out typed [`Hook`]s whose
//! [`original`](Hook::original) calls through the trampoline.
//!
//! Hooks are created disabled. The owner publishes whatever state its detour
//! needs and then calls [`HookManager::activate`].

pub mod load_mtrl_tex;

pub use load_mtrl_tex::{LoadMtrlTex, LoadMtrlTexFn};

use crate::config::{HookCategory, HookSettings};
use crate::platform::Platform;
use crate::signature::Signature;
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A native function pointer type that can be hooked
pub trait HookFn: Copy + Send + Sync + 'static {
    /// Reinterpret a code address as this function type
    ///
    /// # Safety
    /// `address` must be the entry point of a function with exactly this
    /// signature and calling convention.
    unsafe fn from_address(address: usize) -> Self;

    /// Code address of the function
    fn address(self) -> usize;
}

macro_rules! impl_hook_fn {
    ($($arg:ident),*) => {
        impl<Ret: 'static, $($arg: 'static),*> HookFn for extern "C" fn($($arg),*) -> Ret {
            unsafe fn from_address(address: usize) -> Self {
                debug_assert_eq!(std::mem::size_of::<Self>(), std::mem::size_of::<usize>());
                std::mem::transmute_copy(&address)
            }

            fn address(self) -> usize {
                self as usize
            }
        }

        impl<Ret: 'static, $($arg: 'static),*> HookFn for unsafe extern "C" fn($($arg),*) -> Ret {
            unsafe fn from_address(address: usize) -> Self {
                debug_assert_eq!(std::mem::size_of::<Self>(), std::mem::size_of::<usize>());
                std::mem::transmute_copy(&address)
            }

            fn address(self) -> usize {
                self as usize
            }
        }
    };
}

impl_hook_fn!();
impl_hook_fn!(A);
impl_hook_fn!(A, B);
impl_hook_fn!(A, B, C);
impl_hook_fn!(A, B, C, D);
impl_hook_fn!(A, B, C, D, E);
impl_hook_fn!(A, B, C, D, E, G);

/// Backend identifier of an installed detour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DetourId(pub usize);

/// Failure reported by a [`DetourBackend`]
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DetourError(pub String);

/// Something that can redirect native functions
///
/// Implementations patch code in the current process; the manager only ever
/// calls them with addresses it resolved from signatures.
pub trait DetourBackend: Send + Sync {
    /// Prepare a disabled detour from `target` to `detour`
    ///
    /// Returns the detour's id and the address of a trampoline that runs the
    /// unpatched function.
    fn create(&self, target: usize, detour: usize) -> Result<(DetourId, usize), DetourError>;

    /// Start redirecting calls
    fn enable(&self, id: DetourId) -> Result<(), DetourError>;

    /// Stop redirecting calls
    fn disable(&self, id: DetourId) -> Result<(), DetourError>;

    /// Restore the target and free the trampoline
    fn remove(&self, id: DetourId) -> Result<(), DetourError>;
}

impl<T: DetourBackend + ?Sized> DetourBackend for Arc<T> {
    fn create(&self, target: usize, detour: usize) -> Result<(DetourId, usize), DetourError> {
        (**self).create(target, detour)
    }

    fn enable(&self, id: DetourId) -> Result<(), DetourError> {
        (**self).enable(id)
    }

    fn disable(&self, id: DetourId) -> Result<(), DetourError> {
        (**self).disable(id)
    }

    fn remove(&self, id: DetourId) -> Result<(), DetourError> {
        (**self).remove(id)
    }
}

/// A typed hook on one native function
pub struct Hook<F: HookFn> {
    name: String,
    target: usize,
    original: F,
    category: HookCategory,
    id: DetourId,
    enabled: Arc<AtomicBool>,
}

impl<F: HookFn> Hook<F> {
    /// Hook name, for logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of the hooked function
    pub fn target(&self) -> usize {
        self.target
    }

    /// Category the hook was registered under
    pub fn category(&self) -> HookCategory {
        self.category
    }

    /// Whether calls are currently redirected
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// The unpatched function
    #[inline]
    pub fn original(&self) -> F {
        self.original
    }
}

impl<F: HookFn> std::fmt::Debug for Hook<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("target", &format_args!("0x{:X}", self.target))
            .field("category", &self.category)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

struct Registration {
    name: String,
    id: DetourId,
    category: HookCategory,
    enabled: Arc<AtomicBool>,
    activated: bool,
}

/// Installs hooks and switches them by category
pub struct HookManager<P> {
    platform: Arc<P>,
    backend: Box<dyn DetourBackend>,
    settings: RwLock<HookSettings>,
    hooks: Mutex<Vec<Registration>>,
}

impl<P: Platform> HookManager<P> {
    /// Create a manager; `settings` decides which categories start enabled
    pub fn new(platform: Arc<P>, backend: Box<dyn DetourBackend>, settings: HookSettings) -> Self {
        Self {
            platform,
            backend,
            settings: RwLock::new(settings),
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Find `signature` in the game module and prepare a disabled hook on it
    ///
    /// # Safety
    /// `signature` must locate a function whose signature and calling
    /// convention are exactly `F`.
    pub unsafe fn create_hook<F: HookFn>(
        &self,
        name: &str,
        signature: &str,
        detour: F,
        category: HookCategory,
    ) -> Result<Hook<F>> {
        let target = Signature::parse(signature)?.resolve(self.platform.as_ref(), name)?;
        self.create_hook_at(name, target, detour, category)
    }

    /// Prepare a disabled hook on a known address
    ///
    /// # Safety
    /// `target` must be the entry point of a function of type `F`.
    pub unsafe fn create_hook_at<F: HookFn>(
        &self,
        name: &str,
        target: usize,
        detour: F,
        category: HookCategory,
    ) -> Result<Hook<F>> {
        let (id, trampoline) = self
            .backend
            .create(target, detour.address())
            .map_err(|e| hook_error(name, e))?;

        let enabled = Arc::new(AtomicBool::new(false));
        self.hooks.lock().push(Registration {
            name: name.to_string(),
            id,
            category,
            enabled: enabled.clone(),
            activated: false,
        });

        tracing::debug!("Created hook {} on 0x{:X}", name, target);

        Ok(Hook {
            name: name.to_string(),
            target,
            original: F::from_address(trampoline),
            category,
            id,
            enabled,
        })
    }

    /// Let `hook` run; it is enabled now if its category is
    ///
    /// Returns whether the hook is enabled.
    pub fn activate<F: HookFn>(&self, hook: &Hook<F>) -> Result<bool> {
        let enable = self.settings.read().is_enabled(hook.category);
        let mut hooks = self.hooks.lock();
        let registration = hooks
            .iter_mut()
            .find(|r| r.id == hook.id)
            .ok_or_else(|| hook_error(&hook.name, DetourError("not registered".to_string())))?;

        registration.activated = true;
        if enable {
            self.switch(registration, true)?;
        } else {
            tracing::info!("{} stays disabled, {:?} are switched off", hook.name, hook.category);
        }
        Ok(enable)
    }

    /// Enable or disable every activated hook in `category`
    pub fn set_category_enabled(&self, category: HookCategory, enabled: bool) -> Result<()> {
        self.settings.write().set_enabled(category, enabled);

        let mut hooks = self.hooks.lock();
        for registration in hooks
            .iter_mut()
            .filter(|r| r.category == category && r.activated)
        {
            self.switch(registration, enabled)?;
        }
        Ok(())
    }

    /// Whether hooks of `category` are switched on
    pub fn is_category_enabled(&self, category: HookCategory) -> bool {
        self.settings.read().is_enabled(category)
    }

    fn switch(&self, registration: &mut Registration, enabled: bool) -> Result<()> {
        if registration.enabled.load(Ordering::Acquire) == enabled {
            return Ok(());
        }

        let result = if enabled {
            self.backend.enable(registration.id)
        } else {
            self.backend.disable(registration.id)
        };
        result.map_err(|e| hook_error(&registration.name, e))?;

        registration.enabled.store(enabled, Ordering::Release);
        tracing::debug!(
            "{} {}",
            if enabled { "Enabled" } else { "Disabled" },
            registration.name
        );
        Ok(())
    }
}

impl<P> HookManager<P> {
    /// Disable and remove every hook
    ///
    /// Failures are logged; the remaining hooks are still removed.
    pub fn unhook_all(&self) {
        let hooks = std::mem::take(&mut *self.hooks.lock());
        for registration in hooks {
            registration.enabled.store(false, Ordering::Release);
            if let Err(e) = self.backend.disable(registration.id) {
                tracing::warn!("Could not disable {}: {}", registration.name, e);
            }
            if let Err(e) = self.backend.remove(registration.id) {
                tracing::warn!("Could not remove {}: {}", registration.name, e);
            }
        }
    }
}

impl<P> Drop for HookManager<P> {
    fn drop(&mut self) {
        self.unhook_all();
    }
}

fn hook_error(name: &str, e: DetourError) -> Error {
    Error::Hook {
        name: name.to_string(),
        reason: e.0,
    }
}
