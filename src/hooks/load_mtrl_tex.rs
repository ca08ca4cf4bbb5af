//! Hook on `MaterialResourceHandle::LoadTextures`
//!
//! The game loads a material's textures from inside this call. Textures are
//! sub-files of the material, so they must resolve through the collection
//! the material itself was resolved through. The detour makes that
//! collection the current material context for the duration of the call.

use super::{Hook, HookManager};
use crate::config::HookCategory;
use crate::interop::layout::MaterialResourceHandle;
use crate::interop::{with_load_context, GameState};
use crate::platform::Platform;
use crate::signature::sigs;
use crate::{Error, Result};
use std::sync::{Arc, OnceLock};

/// Native signature of the hooked function
pub type LoadMtrlTexFn = unsafe extern "C" fn(*mut MaterialResourceHandle) -> u8;

static INSTANCE: OnceLock<LoadMtrlTex> = OnceLock::new();

/// The installed material texture load hook
#[derive(Debug)]
pub struct LoadMtrlTex {
    state: Arc<GameState>,
    hook: Hook<LoadMtrlTexFn>,
}

impl LoadMtrlTex {
    /// Hook name
    pub const NAME: &'static str = "Load Material Textures";
    /// Hook category
    pub const CATEGORY: HookCategory = HookCategory::ResourceHooks;

    /// Install the hook; there is at most one per process
    pub fn install<P: Platform>(hooks: &HookManager<P>, state: Arc<GameState>) -> Result<&'static Self> {
        if INSTANCE.get().is_some() {
            return Err(already_installed());
        }

        // Safety: LOAD_MTRL_TEX locates MaterialResourceHandle::LoadTextures,
        // which has the LoadMtrlTexFn signature.
        let hook = unsafe {
            hooks.create_hook::<LoadMtrlTexFn>(
                Self::NAME,
                sigs::LOAD_MTRL_TEX,
                load_mtrl_tex_detour,
                Self::CATEGORY,
            )?
        };

        // The detour reads INSTANCE, so it must be set before the hook can fire.
        INSTANCE
            .set(Self { state, hook })
            .map_err(|_| already_installed())?;
        let instance = INSTANCE.get().ok_or_else(already_installed)?;

        hooks.activate(&instance.hook)?;
        Ok(instance)
    }

    /// The installed hook, if any
    pub fn get() -> Option<&'static Self> {
        INSTANCE.get()
    }

    /// Hook handle
    pub fn hook(&self) -> &Hook<LoadMtrlTexFn> {
        &self.hook
    }

    /// Shared state the detour reads
    pub fn state(&self) -> &GameState {
        &self.state
    }

    #[inline]
    fn detour(&self, handle: *mut MaterialResourceHandle) -> u8 {
        let original = self.hook.original();
        // Safety: the trampoline runs the unpatched function with the
        // arguments the game passed in.
        with_load_context(&self.state, handle as usize, || unsafe { original(handle) })
    }
}

unsafe extern "C" fn load_mtrl_tex_detour(handle: *mut MaterialResourceHandle) -> u8 {
    match INSTANCE.get() {
        Some(hook) => hook.detour(handle),
        None => {
            tracing::error!("{} fired before it was installed", LoadMtrlTex::NAME);
            0
        }
    }
}

fn already_installed() -> Error {
    Error::Hook {
        name: LoadMtrlTex::NAME.to_string(),
        reason: "already installed".to_string(),
    }
}
