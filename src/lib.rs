//! resource-lens: live resource dependency trees for a running game client
//!
//! The library is loaded into the game process. It hooks the native
//! "load material textures" routine to know which collection a nested
//! texture load belongs to, and it walks the game's object table to show
//! which models, materials and textures every character currently has
//! loaded, where each one nominally comes from and where it really resolved.
//!
//! # Architecture
//!
//! - **Platform Layer**: reads host memory, lists modules, scans for code patterns
//! - **Signatures**: byte signatures locating native functions
//! - **Hooks**: detour registration and the material load hook
//! - **Interop**: load context, game state, native layouts, the object table
//! - **Resource Tree**: the tree model and the builder walking native handles
//! - **Viewer**: headless table model with snapshot caching for a UI

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod hooks;
pub mod interop;
pub mod platform;
pub mod resource_tree;
pub mod signature;
pub mod viewer;

// Re-export commonly used types
pub use config::{HookCategory, Settings};
pub use hooks::{HookManager, LoadMtrlTex};
pub use platform::{MemoryReader, Platform};
pub use resource_tree::{Node, ResourceTree, ResourceTreeFactory, ResourceType};
pub use viewer::ResourceTreeViewer;

/// Result type used throughout the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for resource-lens
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Platform-specific error
    #[error("Platform error: {0}")]
    Platform(#[from] platform::PlatformError),

    /// A native handle that must not be null was null
    #[error("Null {0} handle")]
    NullHandle(&'static str),

    /// Reading a native structure failed partway through a walk
    #[error("Could not read {what} at 0x{address:X}: {source}")]
    Walk {
        /// What was being read (e.g., "material")
        what: &'static str,
        /// Address of the structure
        address: usize,
        /// The underlying read failure
        #[source]
        source: platform::PlatformError,
    },

    /// Malformed signature string
    #[error("Invalid signature \"{signature}\": {reason}")]
    InvalidSignature {
        /// The signature text
        signature: String,
        /// What is wrong with it
        reason: String,
    },

    /// Signature has no match in the game module
    #[error("Signature for {name} not found in {module}")]
    SignatureNotFound {
        /// Name of the hook or function being looked up
        name: String,
        /// Module that was scanned
        module: String,
    },

    /// The detour facility refused an operation
    #[error("Hook \"{name}\" failed: {reason}")]
    Hook {
        /// Name of the hook
        name: String,
        /// Why it failed
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging for the library
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("resource_lens=info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();
}
