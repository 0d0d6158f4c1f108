//! # RedLilium XR
//!
//! Bridges an asynchronous, callback-driven XR runtime (WebXR in the browser)
//! to the synchronous begin-frame / render / end-frame loop the engine runs
//! every tick.
//!
//! ## Overview
//!
//! - [`XrContext`] - Owns the runtime and the single session slot
//! - [`XrSession`] - Handle to the active session; state is polled, never awaited
//! - [`XrFrame`] - Per-tick view data, up to two views (stereo)
//! - [`XrRuntime`] - Trait implemented by runtimes: [`DummyRuntime`] for tests,
//!   `WebXrRuntime` on wasm32 with the `webxr` feature
//! - [`XrSessionDriver`] - Optional helper running the per-tick sequence
//!
//! ## Usage
//!
//! 1. Check [`XrContext::is_available`]
//! 2. Request a session with [`XrContext::request_session`] from a user gesture
//! 3. Poll [`XrContext::session_state`] every tick
//! 4. While renderable, call [`XrContext::begin_frame`] / [`XrContext::end_frame`]
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_xr::{DummyRuntime, ReferenceSpaceType, SessionMode, XrContext};
//!
//! let context = XrContext::new(DummyRuntime::stereo());
//! let session = context.request_session(SessionMode::ImmersiveVr, ReferenceSpaceType::LocalFloor)?;
//! context.runtime().complete_start("local-floor");
//!
//! let frame = context.begin_frame(&session)?;
//! for view in frame.views() {
//!     // set viewport, upload view.projection / view.view, draw
//! }
//! context.end_frame(&session);
//! context.end_session(session).ok();
//! ```

pub mod context;
pub mod device;
pub mod driver;
pub mod error;
pub mod frame;
pub mod mode_support;
pub mod runtime;
pub mod session;
pub mod types;

// Web-specific modules
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use context::XrContext;
pub use device::XrGpuDevice;
pub use driver::{DriverTick, XrSessionDriver};
pub use error::{XrError, XrResult};
pub use frame::{Viewport, XrFrame, XrView, MAX_VIEWS};
pub use mode_support::ModeProbe;
pub use runtime::dummy::DummyRuntime;
#[cfg(all(target_arch = "wasm32", feature = "webxr"))]
pub use runtime::web::WebXrRuntime;
pub use runtime::{SessionRequest, ViewTarget, XrRuntime};
pub use session::{SessionEvents, XrSession};
pub use types::{
    FramebufferHandle, GpuApi, ModeSupport, ReferenceSpaceType, SessionMode, SessionState,
    TextureHandle, Visibility,
};

/// XR library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for an [`XrContext`]
#[derive(Debug, Clone)]
pub struct XrConfig {
    /// Answer `is_mode_supported(ImmersiveVr)` gives while its probe is in flight
    pub assume_immersive_vr: bool,
    /// Warn (once per session) when a frame is built with zero-filled views
    pub warn_on_degraded_views: bool,
}

impl Default for XrConfig {
    fn default() -> Self {
        Self {
            assume_immersive_vr: true,
            warn_on_degraded_views: true,
        }
    }
}

// Web initialization helper
#[cfg(target_arch = "wasm32")]
pub fn init_web_logging() {
    // Set up panic hook for better error messages in console
    console_error_panic_hook::set_once();
    // A second init (hot reload, several contexts) keeps the first logger
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("Console logger already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_config() {
        let config = XrConfig::default();
        assert!(config.assume_immersive_vr);
        assert!(config.warn_on_degraded_views);
    }
}
