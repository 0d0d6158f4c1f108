//! XR runtime abstraction layer.
//!
//! The runtime is the hosting environment that actually owns the XR session.
//! It is asynchronous and callback driven; [`XrContext`](crate::XrContext)
//! turns it into something a render loop can poll.
//!
//! # Available Runtimes
//!
//! - `dummy`: Scriptable in-process runtime for tests and headless hosts
//! - `web` (wasm32 + `webxr` feature): Browser runtime over `navigator.xr`
//!
//! # Callbacks
//!
//! Runtimes report lifecycle changes through the [`SessionEvents`] handed to
//! [`XrRuntime::initialize`] and answer mode probes through [`ModeProbe`].
//! The context never holds a lock while calling into a runtime, so both may be
//! used synchronously from inside any trait method.

pub mod dummy;

#[cfg(all(target_arch = "wasm32", feature = "webxr"))]
pub mod web;

pub use crate::mode_support::ModeProbe;
pub use crate::session::SessionEvents;

use crate::frame::Viewport;
use crate::types::{
    FramebufferHandle, GpuApi, ReferenceSpaceType, SessionMode, SessionState, TextureHandle,
};

/// Parameters of a session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRequest {
    pub mode: SessionMode,
    pub reference_space: ReferenceSpaceType,
}

/// Which transform to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTarget {
    /// The viewer pose, not tied to a specific eye
    Head,
    /// One eye, by view index
    Eye(usize),
}

/// Interface every XR runtime implements.
///
/// Queries are independently failable: `None` means the environment could not
/// answer this tick (pose not tracked, no layer yet, no session).
pub trait XrRuntime {
    /// Get the runtime name
    fn name(&self) -> &'static str;

    /// Capability probe, no side effects
    fn is_supported(&self) -> bool;

    /// Ask asynchronously whether a mode is supported; answer via `probe.resolve`
    fn probe_session_mode(&self, probe: ModeProbe);

    /// Start a session; lifecycle changes are reported through `events`
    fn initialize(&self, request: SessionRequest, events: SessionEvents);

    /// Stop the session and release runtime-side resources
    fn uninitialize(&self);

    /// Authoritative session state
    fn session_state(&self) -> SessionState;

    /// Number of views this tick, zero or negative when there is no frame
    fn view_count(&self) -> i32;

    /// Column-major projection matrix for an eye
    fn projection_for_view(&self, index: usize) -> Option<[f32; 16]>;

    /// Column-major view matrix for an eye or the head
    fn transform_for_view(&self, target: ViewTarget) -> Option<[f32; 16]>;

    /// Viewport rectangle for an eye
    fn viewport_for_view(&self, index: usize) -> Option<Viewport>;

    /// Predicted display time of the current frame
    fn predicted_display_time(&self) -> Option<f64>;

    /// Recommended render target size in pixels
    fn render_target_size(&self) -> Option<(u32, u32)>;

    fn framebuffer(&self) -> Option<FramebufferHandle>;

    fn color_texture_for_view(&self, index: usize) -> Option<TextureHandle>;

    fn depth_texture_for_view(&self, index: usize) -> Option<TextureHandle>;

    /// Rendering API the runtime's layers are bound to
    fn rendering_api(&self) -> GpuApi;

    /// Submit the current frame.
    ///
    /// Runtimes that present when their own frame callback returns leave this
    /// as a no-op.
    fn submit_frame(&self) {}
}
