//! Per-frame view data.
//!
//! [`XrContext::begin_frame`] pulls pose, projection and viewport for every
//! view from the runtime and packs them into a fixed-capacity [`XrFrame`].
//! Each field is fetched independently. A field the runtime cannot provide
//! this tick is zero-filled instead of failing the frame, since a skipped
//! frame visibly stutters in a headset.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::context::XrContext;
use crate::error::{XrError, XrResult};
use crate::runtime::{ViewTarget, XrRuntime};
use crate::session::XrSession;
use crate::types::{FramebufferHandle, TextureHandle};

/// Maximum number of views in a frame (stereo).
pub const MAX_VIEWS: usize = 2;

/// Viewport rectangle in framebuffer pixels
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Render parameters for one eye
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct XrView {
    /// 4x4 projection matrix (column-major)
    pub projection: [f32; 16],
    /// 4x4 view/eye matrix (column-major)
    pub view: [f32; 16],
    pub viewport: Viewport,
}

impl Default for XrView {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl XrView {
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::from_cols_array(&self.projection)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_cols_array(&self.view)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Whether the projection was zero-filled for this frame.
    pub fn has_projection(&self) -> bool {
        self.projection.iter().any(|v| *v != 0.0)
    }

    /// Whether the view matrix was zero-filled for this frame.
    pub fn has_pose(&self) -> bool {
        self.view.iter().any(|v| *v != 0.0)
    }
}

/// View data for a single tick.
///
/// Only valid for the tick it was produced in.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XrFrame {
    predicted_display_time: f64,
    view_count: usize,
    views: [XrView; MAX_VIEWS],
}

impl XrFrame {
    /// Number of views: 1 for mono, 2 for stereo.
    pub fn view_count(&self) -> usize {
        self.view_count
    }

    pub fn views(&self) -> &[XrView] {
        &self.views[..self.view_count]
    }

    pub fn view(&self, index: usize) -> Option<&XrView> {
        self.views().get(index)
    }

    pub fn is_stereo(&self) -> bool {
        self.view_count == MAX_VIEWS
    }

    /// When the frame is expected to reach the display, if the runtime knows.
    pub fn predicted_display_time(&self) -> Option<f64> {
        (self.predicted_display_time != 0.0).then_some(self.predicted_display_time)
    }
}

impl<R: XrRuntime> XrContext<R> {
    /// Pull this tick's view data.
    ///
    /// Re-reads the session state first. Succeeds once the runtime reports at
    /// least one view; views beyond [`MAX_VIEWS`] are dropped. Matrices and
    /// viewports the runtime cannot provide are left zeroed.
    ///
    /// # Errors
    ///
    /// - [`XrError::NotReady`] outside `Running`/`Visible`/`VisibleBlurred`,
    ///   or when the runtime has no views this tick
    /// - [`XrError::InvalidArgument`] for a session from another context
    pub fn begin_frame(&self, session: &XrSession) -> XrResult<XrFrame> {
        if !self.owns(session) {
            return Err(XrError::InvalidArgument(
                "session was not issued by this context".to_string(),
            ));
        }

        let state = self.session_state(session);
        if !state.can_render() {
            log::trace!("begin_frame skipped in state {:?}", state);
            return Err(XrError::NotReady(state));
        }

        let reported = self.runtime().view_count();
        if reported <= 0 {
            log::trace!("begin_frame: runtime reported {} views", reported);
            return Err(XrError::NotReady(state));
        }
        let view_count = (reported as usize).min(MAX_VIEWS);
        if view_count < reported as usize {
            log::trace!("begin_frame: dropping {} extra views", reported as usize - view_count);
        }

        let mut frame = XrFrame {
            view_count,
            ..Default::default()
        };
        let mut missing = 0;

        for (index, view) in frame.views[..view_count].iter_mut().enumerate() {
            view.projection = self.runtime().projection_for_view(index).unwrap_or_else(|| {
                missing += 1;
                [0.0; 16]
            });
            view.view = self
                .runtime()
                .transform_for_view(ViewTarget::Eye(index))
                .unwrap_or_else(|| {
                    missing += 1;
                    [0.0; 16]
                });
            view.viewport = self.runtime().viewport_for_view(index).unwrap_or_else(|| {
                missing += 1;
                Viewport::default()
            });
        }

        // Zero means unknown
        frame.predicted_display_time = self.runtime().predicted_display_time().unwrap_or(0.0);

        if missing > 0 {
            self.report_degraded_frame(session, missing);
        }

        Ok(frame)
    }

    /// Signal that this tick's rendering is complete.
    ///
    /// Forwards to [`XrRuntime::submit_frame`], which is a no-op for runtimes
    /// that present when their own frame callback returns.
    pub fn end_frame(&self, session: &XrSession) {
        if self.owns(session) {
            self.runtime().submit_frame();
        }
    }

    /// Number of views the runtime reports, unclamped. Zero on failure.
    pub fn view_count(&self, session: &XrSession) -> usize {
        if !self.owns(session) {
            return 0;
        }
        self.runtime().view_count().max(0) as usize
    }

    /// Recommended render target size in pixels.
    pub fn render_target_size(&self, session: &XrSession) -> Option<(u32, u32)> {
        self.owns(session)
            .then(|| self.runtime().render_target_size())
            .flatten()
    }

    /// Viewer transform, not tied to either eye.
    pub fn head_transform(&self, session: &XrSession) -> Option<[f32; 16]> {
        self.owns(session)
            .then(|| self.runtime().transform_for_view(ViewTarget::Head))
            .flatten()
    }

    pub fn framebuffer(&self, session: &XrSession) -> Option<FramebufferHandle> {
        self.owns(session)
            .then(|| self.runtime().framebuffer())
            .flatten()
    }

    pub fn color_texture_for_view(
        &self,
        session: &XrSession,
        index: usize,
    ) -> Option<TextureHandle> {
        self.owns(session)
            .then(|| self.runtime().color_texture_for_view(index))
            .flatten()
    }

    /// Depth texture for a view, if depth was requested and is available.
    pub fn depth_texture_for_view(
        &self,
        session: &XrSession,
        index: usize,
    ) -> Option<TextureHandle> {
        self.owns(session)
            .then(|| self.runtime().depth_texture_for_view(index))
            .flatten()
    }

    /// Log a zero-filled frame. Returns true if this logged the session's warning.
    fn report_degraded_frame(&self, session: &XrSession, missing: usize) -> bool {
        let first = {
            let mut record = session.record().lock();
            !std::mem::replace(&mut record.degraded_reported, true)
        };
        if first && self.config().warn_on_degraded_views {
            log::warn!(
                "XR frame has {} missing view fields, rendering with zeroed data",
                missing
            );
            true
        } else {
            log::trace!("XR frame has {} missing view fields", missing);
            false
        }
    }
}
