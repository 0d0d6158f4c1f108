//! Dummy XR runtime for testing and development.
//!
//! This runtime doesn't talk to any headset. Its state is scripted from the
//! outside, which makes it possible to exercise the full session lifecycle
//! (including callbacks firing between polls) without a browser or device.
//!
//! Clones share state, so a test can hand one clone to an
//! [`XrContext`](crate::XrContext) and drive the environment with another.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use parking_lot::Mutex;

use super::{ModeProbe, SessionEvents, SessionRequest, ViewTarget, XrRuntime};
use crate::frame::Viewport;
use crate::types::{
    FramebufferHandle, GpuApi, SessionMode, SessionState, TextureHandle, Visibility,
};

/// Per-eye render target size used by [`DummyRuntime::stereo`].
pub const DUMMY_EYE_SIZE: (u32, u32) = (1024, 1024);

/// Interpupillary distance used by [`DummyRuntime::stereo`], in meters.
const DUMMY_IPD: f32 = 0.064;

#[derive(Debug)]
struct DummyState {
    supported: bool,
    rendering_api: GpuApi,
    /// Modes answered synchronously from inside the probe call
    immediate_answers: [Option<bool>; 3],
    pending_probes: Vec<ModeProbe>,
    probe_count: usize,

    request: Option<SessionRequest>,
    events: Option<SessionEvents>,
    state: SessionState,

    view_count: i32,
    projections: Vec<Option<[f32; 16]>>,
    transforms: Vec<Option<[f32; 16]>>,
    head_transform: Option<[f32; 16]>,
    viewports: Vec<Option<Viewport>>,
    predicted_display_time: Option<f64>,
    render_target_size: Option<(u32, u32)>,
    framebuffer: u32,
    color_textures: Vec<u32>,
    depth_textures: Vec<u32>,

    initialize_count: usize,
    uninitialize_count: usize,
    submit_count: usize,
}

impl Default for DummyState {
    fn default() -> Self {
        Self {
            supported: true,
            rendering_api: GpuApi::WebGl,
            immediate_answers: [None; 3],
            pending_probes: Vec::new(),
            probe_count: 0,
            request: None,
            events: None,
            state: SessionState::Idle,
            view_count: 0,
            projections: Vec::new(),
            transforms: Vec::new(),
            head_transform: None,
            viewports: Vec::new(),
            predicted_display_time: None,
            render_target_size: None,
            framebuffer: 0,
            color_textures: Vec::new(),
            depth_textures: Vec::new(),
            initialize_count: 0,
            uninitialize_count: 0,
            submit_count: 0,
        }
    }
}

/// Scriptable XR runtime.
#[derive(Debug, Clone, Default)]
pub struct DummyRuntime {
    state: Arc<Mutex<DummyState>>,
}

fn set_indexed<T: Copy>(values: &mut Vec<Option<T>>, index: usize, value: Option<T>) {
    if values.len() <= index {
        values.resize(index + 1, None);
    }
    values[index] = value;
}

fn set_raw(values: &mut Vec<u32>, index: usize, value: u32) {
    if values.len() <= index {
        values.resize(index + 1, 0);
    }
    values[index] = value;
}

impl DummyRuntime {
    /// Create an available runtime that reports no views.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runtime whose environment has no XR support.
    pub fn unavailable() -> Self {
        let runtime = Self::new();
        runtime.set_supported(false);
        runtime
    }

    /// Create a runtime that reports a side-by-side stereo frame.
    pub fn stereo() -> Self {
        let runtime = Self::new();
        let (eye_width, eye_height) = DUMMY_EYE_SIZE;
        let projection = Mat4::perspective_rh_gl(
            90f32.to_radians(),
            eye_width as f32 / eye_height as f32,
            0.1,
            100.0,
        )
        .to_cols_array();
        let head = Vec3::new(0.0, 1.6, 0.0);

        runtime.set_view_count(2);
        for (index, side) in [-0.5f32, 0.5].into_iter().enumerate() {
            let eye = head + Vec3::X * (side * DUMMY_IPD);
            let view = Mat4::from_translation(eye).inverse().to_cols_array();
            runtime.set_projection(index, Some(projection));
            runtime.set_transform(ViewTarget::Eye(index), Some(view));
            runtime.set_viewport(
                index,
                Some(Viewport::new(
                    (index as u32 * eye_width) as i32,
                    0,
                    eye_width as i32,
                    eye_height as i32,
                )),
            );
        }
        runtime.set_transform(
            ViewTarget::Head,
            Some(Mat4::from_translation(head).inverse().to_cols_array()),
        );
        runtime.set_render_target_size(Some((eye_width * 2, eye_height)));
        runtime
    }

    pub fn set_supported(&self, supported: bool) {
        self.state.lock().supported = supported;
    }

    pub fn set_rendering_api(&self, api: GpuApi) {
        self.state.lock().rendering_api = api;
    }

    /// Answer probes for `mode` synchronously from inside the probe call.
    pub fn set_immediate_answer(&self, mode: SessionMode, answer: Option<bool>) {
        self.state.lock().immediate_answers[mode.index()] = answer;
    }

    /// Total number of probes the context has triggered.
    pub fn probe_count(&self) -> usize {
        self.state.lock().probe_count
    }

    pub fn pending_probe_count(&self) -> usize {
        self.state.lock().pending_probes.len()
    }

    /// Deliver the answer for a pending probe. Returns false if none was pending.
    pub fn resolve_probe(&self, mode: SessionMode, supported: bool) -> bool {
        let probe = {
            let mut state = self.state.lock();
            let position = state.pending_probes.iter().position(|p| p.mode() == mode);
            position.map(|index| state.pending_probes.remove(index))
        };
        match probe {
            Some(probe) => {
                probe.resolve(supported);
                true
            }
            None => false,
        }
    }

    /// The request passed to the last `initialize` call.
    pub fn last_request(&self) -> Option<SessionRequest> {
        self.state.lock().request
    }

    /// Move the session to `Ready` without a callback, as while layers are set up.
    pub fn mark_ready(&self) {
        self.state.lock().state = SessionState::Ready;
    }

    /// Accept the session request.
    pub fn complete_start(&self, reference_space: &str) {
        if let Some(events) = self.transition(SessionState::Running) {
            events.started(reference_space);
        }
    }

    /// Reject the session request.
    ///
    /// Once the session has started the failure is still delivered, but the
    /// environment's state is left alone.
    pub fn fail_start(&self, message: &str) {
        let events = {
            let mut state = self.state.lock();
            let Some(events) = state.events.clone() else {
                return;
            };
            if matches!(state.state, SessionState::Requesting | SessionState::Ready) {
                state.state = SessionState::Idle;
            }
            events
        };
        events.failed(message);
    }

    /// End the session from the environment side (headset removed, browser UI).
    pub fn end_from_environment(&self) {
        if let Some(events) = self.transition(SessionState::Ended) {
            events.ended();
        }
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        if let Some(events) = self.transition(visibility.session_state()) {
            events.visibility_changed(visibility);
        }
    }

    /// Fire the per-frame callback.
    pub fn fire_frame(&self) {
        let events = self.state.lock().events.clone();
        if let Some(events) = events {
            events.frame();
        }
    }

    /// Set the authoritative state without firing any callback.
    pub fn force_state(&self, state: SessionState) {
        self.state.lock().state = state;
    }

    pub fn set_view_count(&self, count: i32) {
        self.state.lock().view_count = count;
    }

    pub fn set_projection(&self, index: usize, matrix: Option<[f32; 16]>) {
        set_indexed(&mut self.state.lock().projections, index, matrix);
    }

    pub fn set_transform(&self, target: ViewTarget, matrix: Option<[f32; 16]>) {
        let mut state = self.state.lock();
        match target {
            ViewTarget::Head => state.head_transform = matrix,
            ViewTarget::Eye(index) => set_indexed(&mut state.transforms, index, matrix),
        }
    }

    pub fn set_viewport(&self, index: usize, viewport: Option<Viewport>) {
        set_indexed(&mut self.state.lock().viewports, index, viewport);
    }

    pub fn set_predicted_display_time(&self, time: Option<f64>) {
        self.state.lock().predicted_display_time = time;
    }

    pub fn set_render_target_size(&self, size: Option<(u32, u32)>) {
        self.state.lock().render_target_size = size;
    }

    /// Set the framebuffer id, zero meaning none.
    pub fn set_framebuffer(&self, raw: u32) {
        self.state.lock().framebuffer = raw;
    }

    /// Set texture ids for a view, zero meaning none.
    pub fn set_view_textures(&self, index: usize, color: u32, depth: u32) {
        let mut state = self.state.lock();
        set_raw(&mut state.color_textures, index, color);
        set_raw(&mut state.depth_textures, index, depth);
    }

    pub fn initialize_count(&self) -> usize {
        self.state.lock().initialize_count
    }

    pub fn uninitialize_count(&self) -> usize {
        self.state.lock().uninitialize_count
    }

    pub fn submit_count(&self) -> usize {
        self.state.lock().submit_count
    }

    /// Set the authoritative state and hand back the sink to notify.
    fn transition(&self, next: SessionState) -> Option<SessionEvents> {
        let mut state = self.state.lock();
        let events = state.events.clone()?;
        state.state = next;
        Some(events)
    }
}

impl XrRuntime for DummyRuntime {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn is_supported(&self) -> bool {
        self.state.lock().supported
    }

    fn probe_session_mode(&self, probe: ModeProbe) {
        let immediate = {
            let mut state = self.state.lock();
            state.probe_count += 1;
            match state.immediate_answers[probe.mode().index()] {
                Some(answer) => Some((probe, answer)),
                None => {
                    log::trace!("DummyRuntime: queued probe for {}", probe.mode().as_str());
                    state.pending_probes.push(probe);
                    None
                }
            }
        };
        if let Some((probe, answer)) = immediate {
            probe.resolve(answer);
        }
    }

    fn initialize(&self, request: SessionRequest, events: SessionEvents) {
        log::trace!("DummyRuntime: initialize {:?}", request);
        let mut state = self.state.lock();
        state.initialize_count += 1;
        state.request = Some(request);
        state.events = Some(events);
        state.state = SessionState::Requesting;
    }

    fn uninitialize(&self) {
        log::trace!("DummyRuntime: uninitialize");
        let mut state = self.state.lock();
        state.uninitialize_count += 1;
        state.events = None;
        state.state = SessionState::Idle;
    }

    fn session_state(&self) -> SessionState {
        self.state.lock().state
    }

    fn view_count(&self) -> i32 {
        self.state.lock().view_count
    }

    fn projection_for_view(&self, index: usize) -> Option<[f32; 16]> {
        self.state.lock().projections.get(index).copied().flatten()
    }

    fn transform_for_view(&self, target: ViewTarget) -> Option<[f32; 16]> {
        let state = self.state.lock();
        match target {
            ViewTarget::Head => state.head_transform,
            ViewTarget::Eye(index) => state.transforms.get(index).copied().flatten(),
        }
    }

    fn viewport_for_view(&self, index: usize) -> Option<Viewport> {
        self.state.lock().viewports.get(index).copied().flatten()
    }

    fn predicted_display_time(&self) -> Option<f64> {
        self.state.lock().predicted_display_time
    }

    fn render_target_size(&self) -> Option<(u32, u32)> {
        self.state.lock().render_target_size
    }

    fn framebuffer(&self) -> Option<FramebufferHandle> {
        FramebufferHandle::from_raw(self.state.lock().framebuffer)
    }

    fn color_texture_for_view(&self, index: usize) -> Option<TextureHandle> {
        let raw = self.state.lock().color_textures.get(index).copied();
        raw.and_then(TextureHandle::from_raw)
    }

    fn depth_texture_for_view(&self, index: usize) -> Option<TextureHandle> {
        let raw = self.state.lock().depth_textures.get(index).copied();
        raw.and_then(TextureHandle::from_raw)
    }

    fn rendering_api(&self) -> GpuApi {
        self.state.lock().rendering_api
    }

    fn submit_frame(&self) {
        self.state.lock().submit_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_dummy_runtime() {
        let runtime = DummyRuntime::new();
        assert_eq!(runtime.name(), "Dummy");
        assert!(runtime.is_supported());
        assert_eq!(runtime.session_state(), SessionState::Idle);
        assert_eq!(runtime.view_count(), 0);
    }

    #[test]
    fn test_stereo_layout() {
        let runtime = DummyRuntime::stereo();
        assert_eq!(runtime.view_count(), 2);
        assert_eq!(runtime.render_target_size(), Some((2048, 1024)));

        let left = runtime.viewport_for_view(0).unwrap();
        let right = runtime.viewport_for_view(1).unwrap();
        assert_eq!(left.x, 0);
        assert_eq!(right.x, 1024);
        assert_eq!(right.width, 1024);

        let left_eye = runtime.transform_for_view(ViewTarget::Eye(0)).unwrap();
        let right_eye = runtime.transform_for_view(ViewTarget::Eye(1)).unwrap();
        let left_eye = Mat4::from_cols_array(&left_eye);
        let right_eye = Mat4::from_cols_array(&right_eye);
        let distance = left_eye
            .inverse()
            .w_axis
            .truncate()
            .distance(right_eye.inverse().w_axis.truncate());
        assert!((distance - DUMMY_IPD).abs() < 1e-5);
    }

    #[test]
    fn test_callbacks_need_a_session() {
        let runtime = DummyRuntime::new();
        runtime.complete_start("local");
        assert_eq!(runtime.session_state(), SessionState::Idle);
    }

    #[test]
    fn test_late_failure_keeps_running_state() {
        let runtime = DummyRuntime::new();
        let context = crate::XrContext::new(runtime.clone());
        let session = context
            .request_session(SessionMode::ImmersiveVr, crate::ReferenceSpaceType::Local)
            .unwrap();
        runtime.complete_start("local");

        runtime.fail_start("late");

        assert_eq!(runtime.session_state(), SessionState::Running);
        assert_eq!(context.session_state(&session), SessionState::Running);
    }

    #[rstest]
    #[case::requesting(None)]
    #[case::ready(Some(SessionState::Ready))]
    fn test_failure_while_starting_goes_idle(#[case] before: Option<SessionState>) {
        let runtime = DummyRuntime::new();
        let context = crate::XrContext::new(runtime.clone());
        let session = context
            .request_session(SessionMode::ImmersiveVr, crate::ReferenceSpaceType::Local)
            .unwrap();
        if let Some(state) = before {
            runtime.force_state(state);
        }

        runtime.fail_start("denied");

        assert_eq!(runtime.session_state(), SessionState::Idle);
        assert_eq!(context.session_state(&session), SessionState::Idle);
    }

    #[test]
    fn test_missing_indices_are_none() {
        let runtime = DummyRuntime::new();
        runtime.set_view_textures(1, 5, 0);

        assert_eq!(runtime.color_texture_for_view(0), None);
        assert_eq!(runtime.color_texture_for_view(1).map(|t| t.raw()), Some(5));
        assert_eq!(runtime.depth_texture_for_view(1), None);
        assert_eq!(runtime.projection_for_view(3), None);
    }
}
