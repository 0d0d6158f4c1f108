//! WebXR runtime for browsers.
//!
//! Wraps `navigator.xr`. Session start is a promise chain (request the
//! session, attach an `XRWebGLLayer`, request the reference space) that runs on
//! the browser event loop and reports back through [`SessionEvents`]. While the
//! session runs, every XR animation frame snapshots the viewer pose so the
//! render loop can read it synchronously.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    WebGl2RenderingContext, WebGlFramebuffer, XrReferenceSpace, XrRenderStateInit, XrSessionInit,
    XrSystem, XrVisibilityState, XrWebGlLayer,
};

use super::{ModeProbe, SessionEvents, SessionRequest, ViewTarget, XrRuntime};
use crate::frame::Viewport;
use crate::types::{
    FramebufferHandle, GpuApi, ReferenceSpaceType, SessionMode, SessionState, TextureHandle,
    Visibility,
};
use crate::web::{describe_js_error, spawn_local, xr_system};

type FrameClosure = Closure<dyn FnMut(f64, web_sys::XrFrame)>;

/// Pose data captured during the last XR animation frame.
#[derive(Debug, Default)]
struct FrameSnapshot {
    time: Option<f64>,
    head: Option<[f32; 16]>,
    projections: Vec<Option<[f32; 16]>>,
    transforms: Vec<Option<[f32; 16]>>,
    viewports: Vec<Option<Viewport>>,
}

struct ActiveSession {
    session: web_sys::XrSession,
    layer: XrWebGlLayer,
    reference_space: XrReferenceSpace,
    events: SessionEvents,
}

/// JS callbacks registered on the session. Must outlive their registration.
struct SessionCallbacks {
    frame: FrameClosure,
    _end: Closure<dyn FnMut()>,
    _visibility: Closure<dyn FnMut()>,
}

#[derive(Default)]
struct WebXrShared {
    state: SessionState,
    /// Bumped on every initialize and uninitialize; stale promise results
    /// compare against it and bail
    generation: u64,
    active: Option<ActiveSession>,
    callbacks: Option<SessionCallbacks>,
    animation_frame: Option<u32>,
    snapshot: FrameSnapshot,
}

struct OpenedSession {
    session: web_sys::XrSession,
    layer: XrWebGlLayer,
    reference_space: XrReferenceSpace,
    granted: ReferenceSpaceType,
}

/// WebXR runtime rendering through a WebGL2 context.
pub struct WebXrRuntime {
    xr: Option<XrSystem>,
    gl: WebGl2RenderingContext,
    shared: Rc<RefCell<WebXrShared>>,
}

impl WebXrRuntime {
    /// Create a runtime rendering with `gl`.
    ///
    /// The context should be created XR compatible (see
    /// [`xr_compatible_webgl2`](crate::web::xr_compatible_webgl2)); otherwise
    /// the session start will make it compatible first.
    pub fn new(gl: WebGl2RenderingContext) -> Self {
        let xr = xr_system();
        if xr.is_none() {
            log::warn!("navigator.xr is not available in this browser");
        }
        Self {
            xr,
            gl,
            shared: Rc::new(RefCell::new(WebXrShared::default())),
        }
    }

    /// Create a runtime on the canvas with the given element id.
    pub fn from_canvas(canvas_id: &str) -> Option<Self> {
        let canvas = crate::web::find_canvas(canvas_id)?;
        let gl = crate::web::xr_compatible_webgl2(&canvas)?;
        Some(Self::new(gl))
    }

    pub fn gl(&self) -> &WebGl2RenderingContext {
        &self.gl
    }

    /// Framebuffer of the session's base layer.
    ///
    /// WebGL framebuffers are JS objects with no integer name, so
    /// [`XrRuntime::framebuffer`] cannot report them; bind this one instead.
    pub fn base_layer_framebuffer(&self) -> Option<WebGlFramebuffer> {
        self.shared
            .borrow()
            .active
            .as_ref()
            .and_then(|active| active.layer.framebuffer())
    }
}

impl XrRuntime for WebXrRuntime {
    fn name(&self) -> &'static str {
        "WebXR"
    }

    fn is_supported(&self) -> bool {
        self.xr.is_some()
    }

    fn probe_session_mode(&self, probe: ModeProbe) {
        let Some(xr) = self.xr.as_ref() else {
            probe.resolve(false);
            return;
        };

        let promise = xr.is_session_supported(session_mode(probe.mode()));
        spawn_local(async move {
            let supported = match JsFuture::from(promise).await {
                Ok(answer) => answer.as_bool().unwrap_or(false),
                Err(err) => {
                    log::warn!(
                        "isSessionSupported({}) rejected: {}",
                        probe.mode().as_str(),
                        describe_js_error(&err)
                    );
                    false
                }
            };
            probe.resolve(supported);
        });
    }

    fn initialize(&self, request: SessionRequest, events: SessionEvents) {
        let Some(xr) = self.xr.clone() else {
            events.failed("navigator.xr is not available");
            return;
        };

        let generation = {
            let mut shared = self.shared.borrow_mut();
            shared.generation += 1;
            shared.state = SessionState::Requesting;
            shared.snapshot = FrameSnapshot::default();
            shared.generation
        };

        let shared = self.shared.clone();
        let gl = self.gl.clone();
        spawn_local(async move {
            match open_session(&xr, &gl, request).await {
                Ok(opened) => install_session(&shared, generation, events, opened),
                Err(err) => {
                    let message = describe_js_error(&err);
                    let current = update_if_current(&shared, generation, |shared| {
                        shared.state = SessionState::Idle;
                    });
                    if current {
                        events.failed(&message);
                    } else {
                        log::debug!("Discarding failure of a superseded XR request: {}", message);
                    }
                }
            }
        });
    }

    fn uninitialize(&self) {
        let (active, callbacks, animation_frame) = {
            let mut shared = self.shared.borrow_mut();
            shared.generation += 1;
            shared.state = SessionState::Idle;
            shared.snapshot = FrameSnapshot::default();
            (
                shared.active.take(),
                shared.callbacks.take(),
                shared.animation_frame.take(),
            )
        };

        if let Some(active) = active {
            if let Some(handle) = animation_frame {
                active.session.cancel_animation_frame(handle);
            }
            active.session.set_onend(None);
            active.session.set_onvisibilitychange(None);
            end_quietly(&active.session);
        }
        drop(callbacks);
    }

    fn session_state(&self) -> SessionState {
        self.shared.borrow().state
    }

    fn view_count(&self) -> i32 {
        self.shared.borrow().snapshot.projections.len() as i32
    }

    fn projection_for_view(&self, index: usize) -> Option<[f32; 16]> {
        self.shared
            .borrow()
            .snapshot
            .projections
            .get(index)
            .copied()
            .flatten()
    }

    fn transform_for_view(&self, target: ViewTarget) -> Option<[f32; 16]> {
        let shared = self.shared.borrow();
        match target {
            ViewTarget::Head => shared.snapshot.head,
            ViewTarget::Eye(index) => shared.snapshot.transforms.get(index).copied().flatten(),
        }
    }

    fn viewport_for_view(&self, index: usize) -> Option<Viewport> {
        self.shared
            .borrow()
            .snapshot
            .viewports
            .get(index)
            .copied()
            .flatten()
    }

    fn predicted_display_time(&self) -> Option<f64> {
        self.shared.borrow().snapshot.time
    }

    fn render_target_size(&self) -> Option<(u32, u32)> {
        let shared = self.shared.borrow();
        let layer = &shared.active.as_ref()?.layer;
        Some((layer.framebuffer_width(), layer.framebuffer_height()))
    }

    fn framebuffer(&self) -> Option<FramebufferHandle> {
        None
    }

    // XRWebGLLayer renders all views into one opaque framebuffer
    fn color_texture_for_view(&self, _index: usize) -> Option<TextureHandle> {
        None
    }

    fn depth_texture_for_view(&self, _index: usize) -> Option<TextureHandle> {
        None
    }

    fn rendering_api(&self) -> GpuApi {
        GpuApi::WebGl
    }
}

impl Drop for WebXrRuntime {
    fn drop(&mut self) {
        if self.shared.borrow().active.is_some() {
            self.uninitialize();
        }
    }
}

async fn open_session(
    xr: &XrSystem,
    gl: &WebGl2RenderingContext,
    request: SessionRequest,
) -> Result<OpenedSession, JsValue> {
    let init = XrSessionInit::new();
    let features = js_sys::Array::of1(&JsValue::from_str(request.reference_space.as_str()));
    js_sys::Reflect::set(&init, &JsValue::from_str("optionalFeatures"), &features)?;

    let session: web_sys::XrSession =
        JsFuture::from(xr.request_session_with_options(session_mode(request.mode), &init))
            .await?
            .dyn_into()?;
    log::debug!("XR session granted for {}", request.mode.as_str());

    match configure_session(&session, gl, request.reference_space).await {
        Ok((layer, reference_space, granted)) => Ok(OpenedSession {
            session,
            layer,
            reference_space,
            granted,
        }),
        Err(err) => {
            end_quietly(&session);
            Err(err)
        }
    }
}

async fn configure_session(
    session: &web_sys::XrSession,
    gl: &WebGl2RenderingContext,
    requested: ReferenceSpaceType,
) -> Result<(XrWebGlLayer, XrReferenceSpace, ReferenceSpaceType), JsValue> {
    JsFuture::from(gl.make_xr_compatible()).await?;

    let layer = XrWebGlLayer::new_with_web_gl2_rendering_context(session, gl)?;
    let render_state = XrRenderStateInit::new();
    render_state.set_base_layer(Some(&layer));
    session.update_render_state_with_state(&render_state);

    let (reference_space, granted) = request_reference_space(session, requested).await?;
    Ok((layer, reference_space, granted))
}

/// Request `requested`, falling back to `local` then `viewer`.
async fn request_reference_space(
    session: &web_sys::XrSession,
    requested: ReferenceSpaceType,
) -> Result<(XrReferenceSpace, ReferenceSpaceType), JsValue> {
    let mut candidates = vec![requested];
    for fallback in [ReferenceSpaceType::Local, ReferenceSpaceType::Viewer] {
        if !candidates.contains(&fallback) {
            candidates.push(fallback);
        }
    }

    let mut last_error = JsValue::UNDEFINED;
    for candidate in candidates {
        match JsFuture::from(session.request_reference_space(reference_space_type(candidate))).await
        {
            Ok(space) => {
                if candidate != requested {
                    log::warn!(
                        "Reference space {} unavailable, using {}",
                        requested.as_str(),
                        candidate.as_str()
                    );
                }
                return Ok((space.dyn_into()?, candidate));
            }
            Err(err) => {
                log::debug!(
                    "Reference space {} rejected: {}",
                    candidate.as_str(),
                    describe_js_error(&err)
                );
                last_error = err;
            }
        }
    }
    Err(last_error)
}

fn install_session(
    shared: &Rc<RefCell<WebXrShared>>,
    generation: u64,
    events: SessionEvents,
    opened: OpenedSession,
) {
    if shared.borrow().generation != generation {
        log::debug!("XR session resolved after its request was abandoned, ending it");
        end_quietly(&opened.session);
        return;
    }

    let on_end = {
        let shared = shared.clone();
        let events = events.clone();
        Closure::<dyn FnMut()>::new(move || {
            let current = update_if_current(&shared, generation, |shared| {
                shared.state = SessionState::Ended;
                shared.animation_frame = None;
            });
            if current {
                events.ended();
            }
        })
    };

    let on_visibility = {
        let shared = shared.clone();
        let events = events.clone();
        let session = opened.session.clone();
        Closure::<dyn FnMut()>::new(move || {
            let Some(visibility) = visibility_of(&session) else {
                return;
            };
            if update_if_current(&shared, generation, |shared| {
                apply_visibility(shared, visibility)
            }) {
                events.visibility_changed(visibility);
            }
        })
    };

    let on_frame = {
        let shared = shared.clone();
        FrameClosure::new(move |time: f64, frame: web_sys::XrFrame| {
            on_animation_frame(&shared, generation, time, &frame);
        })
    };

    let session = opened.session;
    session.set_onend(Some(on_end.as_ref().unchecked_ref()));
    session.set_onvisibilitychange(Some(on_visibility.as_ref().unchecked_ref()));
    let handle = session.request_animation_frame(on_frame.as_ref().unchecked_ref());
    let initial_visibility = visibility_of(&session);

    {
        let mut shared = shared.borrow_mut();
        shared.state = SessionState::Running;
        shared.animation_frame = Some(handle);
        shared.callbacks = Some(SessionCallbacks {
            frame: on_frame,
            _end: on_end,
            _visibility: on_visibility,
        });
        shared.active = Some(ActiveSession {
            session,
            layer: opened.layer,
            reference_space: opened.reference_space,
            events: events.clone(),
        });
    }

    events.started(opened.granted.as_str());

    if let Some(visibility) = initial_visibility.filter(|v| *v != Visibility::Hidden) {
        if update_if_current(shared, generation, |shared| {
            apply_visibility(shared, visibility)
        }) {
            events.visibility_changed(visibility);
        }
    }
}

fn on_animation_frame(
    shared: &Rc<RefCell<WebXrShared>>,
    generation: u64,
    time: f64,
    frame: &web_sys::XrFrame,
) {
    let (session, events, snapshot) = {
        let shared = shared.borrow();
        if shared.generation != generation {
            return;
        }
        let Some(active) = shared.active.as_ref() else {
            return;
        };
        let snapshot = capture_frame(frame, &active.reference_space, &active.layer, time);
        (active.session.clone(), active.events.clone(), snapshot)
    };

    {
        let mut shared = shared.borrow_mut();
        shared.snapshot = snapshot;
        let next = shared
            .callbacks
            .as_ref()
            .map(|callbacks| session.request_animation_frame(callbacks.frame.as_ref().unchecked_ref()));
        shared.animation_frame = next;
    }

    events.frame();
}

fn capture_frame(
    frame: &web_sys::XrFrame,
    space: &XrReferenceSpace,
    layer: &XrWebGlLayer,
    time: f64,
) -> FrameSnapshot {
    let mut snapshot = FrameSnapshot {
        time: (time > 0.0).then_some(time),
        ..Default::default()
    };

    // No pose while tracking is lost; the frame then has no views
    let Some(pose) = frame.get_viewer_pose(space) else {
        return snapshot;
    };

    snapshot.head = matrix(&pose.transform().inverse().matrix());
    for view in pose.views().iter() {
        let view: web_sys::XrView = view.unchecked_into();
        snapshot.projections.push(matrix(&view.projection_matrix()));
        snapshot
            .transforms
            .push(matrix(&view.transform().inverse().matrix()));
        snapshot.viewports.push(
            layer
                .get_viewport(&view)
                .map(|vp| Viewport::new(vp.x(), vp.y(), vp.width(), vp.height())),
        );
    }
    snapshot
}

fn matrix(values: &[f32]) -> Option<[f32; 16]> {
    values.try_into().ok()
}

fn apply_visibility(shared: &mut WebXrShared, visibility: Visibility) {
    if shared.state.can_render() {
        shared.state = visibility.session_state();
    }
}

fn update_if_current(
    shared: &Rc<RefCell<WebXrShared>>,
    generation: u64,
    update: impl FnOnce(&mut WebXrShared),
) -> bool {
    let mut shared = shared.borrow_mut();
    if shared.generation != generation {
        return false;
    }
    update(&mut shared);
    true
}

fn end_quietly(session: &web_sys::XrSession) {
    let promise = session.end();
    spawn_local(async move {
        if let Err(err) = JsFuture::from(promise).await {
            log::debug!("XRSession.end rejected: {}", describe_js_error(&err));
        }
    });
}

fn visibility_of(session: &web_sys::XrSession) -> Option<Visibility> {
    match session.visibility_state() {
        XrVisibilityState::Visible => Some(Visibility::Visible),
        XrVisibilityState::VisibleBlurred => Some(Visibility::VisibleBlurred),
        XrVisibilityState::Hidden => Some(Visibility::Hidden),
        _ => None,
    }
}

fn session_mode(mode: SessionMode) -> web_sys::XrSessionMode {
    match mode {
        SessionMode::Inline => web_sys::XrSessionMode::Inline,
        SessionMode::ImmersiveVr => web_sys::XrSessionMode::ImmersiveVr,
        SessionMode::ImmersiveAr => web_sys::XrSessionMode::ImmersiveAr,
    }
}

fn reference_space_type(space: ReferenceSpaceType) -> web_sys::XrReferenceSpaceType {
    match space {
        ReferenceSpaceType::Viewer => web_sys::XrReferenceSpaceType::Viewer,
        ReferenceSpaceType::Local => web_sys::XrReferenceSpaceType::Local,
        ReferenceSpaceType::LocalFloor => web_sys::XrReferenceSpaceType::LocalFloor,
        ReferenceSpaceType::BoundedFloor => web_sys::XrReferenceSpaceType::BoundedFloor,
        ReferenceSpaceType::Unbounded => web_sys::XrReferenceSpaceType::Unbounded,
    }
}
