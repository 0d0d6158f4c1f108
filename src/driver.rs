//! Host-loop helper.
//!
//! [`XrSessionDriver`] packages the usual per-tick sequence: poll the session,
//! render a frame while it is renderable, and release it once the environment
//! ends or rejects it.

use crate::context::XrContext;
use crate::error::XrResult;
use crate::frame::XrFrame;
use crate::runtime::XrRuntime;
use crate::session::XrSession;
use crate::types::{ReferenceSpaceType, SessionMode, SessionState};

/// What happened during one [`XrSessionDriver::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverTick {
    /// No session is active
    Inactive,
    /// The session exists but is not renderable yet
    Waiting(SessionState),
    /// A frame was rendered and submitted
    Rendered { views: usize },
    /// The session is renderable but the runtime had no views this tick
    NoFrame,
    /// The environment rejected the request; the session was released
    Failed,
    /// The session ended; it was released
    Ended,
}

/// Owns the session handle for a render loop.
#[derive(Debug)]
pub struct XrSessionDriver {
    mode: SessionMode,
    reference_space: ReferenceSpaceType,
    session: Option<XrSession>,
    frames_rendered: u64,
}

impl XrSessionDriver {
    pub fn new(mode: SessionMode, reference_space: ReferenceSpaceType) -> Self {
        Self {
            mode,
            reference_space,
            session: None,
            frames_rendered: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&XrSession> {
        self.session.as_ref()
    }

    /// Frames rendered over the driver's lifetime.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Request a session. Call from a user gesture handler.
    ///
    /// Does nothing if this driver already holds a session.
    pub fn start<R: XrRuntime>(&mut self, context: &XrContext<R>) -> XrResult<()> {
        if self.session.is_some() {
            log::debug!("XR session already active");
            return Ok(());
        }
        self.session = Some(context.request_session(self.mode, self.reference_space)?);
        Ok(())
    }

    /// End and release the session, if any.
    pub fn stop<R: XrRuntime>(&mut self, context: &XrContext<R>) {
        if let Some(session) = self.session.take() {
            // Not this context's session; keep it for the right one
            if let Err(session) = context.end_session(session) {
                self.session = Some(session);
            }
        }
    }

    /// Advance one tick, calling `render` if a frame is available.
    pub fn tick<R, F>(&mut self, context: &XrContext<R>, mut render: F) -> DriverTick
    where
        R: XrRuntime,
        F: FnMut(&XrFrame),
    {
        let Some(session) = self.session.as_ref() else {
            return DriverTick::Inactive;
        };

        let state = context.session_state(session);
        if state.can_render() {
            return match context.begin_frame(session) {
                Ok(frame) => {
                    render(&frame);
                    context.end_frame(session);
                    self.frames_rendered += 1;
                    log::trace!("XR frame {} rendered", self.frames_rendered);
                    DriverTick::Rendered {
                        views: frame.view_count(),
                    }
                }
                Err(_) => DriverTick::NoFrame,
            };
        }

        match state {
            SessionState::Ended => {
                log::info!("XR session ended, releasing");
                self.stop(context);
                DriverTick::Ended
            }
            SessionState::Idle => {
                log::info!("XR session request was rejected, releasing");
                self.stop(context);
                DriverTick::Failed
            }
            other => DriverTick::Waiting(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::dummy::DummyRuntime;

    #[test]
    fn test_inactive_without_start() {
        let context = XrContext::new(DummyRuntime::stereo());
        let mut driver = XrSessionDriver::new(SessionMode::ImmersiveVr, ReferenceSpaceType::Local);
        assert_eq!(driver.tick(&context, |_| {}), DriverTick::Inactive);
    }

    #[test]
    fn test_start_is_idempotent() {
        let runtime = DummyRuntime::stereo();
        let context = XrContext::new(runtime.clone());
        let mut driver = XrSessionDriver::new(SessionMode::ImmersiveVr, ReferenceSpaceType::Local);

        driver.start(&context).unwrap();
        driver.start(&context).unwrap();
        assert_eq!(runtime.initialize_count(), 1);
        assert!(context.last_error().is_none());
    }

    #[test]
    fn test_stop_on_wrong_context_keeps_session() {
        let runtime = DummyRuntime::stereo();
        let context = XrContext::new(runtime.clone());
        let other = XrContext::new(DummyRuntime::stereo());
        let mut driver = XrSessionDriver::new(SessionMode::ImmersiveVr, ReferenceSpaceType::Local);
        driver.start(&context).unwrap();

        driver.stop(&other);
        assert!(driver.is_active());
        assert_eq!(runtime.uninitialize_count(), 0);

        driver.stop(&context);
        assert!(!driver.is_active());
        assert_eq!(runtime.uninitialize_count(), 1);
    }
}
