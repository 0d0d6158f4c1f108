//! Common utilities for XR integration tests.
//!
//! Every test drives a [`DummyRuntime`] from the outside while the code under
//! test only sees the [`XrContext`] it was handed.

use redlilium_xr::{
    DummyRuntime, ReferenceSpaceType, SessionMode, SessionState, XrContext, XrSession,
};

/// Route `log` output through the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Test Context
// ============================================================================

/// A context plus a second handle on its runtime for scripting the environment.
pub struct TestContext {
    pub runtime: DummyRuntime,
    pub context: XrContext<DummyRuntime>,
}

impl TestContext {
    pub fn new(runtime: DummyRuntime) -> Self {
        init_logging();
        Self {
            context: XrContext::new(runtime.clone()),
            runtime,
        }
    }

    /// Context over a runtime that reports a stereo frame.
    pub fn stereo() -> Self {
        Self::new(DummyRuntime::stereo())
    }

    /// Request an immersive VR session and leave it in `Requesting`.
    pub fn request(&self, reference_space: ReferenceSpaceType) -> XrSession {
        match self
            .context
            .request_session(SessionMode::ImmersiveVr, reference_space)
        {
            Ok(session) => session,
            Err(err) => panic!("session request failed: {}", err),
        }
    }

    /// Request a session and have the environment accept it.
    pub fn running_session(&self) -> XrSession {
        let session = self.request(ReferenceSpaceType::LocalFloor);
        self.runtime.complete_start("local-floor");
        assert_eq!(self.context.session_state(&session), SessionState::Running);
        session
    }
}

// ============================================================================
// Matrices
// ============================================================================

/// Column-major matrix with `value` in every element.
#[allow(dead_code)]
pub fn filled_matrix(value: f32) -> [f32; 16] {
    [value; 16]
}

#[allow(dead_code)]
pub fn is_zero_matrix(matrix: &[f32; 16]) -> bool {
    matrix.iter().all(|value| *value == 0.0)
}
