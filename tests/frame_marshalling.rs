//! Frame marshalling integration tests.
//!
//! Check how [`XrContext::begin_frame`] turns whatever the runtime reports this
//! tick into an [`XrFrame`]: gating on session state, clamping the view count
//! and zero-filling fields the runtime cannot provide.

mod common;

use rstest::rstest;

use common::{filled_matrix, is_zero_matrix, TestContext};
use redlilium_xr::{
    DummyRuntime, ReferenceSpaceType, SessionState, ViewTarget, Viewport, Visibility, XrError,
    XrRuntime, XrSession, MAX_VIEWS,
};

/// How far to take a fresh session before asking for a frame.
#[derive(Debug, Clone, Copy)]
enum Setup {
    Requesting,
    Ready,
    Rejected,
    EndedByEnvironment,
}

fn session_in(ctx: &TestContext, setup: Setup) -> XrSession {
    let session = ctx.request(ReferenceSpaceType::Local);
    match setup {
        Setup::Requesting => {}
        Setup::Ready => ctx.runtime.mark_ready(),
        Setup::Rejected => ctx.runtime.fail_start("denied"),
        Setup::EndedByEnvironment => {
            ctx.runtime.complete_start("local");
            ctx.runtime.end_from_environment();
        }
    }
    session
}

// ============================================================================
// State Gating
// ============================================================================

#[rstest]
#[case::requesting(Setup::Requesting, SessionState::Requesting)]
#[case::ready(Setup::Ready, SessionState::Ready)]
#[case::idle(Setup::Rejected, SessionState::Idle)]
#[case::ended(Setup::EndedByEnvironment, SessionState::Ended)]
fn test_begin_frame_requires_renderable_state(#[case] setup: Setup, #[case] state: SessionState) {
    let ctx = TestContext::stereo();
    let session = session_in(&ctx, setup);

    let result = ctx.context.begin_frame(&session);

    assert_eq!(result.err(), Some(XrError::NotReady(state)));
    assert_eq!(ctx.runtime.submit_count(), 0);
}

#[rstest]
#[case::running(None)]
#[case::visible(Some(Visibility::Visible))]
#[case::blurred(Some(Visibility::VisibleBlurred))]
fn test_begin_frame_in_renderable_states(#[case] visibility: Option<Visibility>) {
    let ctx = TestContext::stereo();
    let session = ctx.running_session();
    if let Some(visibility) = visibility {
        ctx.runtime.set_visibility(visibility);
    }

    let frame = ctx.context.begin_frame(&session).unwrap();
    assert_eq!(frame.view_count(), 2);
}

#[rstest]
#[case::no_views(0)]
#[case::negative(-1)]
fn test_begin_frame_without_views(#[case] count: i32) {
    let ctx = TestContext::stereo();
    let session = ctx.running_session();
    ctx.runtime.set_view_count(count);

    let result = ctx.context.begin_frame(&session);

    assert_eq!(result.err(), Some(XrError::NotReady(SessionState::Running)));
    assert_eq!(ctx.context.view_count(&session), 0);
}

#[test]
fn test_begin_frame_rejects_foreign_session() {
    let ours = TestContext::stereo();
    let theirs = TestContext::stereo();
    ours.running_session();
    let their_session = theirs.running_session();

    let result = ours.context.begin_frame(&their_session);
    assert!(matches!(result, Err(XrError::InvalidArgument(_))));
}

// ============================================================================
// View Data
// ============================================================================

#[test]
fn test_stereo_frame_matches_runtime() {
    let ctx = TestContext::stereo();
    let session = ctx.running_session();

    let frame = ctx.context.begin_frame(&session).unwrap();

    assert!(frame.is_stereo());
    assert_eq!(frame.views().len(), MAX_VIEWS);
    for (index, view) in frame.views().iter().enumerate() {
        assert_eq!(Some(view.projection), ctx.runtime.projection_for_view(index));
        assert_eq!(
            Some(view.view),
            ctx.runtime.transform_for_view(ViewTarget::Eye(index))
        );
        assert!(view.has_projection());
        assert!(view.has_pose());
    }
    assert_eq!(frame.views()[0].viewport, Viewport::new(0, 0, 1024, 1024));
    assert_eq!(frame.views()[1].viewport, Viewport::new(1024, 0, 1024, 1024));
    assert!(frame.view(2).is_none());
}

#[test]
fn test_mono_frame() {
    let ctx = TestContext::stereo();
    let session = ctx.running_session();
    ctx.runtime.set_view_count(1);

    let frame = ctx.context.begin_frame(&session).unwrap();

    assert_eq!(frame.view_count(), 1);
    assert!(!frame.is_stereo());
    assert!(frame.view(1).is_none());
}

#[test]
fn test_extra_views_are_dropped() {
    let ctx = TestContext::stereo();
    let session = ctx.running_session();
    ctx.runtime.set_view_count(3);
    ctx.runtime.set_projection(2, Some(filled_matrix(3.0)));

    let frame = ctx.context.begin_frame(&session).unwrap();

    assert_eq!(frame.view_count(), MAX_VIEWS);
    assert_eq!(frame.views().len(), MAX_VIEWS);
    // The raw count is still reported as-is
    assert_eq!(ctx.context.view_count(&session), 3);
}

#[test]
fn test_missing_projection_is_zero_filled() {
    let ctx = TestContext::stereo();
    let session = ctx.running_session();
    ctx.runtime.set_projection(1, None);

    let frame = ctx.context.begin_frame(&session).unwrap();

    let left = frame.view(0).unwrap();
    let right = frame.view(1).unwrap();
    assert!(left.has_projection());
    assert!(is_zero_matrix(&right.projection));
    assert!(!right.has_projection());

    // The other fields of the same view are intact
    assert!(right.has_pose());
    assert_eq!(right.viewport, Viewport::new(1024, 0, 1024, 1024));
}

#[test]
fn test_missing_pose_and_viewport_are_zero_filled() {
    let ctx = TestContext::stereo();
    let session = ctx.running_session();
    ctx.runtime.set_transform(ViewTarget::Eye(0), None);
    ctx.runtime.set_viewport(0, None);

    let frame = ctx.context.begin_frame(&session).unwrap();

    let left = frame.view(0).unwrap();
    assert!(is_zero_matrix(&left.view));
    assert_eq!(left.viewport, Viewport::default());
    assert!(left.has_projection());
}

#[test]
fn test_degraded_frames_keep_rendering() {
    let ctx = TestContext::new(DummyRuntime::new());
    let session = ctx.running_session();
    ctx.runtime.set_view_count(2);

    // Nothing but a view count: every field is zero-filled, every tick
    for _ in 0..3 {
        let frame = ctx.context.begin_frame(&session).unwrap();
        assert!(frame.views().iter().all(|view| !view.has_projection()));
        ctx.context.end_frame(&session);
    }
    assert_eq!(ctx.runtime.submit_count(), 3);
}

#[rstest]
#[case::unknown(None, None)]
#[case::zero(Some(0.0), None)]
#[case::known(Some(16.6), Some(16.6))]
fn test_predicted_display_time(#[case] reported: Option<f64>, #[case] expected: Option<f64>) {
    let ctx = TestContext::stereo();
    let session = ctx.running_session();
    ctx.runtime.set_predicted_display_time(reported);

    let frame = ctx.context.begin_frame(&session).unwrap();
    assert_eq!(frame.predicted_display_time(), expected);
}

// ============================================================================
// Frame Submission and Auxiliary Queries
// ============================================================================

#[test]
fn test_end_frame_submits() {
    let ctx = TestContext::stereo();
    let session = ctx.running_session();

    ctx.context.begin_frame(&session).unwrap();
    ctx.context.end_frame(&session);

    assert_eq!(ctx.runtime.submit_count(), 1);
}

#[test]
fn test_end_frame_ignores_foreign_session() {
    let ours = TestContext::stereo();
    let theirs = TestContext::stereo();
    let their_session = theirs.running_session();

    ours.context.end_frame(&their_session);

    assert_eq!(ours.runtime.submit_count(), 0);
    assert_eq!(theirs.runtime.submit_count(), 0);
}

#[test]
fn test_render_target_and_head_transform() {
    let ctx = TestContext::stereo();
    let session = ctx.running_session();

    assert_eq!(ctx.context.render_target_size(&session), Some((2048, 1024)));
    let head = ctx.context.head_transform(&session).unwrap();
    // Inverse of a head at 1.6m: translation column moves the world down
    assert!((head[13] + 1.6).abs() < 1e-6);

    ctx.runtime.set_render_target_size(None);
    ctx.runtime.set_transform(ViewTarget::Head, None);
    assert_eq!(ctx.context.render_target_size(&session), None);
    assert_eq!(ctx.context.head_transform(&session), None);
}

#[test]
fn test_framebuffer_and_textures() {
    let ctx = TestContext::stereo();
    let session = ctx.running_session();

    assert_eq!(ctx.context.framebuffer(&session), None);
    assert_eq!(ctx.context.color_texture_for_view(&session, 0), None);

    ctx.runtime.set_framebuffer(7);
    ctx.runtime.set_view_textures(0, 11, 12);
    ctx.runtime.set_view_textures(1, 21, 0);

    assert_eq!(ctx.context.framebuffer(&session).map(|fb| fb.raw()), Some(7));
    assert_eq!(
        ctx.context
            .color_texture_for_view(&session, 0)
            .map(|t| t.raw()),
        Some(11)
    );
    assert_eq!(
        ctx.context
            .depth_texture_for_view(&session, 0)
            .map(|t| t.raw()),
        Some(12)
    );
    assert_eq!(
        ctx.context
            .color_texture_for_view(&session, 1)
            .map(|t| t.raw()),
        Some(21)
    );
    assert_eq!(ctx.context.depth_texture_for_view(&session, 1), None);
}

#[test]
fn test_auxiliary_queries_for_foreign_session() {
    let ours = TestContext::stereo();
    let theirs = TestContext::stereo();
    let their_session = theirs.running_session();

    assert_eq!(ours.context.view_count(&their_session), 0);
    assert_eq!(ours.context.render_target_size(&their_session), None);
    assert_eq!(ours.context.head_transform(&their_session), None);
}
