//! Session state machine.
//!
//! A session is created in [`SessionState::Requesting`] and from then on is
//! driven by the runtime: lifecycle callbacks arrive through [`SessionEvents`]
//! and are applied by `SessionRecord::apply`, the only place the cached
//! state changes outside of a resync against the runtime.
//!
//! | From                              | Event                  | To                 |
//! |-----------------------------------|------------------------|--------------------|
//! | Requesting, Ready                 | started                | Running            |
//! | Requesting, Ready                 | failed                 | Idle               |
//! | Ready, Running, Visible(Blurred)  | ended                  | Ended              |
//! | Running, Visible(Blurred)         | visibility changed     | per [`Visibility`] |
//!
//! Events that do not match a row are logged and dropped.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::XrError;
use crate::runtime::SessionRequest;
use crate::types::{ReferenceSpaceType, SessionMode, SessionState, Visibility};

/// Byte capacity of the stored reference space name, terminator included.
pub const REFERENCE_SPACE_CAPACITY: usize = 32;

/// Mutable session data shared between the handle, the context slot and the
/// runtime's event sink.
#[derive(Debug)]
pub(crate) struct SessionRecord {
    pub(crate) request: SessionRequest,
    pub(crate) state: SessionState,
    /// Reference space the environment actually granted
    pub(crate) environment_reference_space: String,
    /// Set once the runtime confirms the start
    pub(crate) initialized: bool,
    /// A zero-filled frame has already been reported for this session
    pub(crate) degraded_reported: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum SessionEvent<'a> {
    Started(&'a str),
    Ended,
    Failed(&'a str),
    VisibilityChanged(Visibility),
}

impl SessionRecord {
    pub(crate) fn new(request: SessionRequest) -> Self {
        Self {
            request,
            state: SessionState::Requesting,
            environment_reference_space: String::new(),
            initialized: false,
            degraded_reported: false,
        }
    }

    /// Apply a runtime event. Returns false if the event was rejected.
    pub(crate) fn apply(&mut self, event: SessionEvent<'_>) -> bool {
        use SessionState::*;

        match (self.state, event) {
            (Requesting | Ready, SessionEvent::Started(space)) => {
                self.environment_reference_space =
                    truncate_to_capacity(space, REFERENCE_SPACE_CAPACITY);
                self.state = Running;
                self.initialized = true;
            }
            (Requesting | Ready, SessionEvent::Failed(_)) => {
                self.state = Idle;
                self.initialized = false;
            }
            (Ready | Running | Visible | VisibleBlurred, SessionEvent::Ended) => {
                self.state = Ended;
                self.initialized = false;
            }
            (Running | Visible | VisibleBlurred, SessionEvent::VisibilityChanged(visibility)) => {
                self.state = visibility.session_state();
            }
            (state, event) => {
                log::warn!("Ignoring XR event {:?} in state {:?}", event, state);
                return false;
            }
        }
        true
    }
}

/// Cut `value` so it fits a buffer of `capacity` bytes with a terminator,
/// never splitting a character.
pub(crate) fn truncate_to_capacity(value: &str, capacity: usize) -> String {
    let max_len = capacity.saturating_sub(1);
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// Handle to the context's active session.
///
/// Not `Clone`: the host owns exactly one handle and gives it back through
/// [`XrContext::end_session`](crate::XrContext::end_session), which makes a
/// double end impossible. A handle dropped without being ended keeps the slot
/// occupied until the next request replaces it or
/// [`XrContext::end_current_session`](crate::XrContext::end_current_session)
/// clears it.
#[derive(Debug)]
pub struct XrSession {
    record: Arc<Mutex<SessionRecord>>,
}

impl XrSession {
    pub(crate) fn new(record: Arc<Mutex<SessionRecord>>) -> Self {
        Self { record }
    }

    pub(crate) fn record(&self) -> &Arc<Mutex<SessionRecord>> {
        &self.record
    }

    /// Mode this session was requested with.
    pub fn mode(&self) -> SessionMode {
        self.record.lock().request.mode
    }

    /// Reference space type this session was requested with.
    pub fn reference_space_type(&self) -> ReferenceSpaceType {
        self.record.lock().request.reference_space
    }

    /// Reference space name reported by the environment on start.
    ///
    /// Empty until the session has started; may differ from the requested type.
    pub fn environment_reference_space(&self) -> String {
        self.record.lock().environment_reference_space.clone()
    }

    /// Whether the runtime has confirmed the start.
    pub fn is_initialized(&self) -> bool {
        self.record.lock().initialized
    }

    /// Last state observed, without resynchronizing against the runtime.
    ///
    /// Use [`XrContext::session_state`](crate::XrContext::session_state) for
    /// the authoritative value.
    pub fn cached_state(&self) -> SessionState {
        self.record.lock().state
    }
}

/// Lifecycle callbacks a runtime delivers for one session.
///
/// Cheap to clone. Once the session is ended through the context every
/// callback becomes a no-op, so late promise resolutions are harmless.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    record: Weak<Mutex<SessionRecord>>,
    last_error: Arc<Mutex<Option<XrError>>>,
}

impl SessionEvents {
    pub(crate) fn new(
        record: &Arc<Mutex<SessionRecord>>,
        last_error: Arc<Mutex<Option<XrError>>>,
    ) -> Self {
        Self {
            record: Arc::downgrade(record),
            last_error,
        }
    }

    /// Whether the session these events belong to still exists.
    pub fn is_live(&self) -> bool {
        self.record.strong_count() > 0
    }

    /// The environment started the session with the given reference space.
    pub fn started(&self, reference_space: &str) {
        if self.dispatch(SessionEvent::Started(reference_space)) {
            log::info!("XR session started (reference space: {})", reference_space);
        }
    }

    /// The environment ended the session on its own.
    pub fn ended(&self) {
        if self.dispatch(SessionEvent::Ended) {
            log::info!("XR session ended by environment");
        }
    }

    /// The environment could not start the session.
    ///
    /// Recorded as the context's last error only if the session was still
    /// starting.
    pub fn failed(&self, message: &str) {
        if self.dispatch(SessionEvent::Failed(message)) {
            log::error!("XR session failed: {}", message);
            *self.last_error.lock() = Some(XrError::EnvironmentFailure(message.to_string()));
        }
    }

    /// The environment's visibility state changed.
    pub fn visibility_changed(&self, visibility: Visibility) {
        if self.dispatch(SessionEvent::VisibilityChanged(visibility)) {
            log::debug!("XR session visibility: {:?}", visibility);
        }
    }

    /// The environment produced a frame. Frame data is pulled on demand, so
    /// nothing is stored.
    pub fn frame(&self) {
        log::trace!("XR frame callback");
    }

    fn dispatch(&self, event: SessionEvent<'_>) -> bool {
        match self.record.upgrade() {
            Some(record) => record.lock().apply(event),
            None => {
                log::debug!("Dropping XR event {:?} for a destroyed session", event);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        SessionRecord::new(SessionRequest {
            mode: SessionMode::ImmersiveVr,
            reference_space: ReferenceSpaceType::LocalFloor,
        })
    }

    #[test]
    fn test_start_then_end() {
        let mut record = record();
        assert_eq!(record.state, SessionState::Requesting);

        assert!(record.apply(SessionEvent::Started("local-floor")));
        assert_eq!(record.state, SessionState::Running);
        assert!(record.initialized);
        assert_eq!(record.environment_reference_space, "local-floor");

        assert!(record.apply(SessionEvent::Ended));
        assert_eq!(record.state, SessionState::Ended);
        assert!(!record.initialized);
    }

    #[test]
    fn test_failure_returns_to_idle() {
        let mut record = record();
        assert!(record.apply(SessionEvent::Failed("denied")));
        assert_eq!(record.state, SessionState::Idle);
    }

    #[test]
    fn test_rejected_transitions_keep_state() {
        let mut record = record();
        assert!(!record.apply(SessionEvent::Ended));
        assert!(!record.apply(SessionEvent::VisibilityChanged(Visibility::Visible)));
        assert_eq!(record.state, SessionState::Requesting);

        record.apply(SessionEvent::Started("local"));
        assert!(!record.apply(SessionEvent::Failed("late")));
        assert_eq!(record.state, SessionState::Running);
    }

    #[test]
    fn test_visibility_round_trip() {
        let mut record = record();
        record.apply(SessionEvent::Started("local"));

        record.apply(SessionEvent::VisibilityChanged(Visibility::VisibleBlurred));
        assert_eq!(record.state, SessionState::VisibleBlurred);
        record.apply(SessionEvent::VisibilityChanged(Visibility::Visible));
        assert_eq!(record.state, SessionState::Visible);
        record.apply(SessionEvent::VisibilityChanged(Visibility::Hidden));
        assert_eq!(record.state, SessionState::Running);
    }

    #[test]
    fn test_truncate_to_capacity() {
        assert_eq!(truncate_to_capacity("local", 32), "local");

        let long = "x".repeat(40);
        assert_eq!(truncate_to_capacity(&long, 32).len(), 31);

        // 'é' is two bytes, two bytes of room only fit 'a'
        assert_eq!(truncate_to_capacity("aéé", 3), "a");
        assert_eq!(truncate_to_capacity("aéé", 4), "aé");
    }

    #[test]
    fn test_rejected_failure_is_not_recorded() {
        let shared = Arc::new(Mutex::new(record()));
        let last_error = Arc::new(Mutex::new(None));
        let events = SessionEvents::new(&shared, last_error.clone());

        events.started("local");
        events.failed("late");

        assert_eq!(shared.lock().state, SessionState::Running);
        assert!(last_error.lock().is_none());

        events.ended();
        events.failed("after end");
        assert!(last_error.lock().is_none());
    }

    #[test]
    fn test_events_after_drop_are_ignored() {
        let shared = Arc::new(Mutex::new(record()));
        let last_error = Arc::new(Mutex::new(None));
        let events = SessionEvents::new(&shared, last_error.clone());
        drop(shared);

        assert!(!events.is_live());
        events.started("local");
        events.failed("too late");
        assert!(last_error.lock().is_none());
    }
}
