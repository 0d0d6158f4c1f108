//! XR context.
//!
//! The [`XrContext`] owns the runtime and the single session slot. It replaces
//! a process-global session: whoever owns the render loop owns the context,
//! and the "only one session" rule is checked against the context's current
//! occupant.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::XrGpuDevice;
use crate::error::{XrError, XrResult};
use crate::mode_support::{ModeProbe, ModeSupportTable};
use crate::runtime::{SessionRequest, XrRuntime};
use crate::session::{SessionEvents, SessionRecord, XrSession};
use crate::types::{ModeSupport, ReferenceSpaceType, SessionMode, SessionState};
use crate::XrConfig;

/// Poll-based front end over an asynchronous XR runtime.
///
/// Nothing here blocks: session start and mode probes are fire-and-forget,
/// and their outcome is observed on later polls.
///
/// # Example
///
/// ```ignore
/// let context = XrContext::new(runtime);
/// if context.is_available() {
///     // from a click handler
///     let session = context.request_session(SessionMode::ImmersiveVr, ReferenceSpaceType::LocalFloor)?;
///     // every tick
///     if let Ok(frame) = context.begin_frame(&session) {
///         render(&frame);
///         context.end_frame(&session);
///     }
/// }
/// ```
pub struct XrContext<R: XrRuntime> {
    runtime: R,
    config: XrConfig,
    /// Current session occupant
    slot: Mutex<Option<Arc<Mutex<SessionRecord>>>>,
    mode_support: Arc<Mutex<ModeSupportTable>>,
    last_error: Arc<Mutex<Option<XrError>>>,
}

impl<R: XrRuntime> XrContext<R> {
    /// Create a context with the default configuration.
    pub fn new(runtime: R) -> Self {
        Self::with_config(runtime, XrConfig::default())
    }

    pub fn with_config(runtime: R, config: XrConfig) -> Self {
        log::info!("Creating XrContext on runtime: {}", runtime.name());
        Self {
            runtime,
            config,
            slot: Mutex::new(None),
            mode_support: Arc::new(Mutex::new(ModeSupportTable::default())),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn config(&self) -> &XrConfig {
        &self.config
    }

    /// Check whether the hosting environment supports XR at all.
    ///
    /// Every other operation fails or does nothing when this is false.
    pub fn is_available(&self) -> bool {
        self.runtime.is_supported()
    }

    /// Current cache entry for a mode, without triggering a probe.
    pub fn mode_support(&self, mode: SessionMode) -> ModeSupport {
        self.mode_support.lock().get(mode)
    }

    /// Check whether a session mode is supported.
    ///
    /// Returns the cached answer once the runtime has delivered one. Before
    /// that, the first call triggers a probe and both it and later calls get
    /// an optimistic placeholder: [`XrConfig::assume_immersive_vr`] for
    /// immersive VR, `false` otherwise. Use [`mode_support`](Self::mode_support)
    /// to tell a placeholder from an answer.
    pub fn is_mode_supported(&self, mode: SessionMode) -> bool {
        if !self.is_available() {
            return false;
        }

        let should_probe = {
            let mut table = self.mode_support.lock();
            if let Some(answer) = table.get(mode).resolved() {
                return answer;
            }
            table.begin_probe(mode)
        };

        if should_probe {
            log::debug!("Probing XR session mode {}", mode.as_str());
            self.runtime
                .probe_session_mode(ModeProbe::new(mode, self.mode_support.clone()));

            // The runtime may have answered synchronously
            if let Some(answer) = self.mode_support.lock().get(mode).resolved() {
                return answer;
            }
        }

        match mode {
            SessionMode::ImmersiveVr => self.config.assume_immersive_vr,
            SessionMode::Inline | SessionMode::ImmersiveAr => false,
        }
    }

    /// Request a new session.
    ///
    /// The returned session starts in [`SessionState::Requesting`]; poll
    /// [`session_state`](Self::session_state) to see whether the environment
    /// accepted it.
    ///
    /// Browsers only grant immersive sessions from inside a user gesture
    /// (click or key handler). This cannot be checked here; a violation shows
    /// up as an [`XrError::EnvironmentFailure`] and the session drops back to
    /// [`SessionState::Idle`].
    ///
    /// # Errors
    ///
    /// - [`XrError::Unavailable`] if the environment has no XR support
    /// - [`XrError::AlreadyActive`] if a session already occupies this context
    ///
    /// An occupant whose handle was dropped without
    /// [`end_session`](Self::end_session) is ended and replaced.
    pub fn request_session(
        &self,
        mode: SessionMode,
        reference_space: ReferenceSpaceType,
    ) -> XrResult<XrSession> {
        if !self.is_available() {
            return Err(self.record_error(XrError::Unavailable));
        }

        let request = SessionRequest {
            mode,
            reference_space,
        };

        let (record, abandoned) = {
            let mut slot = self.slot.lock();
            // The slot holds the only strong reference once the handle is dropped
            let abandoned = match slot.as_ref() {
                Some(record) if Arc::strong_count(record) > 1 => {
                    return Err(self.record_error(XrError::AlreadyActive));
                }
                Some(_) => true,
                None => false,
            };
            let record = Arc::new(Mutex::new(SessionRecord::new(request)));
            *slot = Some(record.clone());
            (record, abandoned)
        };

        if abandoned {
            log::warn!("Previous XR session handle was dropped without end_session, ending it");
            self.runtime.uninitialize();
        }

        log::info!(
            "Requesting XR session (mode: {}, reference space: {})",
            mode.as_str(),
            reference_space.as_str()
        );

        let events = SessionEvents::new(&record, self.last_error.clone());
        self.runtime.initialize(request, events);

        Ok(XrSession::new(record))
    }

    /// Whether a session currently occupies this context.
    pub fn has_session(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// State of the current occupant, or [`SessionState::Idle`] if there is none.
    pub fn current_state(&self) -> SessionState {
        let occupant = self.slot.lock().clone();
        match occupant {
            Some(record) => self.resync(&record),
            None => SessionState::Idle,
        }
    }

    /// Get the session's state.
    ///
    /// The runtime is the source of truth once a session exists, so the
    /// cached state is refreshed from it on every call.
    pub fn session_state(&self, session: &XrSession) -> SessionState {
        if !self.owns(session) {
            log::debug!("session_state called with a session from another context");
            return session.cached_state();
        }
        self.resync(session.record())
    }

    /// End a session and release it.
    ///
    /// Always tells the runtime to uninitialize, including for sessions the
    /// environment has already ended. Runtime resources may still be
    /// releasing when this returns.
    ///
    /// # Errors
    ///
    /// A session issued by another context is handed back untouched so it can
    /// be ended on its owner.
    pub fn end_session(&self, session: XrSession) -> Result<(), XrSession> {
        let owned = {
            let mut slot = self.slot.lock();
            let owned = slot
                .as_ref()
                .is_some_and(|record| Arc::ptr_eq(record, session.record()));
            if owned {
                *slot = None;
            }
            owned
        };

        if !owned {
            log::warn!("end_session called with a session from another context");
            return Err(session);
        }

        log::info!("Ending XR session");
        self.runtime.uninitialize();
        Ok(())
    }

    /// End whatever session occupies this context, handle or not.
    ///
    /// Recovers a context whose session handle was lost. Returns false if the
    /// slot was already empty.
    pub fn end_current_session(&self) -> bool {
        if self.slot.lock().take().is_none() {
            return false;
        }
        log::info!("Ending current XR session");
        self.runtime.uninitialize();
        true
    }

    /// Validate a GPU device for rendering into the session.
    ///
    /// The runtime binds its rendering surface while starting the session, so
    /// this only checks that the device speaks the runtime's rendering API.
    ///
    /// # Errors
    ///
    /// Returns [`XrError::InvalidArgument`] for a session from another context
    /// or an incompatible device.
    pub fn bind_gpu_device<D>(&self, session: &XrSession, device: &D) -> XrResult<()>
    where
        D: XrGpuDevice + ?Sized,
    {
        if !self.owns(session) {
            return Err(self.record_error(XrError::InvalidArgument(
                "session was not issued by this context".to_string(),
            )));
        }

        let required = self.runtime.rendering_api();
        let provided = device.gpu_api();
        if provided != required {
            return Err(self.record_error(XrError::InvalidArgument(format!(
                "device uses {:?}, runtime {} renders with {:?}",
                provided,
                self.runtime.name(),
                required
            ))));
        }

        log::debug!("GPU device ({:?}) accepted for XR session", provided);
        Ok(())
    }

    /// Most recent error recorded by this context.
    pub fn last_error(&self) -> Option<XrError> {
        self.last_error.lock().clone()
    }

    pub fn clear_error(&self) {
        *self.last_error.lock() = None;
    }

    pub(crate) fn owns(&self, session: &XrSession) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|record| Arc::ptr_eq(record, session.record()))
    }

    fn resync(&self, record: &Arc<Mutex<SessionRecord>>) -> SessionState {
        // Query before locking: the runtime may fire callbacks from here
        let authoritative = self.runtime.session_state();
        let mut record = record.lock();
        if record.state != authoritative {
            log::debug!(
                "XR session state {:?} -> {:?}",
                record.state,
                authoritative
            );
            record.state = authoritative;
        }
        authoritative
    }

    pub(crate) fn record_error(&self, error: XrError) -> XrError {
        log::warn!("{}", error);
        *self.last_error.lock() = Some(error.clone());
        error
    }
}

impl<R: XrRuntime> Drop for XrContext<R> {
    fn drop(&mut self) {
        if self.slot.get_mut().take().is_some() {
            log::info!("XrContext dropped with a live session, uninitializing runtime");
            self.runtime.uninitialize();
        }
    }
}
