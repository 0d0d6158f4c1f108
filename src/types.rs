//! Common types shared between the context and runtimes

/// Kind of XR session to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// Non-immersive, rendered in page
    Inline,
    /// Full VR headset takeover
    ImmersiveVr,
    /// AR pass-through
    ImmersiveAr,
}

impl SessionMode {
    pub const ALL: [SessionMode; 3] = [
        SessionMode::Inline,
        SessionMode::ImmersiveVr,
        SessionMode::ImmersiveAr,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            SessionMode::Inline => 0,
            SessionMode::ImmersiveVr => 1,
            SessionMode::ImmersiveAr => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Inline => "inline",
            SessionMode::ImmersiveVr => "immersive-vr",
            SessionMode::ImmersiveAr => "immersive-ar",
        }
    }

    pub fn is_immersive(&self) -> bool {
        !matches!(self, SessionMode::Inline)
    }
}

/// Coordinate frame poses are reported against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceType {
    /// Head-locked, no tracking
    Viewer,
    /// Seated, origin at initial head position
    Local,
    /// Standing, origin at floor level
    LocalFloor,
    /// Room-scale with boundaries
    BoundedFloor,
    /// Large-scale AR experiences
    Unbounded,
}

impl ReferenceSpaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceSpaceType::Viewer => "viewer",
            ReferenceSpaceType::Local => "local",
            ReferenceSpaceType::LocalFloor => "local-floor",
            ReferenceSpaceType::BoundedFloor => "bounded-floor",
            ReferenceSpaceType::Unbounded => "unbounded",
        }
    }

    /// Parse the environment's spelling of a reference space type.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "viewer" => Some(ReferenceSpaceType::Viewer),
            "local" => Some(ReferenceSpaceType::Local),
            "local-floor" => Some(ReferenceSpaceType::LocalFloor),
            "bounded-floor" => Some(ReferenceSpaceType::BoundedFloor),
            "unbounded" => Some(ReferenceSpaceType::Unbounded),
            _ => None,
        }
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No session
    #[default]
    Idle,
    /// Session requested, waiting for the environment
    Requesting,
    /// Session created, setting up
    Ready,
    /// Session running, can render
    Running,
    /// Content visible to user
    Visible,
    /// Visible but not focused
    VisibleBlurred,
    /// Session ended
    Ended,
}

impl SessionState {
    /// Whether frame data may be pulled in this state.
    pub fn can_render(&self) -> bool {
        matches!(
            self,
            SessionState::Running | SessionState::Visible | SessionState::VisibleBlurred
        )
    }

    pub fn is_quiescent(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Ended)
    }
}

/// Visibility reported by the environment for a running session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    VisibleBlurred,
    Hidden,
}

impl Visibility {
    /// State a running session moves to when this visibility is reported.
    pub fn session_state(self) -> SessionState {
        match self {
            Visibility::Visible => SessionState::Visible,
            Visibility::VisibleBlurred => SessionState::VisibleBlurred,
            Visibility::Hidden => SessionState::Running,
        }
    }
}

/// Cached answer for a session-mode probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeSupport {
    /// Never probed
    #[default]
    Unknown,
    /// Probe triggered, answer not delivered yet
    Probing,
    Unsupported,
    Supported,
}

impl ModeSupport {
    /// The authoritative answer, if one has landed.
    pub fn resolved(&self) -> Option<bool> {
        match self {
            ModeSupport::Supported => Some(true),
            ModeSupport::Unsupported => Some(false),
            ModeSupport::Unknown | ModeSupport::Probing => None,
        }
    }
}

/// Rendering API a GPU device or runtime surface is built on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuApi {
    WebGl,
    WebGpu,
    Vulkan,
    Other,
}

/// Environment framebuffer id (never zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub(crate) u32);

impl FramebufferHandle {
    /// Wrap a raw id, mapping the zero sentinel to `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Environment texture id (never zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u32);

impl TextureHandle {
    /// Wrap a raw id, mapping the zero sentinel to `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}
