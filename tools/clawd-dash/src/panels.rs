//! Per-panel display state with latest-wins refresh serialization.
//!
//! Every refresh takes a generation from [`PanelSlot::begin_refresh`]. A worker result is
//! applied only when its generation is still the newest one issued, so a slow fetch that
//! finishes after a newer refresh started cannot overwrite the panel with older data.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelId {
    Session,
    Cron,
    Memory,
    Health,
}

impl PanelId {
    pub const ALL: [PanelId; 4] = [Self::Session, Self::Cron, Self::Memory, Self::Health];

    pub fn title(self) -> &'static str {
        match self {
            Self::Session => "Session",
            Self::Cron => "Cron Jobs",
            Self::Memory => "Memory",
            Self::Health => "System Health",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Cron => "cron",
            Self::Memory => "memory",
            Self::Health => "health",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Loading,
    Ready,
    Failed,
}

impl PanelState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// Rendered body lines, or the error text to show in their place.
pub type PanelBody = Result<Vec<String>, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSlot {
    pub id: PanelId,
    pub state: PanelState,
    pub lines: Vec<String>,
    issued: u64,
    applied: u64,
}

impl PanelSlot {
    pub fn new(id: PanelId) -> Self {
        Self {
            id,
            state: PanelState::Loading,
            lines: vec!["Loading...".to_string()],
            issued: 0,
            applied: 0,
        }
    }

    pub fn begin_refresh(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn generation(&self) -> u64 {
        self.issued
    }

    pub fn in_flight(&self) -> bool {
        self.applied < self.issued
    }

    /// Applies any result newer than the one on screen, even while a later refresh is
    /// still pending. Returns whether the body was applied.
    pub fn complete(&mut self, generation: u64, body: PanelBody) -> bool {
        if generation <= self.applied || generation > self.issued {
            return false;
        }
        self.applied = generation;
        match body {
            Ok(lines) => {
                self.state = PanelState::Ready;
                self.lines = lines;
            }
            Err(lines) => {
                self.state = PanelState::Failed;
                self.lines = lines;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSet {
    pub session: PanelSlot,
    pub cron: PanelSlot,
    pub memory: PanelSlot,
    pub health: PanelSlot,
}

impl PanelSet {
    pub fn new() -> Self {
        Self {
            session: PanelSlot::new(PanelId::Session),
            cron: PanelSlot::new(PanelId::Cron),
            memory: PanelSlot::new(PanelId::Memory),
            health: PanelSlot::new(PanelId::Health),
        }
    }

    pub fn get(&self, id: PanelId) -> &PanelSlot {
        match id {
            PanelId::Session => &self.session,
            PanelId::Cron => &self.cron,
            PanelId::Memory => &self.memory,
            PanelId::Health => &self.health,
        }
    }

    pub fn get_mut(&mut self, id: PanelId) -> &mut PanelSlot {
        match id {
            PanelId::Session => &mut self.session,
            PanelId::Cron => &mut self.cron,
            PanelId::Memory => &mut self.memory,
            PanelId::Health => &mut self.health,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PanelSlot> {
        PanelId::ALL.into_iter().map(|id| self.get(id))
    }
}

impl Default for PanelSet {
    fn default() -> Self {
        Self::new()
    }
}
