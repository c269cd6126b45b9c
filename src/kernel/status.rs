use core::fmt;

use spin::Mutex;

/// Kernel initialization status tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed(&'static str),
}

/// Kernel component status
#[derive(Debug, Clone, Copy)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub status: InitStatus,
}

impl ComponentStatus {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            status: InitStatus::NotStarted,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, InitStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, InitStatus::Failed(_))
    }
}

// Registration happens before the heap exists, so the registry is a
// fixed set of slots.
const MAX_COMPONENTS: usize = 8;

static INIT_STATUS: Mutex<[Option<ComponentStatus>; MAX_COMPONENTS]> =
    Mutex::new([None; MAX_COMPONENTS]);

/// Track kernel component initialization. Registrations beyond the
/// slot count are dropped.
pub fn register_component(name: &'static str) {
    let mut components = INIT_STATUS.lock();
    if let Some(slot) = components.iter_mut().find(|slot| slot.is_none()) {
        *slot = Some(ComponentStatus::new(name));
    }
}

/// Update component status
pub fn update_component_status(name: &'static str, status: InitStatus) {
    let mut components = INIT_STATUS.lock();
    if let Some(component) = components
        .iter_mut()
        .flatten()
        .find(|component| component.name == name)
    {
        component.status = status;
    }
}

/// Check if all registered components are initialized
pub fn all_components_ready() -> bool {
    let components = INIT_STATUS.lock();
    let mut seen = false;
    for component in components.iter().flatten() {
        seen = true;
        if !component.is_complete() {
            return false;
        }
    }
    seen
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::NotStarted => write!(f, "Not Started"),
            InitStatus::InProgress => write!(f, "In Progress"),
            InitStatus::Completed => write!(f, "Completed"),
            InitStatus::Failed(err) => write!(f, "Failed: {}", err),
        }
    }
}
