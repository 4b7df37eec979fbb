//! Function-pointer finite state machine for pot controllers.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  POT_STATES                                                      │
//! │  ┌──────────────────┬───────────┬──────────┬──────────────────┐  │
//! │  │ PotStateId       │ on_enter  │ on_exit  │ on_update        │  │
//! │  ├──────────────────┼───────────┼──────────┼──────────────────┤  │
//! │  │ Idle             │ —         │ —        │ fn(cy)->Option<> │  │
//! │  │ StartMeasurement │ —         │ —        │ fn(cy)->Option<> │  │
//! │  │ Measuring        │ fn(cy)    │ fn(cy)   │ fn(cy)->Option<> │  │
//! │  │ WaitingForValve  │ fn(cy)    │ —        │ fn(cy)->Option<> │  │
//! │  └──────────────────┴───────────┴──────────┴──────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All pots share one static table; each [`Pot`](crate::controller::pot::Pot)
//! only stores its current [`PotStateId`].  Each orchestrator tick calls
//! [`tick`] for one pot with a [`PotCycle`] that borrows the pot, its
//! configuration and the shared I/O.  A transition into the current state
//! is a no-op: no hooks run and nothing is logged.

pub mod context;
pub mod states;

pub use context::{ControllerIo, PotCycle};
pub use states::POT_STATES;

use log::info;

use crate::eventlog::InfoCode;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Pot controller phase.  The discriminant is the wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PotStateId {
    Idle = 0,
    StartMeasurement = 1,
    Measuring = 2,
    WaitingForValve = 3,
}

impl PotStateId {
    pub const COUNT: usize = 4;

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Idle),
            1 => Some(Self::StartMeasurement),
            2 => Some(Self::Measuring),
            3 => Some(Self::WaitingForValve),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        POT_STATES[self as usize].name
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit` action.
pub type StateActionFn = fn(&mut PotCycle<'_, '_>);

/// Per-tick handler.  `Some(next)` requests a transition.
pub type StateUpdateFn = fn(&mut PotCycle<'_, '_>) -> Option<PotStateId>;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: PotStateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Advance one pot by one tick.
pub fn tick(cy: &mut PotCycle<'_, '_>) {
    let update = POT_STATES[cy.pot.state as usize].on_update;
    if let Some(next) = update(cy) {
        transition(cy, next);
    }
}

/// Switch `cy.pot` into `next`, running exit/enter hooks.
pub fn transition(cy: &mut PotCycle<'_, '_>, next: PotStateId) {
    let current = cy.pot.state;
    if current == next {
        return;
    }

    if let Some(exit) = POT_STATES[current as usize].on_exit {
        exit(cy);
    }

    cy.pot.state = next;
    info!("pot {}: {} -> {}", cy.nr, current.name(), next.name());
    cy.info_verbose(InfoCode::StateChange, ((next as u8) << 4) | (cy.nr & 0x0F));

    if let Some(enter) = POT_STATES[next as usize].on_enter {
        enter(cy);
    }
}
