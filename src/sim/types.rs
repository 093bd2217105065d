//! Identifier types shared across the simulation

use serde::{Deserialize, Serialize};

/// Dense index of a point, spring or triangle within its ship
pub type ElementIndex = u32;

/// Number of elements in a container
pub type ElementCount = u32;

/// Sentinel for "no element"
pub const NONE_ELEMENT_INDEX: ElementIndex = ElementIndex::MAX;

/// Opaque identifier of a game object (bombs)
pub type ObjectId = u32;

/// Connected component tag; valid for the current simulation step only
pub type ConnectedComponentId = u32;

/// Sentinel for "not part of any component"; valid ids start at 1
pub const NONE_CONNECTED_COMPONENT_ID: ConnectedComponentId = 0;

/// Monotonic stamp of a connected-component detection pass
pub type VisitSequenceNumber = u64;

/// Sentinel for "never visited"; passes start at 1
pub const NONE_VISIT_SEQUENCE_NUMBER: VisitSequenceNumber = 0;

/// Kinds of bombs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BombType {
    /// Fused bomb that defuses underwater
    TimerBomb,
    /// Remote-controlled bomb
    RcBomb,
    /// Contact bomb, explodes when its neighbourhood is disturbed
    ImpactBomb,
    /// Contained anti-matter, implodes then explodes
    AntiMatterBomb,
}

impl BombType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BombType::TimerBomb => "Timer",
            BombType::RcBomb => "RC",
            BombType::ImpactBomb => "Impact",
            BombType::AntiMatterBomb => "AntiMatter",
        }
    }
}
