//! Game events
//!
//! The simulation reports structural, fluid and bomb events through the
//! `GameEventHandler` trait. It has no idea what the consumer does with them
//! (audio, visual effects, statistics).

use std::cell::RefCell;

use crate::material::{Material, SoundElementType};
use crate::sim::{BombType, ObjectId};

/// Coarse size of an aggregated event, for picking a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeBucket {
    Small,
    Medium,
    Large,
}

impl SizeBucket {
    pub fn from_size(size: u32) -> Self {
        if size < 2 {
            SizeBucket::Small
        } else if size < 10 {
            SizeBucket::Medium
        } else {
            SizeBucket::Large
        }
    }
}

/// Sink for simulation events
///
/// All methods default to no-ops so consumers implement only what they need.
/// Handlers are shared (`Rc<dyn GameEventHandler>`) and take `&self`; use
/// interior mutability to record state.
#[allow(unused_variables)]
pub trait GameEventHandler {
    fn on_destroy(&self, material: &Material, is_underwater: bool, size: u32) {}

    fn on_pin_toggled(&self, is_pinned: bool, is_underwater: bool) {}

    fn on_stress(&self, material: &Material, is_underwater: bool, size: u32) {}

    fn on_break(&self, material: &Material, is_underwater: bool, size: u32) {}

    fn on_water_taken(&self, water_taken: f32) {}

    fn on_water_splashed(&self, water_splashed: f32) {}

    fn on_bomb_placed(&self, bomb_id: ObjectId, bomb_type: BombType, is_underwater: bool) {}

    /// `is_underwater` is `None` when the bomb is removed without a position
    fn on_bomb_removed(&self, bomb_id: ObjectId, bomb_type: BombType, is_underwater: Option<bool>) {
    }

    fn on_bomb_explosion(&self, bomb_type: BombType, is_underwater: bool, size: u32) {}

    fn on_rc_bomb_ping(&self, is_underwater: bool, size: u32) {}

    /// `is_fast` is `None` when the fuse stops burning
    fn on_timer_bomb_fuse(&self, bomb_id: ObjectId, is_fast: Option<bool>) {}

    fn on_timer_bomb_defused(&self, is_underwater: bool, size: u32) {}

    fn on_anti_matter_bomb_contained(&self, bomb_id: ObjectId, is_contained: bool) {}

    fn on_anti_matter_bomb_pre_imploding(&self) {}

    fn on_anti_matter_bomb_imploding(&self) {}
}

/// Handler that ignores everything
#[derive(Debug, Default)]
pub struct NullEventHandler;

impl GameEventHandler for NullEventHandler {}

/// A recorded game event
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Destroy {
        material: String,
        sound: Option<SoundElementType>,
        is_underwater: bool,
        size: SizeBucket,
    },
    PinToggled {
        is_pinned: bool,
        is_underwater: bool,
    },
    Stress {
        material: String,
        sound: Option<SoundElementType>,
        is_underwater: bool,
        size: SizeBucket,
    },
    Break {
        material: String,
        sound: Option<SoundElementType>,
        is_underwater: bool,
        size: SizeBucket,
    },
    WaterTaken(f32),
    WaterSplashed(f32),
    BombPlaced {
        bomb_id: ObjectId,
        bomb_type: BombType,
        is_underwater: bool,
    },
    BombRemoved {
        bomb_id: ObjectId,
        bomb_type: BombType,
        is_underwater: Option<bool>,
    },
    BombExplosion {
        bomb_type: BombType,
        is_underwater: bool,
        size: SizeBucket,
    },
    RcBombPing {
        is_underwater: bool,
    },
    TimerBombFuse {
        bomb_id: ObjectId,
        is_fast: Option<bool>,
    },
    TimerBombDefused {
        is_underwater: bool,
    },
    AntiMatterBombContained {
        bomb_id: ObjectId,
        is_contained: bool,
    },
    AntiMatterBombPreImploding,
    AntiMatterBombImploding,
}

/// Handler that records every event, in order
#[derive(Debug, Default)]
pub struct EventLog {
    events: RefCell<Vec<GameEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: GameEvent) {
        self.events.borrow_mut().push(event);
    }

    /// Take all recorded events, leaving the log empty
    pub fn drain(&self) -> Vec<GameEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Copy of the recorded events
    pub fn events(&self) -> Vec<GameEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&GameEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| predicate(e)).count()
    }
}

impl GameEventHandler for EventLog {
    fn on_destroy(&self, material: &Material, is_underwater: bool, size: u32) {
        self.push(GameEvent::Destroy {
            material: material.name.clone(),
            sound: material.sound_properties.map(|s| s.element_type),
            is_underwater,
            size: SizeBucket::from_size(size),
        });
    }

    fn on_pin_toggled(&self, is_pinned: bool, is_underwater: bool) {
        self.push(GameEvent::PinToggled {
            is_pinned,
            is_underwater,
        });
    }

    fn on_stress(&self, material: &Material, is_underwater: bool, size: u32) {
        self.push(GameEvent::Stress {
            material: material.name.clone(),
            sound: material.sound_properties.map(|s| s.element_type),
            is_underwater,
            size: SizeBucket::from_size(size),
        });
    }

    fn on_break(&self, material: &Material, is_underwater: bool, size: u32) {
        self.push(GameEvent::Break {
            material: material.name.clone(),
            sound: material.sound_properties.map(|s| s.element_type),
            is_underwater,
            size: SizeBucket::from_size(size),
        });
    }

    fn on_water_taken(&self, water_taken: f32) {
        self.push(GameEvent::WaterTaken(water_taken));
    }

    fn on_water_splashed(&self, water_splashed: f32) {
        self.push(GameEvent::WaterSplashed(water_splashed));
    }

    fn on_bomb_placed(&self, bomb_id: ObjectId, bomb_type: BombType, is_underwater: bool) {
        self.push(GameEvent::BombPlaced {
            bomb_id,
            bomb_type,
            is_underwater,
        });
    }

    fn on_bomb_removed(&self, bomb_id: ObjectId, bomb_type: BombType, is_underwater: Option<bool>) {
        self.push(GameEvent::BombRemoved {
            bomb_id,
            bomb_type,
            is_underwater,
        });
    }

    fn on_bomb_explosion(&self, bomb_type: BombType, is_underwater: bool, size: u32) {
        self.push(GameEvent::BombExplosion {
            bomb_type,
            is_underwater,
            size: SizeBucket::from_size(size),
        });
    }

    fn on_rc_bomb_ping(&self, is_underwater: bool, _size: u32) {
        self.push(GameEvent::RcBombPing { is_underwater });
    }

    fn on_timer_bomb_fuse(&self, bomb_id: ObjectId, is_fast: Option<bool>) {
        self.push(GameEvent::TimerBombFuse { bomb_id, is_fast });
    }

    fn on_timer_bomb_defused(&self, is_underwater: bool, _size: u32) {
        self.push(GameEvent::TimerBombDefused { is_underwater });
    }

    fn on_anti_matter_bomb_contained(&self, bomb_id: ObjectId, is_contained: bool) {
        self.push(GameEvent::AntiMatterBombContained {
            bomb_id,
            is_contained,
        });
    }

    fn on_anti_matter_bomb_pre_imploding(&self) {
        self.push(GameEvent::AntiMatterBombPreImploding);
    }

    fn on_anti_matter_bomb_imploding(&self) {
        self.push(GameEvent::AntiMatterBombImploding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_buckets() {
        assert_eq!(SizeBucket::from_size(0), SizeBucket::Small);
        assert_eq!(SizeBucket::from_size(1), SizeBucket::Small);
        assert_eq!(SizeBucket::from_size(2), SizeBucket::Medium);
        assert_eq!(SizeBucket::from_size(9), SizeBucket::Medium);
        assert_eq!(SizeBucket::from_size(10), SizeBucket::Large);
    }

    #[test]
    fn test_event_log_records_and_drains() {
        let log = EventLog::new();
        log.on_water_taken(1.5);
        log.on_pin_toggled(true, false);
        assert_eq!(log.len(), 2);
        assert_eq!(log.count(|e| matches!(e, GameEvent::WaterTaken(_))), 1);

        let events = log.drain();
        assert_eq!(events[0], GameEvent::WaterTaken(1.5));
        assert!(log.is_empty());
    }
}
