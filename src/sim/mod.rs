//! Deterministic simulation module
//!
//! All structural and fluid physics lives here. This module must stay pure and
//! deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by element index)
//! - No rendering or platform dependencies beyond the `RenderContext` sink

pub mod bombs;
pub mod buffer;
pub mod clock;
pub mod connectivity;
pub mod ocean;
pub mod points;
pub mod ship;
pub mod ship_builder;
pub mod springs;
pub mod triangles;
pub mod types;
pub mod world;

pub use bombs::{Bomb, BombToggle, Bombs, NewBomb, PhysicsHandler};
pub use clock::GameWallClock;
pub use connectivity::{VisitSequence, detect_connected_components};
pub use ocean::{OceanSurface, WaterSurface};
pub use points::{Points, WaterRepresentation};
pub use ship::{Ship, ShipPhysics};
pub use ship_builder::{MaterialGrid, ShipBuilder};
pub use springs::Springs;
pub use triangles::Triangles;
pub use types::{
    BombType, ConnectedComponentId, ElementCount, ElementIndex, NONE_CONNECTED_COMPONENT_ID,
    NONE_ELEMENT_INDEX, ObjectId,
};
pub use world::World;
