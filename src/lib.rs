//! movekit: the core of an in-game relocation tool for a live simulated
//! city. Select placed buildings, props, decals, trees and network
//! nodes/segments, then move, rotate, clone, height-align or bulldoze
//! them. Every mutation is recorded as a reversible action, and drags are
//! corrected by geometry-aware snapping against the road network.
//!
//! Rendering, windowing, raw input and the host's spatial index stay in
//! the host application; it drives [`tools::Session`] from its input
//! loop and implements (or adapts) [`world::World`] over its own entity
//! buffers.

pub mod history;
pub mod io;
pub mod settings;
pub mod snap;
pub mod tools;
pub mod util;
pub mod world;

pub use history::{Action, ActionQueue, Selection};
pub use snap::{SnapRequest, SnapResult, snap_delta};
pub use tools::{Session, SessionOptions, ToolState};
pub use world::{EntityId, EntityKind, EntityState, World};
