// crates/scene-hub-core/src/core/mod.rs
// ============================================================================
// Module: Scene Hub Core Types
// Description: Identifiers, time, paths, values, and instance nodes.
// Purpose: Provide the shared data model for the graph and control plane.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Foundational types shared by every Scene Hub component. Nothing here
//! mutates state; all engine behavior lives in [`crate::graph`],
//! [`crate::schema`], and [`crate::control`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identifiers;
pub mod instance;
pub mod path;
pub mod time;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::ChangeId;
pub use identifiers::InstanceId;
pub use identifiers::LockOwner;
pub use instance::Instance;
pub use instance::WireInstance;
pub use path::ScenePath;
pub use path::is_valid_name;
pub use time::Timestamp;
pub use value::EnumValue;
pub use value::Point2;
pub use value::Primitive;
pub use value::ReferenceValue;
pub use value::StructValue;
pub use value::UDimComponent;
pub use value::UnsupportedValue;
pub use value::Value;
pub use value::ValueError;
pub use value::ValueKind;
