//! `rescue-hal` – Action & Sensing Abstraction
//!
//! Everything the mission can ask the physical (or pretend) robot to do goes
//! through [`ActionCapability`][capability::ActionCapability]; everything it
//! hears goes through [`Listener`][listener::Listener].  The rest of the
//! system never talks to a backend directly, so a Wizard-of-Oz operator, the
//! HTTP robot bridge and the in-memory simulator are interchangeable.
//!
//! # Modules
//!
//! - [`capability`] – the seven-operation action trait.
//! - [`woz`] – [`WozActions`][woz::WozActions]: console-echo placeholders
//!   with optional operator confirmation.
//! - [`bridge`] – [`BridgeActions`][bridge::BridgeActions] and
//!   [`BridgeCamera`][bridge::BridgeCamera] over the robot's HTTP bridge.
//! - [`sim`] – [`SimActions`][sim::SimActions]: deterministic fake for tests.
//! - [`call_ledger`] – append-only JSONL log of every call.
//! - [`camera`] – [`Camera`][camera::Camera] trait and frame type.
//! - [`console`] – stdin reader splitting operator commands from replies.
//! - [`listener`] – keyboard, scripted and fallback listeners.

pub mod bridge;
pub mod call_ledger;
pub mod camera;
pub mod capability;
pub mod console;
pub mod listener;
pub mod sim;
pub mod woz;

pub use bridge::{BridgeActions, BridgeCamera, BridgeClient};
pub use call_ledger::{CallLedger, CallRecord};
pub use camera::{Camera, CameraFrame, FrameFormat};
pub use capability::ActionCapability;
pub use console::{Console, OperatorCommand};
pub use listener::{FallbackListener, KeyboardListener, ListenError, Listener, ScriptedListener};
pub use sim::{SimActions, SimCamera, SimLog};
pub use woz::{Confirmation, WozActions};
