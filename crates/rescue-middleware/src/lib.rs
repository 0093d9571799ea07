//! `rescue-middleware` – moves mission telemetry off the robot.
//!
//! Routes events between the mission loop and the command center without
//! caring about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – in-process broadcast bus for [`MissionEvent`]s built on Tokio
//!   broadcast channels.
//! - [`command_center`] – HTTP client for the command center's event and
//!   operator-message endpoints.
//! - [`forwarder`] – background thread that relays every bus event to the
//!   command center.
//!
//! [`MissionEvent`]: rescue_types::MissionEvent

pub mod bus;
pub mod command_center;
pub mod forwarder;

pub use bus::{EventBus, EventSubscriber};
pub use command_center::{CommandCenterClient, OperatorMessage};
pub use forwarder::spawn_forwarder;
