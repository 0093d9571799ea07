//! Relays bus traffic to the command center.
//!
//! [`spawn_forwarder`] starts a plain thread that blocks on the bus and POSTs
//! every event.  Delivery is best effort: failures are logged by the client
//! and the event is dropped.  The thread exits once every [`EventBus`]
//! handle has been dropped.

use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::bus::EventBus;
use crate::command_center::CommandCenterClient;

pub fn spawn_forwarder(bus: &EventBus, client: CommandCenterClient) -> JoinHandle<usize> {
    let mut rx = bus.subscribe();
    thread::spawn(move || {
        info!(url = %client.base_url(), "forwarding mission events to command center");
        let mut delivered = 0;
        while let Some(event) = rx.blocking_recv() {
            if client.post_event(&event) {
                delivered += 1;
            } else {
                debug!(event_id = %event.id, "event not delivered");
            }
        }
        delivered
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use rescue_types::EventPayload;

    #[test]
    fn forwarder_drains_and_exits_when_bus_closes() {
        let bus = EventBus::default();
        let client = CommandCenterClient::new("", Duration::from_millis(100));
        let handle = spawn_forwarder(&bus, client);

        bus.emit("test", EventPayload::notice("one"));
        bus.emit("test", EventPayload::notice("two"));
        drop(bus);

        // A disabled client delivers nothing but the thread still terminates.
        assert_eq!(handle.join().unwrap(), 0);
    }
}
