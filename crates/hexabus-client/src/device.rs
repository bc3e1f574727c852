//! Device session
//!
//! One session per remote. It discovers the device's endpoints by walking
//! the descriptor chain, caches the last value of each endpoint and keeps
//! exactly one request in flight. The in-flight request is resent on every
//! flush until an answer clears it.

use hexabus_core::{Data, DataKind, ErrorCode, Packet, Payload, Value};
use hexabus_transport::{ListenerRegistry, PacketHandler};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, trace, warn};

use crate::endpoint::{Endpoint, EndpointRole};
use crate::error::{ClientError, Result};
use crate::events::EndpointEvent;

/// Default event buffer per session
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Default wait for [`Device::query_and_wait`]
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Session with a single remote device
pub struct Device {
    remote: SocketAddr,
    state: Mutex<DeviceState>,
    events: broadcast::Sender<EndpointEvent>,
    waker: Option<Arc<Notify>>,
}

struct DeviceState {
    remote: SocketAddr,
    endpoints: BTreeMap<u8, Endpoint>,
    pending: Option<Packet>,
    queue: VecDeque<Packet>,
}

impl Device {
    /// Create a session for `remote`. Discovery starts with the first flush.
    pub fn new(remote: SocketAddr, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        let mut state = DeviceState {
            remote,
            endpoints: BTreeMap::new(),
            pending: None,
            queue: VecDeque::new(),
        };
        state.enqueue(Packet::endpoint_query(remote, 0));

        Self {
            remote,
            state: Mutex::new(state),
            events,
            waker: None,
        }
    }

    /// Create a session that wakes the channel when the owner queues work
    pub fn with_waker(remote: SocketAddr, event_capacity: usize, waker: Arc<Notify>) -> Self {
        Self {
            waker: Some(waker),
            ..Self::new(remote, event_capacity)
        }
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EndpointEvent> {
        self.events.subscribe()
    }

    /// Snapshot of every known endpoint, ordered by eid
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.state.lock().endpoints.values().cloned().collect()
    }

    pub fn endpoint(&self, eid: u8) -> Option<Endpoint> {
        self.state.lock().endpoints.get(&eid).cloned()
    }

    /// Last known value of `eid`
    pub fn value(&self, eid: u8) -> Option<Value> {
        self.state.lock().endpoints.get(&eid)?.value.clone()
    }

    /// The request currently in flight
    pub fn pending_request(&self) -> Option<Packet> {
        self.state.lock().pending.clone()
    }

    /// Requests waiting behind the in-flight one
    pub fn queued_requests(&self) -> Vec<Packet> {
        self.state.lock().queue.iter().cloned().collect()
    }

    /// True when nothing is in flight or queued
    pub fn is_idle(&self) -> bool {
        !self.state.lock().has_work()
    }

    /// Ask the device for the current value of `eid`
    pub fn query(&self, eid: u8) {
        let idle = {
            let mut state = self.state.lock();
            state.enqueue(Packet::query(self.remote, eid));
            state.pending.is_none()
        };
        if idle {
            self.wake();
        }
    }

    /// Queue a write. Returns false, sending nothing, when the endpoint is
    /// unknown or declared with a different value kind.
    pub fn write(&self, data: Data) -> bool {
        let idle = {
            let mut state = self.state.lock();
            match state.endpoints.get(&data.eid) {
                None => {
                    warn!(
                        "Trying to write to non-existing endpoint {} on {}",
                        data.eid, self.remote
                    );
                    return false;
                }
                Some(endpoint) if endpoint.kind != data.kind() => {
                    warn!(
                        "Trying to write {} data to {} on {}",
                        data.kind(),
                        endpoint,
                        self.remote
                    );
                    return false;
                }
                Some(_) => {}
            }
            state.enqueue(Packet::write(self.remote, data));
            state.pending.is_none()
        };
        if idle {
            self.wake();
        }
        true
    }

    /// Query `eid` and wait for the device to report its value
    pub async fn query_and_wait(&self, eid: u8, timeout: Duration) -> Result<Value> {
        let mut events = self.subscribe();
        self.query(eid);

        let wait = async {
            loop {
                match events.recv().await {
                    Ok(EndpointEvent::Updated { endpoint, .. }) if endpoint.eid == eid => {
                        if let Some(value) = endpoint.value {
                            return Ok(value);
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        trace!("query_and_wait lagged by {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(ClientError::EventsClosed);
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ClientError::Timeout {
                eid,
                timeout_ms: timeout.as_millis() as u64,
            })?
    }

    fn wake(&self) {
        if let Some(waker) = &self.waker {
            waker.notify_one();
        }
    }

    fn publish(&self, events: Vec<EndpointEvent>) {
        for event in events {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

impl PacketHandler for Device {
    fn handle_packet(&self, packet: Packet, _listeners: &ListenerRegistry) -> bool {
        if packet.remote != self.remote {
            trace!("{} ignoring packet from {}", self.remote, packet.remote);
            return self.state.lock().has_work();
        }

        let mut events = Vec::new();
        let more = {
            let mut state = self.state.lock();
            match packet.payload {
                Payload::EndpointInfo {
                    eid,
                    kind,
                    description,
                } => state.on_endpoint_info(eid, kind, &description),
                Payload::Info(data) => state.on_info(data, &mut events),
                Payload::Error(code) => state.on_error(code, &mut events),
                ignored @ (Payload::EndpointQuery { .. }
                | Payload::Query { .. }
                | Payload::Write(_)) => {
                    trace!("{} ignoring inbound {:?}", self.remote, ignored.kind());
                }
            }
            state.has_work()
        };

        self.publish(events);
        more
    }

    fn next_request(&self) -> Option<Packet> {
        let mut state = self.state.lock();
        if state.pending.is_none() {
            state.pending = state.queue.pop_front();
            if let Some(request) = &state.pending {
                trace!("Sending next request {}, {} queued", request, state.queue.len());
            }
        } else if let Some(request) = &state.pending {
            trace!("Resending request {}, {} queued", request, state.queue.len());
        }
        state.pending.clone()
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Device")
            .field("remote", &self.remote)
            .field("endpoints", &state.endpoints.len())
            .field("pending", &state.pending)
            .field("queued", &state.queue.len())
            .finish()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device on {} -> [", self.remote)?;
        for (i, endpoint) in self.endpoints().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", endpoint)?;
        }
        write!(f, "]")
    }
}

impl DeviceState {
    fn has_work(&self) -> bool {
        self.pending.is_some() || !self.queue.is_empty()
    }

    /// Queue `request` unless it is already in flight or queued
    fn enqueue(&mut self, request: Packet) -> bool {
        if self.pending.as_ref() == Some(&request) || self.queue.contains(&request) {
            trace!("Request {} already outstanding", request);
            return false;
        }
        self.queue.push_back(request);
        true
    }

    fn on_endpoint_info(&mut self, eid: u8, kind: DataKind, description: &str) {
        match self.pending.as_ref().map(|p| &p.payload) {
            Some(Payload::EndpointQuery { eid: asked }) if *asked == eid => {
                trace!("Handling expected endpoint info {} from {}", eid, self.remote);
                self.pending = None;
            }
            _ => trace!("Handling unexpected endpoint info {} from {}", eid, self.remote),
        }

        if kind != DataKind::Unknown && !self.endpoints.contains_key(&eid) {
            let endpoint = Endpoint::from_info(eid, kind, description);
            debug!("Created {} {}", self.remote, endpoint);
            self.endpoints.insert(eid, endpoint);
            self.enqueue(Packet::query(self.remote, eid));
        }
    }

    fn on_info(&mut self, data: Data, events: &mut Vec<EndpointEvent>) {
        let answered = match self.pending.as_ref().map(|p| &p.payload) {
            Some(Payload::Query { eid }) => *eid == data.eid,
            Some(Payload::Write(written)) => *written == data,
            _ => false,
        };
        if answered {
            trace!("Handling expected {} from {}", data, self.remote);
            self.pending = None;
        } else {
            trace!("Handling unexpected {} from {}", data, self.remote);
        }

        let Some(endpoint) = self.endpoints.get_mut(&data.eid) else {
            return;
        };
        if endpoint.kind != data.kind() {
            warn!(
                "Expected {} data for {} on {}, received {}",
                endpoint.kind,
                endpoint,
                self.remote,
                data.kind()
            );
            return;
        }

        endpoint.value = Some(data.value.clone());
        debug!("Updated {} {}", self.remote, endpoint);
        let snapshot = endpoint.clone();

        match snapshot.role {
            EndpointRole::Descriptor => self.on_descriptor(&snapshot),
            EndpointRole::PushButton => {
                if data.value.as_bool() == Some(true) {
                    let eids: Vec<u8> = self.endpoints.keys().copied().collect();
                    for eid in eids {
                        self.enqueue(Packet::query(self.remote, eid));
                    }
                }
            }
            EndpointRole::Plain => {}
        }

        events.push(EndpointEvent::Updated {
            remote: self.remote,
            endpoint: snapshot,
        });
    }

    fn on_descriptor(&mut self, descriptor: &Endpoint) {
        for eid in descriptor.described_eids() {
            if !self.endpoints.contains_key(&eid) {
                self.enqueue(Packet::endpoint_query(self.remote, eid));
            }
        }

        // The chain ends after the block starting at 224
        if let Some(next) = descriptor.eid.checked_add(32) {
            self.enqueue(Packet::endpoint_query(self.remote, next));
        }
    }

    fn on_error(&mut self, code: ErrorCode, events: &mut Vec<EndpointEvent>) {
        trace!(
            "Request {:?} to {} got error response {}",
            self.pending,
            self.remote,
            code
        );
        if code == ErrorCode::CrcFailed {
            return;
        }

        let request = self.pending.take();
        events.push(EndpointEvent::Failed {
            remote: self.remote,
            request,
            code,
        });
    }
}
