//! Loopback tests for the multicast channel
//!
//! The channel binds a unicast loopback socket; a plain tokio socket plays
//! the device.

use hexabus_core::{Codec, Data, Packet, Payload, MAX_PACKET_SIZE};
use hexabus_transport::{ChannelConfig, ListenerRegistry, MulticastChannel, PacketHandler};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Handler that records what it is given and sends what it is told to
#[derive(Default)]
struct Recorder {
    outgoing: Mutex<VecDeque<Packet>>,
    received: Mutex<Vec<Packet>>,
    /// Reply queued for every handled packet
    reply: Mutex<Option<Packet>>,
}

impl Recorder {
    fn queue(&self, packet: Packet) {
        self.outgoing.lock().push_back(packet);
    }

    fn received(&self) -> Vec<Packet> {
        self.received.lock().clone()
    }
}

impl PacketHandler for Recorder {
    fn handle_packet(&self, packet: Packet, _listeners: &ListenerRegistry) -> bool {
        self.received.lock().push(packet);
        match self.reply.lock().clone() {
            Some(reply) => {
                self.queue(reply);
                true
            }
            None => false,
        }
    }

    fn next_request(&self) -> Option<Packet> {
        self.outgoing.lock().pop_front()
    }
}

fn loopback(recv_timeout_ms: u64) -> ChannelConfig {
    let mut config = ChannelConfig::unicast("127.0.0.1:0".parse().unwrap());
    config.recv_timeout_ms = recv_timeout_ms;
    config
}

async fn channel_addr(channel: &MulticastChannel) -> SocketAddr {
    for _ in 0..200 {
        if let Some(addr) = channel.local_addr() {
            return addr;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("channel never bound");
}

async fn wait_for(recorder: &Recorder, count: usize) -> Vec<Packet> {
    for _ in 0..200 {
        let received = recorder.received();
        if received.len() >= count {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} packets, got {:?}", count, recorder.received());
}

async fn recv_packet(device: &UdpSocket) -> Packet {
    let mut buf = [0u8; MAX_PACKET_SIZE];
    let (len, from) = timeout(Duration::from_secs(2), device.recv_from(&mut buf))
        .await
        .expect("device timed out")
        .expect("device recv failed");
    Codec::new()
        .decode(from, &buf[..len])
        .expect("channel sent a bad frame")
}

async fn send_packet(device: &UdpSocket, to: SocketAddr, packet: &Packet) {
    let frame = Codec::new().encode(packet).unwrap();
    device.send_to(&frame, to).await.unwrap();
}

#[tokio::test]
async fn test_flush_reaches_device() {
    let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let device_addr = device.local_addr().unwrap();

    let channel = MulticastChannel::new(loopback(50), Arc::new(Recorder::default())).unwrap();
    let session = Arc::new(Recorder::default());
    session.queue(Packet::endpoint_query(device_addr, 0));
    session.queue(Packet::query(device_addr, 2));
    channel.register_listener(device_addr, session.clone());
    channel.open().unwrap();

    let first = recv_packet(&device).await;
    assert_eq!(first.payload, Payload::EndpointQuery { eid: 0 });
    assert_eq!(first.remote, channel_addr(&channel).await);

    let second = recv_packet(&device).await;
    assert_eq!(second.payload, Payload::Query { eid: 2 });

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_replies_routed_to_registered_listener() {
    let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let device_addr = device.local_addr().unwrap();

    let fallback = Arc::new(Recorder::default());
    let channel = MulticastChannel::new(loopback(50), fallback.clone()).unwrap();
    let session = Arc::new(Recorder::default());
    channel.register_listener(device_addr, session.clone());
    channel.open().unwrap();

    let addr = channel_addr(&channel).await;
    send_packet(&device, addr, &Packet::info(device_addr, Data::uint32(2, 42))).await;

    let received = wait_for(&session, 1).await;
    assert_eq!(received[0].payload, Payload::Info(Data::uint32(2, 42)));
    assert_eq!(received[0].remote, device_addr);
    assert!(fallback.received().is_empty());

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_unsolicited_packets_reach_fallback() {
    let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let device_addr = device.local_addr().unwrap();

    let fallback = Arc::new(Recorder::default());
    let channel = MulticastChannel::new(loopback(50), fallback.clone()).unwrap();
    channel.open().unwrap();

    let addr = channel_addr(&channel).await;
    send_packet(&device, addr, &Packet::info(device_addr, Data::bool(1, true))).await;

    let received = wait_for(&fallback, 1).await;
    assert_eq!(received[0].remote, device_addr);
    assert_eq!(received[0].payload, Payload::Info(Data::bool(1, true)));

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_corrupt_datagram_dropped() {
    let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let device_addr = device.local_addr().unwrap();

    let fallback = Arc::new(Recorder::default());
    let channel = MulticastChannel::new(loopback(50), fallback.clone()).unwrap();
    channel.open().unwrap();
    let addr = channel_addr(&channel).await;

    let mut frame = Codec::new()
        .encode(&Packet::query(device_addr, 1))
        .unwrap()
        .to_vec();
    frame[6] ^= 0x01;
    device.send_to(&frame, addr).await.unwrap();
    device.send_to(b"not a frame", addr).await.unwrap();
    send_packet(&device, addr, &Packet::query(device_addr, 7)).await;

    let received = wait_for(&fallback, 1).await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload, Payload::Query { eid: 7 });

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_more_work_cuts_receive_short() {
    let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let device_addr = device.local_addr().unwrap();

    // A receive timeout far beyond the test timeout: only the handler's
    // "more to send" answer can get the reply out in time
    let channel = MulticastChannel::new(loopback(60_000), Arc::new(Recorder::default())).unwrap();
    let session = Arc::new(Recorder::default());
    *session.reply.lock() = Some(Packet::query(device_addr, 5));
    channel.register_listener(device_addr, session.clone());
    channel.open().unwrap();

    let addr = channel_addr(&channel).await;
    send_packet(&device, addr, &Packet::info(device_addr, Data::uint8(4, 1))).await;

    let reply = recv_packet(&device).await;
    assert_eq!(reply.payload, Payload::Query { eid: 5 });

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_wake_flushes_immediately() {
    let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let device_addr = device.local_addr().unwrap();

    let channel = MulticastChannel::new(loopback(60_000), Arc::new(Recorder::default())).unwrap();
    channel.open().unwrap();
    channel_addr(&channel).await;

    let session = Arc::new(Recorder::default());
    session.queue(Packet::query(device_addr, 9));
    channel.register_listener(device_addr, session.clone());
    channel.listeners().wake();

    let packet = recv_packet(&device).await;
    assert_eq!(packet.payload, Payload::Query { eid: 9 });

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_close_interrupts_long_receive() {
    let channel = MulticastChannel::new(loopback(60_000), Arc::new(Recorder::default())).unwrap();
    channel.open().unwrap();
    channel_addr(&channel).await;

    timeout(Duration::from_secs(2), channel.close())
        .await
        .expect("close hung")
        .unwrap();
    assert_eq!(channel.local_addr(), None);
}
