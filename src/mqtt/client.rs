//! rumqttc-backed [`Transport`]
//!
//! rumqttc drives the network from an `EventLoop` that must be polled. Each call
//! to [`RumqttTransport::connect`] builds a fresh client and spawns a pump task
//! that polls the loop, flips the liveness flag and forwards incoming PUBLISH
//! packets to the device's inbound channel. The pump stops on the first error,
//! so reconnect policy stays with the connection manager instead of rumqttc.
//! Forwarding never blocks: while the inbound channel is full, incoming messages
//! are dropped so the liveness flag keeps tracking the socket.

use super::config::ConnectOptions;
use super::error::TransportError;
use super::transport::{InboundMessage, Transport};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};

const REQUEST_CAPACITY: usize = 32;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

struct Session {
    client: AsyncClient,
    alive: Arc<AtomicBool>,
    // Aborted when the session is dropped
    pump: AbortOnDropHandle<()>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Session")
            .field("alive", &self.alive.load(Ordering::Acquire))
            .finish()
    }
}

#[derive(Debug)]
pub struct RumqttTransport {
    session: Mutex<Option<Session>>,
    inbound: mpsc::Sender<InboundMessage>,
}

impl RumqttTransport {
    pub fn new(inbound: mpsc::Sender<InboundMessage>) -> Self {
        Self {
            session: Mutex::new(None),
            inbound,
        }
    }

    /// Transport plus the receiving end of its inbound message channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<InboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    async fn client(&self) -> Result<AsyncClient, TransportError> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.client.clone())
            .ok_or(TransportError::NotConnected)
    }
}

fn mqtt_options(options: &ConnectOptions) -> MqttOptions {
    let mut mqtt_options = MqttOptions::new(&options.client_id, &options.host, options.port);
    mqtt_options
        .set_credentials(options.username.clone(), options.password.clone())
        .set_keep_alive(options.keep_alive)
        .set_clean_session(true);
    if options.use_tls {
        mqtt_options.set_transport(rumqttc::Transport::tls_with_default_config());
    }
    mqtt_options
}

#[async_trait]
impl Transport for RumqttTransport {
    async fn connect(&self, options: &ConnectOptions) -> Result<(), TransportError> {
        if self.session.lock().await.take().is_some() {
            debug!("Discarding previous session of {}", options.client_id);
        }

        let (client, eventloop) = AsyncClient::new(mqtt_options(options), REQUEST_CAPACITY);
        let alive = Arc::new(AtomicBool::new(false));
        let (ack_tx, ack_rx) = oneshot::channel();
        let pump = AbortOnDropHandle::new(tokio::spawn(pump_events(
            eventloop,
            alive.clone(),
            self.inbound.clone(),
            ack_tx,
        )));

        match timeout(CONNECT_TIMEOUT, ack_rx).await {
            Ok(Ok(Ok(()))) => {
                info!(
                    "Connected to {}:{} as {}",
                    options.host, options.port, options.client_id
                );
                *self.session.lock().await = Some(Session {
                    client,
                    alive,
                    pump,
                });
                Ok(())
            }
            Ok(Ok(Err(reason))) => Err(TransportError::Connection(reason)),
            Ok(Err(_)) => Err(TransportError::Connection(
                "event loop stopped before CONNACK".to_string(),
            )),
            Err(_) => Err(TransportError::Timeout(CONNECT_TIMEOUT)),
        }
    }

    async fn is_alive(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| session.alive.load(Ordering::Acquire))
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError> {
        let client = self.client().await?;
        client.subscribe(topic, qos).await?;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), TransportError> {
        let client = self.client().await?;
        client.publish(topic, qos, false, payload).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Ok(());
        };
        session.alive.store(false, Ordering::Release);
        let result = session.client.disconnect().await;
        // Let the pump flush the DISCONNECT before the session is dropped
        if timeout(DISCONNECT_GRACE, &mut session.pump).await.is_err() {
            debug!("Event loop did not stop within {:?}", DISCONNECT_GRACE);
        }
        result.map_err(TransportError::from)
    }
}

async fn pump_events(
    mut eventloop: EventLoop,
    alive: Arc<AtomicBool>,
    inbound: mpsc::Sender<InboundMessage>,
    ack_tx: oneshot::Sender<Result<(), String>>,
) {
    let mut ack_tx = Some(ack_tx);
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                debug!("CONNACK received: {:?}", ack.code);
                alive.store(true, Ordering::Release);
                if let Some(tx) = ack_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                // Never wait on the consumer; the loop must keep polling for keep-alive and errors
                let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                match inbound.try_send(message) {
                    Ok(()) => {}
                    Err(TrySendError::Full(message)) => {
                        debug!("Inbound channel full, dropping message for {}", message.topic);
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("Inbound receiver dropped, stopping event loop");
                        break;
                    }
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker closed the session");
                break;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT event loop error: {}", e);
                if let Some(tx) = ack_tx.take() {
                    let _ = tx.send(Err(e.to_string()));
                }
                break;
            }
        }
    }
    alive.store(false, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(use_tls: bool) -> ConnectOptions {
        ConnectOptions {
            client_id: "sensor-1".to_string(),
            host: "broker.local".to_string(),
            port: 8883,
            username: "sensor-1".to_string(),
            password: "secret".to_string(),
            use_tls,
            keep_alive: Duration::from_secs(5),
        }
    }

    #[test]
    fn options_carry_identity_and_keep_alive() {
        let mqtt = mqtt_options(&options(false));
        assert_eq!(mqtt.client_id(), "sensor-1");
        assert_eq!(mqtt.broker_address(), ("broker.local".to_string(), 8883));
        assert_eq!(mqtt.keep_alive(), Duration::from_secs(5));
        assert!(matches!(mqtt.transport(), rumqttc::Transport::Tcp));
    }

    #[test]
    fn tls_flag_switches_transport() {
        let mqtt = mqtt_options(&options(true));
        assert!(!matches!(mqtt.transport(), rumqttc::Transport::Tcp));
    }

    #[tokio::test]
    async fn requests_without_session_fail() {
        let (transport, _rx) = RumqttTransport::channel(4);
        assert!(!transport.is_alive().await);
        assert!(matches!(
            transport.publish("telemetry", b"{}".to_vec(), QoS::AtMostOnce).await,
            Err(TransportError::NotConnected)
        ));
        assert!(transport.disconnect().await.is_ok());
    }

    // Minimal broker: reads CONNECT, answers CONNACK, pushes `publishes` QoS 0
    // PUBLISH packets and closes the socket once `close` fires.
    async fn local_broker(publishes: usize) -> (ConnectOptions, oneshot::Sender<()>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (close_tx, close_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut connect = [0u8; 256];
            let _ = socket.read(&mut connect).await.unwrap();
            socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
            for _ in 0..publishes {
                socket
                    .write_all(&publish_packet("device/outbound/ping", b"x"))
                    .await
                    .unwrap();
            }
            let _ = close_rx.await;
        });

        let mut options = options(false);
        options.host = "127.0.0.1".to_string();
        options.port = port;
        (options, close_tx)
    }

    fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
        let mut packet = vec![0x30, (2 + topic.len() + payload.len()) as u8];
        packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
        packet.extend_from_slice(topic.as_bytes());
        packet.extend_from_slice(payload);
        packet
    }

    async fn becomes_dead(transport: &RumqttTransport) -> bool {
        for _ in 0..50 {
            if !transport.is_alive().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    #[tokio::test]
    async fn connack_marks_alive_and_publishes_are_forwarded() {
        let (options, close) = local_broker(1).await;
        let (transport, mut rx) = RumqttTransport::channel(4);

        transport.connect(&options).await.unwrap();
        assert!(transport.is_alive().await);

        let message = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(message, InboundMessage::new("device/outbound/ping", "x"));

        close.send(()).unwrap();
        assert!(becomes_dead(&transport).await);
    }

    #[tokio::test]
    async fn broker_close_is_seen_while_inbound_channel_is_full() {
        let (options, close) = local_broker(3).await;
        let (transport, mut rx) = RumqttTransport::channel(1);

        transport.connect(&options).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Nobody drains the channel while the broker goes away
        close.send(()).unwrap();
        assert!(becomes_dead(&transport).await);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut options = options(false);
        options.host = "127.0.0.1".to_string();
        options.port = port;
        let (transport, _rx) = RumqttTransport::channel(4);

        assert!(matches!(
            transport.connect(&options).await,
            Err(TransportError::Connection(_))
        ));
        assert!(!transport.is_alive().await);
    }
}
