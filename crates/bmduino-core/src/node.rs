//! Sensor node context
//!
//! `SensorNode` owns the network link and everything derived at start-up.
//! The sketches borrow it to publish or upload readings instead of sharing
//! file-scope globals.

use alloc::string::String;

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::config::KitConfig;
use crate::escape::escape_at_payload;
use crate::identity::{DeviceIdentity, IdentityError, MacAddress};
use crate::model::{Climate, InboundMessage};
use crate::payload::{PayloadError, SensorReading, http_query_path, mqtt_payload};
use crate::traits::NetworkLink;

pub const STATUS_MQTT_OK: &str = "MQTT OK";
pub const STATUS_MQTT_FAIL: &str = "MQTT Fail";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalReason {
    /// The broker refused every connection attempt.
    Broker,
    /// The module reported a MAC that could not be used.
    Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Uninitialized,
    Connecting,
    Ready,
    /// Wi-Fi did not come up; the node keeps running.
    Degraded,
    /// Start-up failed and the operator has to intervene.
    Fatal(FatalReason),
}

#[derive(Error, Debug)]
pub enum NodeError<E> {
    #[error("network link: {0}")]
    Link(E),
    #[error("identity: {0}")]
    Identity(IdentityError),
    #[error("payload: {0}")]
    Payload(PayloadError),
    #[error("node has not been started")]
    NotStarted,
    #[error("node halted: {0:?}")]
    Halted(FatalReason),
}

impl<E> From<PayloadError> for NodeError<E> {
    fn from(e: PayloadError) -> Self {
        Self::Payload(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    Sent,
    Failed,
}

impl PublishStatus {
    /// Text shown on the display after a publish.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => STATUS_MQTT_OK,
            Self::Failed => STATUS_MQTT_FAIL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Accepted,
    /// Body of a response that lacked the success marker.
    Rejected(String),
}

pub struct SensorNode<'a, L, D> {
    link: L,
    delay: D,
    config: KitConfig<'a>,
    identity: Option<DeviceIdentity>,
    state: NodeState,
}

impl<'a, L, D> SensorNode<'a, L, D>
where
    L: NetworkLink,
    D: DelayNs,
{
    pub fn new(link: L, delay: D, config: KitConfig<'a>) -> Self {
        Self {
            link,
            delay,
            config,
            identity: None,
            state: NodeState::Uninitialized,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    pub fn link(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn config(&self) -> &KitConfig<'a> {
        &self.config
    }

    /// Join the access point and derive the identity from the MAC.
    ///
    /// A failed join leaves the node `Degraded`; it does not stop start-up.
    pub fn join(&mut self) -> Result<(), NodeError<L::Error>> {
        if let NodeState::Fatal(reason) = self.state {
            return Err(NodeError::Halted(reason));
        }
        self.state = NodeState::Connecting;

        let wifi = self.config.wifi;
        info!("Connecting to Wi-Fi {}", wifi.ssid);
        let joined = match self.link.connect(wifi.ssid, wifi.password) {
            Ok(()) => {
                info!("Wi-Fi connected");
                self.delay.delay_ms(self.config.timing.wifi_settle_ms);
                true
            }
            Err(e) => {
                warn!("Wi-Fi connect failed: {}", e);
                false
            }
        };

        let identity = self.read_identity()?;
        info!("MAC: {}", identity.mac);
        self.identity = Some(identity);
        self.state = if joined {
            NodeState::Ready
        } else {
            NodeState::Degraded
        };
        Ok(())
    }

    fn read_identity(&mut self) -> Result<DeviceIdentity, NodeError<L::Error>> {
        let mac = self.link.mac_address().map_err(NodeError::Link)?;
        let mqtt = self.config.mqtt;
        MacAddress::parse(&mac)
            .and_then(|mac| DeviceIdentity::derive(mac, mqtt.publish_topic, mqtt.subscribe_topic))
            .map_err(|e| {
                error!("cannot derive identity from {}: {}", mac, e);
                self.state = NodeState::Fatal(FatalReason::Identity);
                NodeError::Identity(e)
            })
    }

    /// Full MQTT start-up: join, connect to the broker, subscribe.
    ///
    /// When the broker cannot be reached within the retry policy the node
    /// becomes `Fatal(Broker)` and stays there.
    pub fn start(&mut self) -> Result<(), NodeError<L::Error>> {
        self.join()?;
        let Some(identity) = self.identity.as_ref() else {
            return Err(NodeError::NotStarted);
        };
        let broker = self.config.mqtt;
        let retry = self.config.timing.retry;

        info!("Connecting to MQTT broker {}:{}", broker.host, broker.port);
        let mut connected = false;
        for attempt in 0..retry.attempts.max(1) {
            let wait = retry.delay_before(attempt);
            if wait > 0 {
                self.delay.delay_ms(wait);
            }
            match self.link.mqtt_connect(&broker, &identity.client_id) {
                Ok(()) => {
                    connected = true;
                    break;
                }
                Err(e) => warn!("MQTT connect attempt {} failed: {}", attempt + 1, e),
            }
        }
        if !connected {
            error!("MQTT connect failed, halting");
            self.state = NodeState::Fatal(FatalReason::Broker);
            return Err(NodeError::Halted(FatalReason::Broker));
        }
        info!("MQTT connected as {}", identity.client_id);

        if !identity.subscribe_topic.is_empty() {
            self.link
                .mqtt_subscribe(&identity.subscribe_topic)
                .map_err(NodeError::Link)?;
            info!("Subscribed to {}", identity.subscribe_topic);
        }
        self.state = NodeState::Ready;
        Ok(())
    }

    fn started(&self) -> Result<&DeviceIdentity, NodeError<L::Error>> {
        match (self.state, self.identity.as_ref()) {
            (NodeState::Fatal(reason), _) => Err(NodeError::Halted(reason)),
            (_, Some(identity)) => Ok(identity),
            (_, None) => Err(NodeError::NotStarted),
        }
    }

    /// Publish a reading as JSON on the publish topic.
    pub fn publish(&mut self, climate: &Climate) -> Result<PublishStatus, NodeError<L::Error>> {
        let identity = self.started()?;
        let device = identity.device();
        let reading = SensorReading::new(&device, climate.temperature, climate.humidity);
        let payload = mqtt_payload(&reading)?;
        info!("Publish {}", payload);
        self.send(&payload)
    }

    /// Publish free text on the publish topic.
    pub fn publish_text(&mut self, text: &str) -> Result<PublishStatus, NodeError<L::Error>> {
        self.started()?;
        let payload = escape_at_payload(text);
        self.send(&payload)
    }

    fn send(&mut self, payload: &str) -> Result<PublishStatus, NodeError<L::Error>> {
        let topic = self.started()?.publish_topic.clone();
        match self.link.mqtt_publish(&topic, payload) {
            Ok(()) => {
                info!("Message sent to {}", topic);
                self.delay.delay_ms(self.config.timing.publish_settle_ms);
                Ok(PublishStatus::Sent)
            }
            Err(e) => {
                warn!("Message failed to send: {}", e);
                Ok(PublishStatus::Failed)
            }
        }
    }

    /// Next message received on the subscribed topic.
    pub fn poll(&mut self) -> Result<Option<InboundMessage>, NodeError<L::Error>> {
        self.started()?;
        self.link.mqtt_poll().map_err(NodeError::Link)
    }

    /// Send a reading to the upload endpoint with an HTTP GET.
    ///
    /// Rejoins the access point first when the link has dropped.
    pub fn upload(&mut self, climate: &Climate) -> Result<UploadStatus, NodeError<L::Error>> {
        self.started()?;
        if !self.link.is_connected() {
            warn!("Wi-Fi down, reconnecting");
            let wifi = self.config.wifi;
            match self.link.connect(wifi.ssid, wifi.password) {
                Ok(()) => self.state = NodeState::Ready,
                Err(e) => {
                    self.state = NodeState::Degraded;
                    return Err(NodeError::Link(e));
                }
            }
        }

        let identity = self.started()?;
        let device = identity.device();
        let reading = SensorReading::new(&device, climate.temperature, climate.humidity);
        let http = self.config.http;
        let path = http_query_path(http.path_template, &reading)?;
        info!("GET {}:{}{}", http.server_url, http.port, path);

        let body = self
            .link
            .http_get(http.server_url, http.port, &path)
            .map_err(NodeError::Link)?;
        if body.contains(http.success_marker) {
            info!("Upload accepted");
            Ok(UploadStatus::Accepted)
        } else {
            warn!("Upload rejected: {}", body);
            Ok(UploadStatus::Rejected(body))
        }
    }
}
