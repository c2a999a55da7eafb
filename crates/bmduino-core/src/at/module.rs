use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_io::{Error as _, Read, ReadReady, Write};
use log::{debug, info, warn};

use super::response::{
    parse_access_point, parse_joined_ssid, parse_mac, parse_station, parse_status,
};
use super::{
    AtCommand, AtError, DEFAULT_TIMEOUT_MS, Frame, HTTP_TIMEOUT_MS, JOIN_TIMEOUT_MS,
    MQTT_TIMEOUT_MS, RESET_SETTLE_MS, RX_CAPACITY, SCAN_TIMEOUT_MS, take_frame,
};
use crate::config::MqttConfig;
use crate::identity::MacAddress;
use crate::model::{AccessPoint, InboundMessage, NetworkInfo};
use crate::traits::NetworkLink;

/// MQTT link id; the firmware supports a single connection.
const MQTT_LINK: u8 = 0;
/// `AT+MQTTUSERCFG` scheme for plain MQTT over TCP.
const MQTT_SCHEME_TCP: u8 = 1;
/// `AT+HTTPCLIENT` request type for GET.
const HTTP_GET: u8 = 2;
/// `AT+HTTPCLIENT` transport type for plain TCP.
const HTTP_TRANSPORT_TCP: u8 = 1;
/// Messages kept while nobody polls.
const INBOX_CAPACITY: usize = 8;

/// Lines and body collected up to the terminal `OK`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub body: String,
}

/// Serial Wi-Fi module running AT firmware
pub struct AtModule<U, D> {
    uart: U,
    delay: D,
    rx: Vec<u8>,
    inbox: VecDeque<InboundMessage>,
    joined: bool,
}

impl<U, D> AtModule<U, D>
where
    U: Read + Write + ReadReady,
    D: DelayNs,
{
    pub fn new(uart: U, delay: D) -> Self {
        Self {
            uart,
            delay,
            rx: Vec::with_capacity(256),
            inbox: VecDeque::new(),
            joined: false,
        }
    }

    pub fn release(self) -> (U, D) {
        (self.uart, self.delay)
    }

    /// Restart the module and put it in station mode with echo off.
    pub fn begin(&mut self) -> Result<(), AtError> {
        self.reset()?;
        self.command(&AtCommand::new(""), DEFAULT_TIMEOUT_MS)?;
        self.command(&AtCommand::raw("ATE0"), DEFAULT_TIMEOUT_MS)?;
        self.command(&AtCommand::new("CWMODE").int(1), DEFAULT_TIMEOUT_MS)?;
        info!("Wi-Fi module ready");
        Ok(())
    }

    /// Soft reset, then discard the boot banner.
    pub fn reset(&mut self) -> Result<(), AtError> {
        self.write_line(AtCommand::new("RST").as_str())?;
        self.delay.delay_ms(RESET_SETTLE_MS);
        self.joined = false;
        self.discard_input()
    }

    /// Send `command` and wait for `OK`.
    pub fn command(&mut self, command: &AtCommand, timeout_ms: u32) -> Result<Reply, AtError> {
        debug!("AT >> {}", command.as_str());
        self.write_line(command.as_str())?;
        self.read_reply(command.as_str(), timeout_ms)
    }

    fn write_line(&mut self, line: &str) -> Result<(), AtError> {
        self.uart
            .write_all(line.as_bytes())
            .map_err(|e| AtError::Io(e.kind()))?;
        self.uart
            .write_all(b"\r\n")
            .map_err(|e| AtError::Io(e.kind()))?;
        self.uart.flush().map_err(|e| AtError::Io(e.kind()))
    }

    /// Pull whatever the UART has buffered. Returns the number of bytes read.
    fn fill(&mut self) -> Result<usize, AtError> {
        if !self.uart.read_ready().map_err(|e| AtError::Io(e.kind()))? {
            return Ok(0);
        }
        let mut chunk = [0u8; 64];
        let n = self
            .uart
            .read(&mut chunk)
            .map_err(|e| AtError::Io(e.kind()))?;
        if self.rx.len() + n > RX_CAPACITY {
            self.rx.clear();
            return Err(AtError::Overflow(RX_CAPACITY));
        }
        self.rx.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn discard_input(&mut self) -> Result<(), AtError> {
        while self.fill()? > 0 {}
        self.rx.clear();
        Ok(())
    }

    fn queue_message(&mut self, message: InboundMessage) {
        debug!("message on {}", message.topic);
        if self.inbox.len() == INBOX_CAPACITY {
            warn!("inbox full, dropping oldest message");
            self.inbox.pop_front();
        }
        self.inbox.push_back(message);
    }

    fn read_reply(&mut self, echo: &str, timeout_ms: u32) -> Result<Reply, AtError> {
        let mut reply = Reply::default();
        let mut waited_ms = 0u32;

        loop {
            loop {
                let frame = match take_frame(&mut self.rx) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("dropped reply line: {}", e);
                        continue;
                    }
                };
                match frame {
                    Frame::Line(line) => match line.trim_end() {
                        "OK" | "SEND OK" => return Ok(reply),
                        "ERROR" => return Err(AtError::Rejected),
                        "FAIL" => return Err(AtError::Failed),
                        "" => {}
                        l if l == echo => {}
                        l if l.starts_with("busy") => debug!("AT << {}", l),
                        _ => {
                            debug!("AT << {}", line);
                            reply.lines.push(line);
                        }
                    },
                    Frame::HttpChunk(chunk) => reply.body.push_str(&chunk),
                    Frame::Message(message) => self.queue_message(message),
                }
            }

            if self.fill()? == 0 {
                if waited_ms >= timeout_ms {
                    warn!("AT timeout after {} ms: {}", timeout_ms, echo);
                    return Err(AtError::Timeout(timeout_ms));
                }
                self.delay.delay_ms(1);
                waited_ms += 1;
            }
        }
    }

    /// Collect unsolicited messages without sending anything.
    pub fn poll(&mut self) -> Result<(), AtError> {
        while self.fill()? > 0 {}
        while let Some(frame) = take_frame(&mut self.rx)? {
            match frame {
                Frame::Message(message) => self.queue_message(message),
                Frame::Line(line) if !line.is_empty() => debug!("AT << {}", line),
                _ => {}
            }
        }
        Ok(())
    }

    /// Raw station state from `AT+CIPSTATUS`.
    pub fn station_status(&mut self) -> Result<u8, AtError> {
        let reply = self.command(&AtCommand::new("CIPSTATUS"), DEFAULT_TIMEOUT_MS)?;
        parse_status(&reply.lines).ok_or_else(|| AtError::malformed("missing STATUS"))
    }
}

impl<U, D> NetworkLink for AtModule<U, D>
where
    U: Read + Write + ReadReady,
    D: DelayNs,
{
    type Error = AtError;

    fn connect(&mut self, ssid: &str, password: &str) -> Result<(), AtError> {
        self.command(&AtCommand::new("CWMODE").int(1), DEFAULT_TIMEOUT_MS)?;
        let join = AtCommand::new("CWJAP").string(ssid).string(password);
        match self.command(&join, JOIN_TIMEOUT_MS) {
            Ok(_) => {
                self.joined = true;
                info!("joined access point {}", ssid);
                Ok(())
            }
            Err(e) => {
                self.joined = false;
                Err(e)
            }
        }
    }

    fn is_connected(&mut self) -> bool {
        // 2: got IP, 3: TCP open, 4: TCP closed but still associated
        let connected = matches!(self.station_status(), Ok(2..=4));
        self.joined = connected;
        connected
    }

    fn mac_address(&mut self) -> Result<String, AtError> {
        let reply = self.command(&AtCommand::query("CIPSTAMAC"), DEFAULT_TIMEOUT_MS)?;
        let text = parse_mac(&reply.lines).ok_or_else(|| AtError::malformed("missing MAC"))?;
        let mac = MacAddress::parse(text).map_err(|_| AtError::malformed(text))?;
        Ok(String::from(mac.to_hex().as_str()))
    }

    fn network_info(&mut self) -> Result<NetworkInfo, AtError> {
        let mut info = NetworkInfo::default();
        if !self.is_connected() {
            return Ok(info);
        }

        let joined = self.command(&AtCommand::query("CWJAP"), DEFAULT_TIMEOUT_MS)?;
        info.ssid = parse_joined_ssid(&joined.lines).ok_or(AtError::NotConnected)?;

        let station = self.command(&AtCommand::query("CIPSTA"), DEFAULT_TIMEOUT_MS)?;
        parse_station(&station.lines, &mut info);
        Ok(info)
    }

    fn scan(&mut self) -> Result<Vec<AccessPoint>, AtError> {
        let reply = self.command(&AtCommand::new("CWLAP"), SCAN_TIMEOUT_MS)?;
        Ok(reply
            .lines
            .iter()
            .filter_map(|line| parse_access_point(line))
            .collect())
    }

    fn http_get(&mut self, server_url: &str, port: u16, path: &str) -> Result<String, AtError> {
        let mut url = String::with_capacity(server_url.len() + path.len() + 6);
        url.push_str(server_url.trim_end_matches('/'));
        url.push(':');
        url.push_str(itoa(port).as_str());
        url.push_str(path);

        let request = AtCommand::new("HTTPCLIENT")
            .int(HTTP_GET)
            .int(0)
            .string(&url)
            .empty()
            .empty()
            .int(HTTP_TRANSPORT_TCP);
        let reply = self.command(&request, HTTP_TIMEOUT_MS)?;
        Ok(reply.body)
    }

    fn mqtt_connect(&mut self, broker: &MqttConfig<'_>, client_id: &str) -> Result<(), AtError> {
        let user = AtCommand::new("MQTTUSERCFG")
            .int(MQTT_LINK)
            .int(MQTT_SCHEME_TCP)
            .string(client_id)
            .string(broker.username)
            .string(broker.password)
            .int(0)
            .int(0)
            .string("");
        self.command(&user, DEFAULT_TIMEOUT_MS)?;

        let connect = AtCommand::new("MQTTCONN")
            .int(MQTT_LINK)
            .string(broker.host)
            .int(broker.port)
            .int(1);
        self.command(&connect, MQTT_TIMEOUT_MS)?;
        Ok(())
    }

    fn mqtt_subscribe(&mut self, topic: &str) -> Result<(), AtError> {
        let subscribe = AtCommand::new("MQTTSUB")
            .int(MQTT_LINK)
            .string(topic)
            .int(0);
        self.command(&subscribe, MQTT_TIMEOUT_MS)?;
        Ok(())
    }

    fn mqtt_publish(&mut self, topic: &str, payload: &str) -> Result<(), AtError> {
        let publish = AtCommand::new("MQTTPUB")
            .int(MQTT_LINK)
            .string(topic)
            .escaped(payload)
            .int(0)
            .int(0);
        self.command(&publish, MQTT_TIMEOUT_MS)?;
        Ok(())
    }

    fn mqtt_poll(&mut self) -> Result<Option<InboundMessage>, AtError> {
        self.poll()?;
        Ok(self.inbox.pop_front())
    }
}

fn itoa(value: u16) -> heapless::String<5> {
    use core::fmt::Write as _;
    let mut text = heapless::String::new();
    // five digits always fit
    let _ = write!(text, "{}", value);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NoopDelay, ScriptedUart};

    fn module(script: &[(&str, &str)]) -> AtModule<ScriptedUart, NoopDelay> {
        AtModule::new(ScriptedUart::new(script), NoopDelay::default())
    }

    #[test]
    fn begin_resets_and_configures() {
        let mut wifi = module(&[
            ("AT+RST", "\r\nOK\r\nets Jan  8 2013\r\nready\r\n"),
            ("AT", "AT\r\n\r\nOK\r\n"),
            ("ATE0", "ATE0\r\n\r\nOK\r\n"),
            ("AT+CWMODE=1", "\r\nOK\r\n"),
        ]);
        wifi.begin().unwrap();
        let (uart, delay) = wifi.release();
        assert_eq!(uart.sent(), ["AT+RST", "AT", "ATE0", "AT+CWMODE=1"]);
        assert!(delay.total_ms >= RESET_SETTLE_MS);
    }

    #[test]
    fn join_success_and_failure() {
        let mut wifi = module(&[
            ("AT+CWMODE=1", "\r\nOK\r\n"),
            (
                "AT+CWJAP=\"NUKIOT\",\"iot12345\"",
                "WIFI CONNECTED\r\nWIFI GOT IP\r\n\r\nOK\r\n",
            ),
            ("AT+CWMODE=1", "\r\nOK\r\n"),
            ("AT+CWJAP=\"NUKIOT\",\"wrong\"", "+CWJAP:1\r\n\r\nFAIL\r\n"),
        ]);
        assert!(wifi.connect("NUKIOT", "iot12345").is_ok());
        assert_eq!(wifi.connect("NUKIOT", "wrong"), Err(AtError::Failed));
    }

    #[test]
    fn mac_is_normalised() {
        let mut wifi = module(&[(
            "AT+CIPSTAMAC?",
            "+CIPSTAMAC:\"e8:9f:6d:e8:f3:bc\"\r\n\r\nOK\r\n",
        )]);
        assert_eq!(wifi.mac_address().unwrap(), "E89F6DE8F3BC");
    }

    #[test]
    fn status_maps_to_connected() {
        let mut wifi = module(&[
            ("AT+CIPSTATUS", "STATUS:2\r\n\r\nOK\r\n"),
            ("AT+CIPSTATUS", "STATUS:5\r\n\r\nOK\r\n"),
        ]);
        assert!(wifi.is_connected());
        assert!(!wifi.is_connected());
    }

    #[test]
    fn network_info_when_associated() {
        let mut wifi = module(&[
            ("AT+CIPSTATUS", "STATUS:2\r\n\r\nOK\r\n"),
            (
                "AT+CWJAP?",
                "+CWJAP:\"NUKIOT\",\"aa:bb:cc:dd:ee:ff\",6,-52,0,0,0,0,0\r\n\r\nOK\r\n",
            ),
            (
                "AT+CIPSTA?",
                "+CIPSTA:ip:\"192.168.1.20\"\r\n+CIPSTA:gateway:\"192.168.1.1\"\r\n+CIPSTA:netmask:\"255.255.255.0\"\r\n\r\nOK\r\n",
            ),
        ]);
        let info = wifi.network_info().unwrap();
        assert_eq!(info.ssid.as_str(), "NUKIOT");
        assert_eq!(info.ip_address.as_str(), "192.168.1.20");
        assert_eq!(info.gateway.as_str(), "192.168.1.1");
        assert_eq!(info.netmask.as_str(), "255.255.255.0");
    }

    #[test]
    fn network_info_is_empty_when_down() {
        let mut wifi = module(&[("AT+CIPSTATUS", "STATUS:5\r\n\r\nOK\r\n")]);
        assert_eq!(wifi.network_info().unwrap(), NetworkInfo::default());
    }

    #[test]
    fn scan_lists_access_points() {
        let mut wifi = module(&[(
            "AT+CWLAP",
            "+CWLAP:(3,\"NUKIOT\",-48,\"aa:bb:cc:dd:ee:ff\",11,-1,-1,4,4,7,0)\r\n+CWLAP:(0,\"guest\",-80,\"11:22:33:44:55:66\",1,-1,-1,0,0,7,0)\r\n\r\nOK\r\n",
        )]);
        let aps = wifi.scan().unwrap();
        assert_eq!(aps.len(), 2);
        assert_eq!(aps[1].ssid.as_str(), "guest");
    }

    #[test]
    fn http_get_returns_body() {
        let mut wifi = module(&[(
            "AT+HTTPCLIENT=2,0,\"http://iot.arduino.org.tw:8888/a.php?MAC=AB&T=1.0\",,,1",
            "+HTTPCLIENT:18,Insert\r\nSuccessful\r\n\r\nOK\r\n",
        )]);
        let body = wifi
            .http_get("http://iot.arduino.org.tw", 8888, "/a.php?MAC=AB&T=1.0")
            .unwrap();
        assert!(body.contains("Successful"));
    }

    #[test]
    fn mqtt_connect_publish_and_receive() {
        let broker = MqttConfig::default();
        let mut wifi = module(&[
            (
                "AT+MQTTUSERCFG=0,1,\"twAB\",\"\",\"\",0,0,\"\"",
                "\r\nOK\r\n",
            ),
            ("AT+MQTTCONN=0,\"broker.emqx.io\",1883,1", "\r\nOK\r\n"),
            ("AT+MQTTSUB=0,\"/arduino/SW/#\",0", "\r\nOK\r\n"),
            (
                "AT+MQTTPUB=0,\"/arduino/SW/AB\",\"{\\\"a\\\":1}\",0,0",
                "\r\nOK\r\n+MQTTSUBRECV:0,\"/arduino/SW/AB\",4,ON:1\r\n",
            ),
        ]);
        wifi.mqtt_connect(&broker, "twAB").unwrap();
        wifi.mqtt_subscribe("/arduino/SW/#").unwrap();
        wifi.mqtt_publish("/arduino/SW/AB", "{\\\"a\\\":1}").unwrap();

        let message = wifi.mqtt_poll().unwrap().unwrap();
        assert_eq!(message.topic, "/arduino/SW/AB");
        assert_eq!(message.payload, "ON:1");
        assert_eq!(wifi.mqtt_poll().unwrap(), None);
    }

    #[test]
    fn bad_frame_does_not_jam_the_link() {
        let mut wifi = module(&[
            ("AT+CIPSTATUS", "STATUS:2\r\n\r\nOK\r\n"),
            ("AT+CIPSTATUS", "STATUS:2\r\n\r\nOK\r\n"),
        ]);
        wifi.uart.inject(b"+MQTTSUBRECV:0,\"/arduino/SW/AB\",x,ON:1\r\n");
        assert!(matches!(wifi.mqtt_poll(), Err(AtError::Malformed(_))));
        assert_eq!(wifi.mqtt_poll(), Ok(None));
        assert_eq!(wifi.station_status(), Ok(2));

        // a bad frame arriving during a command is skipped
        wifi.uart.inject(b"+HTTPCLIENT:zz,oops\r\n");
        assert_eq!(wifi.station_status(), Ok(2));
    }

    #[test]
    fn rejected_and_timeout() {
        let mut wifi = module(&[("AT+MQTTCONN=0,\"broker.emqx.io\",1883,1", "\r\nERROR\r\n")]);
        let broker = MqttConfig::default();
        let user_missing = wifi.mqtt_connect(&broker, "twAB");
        // the user config line was never scripted, so it times out
        assert_eq!(user_missing, Err(AtError::Timeout(DEFAULT_TIMEOUT_MS)));

        let mut wifi = module(&[("AT", "\r\nERROR\r\n")]);
        assert_eq!(
            wifi.command(&AtCommand::new(""), DEFAULT_TIMEOUT_MS),
            Err(AtError::Rejected)
        );
    }
}
