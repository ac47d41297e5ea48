use rosc::{OscBundle, OscMessage, OscPacket, OscTime, encoder};
use tokio::net::UdpSocket;

/// OSC "immediately" timetag.
const IMMEDIATE: OscTime = OscTime {
    seconds: 0,
    fractional: 1,
};

/// Outgoing UDP leg. The socket binds to an ephemeral local port; the
/// destination can be swapped at runtime when the user edits the out
/// endpoint.
#[derive(Debug)]
pub struct OscSender {
    socket: UdpSocket,
    target: String,
}

impl OscSender {
    pub async fn bind(ip: &str, port: u16) -> Result<Self, String> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| format!("Failed to bind OSC send socket: {e}"))?;
        Ok(Self {
            socket,
            target: format!("{ip}:{port}"),
        })
    }

    pub fn retarget(&mut self, ip: &str, port: u16) {
        self.target = format!("{ip}:{port}");
    }

    pub async fn send_message(&self, message: OscMessage) -> Result<(), String> {
        self.send_packet(OscPacket::Message(message)).await
    }

    pub async fn send_bundle(&self, messages: Vec<OscMessage>) -> Result<(), String> {
        self.send_packet(OscPacket::Bundle(OscBundle {
            timetag: IMMEDIATE,
            content: messages.into_iter().map(OscPacket::Message).collect(),
        }))
        .await
    }

    async fn send_packet(&self, packet: OscPacket) -> Result<(), String> {
        let bytes =
            encoder::encode(&packet).map_err(|e| format!("OSC encode failed: {e:?}"))?;
        self.socket
            .send_to(&bytes, &self.target)
            .await
            .map_err(|e| format!("OSC send to {} failed: {e}", self.target))?;
        Ok(())
    }
}
