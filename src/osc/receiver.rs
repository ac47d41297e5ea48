use crate::message::Message;
use rosc::{OscPacket, decoder};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Binds the inbound UDP port and spawns the listener task. Every decoded
/// message is forwarded to the controller as `Message::OscIn`; changing the
/// in port means aborting this task and spawning a fresh one.
pub async fn spawn(port: u16, tx: Sender<Message>) -> Result<JoinHandle<()>, String> {
    let socket = UdpSocket::bind(("0.0.0.0", port))
        .await
        .map_err(|e| format!("Failed to bind OSC in port {port}: {e}"))?;
    Ok(tokio::spawn(listen(socket, tx)))
}

async fn listen(socket: UdpSocket, tx: Sender<Message>) {
    let mut buf = [0u8; decoder::MTU];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("OSC receive error: {e}");
                continue;
            }
        };
        match decoder::decode_udp(&buf[..len]) {
            Ok((_, packet)) => {
                if forward(packet, &tx).await.is_err() {
                    debug!("Controller gone, OSC receiver shutting down");
                    return;
                }
            }
            Err(e) => warn!("Dropping malformed OSC packet from {peer}: {e:?}"),
        }
    }
}

/// Bundles are flattened; each contained message is handled on its own.
async fn forward(
    packet: OscPacket,
    tx: &Sender<Message>,
) -> Result<(), tokio::sync::mpsc::error::SendError<Message>> {
    match packet {
        OscPacket::Message(message) => tx.send(Message::OscIn(message)).await,
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                Box::pin(forward(inner, tx)).await?;
            }
            Ok(())
        }
    }
}
