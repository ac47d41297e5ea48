use crate::message::{Action, Message};
use crate::timeline::track::TrackKind;
use std::path::PathBuf;
use tokio::sync::mpsc::Sender;

/// Cloneable handle to a running controller.
#[derive(Clone, Debug)]
pub struct Client {
    tx: Sender<Message>,
}

impl Client {
    pub fn new(tx: Sender<Message>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, message: Message) {
        if let Err(e) = self.tx.send(message).await {
            tracing::error!("Controller channel closed: {e}");
        }
    }

    pub async fn request(&self, action: Action) {
        self.send(Message::Request(action)).await;
    }

    /// Registers `tx` to receive responses and transport notifications.
    pub async fn subscribe(&self, tx: Sender<Message>) {
        self.send(Message::Channel(tx)).await;
    }

    pub async fn open(&self, path: PathBuf) {
        self.request(Action::Open(path)).await;
    }

    pub async fn save(&self) {
        self.request(Action::Save).await;
    }

    pub async fn play(&self) {
        self.request(Action::Play(vec![])).await;
    }

    pub async fn stop(&self) {
        self.request(Action::Stop(vec![])).await;
    }

    pub async fn seek_seconds(&self, seconds: f32) {
        self.request(Action::SeekSeconds(seconds)).await;
    }

    pub async fn add_track(&self, kind: TrackKind, name: Option<String>) {
        self.request(Action::AddTrack {
            kind,
            name,
            file: None,
        })
        .await;
    }

    pub async fn remove_track(&self, name: String) {
        self.request(Action::RemoveTrack(name)).await;
    }

    pub async fn quit(&self) {
        self.request(Action::Quit).await;
    }
}
