use crate::timeline::track::TrackKind;
use rosc::OscMessage;
use std::path::PathBuf;
use tokio::sync::mpsc::Sender;

/// Everything a client can ask the controller to do. Requests come back as
/// `Message::Response(Ok(action))` on success so subscribers can mirror the
/// change, or `Response(Err(reason))` when the controller refuses.
#[derive(Clone, Debug)]
pub enum Action {
    Quit,

    Open(PathBuf),
    New { path: PathBuf, name: String },
    Save,

    /// Start playback. An empty list plays the whole timeline; otherwise
    /// only the named tracks play locally.
    Play(Vec<String>),
    Stop(Vec<String>),
    /// Start playback with curve recording armed on receiving tracks.
    Record,
    TogglePlay,

    SeekSeconds(f32),
    SeekMillis(u64),
    /// Normalized playhead position in `0.0..=1.0`.
    SeekPosition(f32),
    SeekTimecode(String),
    SetDurationSeconds(f32),
    SetDurationMillis(u64),
    SetDurationTimecode(String),
    SetLoop(bool),
    SetBpm(f32),

    EnableOscIn(bool),
    EnableOscOut(bool),
    SetOscRate(f32),
    SetOscInPort(u16),
    SetOscOutPort(u16),
    SetOscIp(String),
    SetTrackSend { track: String, enabled: bool },
    SetTrackReceive { track: String, enabled: bool },

    AddTrack {
        kind: TrackKind,
        name: Option<String>,
        file: Option<PathBuf>,
    },
    RemoveTrack(String),
    RenameTrack { track: String, display_name: String },
    SetValueRange { track: String, min: f32, max: f32 },
    SetValueMin { track: String, min: f32 },
    SetValueMax { track: String, max: f32 },
    LoadColorPalette { track: String, path: PathBuf },
    /// Targets the project's single audio track.
    LoadAudioClip(PathBuf),

    /// Send the `/duration/info` handshake and refresh every track on the
    /// next outgoing bundle.
    SendInfo,
}

#[derive(Clone, Debug)]
pub enum Message {
    Request(Action),
    Response(Result<Action, String>),
    /// Registers a subscriber for responses and transport notifications.
    Channel(Sender<Self>),
    /// A raw OSC message forwarded by the receiver task.
    OscIn(OscMessage),
}
