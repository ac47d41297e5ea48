//! The controller actor. It owns the timeline, project settings and OSC
//! bookkeeping outright; clients and the receiver task talk to it through
//! the message channel, and a millisecond tick drives the transport and the
//! outgoing bundle loop.

use crate::client::Client;
use crate::message::{Action, Message};
use crate::osc::output::OutputDispatch;
use crate::osc::{input, receiver, sender::OscSender};
use crate::project;
use crate::settings::{GLOBAL_SETTINGS_FILE, GlobalSettings, ProjectSettings};
use crate::timeline::track::{Track, TrackKind};
use crate::timeline::{Timeline, timecode};
use rosc::{OscMessage, OscType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 32;

pub struct Controller {
    rx: Receiver<Message>,
    self_tx: Sender<Message>,
    clients: Vec<Sender<Message>>,
    timeline: Timeline,
    settings: ProjectSettings,
    dispatch: OutputDispatch,
    sender: OscSender,
    receiver: Option<JoinHandle<()>>,
    projects_dir: PathBuf,
    app_start: Instant,
    /// Transport position at the previous event scan.
    last_scan: u64,
    /// Scan positions of tracks playing on their own clocks.
    local_scan: HashMap<String, u64>,
}

/// Spawns the controller with the given settings and returns a client
/// handle plus the join handle of the actor task.
pub async fn init(
    projects_dir: PathBuf,
    settings: ProjectSettings,
) -> Result<(Client, JoinHandle<()>), String> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let sender = OscSender::bind(&settings.osc_ip, settings.osc_out_port).await?;
    let receiver = receiver::spawn(settings.osc_in_port, tx.clone()).await?;
    let controller = Controller {
        rx,
        self_tx: tx.clone(),
        clients: vec![],
        timeline: Timeline::default(),
        settings,
        dispatch: OutputDispatch::default(),
        sender,
        receiver: Some(receiver),
        projects_dir,
        app_start: Instant::now(),
        last_scan: 0,
        local_scan: HashMap::new(),
    };
    Ok((Client::new(tx), tokio::spawn(controller.run())))
}

impl Controller {
    async fn run(mut self) {
        let mut tick = tokio::time::interval(Duration::from_millis(1));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                message = self.rx.recv() => {
                    let Some(message) = message else { break };
                    match message {
                        Message::Channel(tx) => self.clients.push(tx),
                        Message::OscIn(m) => self.handle_osc(m).await,
                        Message::Request(action) => {
                            let quit = matches!(action, Action::Quit);
                            let result = self.apply(action.clone()).await;
                            if let Err(e) = &result {
                                warn!("{e}");
                            }
                            self.notify_clients(Message::Response(result.map(|()| action)))
                                .await;
                            if quit {
                                break;
                            }
                        }
                        Message::Response(_) => {}
                    }
                }
                _ = tick.tick() => self.poll().await,
            }
        }
        if let Some(handle) = self.receiver.take() {
            handle.abort();
        }
        info!("Controller stopped");
    }

    async fn notify_clients(&mut self, message: Message) {
        let mut gone = vec![];
        for (at, client) in self.clients.iter().enumerate() {
            if client.send(message.clone()).await.is_err() {
                gone.push(at);
            }
        }
        for at in gone.into_iter().rev() {
            self.clients.remove(at);
        }
    }

    /// One tick: settle the transport, scan for bang and flag crossings,
    /// then let the dispatcher decide whether a bundle is due.
    async fn poll(&mut self) {
        self.timeline.settle();
        self.scan_events();
        if !self.settings.osc_out_enabled {
            return;
        }
        let app_millis = self.app_start.elapsed().as_millis() as u64;
        let interval = self.settings.bundle_interval_millis();
        if let Some(messages) = self.dispatch.dispatch(&self.timeline, app_millis, interval)
            && let Err(e) = self.sender.send_bundle(messages).await
        {
            warn!("{e}");
        }
    }

    /// Queues an OSC event for every bang or flag the transport passed
    /// since the previous tick. Tracks playing on their own clock scan
    /// against their local position.
    fn scan_events(&mut self) {
        let now = self.timeline.current_time_millis();
        let playing = self.timeline.is_playing();
        let duration = self.timeline.duration_millis();
        let in_point = self.timeline.in_point();
        let out_point = self.timeline.out_point();
        if self.settings.osc_out_enabled {
            for track in self.timeline.tracks() {
                if !matches!(track.kind(), TrackKind::Bangs | TrackKind::Flags) {
                    continue;
                }
                if let Some(local) = track.local_time_millis(duration) {
                    let prev = self
                        .local_scan
                        .insert(track.name.clone(), local)
                        .unwrap_or(local);
                    // Local clocks wrap over the whole timeline, not the
                    // loop region.
                    for flag in fired(track, prev, local, 0, duration) {
                        self.dispatch.queue_event(track, flag);
                    }
                } else if playing {
                    for flag in fired(track, self.last_scan, now, in_point, out_point) {
                        self.dispatch.queue_event(track, flag);
                    }
                }
            }
        }
        self.last_scan = now;
    }

    /// Inbound OSC. Track-addressed messages are consumed by every matching
    /// receiving track; anything else is tried as a `/duration/*` command.
    /// Bad commands are logged and dropped.
    async fn handle_osc(&mut self, message: OscMessage) {
        if !self.settings.osc_in_enabled {
            return;
        }
        let now = self.timeline.current_time_millis();
        let playing = self.timeline.is_playing();
        let mut handled = false;
        for track in self.timeline.tracks_mut() {
            if track.osc_address() != message.addr {
                continue;
            }
            let header = self.dispatch.header_mut(&track.name);
            if !header.receive {
                continue;
            }
            if playing {
                match track.kind() {
                    TrackKind::Curves => {
                        if let Some(OscType::Float(value)) = message.args.first()
                            && (*value != header.last_received || !header.has_received)
                        {
                            let _ = track.add_curve_keyframe(now, *value);
                            header.last_received = *value;
                            header.has_received = true;
                        }
                    }
                    TrackKind::Bangs => {
                        let _ = track.add_bang(now);
                    }
                    _ => {}
                }
            }
            header.last_input_at = Some(Instant::now());
            handled = true;
        }
        if handled {
            return;
        }

        match input::parse(&message) {
            Ok(Some(action)) => {
                let result = self.apply(action.clone()).await;
                if let Err(e) = &result {
                    warn!("{e}");
                }
                self.notify_clients(Message::Response(result.map(|()| action)))
                    .await;
            }
            Ok(None) => debug!("Ignoring OSC message to {}", message.addr),
            Err(e) => warn!("{e}"),
        }
    }

    async fn apply(&mut self, action: Action) -> Result<(), String> {
        match action {
            Action::Quit => {
                if project::exists(&self.settings.path)
                    && let Err(e) = project::save(&self.timeline, &self.settings, &self.dispatch)
                {
                    warn!("Save on quit failed: {e}");
                }
                Ok(())
            }
            Action::Open(path) => self.open_project(&self.resolve(&path)).await,
            Action::New { path, name } => {
                let dir = self.resolve(&path);
                let settings =
                    project::create(&dir, &name).map_err(|e| format!("New project failed: {e}"))?;
                self.install(Timeline::default(), settings, vec![]).await?;
                info!("Created project at {}", dir.display());
                Ok(())
            }
            Action::Save => project::save(&self.timeline, &self.settings, &self.dispatch)
                .map_err(|e| format!("Save failed: {e}")),
            Action::Play(names) => {
                if names.is_empty() {
                    if !self.timeline.is_playing() {
                        self.send_info().await?;
                        self.last_scan = self.timeline.current_time_millis();
                        self.timeline.play();
                    }
                    Ok(())
                } else {
                    let origin = self.timeline.current_time_millis();
                    for name in &names {
                        match self.timeline.track_by_display_name_mut(trim_slash(name)) {
                            Some(track) => track.play(origin),
                            None => warn!("Play skipped, no track named {name}"),
                        }
                    }
                    Ok(())
                }
            }
            Action::Stop(names) => {
                if names.is_empty() {
                    if self.timeline.is_playing() {
                        self.timeline.stop();
                    } else {
                        self.timeline.seek_millis(0);
                    }
                    Ok(())
                } else {
                    for name in &names {
                        match self.timeline.track_by_display_name_mut(trim_slash(name)) {
                            Some(track) => {
                                track.stop();
                                self.local_scan.remove(&track.name);
                            }
                            None => warn!("Stop skipped, no track named {name}"),
                        }
                    }
                    Ok(())
                }
            }
            Action::Record => Box::pin(self.apply(Action::Play(vec![]))).await,
            Action::TogglePlay => {
                if self.timeline.is_playing() {
                    Box::pin(self.apply(Action::Stop(vec![]))).await
                } else {
                    Box::pin(self.apply(Action::Play(vec![]))).await
                }
            }
            Action::SeekSeconds(seconds) => {
                self.timeline
                    .seek_millis((f64::from(seconds.max(0.0)) * 1_000.0) as u64);
                Ok(())
            }
            Action::SeekMillis(millis) => {
                self.timeline.seek_millis(millis);
                Ok(())
            }
            Action::SeekPosition(position) => {
                self.timeline.seek_percent(position);
                Ok(())
            }
            Action::SeekTimecode(code) => match timecode::parse(&code) {
                Some(millis) => {
                    self.timeline.seek_millis(millis);
                    Ok(())
                }
                None => Err(format!(
                    "Seek to timecode failed: bad timecode '{code}'. Please format HH:MM:SS:MMM"
                )),
            },
            Action::SetDurationSeconds(seconds) => {
                self.timeline
                    .set_duration_millis((f64::from(seconds.max(0.0)) * 1_000.0) as u64);
                Ok(())
            }
            Action::SetDurationMillis(millis) => {
                self.timeline.set_duration_millis(millis);
                Ok(())
            }
            Action::SetDurationTimecode(code) => match timecode::parse(&code) {
                Some(millis) => {
                    self.timeline.set_duration_millis(millis);
                    Ok(())
                }
                None => Err(format!("Set duration failed: bad timecode '{code}'")),
            },
            Action::SetLoop(enabled) => {
                self.timeline.loop_enabled = enabled;
                Ok(())
            }
            Action::SetBpm(bpm) => {
                if bpm > 0.0 && bpm.is_finite() {
                    self.timeline.bpm = bpm;
                    self.settings.bpm = bpm;
                    Ok(())
                } else {
                    Err(format!("BPM must be positive, got {bpm}"))
                }
            }
            Action::EnableOscIn(enabled) => {
                self.settings.osc_in_enabled = enabled;
                Ok(())
            }
            Action::EnableOscOut(enabled) => {
                self.settings.osc_out_enabled = enabled;
                Ok(())
            }
            Action::SetOscRate(rate) => self.settings.set_osc_rate(rate),
            Action::SetOscInPort(port) => {
                self.settings.set_osc_in_port(port)?;
                self.rebind_receiver().await
            }
            Action::SetOscOutPort(port) => {
                self.settings.set_osc_out_port(port)?;
                self.sender
                    .retarget(&self.settings.osc_ip, self.settings.osc_out_port);
                Ok(())
            }
            Action::SetOscIp(ip) => {
                self.settings.set_osc_ip(&ip)?;
                self.sender
                    .retarget(&self.settings.osc_ip, self.settings.osc_out_port);
                Ok(())
            }
            Action::SetTrackSend { track, enabled } => {
                let name = self.unique_name(&track)?;
                self.dispatch.header_mut(&name).send = enabled;
                Ok(())
            }
            Action::SetTrackReceive { track, enabled } => {
                let name = self.unique_name(&track)?;
                self.dispatch.header_mut(&name).receive = enabled;
                Ok(())
            }
            Action::AddTrack { kind, name, file } => self.add_track(kind, name, file).await,
            Action::RemoveTrack(track) => {
                let name = self.unique_name(&track)?;
                self.timeline.remove_track(&name);
                self.dispatch.remove(&name);
                self.local_scan.remove(&name);
                self.send_info().await
            }
            Action::RenameTrack {
                track,
                display_name,
            } => {
                let found = self
                    .timeline
                    .track_by_display_name_mut(trim_slash(&track))
                    .ok_or_else(|| format!("Set track name failed, no track named {track}"))?;
                found.display_name = display_name;
                Ok(())
            }
            Action::SetValueRange { track, min, max } => {
                self.with_display_track(&track, |t| {
                    t.set_value_range(crate::timeline::track::ValueRange { min, max })
                })
            }
            Action::SetValueMin { track, min } => self.with_display_track(&track, |t| {
                let mut range = t
                    .value_range()
                    .ok_or_else(|| format!("Track {} is not a Curves track", t.display_name))?;
                range.min = min;
                t.set_value_range(range)
            }),
            Action::SetValueMax { track, max } => self.with_display_track(&track, |t| {
                let mut range = t
                    .value_range()
                    .ok_or_else(|| format!("Track {} is not a Curves track", t.display_name))?;
                range.max = max;
                t.set_value_range(range)
            }),
            Action::LoadColorPalette { track, path } => {
                let duration = self.timeline.duration_millis();
                self.with_display_track(&track, |t| {
                    t.load_color_palette(&path.to_string_lossy(), duration)
                })
            }
            Action::LoadAudioClip(path) => {
                let clip = crate::audio::AudioClip::load(&path.to_string_lossy())?;
                let clip_millis = clip.duration_millis();
                let Some(track) = self
                    .timeline
                    .tracks_mut()
                    .find(|t| t.kind() == TrackKind::Audio)
                else {
                    return Err(
                        "Set audio clip failed, first add an audio track to the composition"
                            .to_string(),
                    );
                };
                track.set_audio_clip(clip)?;
                // The clip dictates the composition length.
                self.timeline.set_duration_millis(clip_millis.max(1));
                Ok(())
            }
            Action::SendInfo => self.send_info().await,
        }
    }

    async fn add_track(
        &mut self,
        kind: TrackKind,
        name: Option<String>,
        file: Option<PathBuf>,
    ) -> Result<(), String> {
        if kind == TrackKind::Audio && self.timeline.has_track_of_kind(TrackKind::Audio) {
            return Err("Add track failed, projects hold at most one audio track".to_string());
        }
        let base = name.unwrap_or_else(|| kind.as_str().to_string());
        let unique = self.timeline.confirmed_unique_name(&base);
        let mut track = Track::new(unique.clone(), kind, format!("{unique}_.xml"));
        track.display_name = base;
        if let Some(file) = file {
            match kind {
                TrackKind::Audio => {
                    let clip = crate::audio::AudioClip::load(&file.to_string_lossy())?;
                    let clip_millis = clip.duration_millis();
                    track.set_audio_clip(clip)?;
                    self.timeline.set_duration_millis(clip_millis.max(1));
                }
                TrackKind::Colors => {
                    let duration = self.timeline.duration_millis();
                    track.load_color_palette(&file.to_string_lossy(), duration)?;
                }
                _ => warn!("Ignoring file argument for a {} track", kind.as_str()),
            }
        }
        self.dispatch.header_mut(&unique);
        self.timeline.add_track(track);
        self.send_info().await
    }

    async fn open_project(&mut self, dir: &Path) -> Result<(), String> {
        let (timeline, settings, flags) =
            project::load(dir).map_err(|e| format!("Open {} failed: {e}", dir.display()))?;
        self.install(timeline, settings, flags).await?;
        self.remember_project(dir);
        info!("Opened project {}", dir.display());
        Ok(())
    }

    /// Records the opened project in the global settings so the next start
    /// reopens it.
    fn remember_project(&self, dir: &Path) {
        let path = self.projects_dir.join(GLOBAL_SETTINGS_FILE);
        let mut global = GlobalSettings::load(&path).unwrap_or_default();
        global.last_project_path = Some(dir.to_path_buf());
        global.last_project_name = Some(self.settings.name.clone());
        if let Err(e) = global.save(&path) {
            warn!("Global settings not saved: {e}");
        }
    }

    async fn install(
        &mut self,
        timeline: Timeline,
        settings: ProjectSettings,
        flags: Vec<project::TrackFlags>,
    ) -> Result<(), String> {
        let old_in_port = self.settings.osc_in_port;
        self.timeline = timeline;
        self.settings = settings;
        self.dispatch.clear();
        self.local_scan.clear();
        self.last_scan = self.timeline.current_time_millis();
        for flag in flags {
            let header = self.dispatch.header_mut(&flag.name);
            header.send = flag.send;
            header.receive = flag.receive;
        }
        self.sender
            .retarget(&self.settings.osc_ip, self.settings.osc_out_port);
        if self.settings.osc_in_port != old_in_port {
            self.rebind_receiver().await?;
        }
        self.send_info().await
    }

    /// Sends the `/duration/info` manifest and schedules a full refresh on
    /// the next bundle.
    async fn send_info(&mut self) -> Result<(), String> {
        if !self.settings.osc_out_enabled {
            return Ok(());
        }
        self.sender
            .send_message(OutputDispatch::info_message(&self.timeline))
            .await?;
        self.dispatch.force_refresh();
        Ok(())
    }

    /// Moves the inbound socket to the current in port by replacing the
    /// listener task.
    async fn rebind_receiver(&mut self) -> Result<(), String> {
        if let Some(handle) = self.receiver.take() {
            handle.abort();
        }
        self.receiver =
            Some(receiver::spawn(self.settings.osc_in_port, self.self_tx.clone()).await?);
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.projects_dir.join(path)
        }
    }

    fn unique_name(&self, display_name: &str) -> Result<String, String> {
        let wanted = trim_slash(display_name);
        self.timeline
            .tracks()
            .find(|t| trim_slash(&t.display_name) == wanted)
            .map(|t| t.name.clone())
            .ok_or_else(|| format!("No track named {display_name}"))
    }

    fn with_display_track(
        &mut self,
        display_name: &str,
        op: impl FnOnce(&mut Track) -> Result<(), String>,
    ) -> Result<(), String> {
        match self
            .timeline
            .track_by_display_name_mut(trim_slash(display_name))
        {
            Some(track) => op(track),
            None => Err(format!("No track named {display_name}")),
        }
    }
}

/// Commands name tracks with or without the leading slash.
fn trim_slash(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

/// Events crossed between two scan positions. A backwards step means the
/// clock wrapped from `wrap_end` to `wrap_start` this tick; only those two
/// partial spans are ever reached, so anything outside the wrap region must
/// not fire.
fn fired(
    track: &Track,
    prev: u64,
    now: u64,
    wrap_start: u64,
    wrap_end: u64,
) -> Vec<Option<String>> {
    if now >= prev {
        track.fired_between(prev, now)
    } else {
        let mut events = track.fired_between(prev, wrap_end);
        events.extend(track.fired_between(wrap_start, now));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bangs(positions: &[u64]) -> Track {
        let mut track = Track::new("hits".to_string(), TrackKind::Bangs, String::new());
        for millis in positions {
            track.add_bang(*millis).unwrap();
        }
        track
    }

    #[test]
    fn wrap_scan_stays_inside_the_loop_region() {
        // 30s timeline looping between 1s and 10s. The bangs at 500ms and
        // 20s sit outside the loop region and are never reached.
        let track = bangs(&[500, 1_020, 9_995, 20_000]);
        let events = fired(&track, 9_990, 1_050, 1_000, 10_000);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn forward_scan_ignores_the_wrap_region() {
        let track = bangs(&[500, 20_000]);
        let events = fired(&track, 0, 600, 1_000, 10_000);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn local_clock_wrap_covers_the_whole_timeline() {
        let track = bangs(&[20_000]);
        let events = fired(&track, 29_990, 10, 0, 30_000);
        assert!(events.is_empty());
        let events = fired(&track, 19_990, 10, 0, 30_000);
        assert_eq!(events.len(), 1);
    }
}
