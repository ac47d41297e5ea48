//! The outgoing bundle loop: one bundle per rate tick, one message per track
//! whose sampled value changed since the last send.

use crate::timeline::Timeline;
use crate::timeline::track::{Rgb, Track, TrackContent, TrackKind};
use rosc::{OscMessage, OscType};
use std::collections::HashMap;
use std::time::Instant;

/// Per-track OSC bookkeeping, keyed by the track's unique name. Tracks both
/// directions: what was last sent (for change suppression on the way out)
/// and what was last recorded (to drop duplicate inbound curve values).
#[derive(Clone, Debug)]
pub struct TrackHeader {
    pub send: bool,
    pub receive: bool,
    last_float: f32,
    last_bool: bool,
    last_color: Rgb,
    has_sent: bool,
    pub last_received: f32,
    pub has_received: bool,
    pub last_input_at: Option<Instant>,
}

impl Default for TrackHeader {
    fn default() -> Self {
        Self {
            send: true,
            receive: true,
            last_float: 0.0,
            last_bool: false,
            last_color: Rgb::default(),
            has_sent: false,
            last_received: 0.0,
            has_received: false,
            last_input_at: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct OutputDispatch {
    headers: HashMap<String, TrackHeader>,
    /// Bang and flag messages queued between bundles, sent verbatim.
    events: Vec<OscMessage>,
    refresh_all: bool,
    last_bundle_at: Option<u64>,
}

impl OutputDispatch {
    pub fn header(&self, track: &str) -> Option<&TrackHeader> {
        self.headers.get(track)
    }

    pub fn header_mut(&mut self, track: &str) -> &mut TrackHeader {
        self.headers.entry(track.to_string()).or_default()
    }

    pub fn remove(&mut self, track: &str) {
        self.headers.remove(track);
    }

    pub fn clear(&mut self) {
        self.headers.clear();
        self.events.clear();
        self.refresh_all = false;
        self.last_bundle_at = None;
    }

    /// Every track resends on the next bundle even if its value is
    /// unchanged. Set after the `/duration/info` handshake and after a
    /// project load so listeners start from a known state.
    pub fn force_refresh(&mut self) {
        self.refresh_all = true;
    }

    pub fn sends(&self, track: &str) -> bool {
        self.headers.get(track).is_none_or(|h| h.send)
    }

    pub fn receives(&self, track: &str) -> bool {
        self.headers.get(track).is_none_or(|h| h.receive)
    }

    /// Queues a bang or flag event for the next bundle.
    pub fn queue_event(&mut self, track: &Track, flag: Option<String>) {
        if !self.sends(&track.name) {
            return;
        }
        let args = match flag {
            Some(text) => vec![OscType::String(text)],
            None => vec![],
        };
        self.events.push(OscMessage {
            addr: track.osc_address(),
            args,
        });
    }

    /// One rate tick. `app_millis` is a monotonic app clock; a bundle goes
    /// out at most once per `interval_millis`. Returns the messages to send,
    /// or `None` when the gate is closed or nothing changed. The gate
    /// advances even when the bundle is empty.
    pub fn dispatch(
        &mut self,
        timeline: &Timeline,
        app_millis: u64,
        interval_millis: u64,
    ) -> Option<Vec<OscMessage>> {
        if let Some(last) = self.last_bundle_at
            && last + interval_millis > app_millis
        {
            return None;
        }
        self.last_bundle_at = Some(app_millis);

        let sample_millis = timeline.current_time_millis();
        let duration = timeline.duration_millis();
        let mut messages = vec![];
        for track in timeline.tracks() {
            let header = self.headers.entry(track.name.clone()).or_default();
            if !header.send {
                continue;
            }
            let track_millis = track.local_time_millis(duration).unwrap_or(sample_millis);
            let refresh = self.refresh_all || !header.has_sent;
            let args = match &track.content {
                TrackContent::Curves { .. } | TrackContent::Lfo { .. } => {
                    let value = track.value_at(track_millis).unwrap_or_default();
                    if value != header.last_float || refresh {
                        header.last_float = value;
                        header.has_sent = true;
                        Some(vec![OscType::Float(value)])
                    } else {
                        None
                    }
                }
                TrackContent::Switches(_) => {
                    let on = track.is_on_at(track_millis).unwrap_or_default();
                    if on != header.last_bool || refresh {
                        header.last_bool = on;
                        header.has_sent = true;
                        Some(vec![OscType::Int(i32::from(on))])
                    } else {
                        None
                    }
                }
                TrackContent::Colors { .. } => {
                    let color = track.color_at(track_millis).unwrap_or_default();
                    if color != header.last_color || refresh {
                        header.last_color = color;
                        header.has_sent = true;
                        Some(vec![
                            OscType::Int(i32::from(color.r)),
                            OscType::Int(i32::from(color.g)),
                            OscType::Int(i32::from(color.b)),
                        ])
                    } else {
                        None
                    }
                }
                // FFT bins stream without suppression while anything plays.
                TrackContent::Audio { clip: Some(clip) }
                    if track.is_playing() || timeline.is_playing() =>
                {
                    Some(clip.fft_bins(track_millis).into_iter().map(OscType::Float).collect())
                }
                _ => None,
            };
            if let Some(args) = args {
                messages.push(OscMessage {
                    addr: track.osc_address(),
                    args,
                });
            }
        }

        messages.append(&mut self.events);
        if messages.is_empty() {
            None
        } else {
            self.refresh_all = false;
            Some(messages)
        }
    }

    /// The `/duration/info` manifest: type and address per track, plus the
    /// value range for curve-like tracks.
    pub fn info_message(timeline: &Timeline) -> OscMessage {
        let mut args = vec![];
        for track in timeline.tracks() {
            args.push(OscType::String(track.kind().as_str().to_string()));
            args.push(OscType::String(track.osc_address()));
            if matches!(track.kind(), TrackKind::Curves | TrackKind::Lfo)
                && let Some(range) = track.value_range()
            {
                args.push(OscType::Float(range.min));
                args.push(OscType::Float(range.max));
            }
        }
        OscMessage {
            addr: "/duration/info".to_string(),
            args,
        }
    }
}
