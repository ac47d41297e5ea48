pub mod timecode;
pub mod track;

use std::time::Instant;
use track::{Track, TrackKind};

pub const DEFAULT_DURATION_MILLIS: u64 = 30_000;
pub const DEFAULT_PAGE_NAME: &str = "defaultPage";

#[derive(Debug)]
pub struct Page {
    pub name: String,
    pub tracks: Vec<Track>,
}

impl Page {
    pub fn new(name: String) -> Self {
        Self {
            name,
            tracks: vec![],
        }
    }
}

/// The timeline proper: ordered pages of tracks plus the global transport.
/// Playback is wall clock based; the playhead field holds the transport
/// origin while playing and the resting position otherwise.
#[derive(Debug)]
pub struct Timeline {
    pub pages: Vec<Page>,
    duration: u64,
    playhead: u64,
    in_point: u64,
    out_point: u64,
    pub loop_enabled: bool,
    pub bpm: f32,
    playing_since: Option<Instant>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self {
            pages: vec![Page::new(DEFAULT_PAGE_NAME.to_string())],
            duration: DEFAULT_DURATION_MILLIS,
            playhead: 0,
            in_point: 0,
            out_point: DEFAULT_DURATION_MILLIS,
            loop_enabled: true,
            bpm: 120.0,
            playing_since: None,
        }
    }
}

impl Timeline {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn duration_millis(&self) -> u64 {
        self.duration
    }

    pub fn set_duration_millis(&mut self, millis: u64) {
        self.duration = millis.max(1);
        self.in_point = self.in_point.min(self.duration);
        if self.out_point > self.duration || self.out_point <= self.in_point {
            self.out_point = self.duration;
        }
        self.playhead = self.playhead.min(self.duration);
    }

    pub fn in_point(&self) -> u64 {
        self.in_point
    }

    pub fn out_point(&self) -> u64 {
        self.out_point
    }

    pub fn set_in_point_millis(&mut self, millis: u64) {
        self.in_point = millis.min(self.duration);
        if self.out_point <= self.in_point {
            self.out_point = self.duration;
        }
    }

    pub fn set_out_point_millis(&mut self, millis: u64) {
        if millis > self.in_point {
            self.out_point = millis.min(self.duration);
        }
    }

    fn region_end(&self) -> u64 {
        if self.out_point > self.in_point {
            self.out_point.min(self.duration)
        } else {
            self.duration
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing_since.is_some()
    }

    pub fn play(&mut self) {
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
        }
    }

    /// Pauses the transport, leaving the playhead where it was.
    pub fn stop(&mut self) {
        self.playhead = self.current_time_millis();
        self.playing_since = None;
    }

    pub fn current_time_millis(&self) -> u64 {
        let Some(since) = self.playing_since else {
            return self.playhead;
        };
        let t = self.playhead + since.elapsed().as_millis() as u64;
        let end = self.region_end();
        if t < end {
            t
        } else if self.loop_enabled {
            let span = (end - self.in_point).max(1);
            self.in_point + (t - self.in_point) % span
        } else {
            end
        }
    }

    pub fn current_timecode(&self) -> String {
        timecode::format(self.current_time_millis())
    }

    pub fn duration_timecode(&self) -> String {
        timecode::format(self.duration)
    }

    /// Stops a non-looping transport that has reached the region end.
    /// Called once per poll tick.
    pub fn settle(&mut self) {
        if self.playing_since.is_some()
            && !self.loop_enabled
            && self.current_time_millis() >= self.region_end()
        {
            self.playhead = self.region_end();
            self.playing_since = None;
        }
    }

    pub fn seek_millis(&mut self, millis: u64) {
        let clamped = millis.min(self.duration);
        self.playhead = clamped;
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
    }

    pub fn seek_percent(&mut self, percent: f32) {
        let p = percent.clamp(0.0, 1.0);
        self.seek_millis((self.duration as f64 * f64::from(p)).round() as u64);
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.pages.iter().flat_map(|p| p.tracks.iter())
    }

    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.pages.iter_mut().flat_map(|p| p.tracks.iter_mut())
    }

    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks().find(|t| t.name == name)
    }

    pub fn track_mut(&mut self, name: &str) -> Option<&mut Track> {
        self.tracks_mut().find(|t| t.name == name)
    }

    /// Looks a track up by display name, with or without the leading slash.
    pub fn track_by_display_name_mut(&mut self, display_name: &str) -> Option<&mut Track> {
        let wanted = display_name.strip_prefix('/').unwrap_or(display_name);
        self.tracks_mut()
            .find(|t| t.display_name.strip_prefix('/').unwrap_or(&t.display_name) == wanted)
    }

    pub fn has_track_of_kind(&self, kind: TrackKind) -> bool {
        self.tracks().any(|t| t.kind() == kind)
    }

    /// Appends a counter until `base` no longer collides with an existing
    /// track name.
    pub fn confirmed_unique_name(&self, base: &str) -> String {
        if self.track(base).is_none() {
            return base.to_string();
        }
        let mut counter = 2;
        loop {
            let candidate = format!("{base}_{counter}");
            if self.track(&candidate).is_none() {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Adds `track` to the last page, creating the default page if none
    /// exists.
    pub fn add_track(&mut self, track: Track) {
        if self.pages.is_empty() {
            self.pages.push(Page::new(DEFAULT_PAGE_NAME.to_string()));
        }
        self.pages
            .last_mut()
            .expect("at least one page")
            .tracks
            .push(track);
    }

    pub fn remove_track(&mut self, name: &str) -> Option<Track> {
        for page in &mut self.pages {
            if let Some(at) = page.tracks.iter().position(|t| t.name == name) {
                return Some(page.tracks.remove(at));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_clamps_to_duration() {
        let mut tl = Timeline::default();
        tl.seek_millis(90_000);
        assert_eq!(tl.current_time_millis(), tl.duration_millis());
    }

    #[test]
    fn shrinking_duration_restores_out_point() {
        let mut tl = Timeline::default();
        tl.set_out_point_millis(20_000);
        tl.set_duration_millis(10_000);
        assert_eq!(tl.out_point(), 10_000);
    }

    #[test]
    fn unique_names_count_up() {
        let mut tl = Timeline::default();
        assert_eq!(tl.confirmed_unique_name("curves"), "curves");
        tl.add_track(Track::new(
            "curves".to_string(),
            TrackKind::Curves,
            String::new(),
        ));
        assert_eq!(tl.confirmed_unique_name("curves"), "curves_2");
        tl.add_track(Track::new(
            "curves_2".to_string(),
            TrackKind::Curves,
            String::new(),
        ));
        assert_eq!(tl.confirmed_unique_name("curves"), "curves_3");
    }

    #[test]
    fn stop_keeps_playhead() {
        let mut tl = Timeline::default();
        tl.seek_millis(5_000);
        tl.play();
        tl.stop();
        assert!(tl.current_time_millis() >= 5_000);
        assert!(!tl.is_playing());
    }
}
