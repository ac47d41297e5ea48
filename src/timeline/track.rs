use crate::audio::AudioClip;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The seven track kinds a project can hold. `as_str` yields the type string
/// written into project files and `/duration/info` manifests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Bangs,
    Flags,
    Switches,
    Curves,
    Lfo,
    Colors,
    Audio,
}

impl TrackKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bangs" => Some(Self::Bangs),
            "flags" => Some(Self::Flags),
            "switches" => Some(Self::Switches),
            "curves" => Some(Self::Curves),
            "lfo" => Some(Self::Lfo),
            "colors" => Some(Self::Colors),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bangs => "Bangs",
            Self::Flags => "Flags",
            Self::Switches => "Switches",
            Self::Curves => "Curves",
            Self::Lfo => "LFO",
            Self::Colors => "Colors",
            Self::Audio => "Audio",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl Default for ValueRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl ValueRange {
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min.min(self.max), self.max.max(self.min))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub millis: u64,
    pub value: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bang {
    pub millis: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub millis: u64,
    pub text: String,
}

/// Half-open on-interval: the switch reads on for `start <= t < end`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwitchSpan {
    pub start: u64,
    pub end: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorKeyframe {
    pub millis: u64,
    pub color: Rgb,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LfoShape {
    Sine,
    Noise,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LfoKeyframe {
    pub millis: u64,
    pub shape: LfoShape,
    /// Cycles per second.
    pub frequency: f32,
    pub amplitude: f32,
    pub center: f32,
}

impl Default for LfoKeyframe {
    fn default() -> Self {
        Self {
            millis: 0,
            shape: LfoShape::Sine,
            frequency: 1.0,
            amplitude: 0.5,
            center: 0.5,
        }
    }
}

#[derive(Debug)]
pub enum TrackContent {
    Bangs(Vec<Bang>),
    Flags(Vec<Flag>),
    Switches(Vec<SwitchSpan>),
    Curves {
        keyframes: Vec<Keyframe>,
        range: ValueRange,
    },
    Lfo {
        keyframes: Vec<LfoKeyframe>,
        range: ValueRange,
        seed: u32,
    },
    Colors {
        keyframes: Vec<ColorKeyframe>,
        palette: Option<String>,
    },
    Audio {
        clip: Option<AudioClip>,
    },
}

impl TrackContent {
    pub fn empty(kind: TrackKind) -> Self {
        match kind {
            TrackKind::Bangs => Self::Bangs(vec![]),
            TrackKind::Flags => Self::Flags(vec![]),
            TrackKind::Switches => Self::Switches(vec![]),
            TrackKind::Curves => Self::Curves {
                keyframes: vec![],
                range: ValueRange::default(),
            },
            TrackKind::Lfo => Self::Lfo {
                keyframes: vec![],
                range: ValueRange::default(),
                seed: 0,
            },
            TrackKind::Colors => Self::Colors {
                keyframes: vec![],
                palette: None,
            },
            TrackKind::Audio => Self::Audio { clip: None },
        }
    }
}

#[derive(Debug)]
struct LocalPlay {
    started: Instant,
    origin: u64,
}

/// A named timeline lane. `name` is the unique key inside the project;
/// `display_name` (slash-prefixed) is the track's OSC address.
#[derive(Debug)]
pub struct Track {
    pub name: String,
    pub display_name: String,
    pub xml_file_name: String,
    pub content: TrackContent,
    play: Option<LocalPlay>,
}

impl Track {
    pub fn new(name: String, kind: TrackKind, xml_file_name: String) -> Self {
        Self {
            display_name: name.clone(),
            name,
            xml_file_name,
            content: TrackContent::empty(kind),
            play: None,
        }
    }

    pub fn kind(&self) -> TrackKind {
        match &self.content {
            TrackContent::Bangs(_) => TrackKind::Bangs,
            TrackContent::Flags(_) => TrackKind::Flags,
            TrackContent::Switches(_) => TrackKind::Switches,
            TrackContent::Curves { .. } => TrackKind::Curves,
            TrackContent::Lfo { .. } => TrackKind::Lfo,
            TrackContent::Colors { .. } => TrackKind::Colors,
            TrackContent::Audio { .. } => TrackKind::Audio,
        }
    }

    pub fn osc_address(&self) -> String {
        if self.display_name.starts_with('/') {
            self.display_name.clone()
        } else {
            format!("/{}", self.display_name)
        }
    }

    /// Starts independent playback from `origin` milliseconds.
    pub fn play(&mut self, origin: u64) {
        self.play = Some(LocalPlay {
            started: Instant::now(),
            origin,
        });
    }

    pub fn stop(&mut self) {
        self.play = None;
    }

    pub fn is_playing(&self) -> bool {
        self.play.is_some()
    }

    /// The track's own play time, wrapped into `duration`. `None` when the
    /// track follows the global transport instead.
    pub fn local_time_millis(&self, duration: u64) -> Option<u64> {
        let play = self.play.as_ref()?;
        let elapsed = play.started.elapsed().as_millis() as u64 + play.origin;
        Some(elapsed % duration.max(1))
    }

    pub fn value_range(&self) -> Option<ValueRange> {
        match &self.content {
            TrackContent::Curves { range, .. } | TrackContent::Lfo { range, .. } => Some(*range),
            _ => None,
        }
    }

    pub fn set_value_range(&mut self, new: ValueRange) -> Result<(), String> {
        match &mut self.content {
            TrackContent::Curves { range, .. } | TrackContent::Lfo { range, .. } => {
                *range = new;
                Ok(())
            }
            _ => Err(format!("Track {} is not a Curves track", self.display_name)),
        }
    }

    /// Sampled float value for curves and LFO tracks.
    pub fn value_at(&self, millis: u64) -> Option<f32> {
        match &self.content {
            TrackContent::Curves { keyframes, range } => {
                Some(range.clamp(interpolate(keyframes, millis, range.min)))
            }
            TrackContent::Lfo {
                keyframes,
                range,
                seed,
            } => Some(range.clamp(lfo_value(keyframes, millis, *seed, range))),
            _ => None,
        }
    }

    pub fn is_on_at(&self, millis: u64) -> Option<bool> {
        match &self.content {
            TrackContent::Switches(spans) => {
                Some(spans.iter().any(|s| s.start <= millis && millis < s.end))
            }
            _ => None,
        }
    }

    pub fn color_at(&self, millis: u64) -> Option<Rgb> {
        match &self.content {
            TrackContent::Colors { keyframes, .. } => Some(color_at(keyframes, millis)),
            _ => None,
        }
    }

    /// Appends a recorded curve keyframe, keeping keyframes time ordered.
    pub fn add_curve_keyframe(&mut self, millis: u64, value: f32) -> Result<(), String> {
        match &mut self.content {
            TrackContent::Curves { keyframes, .. } => {
                let at = keyframes.partition_point(|k| k.millis <= millis);
                keyframes.insert(at, Keyframe { millis, value });
                Ok(())
            }
            _ => Err(format!("Track {} is not a Curves track", self.display_name)),
        }
    }

    pub fn add_bang(&mut self, millis: u64) -> Result<(), String> {
        match &mut self.content {
            TrackContent::Bangs(bangs) => {
                let at = bangs.partition_point(|b| b.millis <= millis);
                bangs.insert(at, Bang { millis });
                Ok(())
            }
            _ => Err(format!("Track {} is not a Bangs track", self.display_name)),
        }
    }

    /// Recolors every keyframe by sampling the palette image along its width
    /// at the keyframe's relative timeline position, then remembers the
    /// palette path for the project file.
    pub fn load_color_palette(&mut self, path: &str, duration: u64) -> Result<(), String> {
        match &mut self.content {
            TrackContent::Colors { keyframes, palette } => {
                let img = image::open(path)
                    .map_err(|e| format!("Failed to open palette '{path}': {e}"))?
                    .to_rgb8();
                let (width, height) = img.dimensions();
                if width == 0 || height == 0 {
                    return Err(format!("Palette '{path}' is empty"));
                }
                for kf in keyframes.iter_mut() {
                    let frac = (kf.millis as f32 / duration.max(1) as f32).clamp(0.0, 1.0);
                    let x = (frac * (width - 1) as f32).round() as u32;
                    let pixel = img.get_pixel(x, height / 2);
                    kf.color = Rgb::new(pixel[0], pixel[1], pixel[2]);
                }
                *palette = Some(path.to_string());
                Ok(())
            }
            _ => Err(format!("Track {} is not a Colors track", self.display_name)),
        }
    }

    pub fn set_audio_clip(&mut self, clip: AudioClip) -> Result<(), String> {
        match &mut self.content {
            TrackContent::Audio { clip: slot } => {
                *slot = Some(clip);
                Ok(())
            }
            _ => Err(format!("Track {} is not an Audio track", self.display_name)),
        }
    }

    /// Bang/flag events with `prev < t <= now`. Flags yield their text.
    pub fn fired_between(&self, prev: u64, now: u64) -> Vec<Option<String>> {
        match &self.content {
            TrackContent::Bangs(bangs) => bangs
                .iter()
                .filter(|b| prev < b.millis && b.millis <= now)
                .map(|_| None)
                .collect(),
            TrackContent::Flags(flags) => flags
                .iter()
                .filter(|f| prev < f.millis && f.millis <= now)
                .map(|f| Some(f.text.clone()))
                .collect(),
            _ => vec![],
        }
    }
}

fn interpolate(keyframes: &[Keyframe], millis: u64, empty: f32) -> f32 {
    let Some(first) = keyframes.first() else {
        return empty;
    };
    if millis <= first.millis {
        return first.value;
    }
    let last = keyframes.last().expect("non-empty");
    if millis >= last.millis {
        return last.value;
    }
    let after = keyframes.partition_point(|k| k.millis <= millis);
    let (a, b) = (&keyframes[after - 1], &keyframes[after]);
    let span = (b.millis - a.millis) as f32;
    let t = (millis - a.millis) as f32 / span;
    a.value + (b.value - a.value) * t
}

fn color_at(keyframes: &[ColorKeyframe], millis: u64) -> Rgb {
    let Some(first) = keyframes.first() else {
        return Rgb::default();
    };
    if millis <= first.millis {
        return first.color;
    }
    let last = keyframes.last().expect("non-empty");
    if millis >= last.millis {
        return last.color;
    }
    let after = keyframes.partition_point(|k| k.millis <= millis);
    let (a, b) = (&keyframes[after - 1], &keyframes[after]);
    let t = (millis - a.millis) as f32 / (b.millis - a.millis) as f32;
    let lerp = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Rgb::new(
        lerp(a.color.r, b.color.r),
        lerp(a.color.g, b.color.g),
        lerp(a.color.b, b.color.b),
    )
}

fn lfo_value(keyframes: &[LfoKeyframe], millis: u64, seed: u32, range: &ValueRange) -> f32 {
    if keyframes.is_empty() {
        return range.min;
    }
    let params = lfo_params_at(keyframes, millis);
    let seconds = millis as f64 / 1_000.0;
    let phase = seconds * params.frequency as f64;
    match params.shape {
        LfoShape::Sine => {
            params.center + params.amplitude * (phase * std::f64::consts::TAU).sin() as f32
        }
        LfoShape::Noise => params.center + params.amplitude * value_noise(seed, phase),
    }
}

fn lfo_params_at(keyframes: &[LfoKeyframe], millis: u64) -> LfoKeyframe {
    let first = keyframes.first().expect("non-empty");
    if millis <= first.millis {
        return *first;
    }
    let last = keyframes.last().expect("non-empty");
    if millis >= last.millis {
        return *last;
    }
    let after = keyframes.partition_point(|k| k.millis <= millis);
    let (a, b) = (&keyframes[after - 1], &keyframes[after]);
    let t = (millis - a.millis) as f32 / (b.millis - a.millis) as f32;
    LfoKeyframe {
        millis,
        // Shape switches at the earlier keyframe; numeric params crossfade.
        shape: a.shape,
        frequency: a.frequency + (b.frequency - a.frequency) * t,
        amplitude: a.amplitude + (b.amplitude - a.amplitude) * t,
        center: a.center + (b.center - a.center) * t,
    }
}

/// Deterministic lattice value noise in [-1, 1]. Seeded so projects replay
/// identically; no RNG state is carried between samples.
fn value_noise(seed: u32, phase: f64) -> f32 {
    let cell = phase.floor();
    let frac = (phase - cell) as f32;
    let a = lattice(seed, cell as i64);
    let b = lattice(seed, cell as i64 + 1);
    let smooth = frac * frac * (3.0 - 2.0 * frac);
    a + (b - a) * smooth
}

fn lattice(seed: u32, cell: i64) -> f32 {
    let mut h = (cell as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ u64::from(seed) << 32;
    h ^= h >> 33;
    h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    h ^= h >> 33;
    ((h >> 11) as f32 / (1u64 << 53) as f32).mul_add(2.0, -1.0)
}
