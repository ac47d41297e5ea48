//! Project persistence. A project is a directory holding a `.durationproj`
//! XML file (track manifest, timeline settings, OSC settings) plus one XML
//! data file per track, named after the track's unique name.

use crate::audio::AudioClip;
use crate::osc::output::OutputDispatch;
use crate::settings::ProjectSettings;
use crate::timeline::track::{
    Bang, ColorKeyframe, Flag, Keyframe, LfoKeyframe, SwitchSpan, Track, TrackContent, TrackKind,
    ValueRange,
};
use crate::timeline::{Page, Timeline, timecode};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing::warn;

pub const PROJECT_FILE: &str = ".durationproj";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Per-track OSC flags recovered from a project file, to be installed into
/// the dispatcher after load.
#[derive(Debug)]
pub struct TrackFlags {
    pub name: String,
    pub send: bool,
    pub receive: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "durationproj")]
struct ProjectFile {
    tracks: TracksXml,
    #[serde(rename = "timelineSettings")]
    timeline: TimelineSettingsXml,
    #[serde(rename = "projectSettings")]
    settings: ProjectSettings,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TracksXml {
    #[serde(rename = "page", default)]
    pages: Vec<PageXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PageXml {
    name: String,
    #[serde(rename = "track", default)]
    tracks: Vec<TrackXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TrackXml {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "xmlFileName")]
    xml_file_name: String,
    #[serde(rename = "trackName")]
    track_name: String,
    #[serde(rename = "displayName")]
    display_name: String,
    #[serde(rename = "sendOSC")]
    send_osc: bool,
    #[serde(rename = "receiveOSC")]
    receive_osc: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    palette: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    clip: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TimelineSettingsXml {
    duration: String,
    playhead: String,
    inpoint: String,
    outpoint: String,
    #[serde(rename = "loop")]
    loop_enabled: bool,
}

/// Keyframe payload of one track, stored in its own file so tracks can be
/// edited and diffed independently.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "track")]
struct TrackData {
    #[serde(rename = "bang", default, skip_serializing_if = "Vec::is_empty")]
    bangs: Vec<Bang>,
    #[serde(rename = "flag", default, skip_serializing_if = "Vec::is_empty")]
    flags: Vec<Flag>,
    #[serde(rename = "switch", default, skip_serializing_if = "Vec::is_empty")]
    switches: Vec<SwitchSpan>,
    #[serde(rename = "key", default, skip_serializing_if = "Vec::is_empty")]
    keys: Vec<Keyframe>,
    #[serde(rename = "lfo", default, skip_serializing_if = "Vec::is_empty")]
    lfos: Vec<LfoKeyframe>,
    #[serde(rename = "color", default, skip_serializing_if = "Vec::is_empty")]
    colors: Vec<ColorKeyframe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
}

pub fn exists(dir: &Path) -> bool {
    dir.join(PROJECT_FILE).is_file()
}

pub fn load(dir: &Path) -> io::Result<(Timeline, ProjectSettings, Vec<TrackFlags>)> {
    let text = std::fs::read_to_string(dir.join(PROJECT_FILE))?;
    let file: ProjectFile = quick_xml::de::from_str(&text).map_err(io::Error::other)?;

    let mut settings = file.settings;
    settings.path = dir.to_path_buf();
    settings.name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "newProject".to_string());

    let mut timeline = Timeline::default();
    timeline.pages.clear();
    timeline.loop_enabled = file.timeline.loop_enabled;
    timeline.bpm = settings.bpm;
    if let Some(millis) = timecode::parse(&file.timeline.duration) {
        timeline.set_duration_millis(millis);
    }
    if let Some(millis) = timecode::parse(&file.timeline.inpoint) {
        timeline.set_in_point_millis(millis);
    }
    if let Some(millis) = timecode::parse(&file.timeline.outpoint) {
        timeline.set_out_point_millis(millis);
    }
    if let Some(millis) = timecode::parse(&file.timeline.playhead) {
        timeline.seek_millis(millis);
    }

    let mut flags = vec![];
    for page_xml in file.tracks.pages {
        let mut page = Page::new(page_xml.name);
        for track_xml in page_xml.tracks {
            let Some(kind) = TrackKind::parse(&track_xml.kind) else {
                warn!("Skipping track '{}': unknown type '{}'", track_xml.track_name, track_xml.kind);
                continue;
            };
            let mut track = Track::new(
                track_xml.track_name.clone(),
                kind,
                track_xml.xml_file_name.clone(),
            );
            track.display_name = track_xml.display_name;
            load_track_data(dir, &mut track);
            if let (Some(min), Some(max)) = (track_xml.min, track_xml.max) {
                let _ = track.set_value_range(ValueRange { min, max });
            }
            if let TrackContent::Colors { palette, .. } = &mut track.content {
                *palette = track_xml.palette;
            }
            if let Some(clip_path) = &track_xml.clip {
                match AudioClip::load(clip_path) {
                    Ok(clip) => {
                        let _ = track.set_audio_clip(clip);
                    }
                    Err(e) => warn!("Audio clip for '{}' not restored: {e}", track.name),
                }
            }
            flags.push(TrackFlags {
                name: track.name.clone(),
                send: track_xml.send_osc,
                receive: track_xml.receive_osc,
            });
            page.tracks.push(track);
        }
        timeline.pages.push(page);
    }
    if timeline.pages.is_empty() {
        timeline.pages.push(Page::new(
            crate::timeline::DEFAULT_PAGE_NAME.to_string(),
        ));
    }

    Ok((timeline, settings, flags))
}

fn load_track_data(dir: &Path, track: &mut Track) {
    if track.xml_file_name.is_empty() {
        return;
    }
    let path = dir.join(&track.xml_file_name);
    if !path.is_file() {
        return;
    }
    let data: TrackData = match std::fs::read_to_string(&path)
        .map_err(io::Error::other)
        .and_then(|text| quick_xml::de::from_str(&text).map_err(io::Error::other))
    {
        Ok(data) => data,
        Err(e) => {
            warn!("Track data {} not restored: {e}", path.display());
            return;
        }
    };
    match &mut track.content {
        TrackContent::Bangs(bangs) => *bangs = data.bangs,
        TrackContent::Flags(flags) => *flags = data.flags,
        TrackContent::Switches(spans) => *spans = data.switches,
        TrackContent::Curves { keyframes, .. } => *keyframes = data.keys,
        TrackContent::Lfo {
            keyframes, seed, ..
        } => {
            *keyframes = data.lfos;
            *seed = data.seed.unwrap_or_default();
        }
        TrackContent::Colors { keyframes, .. } => *keyframes = data.colors,
        TrackContent::Audio { .. } => {}
    }
}

pub fn save(
    timeline: &Timeline,
    settings: &ProjectSettings,
    dispatch: &OutputDispatch,
) -> io::Result<()> {
    let dir = &settings.path;
    std::fs::create_dir_all(dir)?;

    let mut pages = vec![];
    for page in &timeline.pages {
        let mut tracks = vec![];
        for track in &page.tracks {
            save_track_data(dir, track)?;
            let range = track.value_range();
            let (palette, clip) = match &track.content {
                TrackContent::Colors { palette, .. } => (palette.clone(), None),
                TrackContent::Audio { clip } => {
                    (None, clip.as_ref().map(|c| c.path().to_string()))
                }
                _ => (None, None),
            };
            tracks.push(TrackXml {
                kind: track.kind().as_str().to_string(),
                xml_file_name: track.xml_file_name.clone(),
                track_name: track.name.clone(),
                display_name: track.display_name.clone(),
                send_osc: dispatch.sends(&track.name),
                receive_osc: dispatch.receives(&track.name),
                min: range.map(|r| r.min),
                max: range.map(|r| r.max),
                palette,
                clip,
            });
        }
        pages.push(PageXml {
            name: page.name.clone(),
            tracks,
        });
    }

    let file = ProjectFile {
        tracks: TracksXml { pages },
        timeline: TimelineSettingsXml {
            duration: timeline.duration_timecode(),
            playhead: timeline.current_timecode(),
            inpoint: timecode::format(timeline.in_point()),
            outpoint: timecode::format(timeline.out_point()),
            loop_enabled: timeline.loop_enabled,
        },
        settings: settings.clone(),
    };
    let xml = quick_xml::se::to_string(&file).map_err(io::Error::other)?;
    std::fs::write(dir.join(PROJECT_FILE), format!("{XML_DECLARATION}{xml}"))
}

fn save_track_data(dir: &Path, track: &Track) -> io::Result<()> {
    if track.xml_file_name.is_empty() {
        return Ok(());
    }
    let mut data = TrackData::default();
    match &track.content {
        TrackContent::Bangs(bangs) => data.bangs = bangs.clone(),
        TrackContent::Flags(flags) => data.flags = flags.clone(),
        TrackContent::Switches(spans) => data.switches = spans.clone(),
        TrackContent::Curves { keyframes, .. } => data.keys = keyframes.clone(),
        TrackContent::Lfo {
            keyframes, seed, ..
        } => {
            data.lfos = keyframes.clone();
            data.seed = Some(*seed);
        }
        TrackContent::Colors { keyframes, .. } => data.colors = keyframes.clone(),
        TrackContent::Audio { .. } => {}
    }
    let xml = quick_xml::se::to_string(&data).map_err(io::Error::other)?;
    std::fs::write(
        dir.join(&track.xml_file_name),
        format!("{XML_DECLARATION}{xml}"),
    )
}

/// Creates a fresh project directory with default settings and no tracks.
pub fn create(dir: &Path, name: &str) -> io::Result<ProjectSettings> {
    let settings = ProjectSettings {
        path: dir.to_path_buf(),
        name: name.to_string(),
        ..ProjectSettings::default()
    };
    save(&Timeline::default(), &settings, &OutputDispatch::default())?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::track::Rgb;

    fn scratch_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "durationproj-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn round_trips_a_project() {
        let dir = scratch_dir("roundtrip");
        let mut timeline = Timeline::default();
        timeline.set_duration_millis(45_000);
        timeline.loop_enabled = false;

        let mut curves = Track::new("fade".to_string(), TrackKind::Curves, "fade_.xml".to_string());
        curves.display_name = "/master/fade".to_string();
        curves.add_curve_keyframe(0, 0.25).unwrap();
        curves.add_curve_keyframe(10_000, 0.75).unwrap();
        curves
            .set_value_range(ValueRange { min: -1.0, max: 2.0 })
            .unwrap();
        timeline.add_track(curves);

        let mut colors = Track::new("wash".to_string(), TrackKind::Colors, "wash_.xml".to_string());
        colors.content = TrackContent::Colors {
            keyframes: vec![ColorKeyframe {
                millis: 500,
                color: Rgb::new(10, 20, 30),
            }],
            palette: None,
        };
        timeline.add_track(colors);

        let mut dispatch = OutputDispatch::default();
        dispatch.header_mut("fade").receive = false;

        let settings = ProjectSettings {
            path: dir.clone(),
            name: "roundtrip".to_string(),
            osc_rate: 60.0,
            ..ProjectSettings::default()
        };
        save(&timeline, &settings, &dispatch).unwrap();

        let (loaded, loaded_settings, flags) = load(&dir).unwrap();
        assert_eq!(loaded.duration_millis(), 45_000);
        assert!(!loaded.loop_enabled);
        assert_eq!(loaded_settings.osc_rate, 60.0);

        let fade = loaded.track("fade").unwrap();
        assert_eq!(fade.display_name, "/master/fade");
        assert_eq!(
            fade.value_range(),
            Some(ValueRange { min: -1.0, max: 2.0 })
        );
        assert_eq!(fade.value_at(5_000), Some(0.5));

        let wash = loaded.track("wash").unwrap();
        assert_eq!(wash.color_at(500), Some(Rgb::new(10, 20, 30)));

        let fade_flags = flags.iter().find(|f| f.name == "fade").unwrap();
        assert!(fade_flags.send);
        assert!(!fade_flags.receive);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn loads_a_literal_project_file() {
        let dir = scratch_dir("literal");
        std::fs::write(
            dir.join(PROJECT_FILE),
            r#"<?xml version="1.0" encoding="UTF-8"?>
<durationproj>
  <tracks>
    <page>
      <name>defaultPage</name>
      <track>
        <type>Switches</type>
        <xmlFileName></xmlFileName>
        <trackName>gate</trackName>
        <displayName>/gate</displayName>
        <sendOSC>true</sendOSC>
        <receiveOSC>false</receiveOSC>
      </track>
    </page>
  </tracks>
  <timelineSettings>
    <duration>00:01:00:000</duration>
    <playhead>00:00:02:000</playhead>
    <inpoint>00:00:00:000</inpoint>
    <outpoint>00:01:00:000</outpoint>
    <loop>true</loop>
  </timelineSettings>
  <projectSettings>
    <useBPM>false</useBPM>
    <bpm>120</bpm>
    <snapToBPM>false</snapToBPM>
    <snapToKeys>true</snapToKeys>
    <oscRate>30</oscRate>
    <oscInEnabled>true</oscInEnabled>
    <oscOutEnabled>true</oscOutEnabled>
    <oscInPort>12346</oscInPort>
    <oscIP>localhost</oscIP>
    <oscOutPort>12345</oscOutPort>
  </projectSettings>
</durationproj>
"#,
        )
        .unwrap();

        let (timeline, settings, flags) = load(&dir).unwrap();
        assert_eq!(timeline.duration_millis(), 60_000);
        assert_eq!(timeline.current_time_millis(), 2_000);
        assert_eq!(settings.osc_in_port, 12346);
        assert_eq!(flags.len(), 1);
        assert!(!flags[0].receive);
        assert_eq!(timeline.track("gate").unwrap().kind(), TrackKind::Switches);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn create_writes_an_openable_project() {
        let dir = scratch_dir("create");
        let settings = create(&dir, "fresh").unwrap();
        assert!(exists(&dir));
        assert_eq!(settings.name, "fresh");
        let (timeline, _, _) = load(&dir).unwrap();
        assert_eq!(
            timeline.duration_millis(),
            crate::timeline::DEFAULT_DURATION_MILLIS
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
