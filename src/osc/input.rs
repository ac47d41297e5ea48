//! Parsing of `/duration/*` command messages into actions.
//!
//! Track-addressed messages are matched against display names before this
//! parser runs; everything arriving here is either a command or noise.
//! Commands with malformed arguments come back as `Err` so the controller
//! can log and drop them.

use crate::message::Action;
use crate::timeline::track::TrackKind;
use rosc::{OscMessage, OscType};
use std::path::PathBuf;

/// `Ok(None)` means the address is not a known command.
pub fn parse(message: &OscMessage) -> Result<Option<Action>, String> {
    let args = &message.args;
    let action = match message.addr.as_str() {
        "/duration/open" => Action::Open(PathBuf::from(one_string(args, "open")?)),
        "/duration/new" => {
            let path = PathBuf::from(one_string(args, "new")?);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| "New project failed, path has no final component".to_string())?;
            Action::New { path, name }
        }
        "/duration/save" => Action::Save,
        "/duration/setduration" => match args.first() {
            Some(OscType::Float(seconds)) => Action::SetDurationSeconds(*seconds),
            Some(OscType::String(timecode)) => Action::SetDurationTimecode(timecode.clone()),
            Some(OscType::Int(millis)) => Action::SetDurationMillis((*millis).max(0) as u64),
            Some(OscType::Long(millis)) => Action::SetDurationMillis((*millis).max(0) as u64),
            _ => {
                return Err("Set duration failed, must have one argument: seconds as float, \
                     timecode string HH:MM:SS:MMM, or integer milliseconds"
                    .to_string());
            }
        },
        "/duration/play" => Action::Play(string_args(args)),
        "/duration/stop" => Action::Stop(string_args(args)),
        "/duration/record" => Action::Record,
        "/duration/seektosecond" => match args.first() {
            Some(OscType::Float(seconds)) => Action::SeekSeconds(*seconds),
            _ => return Err("Seek to second failed, first argument must be a float".to_string()),
        },
        "/duration/seektoposition" => match args.first() {
            Some(OscType::Float(position)) => Action::SeekPosition(*position),
            _ => {
                return Err(
                    "Seek to position failed, first argument must be a float between 0.0 and 1.0"
                        .to_string(),
                );
            }
        },
        "/duration/seektomillis" => match args.first() {
            Some(OscType::Int(millis)) => Action::SeekMillis((*millis).max(0) as u64),
            Some(OscType::Long(millis)) => Action::SeekMillis((*millis).max(0) as u64),
            _ => {
                return Err("Seek to millis failed, first argument must be an integer".to_string());
            }
        },
        "/duration/seektotimecode" => match args.first() {
            Some(OscType::String(timecode)) => Action::SeekTimecode(timecode.clone()),
            _ => return Err("Seek to timecode failed, first argument must be a string".to_string()),
        },
        "/duration/enableoscout" => {
            enable_command(args, "out", Action::EnableOscOut, |track, enabled| {
                Action::SetTrackSend { track, enabled }
            })?
        }
        "/duration/enableoscin" => {
            enable_command(args, "in", Action::EnableOscIn, |track, enabled| {
                Action::SetTrackReceive { track, enabled }
            })?
        }
        "/duration/oscrate" => match args.first() {
            Some(OscType::Int(rate)) => Action::SetOscRate(*rate as f32),
            Some(OscType::Long(rate)) => Action::SetOscRate(*rate as f32),
            Some(OscType::Float(rate)) => Action::SetOscRate(*rate),
            _ => {
                return Err(
                    "Set OSC rate failed, first argument must be an int or a float".to_string()
                );
            }
        },
        "/duration/addtrack" => {
            let strings = string_args(args);
            let Some(kind_name) = strings.first() else {
                return Err("Add track failed, usage: /duration/addtrack type:string \
                     [name:string] [filepath:string]"
                    .to_string());
            };
            let kind = TrackKind::parse(kind_name)
                .ok_or_else(|| format!("Add track failed, unknown track type '{kind_name}'"))?;
            Action::AddTrack {
                kind,
                name: strings.get(1).cloned(),
                file: strings.get(2).map(PathBuf::from),
            }
        }
        "/duration/removetrack" => Action::RemoveTrack(one_string(args, "remove track")?),
        "/duration/trackname" => match (args.first(), args.get(1), args.len()) {
            (Some(OscType::String(track)), Some(OscType::String(display_name)), 2) => {
                Action::RenameTrack {
                    track: track.clone(),
                    display_name: display_name.clone(),
                }
            }
            _ => {
                return Err(
                    "Set track name failed, usage: /duration/trackname oldname:string \
                     newname:string"
                        .to_string(),
                );
            }
        },
        "/duration/valuerange" => match (args.first(), args.get(1), args.get(2), args.len()) {
            (
                Some(OscType::String(track)),
                Some(OscType::Float(min)),
                Some(OscType::Float(max)),
                3,
            ) => Action::SetValueRange {
                track: track.clone(),
                min: *min,
                max: *max,
            },
            _ => {
                return Err("Set value range failed, usage: /duration/valuerange \
                     trackname:string min:float max:float"
                    .to_string());
            }
        },
        "/duration/valuerange/min" => match (args.first(), args.get(1), args.len()) {
            (Some(OscType::String(track)), Some(OscType::Float(min)), 2) => Action::SetValueMin {
                track: track.clone(),
                min: *min,
            },
            _ => {
                return Err("Set value range min failed, usage: /duration/valuerange/min \
                     trackname:string min:float"
                    .to_string());
            }
        },
        "/duration/valuerange/max" => match (args.first(), args.get(1), args.len()) {
            (Some(OscType::String(track)), Some(OscType::Float(max)), 2) => Action::SetValueMax {
                track: track.clone(),
                max: *max,
            },
            _ => {
                return Err("Set value range max failed, usage: /duration/valuerange/max \
                     trackname:string max:float"
                    .to_string());
            }
        },
        "/duration/colorpalette" => match (args.first(), args.get(1), args.len()) {
            (Some(OscType::String(track)), Some(OscType::String(path)), 2) => {
                Action::LoadColorPalette {
                    track: track.clone(),
                    path: PathBuf::from(path),
                }
            }
            _ => {
                return Err("Set color palette failed, usage: /duration/colorpalette \
                     trackname:string imagefilepath:string"
                    .to_string());
            }
        },
        "/duration/audioclip" => {
            Action::LoadAudioClip(PathBuf::from(one_string(args, "audio clip")?))
        }
        _ => return Ok(None),
    };
    Ok(Some(action))
}

fn one_string(args: &[OscType], what: &str) -> Result<String, String> {
    match (args.first(), args.len()) {
        (Some(OscType::String(s)), 1) => Ok(s.clone()),
        _ => Err(format!("{what} failed, expected one string argument")),
    }
}

fn string_args(args: &[OscType]) -> Vec<String> {
    args.iter()
        .filter_map(|a| match a {
            OscType::String(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

/// `/duration/enableoscin` and `/duration/enableoscout` take either a single
/// int for the global switch, or a track name plus an int for one track.
fn enable_command(
    args: &[OscType],
    direction: &str,
    global: impl Fn(bool) -> Action,
    per_track: impl Fn(String, bool) -> Action,
) -> Result<Action, String> {
    match (args.first(), args.get(1), args.len()) {
        (Some(OscType::Int(enabled)), None, 1) => Ok(global(*enabled != 0)),
        (Some(OscType::String(track)), Some(OscType::Int(enabled)), 2) => {
            Ok(per_track(track.clone(), *enabled != 0))
        }
        _ => Err(format!(
            "Enable OSC {direction} failed, usage: enable:int32 (1 or 0), \
             or trackname:string enable:int32"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    #[test]
    fn seek_to_second_takes_a_float() {
        let parsed = parse(&msg("/duration/seektosecond", vec![OscType::Float(2.5)])).unwrap();
        assert!(matches!(parsed, Some(Action::SeekSeconds(s)) if s == 2.5));
        assert!(parse(&msg("/duration/seektosecond", vec![OscType::Int(2)])).is_err());
    }

    #[test]
    fn set_duration_accepts_all_three_forms() {
        let secs = parse(&msg("/duration/setduration", vec![OscType::Float(1.5)])).unwrap();
        assert!(matches!(secs, Some(Action::SetDurationSeconds(_))));
        let code = parse(&msg(
            "/duration/setduration",
            vec![OscType::String("00:01:00:000".to_string())],
        ))
        .unwrap();
        assert!(matches!(code, Some(Action::SetDurationTimecode(_))));
        let millis = parse(&msg("/duration/setduration", vec![OscType::Int(500)])).unwrap();
        assert!(matches!(millis, Some(Action::SetDurationMillis(500))));
    }

    #[test]
    fn play_with_names_targets_tracks() {
        let parsed = parse(&msg(
            "/duration/play",
            vec![
                OscType::String("/drums".to_string()),
                OscType::String("/bass".to_string()),
            ],
        ))
        .unwrap();
        match parsed {
            Some(Action::Play(names)) => assert_eq!(names, vec!["/drums", "/bass"]),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn enableoscout_dispatches_global_and_per_track() {
        let global = parse(&msg("/duration/enableoscout", vec![OscType::Int(0)])).unwrap();
        assert!(matches!(global, Some(Action::EnableOscOut(false))));

        let per_track = parse(&msg(
            "/duration/enableoscout",
            vec![OscType::String("/lfo".to_string()), OscType::Int(1)],
        ))
        .unwrap();
        assert!(matches!(
            per_track,
            Some(Action::SetTrackSend { enabled: true, .. })
        ));

        assert!(parse(&msg("/duration/enableoscout", vec![OscType::Float(1.0)])).is_err());
    }

    #[test]
    fn addtrack_validates_the_kind() {
        let parsed = parse(&msg(
            "/duration/addtrack",
            vec![
                OscType::String("curves".to_string()),
                OscType::String("filter".to_string()),
            ],
        ))
        .unwrap();
        match parsed {
            Some(Action::AddTrack { kind, name, file }) => {
                assert_eq!(kind, TrackKind::Curves);
                assert_eq!(name.as_deref(), Some("filter"));
                assert!(file.is_none());
            }
            other => panic!("unexpected parse: {other:?}"),
        }
        assert!(
            parse(&msg(
                "/duration/addtrack",
                vec![OscType::String("wobble".to_string())]
            ))
            .is_err()
        );
    }

    #[test]
    fn unknown_addresses_are_ignored() {
        assert!(parse(&msg("/duration/nope", vec![])).unwrap().is_none());
        assert!(parse(&msg("/sometrack", vec![])).unwrap().is_none());
    }
}
