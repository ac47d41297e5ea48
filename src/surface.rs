//! Control surface bindings. Every widget on the playback control panels
//! maps to one OSC address; the table is built once at startup and looked
//! up by control id, so adding a control is one new row here.
//!
//! The headless binary ships no widget layer. A UI front end embeds this
//! table by feeding control events through [`ControlSurface::emit`] and
//! handing the resulting messages to the OSC sender, and turns toolbar text
//! edits into controller actions with the `edit_*` helpers.

use crate::message::Action;
use crate::settings;
use rosc::{OscMessage, OscType};
use std::collections::HashMap;

/// How a control's value rides in the message: sliders send a float,
/// toggles and selectors send an int.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    Float,
    Int,
}

const BINDINGS: &[(&str, &str, ArgKind)] = &[
    ("active_set", "/active/set", ArgKind::Float),
    // video deck
    ("video_show", "/active/video/show", ArgKind::Int),
    ("video_load", "/active/video/load", ArgKind::Int),
    ("video_mult_x", "/active/video/mult/x", ArgKind::Float),
    ("video_mult_y", "/active/video/mult/y", ArgKind::Float),
    ("video_fit", "/active/video/fit", ArgKind::Int),
    ("video_keepaspect", "/active/video/keepaspect", ArgKind::Int),
    ("video_hmirror", "/active/video/hmirror", ArgKind::Int),
    ("video_vmirror", "/active/video/vmirror", ArgKind::Int),
    ("video_color_r", "/active/video/color/1", ArgKind::Float),
    ("video_color_g", "/active/video/color/2", ArgKind::Float),
    ("video_color_b", "/active/video/color/3", ArgKind::Float),
    ("video_color_a", "/active/video/color/4", ArgKind::Float),
    ("video_volume", "/active/video/volume", ArgKind::Float),
    ("video_speed", "/active/video/speed", ArgKind::Float),
    ("video_loop", "/active/video/loop", ArgKind::Float),
    ("video_greenscreen", "/active/video/greenscreen", ArgKind::Float),
    // greenscreen keying
    ("greenscreen_threshold", "/active/greenscreen/threshold", ArgKind::Float),
    ("greenscreen_color_r", "/active/greenscreen/color/1", ArgKind::Float),
    ("greenscreen_color_g", "/active/greenscreen/color/2", ArgKind::Float),
    ("greenscreen_color_b", "/active/greenscreen/color/3", ArgKind::Float),
    ("greenscreen_color_a", "/active/greenscreen/color/4", ArgKind::Float),
    // depth camera
    ("kinect_show", "/active/kinect/show", ArgKind::Float),
    ("kinect_close", "/active/kinect/close", ArgKind::Float),
    ("kinect_show_image", "/active/kinect/show/image", ArgKind::Float),
    ("kinect_show_grayscale", "/active/kinect/show/grayscale", ArgKind::Float),
    ("kinect_mask", "/active/kinect/mask", ArgKind::Float),
    ("kinect_contour", "/active/kinect/contour", ArgKind::Float),
    ("kinect_mult_x", "/active/kinect/mult/x", ArgKind::Float),
    ("kinect_mult_y", "/active/kinect/mult/y", ArgKind::Float),
    ("kinect_threshold_near", "/active/kinect/threshold/near", ArgKind::Float),
    ("kinect_threshold_far", "/active/kinect/threshold/far", ArgKind::Float),
    ("kinect_angle", "/active/kinect/angle", ArgKind::Float),
    ("kinect_blur", "/active/kinect/blur", ArgKind::Float),
    ("kinect_contour_smooth", "/active/kinect/contour/smooth", ArgKind::Float),
    ("kinect_contour_simplify", "/active/kinect/contour/simplify", ArgKind::Float),
    // still images
    ("img_mult_x", "/active/img/mult/x", ArgKind::Float),
    ("img_mult_y", "/active/img/mult/y", ArgKind::Float),
    ("img_hmirror", "/active/img/hmirror", ArgKind::Float),
    ("img_vmirror", "/active/img/vmirror", ArgKind::Float),
    ("img_greenscreen", "/active/img/greenscreen", ArgKind::Float),
    ("img_color_r", "/active/img/color/1", ArgKind::Float),
    ("img_color_g", "/active/img/color/2", ArgKind::Float),
    ("img_color_b", "/active/img/color/3", ArgKind::Float),
    ("img_color_a", "/active/img/color/4", ArgKind::Float),
    // placement
    ("placement_x", "/active/placement/x", ArgKind::Float),
    ("placement_y", "/active/placement/y", ArgKind::Float),
    ("placement_w", "/active/placement/w", ArgKind::Float),
    ("placement_h", "/active/placement/h", ArgKind::Float),
    ("placement_reset", "/active/placement/reset", ArgKind::Int),
    // edge blending
    ("edgeblend_show", "/active/edgeblend/show", ArgKind::Float),
    ("edgeblend_power", "/active/edgeblend/power", ArgKind::Float),
    ("edgeblend_gamma", "/active/edgeblend/gamma", ArgKind::Float),
    ("edgeblend_luminance", "/active/edgeblend/luminance", ArgKind::Float),
    ("edgeblend_left", "/active/edgeblend/amount/left", ArgKind::Float),
    ("edgeblend_right", "/active/edgeblend/amount/right", ArgKind::Float),
    ("edgeblend_top", "/active/edgeblend/amount/top", ArgKind::Float),
    ("edgeblend_bottom", "/active/edgeblend/amount/bottom", ArgKind::Float),
    // blend modes
    ("blendmodes_show", "/active/blendmodes/show", ArgKind::Float),
    ("blendmodes_mode", "/active/blendmodes/mode", ArgKind::Int),
    // solid color and transitions
    ("solid_show", "/active/solid/show", ArgKind::Float),
    ("solid_color_r", "/active/solid/color/1", ArgKind::Float),
    ("solid_color_g", "/active/solid/color/2", ArgKind::Float),
    ("solid_color_b", "/active/solid/color/3", ArgKind::Float),
    ("solid_color_a", "/active/solid/color/4", ArgKind::Float),
    ("transition_show", "/active/solid/trans/show", ArgKind::Float),
    ("transition_color_r", "/active/solid/trans/color/1", ArgKind::Float),
    ("transition_color_g", "/active/solid/trans/color/2", ArgKind::Float),
    ("transition_color_b", "/active/solid/trans/color/3", ArgKind::Float),
    ("transition_color_a", "/active/solid/trans/color/4", ArgKind::Float),
    ("transition_duration", "/active/solid/trans/duration", ArgKind::Float),
    // masking and warping
    ("mask_show", "/active/mask/show", ArgKind::Float),
    ("mask_invert", "/active/mask/invert", ArgKind::Float),
    ("deform_show", "/active/deform/show", ArgKind::Float),
    ("deform_bezier", "/active/deform/bezier", ArgKind::Float),
    ("deform_spherize_light", "/active/deform/bezier/spherize/light", ArgKind::Float),
    ("deform_spherize_strong", "/active/deform/bezier/spherize/strong", ArgKind::Float),
    ("deform_bezier_reset", "/active/deform/bezier/reset", ArgKind::Float),
    ("deform_grid", "/active/deform/grid", ArgKind::Float),
    ("deform_grid_rows", "/active/deform/grid/rows", ArgKind::Float),
    ("deform_grid_columns", "/active/deform/grid/columns", ArgKind::Float),
    ("deform_edit", "/active/deform/edit", ArgKind::Float),
    ("crop_top", "/active/crop/rectangular/top", ArgKind::Float),
    ("crop_right", "/active/crop/rectangular/right", ArgKind::Float),
    ("crop_left", "/active/crop/rectangular/left", ArgKind::Float),
    ("crop_bottom", "/active/crop/rectangular/bottom", ArgKind::Float),
    ("crop_circle_x", "/active/crop/circular/x", ArgKind::Float),
    ("crop_circle_y", "/active/crop/circular/y", ArgKind::Float),
    ("crop_circle_radius", "/active/crop/circular/radius", ArgKind::Float),
    // 3d models
    ("model_load", "/active/3d/load", ArgKind::Int),
    ("model_scale_x", "/active/3d/scale/x", ArgKind::Float),
    ("model_scale_y", "/active/3d/scale/y", ArgKind::Float),
    ("model_scale_z", "/active/3d/scale/z", ArgKind::Float),
    ("model_rotate_x", "/active/3d/rotate/x", ArgKind::Float),
    ("model_rotate_y", "/active/3d/rotate/y", ArgKind::Float),
    ("model_rotate_z", "/active/3d/rotate/z", ArgKind::Float),
    ("model_move_x", "/active/3d/move/x", ArgKind::Float),
    ("model_move_y", "/active/3d/move/y", ArgKind::Float),
    ("model_move_z", "/active/3d/move/z", ArgKind::Float),
    ("model_animation", "/active/3d/animation", ArgKind::Float),
    ("model_texture_mode", "/active/3d/texture/mode", ArgKind::Int),
    // projection host
    ("projection_resync", "/projection/resync", ArgKind::Int),
    ("projection_stop", "/projection/stop", ArgKind::Int),
    ("projection_save", "/projection/save", ArgKind::Int),
    ("projection_load", "/projection/load", ArgKind::Int),
    ("projection_loadfile", "/projection/loadfile", ArgKind::Int),
    ("projection_savefile", "/projection/savefile", ArgKind::Int),
    ("projection_fullscreen", "/projection/fullscreen/toggle", ArgKind::Int),
    ("projection_gui", "/projection/gui/toggle", ArgKind::Int),
    ("projection_setup_mode", "/projection/mode/setup/toggle", ArgKind::Int),
    ("projection_mask_setup", "/projection/mode/masksetup/toggle", ArgKind::Int),
];

#[derive(Debug)]
pub struct ControlSurface {
    bindings: HashMap<&'static str, (&'static str, ArgKind)>,
}

impl Default for ControlSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlSurface {
    pub fn new() -> Self {
        Self {
            bindings: BINDINGS
                .iter()
                .map(|(control, addr, kind)| (*control, (*addr, *kind)))
                .collect(),
        }
    }

    /// The OSC message for one control event, or `None` for an unbound id.
    pub fn emit(&self, control: &str, value: f32) -> Option<OscMessage> {
        let (addr, kind) = self.bindings.get(control)?;
        let arg = match kind {
            ArgKind::Float => OscType::Float(value),
            ArgKind::Int => OscType::Int(value.round() as i32),
        };
        Some(OscMessage {
            addr: (*addr).to_string(),
            args: vec![arg],
        })
    }

    pub fn is_bound(&self, control: &str) -> bool {
        self.bindings.contains_key(control)
    }
}

/// Text-field edits on the toolbar, validated before they become actions.
pub fn edit_duration(text: &str) -> Result<Action, String> {
    crate::timeline::timecode::parse(text)
        .map(|_| Action::SetDurationTimecode(text.to_string()))
        .ok_or_else(|| format!("Bad duration '{text}', format HH:MM:SS:MMM"))
}

pub fn edit_bpm(text: &str) -> Result<Action, String> {
    match text.parse::<f32>() {
        Ok(bpm) if bpm > 0.0 && bpm.is_finite() => Ok(Action::SetBpm(bpm)),
        _ => Err(format!("Bad BPM '{text}'")),
    }
}

pub fn edit_osc_rate(text: &str) -> Result<Action, String> {
    match text.parse::<f32>() {
        Ok(rate) if rate > 0.0 && rate.is_finite() => Ok(Action::SetOscRate(rate)),
        _ => Err(format!("Bad OSC rate '{text}'")),
    }
}

pub fn edit_osc_in_port(text: &str) -> Result<Action, String> {
    parse_port(text).map(Action::SetOscInPort)
}

pub fn edit_osc_out_port(text: &str) -> Result<Action, String> {
    parse_port(text).map(Action::SetOscOutPort)
}

pub fn edit_osc_ip(text: &str) -> Result<Action, String> {
    if settings::valid_ip(&text.to_ascii_lowercase()) {
        Ok(Action::SetOscIp(text.to_string()))
    } else {
        Err(format!("Bad OSC IP '{text}'"))
    }
}

fn parse_port(text: &str) -> Result<u16, String> {
    match text.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(format!("Bad port '{text}', expected 1-65535")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliders_emit_floats_and_toggles_emit_ints() {
        let surface = ControlSurface::new();
        let slider = surface.emit("video_volume", 0.8).unwrap();
        assert_eq!(slider.addr, "/active/video/volume");
        assert_eq!(slider.args, vec![OscType::Float(0.8)]);

        let toggle = surface.emit("video_show", 1.0).unwrap();
        assert_eq!(toggle.addr, "/active/video/show");
        assert_eq!(toggle.args, vec![OscType::Int(1)]);
    }

    #[test]
    fn unbound_controls_emit_nothing() {
        let surface = ControlSurface::new();
        assert!(surface.emit("smoke_machine", 1.0).is_none());
        assert!(!surface.is_bound("smoke_machine"));
        assert!(surface.is_bound("projection_resync"));
    }

    #[test]
    fn toolbar_edits_validate_before_acting() {
        assert!(matches!(
            edit_duration("00:02:00:000"),
            Ok(Action::SetDurationTimecode(_))
        ));
        assert!(edit_duration("two minutes").is_err());

        assert!(matches!(edit_osc_in_port("9000"), Ok(Action::SetOscInPort(9000))));
        assert!(edit_osc_in_port("0").is_err());
        assert!(edit_osc_in_port("70000").is_err());

        assert!(matches!(edit_osc_ip("10.0.0.2"), Ok(Action::SetOscIp(_))));
        assert!(edit_osc_ip("not-an-ip").is_err());

        assert!(edit_bpm("-10").is_err());
        assert!(matches!(edit_bpm("128"), Ok(Action::SetBpm(b)) if b == 128.0));
    }
}
