use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub const GLOBAL_SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_OSC_IN_PORT: u16 = 12346;
pub const DEFAULT_OSC_OUT_PORT: u16 = 12345;
pub const DEFAULT_OSC_RATE: f32 = 30.0;

/// Per-project settings. Field names mirror the `projectSettings` section of
/// the project file; `path` and `name` are runtime bookkeeping and never
/// serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(skip)]
    pub name: String,

    #[serde(rename = "useBPM")]
    pub use_bpm: bool,
    pub bpm: f32,
    #[serde(rename = "snapToBPM")]
    pub snap_to_bpm: bool,
    #[serde(rename = "snapToKeys")]
    pub snap_to_keys: bool,

    /// Outgoing bundles per second.
    #[serde(rename = "oscRate")]
    pub osc_rate: f32,
    #[serde(rename = "oscInEnabled")]
    pub osc_in_enabled: bool,
    #[serde(rename = "oscOutEnabled")]
    pub osc_out_enabled: bool,
    #[serde(rename = "oscInPort")]
    pub osc_in_port: u16,
    #[serde(rename = "oscIP")]
    pub osc_ip: String,
    #[serde(rename = "oscOutPort")]
    pub osc_out_port: u16,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            name: "newProject".to_string(),
            use_bpm: false,
            bpm: 120.0,
            snap_to_bpm: false,
            snap_to_keys: true,
            osc_rate: DEFAULT_OSC_RATE,
            osc_in_enabled: true,
            osc_out_enabled: true,
            osc_in_port: DEFAULT_OSC_IN_PORT,
            osc_ip: "localhost".to_string(),
            osc_out_port: DEFAULT_OSC_OUT_PORT,
        }
    }
}

impl ProjectSettings {
    pub fn bundle_interval_millis(&self) -> u64 {
        if self.osc_rate > 0.0 {
            (1_000.0 / self.osc_rate) as u64
        } else {
            1_000
        }
    }

    pub fn set_osc_rate(&mut self, rate: f32) -> Result<(), String> {
        if rate > 0.0 && rate.is_finite() {
            self.osc_rate = rate;
            Ok(())
        } else {
            Err(format!("OSC rate must be a positive number, got {rate}"))
        }
    }

    /// New inbound port. Rejects the outbound port when both ends are
    /// local, which would make the controller feed its own input.
    pub fn set_osc_in_port(&mut self, port: u16) -> Result<(), String> {
        if port == 0 {
            return Err("OSC in port must be between 1 and 65535".to_string());
        }
        if port == self.osc_out_port && is_local(&self.osc_ip) {
            return Err(format!(
                "OSC in port {port} would loop back into the local out port"
            ));
        }
        self.osc_in_port = port;
        Ok(())
    }

    pub fn set_osc_out_port(&mut self, port: u16) -> Result<(), String> {
        if port == 0 {
            return Err("OSC out port must be between 1 and 65535".to_string());
        }
        if port == self.osc_in_port && is_local(&self.osc_ip) {
            return Err(format!(
                "OSC out port {port} would loop back into the local in port"
            ));
        }
        self.osc_out_port = port;
        Ok(())
    }

    pub fn set_osc_ip(&mut self, ip: &str) -> Result<(), String> {
        let ip = ip.to_ascii_lowercase();
        if !valid_ip(&ip) {
            return Err(format!("Invalid OSC IP '{ip}'"));
        }
        if is_local(&ip) && self.osc_in_port == self.osc_out_port {
            return Err(format!(
                "OSC IP '{ip}' would loop outgoing bundles back into the in port"
            ));
        }
        self.osc_ip = ip;
        Ok(())
    }
}

pub fn valid_ip(ip: &str) -> bool {
    if ip == "localhost" {
        return true;
    }
    let octets: Vec<&str> = ip.split('.').collect();
    octets.len() == 4 && octets.iter().all(|o| o.parse::<u8>().is_ok())
}

fn is_local(ip: &str) -> bool {
    ip == "localhost" || ip == "127.0.0.1"
}

/// Application-wide settings persisted as `settings.json` next to the
/// projects directory: UI language plus the project to reopen at startup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, rename = "lastProjectPath")]
    pub last_project_path: Option<PathBuf>,
    #[serde(default, rename = "lastProjectName")]
    pub last_project_name: Option<String>,
}

fn default_language() -> String {
    "english".to_string()
}

impl GlobalSettings {
    pub fn load(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(io::Error::other)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_match_convention() {
        let s = ProjectSettings::default();
        assert_eq!(s.osc_in_port, 12346);
        assert_eq!(s.osc_out_port, 12345);
        assert_eq!(s.bundle_interval_millis(), 33);
    }

    #[test]
    fn port_zero_is_refused_and_65535_is_fine() {
        let mut s = ProjectSettings::default();
        let err = s.set_osc_in_port(0).unwrap_err();
        assert!(err.contains("1 and 65535"), "{err}");
        assert!(s.set_osc_out_port(0).is_err());
        assert!(s.set_osc_in_port(65_535).is_ok());
        assert_eq!(s.osc_in_port, 65_535);
    }

    #[test]
    fn rejects_loopback_port_collision() {
        let mut s = ProjectSettings::default();
        assert!(s.set_osc_in_port(s.osc_out_port).is_err());
        assert_eq!(s.osc_in_port, DEFAULT_OSC_IN_PORT);

        s.osc_ip = "10.0.0.5".to_string();
        assert!(s.set_osc_in_port(s.osc_out_port).is_ok());
    }

    #[test]
    fn rejects_ip_that_would_loop_back() {
        let mut s = ProjectSettings::default();
        s.osc_in_port = 9000;
        s.osc_out_port = 9000;
        assert!(s.set_osc_ip("127.0.0.1").is_err());
        assert!(s.set_osc_ip("192.168.1.20").is_ok());
        assert_eq!(s.osc_ip, "192.168.1.20");
    }

    #[test]
    fn validates_dotted_quads() {
        assert!(valid_ip("localhost"));
        assert!(valid_ip("255.255.255.255"));
        assert!(!valid_ip("256.0.0.1"));
        assert!(!valid_ip("1.2.3"));
        assert!(!valid_ip("example.com"));
    }

    #[test]
    fn invalid_rate_is_refused() {
        let mut s = ProjectSettings::default();
        assert!(s.set_osc_rate(0.0).is_err());
        assert!(s.set_osc_rate(-5.0).is_err());
        assert_eq!(s.osc_rate, DEFAULT_OSC_RATE);
        assert!(s.set_osc_rate(60.0).is_ok());
        assert_eq!(s.bundle_interval_millis(), 16);
    }
}
