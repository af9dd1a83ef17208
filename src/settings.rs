use image::Rgba;
use std::path::{Path, PathBuf};

use crate::components::colors::{parse_hex_color, to_hex};
use crate::error::Result;
use crate::log_warn;

/// Engine defaults, persisted as a flat `key=value` file.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub background: Rgba<u8>,
    pub primary_color: Rgba<u8>,
    pub secondary_color: Rgba<u8>,
    pub brush_size: f32,
    pub hardness: f32,
    pub spacing: f32,
    pub jitter: f32,
    pub max_undo_steps: usize,
    pub font_family: String,
    /// Seed for the per-stamp jitter hash. Same seed, same stroke.
    pub jitter_seed: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            canvas_width: 1200,
            canvas_height: 800,
            background: Rgba([255, 255, 255, 255]),
            primary_color: Rgba([0, 0, 0, 255]),
            secondary_color: Rgba([255, 255, 255, 255]),
            brush_size: 5.0,
            hardness: 0.8,
            spacing: 0.2,
            jitter: 0.0,
            max_undo_steps: 50,
            font_family: "Arial".to_string(),
            jitter_seed: 0,
        }
    }
}

impl EngineSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/aintpro/aintpro_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\AintPro\aintpro_settings.cfg
    /// On macOS:   ~/Library/Application Support/AintPro/aintpro_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?
                .join("aintpro");
            return Some(config_dir.join("aintpro_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").ok()?;
            return Some(PathBuf::from(appdata).join("AintPro").join("aintpro_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("AintPro")
                    .join("aintpro_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("aintpro_settings.cfg")))
        }
    }

    /// Load from the platform settings file (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit file (defaults if missing).
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::load_from_str(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse `key=value` lines. Unknown keys, comments and malformed values
    /// are skipped; numeric values are clamped to their valid ranges.
    pub fn load_from_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "canvas_width" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.canvas_width = v.clamp(1, 16384);
                    }
                }
                "canvas_height" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.canvas_height = v.clamp(1, 16384);
                    }
                }
                "background" => set_color(&mut s.background, key, val),
                "primary_color" => set_color(&mut s.primary_color, key, val),
                "secondary_color" => set_color(&mut s.secondary_color, key, val),
                "brush_size" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.brush_size = v.clamp(1.0, 500.0);
                    }
                }
                "hardness" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.hardness = v.clamp(0.0, 1.0);
                    }
                }
                "spacing" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.spacing = v.clamp(0.01, 10.0);
                    }
                }
                "jitter" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.jitter = v.clamp(0.0, 1.0);
                    }
                }
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse::<usize>().unwrap_or(50).clamp(1, 1000);
                }
                "font_family" => {
                    if !val.is_empty() {
                        s.font_family = val.to_string();
                    }
                }
                "jitter_seed" => {
                    s.jitter_seed = val.parse().unwrap_or(0);
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_cfg_string(&self) -> String {
        format!(
            "# AintPro Settings\n\
             canvas_width={}\n\
             canvas_height={}\n\
             background={}\n\
             primary_color={}\n\
             secondary_color={}\n\
             brush_size={}\n\
             hardness={}\n\
             spacing={}\n\
             jitter={}\n\
             max_undo_steps={}\n\
             font_family={}\n\
             jitter_seed={}\n",
            self.canvas_width,
            self.canvas_height,
            color_to_str(self.background),
            color_to_str(self.primary_color),
            color_to_str(self.secondary_color),
            self.brush_size,
            self.hardness,
            self.spacing,
            self.jitter,
            self.max_undo_steps,
            self.font_family,
            self.jitter_seed,
        )
    }

    /// Save to the platform settings file.
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::settings_path() else { return Ok(()) };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_cfg_string())?;
        Ok(())
    }
}

/// `#rrggbb`, or `#rrggbbaa` when not opaque.
fn color_to_str(c: Rgba<u8>) -> String {
    if c[3] == 255 {
        to_hex(c)
    } else {
        format!("{}{:02x}", to_hex(c), c[3])
    }
}

fn set_color(slot: &mut Rgba<u8>, key: &str, val: &str) {
    match parse_hex_color(val) {
        Ok(c) => *slot = c,
        Err(_) => {
            log_warn!("Settings: ignoring bad colour for {}: '{}'", key, val);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_defaults() {
        let s = EngineSettings::load_from_str("");
        assert_eq!(s, EngineSettings::default());
        assert_eq!((s.canvas_width, s.canvas_height), (1200, 800));
        assert_eq!(s.max_undo_steps, 50);
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let s = EngineSettings::load_from_str(
            "brush_size=12\nhardness=4\nspacing = 0.5\nprimary_color=#ff0000\nmystery=1\nmax_undo_steps=0\n",
        );
        assert_eq!(s.brush_size, 12.0);
        assert_eq!(s.hardness, 1.0);
        assert_eq!(s.spacing, 0.5);
        assert_eq!(s.primary_color, Rgba([255, 0, 0, 255]));
        assert_eq!(s.max_undo_steps, 1);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let s = EngineSettings::load_from_str("brush_size=big\nbackground=#nothex\nno_equals_sign");
        assert_eq!(s.brush_size, 5.0);
        assert_eq!(s.background, Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn cfg_string_reparses_to_same_settings() {
        let mut s = EngineSettings::default();
        s.canvas_width = 64;
        s.secondary_color = Rgba([1, 2, 3, 128]);
        s.font_family = "DejaVu Sans".into();
        assert_eq!(EngineSettings::load_from_str(&s.to_cfg_string()), s);
    }

    #[test]
    fn save_to_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.cfg");
        let mut s = EngineSettings::default();
        s.jitter = 0.25;
        s.save_to(&path).unwrap();
        assert_eq!(EngineSettings::load_from(&path), s);
        assert_eq!(
            EngineSettings::load_from(&dir.path().join("missing.cfg")),
            EngineSettings::default()
        );
    }
}
