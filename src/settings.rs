// ============================================================================
// SETTINGS — persisted engine defaults (key=value lines)
// ============================================================================

use std::path::{Path, PathBuf};

use image::Rgb;

use crate::components::history::DEFAULT_MAX_UNDO;
use crate::ops::color::{color_to_str, str_to_color};
use crate::ops::draw::MAX_THICKNESS;
use crate::ops::effects::DEFAULT_COLOR_MIX;
use crate::ops::text::{MAX_TEXT_SCALE, MAX_TEXT_THICKNESS, MIN_TEXT_SCALE};
use crate::ops::transform::Interpolation;

#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    pub max_undo_steps: usize,
    /// Idle delay before a burst of tone-slider input is committed.
    pub tone_debounce_ms: u64,
    pub resize_filter: Interpolation,
    pub jpeg_quality: u8,
    pub draw_color: Rgb<u8>,
    pub draw_thickness: u32,
    pub text_font_family: String,
    pub text_color: Rgb<u8>,
    pub text_scale: f32,
    pub text_thickness: u32,
    /// Recolor strength in percent.
    pub color_mix: u32,
    pub picked_color: Rgb<u8>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            max_undo_steps: DEFAULT_MAX_UNDO,
            tone_debounce_ms: 150,
            resize_filter: Interpolation::Lanczos3,
            jpeg_quality: 90,
            draw_color: Rgb([255, 0, 0]),
            draw_thickness: 3,
            text_font_family: "DejaVu Sans".to_string(),
            text_color: Rgb([255, 255, 255]),
            text_scale: 1.0,
            text_thickness: 2,
            color_mix: DEFAULT_COLOR_MIX,
            picked_color: Rgb([255, 255, 255]),
        }
    }
}

impl EditorSettings {
    /// Platform config location.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("Retouch").join("retouch_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Retouch")
                    .join("retouch_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("retouch").join("retouch_settings.cfg"))
        }
    }

    /// Load from the platform location; defaults when missing or unreadable.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };
        Self::parse(&content)
    }

    /// Unknown keys and unparsable values keep their defaults. Sizes outside
    /// what the tools accept are clamped into range.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "max_undo_steps" => {
                    if let Ok(v) = val.parse::<usize>() && v > 0 {
                        s.max_undo_steps = v;
                    }
                }
                "tone_debounce_ms" => {
                    if let Ok(v) = val.parse() {
                        s.tone_debounce_ms = v;
                    }
                }
                "resize_filter" => {
                    if let Ok(v) = val.parse() {
                        s.resize_filter = v;
                    }
                }
                "jpeg_quality" => {
                    if let Ok(v) = val.parse::<u8>() {
                        s.jpeg_quality = v.clamp(1, 100);
                    }
                }
                "draw_color" => {
                    if let Some(c) = str_to_color(val) {
                        s.draw_color = c;
                    }
                }
                "draw_thickness" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.draw_thickness = v.clamp(1, MAX_THICKNESS);
                    }
                }
                "text_font_family" => {
                    if !val.is_empty() {
                        s.text_font_family = val.to_string();
                    }
                }
                "text_color" => {
                    if let Some(c) = str_to_color(val) {
                        s.text_color = c;
                    }
                }
                "text_scale" => {
                    if let Ok(v) = val.parse::<f32>() && v.is_finite() && v > 0.0 {
                        s.text_scale = v.clamp(MIN_TEXT_SCALE, MAX_TEXT_SCALE);
                    }
                }
                "text_thickness" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.text_thickness = v.clamp(1, MAX_TEXT_THICKNESS);
                    }
                }
                "color_mix" => {
                    if let Ok(v) = val.parse::<u32>() && v <= 100 {
                        s.color_mix = v;
                    }
                }
                "picked_color" => {
                    if let Some(c) = str_to_color(val) {
                        s.picked_color = c;
                    }
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("max_undo_steps={}\n", self.max_undo_steps));
        out.push_str(&format!("tone_debounce_ms={}\n", self.tone_debounce_ms));
        out.push_str(&format!("resize_filter={}\n", self.resize_filter.name()));
        out.push_str(&format!("jpeg_quality={}\n", self.jpeg_quality));
        out.push_str(&format!("draw_color={}\n", color_to_str(self.draw_color)));
        out.push_str(&format!("draw_thickness={}\n", self.draw_thickness));
        out.push_str(&format!("text_font_family={}\n", self.text_font_family));
        out.push_str(&format!("text_color={}\n", color_to_str(self.text_color)));
        out.push_str(&format!("text_scale={}\n", self.text_scale));
        out.push_str(&format!("text_thickness={}\n", self.text_thickness));
        out.push_str(&format!("color_mix={}\n", self.color_mix));
        out.push_str(&format!("picked_color={}\n", color_to_str(self.picked_color)));
        out
    }

    /// Save to the platform location.
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::settings_path()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no config directory"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_gives_defaults() {
        assert_eq!(EditorSettings::parse(""), EditorSettings::default());
        assert_eq!(EditorSettings::default().max_undo_steps, 40);
    }

    #[test]
    fn parses_known_keys_and_ignores_junk() {
        let s = EditorSettings::parse(
            "# comment\nmax_undo_steps = 12\nresize_filter=bicubic\ndraw_color=0,128,255\n\
             jpeg_quality=250\ncolor_mix=140\nmystery=1\nnot a pair\ntext_scale=-2\n",
        );
        assert_eq!(s.max_undo_steps, 12);
        assert_eq!(s.resize_filter, Interpolation::Bicubic);
        assert_eq!(s.draw_color, Rgb([0, 128, 255]));
        // Unparsable as u8 / out of range: defaults kept.
        assert_eq!(s.jpeg_quality, 90);
        assert_eq!(s.color_mix, 90);
        assert_eq!(s.text_scale, 1.0);
    }

    #[test]
    fn oversized_tool_settings_are_clamped() {
        let s = EditorSettings::parse("draw_thickness=500\ntext_scale=25\ntext_thickness=0\n");
        assert_eq!(s.draw_thickness, MAX_THICKNESS);
        assert_eq!(s.text_scale, MAX_TEXT_SCALE);
        assert_eq!(s.text_thickness, 1);

        let s = EditorSettings::parse("text_scale=0.01\n");
        assert_eq!(s.text_scale, MIN_TEXT_SCALE);

        let ed = crate::Editor::new(EditorSettings::parse("draw_thickness=9999\n"));
        assert!(ed.draw_style().validate().is_ok());
        assert!(ed.default_text_stamp("ok").validate().is_ok());
    }

    #[test]
    fn saved_file_reloads_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("retouch_settings.cfg");
        let s = EditorSettings {
            max_undo_steps: 7,
            text_font_family: "Liberation Serif".into(),
            picked_color: Rgb([9, 8, 7]),
            text_scale: 1.5,
            ..Default::default()
        };
        s.save_to(&path).unwrap();
        assert_eq!(EditorSettings::load_from(&path), s);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = EditorSettings::load_from(&dir.path().join("absent.cfg"));
        assert_eq!(s, EditorSettings::default());
    }
}
