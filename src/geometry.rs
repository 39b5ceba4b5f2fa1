//! Screen geometry — monitor discovery and warp target selection.
//!
//! Monitors come from GNOME's `monitors.xml`, then from Wayland outputs,
//! then from the configured fallback screen size. All functions here are
//! pure apart from `load_monitors_xml`.

use std::path::{Path, PathBuf};

use regex::Regex;

/// Fallback monitor width when a block has none.
const DEFAULT_WIDTH: i32 = 1920;
/// Fallback monitor height when a block has none.
const DEFAULT_HEIGHT: i32 = 1080;

const LOGICAL_MONITOR: &str = r"(?s)<logicalmonitor>(.*?)</logicalmonitor>";
const MONITOR: &str = r"(?s)<monitor>(.*?)</monitor>";
const TAG: &str = r"<(?:mode)?(x|y|width|height|scale)>\s*(-?[0-9]+(?:\.[0-9]+)?)\s*</(?:mode)?(?:x|y|width|height|scale)>";

/// A monitor rectangle in root coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monitor {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub scale: i32,
}

// Values come from monitors.xml and the command line, so all arithmetic
// saturates instead of overflowing.
impl Monitor {
    fn scaled_width(&self) -> i32 {
        self.width.saturating_mul(self.scale)
    }

    fn scaled_height(&self) -> i32 {
        self.height.saturating_mul(self.scale)
    }

    /// Center point of the monitor.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add(self.scaled_width() / 2),
            self.y.saturating_add(self.scaled_height() / 2),
        )
    }

    /// Whether `(px, py)` lies inside the monitor (right/bottom exclusive).
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x
            && px < self.x.saturating_add(self.scaled_width())
            && py >= self.y
            && py < self.y.saturating_add(self.scaled_height())
    }
}

/// Screen size used when neither monitors.xml nor Wayland outputs are
/// available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
    pub scale: i32,
}

impl ScreenSize {
    pub fn center(&self) -> (i32, i32) {
        (
            self.width.saturating_mul(self.scale) / 2,
            self.height.saturating_mul(self.scale) / 2,
        )
    }
}

/// Default location of GNOME's monitor configuration.
pub fn default_monitors_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(Path::new(&home).join(".config").join("monitors.xml"))
}

/// Read and parse a monitors.xml file.
///
/// Returns `None` when the file is unreadable or describes no monitors.
pub fn load_monitors_xml(path: &Path) -> Option<Vec<Monitor>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "monitors.xml not readable");
            return None;
        }
    };
    let monitors = match parse_monitors_xml(&contents) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "monitors.xml patterns failed to compile");
            return None;
        }
    };
    if monitors.is_empty() {
        None
    } else {
        Some(monitors)
    }
}

/// Parse monitor blocks out of a monitors.xml document.
///
/// `<logicalmonitor>` blocks win; plain `<monitor>` blocks are used only
/// when the document has no logical monitors. Tag names are matched
/// case-insensitively.
pub fn parse_monitors_xml(contents: &str) -> Result<Vec<Monitor>, regex::Error> {
    let lower = contents.to_lowercase();
    let logical_re = Regex::new(LOGICAL_MONITOR)?;
    let monitor_re = Regex::new(MONITOR)?;
    let tag_re = Regex::new(TAG)?;

    let block_bodies = |re: &Regex| -> Vec<String> {
        re.captures_iter(&lower)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect()
    };

    let mut blocks = block_bodies(&logical_re);
    if blocks.is_empty() {
        blocks = block_bodies(&monitor_re);
    }

    Ok(blocks.iter().map(|b| parse_block(&tag_re, b)).collect())
}

fn parse_block(tag_re: &Regex, block: &str) -> Monitor {
    let mut x = None;
    let mut y = None;
    let mut width = None;
    let mut height = None;
    let mut scale = None;

    // First occurrence of each tag wins.
    for cap in tag_re.captures_iter(block) {
        let Ok(value) = cap[2].parse::<f64>() else {
            continue;
        };
        let slot = match &cap[1] {
            "x" => &mut x,
            "y" => &mut y,
            "width" => &mut width,
            "height" => &mut height,
            "scale" => &mut scale,
            _ => continue,
        };
        slot.get_or_insert(value);
    }

    Monitor {
        x: x.map_or(0, |v| v as i32),
        y: y.map_or(0, |v| v as i32),
        width: width.map_or(DEFAULT_WIDTH, |v| v as i32),
        height: height.map_or(DEFAULT_HEIGHT, |v| v as i32),
        scale: scale.map_or(1, |v| (v.round() as i32).max(1)),
    }
}

/// Choose the warp center among `monitors`.
///
/// A single monitor is used directly. Otherwise the monitor containing
/// `focus` wins, falling back to the first monitor.
pub fn select_center(monitors: &[Monitor], focus: Option<(i32, i32)>) -> Option<(i32, i32)> {
    let first = monitors.first()?;
    if monitors.len() == 1 {
        return Some(first.center());
    }

    if let Some((fx, fy)) = focus
        && let Some(m) = monitors.iter().find(|m| m.contains(fx, fy))
    {
        tracing::debug!(x = m.x, y = m.y, "selected monitor containing focused window");
        return Some(m.center());
    }

    Some(first.center())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mon(x: i32, y: i32, width: i32, height: i32, scale: i32) -> Monitor {
        Monitor {
            x,
            y,
            width,
            height,
            scale,
        }
    }

    const GNOME_XML: &str = r#"<monitors version="2">
  <configuration>
    <logicalmonitor>
      <x>0</x>
      <y>0</y>
      <scale>1</scale>
      <primary>yes</primary>
      <monitor>
        <monitorspec>
          <connector>DP-1</connector>
        </monitorspec>
        <mode>
          <width>2560</width>
          <height>1440</height>
          <rate>143.998</rate>
        </mode>
      </monitor>
    </logicalmonitor>
    <logicalmonitor>
      <x>2560</x>
      <y>0</y>
      <scale>2</scale>
      <monitor>
        <mode>
          <width>1920</width>
          <height>1080</height>
        </mode>
      </monitor>
    </logicalmonitor>
  </configuration>
</monitors>"#;

    // -- Monitor --

    #[test]
    fn center_accounts_for_scale() {
        assert_eq!(mon(100, 50, 800, 600, 2).center(), (900, 650));
    }

    #[test]
    fn oversized_monitor_saturates() {
        let xml = "<logicalmonitor><x>100</x><scale>2</scale><mode><width>2000000000</width><height>2000000000</height></mode></logicalmonitor>";
        let monitors = parse_monitors_xml(xml).unwrap();
        assert_eq!(monitors[0].width, 2_000_000_000);

        let second = mon(-5000, 0, 1920, 1080, 1);
        let both = [monitors[0], second];
        assert_eq!(
            select_center(&both, Some((200, 10))),
            Some((100 + i32::MAX / 2, i32::MAX / 2))
        );
        assert!(monitors[0].contains(i32::MAX - 1, 10));
    }

    #[test]
    fn oversized_screen_size_saturates() {
        let s = ScreenSize {
            width: i32::MAX,
            height: 1080,
            scale: 3,
        };
        assert_eq!(s.center(), (i32::MAX / 2, 1620));
    }

    #[test]
    fn contains_is_right_exclusive() {
        let m = mon(0, 0, 100, 100, 1);
        assert!(m.contains(0, 0));
        assert!(m.contains(99, 99));
        assert!(!m.contains(100, 50));
        assert!(!m.contains(-1, 50));
    }

    // -- monitors.xml --

    #[test]
    fn parses_logical_monitors() {
        let monitors = parse_monitors_xml(GNOME_XML).unwrap();
        assert_eq!(
            monitors,
            vec![mon(0, 0, 2560, 1440, 1), mon(2560, 0, 1920, 1080, 2)]
        );
    }

    #[test]
    fn falls_back_to_plain_monitor_blocks() {
        let xml = "<monitors><monitor><x>10</x><y>20</y><width>1280</width><height>1024</height></monitor></monitors>";
        assert_eq!(parse_monitors_xml(xml).unwrap(), vec![mon(10, 20, 1280, 1024, 1)]);
    }

    #[test]
    fn missing_tags_use_defaults() {
        let xml = "<logicalmonitor><primary>yes</primary></logicalmonitor>";
        assert_eq!(parse_monitors_xml(xml).unwrap(), vec![mon(0, 0, 1920, 1080, 1)]);
    }

    #[test]
    fn fractional_scale_rounds() {
        let xml = "<logicalmonitor><scale>1.75</scale></logicalmonitor>";
        assert_eq!(parse_monitors_xml(xml).unwrap()[0].scale, 2);
    }

    #[test]
    fn tags_are_case_insensitive() {
        let xml = "<LogicalMonitor><X>5</X><Width>640</Width><Height>480</Height></LogicalMonitor>";
        assert_eq!(parse_monitors_xml(xml).unwrap(), vec![mon(5, 0, 640, 480, 1)]);
    }

    #[test]
    fn empty_document_has_no_monitors() {
        assert!(parse_monitors_xml("<monitors version=\"2\"/>").unwrap().is_empty());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitors.xml");
        std::fs::write(&path, GNOME_XML).unwrap();
        assert_eq!(load_monitors_xml(&path).map(|m| m.len()), Some(2));
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_monitors_xml(&dir.path().join("absent.xml")).is_none());
    }

    // -- Center selection --

    #[test]
    fn single_monitor_ignores_focus() {
        let monitors = [mon(0, 0, 1920, 1080, 1)];
        assert_eq!(select_center(&monitors, Some((5000, 5000))), Some((960, 540)));
    }

    #[test]
    fn focus_selects_containing_monitor() {
        let monitors = [mon(0, 0, 1920, 1080, 1), mon(1920, 0, 1280, 1024, 1)];
        assert_eq!(select_center(&monitors, Some((2000, 100))), Some((2560, 512)));
    }

    #[test]
    fn unmatched_focus_uses_first_monitor() {
        let monitors = [mon(0, 0, 1920, 1080, 1), mon(1920, 0, 1280, 1024, 1)];
        assert_eq!(select_center(&monitors, Some((-10, -10))), Some((960, 540)));
        assert_eq!(select_center(&monitors, None), Some((960, 540)));
    }

    #[test]
    fn no_monitors_no_center() {
        assert_eq!(select_center(&[], None), None);
    }

    #[test]
    fn screen_size_center() {
        let s = ScreenSize {
            width: 1920,
            height: 1080,
            scale: 2,
        };
        assert_eq!(s.center(), (1920, 1080));
    }
}
