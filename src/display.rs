use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    #[serde(rename = "connected")]
    Connected,
    #[serde(rename = "disconnected")]
    Disconnected,
    #[serde(rename = "unknown connection")]
    UnknownConnection,
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(Self::Connected),
            "disconnected" => Ok(Self::Disconnected),
            "unknown connection" => Ok(Self::UnknownConnection),
            other => Err(format!("unknown connection status '{other}'")),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::UnknownConnection => "unknown connection",
        })
    }
}

/// Non-normal output rotation. `normal` is represented by the absence of a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Left,
    Right,
    Inverted,
}

impl Rotation {
    /// Maps an xrandr rotation token; `normal` yields `None`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "inverted" => Some(Self::Inverted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Inverted => "inverted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Geometry {
    /// `<w>x<h>` as reported by the header, i.e. after rotation.
    pub dimension: String,
    /// `<x>x<y>`, the form `--pos` expects.
    pub offset: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mode {
    pub dimension: String,
    pub current: bool,
    pub preferred: bool,
}

/// One xrandr output as seen in a single snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Display {
    name: String,
    status: Status,
    primary: bool,
    rotation: Option<Rotation>,
    geometry: Option<Geometry>,
    mode: Option<String>,
    modes: BTreeMap<String, Mode>,
    edid: Vec<String>,
}

impl Display {
    pub fn new(
        name: impl Into<String>,
        status: Status,
        primary: bool,
        geometry: Option<Geometry>,
        mode: Option<String>,
        rotation: Option<Rotation>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            primary,
            rotation,
            geometry,
            mode,
            modes: BTreeMap::new(),
            edid: Vec::new(),
        }
    }

    pub(crate) fn insert_mode(&mut self, id: String, mode: Mode) {
        self.modes.insert(id, mode);
    }

    pub(crate) fn push_edid(&mut self, fragment: String) {
        self.edid.push(fragment);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn connected(&self) -> bool {
        self.status == Status::Connected
    }

    pub fn primary(&self) -> bool {
        self.primary
    }

    pub fn rotation(&self) -> Option<Rotation> {
        self.rotation
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    /// An output is active when it is currently scanning out, i.e. has a geometry.
    pub fn active(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    pub fn modes(&self) -> &BTreeMap<String, Mode> {
        &self.modes
    }

    pub fn edid(&self) -> &[String] {
        &self.edid
    }

    /// Prefers the dimension of the selected mode, which is unrotated, over the header geometry.
    fn mode_dimension<'a>(&'a self, geometry: &'a Geometry) -> &'a str {
        self.mode
            .as_deref()
            .and_then(|id| self.modes.get(id))
            .map(|mode| mode.dimension.as_str())
            .unwrap_or(geometry.dimension.as_str())
    }

    /// xrandr tokens that recreate this output's current state.
    pub fn to_arguments(&self) -> Vec<String> {
        if !self.connected() {
            return Vec::new();
        }

        let mut args = vec!["--output".to_string(), self.name.clone()];

        let Some(geometry) = self.geometry.as_ref() else {
            args.push("--off".to_string());
            return args;
        };

        if self.primary {
            args.push("--primary".to_string());
        }

        args.extend([
            "--mode".to_string(),
            self.mode_dimension(geometry).to_string(),
        ]);

        if let Some(rotation) = self.rotation {
            args.extend(["--rotate".to_string(), rotation.as_str().to_string()]);
        }

        args.extend(["--pos".to_string(), geometry.offset.clone()]);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(dimension: &str, offset: &str) -> Option<Geometry> {
        Some(Geometry {
            dimension: dimension.to_string(),
            offset: offset.to_string(),
        })
    }

    #[test]
    fn disconnected_output_contributes_nothing() {
        for status in [Status::Disconnected, Status::UnknownConnection] {
            let display = Display::new("VGA1", status, false, None, None, None);
            assert!(display.to_arguments().is_empty());
        }
    }

    #[test]
    fn connected_output_without_geometry_is_turned_off() {
        let display = Display::new("LVDS1", Status::Connected, true, None, None, None);
        assert!(!display.active());
        assert_eq!(display.to_arguments(), ["--output", "LVDS1", "--off"]);
    }

    #[test]
    fn primary_and_rotation_tokens_surround_mode() {
        let display = Display::new(
            "HDMI3",
            Status::Connected,
            true,
            geometry("1080x1920", "1930x0"),
            None,
            Some(Rotation::Left),
        );
        assert_eq!(
            display.to_arguments(),
            [
                "--output", "HDMI3", "--primary", "--mode", "1080x1920", "--rotate", "left",
                "--pos", "1930x0"
            ]
        );
    }

    #[test]
    fn selected_mode_dimension_wins_over_geometry() {
        let mut display = Display::new(
            "HDMI3",
            Status::Connected,
            false,
            geometry("1080x1920", "0x0"),
            Some("0x4b".to_string()),
            Some(Rotation::Right),
        );
        display.insert_mode(
            "0x4b".to_string(),
            Mode {
                dimension: "1920x1080".to_string(),
                current: true,
                preferred: true,
            },
        );
        assert_eq!(
            display.to_arguments(),
            ["--output", "HDMI3", "--mode", "1920x1080", "--rotate", "right", "--pos", "0x0"]
        );
    }

    #[test]
    fn unknown_mode_id_falls_back_to_geometry() {
        let display = Display::new(
            "DP1",
            Status::Connected,
            false,
            geometry("2560x1440", "1920x0"),
            Some("0x99".to_string()),
            None,
        );
        assert_eq!(
            display.to_arguments(),
            ["--output", "DP1", "--mode", "2560x1440", "--pos", "1920x0"]
        );
    }

    #[test]
    fn status_and_rotation_tokens() {
        assert_eq!(
            "unknown connection".parse::<Status>(),
            Ok(Status::UnknownConnection)
        );
        assert!("half connected".parse::<Status>().is_err());
        assert_eq!(Rotation::from_token("normal"), None);
        assert_eq!(Rotation::from_token("inverted"), Some(Rotation::Inverted));
    }
}
