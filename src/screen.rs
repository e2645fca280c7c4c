use std::str::FromStr;

use md5::{Digest, Md5};
use serde::Serialize;

use crate::display::Display;
use crate::error::{Error, Result};
use crate::platform::{Backend, Env};

/// All outputs reported by one xrandr snapshot, in reporting order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Screen {
    displays: Vec<Display>,
}

impl Screen {
    pub fn new(displays: Vec<Display>) -> Self {
        Self { displays }
    }

    /// Runs `xrandr --verbose` through `backend` and parses the result.
    pub fn query(backend: &dyn Backend, env: &Env) -> Result<Self> {
        let raw = backend.invoke(&["--verbose".to_string()], env)?;
        crate::parser::parse(&raw)
    }

    pub fn displays(&self) -> &[Display] {
        &self.displays
    }

    pub fn display(&self, name: &str) -> Option<&Display> {
        self.displays.iter().find(|d| d.name() == name)
    }

    /// Hex MD5 over every EDID fragment, in display order then collection order.
    ///
    /// Identifies the set of attached monitors; outputs without EDID add nothing.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Md5::new();
        for fragment in self.displays.iter().flat_map(|d| d.edid()) {
            hasher.update(fragment.as_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    pub fn to_arguments(&self) -> Vec<String> {
        self.displays.iter().flat_map(Display::to_arguments).collect()
    }
}

impl FromStr for Screen {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        crate::parser::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCKED: &str = include_str!("../tests/fixtures/docked.txt");
    const LAPTOP: &str = include_str!("../tests/fixtures/laptop.txt");

    #[test]
    fn docked_arguments() {
        let screen: Screen = DOCKED.parse().unwrap();
        assert_eq!(
            screen.to_arguments(),
            [
                "--output", "LVDS1", "--off",
                "--output", "DP2", "--primary", "--mode", "1920x1080", "--pos", "0x500",
                "--output", "HDMI3", "--mode", "1920x1080", "--rotate", "left", "--pos", "1930x0",
            ]
        );
    }

    #[test]
    fn laptop_arguments() {
        let screen: Screen = LAPTOP.parse().unwrap();
        assert_eq!(
            screen.to_arguments(),
            ["--output", "LVDS1", "--mode", "1920x1080", "--pos", "0x0"]
        );
    }

    #[test]
    fn arguments_are_deterministic() {
        let screen: Screen = DOCKED.parse().unwrap();
        assert_eq!(screen.to_arguments(), screen.to_arguments());
        let again: Screen = DOCKED.parse().unwrap();
        assert_eq!(screen.to_arguments(), again.to_arguments());
    }

    #[test]
    fn fingerprint_is_md5_of_edid_lines() {
        let screen: Screen = DOCKED.parse().unwrap();
        assert_eq!(screen.fingerprint(), "d9fd56be607b3e6c324e07ae20776956");
        let laptop: Screen = LAPTOP.parse().unwrap();
        assert_eq!(laptop.fingerprint(), "23d822e03c77f1068c90984bcac3cfc3");
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a: Screen = DOCKED.parse().unwrap();
        let b: Screen = DOCKED.parse().unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let changed = DOCKED.replacen(
            "00ffffffffffff0010ac66d04c4e3030",
            "00ffffffffffff0010ac66d04c4e3031",
            1,
        );
        assert_ne!(changed, DOCKED);
        let c: Screen = changed.parse().unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());

        let laptop: Screen = LAPTOP.parse().unwrap();
        assert_ne!(a.fingerprint(), laptop.fingerprint());
    }

    #[test]
    fn empty_screen_fingerprint() {
        assert_eq!(
            Screen::default().fingerprint(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }
}
