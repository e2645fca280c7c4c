use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, trace};

use crate::display::{Display, Geometry, Mode, Rotation, Status};
use crate::error::{Error, Result};
use crate::screen::Screen;

// Header, e.g.
// DP2 connected primary 1920x1080+0+500 (0x48) normal (normal left inverted right x axis y axis) 531mm x 299mm
// VGA1 connected 1280x1024+0+0 (normal left inverted right x axis y axis) 340mm x 270mm
// TV1 unknown connection (normal left inverted right x axis y axis)
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<name>\S+) (?P<status>connected|disconnected|unknown connection)",
        r"(?: (?P<primary>primary))?",
        r"(?: (?P<width>\d+)x(?P<height>\d+)\+(?P<x>\d+)\+(?P<y>\d+))?",
        r"(?: \((?P<mode>0x[0-9a-f]+)\))?",
        r"(?: (?P<rotation>normal|left|inverted|right))?",
        r"(?:\s.*)?$",
    ))
    .expect("valid header regex")
});

static EDID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?P<edid>[0-9a-f]{32})\s*$").expect("valid EDID regex"));

// Modeline, e.g.
//   1920x1080 (0x48) 148.500MHz +HSync +VSync *current +preferred
//   1920x1080_60.00 (0x1ea) 173.000MHz -HSync +VSync
// The first token is the mode name, which is what `--mode` takes.
static MODELINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(?P<dimension>\S+)\s+\((?P<id>0x[0-9a-f]+)\)\s+[\d.]+MHz(?P<flags>.*)$")
        .expect("valid modeline regex")
});

enum Line<'a> {
    Header(Captures<'a>),
    Edid(&'a str),
    Modeline(Captures<'a>),
    Noise,
}

fn classify(line: &str) -> Line<'_> {
    if let Some(caps) = HEADER.captures(line) {
        return Line::Header(caps);
    }
    if let Some(caps) = EDID.captures(line) {
        if let Some(edid) = caps.name("edid") {
            return Line::Edid(edid.as_str());
        }
    }
    if let Some(caps) = MODELINE.captures(line) {
        return Line::Modeline(caps);
    }
    Line::Noise
}

fn display_from_header(caps: &Captures<'_>, line_no: usize) -> Result<Display> {
    let group = |name: &str| caps.name(name).map(|m| m.as_str());

    let name = group("name").unwrap_or_default();
    let status: Status = group("status")
        .unwrap_or_default()
        .parse()
        .map_err(|message| Error::Parse {
            line: line_no,
            message,
        })?;

    let geometry = match (group("width"), group("height"), group("x"), group("y")) {
        (Some(w), Some(h), Some(x), Some(y)) => Some(Geometry {
            dimension: format!("{w}x{h}"),
            offset: format!("{x}x{y}"),
        }),
        _ => None,
    };

    Ok(Display::new(
        name,
        status,
        group("primary").is_some(),
        geometry,
        group("mode").map(str::to_string),
        group("rotation").and_then(Rotation::from_token),
    ))
}

fn current<'a>(displays: &'a mut [Display], line_no: usize, what: &str) -> Result<&'a mut Display> {
    displays.last_mut().ok_or_else(|| Error::Parse {
        line: line_no,
        message: format!("{what} found before any output header"),
    })
}

/// Parses `xrandr` (preferably `--verbose`) output into a [`Screen`].
pub fn parse(text: &str) -> Result<Screen> {
    let mut displays: Vec<Display> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        match classify(line) {
            Line::Header(caps) => {
                let output = display_from_header(&caps, line_no)?;
                if displays.iter().any(|d| d.name() == output.name()) {
                    return Err(Error::Parse {
                        line: line_no,
                        message: format!("duplicate output '{}'", output.name()),
                    });
                }
                debug!(
                    "parsed output {} ({}, active={})",
                    output.name(),
                    output.status(),
                    output.active()
                );
                displays.push(output);
            }
            Line::Edid(fragment) => {
                current(&mut displays, line_no, "EDID data")?.push_edid(fragment.to_string());
            }
            Line::Modeline(caps) => {
                let output = current(&mut displays, line_no, "modeline")?;
                let flags = caps.name("flags").map(|m| m.as_str()).unwrap_or_default();
                let id = caps["id"].to_string();
                trace!("{}: mode {id} {}", output.name(), &caps["dimension"]);
                output.insert_mode(
                    id,
                    Mode {
                        dimension: caps["dimension"].to_string(),
                        current: flags.contains("*current"),
                        preferred: flags.contains("+preferred"),
                    },
                );
            }
            Line::Noise => {}
        }
    }

    Ok(Screen::new(displays))
}
