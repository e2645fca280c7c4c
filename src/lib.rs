//! Capture and re-apply xrandr layouts as named profiles.
//!
//! `xrandr --verbose` output is parsed into a [`Screen`]; its [`Screen::fingerprint`]
//! identifies the attached monitors and [`Screen::to_arguments`] recreates the layout.

pub mod commands;
pub mod config;
pub mod display;
mod error;
pub mod parser;
pub mod platform;
pub mod screen;

pub use display::{Display, Geometry, Mode, Rotation, Status};
pub use error::{Error, Result};
pub use screen::Screen;
