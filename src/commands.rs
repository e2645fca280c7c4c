use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use crate::config::{Profile, ProfileStore, DEFAULT_SECTION};
use crate::platform::{self, Backend, Env};
use crate::screen::Screen;

/// What a command needs besides the store: the xrandr backend and a `--display` override.
pub struct Session<'a> {
    pub backend: &'a dyn Backend,
    pub display: Option<String>,
}

impl<'a> Session<'a> {
    pub fn new(backend: &'a dyn Backend, display: Option<String>) -> Self {
        Self { backend, display }
    }

    /// Child environment: `--display`, then the profile's display, then `DEFAULT`'s.
    pub fn env(&self, store: &ProfileStore, profile: Option<&Profile>) -> Env {
        let display = self
            .display
            .clone()
            .or_else(|| profile.and_then(|p| p.display.clone()))
            .or_else(|| store.fallback().and_then(|p| p.display));

        let mut env = Env::new();
        if let Some(display) = display {
            env.insert("DISPLAY".to_string(), display);
        }
        env
    }

    pub fn screen(&self, store: &ProfileStore) -> Result<Screen> {
        Screen::query(self.backend, &self.env(store, None)).context("query xrandr")
    }
}

#[derive(Debug)]
pub struct Current {
    pub screen: Screen,
    pub fingerprint: String,
    pub args: Vec<String>,
    pub profile: Option<String>,
}

pub fn current(session: &Session<'_>, store: &ProfileStore) -> Result<Current> {
    let screen = session.screen(store)?;
    let fingerprint = screen.fingerprint();
    let profile = store.find_by_fingerprint(&fingerprint).map(|p| p.name);
    Ok(Current {
        args: screen.to_arguments(),
        screen,
        fingerprint,
        profile,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub profile: String,
    pub args: Vec<String>,
    pub applied: bool,
}

/// Picks the profile matching the live fingerprint, or `DEFAULT` when none does.
pub fn detect(session: &Session<'_>, store: &ProfileStore) -> Result<Profile> {
    let fingerprint = session.screen(store)?.fingerprint();
    info!("Auto detecting profile for EDID: {fingerprint}");

    if let Some(profile) = store.find_by_fingerprint(&fingerprint) {
        info!("Identified current state as profile: {}", profile.name);
        return Ok(profile);
    }

    error!("No known profile found for EDID: {fingerprint}");
    store
        .fallback()
        .with_context(|| format!("no profile matches EDID {fingerprint} and there is no {DEFAULT_SECTION} section"))
}

/// Applies the named profile, or the auto-detected one when `name` is `None`.
pub fn activate(
    session: &Session<'_>,
    store: &ProfileStore,
    name: Option<&str>,
    dry_run: bool,
) -> Result<Activation> {
    let profile = match name {
        Some(name) => match store.get(name) {
            Some(profile) => {
                info!("Activating profile: {name}");
                profile
            }
            None => bail!("Profile {name} not found"),
        },
        None => detect(session, store)?,
    };

    if profile.args.is_empty() {
        bail!("Profile {} has no xrandr arguments", profile.name);
    }

    info!("Calling xrandr with: {}", profile.args.join(" "));
    if dry_run {
        warn!("Not calling xrandr because --dry-run option detected");
        return Ok(Activation {
            profile: profile.name,
            args: profile.args,
            applied: false,
        });
    }

    let env = session.env(store, Some(&profile));
    session
        .backend
        .invoke(&profile.args, &env)
        .with_context(|| format!("activate profile {}", profile.name))?;

    if let Some(command) = profile.exec_post.as_deref() {
        info!("Running exec_post: {command}");
        platform::run_hook(command, &env)
            .with_context(|| format!("exec_post of profile {}", profile.name))?;
    }

    Ok(Activation {
        profile: profile.name,
        args: profile.args,
        applied: true,
    })
}

#[derive(Debug, Default, Clone)]
pub struct CreateOptions {
    pub description: Option<String>,
    pub exec_post: Option<String>,
    pub dry_run: bool,
}

/// Captures the live layout as profile `name`; saves it unless `dry_run`.
pub fn create(
    session: &Session<'_>,
    store: &mut ProfileStore,
    name: &str,
    options: &CreateOptions,
) -> Result<Profile> {
    let screen = session.screen(store)?;

    let mut profile = Profile::new(name, screen.fingerprint(), screen.to_arguments());
    if let Some(description) = options.description.clone() {
        profile.description = description;
    }
    profile.exec_post = options.exec_post.clone();
    profile.display = session.display.clone();

    if options.dry_run {
        store.clone().insert(&profile)?;
        return Ok(profile);
    }

    store.insert(&profile)?;
    store.save()?;
    Ok(profile)
}
