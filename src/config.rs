use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use ini::{Ini, Properties};
use tracing::info;

use crate::platform::{DEFAULT_PROGRAM, DEFAULT_TIMEOUT};
use crate::platform::Xrandr;

/// Section holding fallback values and the profile used when nothing matches.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// A stored xrandr configuration, keyed by the fingerprint it was captured under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub description: String,
    pub edid: String,
    pub args: Vec<String>,
    pub exec_post: Option<String>,
    pub display: Option<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>, edid: impl Into<String>, args: Vec<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("{name}'s xrandr profile"),
            name,
            edid: edid.into(),
            args,
            exec_post: None,
            display: None,
        }
    }

    fn from_section(name: &str, props: &Properties, defaults: Option<&Properties>) -> Self {
        let lookup = |key: &str| {
            props
                .get(key)
                .or_else(|| defaults.and_then(|d| d.get(key)))
                .map(str::to_string)
        };

        Self {
            name: name.to_string(),
            description: props
                .get("name")
                .map(str::to_string)
                .unwrap_or_else(|| format!("{name}'s xrandr profile")),
            edid: props.get("edid").unwrap_or_default().to_string(),
            args: lookup("args")
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            exec_post: lookup("exec_post").filter(|s| !s.trim().is_empty()),
            display: lookup("display").filter(|s| !s.trim().is_empty()),
        }
    }

    fn write_section(&self, ini: &mut Ini) {
        let section = Some(self.name.as_str());
        ini.set_to(section, "name".to_string(), self.description.clone());
        ini.set_to(section, "edid".to_string(), self.edid.clone());
        ini.set_to(section, "args".to_string(), self.args.join(" "));
        if let Some(exec_post) = &self.exec_post {
            ini.set_to(section, "exec_post".to_string(), exec_post.clone());
        }
        if let Some(display) = &self.display {
            ini.set_to(section, "display".to_string(), display.clone());
        }
    }

    /// The profile rendered as the `.ini` section it would be stored as.
    pub fn to_ini_string(&self) -> Result<String> {
        let mut ini = Ini::new();
        self.write_section(&mut ini);
        let mut buf = Vec::new();
        ini.write_to(&mut buf).context("render profile")?;
        Ok(String::from_utf8(buf)?)
    }
}

/// How xrandr itself is run, read from the `DEFAULT` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub xrandr: PathBuf,
    pub timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            xrandr: PathBuf::from(DEFAULT_PROGRAM),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl Settings {
    pub fn backend(&self) -> Xrandr {
        Xrandr::new(&self.xrandr, self.timeout)
    }
}

/// The `.ini` file mapping profile names to stored configurations.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
    ini: Ini,
}

impl ProfileStore {
    /// Loads the store at `path`, creating it with a `DEFAULT` section if it does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Creating config file because it does not exist: {}", path.display());
            let store = Self {
                path: path.to_path_buf(),
                ini: default_ini(env::var("DISPLAY").ok().as_deref()),
            };
            store.save()?;
            return Ok(store);
        }

        let ini = Ini::load_from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        info!("Read xrandr profile information from: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            ini,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn defaults(&self) -> Option<&Properties> {
        self.ini.section(Some(DEFAULT_SECTION))
    }

    /// Profile names in file order, excluding `DEFAULT`.
    pub fn names(&self) -> Vec<&str> {
        self.ini
            .sections()
            .flatten()
            .filter(|name| *name != DEFAULT_SECTION)
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Profile> {
        if name == DEFAULT_SECTION {
            return None;
        }
        let props = self.ini.section(Some(name))?;
        Some(Profile::from_section(name, props, self.defaults()))
    }

    pub fn find_by_fingerprint(&self, edid: &str) -> Option<Profile> {
        self.names()
            .into_iter()
            .filter_map(|name| self.get(name))
            .find(|profile| profile.edid == edid)
    }

    /// The `DEFAULT` section as a profile, applied when no profile matches.
    pub fn fallback(&self) -> Option<Profile> {
        self.defaults()
            .map(|props| Profile::from_section(DEFAULT_SECTION, props, None))
    }

    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::default();
        let Some(defaults) = self.defaults() else {
            return Ok(settings);
        };

        if let Some(program) = defaults.get("xrandr").filter(|p| !p.trim().is_empty()) {
            settings.xrandr = PathBuf::from(program.trim());
        }
        if let Some(timeout) = defaults.get("timeout") {
            let secs: f64 = timeout
                .trim()
                .parse()
                .with_context(|| format!("invalid timeout '{timeout}' in {}", self.path.display()))?;
            settings.timeout = if secs > 0.0 {
                let timeout = Duration::try_from_secs_f64(secs).with_context(|| {
                    format!("timeout '{timeout}' out of range in {}", self.path.display())
                })?;
                Some(timeout)
            } else {
                None
            };
        }
        Ok(settings)
    }

    /// Adds `profile`; refuses a taken name or an already captured fingerprint.
    pub fn insert(&mut self, profile: &Profile) -> Result<()> {
        if profile.name == DEFAULT_SECTION || self.ini.section(Some(profile.name.as_str())).is_some() {
            bail!("A profile named `{}` already exists.", profile.name);
        }
        if let Some(existing) = self.find_by_fingerprint(&profile.edid) {
            bail!(
                "A profile `{}` already exists for EDID `{}`.",
                existing.name,
                profile.edid
            );
        }
        profile.write_section(&mut self.ini);
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        self.ini
            .write_to_file(&self.path)
            .with_context(|| format!("write {}", self.path.display()))
    }
}

fn default_ini(display: Option<&str>) -> Ini {
    let mut ini = Ini::new();
    if let Some(display) = display {
        ini.set_to(Some(DEFAULT_SECTION), "display".to_string(), display.to_string());
    }
    ini.set_to(Some(DEFAULT_SECTION), "args".to_string(), "--auto".to_string());
    ini
}

/// Picks the store path: explicit flag, then `XPROFILE_CONFIG`, then `~/.xprofilerc`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(expand_home(path));
    }

    if let Ok(p) = env::var("XPROFILE_CONFIG") {
        if !p.trim().is_empty() {
            return Ok(expand_home(Path::new(&p)));
        }
    }

    env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".xprofilerc"))
        .ok_or_else(|| anyhow!("No config path available (pass --config, set XPROFILE_CONFIG or HOME)"))
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("xprofile-config-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir.join("xprofilerc")
    }

    const EXAMPLE: &str = "\
[DEFAULT]
display = :0
args = --auto
timeout = 2.5

[home]
name = Docked at home
edid = d9fd56be607b3e6c324e07ae20776956
args = --output LVDS1 --off --output DP2 --primary --mode 1920x1080 --pos 0x500
exec_post = i3-msg restart

[laptop]
name = Laptop only
edid = 23d822e03c77f1068c90984bcac3cfc3
args = --output LVDS1 --mode 1920x1080 --pos 0x0
display = :1
";

    fn example_store(name: &str) -> ProfileStore {
        let path = scratch(name);
        fs::write(&path, EXAMPLE).unwrap();
        ProfileStore::open(&path).unwrap()
    }

    #[test]
    fn missing_file_is_created_with_default_section() {
        let path = scratch("create");
        let store = ProfileStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.names().is_empty());
        let fallback = store.fallback().unwrap();
        assert_eq!(fallback.args, ["--auto"]);

        let reopened = ProfileStore::open(&path).unwrap();
        assert_eq!(reopened.fallback().unwrap().args, ["--auto"]);
    }

    #[test]
    fn lists_profiles_without_default() {
        let store = example_store("list");
        assert_eq!(store.names(), ["home", "laptop"]);
        assert!(store.get(DEFAULT_SECTION).is_none());
        assert!(store.get("office").is_none());
    }

    #[test]
    fn reads_profiles_with_default_fallbacks() {
        let store = example_store("read");

        let home = store.get("home").unwrap();
        assert_eq!(home.description, "Docked at home");
        assert_eq!(home.args.len(), 10);
        assert_eq!(home.exec_post.as_deref(), Some("i3-msg restart"));
        assert_eq!(home.display.as_deref(), Some(":0"));

        let laptop = store.get("laptop").unwrap();
        assert_eq!(laptop.display.as_deref(), Some(":1"));
        assert_eq!(laptop.exec_post, None);
    }

    #[test]
    fn finds_profile_by_fingerprint() {
        let store = example_store("find");
        let found = store
            .find_by_fingerprint("23d822e03c77f1068c90984bcac3cfc3")
            .unwrap();
        assert_eq!(found.name, "laptop");
        assert!(store.find_by_fingerprint("non-existing-edid").is_none());
    }

    #[test]
    fn settings_come_from_default_section() {
        let store = example_store("settings");
        let settings = store.settings().unwrap();
        assert_eq!(settings.xrandr, PathBuf::from("xrandr"));
        assert_eq!(settings.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn unusable_timeouts_are_errors() {
        for (name, value) in [("nan", "soon"), ("inf", "inf"), ("huge", "1e30")] {
            let path = scratch(&format!("timeout-{name}"));
            fs::write(&path, format!("[DEFAULT]\nargs = --auto\ntimeout = {value}\n")).unwrap();
            let store = ProfileStore::open(&path).unwrap();
            let err = store.settings().unwrap_err();
            assert!(err.to_string().contains(value), "{value}: {err}");
        }
    }

    #[test]
    fn zero_timeout_disables_the_deadline() {
        let path = scratch("timeout-zero");
        fs::write(&path, "[DEFAULT]\ntimeout = 0\n").unwrap();
        let store = ProfileStore::open(&path).unwrap();
        assert_eq!(store.settings().unwrap().timeout, None);
    }

    #[test]
    fn section_without_args_inherits_default_args() {
        let path = scratch("inherit-args");
        fs::write(
            &path,
            "[DEFAULT]\nargs = --auto\n\n[projector]\nedid = 0123\n",
        )
        .unwrap();
        let store = ProfileStore::open(&path).unwrap();
        let projector = store.get("projector").unwrap();
        assert_eq!(projector.args, ["--auto"]);
        assert_eq!(projector.edid, "0123");
    }

    #[test]
    fn insert_and_save_round_trip() {
        let path = scratch("insert");
        let mut store = ProfileStore::open(&path).unwrap();
        let mut profile = Profile::new(
            "office",
            "abc123",
            vec!["--output".into(), "DP1".into(), "--off".into()],
        );
        profile.exec_post = Some("notify-send office".into());
        store.insert(&profile).unwrap();
        store.save().unwrap();

        let reopened = ProfileStore::open(&path).unwrap();
        let stored = reopened.get("office").unwrap();
        assert_eq!(stored.description, "office's xrandr profile");
        assert_eq!(stored.args, ["--output", "DP1", "--off"]);
        assert_eq!(stored.exec_post.as_deref(), Some("notify-send office"));
        assert_eq!(reopened.find_by_fingerprint("abc123").unwrap().name, "office");
    }

    #[test]
    fn insert_refuses_duplicates() {
        let mut store = example_store("duplicates");
        let same_name = Profile::new("home", "fresh-edid", vec!["--auto".into()]);
        assert!(store.insert(&same_name).is_err());

        let same_edid = Profile::new("other", "d9fd56be607b3e6c324e07ae20776956", vec![]);
        let err = store.insert(&same_edid).unwrap_err();
        assert!(err.to_string().contains("`home`"));

        assert!(store.insert(&Profile::new(DEFAULT_SECTION, "x", vec![])).is_err());
    }

    #[test]
    fn renders_section_for_dry_run() {
        let profile = Profile::new("dock", "ffff", vec!["--output".into(), "DP2".into(), "--off".into()]);
        let text = profile.to_ini_string().unwrap();
        assert!(text.contains("[dock]"));
        assert!(text.contains("edid=ffff"));
        assert!(text.contains("args=--output DP2 --off"));
    }

    #[test]
    fn explicit_path_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/custom-xprofilerc"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom-xprofilerc"));
    }
}
