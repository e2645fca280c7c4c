use std::{path::PathBuf, process::Command, time::Duration};

use tracing::debug;

use super::{Backend, Env};
use crate::error::{Error, Result};

pub const DEFAULT_PROGRAM: &str = "xrandr";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the `xrandr` binary.
#[derive(Debug, Clone)]
pub struct Xrandr {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Default for Xrandr {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM, Some(DEFAULT_TIMEOUT))
    }
}

impl Xrandr {
    pub fn new(program: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Backend for Xrandr {
    fn invoke(&self, args: &[String], env: &Env) -> Result<String> {
        debug!("running {} {}", self.program.display(), args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(args).envs(env);

        let label = self.program.display().to_string();
        let out = super::run(cmd, &label, self.timeout)?;
        if !out.status.success() {
            debug!("{label} failed ({})", out.status);
            return Err(Error::Invocation(
                String::from_utf8_lossy(&out.stderr).into_owned(),
            ));
        }
        Ok(String::from_utf8(out.stdout)?)
    }
}
