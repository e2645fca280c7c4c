use std::{
    collections::BTreeMap,
    io::{self, Read},
    process::{Command, Output, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, info};

use crate::error::{Error, Result};

mod xrandr;

pub use xrandr::{Xrandr, DEFAULT_PROGRAM, DEFAULT_TIMEOUT};

/// Extra environment for a child process, merged over the inherited one.
pub type Env = BTreeMap<String, String>;

/// The display-configuration utility, reduced to what profiles need from it.
pub trait Backend {
    /// Runs the utility with `args` and returns its stdout.
    ///
    /// Fails with [`Error::Invocation`] carrying stderr when the exit status is non-zero.
    fn invoke(&self, args: &[String], env: &Env) -> Result<String>;
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(handle: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| io::Error::other("pipe reader panicked"))?
}

/// Spawns `cmd` with captured stdout/stderr and waits for it, killing it once `timeout` expires.
pub(crate) fn run(mut cmd: Command, label: &str, timeout: Option<Duration>) -> Result<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    // A deadline past what `Instant` can represent is the same as none.
    let Some((timeout, deadline)) =
        timeout.and_then(|t| Instant::now().checked_add(t).map(|deadline| (t, deadline)))
    else {
        return Ok(child.wait_with_output()?);
    };

    // Both pipes are drained concurrently so a chatty child cannot block on a full pipe.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            if let Err(err) = child.kill() {
                debug!("{label}: kill after timeout failed: {err}");
            }
            if let Err(err) = child.wait() {
                debug!("{label}: reaping after timeout failed: {err}");
            }
            // Readers stay detached: a grandchild may still hold the pipes.
            return Err(Error::Invocation(format!(
                "{label} timed out after {:.1}s",
                timeout.as_secs_f64()
            )));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: collect(stdout)?,
        stderr: collect(stderr)?,
    })
}

/// Runs a profile's `exec_post` command through `sh -c`.
pub fn run_hook(command: &str, env: &Env) -> Result<()> {
    debug!("running post-activation command: {command}");
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).envs(env);

    let out = run(cmd, "exec_post", None)?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    if !stdout.trim().is_empty() {
        info!("{}", stdout.trim_end());
    }
    if !out.status.success() {
        return Err(Error::Invocation(
            String::from_utf8_lossy(&out.stderr).into_owned(),
        ));
    }
    Ok(())
}
