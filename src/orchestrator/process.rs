//! Child-process seam.
//!
//! The orchestrator only talks to [`Launcher`] and [`SimProcess`], so tests
//! can substitute a process whose exit they control.

use futures::future::{BoxFuture, FutureExt};
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

/// A running simulator.
pub trait SimProcess: Send {
    /// OS process id, if known.
    fn id(&self) -> Option<u32>;

    /// Resolve when the process exits, with its exit code (`None` when it
    /// was ended by a signal).
    fn wait(&mut self) -> BoxFuture<'_, io::Result<Option<i32>>>;

    /// Terminate the process and reap it.
    fn terminate(&mut self) -> BoxFuture<'_, io::Result<()>>;
}

/// Starts simulator processes.
pub trait Launcher: Send + Sync {
    /// Human-readable command line, for error messages.
    fn describe(&self) -> String;

    fn launch(&self, working_dir: &Path) -> io::Result<Box<dyn SimProcess>>;
}

/// Launches `<program> <args...>` with inherited stdio.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `<interpreter> <entry>`, no further arguments.
    pub fn simulator(interpreter: &str, entry: &str) -> Self {
        Self::new(interpreter, vec![entry.to_string()])
    }
}

impl Launcher for CommandLauncher {
    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn launch(&self, working_dir: &Path) -> io::Result<Box<dyn SimProcess>> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        debug!("Spawned `{}` as pid {:?}", self.describe(), child.id());
        Ok(Box::new(ChildProcess { child }))
    }
}

struct ChildProcess {
    child: Child,
}

impl SimProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn wait(&mut self) -> BoxFuture<'_, io::Result<Option<i32>>> {
        async move {
            let status = self.child.wait().await?;
            Ok(status.code())
        }
        .boxed()
    }

    fn terminate(&mut self) -> BoxFuture<'_, io::Result<()>> {
        async move {
            // SIGKILL on Unix: the simulator cannot trap it, so any partially
            // written output is left as is. Already exited is fine; the wait
            // below reaps either way.
            if let Err(e) = self.child.start_kill() {
                if e.kind() != io::ErrorKind::InvalidInput {
                    return Err(e);
                }
            }
            self.child.wait().await?;
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let launcher = CommandLauncher::simulator("python3", "BSE.py");
        assert_eq!(launcher.describe(), "python3 BSE.py");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_kills_without_exit_code() {
        let launcher = CommandLauncher::new("sleep", vec!["30".to_string()]);
        let mut process = launcher.launch(Path::new(".")).unwrap();
        assert!(process.id().is_some());

        tokio::time::timeout(std::time::Duration::from_secs(5), process.terminate())
            .await
            .expect("terminate did not return")
            .unwrap();
        // Ended by a signal, so there is no exit code.
        assert_eq!(process.wait().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_launch() {
        let launcher = CommandLauncher::new("bse-runner-no-such-binary", vec![]);
        assert!(launcher.launch(Path::new(".")).is_err());
    }
}
