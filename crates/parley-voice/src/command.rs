//! Speech recognition backed by an external command.
//!
//! The command is expected to listen for one utterance and print its
//! transcript on stdout. The first non-empty line wins. Any `{language}` in
//! the arguments is replaced with the session's locale, so wrappers around
//! engines like `whisper` or `vosk` can be plugged in from configuration.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use parley_core::config::VoiceConfig;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::oneshot;

use crate::error::RecognitionError;
use crate::recognizer::{
    RecognitionCallback, RecognitionConfig, RecognitionResult, RecognitionSession,
    SpeechRecognizer,
};

const LANGUAGE_PLACEHOLDER: &str = "{language}";

/// Runs one child process per recognition session.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from `[voice]` settings. `None` when no command is configured.
    pub fn from_config(config: &VoiceConfig) -> Option<Self> {
        let program = config.command.trim();
        if program.is_empty() {
            return None;
        }
        Some(Self::new(program, config.args.clone()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn args_for(&self, config: &RecognitionConfig) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(LANGUAGE_PLACEHOLDER, &config.language))
            .collect()
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn is_available(&self) -> bool {
        !self.program.trim().is_empty() && find_executable(&self.program).is_some()
    }

    fn start(
        &self,
        config: &RecognitionConfig,
        callback: RecognitionCallback,
    ) -> Result<Box<dyn RecognitionSession>, RecognitionError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RecognitionError::new("no-runtime", e.to_string()))?;

        let args = self.args_for(config);
        tracing::debug!(program = %self.program, ?args, "Spawning recognizer command");

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a stop also reaches whatever the command spawned.
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|e| RecognitionError::new("spawn-failed", e.to_string()))?;
        let pid = child.id();

        let (stop_tx, stop_rx) = oneshot::channel();
        runtime.spawn(run_session(child, pid, stop_rx, callback));

        Ok(Box::new(CommandSession {
            stop: Some(stop_tx),
            pid,
        }))
    }
}

struct CommandSession {
    stop: Option<oneshot::Sender<()>>,
    pid: Option<u32>,
}

impl RecognitionSession for CommandSession {
    /// Kills the command before returning, so a following session never
    /// shares the audio device with this one.
    fn stop(&mut self) {
        let Some(tx) = self.stop.take() else {
            return;
        };
        if let Some(pid) = self.pid {
            terminate(pid);
        }
        let _ = tx.send(());
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drive one child process to an outcome, or reap it when stopped.
async fn run_session(
    mut child: Child,
    pid: Option<u32>,
    mut stop_rx: oneshot::Receiver<()>,
    callback: RecognitionCallback,
) {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take().map(|s| tokio::spawn(read_stderr(s)));

    let outcome = tokio::select! {
        biased;
        _ = &mut stop_rx => None,
        result = read_transcript(&mut child, stdout, stderr) => Some(result),
    };

    if let Some(result) = outcome {
        callback.deliver(result);
        // The command may have left helpers running after printing.
        if let Some(pid) = pid {
            signal_group(pid);
        }
    } else {
        tracing::debug!("Recognizer command stopped");
    }

    if let Err(e) = child.kill().await {
        tracing::trace!(error = %e, "Recognizer command already exited");
    }
}

async fn read_transcript(
    child: &mut Child,
    stdout: Option<ChildStdout>,
    stderr: Option<tokio::task::JoinHandle<String>>,
) -> RecognitionResult {
    if let Some(stdout) = stdout {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let transcript = line.trim();
                    if !transcript.is_empty() {
                        return Ok(transcript.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(RecognitionError::new("io", e.to_string())),
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| RecognitionError::new("io", e.to_string()))?;
    if status.success() {
        return Err(RecognitionError::no_speech());
    }

    let detail = match stderr {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };
    let code = status
        .code()
        .map(|c| format!("exit-{}", c))
        .unwrap_or_else(|| "killed".to_string());
    Err(RecognitionError::new(code, detail.trim()))
}

async fn read_stderr(mut stderr: ChildStderr) -> String {
    let mut buf = String::new();
    if let Err(e) = stderr.read_to_string(&mut buf).await {
        tracing::debug!(error = %e, "Failed to read recognizer stderr");
    }
    buf
}

/// Kill the command's process group and block until the command itself has
/// exited. The exited process is left for the runtime to reap.
#[cfg(unix)]
fn terminate(pid: u32) {
    if !signal_group(pid) {
        return;
    }
    let id = pid as libc::id_t;
    loop {
        // SAFETY: `info` is a valid, zeroed out-parameter. WNOWAIT leaves the
        // zombie in place, so the runtime's own wait still sees it.
        let rc = unsafe {
            let mut info: libc::siginfo_t = std::mem::zeroed();
            libc::waitid(libc::P_PID, id, &mut info, libc::WEXITED | libc::WNOWAIT)
        };
        if rc == 0 {
            return;
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            // ECHILD: already reaped by the runtime.
            tracing::trace!(pid, error = %err, "Recognizer command already reaped");
            return;
        }
    }
}

#[cfg(not(unix))]
fn terminate(_pid: u32) {}

/// Send SIGKILL to the command's process group. Returns whether it was sent.
#[cfg(unix)]
fn signal_group(pid: u32) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: plain syscall; the group id is the pid of a child spawned as
    // its own group leader.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        tracing::trace!(
            pid,
            error = %std::io::Error::last_os_error(),
            "Recognizer process group already gone"
        );
    }
    rc == 0
}

#[cfg(not(unix))]
fn signal_group(_pid: u32) -> bool {
    false
}

/// Resolve `program` the way a shell would: as a path when it has a
/// directory component, otherwise by searching `PATH`.
fn find_executable(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn shell(script: &str) -> CommandRecognizer {
        CommandRecognizer::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    async fn run(recognizer: &CommandRecognizer, config: &RecognitionConfig) -> RecognitionResult {
        let (callback, rx) = RecognitionCallback::channel();
        let _session = recognizer.start(config, callback).unwrap();
        tokio::time::timeout(Duration::from_secs(10), rx)
            .await
            .expect("recognizer did not report")
            .expect("session ended without an outcome")
    }

    /// Whether `pid` is alive. Zombies count as gone.
    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .ok()
            .and_then(|stat| {
                stat.rsplit_once(')')
                    .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
            })
            .unwrap_or(false)
    }

    /// Wait until the script has written `count` lines of "<shell pid> <child pid>".
    #[cfg(target_os = "linux")]
    async fn wait_for_pids(path: &Path, count: usize) -> Vec<(u32, u32)> {
        for _ in 0..250 {
            if let Ok(content) = std::fs::read_to_string(path) {
                let rows: Vec<(u32, u32)> = content
                    .lines()
                    .filter_map(|line| {
                        let (a, b) = line.split_once(' ')?;
                        Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
                    })
                    .collect();
                if rows.len() >= count {
                    return rows;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("command never wrote its pids");
    }

    // ---- Availability ----

    #[test]
    fn test_availability() {
        assert!(shell("true").is_available());
        assert!(!CommandRecognizer::new("", Vec::new()).is_available());
        assert!(!CommandRecognizer::new("parley-no-such-recognizer", Vec::new()).is_available());
        assert!(!CommandRecognizer::new("/no/such/dir/recognizer", Vec::new()).is_available());
    }

    #[test]
    fn test_from_config() {
        assert!(CommandRecognizer::from_config(&VoiceConfig::default()).is_none());

        let config = VoiceConfig {
            command: " listen ".to_string(),
            args: vec!["--lang".to_string(), "{language}".to_string()],
            ..VoiceConfig::default()
        };
        let recognizer = CommandRecognizer::from_config(&config).unwrap();
        assert_eq!(recognizer.program(), "listen");
        let args = recognizer.args_for(&RecognitionConfig {
            language: "de-DE".to_string(),
            ..RecognitionConfig::default()
        });
        assert_eq!(args, vec!["--lang", "de-DE"]);
    }

    // ---- Outcomes ----

    #[tokio::test]
    async fn test_first_non_empty_line_is_transcript() {
        let recognizer = shell("echo; echo '  hello there  '; echo ignored");
        let result = run(&recognizer, &RecognitionConfig::default()).await;
        assert_eq!(result, Ok("hello there".to_string()));
    }

    #[tokio::test]
    async fn test_language_substituted() {
        let recognizer = shell("echo {language}");
        let config = RecognitionConfig {
            language: "fr-FR".to_string(),
            ..RecognitionConfig::default()
        };
        assert_eq!(run(&recognizer, &config).await, Ok("fr-FR".to_string()));
    }

    #[tokio::test]
    async fn test_silent_success_is_no_speech() {
        let result = run(&shell("exit 0"), &RecognitionConfig::default()).await;
        assert_eq!(result.unwrap_err().code, "no-speech");
    }

    #[tokio::test]
    async fn test_failure_exit_code_and_stderr() {
        let recognizer = shell("echo 'microphone busy' >&2; exit 3");
        let err = run(&recognizer, &RecognitionConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, "exit-3");
        assert_eq!(err.message, "microphone busy");
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let recognizer = CommandRecognizer::new("/no/such/dir/recognizer", Vec::new());
        let (callback, _rx) = RecognitionCallback::channel();
        let err = recognizer
            .start(&RecognitionConfig::default(), callback)
            .err()
            .unwrap();
        assert_eq!(err.code, "spawn-failed");
    }

    // ---- Stop ----

    #[tokio::test]
    async fn test_stop_reports_nothing() {
        let recognizer = shell("sleep 5; echo late");
        let (callback, rx) = RecognitionCallback::channel();
        let mut session = recognizer
            .start(&RecognitionConfig::default(), callback)
            .unwrap();

        session.stop();
        session.stop();

        let received = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("stopped session did not close");
        assert!(received.is_err());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_stop_kills_command_and_its_children_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let pids = dir.path().join("pids");
        let recognizer = shell(&format!(
            "sleep 30 & echo \"$$ $!\" >> '{}'; wait",
            pids.display()
        ));
        let (callback, rx) = RecognitionCallback::channel();
        let mut session = recognizer
            .start(&RecognitionConfig::default(), callback)
            .unwrap();
        let (shell_pid, child_pid) = wait_for_pids(&pids, 1).await[0];
        assert!(is_running(shell_pid));
        assert!(is_running(child_pid));

        session.stop();

        // Synchronous for the command itself.
        assert!(!is_running(shell_pid));
        // The group was signalled; the orphan just needs to be scheduled.
        for _ in 0..100 {
            if !is_running(child_pid) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!is_running(child_pid));
        assert!(rx.await.is_err());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropping_session_kills_command() {
        let dir = tempfile::tempdir().unwrap();
        let pids = dir.path().join("pids");
        let recognizer = shell(&format!(
            "sleep 30 & echo \"$$ $!\" >> '{}'; wait",
            pids.display()
        ));
        let (callback, _rx) = RecognitionCallback::channel();
        let session = recognizer
            .start(&RecognitionConfig::default(), callback)
            .unwrap();
        let (shell_pid, _) = wait_for_pids(&pids, 1).await[0];

        drop(session);

        assert!(!is_running(shell_pid));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let (callback, _rx) = RecognitionCallback::channel();
        let err = shell("true")
            .start(&RecognitionConfig::default(), callback)
            .err()
            .unwrap();
        assert_eq!(err.code, "no-runtime");
    }
}
