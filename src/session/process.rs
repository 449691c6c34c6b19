//! Recognition engine backed by an external recognizer process
//!
//! The recognizer is launched once per engine instance with
//! `--lang <tag> [--continuous] [--interim]` and writes one JSON object per
//! line on stdout:
//!
//! ```text
//! {"type":"start"}
//! {"type":"result","transcript":"hey chef","is_final":false}
//! {"type":"result","alternatives":[{"transcript":"hey chef play","is_final":true}]}
//! {"type":"error","code":"no-speech"}
//! ```
//!
//! Process exit is reported as the end of the session.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::engine::{
    Alternative, EngineConfig, EngineError, EngineErrorCode, EngineEvent, EngineFactory,
    EngineSink, RecognitionEngine,
};

/// One line of recognizer output
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RecognizerLine {
    Start,
    Result {
        #[serde(default)]
        transcript: Option<String>,
        #[serde(default)]
        is_final: bool,
        #[serde(default)]
        alternatives: Vec<Alternative>,
    },
    Error {
        code: String,
    },
}

/// Parse a recognizer output line into an engine event
fn parse_line(line: &str) -> Option<EngineEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let parsed: RecognizerLine = match serde_json::from_str(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(?e, line, "ignoring malformed recognizer output");
            return None;
        }
    };

    Some(match parsed {
        RecognizerLine::Start => EngineEvent::Started,
        RecognizerLine::Result {
            transcript,
            is_final,
            mut alternatives,
        } => {
            if let Some(transcript) = transcript {
                alternatives.insert(0, Alternative { transcript, is_final });
            }
            EngineEvent::Result { alternatives }
        }
        RecognizerLine::Error { code } => EngineEvent::Error(EngineErrorCode::from_code(&code)),
    })
}

/// Find an executable by path or on `PATH`
fn resolve_program(command: &str) -> Option<PathBuf> {
    let path = Path::new(command);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}

/// Builds `CommandEngine`s for a configured recognizer program
#[derive(Debug, Clone)]
pub struct CommandEngineFactory {
    program: Option<PathBuf>,
    args: Vec<String>,
}

impl CommandEngineFactory {
    /// Resolve the recognizer once; an unresolvable command means unsupported
    pub fn new(command: Option<&str>, args: Vec<String>) -> Self {
        let program = command.and_then(|cmd| {
            let resolved = resolve_program(cmd);
            if resolved.is_none() {
                warn!(command = cmd, "recognizer not found");
            }
            resolved
        });

        Self { program, args }
    }
}

impl EngineFactory for CommandEngineFactory {
    fn is_supported(&self) -> bool {
        self.program.is_some()
    }

    fn create(
        &self,
        config: EngineConfig,
        sink: EngineSink,
    ) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        let program = self.program.clone().ok_or(EngineError::Unsupported)?;
        Ok(Box::new(CommandEngine {
            program,
            args: self.args.clone(),
            config,
            sink,
            stop_tx: None,
        }))
    }
}

/// One running recognizer process
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<String>,
    config: EngineConfig,
    sink: EngineSink,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl CommandEngine {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg("--lang").arg(&self.config.language);
        if self.config.continuous {
            command.arg("--continuous");
        }
        if self.config.interim_results {
            command.arg("--interim");
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

impl RecognitionEngine for CommandEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.stop_tx.is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::Spawn(e.to_string()))?;

        let child = self.command().spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EngineError::Unsupported,
            _ => EngineError::Spawn(e.to_string()),
        })?;

        info!(
            program = %self.program.display(),
            language = %self.config.language,
            generation = self.sink.generation(),
            "recognizer spawned"
        );

        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);
        handle.spawn(pump_output(child, self.sink.clone(), stop_rx));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

/// Forward recognizer output until it exits or is told to stop
async fn pump_output(mut child: Child, sink: EngineSink, mut stop_rx: oneshot::Receiver<()>) {
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(event) = parse_line(&line) {
                            sink.emit(event);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(?e, "failed to read recognizer output");
                        break;
                    }
                },
                // Fires on an explicit stop and when the engine is dropped
                _ = &mut stop_rx => {
                    if let Err(e) = child.start_kill() {
                        debug!(?e, "recognizer already exited");
                    }
                    break;
                }
            }
        }
    }

    match child.wait().await {
        Ok(status) => debug!(%status, generation = sink.generation(), "recognizer exited"),
        Err(e) => warn!(?e, "failed to reap recognizer"),
    }
    sink.emit(EngineEvent::Ended);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::engine::EngineMessage;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn test_parse_start_and_error() {
        assert_eq!(parse_line(r#"{"type":"start"}"#), Some(EngineEvent::Started));
        assert_eq!(
            parse_line(r#"{"type":"error","code":"not-allowed"}"#),
            Some(EngineEvent::Error(EngineErrorCode::PermissionDenied))
        );
    }

    #[test]
    fn test_parse_result_shorthand_and_list() {
        let event = parse_line(r#"{"type":"result","transcript":"Hey Chef","is_final":true}"#);
        assert_eq!(
            event,
            Some(EngineEvent::Result {
                alternatives: vec![Alternative {
                    transcript: "Hey Chef".to_string(),
                    is_final: true,
                }],
            })
        );

        let event = parse_line(
            r#"{"type":"result","alternatives":[{"transcript":"pause","is_final":false}]}"#,
        );
        assert!(matches!(event, Some(EngineEvent::Result { alternatives }) if alternatives.len() == 1));
    }

    #[test]
    fn test_parse_ignores_garbage() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("loading model..."), None);
        assert_eq!(parse_line(r#"{"type":"unknown"}"#), None);
    }

    #[test]
    fn test_missing_recognizer_is_unsupported() {
        let factory = CommandEngineFactory::new(Some("heychef-no-such-recognizer"), Vec::new());
        assert!(!factory.is_supported());

        let factory = CommandEngineFactory::new(None, Vec::new());
        assert!(!factory.is_supported());
    }

    #[tokio::test]
    async fn test_process_output_reaches_sink() {
        let script = r#"printf '{"type":"start"}\n{"type":"result","transcript":"hey chef play","is_final":true}\n'"#;
        let factory = CommandEngineFactory::new(
            Some("sh"),
            vec!["-c".to_string(), script.to_string()],
        );
        assert!(factory.is_supported());

        let (tx, mut rx) = mpsc::unbounded_channel::<EngineMessage>();
        let mut engine = factory
            .create(EngineConfig::continuous("en-US"), EngineSink::new(3, tx))
            .unwrap();
        engine.start().unwrap();

        let mut events = Vec::new();
        while let Ok(Some(message)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            assert_eq!(message.generation, 3);
            let ended = message.event == EngineEvent::Ended;
            events.push(message.event);
            if ended {
                break;
            }
        }

        assert_eq!(events.first(), Some(&EngineEvent::Started));
        assert_eq!(events.last(), Some(&EngineEvent::Ended));
        assert_eq!(events.len(), 3);
    }
}
