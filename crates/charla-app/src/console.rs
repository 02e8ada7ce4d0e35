//! Interactive terminal chat.
//!
//! Input, turns and output are decoupled through one event channel: a reader
//! task forwards lines, each turn runs in its own task, and finished turns
//! come back as events. The loop never waits on the network directly, but
//! only one turn is in flight at a time so replies stay in order.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use charla_chat::{is_exit_command, render, ConversationOrchestrator, DisplayLine};
use charla_core::types::{SessionHandle, Utterance};

/// Prefix of the console command that sends a WAV file as a voice turn.
const VOICE_COMMAND: &str = "/voz";
const PROMPT: &str = "You: ";

#[derive(Debug)]
pub enum ConsoleEvent {
    /// A line typed by the user.
    Input(String),
    /// Standard input reached end of file.
    InputClosed,
    /// A turn finished; these lines are ready to print.
    TurnFinished(Vec<String>),
    /// A voice turn heard an exit word; print these lines and stop.
    ExitRequested(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Exit,
    Skip,
    Text(String),
    Voice(PathBuf),
}

fn parse_command(line: &str) -> ConsoleCommand {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleCommand::Skip;
    }
    if is_exit_command(line) {
        return ConsoleCommand::Exit;
    }
    if let Some(rest) = line.strip_prefix(VOICE_COMMAND) {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return ConsoleCommand::Voice(PathBuf::from(rest.trim()));
        }
    }
    ConsoleCommand::Text(line.to_string())
}

fn format_reply(lines: Vec<DisplayLine>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| match line {
            DisplayLine::Message(text) => format!("Assistant: {}", text),
            other => other.to_string(),
        })
        .collect()
}

/// Run the chat until an exit word or end of input, then close the session.
pub async fn run_console<R, W>(
    orchestrator: Arc<ConversationOrchestrator>,
    input: R,
    output: &mut W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: Write,
{
    let session = match orchestrator.open_session().await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "Could not start a conversation");
            writeln!(output, "Error: {}", e)?;
            return Ok(());
        }
    };

    writeln!(
        output,
        "Conversation started. Type exit, quit or salir to leave; {} <file.wav> sends audio.",
        VOICE_COMMAND
    )?;

    let (tx, mut rx) = mpsc::channel::<ConsoleEvent>(32);
    let reader = tokio::spawn(read_lines(input, tx.clone()));

    let mut pending: VecDeque<String> = VecDeque::new();
    let mut busy = false;
    let mut input_closed = false;

    write!(output, "{}", PROMPT)?;
    output.flush()?;

    'events: while let Some(event) = rx.recv().await {
        match event {
            ConsoleEvent::Input(line) => pending.push_back(line),
            ConsoleEvent::InputClosed => input_closed = true,
            ConsoleEvent::TurnFinished(lines) => {
                busy = false;
                for line in lines {
                    writeln!(output, "{}", line)?;
                }
                write!(output, "{}", PROMPT)?;
                output.flush()?;
            }
            ConsoleEvent::ExitRequested(lines) => {
                for line in lines {
                    writeln!(output, "{}", line)?;
                }
                break 'events;
            }
        }

        while !busy {
            let Some(line) = pending.pop_front() else {
                break;
            };
            match parse_command(&line) {
                ConsoleCommand::Exit => break 'events,
                ConsoleCommand::Skip => {
                    write!(output, "{}", PROMPT)?;
                    output.flush()?;
                }
                ConsoleCommand::Text(text) => {
                    busy = true;
                    spawn_text_turn(orchestrator.clone(), session.clone(), text, tx.clone());
                }
                ConsoleCommand::Voice(path) => {
                    busy = true;
                    spawn_voice_turn(orchestrator.clone(), session.clone(), path, tx.clone());
                }
            }
        }

        if input_closed && !busy && pending.is_empty() {
            break;
        }
    }

    reader.abort();
    writeln!(output)?;

    if let Err(e) = orchestrator.close_session(&session).await {
        tracing::warn!(session_id = %session, error = %e, "Could not close session");
    }
    writeln!(output, "Goodbye.")?;
    output.flush()
}

async fn read_lines<R>(input: R, tx: mpsc::Sender<ConsoleEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let event = match lines.next_line().await {
            Ok(Some(line)) => ConsoleEvent::Input(line),
            Ok(None) => ConsoleEvent::InputClosed,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read input");
                ConsoleEvent::InputClosed
            }
        };
        let closed = matches!(event, ConsoleEvent::InputClosed);
        if tx.send(event).await.is_err() || closed {
            return;
        }
    }
}

fn spawn_text_turn(
    orchestrator: Arc<ConversationOrchestrator>,
    session: SessionHandle,
    text: String,
    tx: mpsc::Sender<ConsoleEvent>,
) {
    tokio::spawn(async move {
        let lines = match orchestrator
            .handle_text(Utterance::typed(text), Some(session.as_str()))
            .await
        {
            Ok(outcome) => format_reply(render(&outcome.reply)),
            Err(e) => vec![format!("Error: {}", e)],
        };
        let _ = tx.send(ConsoleEvent::TurnFinished(lines)).await;
    });
}

fn spawn_voice_turn(
    orchestrator: Arc<ConversationOrchestrator>,
    session: SessionHandle,
    path: PathBuf,
    tx: mpsc::Sender<ConsoleEvent>,
) {
    tokio::spawn(async move {
        let event = match voice_turn(&orchestrator, &session, &path).await {
            Ok(event) => event,
            Err(message) => ConsoleEvent::TurnFinished(vec![format!("Error: {}", message)]),
        };
        let _ = tx.send(event).await;
    });
}

async fn voice_turn(
    orchestrator: &ConversationOrchestrator,
    session: &SessionHandle,
    path: &Path,
) -> Result<ConsoleEvent, String> {
    if path.as_os_str().is_empty() {
        return Err(format!("usage: {} <file.wav>", VOICE_COMMAND));
    }
    let raw = tokio::fs::read(path)
        .await
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let wav = charla_audio::transcription_wav(&raw).map_err(|e| e.to_string())?;

    let transcript = orchestrator
        .transcribe(&orchestrator.audio_payload(wav))
        .await
        .map_err(|e| e.to_string())?;
    let heard = format!("You (voice): {}", transcript);
    if is_exit_command(&transcript) {
        return Ok(ConsoleEvent::ExitRequested(vec![heard]));
    }

    let outcome = orchestrator
        .handle_text(Utterance::transcribed(transcript), Some(session.as_str()))
        .await
        .map_err(|e| e.to_string())?;

    let mut lines = vec![heard];
    lines.extend(format_reply(render(&outcome.reply)));
    Ok(ConsoleEvent::TurnFinished(lines))
}
