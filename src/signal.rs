// Interactive signal source - non-blocking poll for pending user input.
// The pipeline loops check this at item boundaries only; a long-running
// download or HTTP call is never interrupted mid-flight.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Media format choice for the download stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Audio,
    Video,
}

/// A pending user signal, mapped from a keypress-equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Abort the current loop; entries already on disk are kept.
    Restart,
    /// Terminate the whole run.
    Quit,
    /// Switch the download format for the remaining items.
    FormatChoice(MediaFormat),
    /// Toggle track numbering for the remaining items.
    NumberingChoice(bool),
}

pub trait SignalSource {
    /// Return the pending signal, if any. Must never block.
    fn poll(&mut self) -> Option<Signal>;
}

/// Signal source that never fires. Used for unattended runs and tests.
#[derive(Default)]
pub struct NullSignals;

impl SignalSource for NullSignals {
    fn poll(&mut self) -> Option<Signal> {
        None
    }
}

/// Reads single-letter commands from stdin on a background thread:
/// r = restart, q = quit, a/v = audio/video, n/u = numbered/unnumbered.
pub struct StdinSignals {
    rx: Receiver<Signal>,
}

impl StdinSignals {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let Some(signal) = parse_command(line.trim()) else {
                    continue;
                };
                if tx.send(signal).is_err() {
                    break;
                }
            }
        });
        Self { rx }
    }
}

impl SignalSource for StdinSignals {
    fn poll(&mut self) -> Option<Signal> {
        match self.rx.try_recv() {
            Ok(signal) => Some(signal),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

fn parse_command(input: &str) -> Option<Signal> {
    match input {
        "r" => Some(Signal::Restart),
        "q" => Some(Signal::Quit),
        "a" => Some(Signal::FormatChoice(MediaFormat::Audio)),
        "v" => Some(Signal::FormatChoice(MediaFormat::Video)),
        "n" => Some(Signal::NumberingChoice(true)),
        "u" => Some(Signal::NumberingChoice(false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_mapping() {
        assert_eq!(parse_command("r"), Some(Signal::Restart));
        assert_eq!(parse_command("q"), Some(Signal::Quit));
        assert_eq!(parse_command("a"), Some(Signal::FormatChoice(MediaFormat::Audio)));
        assert_eq!(parse_command("v"), Some(Signal::FormatChoice(MediaFormat::Video)));
        assert_eq!(parse_command("n"), Some(Signal::NumberingChoice(true)));
        assert_eq!(parse_command("x"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn null_source_never_fires() {
        let mut signals = NullSignals;
        assert_eq!(signals.poll(), None);
    }
}
