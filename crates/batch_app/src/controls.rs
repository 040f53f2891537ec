//! Pause/resume/stop typed on stdin while the batch runs.

use std::io::{self, BufRead};
use std::thread;

use batch_engine::BatchController;
use batch_logging::{batch_debug, batch_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlCommand {
    Pause,
    Resume,
    Stop,
}

fn parse_command(line: &str) -> Option<ControlCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" => Some(ControlCommand::Pause),
        "r" | "resume" => Some(ControlCommand::Resume),
        "s" | "stop" | "q" | "quit" => Some(ControlCommand::Stop),
        _ => None,
    }
}

/// Reads commands until stdin closes or the batch reaches a terminal state.
pub(crate) fn spawn_stdin_controls(controller: BatchController, announce: bool) {
    if announce {
        eprintln!("Commands: p = pause, r = resume, s or q = stop (then Enter)");
    }
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_command(&line) {
                Some(ControlCommand::Pause) => {
                    controller.pause();
                    eprintln!("Pausing after the current item...");
                }
                Some(ControlCommand::Resume) => {
                    controller.resume();
                    eprintln!("Resuming.");
                }
                Some(ControlCommand::Stop) => {
                    controller.stop();
                    eprintln!("Stopping; no further items will start.");
                }
                None if line.trim().is_empty() => {}
                None => batch_warn!("Unknown command {:?}", line.trim()),
            }
            if controller.state().is_terminal() {
                break;
            }
        }
        batch_debug!("Stdin control reader finished");
    });
}
