use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use delta_merge_drc::server::handlers::apply_check_result;
use delta_merge_drc::server::{error_codes, handle_line, Response, ServerEvent, ServerState};

/// Serialize one outgoing message as a single line
fn write_message<T: serde::Serialize>(out: &mut impl Write, message: &T) -> io::Result<()> {
    let line = match serde_json::to_string(message) {
        Ok(line) => line,
        Err(e) => {
            let fallback = Response::error(
                None,
                error_codes::INTERNAL_ERROR,
                format!("Failed to serialize response: {}", e),
            );
            serde_json::to_string(&fallback).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
        }
    };
    writeln!(out, "{}", line)?;
    out.flush()
}

/// Forward stdin lines into the event channel until input ends
fn spawn_stdin_reader(tx: Sender<ServerEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if tx.send(ServerEvent::Line(l)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    log::error!("[Server] Error reading stdin: {}", e);
                    break;
                }
            }
        }
        let _ = tx.send(ServerEvent::InputClosed);
    });
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("[Server] Starting min-area check server...");

    let mut state = ServerState::new();
    let mut stdout = io::stdout();

    // Stdin lines and background check results share one channel
    let (tx, rx): (Sender<ServerEvent>, Receiver<ServerEvent>) = mpsc::channel();
    spawn_stdin_reader(tx.clone());

    while let Ok(event) = rx.recv() {
        let written = match event {
            ServerEvent::Line(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let response = handle_line(&mut state, &line, &tx);
                write_message(&mut stdout, &response)
            }
            ServerEvent::CheckComplete(result) => {
                let notification = apply_check_result(&mut state, result);
                write_message(&mut stdout, &notification)
            }
            ServerEvent::InputClosed => break,
        };
        if let Err(e) = written {
            log::error!("[Server] Failed to write to stdout: {}", e);
            break;
        }
    }

    state.cancel_check();
    log::info!("[Server] Shutting down");
}
