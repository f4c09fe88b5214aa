use anyhow::Result;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::mpsc;
use std::time::Duration;

use crate::loader::{LoadState, TableLoader};
use crate::predictor::PredictError;
use crate::report;
use crate::value::{parse_entered_time, TimeConvention};

// Source of query lines (interactive or scripted)
pub trait QuerySource {
    /// Next line if one is ready. `Ok(None)` means nothing yet.
    fn next_line(&mut self) -> Result<Option<String>>;
    /// No more lines will ever arrive.
    fn is_exhausted(&self) -> bool;
}

/// Reads lines from stdin on a background thread.
pub struct StdinSource {
    line_rx: mpsc::Receiver<String>,
    closed: bool,
}

impl StdinSource {
    pub fn new() -> Self {
        let (line_tx, line_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break; // Session gone
                        }
                    }
                    Err(e) => {
                        log::warn!("[SESSION] Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            line_rx,
            closed: false,
        }
    }
}

impl QuerySource for StdinSource {
    fn next_line(&mut self) -> Result<Option<String>> {
        match self.line_rx.try_recv() {
            Ok(line) => Ok(Some(line)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => {
                self.closed = true;
                Ok(None)
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        self.closed
    }
}

/// A fixed list of query lines, e.g. from `--script`.
pub struct ScriptSource {
    lines: VecDeque<String>,
}

impl ScriptSource {
    pub fn new<I: IntoIterator<Item = String>>(lines: I) -> Self {
        Self {
            lines: lines.into_iter().collect(),
        }
    }
}

impl QuerySource for ScriptSource {
    fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }

    fn is_exhausted(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "Enter <distance> <time>, e.g. `100 11.4`, `30-fly 3.05` or `400 0:52.3`.\n\
Distances: 30-fly, 30-blocks, 60, 100, 150, 200, 250, 300, 400, 600.\n\
Commands: help, retry, quit";

pub struct Session<S: QuerySource, W: Write> {
    source: S,
    out: W,
    loader: TableLoader,
    convention: TimeConvention,
    json: bool,
    /// Hold queries back until the tables are in, instead of rejecting them.
    queue_while_loading: bool,
    announced_ready: bool,
    announced_failure: bool,
}

impl<S: QuerySource, W: Write> Session<S, W> {
    pub fn new(source: S, out: W, loader: TableLoader, convention: TimeConvention) -> Self {
        Self {
            source,
            out,
            loader,
            convention,
            json: false,
            queue_while_loading: false,
            announced_ready: false,
            announced_failure: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn queue_while_loading(mut self, queue: bool) -> Self {
        self.queue_while_loading = queue;
        self
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }

    /// Run until the source runs dry, `quit`, or Ctrl+C.
    pub fn run(&mut self) -> Result<()> {
        let (tx, rx) = mpsc::channel();
        ctrlc::set_handler(move || {
            let _ = tx.send(());
        })?;
        self.run_until(&rx)
    }

    pub fn run_until(&mut self, stop: &mpsc::Receiver<()>) -> Result<()> {
        loop {
            if stop.try_recv().is_ok() {
                self.status("Stopping...")?;
                break;
            }

            self.announce_load_state()?;

            if self.queue_while_loading && self.loader.is_loading() {
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }

            match self.source.next_line() {
                Ok(Some(line)) => {
                    if self.handle_line(&line)? == Flow::Quit {
                        break;
                    }
                    continue;
                }
                Ok(None) => {
                    if self.source.is_exhausted() {
                        log::debug!("[SESSION] Input exhausted");
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("[SESSION] Error reading query: {}", e);
                }
            }

            // Small sleep to avoid busy-waiting
            std::thread::sleep(Duration::from_millis(10));
        }

        self.out.flush()?;
        Ok(())
    }

    fn announce_load_state(&mut self) -> Result<()> {
        match self.loader.state() {
            LoadState::Ready(_) if !self.announced_ready => {
                self.announced_ready = true;
                self.announced_failure = false;
                self.status("Reference tables loaded.")?;
            }
            LoadState::Failed(reason) if !self.announced_failure => {
                self.announced_failure = true;
                self.status(&format!(
                    "Could not load reference tables: {}. Type `retry` to try again.",
                    reason
                ))?;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            return Ok(Flow::Continue);
        };

        match first.to_ascii_lowercase().as_str() {
            "quit" | "exit" => return Ok(Flow::Quit),
            "help" | "?" => {
                self.status(HELP)?;
                return Ok(Flow::Continue);
            }
            "retry" => {
                if self.loader.retry() {
                    self.announced_failure = false;
                    self.status("Reloading reference tables...")?;
                } else {
                    self.status("Nothing to retry.")?;
                }
                return Ok(Flow::Continue);
            }
            _ => {}
        }

        let Some(time_text) = words.next() else {
            self.reject("Please enter a distance and a time. Type `help` for usage.")?;
            return Ok(Flow::Continue);
        };

        let Some(time) = parse_entered_time(time_text) else {
            self.reject("Please enter a valid time in seconds")?;
            return Ok(Flow::Continue);
        };

        log::debug!("[SESSION] Query {} @ {:.2}s", first, time);
        self.predict_and_print(first, time)?;
        Ok(Flow::Continue)
    }

    fn predict_and_print(&mut self, distance_id: &str, time: f64) -> Result<()> {
        let result = self
            .loader
            .predictor(self.convention)
            .and_then(|p| p.predict_id(distance_id, time));

        match result {
            Ok(prediction) => {
                if self.json {
                    writeln!(
                        self.out,
                        "{}",
                        report::render_json(&prediction, self.convention.name())?
                    )?;
                } else {
                    writeln!(self.out)?;
                    write!(self.out, "{}", report::render_table(&prediction))?;
                    writeln!(self.out)?;
                }
            }
            Err(PredictError::DataNotLoaded) => {
                if let LoadState::Failed(reason) = self.loader.state() {
                    self.reject(&format!(
                        "Reference tables failed to load ({}). Type `retry` to try again.",
                        reason
                    ))?;
                } else {
                    self.reject(&PredictError::DataNotLoaded.to_string())?;
                }
            }
            Err(e) => {
                log::debug!("[SESSION] Prediction rejected: {}", e);
                self.reject(&format!("Error: {}", e))?;
            }
        }
        Ok(())
    }

    /// Session chatter. Kept off the output stream in JSON mode so every
    /// output line stays a JSON document.
    fn status(&mut self, message: &str) -> Result<()> {
        if self.json {
            log::info!("[SESSION] {}", message);
        } else {
            writeln!(self.out, "{}", message)?;
        }
        Ok(())
    }

    /// A query that produced no prediction. JSON mode reports it as `{"error": ...}`.
    fn reject(&mut self, message: &str) -> Result<()> {
        if self.json {
            writeln!(self.out, "{}", report::render_error_json(message)?)?;
        } else {
            writeln!(self.out, "{}", message)?;
        }
        Ok(())
    }
}
