//! Operator triggers: one input token per capture, a designated token to quit

use std::io::{self, BufRead, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use flume::{Receiver, Sender};
use tracing::{debug, info, warn};

/// Blocking source of single input tokens.
pub trait TriggerSource: Send {
    /// Wait for the next token. `None` means input is closed.
    fn next_token(&mut self) -> io::Result<Option<char>>;
}

/// What the controller should do with a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Capture(char),
    Quit,
}

impl Trigger {
    pub fn classify(token: char, quit_key: char) -> Self {
        if token == quit_key {
            Trigger::Quit
        } else {
            Trigger::Capture(token)
        }
    }
}

/// Process-wide quit flag
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Restores the previous terminal mode when dropped.
///
/// Log output stays readable in raw mode through `utils::CrlfWriter`.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Single key presses from an interactive terminal
pub struct RawKeySource {
    quit_key: char,
}

impl RawKeySource {
    pub fn new(quit_key: char) -> Self {
        Self { quit_key }
    }
}

impl TriggerSource for RawKeySource {
    fn next_token(&mut self) -> io::Result<Option<char>> {
        let _raw = RawModeGuard::enable()?;

        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            let token = match key.code {
                // Raw mode swallows SIGINT
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => self.quit_key,
                KeyCode::Char(c) => c,
                KeyCode::Enter => '\n',
                _ => ' ',
            };
            return Ok(Some(token));
        }
    }
}

/// Line-buffered tokens, one per line, for non-interactive input
pub struct LineSource<R> {
    reader: R,
}

impl<R: BufRead + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + Send> TriggerSource for LineSource<R> {
    fn next_token(&mut self) -> io::Result<Option<char>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).chars().next().unwrap_or('\n')))
    }
}

/// Raw key presses when stdin is a terminal, lines otherwise.
pub fn stdin_source(quit_key: char) -> Box<dyn TriggerSource> {
    if io::stdin().is_terminal() {
        debug!("Reading triggers from the terminal");
        Box::new(RawKeySource::new(quit_key))
    } else {
        debug!("Reading triggers line by line from stdin");
        Box::new(LineSource::new(io::BufReader::new(io::stdin())))
    }
}

/// Run `source` on its own thread and forward classified triggers.
///
/// On the quit token the shutdown signal is raised before `on_quit` runs, so
/// an in-flight capture sees it even if `on_quit` does not end the process.
/// Closed input counts as quitting.
pub fn spawn_listener<F>(
    mut source: Box<dyn TriggerSource>,
    quit_key: char,
    shutdown: ShutdownSignal,
    on_quit: F,
) -> io::Result<(Receiver<Trigger>, JoinHandle<()>)>
where
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = flume::unbounded();
    let handle = thread::Builder::new()
        .name("trigger-listener".into())
        .spawn(move || listen(source.as_mut(), quit_key, &tx, &shutdown, on_quit))?;
    Ok((rx, handle))
}

fn listen<F: FnOnce()>(
    source: &mut dyn TriggerSource,
    quit_key: char,
    tx: &Sender<Trigger>,
    shutdown: &ShutdownSignal,
    on_quit: F,
) {
    info!(
        "Press any key to capture a frame, or press '{}' to quit...",
        quit_key
    );

    loop {
        let trigger = match source.next_token() {
            Ok(Some(token)) => Trigger::classify(token, quit_key),
            Ok(None) => {
                debug!("Trigger input closed");
                Trigger::Quit
            }
            Err(e) => {
                warn!("Failed to read trigger: {}", e);
                Trigger::Quit
            }
        };

        if trigger == Trigger::Quit {
            info!("Quit signal received. Exiting...");
            shutdown.request();
            let _ = tx.send(Trigger::Quit);
            on_quit();
            return;
        }

        if tx.send(trigger).is_err() {
            return;
        }
    }
}
