//! Single-threaded application loop
//!
//! The [`Runner`] owns the demo context, its modes and the [`EventQueue`].
//! Console lines and stack events are handled one at a time in arrival
//! order, and due timers fire between messages.

use crate::cli::{execute, CommandError, CommandResult, Flow, Mode, TableError};
use crate::console::Console;
use crate::demo::{Demo, DemoConfig, DemoContext};
use crate::stack::{BluetoothStack, EventQueue, Message, Received, StackEvent};
use log::{debug, info, warn};
use std::time::Instant;

pub struct Runner<S, D> {
    ctx: DemoContext<S, D>,
    modes: Vec<Mode<DemoContext<S, D>>>,
    /// Indices into `modes`, the active one last
    active: Vec<usize>,
    queue: EventQueue,
    running: bool,
}

impl<S: BluetoothStack, D: Demo> Runner<S, D> {
    pub fn new(stack: S, console: Console, config: DemoConfig, queue: EventQueue) -> Result<Self, TableError> {
        let modes = D::modes::<S>()?;
        let mut ctx = DemoContext::new(stack, console, config);
        if let Some(root) = modes.first() {
            ctx.commands = root.command_names().to_vec();
        }

        Ok(Self {
            ctx,
            modes,
            active: vec![0],
            queue,
            running: false,
        })
    }

    /// Open the demo and show the first prompt
    pub fn start(&mut self) -> Result<(), CommandError> {
        info!("Starting {} demo", D::NAME);
        D::open(&mut self.ctx)?;
        self.running = true;
        self.prompt();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn context(&self) -> &DemoContext<S, D> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut DemoContext<S, D> {
        &mut self.ctx
    }

    pub fn active_mode(&self) -> Option<&Mode<DemoContext<S, D>>> {
        self.active.last().and_then(|index| self.modes.get(*index))
    }

    /// Run one console line through the active mode
    pub fn process_line(&mut self, line: &str) -> CommandResult {
        let Some(&index) = self.active.last() else {
            return Err(CommandError::NoCommand);
        };

        self.ctx.now = Instant::now();
        let result = execute(&mut self.ctx, &self.modes[index], line);
        match &result {
            Ok(Flow::Continue) => {}
            Ok(Flow::Enter(name)) => self.enter_mode(name),
            Ok(Flow::ExitMode) | Ok(Flow::Quit) => self.exit_mode(),
            Err(e) => self.report(e),
        }

        if self.running {
            self.prompt();
        }
        result
    }

    /// Shared security handling first, then the demo's own
    pub fn handle_event(&mut self, event: &StackEvent, now: Instant) {
        debug!("Stack event: {:?}", event);
        self.ctx.now = now;
        self.ctx.handle_security_event(event);
        D::handle_event(&mut self.ctx, event);
    }

    /// Fire every timer due at `now`
    pub fn poll_timers(&mut self, now: Instant) {
        self.ctx.expire_timers(now);
    }

    /// Handle every message already waiting, without blocking
    pub fn pump(&mut self, now: Instant) {
        while self.running {
            let Some(message) = self.queue.try_next() else {
                break;
            };
            self.dispatch(message, now);
        }
        self.poll_timers(now);
    }

    /// Open the demo if needed, then handle messages until the last mode is
    /// left or input ends
    pub fn run(&mut self) -> Result<(), CommandError> {
        if !self.running {
            self.start()?;
        }

        while self.running {
            let timeout = self
                .ctx
                .timers
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()));

            match self.queue.next(timeout) {
                Received::Message(message) => self.dispatch(message, Instant::now()),
                Received::TimedOut => {}
                Received::Closed => {
                    warn!("Every event source is gone");
                    self.shutdown();
                }
            }
            self.poll_timers(Instant::now());
        }
        Ok(())
    }

    /// Close the demo and stop the loop
    pub fn shutdown(&mut self) {
        if self.running {
            info!("Stopping {} demo", D::NAME);
            D::close(&mut self.ctx);
            self.running = false;
        }
    }

    fn dispatch(&mut self, message: Message, now: Instant) {
        match message {
            Message::Console(line) => {
                let _ = self.process_line(&line);
            }
            Message::Stack(event) => {
                self.handle_event(&event, now);
                self.prompt();
            }
            Message::Shutdown => self.shutdown(),
        }
    }

    fn enter_mode(&mut self, name: &str) {
        match self.modes.iter().position(|mode| mode.name() == name) {
            Some(index) => {
                debug!("Entering {} mode", name);
                self.active.push(index);
                self.ctx.commands = self.modes[index].command_names().to_vec();
            }
            None => warn!("No mode named {}", name),
        }
    }

    fn exit_mode(&mut self) {
        if let Some(index) = self.active.pop() {
            D::mode_exited(&mut self.ctx, self.modes[index].name());
        }

        match self.active.last() {
            Some(&index) => self.ctx.commands = self.modes[index].command_names().to_vec(),
            None => self.shutdown(),
        }
    }

    fn report(&mut self, error: &CommandError) {
        debug!("Command failed with {}: {}", error.code(), error);
        let console = &mut self.ctx.console;
        match error {
            CommandError::NoCommand | CommandError::InvalidParameters => {}
            CommandError::InvalidCommand(name) => {
                console.line(format_args!("Invalid Command: {}", name));
            }
            CommandError::TooManyParameters(_) => console.line("Too many parameters."),
            CommandError::Function(_) | CommandError::Stack(_) => console.line("Function Error."),
            CommandError::InvalidStackId => console.line("Stack is not open."),
            CommandError::UnableToInitializeStack(_) | CommandError::UnableToRegisterServer(_) => {
                console.line(format_args!("Command Error: {}.", error.code()));
            }
        }
    }

    fn prompt(&mut self) {
        if let Some(mode) = self.active_mode() {
            let prompt = mode.prompt();
            self.ctx.console.prompt(prompt);
        }
    }
}
