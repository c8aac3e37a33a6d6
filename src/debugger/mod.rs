use std::collections::BTreeSet;
use std::io;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::asm::dump::{self, Line};
use crate::config::VmConfig;
use crate::vm::{ControlFlow, SharedOutput, VM, VmError, Word};

/// Where the debugged program is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Ready,
    Halted,
    Faulted(String),
}

/// Debugger state.
pub struct Debugger {
    words: Vec<Word>,
    listing: Vec<Line>,
    config: VmConfig,
    vm: VM,
    output: SharedOutput,
    state: State,
    /// Breakpoints by address
    breakpoints: BTreeSet<usize>,
    /// Instructions executed since the last restart
    steps: u64,
    running: bool,
    /// Command input buffer
    input: String,
    /// Status message
    status: String,
}

impl Debugger {
    /// Create a debugger for a decoded program.
    pub fn new(words: Vec<Word>, config: VmConfig) -> Result<Self, VmError> {
        let output = SharedOutput::new();
        let mut vm = VM::new_with_config(config, Box::new(output.clone()))?;
        vm.load_program(&words)?;
        let listing = dump::disassemble(&words);

        Ok(Self {
            words,
            listing,
            config,
            vm,
            output,
            state: State::Ready,
            breakpoints: BTreeSet::new(),
            steps: 0,
            running: true,
            input: String::new(),
            status: "Ready. Type 'h' for help.".to_string(),
        })
    }

    /// Throw away all execution state and start from address 0.
    fn restart(&mut self) -> Result<(), VmError> {
        self.output.clear();
        self.vm = VM::new_with_config(self.config, Box::new(self.output.clone()))?;
        self.vm.load_program(&self.words)?;
        self.state = State::Ready;
        self.steps = 0;
        self.status = "Restarted.".to_string();
        Ok(())
    }

    /// Execute one instruction.
    fn step(&mut self) {
        match &self.state {
            State::Ready => {}
            State::Halted => {
                self.status = "Program has halted. 'r' to restart.".to_string();
                return;
            }
            State::Faulted(e) => {
                self.status = format!("Program faulted: {}. 'r' to restart.", e);
                return;
            }
        }

        match self.vm.step() {
            Ok(ControlFlow::Continue) => {
                self.steps += 1;
                self.status = format!("PC: {}, Stack size: {}", self.vm.pc(), self.vm.stack().len());
            }
            Ok(ControlFlow::Halt) => {
                self.steps += 1;
                self.state = State::Halted;
                self.status = format!("Halted after {} steps.", self.steps);
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.state = State::Faulted(e.to_string());
            }
        }
    }

    /// Continue execution until a breakpoint, HALT or an error.
    ///
    /// Always executes at least one instruction, so continuing from a
    /// breakpoint moves past it.
    fn continue_exec(&mut self) {
        self.step();
        while self.state == State::Ready {
            if self.breakpoints.contains(&self.vm.pc()) {
                self.status = format!("Breakpoint hit at {}", self.vm.pc());
                return;
            }
            self.step();
        }
    }

    /// Process a command.
    fn process_command(&mut self, cmd: &str) {
        let parts: Vec<&str> = cmd.split_whitespace().collect();
        if parts.is_empty() {
            return;
        }

        match parts[0] {
            "s" | "step" => self.step(),
            "c" | "continue" => self.continue_exec(),
            "b" => match parts.get(1).and_then(|a| a.parse::<usize>().ok()) {
                Some(addr) if addr < self.words.len() => {
                    self.breakpoints.insert(addr);
                    self.status = format!("Breakpoint set at {}", addr);
                }
                Some(addr) => self.status = format!("Address {} is outside the program", addr),
                None => self.status = "Usage: b <addr>".to_string(),
            },
            "d" => match parts.get(1).and_then(|a| a.parse::<usize>().ok()) {
                Some(addr) => {
                    self.breakpoints.remove(&addr);
                    self.status = format!("Breakpoint deleted at {}", addr);
                }
                None => self.status = "Usage: d <addr>".to_string(),
            },
            "bl" => {
                let bps: Vec<String> = self.breakpoints.iter().map(|a| a.to_string()).collect();
                self.status = format!("Breakpoints: {}", bps.join(", "));
            }
            "r" | "restart" => {
                if let Err(e) = self.restart() {
                    self.status = format!("Restart failed: {}", e);
                }
            }
            "q" | "quit" => {
                self.running = false;
            }
            "h" | "help" => {
                self.status =
                    "Commands: s(tep) c(ontinue) b <addr> d <addr> bl r(estart) q(uit)".to_string();
            }
            _ => {
                self.status = format!("Unknown command: {}", parts[0]);
            }
        }
    }

    /// Run the debugger TUI.
    ///
    /// The terminal is restored however the event loop ends.
    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let guard = TerminalGuard;
        io::stdout().execute(EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        let result = self.event_loop(&mut terminal);

        drop(guard);
        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.running {
            terminal.draw(|frame| self.ui(frame))?;

            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code);
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Enter => {
                let cmd = std::mem::take(&mut self.input);
                self.process_command(&cmd);
            }
            KeyCode::Char(c) => {
                self.input.push(c);
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Esc => {
                self.running = false;
            }
            _ => {}
        }
    }

    fn ui(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(10),   // Code
                Constraint::Length(5), // Output
                Constraint::Length(3), // Status
                Constraint::Length(3), // Input
            ])
            .split(frame.area());

        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(60),
                Constraint::Percentage(20),
                Constraint::Percentage(20),
            ])
            .split(chunks[0]);

        // Code view
        let pc = self.vm.pc();
        let current = self.listing.iter().position(|line| line.covers(pc));
        let code_items: Vec<ListItem> = self
            .listing
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let prefix = if self.breakpoints.contains(&line.addr) {
                    "●"
                } else {
                    " "
                };
                let marker = if Some(i) == current { "▶" } else { " " };
                let content = format!("{}{}{:04} │ {}", prefix, marker, line.addr, line.text());
                let style = if Some(i) == current {
                    Style::default().bg(Color::DarkGray)
                } else {
                    Style::default()
                };
                ListItem::new(content).style(style)
            })
            .collect();
        let mut code_state = ListState::default().with_selected(current);
        let code = List::new(code_items).block(Block::default().title("Code").borders(Borders::ALL));
        frame.render_stateful_widget(code, top[0], &mut code_state);

        frame.render_widget(stack_view("Stack", self.vm.stack().as_slice()), top[1]);
        frame.render_widget(
            stack_view("Return", self.vm.return_stack().as_slice()),
            top[2],
        );

        // Output
        let output = Paragraph::new(self.output.to_string_lossy())
            .block(Block::default().title("Output").borders(Borders::ALL));
        frame.render_widget(output, chunks[1]);

        // Status
        let state = match &self.state {
            State::Ready => "ready",
            State::Halted => "halted",
            State::Faulted(_) => "faulted",
        };
        let status = Paragraph::new(self.status.clone()).block(
            Block::default()
                .title(format!("Status [{}, {} steps]", state, self.steps))
                .borders(Borders::ALL),
        );
        frame.render_widget(status, chunks[2]);

        // Input
        let input = Paragraph::new(format!("(debug) {}", self.input))
            .block(Block::default().title("Command").borders(Borders::ALL));
        frame.render_widget(input, chunks[3]);
    }
}

/// Leaves the alternate screen and raw mode when dropped.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = io::stdout().execute(LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Top of stack first.
fn stack_view<'a>(title: &'a str, items: &[Word]) -> Paragraph<'a> {
    let text: Vec<String> = items.iter().rev().map(|w| w.to_string()).collect();
    Paragraph::new(text.join("\n")).block(Block::default().title(title).borders(Borders::ALL))
}

/// Run the debugger on a decoded program.
pub fn run_debugger(words: Vec<Word>, config: VmConfig) -> Result<(), String> {
    let mut debugger = Debugger::new(words, config).map_err(|e| e.to_string())?;
    debugger.run().map_err(|e| e.to_string())
}
