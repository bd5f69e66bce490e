use pipeline_monitor::{Role, StreamController};
use pipeline_protocol::Scenario;

use crate::commands::{parse_slash_command, SlashCommand};
use crate::render;

pub const HELP_TEXT: &str = "\
Commands:
  /scenarios     list demo scenarios
  /run <n>       send scenario n's prompt
  /health        query backend health
  /status        connection, session and cycle state
  /log           step events of the current request
  /reset         clear the conversation and start a new session
  /quit          exit
Anything else is sent to the agent.";

/// What the caller should do with one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    Nothing,
    Print(String),
    Send(String),
    Reset,
    Scenarios,
    Health,
    Status,
    Log,
    Quit,
}

/// Tracks what has already been printed so each controller change is shown
/// once.
#[derive(Debug, Default)]
pub struct ConsoleApp {
    scenarios: Vec<Scenario>,
    connected: Option<bool>,
    events_shown: usize,
    messages_shown: usize,
}

impl ConsoleApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_input(&mut self, line: &str) -> ConsoleAction {
        let text = line.trim();
        if text.is_empty() {
            return ConsoleAction::Nothing;
        }

        let Some(command) = parse_slash_command(text) else {
            return ConsoleAction::Send(text.to_string());
        };
        match command {
            SlashCommand::Help => ConsoleAction::Print(HELP_TEXT.to_string()),
            SlashCommand::Reset => ConsoleAction::Reset,
            SlashCommand::Scenarios => ConsoleAction::Scenarios,
            SlashCommand::Run(Some(index)) => match self.scenario_prompt(index) {
                Some(prompt) => ConsoleAction::Send(prompt.to_string()),
                None if self.scenarios.is_empty() => ConsoleAction::Print(
                    "No scenarios loaded yet; run /scenarios first.".to_string(),
                ),
                None => ConsoleAction::Print(format!(
                    "No scenario {index}; choose 1-{}.",
                    self.scenarios.len()
                )),
            },
            SlashCommand::Run(None) => ConsoleAction::Print("Usage: /run <n>".to_string()),
            SlashCommand::Health => ConsoleAction::Health,
            SlashCommand::Status => ConsoleAction::Status,
            SlashCommand::Log => ConsoleAction::Log,
            SlashCommand::Quit => ConsoleAction::Quit,
            SlashCommand::Unknown(name) => {
                ConsoleAction::Print(format!("Unknown command {name}; try /help."))
            }
        }
    }

    pub fn set_scenarios(&mut self, scenarios: Vec<Scenario>) {
        self.scenarios = scenarios;
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Prompt of the one-based scenario `index`.
    pub fn scenario_prompt(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|index| self.scenarios.get(index))
            .map(|scenario| scenario.prompt.as_str())
    }

    /// A new cycle replaced the event log.
    pub fn on_submitted(&mut self) {
        self.events_shown = 0;
    }

    pub fn on_reset(&mut self) {
        self.events_shown = 0;
        self.messages_shown = 0;
    }

    /// Lines describing what changed in `controller` since the last call.
    pub fn drain_updates(&mut self, controller: &StreamController) -> Vec<String> {
        let mut lines = Vec::new();

        let connected = controller.is_connected();
        if self.connected != Some(connected) {
            self.connected = Some(connected);
            lines.push(render::connection(connected));
        }

        let events = controller.aggregator().events();
        if events.len() < self.events_shown {
            self.events_shown = 0;
        }
        for event in &events[self.events_shown..] {
            lines.push(render::activity_line(event));
        }
        self.events_shown = events.len();

        let transcript = controller.transcript();
        if transcript.len() < self.messages_shown {
            self.messages_shown = 0;
        }
        for message in &transcript[self.messages_shown..] {
            // The user already sees what they typed.
            if message.role == Role::User {
                continue;
            }
            if !controller.aggregator().is_empty() {
                lines.push(render::pipeline(controller.view()));
            }
            if let Some(panel) = controller.validation() {
                lines.push(render::validation(&panel));
            }
            lines.push(render::message(message));
        }
        self.messages_shown = transcript.len();

        lines
    }
}
