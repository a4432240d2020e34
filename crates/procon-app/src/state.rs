// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMode {
    Nav,
    Edit,
    Picker,
    Search,
}

impl ConsoleMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Nav => "NAV",
            Self::Edit => "EDIT",
            Self::Picker => "PICK",
            Self::Search => "SEARCH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleState {
    pub mode: ConsoleMode,
    pub show_errors: bool,
    pub status_line: Option<String>,
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self {
            mode: ConsoleMode::Nav,
            show_errors: false,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    EnterEditMode,
    OpenPicker,
    OpenSearch,
    ExitToNav,
    ToggleErrors,
    Notify(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    ModeChanged(ConsoleMode),
    ErrorsVisibilityChanged(bool),
    StatusUpdated(String),
    StatusCleared,
}

impl ConsoleState {
    pub fn dispatch(&mut self, command: ConsoleCommand) -> Vec<ConsoleEvent> {
        match command {
            ConsoleCommand::EnterEditMode => self.switch_mode(ConsoleMode::Edit),
            ConsoleCommand::OpenPicker => {
                let mut events = self.switch_mode(ConsoleMode::Picker);
                events.push(self.set_status("picker open"));
                events
            }
            ConsoleCommand::OpenSearch => self.switch_mode(ConsoleMode::Search),
            ConsoleCommand::ExitToNav => {
                let mut events = self.switch_mode(ConsoleMode::Nav);
                events.push(self.set_status("nav"));
                events
            }
            ConsoleCommand::ToggleErrors => {
                self.show_errors = !self.show_errors;
                vec![ConsoleEvent::ErrorsVisibilityChanged(self.show_errors)]
            }
            ConsoleCommand::Notify(message) => vec![self.set_status(&message)],
            ConsoleCommand::ClearStatus => {
                self.status_line = None;
                vec![ConsoleEvent::StatusCleared]
            }
        }
    }

    fn switch_mode(&mut self, mode: ConsoleMode) -> Vec<ConsoleEvent> {
        if self.mode == mode {
            return Vec::new();
        }
        self.mode = mode;
        vec![ConsoleEvent::ModeChanged(mode)]
    }

    fn set_status(&mut self, message: &str) -> ConsoleEvent {
        self.status_line = Some(message.to_owned());
        ConsoleEvent::StatusUpdated(message.to_owned())
    }
}
