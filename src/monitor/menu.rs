//! Status menu as data. Drawing it is up to the presenter.

use serde::Serialize;

use super::MonitorMessage;
use crate::commands::SupervisorCommand;
use crate::process::ProcessSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MenuAction {
    Refresh,
    AddProcess,
    ShowLogs,
    Preferences,
    Quit,
    Process {
        command: SupervisorCommand,
        name: String,
    },
}

impl MenuAction {
    /// Message for actions that need no further input from the user
    pub fn into_message(self) -> Option<MonitorMessage> {
        match self {
            MenuAction::Refresh => Some(MonitorMessage::Refresh),
            MenuAction::ShowLogs => Some(MonitorMessage::Run {
                command: SupervisorCommand::Logs,
                target: None,
            }),
            MenuAction::Process { command, name } => Some(MonitorMessage::Run {
                command,
                target: Some(name),
            }),
            MenuAction::Quit => Some(MonitorMessage::Shutdown),
            // Both need a text field first
            MenuAction::AddProcess | MenuAction::Preferences => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MenuEntry {
    /// `action: None` renders disabled
    Item {
        title: String,
        shortcut: Option<char>,
        action: Option<MenuAction>,
    },
    Submenu {
        title: String,
        items: Vec<MenuEntry>,
    },
    Separator,
}

fn item(title: &str, shortcut: Option<char>, action: MenuAction) -> MenuEntry {
    MenuEntry::Item {
        title: title.to_string(),
        shortcut,
        action: Some(action),
    }
}

const PROCESS_ACTIONS: [(&str, SupervisorCommand); 5] = [
    ("Start", SupervisorCommand::Start),
    ("Stop", SupervisorCommand::Stop),
    ("Restart", SupervisorCommand::Restart),
    ("Show Info", SupervisorCommand::Info),
    ("Delete", SupervisorCommand::Delete),
];

pub fn build(snapshot: &ProcessSnapshot) -> Vec<MenuEntry> {
    let mut entries = vec![
        item("Refresh", Some('r'), MenuAction::Refresh),
        item("Add Process…", Some('n'), MenuAction::AddProcess),
        item("Show Logs…", Some('l'), MenuAction::ShowLogs),
        item("Preferences…", Some(','), MenuAction::Preferences),
        MenuEntry::Separator,
    ];

    if snapshot.is_empty() {
        entries.push(MenuEntry::Item {
            title: "No PM2 processes found".to_string(),
            shortcut: None,
            action: None,
        });
    } else {
        for record in snapshot.records() {
            let items = PROCESS_ACTIONS
                .iter()
                .map(|(title, command)| {
                    item(
                        title,
                        None,
                        MenuAction::Process {
                            command: *command,
                            name: record.name.clone(),
                        },
                    )
                })
                .collect();
            entries.push(MenuEntry::Submenu {
                title: record.title(),
                items,
            });
        }
    }

    entries.push(MenuEntry::Separator);
    entries.push(item("Quit", Some('q'), MenuAction::Quit));
    entries
}
