//! Line-delimited JSON commands for driving a session over stdin/stdout.
//!
//! Each input line is one command tagged by `cmd`, e.g.
//! `{"cmd":"filter","model":{"items":[...],"logicOperator":"and"}}`.
//! Each output line is one response tagged by `type`.

use crate::model::{FilterModel, SortModel};
use crate::query::JsonRow;
use crate::session::{GridEvent, GridSession, GridState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    Filter {
        model: FilterModel,
    },
    Sort {
        #[serde(default)]
        model: SortModel,
    },
    ScrollEnd,
    ClearFilters,
    /// Preset JSON, either as a string (file contents) or inline.
    UploadPreset {
        preset: Value,
    },
    DownloadPreset,
    RowClick {
        row: JsonRow,
    },
    ValueOptions {
        field: String,
    },
    State,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// The session event this command starts, if it is a session event at all.
    pub fn into_event(self) -> Option<GridEvent> {
        match self {
            Command::Filter { model } => Some(GridEvent::Filter(model)),
            Command::Sort { model } => Some(GridEvent::Sort(model)),
            Command::ScrollEnd => Some(GridEvent::ScrollEnd),
            Command::ClearFilters => Some(GridEvent::ClearFilters),
            Command::UploadPreset { preset } => {
                let text = match preset {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Some(GridEvent::UploadPreset(text))
            }
            Command::RowClick { row } => Some(GridEvent::RowClick(row)),
            Command::DownloadPreset | Command::ValueOptions { .. } | Command::State => None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response<'a> {
    State {
        state: &'a GridState,
    },
    Preset {
        json: String,
    },
    ValueOptions {
        field: String,
        options: Option<Vec<String>>,
    },
    Error {
        message: String,
    },
}

impl Response<'_> {
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"type\":\"error\",\"message\":{}}}",
                Value::String(e.to_string())
            )
        })
    }
}

/// Apply one input line to `session`, passing each response line to `emit`.
/// Two-phase commands emit a state snapshot per phase.
pub fn handle_line<F>(session: &mut GridSession, line: &str, mut emit: F)
where
    F: FnMut(String),
{
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable command");
            emit(
                Response::Error {
                    message: format!("Invalid command: {}", e),
                }
                .to_line(),
            );
            return;
        }
    };
    tracing::debug!(?command, "command");

    match command {
        Command::DownloadPreset => emit(
            Response::Preset {
                json: session.download_preset(),
            }
            .to_line(),
        ),
        Command::ValueOptions { field } => {
            let options = session.request_value_options(&field);
            emit(Response::ValueOptions { field, options }.to_line());
            emit(Response::State { state: session.state() }.to_line());
        }
        Command::State => emit(Response::State { state: session.state() }.to_line()),
        command => {
            if let Some(event) = command.into_event() {
                session.run_event(event, |state| emit(Response::State { state }.to_line()));
            }
        }
    }
}
