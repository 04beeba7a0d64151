//! Admin text commands
//!
//! Line-oriented server administration, sent as plain text rather than
//! binary frames.

use std::str::FromStr;

use bytes::Bytes;

use crate::error::GearmanError;

/// Server administration commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    Status,
    Version,
    Workers,
    MaxQueue,
    Shutdown,
}

impl AdminCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            AdminCommand::Status => "status",
            AdminCommand::Version => "version",
            AdminCommand::Workers => "workers",
            AdminCommand::MaxQueue => "maxqueue",
            AdminCommand::Shutdown => "shutdown",
        }
    }

    /// Whether the server answers with a `.`-terminated listing
    pub fn is_multiline(self) -> bool {
        matches!(self, AdminCommand::Status | AdminCommand::Workers)
    }
}

impl FromStr for AdminCommand {
    type Err = GearmanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "status" => Ok(AdminCommand::Status),
            "version" => Ok(AdminCommand::Version),
            "workers" => Ok(AdminCommand::Workers),
            "maxqueue" => Ok(AdminCommand::MaxQueue),
            "shutdown" => Ok(AdminCommand::Shutdown),
            other => Err(GearmanError::Config(format!(
                "unknown admin command: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pack an admin command line
pub fn pack_admin(command: AdminCommand) -> Bytes {
    Bytes::from(format!("{}\n", command.as_str()))
}
