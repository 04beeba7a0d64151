//! Command definitions
//!
//! Command type numbering and the per-command field layout.

use crate::client::Priority;
use crate::error::GearmanError;

/// Command types, numbered as published by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandType {
    CanDo = 1,
    CantDo = 2,
    ResetAbilities = 3,
    PreSleep = 4,
    Noop = 6,
    SubmitJob = 7,
    JobCreated = 8,
    GrabJob = 9,
    NoJob = 10,
    JobAssign = 11,
    WorkStatus = 12,
    WorkComplete = 13,
    WorkFail = 14,
    GetStatus = 15,
    EchoReq = 16,
    EchoRes = 17,
    SubmitJobBg = 18,
    Error = 19,
    StatusRes = 20,
    SubmitJobHigh = 21,
    SetClientId = 22,
    CanDoTimeout = 23,
    AllYours = 24,
    WorkException = 25,
    OptionReq = 26,
    OptionRes = 27,
    WorkData = 28,
    WorkWarning = 29,
    GrabJobUniq = 30,
    JobAssignUniq = 31,
    SubmitJobHighBg = 32,
    SubmitJobLow = 33,
    SubmitJobLowBg = 34,
}

impl CommandType {
    /// Every command type, in numeric order
    pub const ALL: [CommandType; 33] = [
        CommandType::CanDo,
        CommandType::CantDo,
        CommandType::ResetAbilities,
        CommandType::PreSleep,
        CommandType::Noop,
        CommandType::SubmitJob,
        CommandType::JobCreated,
        CommandType::GrabJob,
        CommandType::NoJob,
        CommandType::JobAssign,
        CommandType::WorkStatus,
        CommandType::WorkComplete,
        CommandType::WorkFail,
        CommandType::GetStatus,
        CommandType::EchoReq,
        CommandType::EchoRes,
        CommandType::SubmitJobBg,
        CommandType::Error,
        CommandType::StatusRes,
        CommandType::SubmitJobHigh,
        CommandType::SetClientId,
        CommandType::CanDoTimeout,
        CommandType::AllYours,
        CommandType::WorkException,
        CommandType::OptionReq,
        CommandType::OptionRes,
        CommandType::WorkData,
        CommandType::WorkWarning,
        CommandType::GrabJobUniq,
        CommandType::JobAssignUniq,
        CommandType::SubmitJobHighBg,
        CommandType::SubmitJobLow,
        CommandType::SubmitJobLowBg,
    ];

    /// Wire code of this command
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Protocol name of this command
    pub fn name(self) -> &'static str {
        match self {
            CommandType::CanDo => "CAN_DO",
            CommandType::CantDo => "CANT_DO",
            CommandType::ResetAbilities => "RESET_ABILITIES",
            CommandType::PreSleep => "PRE_SLEEP",
            CommandType::Noop => "NOOP",
            CommandType::SubmitJob => "SUBMIT_JOB",
            CommandType::JobCreated => "JOB_CREATED",
            CommandType::GrabJob => "GRAB_JOB",
            CommandType::NoJob => "NO_JOB",
            CommandType::JobAssign => "JOB_ASSIGN",
            CommandType::WorkStatus => "WORK_STATUS",
            CommandType::WorkComplete => "WORK_COMPLETE",
            CommandType::WorkFail => "WORK_FAIL",
            CommandType::GetStatus => "GET_STATUS",
            CommandType::EchoReq => "ECHO_REQ",
            CommandType::EchoRes => "ECHO_RES",
            CommandType::SubmitJobBg => "SUBMIT_JOB_BG",
            CommandType::Error => "ERROR",
            CommandType::StatusRes => "STATUS_RES",
            CommandType::SubmitJobHigh => "SUBMIT_JOB_HIGH",
            CommandType::SetClientId => "SET_CLIENT_ID",
            CommandType::CanDoTimeout => "CAN_DO_TIMEOUT",
            CommandType::AllYours => "ALL_YOURS",
            CommandType::WorkException => "WORK_EXCEPTION",
            CommandType::OptionReq => "OPTION_REQ",
            CommandType::OptionRes => "OPTION_RES",
            CommandType::WorkData => "WORK_DATA",
            CommandType::WorkWarning => "WORK_WARNING",
            CommandType::GrabJobUniq => "GRAB_JOB_UNIQ",
            CommandType::JobAssignUniq => "JOB_ASSIGN_UNIQ",
            CommandType::SubmitJobHighBg => "SUBMIT_JOB_HIGH_BG",
            CommandType::SubmitJobLow => "SUBMIT_JOB_LOW",
            CommandType::SubmitJobLowBg => "SUBMIT_JOB_LOW_BG",
        }
    }

    /// Pick the submit variant for a priority / background combination
    pub fn submit_for(priority: Priority, background: bool) -> CommandType {
        match (priority, background) {
            (Priority::Normal, false) => CommandType::SubmitJob,
            (Priority::Normal, true) => CommandType::SubmitJobBg,
            (Priority::High, false) => CommandType::SubmitJobHigh,
            (Priority::High, true) => CommandType::SubmitJobHighBg,
            (Priority::Low, false) => CommandType::SubmitJobLow,
            (Priority::Low, true) => CommandType::SubmitJobLowBg,
        }
    }
}

impl TryFrom<u32> for CommandType {
    type Error = GearmanError;

    fn try_from(code: u32) -> Result<Self, GearmanError> {
        CommandType::ALL
            .iter()
            .copied()
            .find(|command| command.code() == code)
            .ok_or(GearmanError::UnknownCommand(code))
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Command Table
// =============================================================================

/// Field layout of a single command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Wire code
    pub code: u32,

    /// Ordered field names; the last one takes the unsplit remainder
    pub fields: &'static [&'static str],
}

impl CommandSpec {
    pub const fn new(code: u32, fields: &'static [&'static str]) -> Self {
        Self { code, fields }
    }
}

/// Immutable mapping from command code to its ordered field names
///
/// Both `pack` and `parse` consult the same table. The standard numbering is
/// [`CommandTable::GEARMAN`]; a different table can be injected into a
/// [`Codec`](super::Codec) to speak another revision of the protocol.
#[derive(Debug, Clone, Copy)]
pub struct CommandTable {
    specs: &'static [CommandSpec],
}

const SUBMIT_FIELDS: &[&str] = &["func", "unique", "data"];
const HANDLE_DATA_FIELDS: &[&str] = &["handle", "data"];

const GEARMAN_SPECS: &[CommandSpec] = &[
    CommandSpec::new(1, &["func"]),
    CommandSpec::new(2, &["func"]),
    CommandSpec::new(3, &[]),
    CommandSpec::new(4, &[]),
    CommandSpec::new(6, &[]),
    CommandSpec::new(7, SUBMIT_FIELDS),
    CommandSpec::new(8, &["handle"]),
    CommandSpec::new(9, &[]),
    CommandSpec::new(10, &[]),
    CommandSpec::new(11, &["handle", "func", "data"]),
    CommandSpec::new(12, &["handle", "numerator", "denominator"]),
    CommandSpec::new(13, HANDLE_DATA_FIELDS),
    CommandSpec::new(14, &["handle"]),
    CommandSpec::new(15, &["handle"]),
    CommandSpec::new(16, &["text"]),
    CommandSpec::new(17, &["text"]),
    CommandSpec::new(18, SUBMIT_FIELDS),
    CommandSpec::new(19, &["err_code", "err_text"]),
    CommandSpec::new(20, &["handle", "known", "running", "numerator", "denominator"]),
    CommandSpec::new(21, SUBMIT_FIELDS),
    CommandSpec::new(22, &["client_id"]),
    CommandSpec::new(23, &["func", "timeout"]),
    CommandSpec::new(24, &[]),
    CommandSpec::new(25, HANDLE_DATA_FIELDS),
    CommandSpec::new(26, &["option_name"]),
    CommandSpec::new(27, &["option_name"]),
    CommandSpec::new(28, HANDLE_DATA_FIELDS),
    CommandSpec::new(29, HANDLE_DATA_FIELDS),
    CommandSpec::new(30, &[]),
    CommandSpec::new(31, &["handle", "func", "unique", "data"]),
    CommandSpec::new(32, SUBMIT_FIELDS),
    CommandSpec::new(33, SUBMIT_FIELDS),
    CommandSpec::new(34, SUBMIT_FIELDS),
];

impl CommandTable {
    /// The published command table
    pub const GEARMAN: CommandTable = CommandTable::new(GEARMAN_SPECS);

    /// Build a table over a static list of command specs
    pub const fn new(specs: &'static [CommandSpec]) -> Self {
        Self { specs }
    }

    /// Field names for a command code
    pub fn fields(&self, code: u32) -> Option<&'static [&'static str]> {
        self.specs
            .iter()
            .find(|spec| spec.code == code)
            .map(|spec| spec.fields)
    }

    /// Check whether a code is known to this table
    pub fn contains(&self, code: u32) -> bool {
        self.fields(code).is_some()
    }

    /// Iterate over all command specs
    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.specs.iter()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        CommandTable::GEARMAN
    }
}
