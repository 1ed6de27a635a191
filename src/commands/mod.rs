//! Ground command decoding
//!
//! Command payloads arrive from the message-dispatch collaborator already
//! stripped to a function code plus a little-endian payload. This module
//! owns the code space, the expected-length table consulted by the engine's
//! length guard, and the field decoding into typed [`Command`] values.
//!
//! Decoding is defensive end to end: no slice indexing that can panic, and
//! a length mismatch surfaces as an error value even though the engine has
//! already length-checked the payload by the time it decodes.

use core::fmt;

/// Expected housekeeping-request payload length
pub const HK_REQUEST_LEN: usize = 0;

/// Ground command function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandCode {
    /// No operation, reports engine liveness
    Noop = 0,
    /// Zero the command and monitoring counters
    ResetCounters = 1,
    /// Enable the application monitor sweep
    EnableAppMon = 2,
    /// Disable the application monitor sweep
    DisableAppMon = 3,
    /// Enable event monitoring
    EnableEventMon = 4,
    /// Disable event monitoring
    DisableEventMon = 5,
    /// Enable CPU hogging detection
    EnableCpuHog = 6,
    /// Disable CPU hogging detection
    DisableCpuHog = 7,
    /// Clear the performed-resets counter
    ResetResetsPerformed = 8,
    /// Set the processor-reset allowance
    SetMaxResets = 9,
    /// Dump the idle-sample diagnostics report
    ReportUtilDiag = 10,
    /// Set the utilization conversion parameters
    SetUtilParams = 11,
    /// Set the idle-sample diagnostics mask
    SetUtilDiagMask = 12,
    /// Operator reset of one application monitor slot
    ResetMonitor = 13,
    /// Operator fire of one action index
    ForceAction = 14,
}

impl CommandCode {
    /// Parse a raw function code
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(CommandCode::Noop),
            1 => Some(CommandCode::ResetCounters),
            2 => Some(CommandCode::EnableAppMon),
            3 => Some(CommandCode::DisableAppMon),
            4 => Some(CommandCode::EnableEventMon),
            5 => Some(CommandCode::DisableEventMon),
            6 => Some(CommandCode::EnableCpuHog),
            7 => Some(CommandCode::DisableCpuHog),
            8 => Some(CommandCode::ResetResetsPerformed),
            9 => Some(CommandCode::SetMaxResets),
            10 => Some(CommandCode::ReportUtilDiag),
            11 => Some(CommandCode::SetUtilParams),
            12 => Some(CommandCode::SetUtilDiagMask),
            13 => Some(CommandCode::ResetMonitor),
            14 => Some(CommandCode::ForceAction),
            _ => None,
        }
    }

    /// Expected payload length for this code
    pub fn expected_len(self) -> usize {
        match self {
            CommandCode::SetMaxResets => 2,
            CommandCode::SetUtilParams => 12,
            CommandCode::SetUtilDiagMask => 4,
            CommandCode::ResetMonitor => 2,
            CommandCode::ForceAction => 6,
            _ => 0,
        }
    }
}

/// Inbound message categories the length guard distinguishes
///
/// Ground commands count length mismatches against the command-error
/// counter; internal requests only report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Ground command with a parsed function code
    Command(CommandCode),
    /// Internal housekeeping snapshot request
    HousekeepingRequest,
}

impl MessageKind {
    /// Expected payload length for this message kind
    pub fn expected_len(self) -> usize {
        match self {
            MessageKind::Command(code) => code.expected_len(),
            MessageKind::HousekeepingRequest => HK_REQUEST_LEN,
        }
    }
}

/// Decoded ground command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Noop,
    ResetCounters,
    EnableAppMon,
    DisableAppMon,
    EnableEventMon,
    DisableEventMon,
    EnableCpuHog,
    DisableCpuHog,
    ResetResetsPerformed,
    SetMaxResets { max: u16 },
    ReportUtilDiag,
    SetUtilParams { mult1: u32, div: u32, mult2: u32 },
    SetUtilDiagMask { mask: u32 },
    ResetMonitor { slot: u16 },
    ForceAction { action: u16, app_id: u32 },
}

/// Command decode failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Payload length does not match the code's expected length
    WrongLength {
        code: CommandCode,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::WrongLength {
                code,
                expected,
                actual,
            } => write!(
                f,
                "command {:?} payload length {} (expected {})",
                code, actual, expected
            ),
        }
    }
}

/// Decode a command payload
///
/// The payload must be exactly the code's expected length.
pub fn decode(code: CommandCode, payload: &[u8]) -> Result<Command, CommandError> {
    let expected = code.expected_len();
    if payload.len() != expected {
        return Err(CommandError::WrongLength {
            code,
            expected,
            actual: payload.len(),
        });
    }

    let command = match code {
        CommandCode::Noop => Command::Noop,
        CommandCode::ResetCounters => Command::ResetCounters,
        CommandCode::EnableAppMon => Command::EnableAppMon,
        CommandCode::DisableAppMon => Command::DisableAppMon,
        CommandCode::EnableEventMon => Command::EnableEventMon,
        CommandCode::DisableEventMon => Command::DisableEventMon,
        CommandCode::EnableCpuHog => Command::EnableCpuHog,
        CommandCode::DisableCpuHog => Command::DisableCpuHog,
        CommandCode::ResetResetsPerformed => Command::ResetResetsPerformed,
        CommandCode::SetMaxResets => Command::SetMaxResets {
            max: read_u16(payload, 0),
        },
        CommandCode::ReportUtilDiag => Command::ReportUtilDiag,
        CommandCode::SetUtilParams => Command::SetUtilParams {
            mult1: read_u32(payload, 0),
            div: read_u32(payload, 4),
            mult2: read_u32(payload, 8),
        },
        CommandCode::SetUtilDiagMask => Command::SetUtilDiagMask {
            mask: read_u32(payload, 0),
        },
        CommandCode::ResetMonitor => Command::ResetMonitor {
            slot: read_u16(payload, 0),
        },
        CommandCode::ForceAction => Command::ForceAction {
            action: read_u16(payload, 0),
            app_id: read_u32(payload, 2),
        },
    };
    Ok(command)
}

fn read_u16(payload: &[u8], offset: usize) -> u16 {
    let mut bytes = [0u8; 2];
    if let Some(slice) = payload.get(offset..offset + 2) {
        bytes.copy_from_slice(slice);
    }
    u16::from_le_bytes(bytes)
}

fn read_u32(payload: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    if let Some(slice) = payload.get(offset..offset + 4) {
        bytes.copy_from_slice(slice);
    }
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for raw in 0..=14u8 {
            let code = CommandCode::from_u8(raw).unwrap();
            assert_eq!(code as u8, raw);
        }
        assert!(CommandCode::from_u8(15).is_none());
        assert!(CommandCode::from_u8(99).is_none());
    }

    #[test]
    fn test_decode_no_payload_commands() {
        assert_eq!(decode(CommandCode::Noop, &[]), Ok(Command::Noop));
        assert_eq!(
            decode(CommandCode::EnableAppMon, &[]),
            Ok(Command::EnableAppMon)
        );
    }

    #[test]
    fn test_decode_set_util_params() {
        let mut payload = [0u8; 12];
        payload[0..4].copy_from_slice(&1u32.to_le_bytes());
        payload[4..8].copy_from_slice(&3u32.to_le_bytes());
        payload[8..12].copy_from_slice(&2u32.to_le_bytes());

        assert_eq!(
            decode(CommandCode::SetUtilParams, &payload),
            Ok(Command::SetUtilParams {
                mult1: 1,
                div: 3,
                mult2: 2
            })
        );
    }

    #[test]
    fn test_decode_force_action() {
        let mut payload = [0u8; 6];
        payload[0..2].copy_from_slice(&5u16.to_le_bytes());
        payload[2..6].copy_from_slice(&0xAABBu32.to_le_bytes());

        assert_eq!(
            decode(CommandCode::ForceAction, &payload),
            Ok(Command::ForceAction {
                action: 5,
                app_id: 0xAABB
            })
        );
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let result = decode(CommandCode::SetUtilDiagMask, &[0x01, 0x02]);
        assert_eq!(
            result,
            Err(CommandError::WrongLength {
                code: CommandCode::SetUtilDiagMask,
                expected: 4,
                actual: 2
            })
        );

        let result = decode(CommandCode::Noop, &[0x00]);
        assert!(result.is_err());
    }

    #[test]
    fn test_message_kind_lengths() {
        assert_eq!(
            MessageKind::Command(CommandCode::SetUtilParams).expected_len(),
            12
        );
        assert_eq!(MessageKind::HousekeepingRequest.expected_len(), HK_REQUEST_LEN);
    }
}
