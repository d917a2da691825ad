//! Wire format of the CamillaDSP websocket protocol
//!
//! A request is either the bare command name as a JSON string, `"GetVolume"`,
//! or a single-key object carrying the argument, `{"SetVolume":-12.3}`.
//! The reply echoes the command name around a result envelope:
//! `{"GetVolume":{"result":"Ok","value":-12.3}}`. There are no request ids;
//! a reply is matched to the one pending request by command name.

use crate::error::{CamillaError, Result};
use crate::tokens::{tokenize, Token, TokenCursor, TokenKind};
use serde::Serialize;
use std::fmt;

/// Commands understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    GetVersion,
    GetSupportedDeviceTypes,
    GetState,
    GetStopReason,
    GetSignalRange,
    GetCaptureSignalRms,
    GetPlaybackSignalRms,
    GetCaptureSignalPeak,
    GetPlaybackSignalPeak,
    GetVolume,
    SetVolume,
    GetMute,
    SetMute,
    GetCaptureRate,
    GetUpdateInterval,
    SetUpdateInterval,
    GetRateAdjust,
    GetBufferLevel,
    GetClippedSamples,
    Stop,
    Exit,
    Reload,
    GetConfigName,
    SetConfigName,
    GetConfig,
    SetConfig,
    GetPreviousConfig,
    ReadConfig,
    ReadConfigFile,
    ValidateConfig,
}

impl Command {
    /// Name of the command on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::GetVersion => "GetVersion",
            Command::GetSupportedDeviceTypes => "GetSupportedDeviceTypes",
            Command::GetState => "GetState",
            Command::GetStopReason => "GetStopReason",
            Command::GetSignalRange => "GetSignalRange",
            Command::GetCaptureSignalRms => "GetCaptureSignalRms",
            Command::GetPlaybackSignalRms => "GetPlaybackSignalRms",
            Command::GetCaptureSignalPeak => "GetCaptureSignalPeak",
            Command::GetPlaybackSignalPeak => "GetPlaybackSignalPeak",
            Command::GetVolume => "GetVolume",
            Command::SetVolume => "SetVolume",
            Command::GetMute => "GetMute",
            Command::SetMute => "SetMute",
            Command::GetCaptureRate => "GetCaptureRate",
            Command::GetUpdateInterval => "GetUpdateInterval",
            Command::SetUpdateInterval => "SetUpdateInterval",
            Command::GetRateAdjust => "GetRateAdjust",
            Command::GetBufferLevel => "GetBufferLevel",
            Command::GetClippedSamples => "GetClippedSamples",
            Command::Stop => "Stop",
            Command::Exit => "Exit",
            Command::Reload => "Reload",
            Command::GetConfigName => "GetConfigName",
            Command::SetConfigName => "SetConfigName",
            Command::GetConfig => "GetConfig",
            Command::SetConfig => "SetConfig",
            Command::GetPreviousConfig => "GetPreviousConfig",
            Command::ReadConfig => "ReadConfig",
            Command::ReadConfigFile => "ReadConfigFile",
            Command::ValidateConfig => "ValidateConfig",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing command, with its argument already serialized
#[derive(Debug, Clone)]
pub struct Request {
    pub command: Command,
    argument: Option<String>,
}

impl Request {
    /// Create a request without an argument
    pub fn new(command: Command) -> Self {
        Self {
            command,
            argument: None,
        }
    }

    /// Create a request carrying `argument` serialized as JSON
    pub fn with_argument<T: Serialize + ?Sized>(command: Command, argument: &T) -> Result<Self> {
        Ok(Self {
            command,
            argument: Some(serde_json::to_string(argument)?),
        })
    }

    /// Text frame to send over the websocket
    pub fn to_frame(&self) -> Result<String> {
        let name = serde_json::to_string(self.command.as_str())?;
        Ok(match &self.argument {
            Some(argument) => format!("{{{}:{}}}", name, argument),
            None => name,
        })
    }
}

/// Outcome reported in a reply envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyResult {
    Ok,
    Error,
}

/// Decoded reply envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub command: String,
    pub result: ReplyResult,
    /// Raw JSON text of the `value` field, empty if the reply has none
    pub value: String,
}

/// Name of the command a reply frame answers
///
/// `None` if the frame isn't a well-formed `{"Name":{...}}` envelope.
pub fn reply_command(frame: &str, capacity: usize) -> Option<&str> {
    let tokens = tokenize(frame, capacity).ok()?;
    envelope_name(frame, &tokens)
}

fn envelope_name<'a>(frame: &'a str, tokens: &[Token]) -> Option<&'a str> {
    match tokens {
        [envelope, name, ..]
            if envelope.kind == TokenKind::Object && name.kind == TokenKind::String =>
        {
            Some(name.text(frame))
        }
        _ => None,
    }
}

/// Decode `frame` as the reply to `pending`
///
/// A reply whose result is `Error` is turned into [`CamillaError::Remote`]
/// here, so callers only ever see successful replies.
pub fn correlate(pending: Command, frame: &str, capacity: usize) -> Result<Reply> {
    let tokens = tokenize(frame, capacity)?;

    let command = match envelope_name(frame, &tokens) {
        Some(command) if command == pending.as_str() => command,
        _ => {
            return Err(CamillaError::Protocol(format!(
                "unexpected response to {}: {}",
                pending, frame
            )))
        }
    };

    let mut result = None;
    let mut value = "";
    let mut cursor = TokenCursor::at(frame, &tokens, 2);
    if let Some(body) = cursor.next().filter(|t| t.kind == TokenKind::Object) {
        for _ in 0..body.size {
            let (Some(key), Some(content)) = (cursor.next(), cursor.next()) else {
                break;
            };
            cursor.skip_children(content);
            match cursor.text(key) {
                "result" => result = Some(cursor.text(content)),
                "value" => value = cursor.fragment(content),
                _ => {}
            }
        }
    }

    match result {
        Some("Ok") => Ok(Reply {
            command: command.to_string(),
            result: ReplyResult::Ok,
            value: value.to_string(),
        }),
        Some("Error") => Err(CamillaError::Remote(error_message(value))),
        Some(other) => Err(CamillaError::decode(
            pending.as_str(),
            format!("unknown result {:?}", other),
        )),
        None => Err(CamillaError::decode(pending.as_str(), "reply has no result")),
    }
}

fn error_message(value: &str) -> String {
    let message = serde_json::from_str::<String>(value).unwrap_or_else(|_| value.to_string());
    if message.is_empty() {
        "command failed".to_string()
    } else {
        message
    }
}
