// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Coded errors surfaced to control clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ErrorCode {
    None = 0,
    InvalidCommand = 1,
    InvalidParams = 2,
    InvalidConfigKey = 3,
    RuleParse = 4,
    ResourceExhausted = 5,
    Internal = 6,
    ShutdownInProgress = 7,
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> u8 {
        code as u8
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::None),
            1 => Ok(ErrorCode::InvalidCommand),
            2 => Ok(ErrorCode::InvalidParams),
            3 => Ok(ErrorCode::InvalidConfigKey),
            4 => Ok(ErrorCode::RuleParse),
            5 => Ok(ErrorCode::ResourceExhausted),
            6 => Ok(ErrorCode::Internal),
            7 => Ok(ErrorCode::ShutdownInProgress),
            other => Err(format!("unknown error code {other}")),
        }
    }
}

/// Response from the daemon. Always a single framed JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub success: bool,
    pub error_code: ErrorCode,
    pub error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_code: ErrorCode::None,
            error: String::new(),
            message: None,
            data: None,
        }
    }

    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self { message: Some(message.into()), ..Self::ok() }
    }

    pub fn ok_with_data(data: serde_json::Value) -> Self {
        Self { data: Some(data), ..Self::ok() }
    }

    pub fn error(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error_code: code,
            error: error.into(),
            message: None,
            data: None,
        }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
