use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Classification of whether a method's execution may yield control to the
/// coroutine scheduler.
///
/// `Normal` is the permissive default: whenever a classification cannot be
/// determined the database assumes the method might suspend, so the rewriting
/// pass at worst does unnecessary work instead of corrupting coroutine
/// semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SuspendType {
    Blocking,
    None,
    Ignore,
    JustMark,
    Normal,
    Family,
}

impl SuspendType {
    /// Canonical lowercase mnemonic used in rules files and CLI output.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            SuspendType::Blocking => "blocking",
            SuspendType::None => "none",
            SuspendType::Ignore => "ignore",
            SuspendType::JustMark => "just_mark",
            SuspendType::Normal => "normal",
            SuspendType::Family => "family",
        }
    }
}

impl fmt::Display for SuspendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown suspend type mnemonic: {0}")]
pub struct ParseSuspendTypeError(pub String);

impl FromStr for SuspendType {
    type Err = ParseSuspendTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocking" => Ok(SuspendType::Blocking),
            "none" => Ok(SuspendType::None),
            "ignore" => Ok(SuspendType::Ignore),
            "just_mark" => Ok(SuspendType::JustMark),
            "normal" => Ok(SuspendType::Normal),
            "family" => Ok(SuspendType::Family),
            other => Err(ParseSuspendTypeError(other.to_string())),
        }
    }
}
