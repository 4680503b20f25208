use crate::session::LinkSettings;
use crate::spi::SpiMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::IntErrorKind;
use std::path::Path;

pub const DEFAULT_DEVICE: &str = "/dev/spidev1.1";

/// Everything one run needs: where to send, how, and what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    pub device: String,
    pub link: LinkSettings,
    pub delay_usecs: u16,
    pub payload: Vec<u8>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            link: LinkSettings::default(),
            delay_usecs: 0,
            payload: vec![],
        }
    }
}

/// Named mode flags, as written in a profile file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModeFlag {
    Loop,
    Cpha,
    Cpol,
    Lsb,
    CsHigh,
    #[serde(rename = "3wire")]
    ThreeWire,
    NoCs,
    Ready,
}

impl ModeFlag {
    pub fn bit(self) -> SpiMode {
        match self {
            ModeFlag::Loop => SpiMode::LOOP,
            ModeFlag::Cpha => SpiMode::CPHA,
            ModeFlag::Cpol => SpiMode::CPOL,
            ModeFlag::Lsb => SpiMode::LSB_FIRST,
            ModeFlag::CsHigh => SpiMode::CS_HIGH,
            ModeFlag::ThreeWire => SpiMode::THREE_WIRE,
            ModeFlag::NoCs => SpiMode::NO_CS,
            ModeFlag::Ready => SpiMode::READY,
        }
    }
}

/// Per-board defaults loaded from YAML. Anything left out falls through to
/// the built-in defaults; command-line flags override all of it.
///
/// ```yaml
/// device: /dev/spidev0.0
/// speed_hz: 1000000
/// mode: [cpha, cpol]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub device: Option<String>,
    pub speed_hz: Option<u32>,
    pub delay_usecs: Option<u16>,
    pub bits_per_word: Option<u8>,
    pub mode: Vec<ModeFlag>,
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .context(format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a map.
        if content.trim().is_empty() {
            return Ok(Profile::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn mode(&self) -> SpiMode {
        self.mode
            .iter()
            .fold(SpiMode::empty(), |acc, flag| acc | flag.bit())
    }
}

/// Parse an integer literal the way C's `strtol(s, NULL, 0)` picks a base:
/// `0x`/`0X` for hex, a leading `0` for octal, decimal otherwise. An optional
/// sign is allowed. Out-of-range values saturate to `i64::MIN`/`i64::MAX` as
/// `strtol` does. Unlike `strtol`, trailing garbage is an error.
pub fn parse_int_literal(s: &str) -> std::result::Result<i64, String> {
    let literal = s.trim();
    let (negative, body) = match literal.as_bytes().first() {
        Some(b'-') => (true, &literal[1..]),
        Some(b'+') => (false, &literal[1..]),
        _ => (false, literal),
    };

    let (radix, digits) = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        (16, hex)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };

    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(format!("invalid integer literal '{}'", s));
    }
    let magnitude = match u64::from_str_radix(digits, radix) {
        Ok(value) => value,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => u64::MAX,
        Err(e) => return Err(format!("invalid integer literal '{}': {}", s, e)),
    };
    Ok(if negative {
        0i64.checked_sub_unsigned(magnitude).unwrap_or(i64::MIN)
    } else {
        i64::try_from(magnitude).unwrap_or(i64::MAX)
    })
}

/// A payload byte: any integer literal, truncated to its low 8 bits.
pub fn parse_byte(s: &str) -> std::result::Result<u8, String> {
    parse_int_literal(s).map(|value| value as u8)
}
