use crate::error::{Result, SpiTestError};
use crate::session::Session;
use crate::spi::{Message, SpiBus};
use log::debug;
use std::fmt;

/// Hex values per line in the TX/RX dump.
pub const VALUES_PER_LINE: usize = 6;

/// Bytes sent and bytes clocked back in during one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub tx: Vec<u8>,
    pub rx: Vec<u8>,
}

/// Send `payload` as a single message using the session's applied settings.
///
/// The message length is the payload length. An empty payload is refused
/// before anything reaches the driver.
pub fn execute<B: SpiBus>(
    session: &mut Session<B>,
    payload: &[u8],
    delay_usecs: u16,
) -> Result<TransferResult> {
    if payload.is_empty() {
        return Err(SpiTestError::EmptyPayload);
    }

    let settings = *session.settings();
    let mut rx = vec![0u8; payload.len()];
    let mut message = Message {
        tx: payload,
        rx: &mut rx,
        delay_usecs,
        speed_hz: settings.speed_hz,
        bits_per_word: settings.bits_per_word,
    };

    let sent = session
        .bus_mut()
        .transfer(&mut message)
        .map_err(SpiTestError::Transfer)?;
    if sent < payload.len() {
        return Err(SpiTestError::ShortTransfer {
            expected: payload.len(),
            actual: sent,
        });
    }
    debug!("Transferred {} byte(s)", sent);

    Ok(TransferResult {
        tx: payload.to_vec(),
        rx,
    })
}

/// Two-digit lowercase hex, each value followed by a space, with a line
/// break before every `VALUES_PER_LINE`th value.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i != 0 && i % VALUES_PER_LINE == 0 {
            out.push('\n');
        }
        out.push_str(&format!("{:02x} ", byte));
    }
    out
}

impl fmt::Display for TransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TX: {}\t RX: {}", hex_dump(&self.tx), hex_dump(&self.rx))
    }
}
