use crate::error::{Result, SpiTestError};
use crate::spi::{SpiBus, SpiMode};
use log::{info, warn};
use std::fmt;

/// Link parameters as requested, or as the driver reports them after a
/// round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub mode: SpiMode,
    pub bits_per_word: u8,
    pub speed_hz: u32,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            mode: SpiMode::empty(),
            bits_per_word: 8,
            speed_hz: 500_000,
        }
    }
}

impl fmt::Display for LinkSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "spi mode: {}", self.mode.bits())?;
        writeln!(f, "bits per word: {}", self.bits_per_word)?;
        write!(
            f,
            "max speed: {} Hz ({} KHz)",
            self.speed_hz,
            self.speed_hz / 1000
        )
    }
}

/// A configured device. Only built once all three round trips succeeded.
pub struct Session<B: SpiBus> {
    bus: B,
    settings: LinkSettings,
}

impl<B: SpiBus> Session<B> {
    /// Push `requested` to the device one parameter at a time, reading each
    /// back before moving on. The first failing call aborts the session.
    pub fn configure(mut bus: B, requested: &LinkSettings) -> Result<Self> {
        bus.set_mode(requested.mode).map_err(SpiTestError::SetMode)?;
        let mode = bus.mode().map_err(SpiTestError::GetMode)?;

        bus.set_bits_per_word(requested.bits_per_word)
            .map_err(SpiTestError::SetBitsPerWord)?;
        let bits_per_word = bus.bits_per_word().map_err(SpiTestError::GetBitsPerWord)?;

        bus.set_max_speed_hz(requested.speed_hz)
            .map_err(SpiTestError::SetMaxSpeed)?;
        let speed_hz = bus.max_speed_hz().map_err(SpiTestError::GetMaxSpeed)?;

        let settings = LinkSettings {
            mode,
            bits_per_word,
            speed_hz,
        };
        if settings != *requested {
            warn!(
                "Device adjusted link settings: requested {:?}, applied {:?}",
                requested, settings
            );
        }
        info!(
            "SPI configured: mode=0x{:02x} bits={} speed={} kHz",
            mode.bits(),
            bits_per_word,
            speed_hz / 1000
        );

        Ok(Session { bus, settings })
    }

    /// The values the device reported back.
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub(crate) fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> B {
        self.bus
    }
}
