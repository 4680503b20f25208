//! spidev test utility
//!
//! Configures a Linux spidev node (mode, bits per word, max speed), reads the
//! applied values back, then sends one full-duplex message and dumps what
//! went out and what came back.

pub mod cli;
pub mod config;
pub mod error;
pub mod session;
pub mod spi;
pub mod transfer;

use std::io::Write;

pub use config::TransferConfig;
pub use error::{Result, SpiTestError};
pub use session::{LinkSettings, Session};
pub use spi::{SpiBus, SpiDevice, SpiMode};
pub use transfer::TransferResult;

/// Configure `bus`, report the applied settings to `out`, send the payload
/// and report the dump.
pub fn run_on<B: SpiBus, W: Write>(
    bus: B,
    config: &TransferConfig,
    out: &mut W,
) -> anyhow::Result<TransferResult> {
    let mut session = Session::configure(bus, &config.link)?;
    writeln!(out, "{}", session.settings())?;

    let result = transfer::execute(&mut session, &config.payload, config.delay_usecs)?;
    writeln!(out, "{}", result)?;
    Ok(result)
}

/// The one-line message printed for a fatal error: the failing step followed
/// by its cause chain.
pub fn diagnostic(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}

/// Open `config.device` and run against it.
pub fn run<W: Write>(config: &TransferConfig, out: &mut W) -> anyhow::Result<TransferResult> {
    let device = SpiDevice::open(&config.device)?;
    log::info!("SPI device opened: {}", device.device_path());
    run_on(device, config, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::mock::MockBus;

    fn config(mode: SpiMode, payload: Vec<u8>) -> TransferConfig {
        TransferConfig {
            link: LinkSettings {
                mode,
                ..LinkSettings::default()
            },
            payload,
            ..TransferConfig::default()
        }
    }

    #[test]
    fn test_full_run_output() {
        let mut out = Vec::new();
        run_on(MockBus::new(), &config(SpiMode::LOOP, vec![0xbb, 0xcc]), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "spi mode: 32\nbits per word: 8\nmax speed: 500000 Hz (500 KHz)\n\
             TX: bb cc \t RX: bb cc \n"
        );
    }

    #[test]
    fn test_config_failure_stops_before_transfer() {
        let mut out = Vec::new();
        let mut bus = MockBus::new();
        bus.fail_on = Some("get_max_speed_hz");
        let err = run_on(bus, &config(SpiMode::empty(), vec![1]), &mut out)
            .err()
            .unwrap();
        let err = err.downcast::<SpiTestError>().unwrap();
        assert!(matches!(err, SpiTestError::GetMaxSpeed(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_empty_payload_reports_settings_then_fails() {
        let mut out = Vec::new();
        let err = run_on(MockBus::new(), &config(SpiMode::empty(), vec![]), &mut out)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<SpiTestError>(),
            Some(SpiTestError::EmptyPayload)
        ));
        assert!(String::from_utf8(out).unwrap().starts_with("spi mode: 0\n"));
    }

    #[test]
    fn test_missing_device_fails_to_open() {
        let mut out = Vec::new();
        let config = TransferConfig {
            device: "/nonexistent/spidev0.0".to_string(),
            payload: vec![0xbb],
            ..TransferConfig::default()
        };
        let err = run(&config, &mut out).err().unwrap();
        assert_eq!(
            diagnostic(&err),
            "can't open device /nonexistent/spidev0.0: No such file or directory (os error 2)"
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_diagnostic_names_cause_once() {
        let mut out = Vec::new();
        let mut bus = MockBus::new();
        bus.fail_on = Some("set_mode");
        let err = run_on(bus, &config(SpiMode::empty(), vec![1]), &mut out)
            .err()
            .unwrap();
        let line = diagnostic(&err);
        assert!(line.starts_with("can't set spi mode: "), "{}", line);
        assert_eq!(line.matches("os error 22").count(), 1, "{}", line);
        assert!(!line.contains('\n'));
    }
}
