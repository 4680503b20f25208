//! CLI argument parsing

use crate::config::{parse_byte, Profile, TransferConfig};
use crate::session::LinkSettings;
use crate::spi::SpiMode;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spidev_test")]
#[command(version, about = "SPI testing utility (using spidev driver)", long_about = None)]
#[command(after_help = "Example:\n  spidev_test -D /dev/spidev1.1 -s 26000000 -b 8 -X 0xbb 0xcc")]
pub struct Cli {
    /// Device to use [default: /dev/spidev1.1]
    #[arg(short = 'D', long, value_name = "PATH")]
    pub device: Option<String>,

    /// Max speed (Hz) [default: 500000]
    #[arg(short = 's', long, value_name = "HZ")]
    pub speed: Option<u32>,

    /// Delay (usec) [default: 0]
    #[arg(short = 'd', long, value_name = "USEC")]
    pub delay: Option<u16>,

    /// Bits per word [default: 8]
    #[arg(short = 'b', long = "bpw", value_name = "BITS")]
    pub bits_per_word: Option<u8>,

    /// Loopback
    #[arg(short = 'l', long = "loop")]
    pub loopback: bool,

    /// Clock phase
    #[arg(short = 'H', long)]
    pub cpha: bool,

    /// Clock polarity
    #[arg(short = 'O', long)]
    pub cpol: bool,

    /// Least significant bit first
    #[arg(short = 'L', long)]
    pub lsb: bool,

    /// Chip select active high
    #[arg(short = 'C', long = "cs-high")]
    pub cs_high: bool,

    /// SI/SO signals shared
    #[arg(short = '3', long = "3wire")]
    pub three_wire: bool,

    /// No chip select
    #[arg(short = 'N', long = "no-cs")]
    pub no_cs: bool,

    /// Slave pulls low to pause
    #[arg(short = 'R', long)]
    pub ready: bool,

    /// YAML profile with per-board defaults
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Data bytes to send; takes every remaining argument (decimal, 0x hex or 0 octal)
    #[arg(
        short = 'X',
        long = "xdata",
        visible_alias = "Xdata",
        value_name = "BYTE",
        num_args = 1..,
        allow_hyphen_values = true,
        value_parser = parse_byte
    )]
    pub xdata: Vec<u8>,
}

impl Cli {
    /// Mode bits selected on the command line.
    pub fn mode(&self) -> SpiMode {
        let flags = [
            (self.loopback, SpiMode::LOOP),
            (self.cpha, SpiMode::CPHA),
            (self.cpol, SpiMode::CPOL),
            (self.lsb, SpiMode::LSB_FIRST),
            (self.cs_high, SpiMode::CS_HIGH),
            (self.three_wire, SpiMode::THREE_WIRE),
            (self.no_cs, SpiMode::NO_CS),
            (self.ready, SpiMode::READY),
        ];
        flags
            .into_iter()
            .filter(|(set, _)| *set)
            .fold(SpiMode::empty(), |acc, (_, bit)| acc | bit)
    }

    /// Layer the command line over `profile` over the built-in defaults.
    /// Mode flags from both sources are combined.
    pub fn resolve(&self, profile: &Profile) -> TransferConfig {
        let defaults = TransferConfig::default();
        TransferConfig {
            device: self
                .device
                .clone()
                .or_else(|| profile.device.clone())
                .unwrap_or(defaults.device),
            link: LinkSettings {
                mode: profile.mode() | self.mode(),
                bits_per_word: self
                    .bits_per_word
                    .or(profile.bits_per_word)
                    .unwrap_or(defaults.link.bits_per_word),
                speed_hz: self
                    .speed
                    .or(profile.speed_hz)
                    .unwrap_or(defaults.link.speed_hz),
            },
            delay_usecs: self
                .delay
                .or(profile.delay_usecs)
                .unwrap_or(defaults.delay_usecs),
            payload: self.xdata.clone(),
        }
    }

    /// Load the profile named by `--config`, if any, and resolve.
    pub fn into_config(self) -> anyhow::Result<TransferConfig> {
        let profile = match &self.config {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Profile::load(path)?
            }
            None => Profile::default(),
        };
        Ok(self.resolve(&profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> TransferConfig {
        let argv = std::iter::once("spidev_test").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap().resolve(&Profile::default())
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_when_flags_omitted() {
        assert_eq!(parse(&[]), TransferConfig::default());
    }

    #[test]
    fn test_each_option_overrides_its_default_only() {
        let config = parse(&["-D", "/dev/spidev0.0"]);
        assert_eq!(config.device, "/dev/spidev0.0");
        assert_eq!(config.link, LinkSettings::default());

        let config = parse(&["-s", "26000000", "-b", "16", "-d", "10"]);
        assert_eq!(config.device, "/dev/spidev1.1");
        assert_eq!(config.link.speed_hz, 26_000_000);
        assert_eq!(config.link.bits_per_word, 16);
        assert_eq!(config.delay_usecs, 10);
        assert_eq!(config.link.mode, SpiMode::empty());
    }

    #[test]
    fn test_long_options() {
        let config = parse(&["--device", "/dev/spidev2.0", "--speed", "1000", "--bpw", "9"]);
        assert_eq!(config.device, "/dev/spidev2.0");
        assert_eq!(config.link.speed_hz, 1000);
        assert_eq!(config.link.bits_per_word, 9);
    }

    #[test]
    fn test_each_mode_flag_sets_its_bit() {
        let cases = [
            ("-l", SpiMode::LOOP),
            ("-H", SpiMode::CPHA),
            ("-O", SpiMode::CPOL),
            ("-L", SpiMode::LSB_FIRST),
            ("-C", SpiMode::CS_HIGH),
            ("-3", SpiMode::THREE_WIRE),
            ("-N", SpiMode::NO_CS),
            ("-R", SpiMode::READY),
            ("--loop", SpiMode::LOOP),
            ("--cs-high", SpiMode::CS_HIGH),
            ("--3wire", SpiMode::THREE_WIRE),
        ];
        for (flag, bit) in cases {
            assert_eq!(parse(&[flag]).link.mode, bit, "{}", flag);
        }
    }

    #[test]
    fn test_mode_flags_combine() {
        assert_eq!(
            parse(&["-l", "-3"]).link.mode,
            SpiMode::LOOP | SpiMode::THREE_WIRE
        );
        assert_eq!(
            parse(&["-HO"]).link.mode,
            SpiMode::CPHA | SpiMode::CPOL
        );
    }

    #[test]
    fn test_xdata_consumes_remaining_arguments() {
        let config = parse(&["-s", "26000000", "-X", "0xbb", "0xcc"]);
        assert_eq!(config.payload, vec![0xbb, 0xcc]);

        let config = parse(&["-l", "-X", "12", "0x1ff", "-1"]);
        assert_eq!(config.payload, vec![12, 0xff, 0xff]);
        assert_eq!(config.link.mode, SpiMode::LOOP);
    }

    #[test]
    fn test_xdata_alias() {
        assert_eq!(parse(&["--Xdata", "1", "2"]).payload, vec![1, 2]);
    }

    #[test]
    fn test_usage_errors() {
        let bad = [
            vec!["spidev_test", "-Q"],
            vec!["spidev_test", "-s"],
            vec!["spidev_test", "-s", "fast"],
            vec!["spidev_test", "-b", "300"],
            vec!["spidev_test", "-X"],
            vec!["spidev_test", "-X", "0xzz"],
        ];
        for argv in bad {
            assert!(Cli::try_parse_from(argv.iter().copied()).is_err(), "{:?}", argv);
        }
    }

    #[test]
    fn test_command_line_overrides_profile() {
        let profile = Profile::from_yaml(
            "device: /dev/spidev0.1\nspeed_hz: 1000000\nbits_per_word: 16\nmode: [cpha]\n",
        )
        .unwrap();
        let cli = Cli::try_parse_from(["spidev_test", "-s", "2000", "-l"]).unwrap();
        let config = cli.resolve(&profile);
        assert_eq!(config.device, "/dev/spidev0.1");
        assert_eq!(config.link.speed_hz, 2000);
        assert_eq!(config.link.bits_per_word, 16);
        assert_eq!(config.link.mode, SpiMode::CPHA | SpiMode::LOOP);
    }
}
