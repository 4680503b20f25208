use crate::error::{Result, SpiTestError};
use bitflags::bitflags;
use log::debug;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;

bitflags! {
    /// Mode bits understood by the 8-bit `SPI_IOC_WR_MODE` request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpiMode: u8 {
        const CPHA = 0x01;
        const CPOL = 0x02;
        const CS_HIGH = 0x04;
        const LSB_FIRST = 0x08;
        const THREE_WIRE = 0x10;
        const LOOP = 0x20;
        const NO_CS = 0x40;
        const READY = 0x80;
    }
}

impl Default for SpiMode {
    fn default() -> Self {
        SpiMode::empty()
    }
}

/// Linux spidev ioctl requests
mod ioctl {
    use super::SpiIocTransfer;
    use nix::{ioctl_read, ioctl_write_buf, ioctl_write_ptr};

    const SPI_IOC_MAGIC: u8 = b'k';

    const SPI_IOC_TYPE_MESSAGE: u8 = 0;
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_read!(spi_ioc_rd_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_read!(
        spi_ioc_rd_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_read!(
        spi_ioc_rd_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    // SPI_IOC_MESSAGE(n): the request size is n * sizeof(struct spi_ioc_transfer)
    ioctl_write_buf!(
        spi_ioc_message,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MESSAGE,
        SpiIocTransfer
    );
}

/// Must match the kernel's `struct spi_ioc_transfer` (32 bytes)
#[repr(C)]
#[derive(Debug, Default, Clone)]
pub(crate) struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    _pad: u8,
}

/// One full-duplex message: `tx` is clocked out while `rx` is filled.
///
/// Both buffers must have the same length.
#[derive(Debug)]
pub struct Message<'a> {
    pub tx: &'a [u8],
    pub rx: &'a mut [u8],
    pub delay_usecs: u16,
    pub speed_hz: u32,
    pub bits_per_word: u8,
}

impl Message<'_> {
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// The parameter and transfer calls a spidev node offers.
///
/// Setters push a requested value, getters return what the driver applied.
pub trait SpiBus {
    fn set_mode(&mut self, mode: SpiMode) -> io::Result<()>;
    fn mode(&mut self) -> io::Result<SpiMode>;
    fn set_bits_per_word(&mut self, bits: u8) -> io::Result<()>;
    fn bits_per_word(&mut self) -> io::Result<u8>;
    fn set_max_speed_hz(&mut self, speed_hz: u32) -> io::Result<()>;
    fn max_speed_hz(&mut self) -> io::Result<u32>;

    /// Issue a single message and return how many bytes the driver moved.
    fn transfer(&mut self, message: &mut Message<'_>) -> io::Result<usize>;
}

fn errno(e: nix::Error) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}

/// An open `/dev/spidevB.C` node. Closed when dropped.
pub struct SpiDevice {
    file: File,
    device_path: String,
}

impl SpiDevice {
    pub fn open(device_path: &str) -> Result<Self> {
        debug!("Opening SPI device: {}", device_path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device_path)
            .map_err(|source| SpiTestError::Open {
                path: device_path.to_string(),
                source,
            })?;

        Ok(SpiDevice {
            file,
            device_path: device_path.to_string(),
        })
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl SpiBus for SpiDevice {
    fn set_mode(&mut self, mode: SpiMode) -> io::Result<()> {
        debug!("Writing mode: 0x{:02x}", mode.bits());
        let bits = mode.bits();
        unsafe { ioctl::spi_ioc_wr_mode(self.file.as_raw_fd(), &bits) }.map_err(errno)?;
        Ok(())
    }

    fn mode(&mut self) -> io::Result<SpiMode> {
        let mut bits: u8 = 0;
        unsafe { ioctl::spi_ioc_rd_mode(self.file.as_raw_fd(), &mut bits) }.map_err(errno)?;
        debug!("Read back mode: 0x{:02x}", bits);
        Ok(SpiMode::from_bits_retain(bits))
    }

    fn set_bits_per_word(&mut self, bits: u8) -> io::Result<()> {
        debug!("Writing bits per word: {}", bits);
        unsafe { ioctl::spi_ioc_wr_bits_per_word(self.file.as_raw_fd(), &bits) }
            .map_err(errno)?;
        Ok(())
    }

    fn bits_per_word(&mut self) -> io::Result<u8> {
        let mut bits: u8 = 0;
        unsafe { ioctl::spi_ioc_rd_bits_per_word(self.file.as_raw_fd(), &mut bits) }
            .map_err(errno)?;
        debug!("Read back bits per word: {}", bits);
        Ok(bits)
    }

    fn set_max_speed_hz(&mut self, speed_hz: u32) -> io::Result<()> {
        debug!("Writing max speed: {} Hz", speed_hz);
        unsafe { ioctl::spi_ioc_wr_max_speed_hz(self.file.as_raw_fd(), &speed_hz) }
            .map_err(errno)?;
        Ok(())
    }

    fn max_speed_hz(&mut self) -> io::Result<u32> {
        let mut speed_hz: u32 = 0;
        unsafe { ioctl::spi_ioc_rd_max_speed_hz(self.file.as_raw_fd(), &mut speed_hz) }
            .map_err(errno)?;
        debug!("Read back max speed: {} Hz", speed_hz);
        Ok(speed_hz)
    }

    fn transfer(&mut self, message: &mut Message<'_>) -> io::Result<usize> {
        if message.rx.len() != message.tx.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "rx and tx buffers differ in length",
            ));
        }

        let xfer = [SpiIocTransfer {
            tx_buf: message.tx.as_ptr() as u64,
            rx_buf: message.rx.as_mut_ptr() as u64,
            len: message.len() as u32,
            speed_hz: message.speed_hz,
            delay_usecs: message.delay_usecs,
            bits_per_word: message.bits_per_word,
            ..Default::default()
        }];

        debug!(
            "{}: sending {} byte(s) at {} Hz",
            self.device_path,
            message.len(),
            message.speed_hz
        );

        // The kernel writes into rx_buf, which stays borrowed through `message`.
        let ret = unsafe { ioctl::spi_ioc_message(self.file.as_raw_fd(), &xfer) }.map_err(errno)?;
        Ok(ret.max(0) as usize)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn test_transfer_struct_matches_kernel_layout() {
        assert_eq!(mem::size_of::<SpiIocTransfer>(), 32);
    }

    #[test]
    fn test_mode_bits_match_spidev_header() {
        assert_eq!(SpiMode::CPHA.bits(), 0x01);
        assert_eq!(SpiMode::CPOL.bits(), 0x02);
        assert_eq!(SpiMode::CS_HIGH.bits(), 0x04);
        assert_eq!(SpiMode::LSB_FIRST.bits(), 0x08);
        assert_eq!(SpiMode::THREE_WIRE.bits(), 0x10);
        assert_eq!(SpiMode::LOOP.bits(), 0x20);
        assert_eq!(SpiMode::NO_CS.bits(), 0x40);
        assert_eq!(SpiMode::READY.bits(), 0x80);
    }

    #[test]
    fn test_open_missing_device() {
        let err = SpiDevice::open("/dev/does-not-exist-spidev").err().unwrap();
        assert!(matches!(err, SpiTestError::Open { .. }));
        assert!(err.to_string().starts_with("can't open device"));
    }
}
