//! NTAG 5 Link driver (I2C)
//!
//! The NTAG 5 Link is a passive NFC Type-5 tag with an I2C host interface.
//! Its 16-bit address space is split into disjoint partitions, and every
//! multi-block transfer must stay inside a single partition:
//!
//! - User memory (EEPROM, NDEF area): `0x0000..=0x01FF`
//! - Configuration memory (EEPROM): `0x1000..=0x109F`
//! - Session registers (volatile): `0x10A0..=0x10AF`
//! - SRAM mailbox window (volatile, arbitrated): `0x2000..=0x203F`
//!
//! All transfers move 4-byte blocks. EEPROM writes need a fixed settle time
//! before the device accepts the next transaction.

pub mod mailbox;
pub mod ndef;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

/// NTAG 5 Link register map and configuration constants
pub mod mem {
    /// User memory (EEPROM) block range
    pub const USER_MEMORY_START: u16 = 0x0000;
    pub const USER_MEMORY_END: u16 = 0x01FF;

    /// Configuration memory block range
    pub const CONFIG_MEMORY_START: u16 = 0x1000;
    pub const CONFIG_MEMORY_END: u16 = 0x109F;

    /// Session register range
    pub const SESSION_REG_START: u16 = 0x10A0;
    pub const SESSION_REG_END: u16 = 0x10AF;

    /// SRAM mailbox window block range
    pub const SRAM_START: u16 = 0x2000;
    pub const SRAM_END: u16 = 0x203F;

    /// Configuration registers used by the driver
    pub const CONFIG_CONFIG: u16 = 0x1037;
    pub const CONFIG_SYNC_DATA_BLOCK: u16 = 0x1038;
    pub const CONFIG_WDT_CFG_AND_SRAM_COPY: u16 = 0x103C;
    pub const CONFIG_EH_AND_ED_CONFIG: u16 = 0x103D;

    /// Session register list
    pub const SESSION_REG_STATUS: u16 = 0x10A0;
    pub const SESSION_REG_CONFIG: u16 = 0x10A1;
    pub const SESSION_REG_SYNC_DATA_BLOCK: u16 = 0x10A2;
    pub const SESSION_REG_PWM_GPIO_CONFIG: u16 = 0x10A3;
    pub const SESSION_REG_PWM0_ON_OFF: u16 = 0x10A4;
    pub const SESSION_REG_PWM1_ON_OFF: u16 = 0x10A5;
    pub const SESSION_REG_WDT_CONFIG: u16 = 0x10A6;
    pub const SESSION_REG_EH_CONFIG: u16 = 0x10A7;
    pub const SESSION_REG_ED_CONFIG: u16 = 0x10A8;
    pub const SESSION_REG_I2C_SLAVE_CONFIG: u16 = 0x10A9;
    pub const SESSION_REG_RESET_GEN: u16 = 0x10AA;
    pub const SESSION_REG_ED_INTR_CLEAR: u16 = 0x10AB;
    pub const SESSION_REG_I2C_MASTER_CONFIG: u16 = 0x10AC;
    pub const SESSION_REG_I2C_MASTER_STATUS: u16 = 0x10AD;

    /// Register byte indices within a block
    pub const REG_BYTE_0: u8 = 0;
    pub const REG_BYTE_1: u8 = 1;
    pub const REG_BYTE_2: u8 = 2;
    pub const REG_BYTE_3: u8 = 3;

    /// CONFIG byte 0 bits
    pub const CONFIG_0_SRAM_COPY_ENABLE: u8 = 0x80;
    pub const CONFIG_0_EH_LOW_FIELD_STR: u8 = 0x08;

    /// CONFIG byte 1 bits
    pub const CONFIG_1_EH_ARBITER_MODE_EN: u8 = 0x80;
    pub const CONFIG_1_ARBITER_SRAM_PT: u8 = 0x08;
    pub const CONFIG_1_SRAM_ENABLE: u8 = 0x02;
    pub const CONFIG_1_PT_TRANSFER_NFC_I2C: u8 = 0x01;

    /// CONFIG byte 2 bits
    pub const CONFIG_2_GPIO1_IN_PULL_UP: u8 = 0x40;
    pub const CONFIG_2_GPIO1_IN_ENABLE: u8 = 0x80;
    pub const CONFIG_2_EXT_CMD_SUPPORT: u8 = 0x08;
    pub const CONFIG_2_LOCK_BLK_CMD_SUPPORT: u8 = 0x04;
    pub const CONFIG_2_GPIO1_HIGH_SLEW_RATE: u8 = 0x02;
    pub const CONFIG_2_GPIO0_HIGH_SLEW_RATE: u8 = 0x01;

    /// Pass-through direction field in session CONFIG byte 1
    pub const PT_DIR_MASK: u8 = 0x01;
    pub const PT_DIR_I2C_TO_NFC: u8 = 0x00;
    pub const PT_DIR_NFC_TO_I2C: u8 = 0x01;
}

/// Default 7-bit I2C address of the NTAG 5 Link
pub const DEFAULT_I2C_ADDRESS: u8 = 0x54;

/// Size of one memory block in bytes
pub const BLOCK_SIZE: usize = 4;

/// One memory block, the atomic unit of bus transfer
pub type Block = [u8; BLOCK_SIZE];

/// EEPROM write settle time before the next transaction may begin
const WRITE_SETTLE_MS: u32 = 5;

/// Memory partitions of the tag's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Partition {
    /// User memory (EEPROM, holds the NDEF area)
    User,
    /// Configuration memory (EEPROM)
    Config,
    /// Session registers (volatile, reset on power loss)
    Session,
    /// SRAM mailbox window (volatile, arbitrated between I2C and NFC)
    Sram,
}

impl Partition {
    /// Inclusive block-address bounds of this partition
    pub const fn bounds(self) -> (u16, u16) {
        match self {
            Partition::User => (mem::USER_MEMORY_START, mem::USER_MEMORY_END),
            Partition::Config => (mem::CONFIG_MEMORY_START, mem::CONFIG_MEMORY_END),
            Partition::Session => (mem::SESSION_REG_START, mem::SESSION_REG_END),
            Partition::Sram => (mem::SRAM_START, mem::SRAM_END),
        }
    }

    /// The partition containing `addr`, if any
    pub fn containing(addr: u16) -> Option<Self> {
        [
            Partition::User,
            Partition::Config,
            Partition::Session,
            Partition::Sram,
        ]
        .into_iter()
        .find(|partition| {
            let (start, end) = partition.bounds();
            addr >= start && addr <= end
        })
    }
}

/// NTAG 5 Link driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ntag5Error {
    /// Address range outside a partition or crossing partition bounds
    InvalidAddress,
    /// I2C transaction failed; the remainder of the call was aborted
    Bus,
}

/// NTAG 5 Link driver
///
/// Owns the bus exclusively; callers must not interleave raw block
/// operations on the same tag without external serialization.
pub struct Ntag5<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> Ntag5<I2C, D> {
    /// Create a driver at the default I2C address
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_I2C_ADDRESS)
    }

    /// Create a driver at a non-default I2C address
    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    /// Validate that `[addr, addr + count)` sits inside one partition
    fn check_block_range(addr: u16, count: usize) -> Result<(), Ntag5Error> {
        let partition = Partition::containing(addr).ok_or(Ntag5Error::InvalidAddress)?;
        let (_, end) = partition.bounds();

        let span = u16::try_from(count.saturating_sub(1)).map_err(|_| Ntag5Error::InvalidAddress)?;
        let last = addr
            .checked_add(span)
            .ok_or(Ntag5Error::InvalidAddress)?;
        if last > end {
            return Err(Ntag5Error::InvalidAddress);
        }
        Ok(())
    }

    /// Write consecutive blocks starting at `addr`
    ///
    /// The whole range must lie within one partition; otherwise no I/O is
    /// performed. The first bus failure aborts the remaining blocks.
    pub fn write_blocks(&mut self, addr: u16, blocks: &[Block]) -> Result<(), Ntag5Error> {
        Self::check_block_range(addr, blocks.len())?;

        for (i, block) in blocks.iter().enumerate() {
            let block_addr = addr + i as u16;
            let buf = [
                (block_addr >> 8) as u8,
                (block_addr & 0xFF) as u8,
                block[0],
                block[1],
                block[2],
                block[3],
            ];

            self.i2c
                .write(self.address, &buf)
                .map_err(|_| Ntag5Error::Bus)?;
            self.delay.delay_ms(WRITE_SETTLE_MS);
        }

        Ok(())
    }

    /// Read consecutive blocks starting at `addr`
    pub fn read_blocks(&mut self, addr: u16, blocks: &mut [Block]) -> Result<(), Ntag5Error> {
        Self::check_block_range(addr, blocks.len())?;

        for (i, block) in blocks.iter_mut().enumerate() {
            let block_addr = addr + i as u16;
            let buf = [(block_addr >> 8) as u8, (block_addr & 0xFF) as u8];

            self.i2c
                .write_read(self.address, &buf, block)
                .map_err(|_| Ntag5Error::Bus)?;
        }

        Ok(())
    }

    /// Masked single-byte update of a volatile session register
    ///
    /// The tag applies `value & mask` to the selected byte; other bits are
    /// left untouched. Not persisted across power loss.
    pub fn write_session_reg(
        &mut self,
        addr: u16,
        byte_index: u8,
        mask: u8,
        value: u8,
    ) -> Result<(), Ntag5Error> {
        if Partition::containing(addr) != Some(Partition::Session)
            || byte_index > mem::REG_BYTE_3
        {
            return Err(Ntag5Error::InvalidAddress);
        }

        let buf = [
            (addr >> 8) as u8,
            (addr & 0xFF) as u8,
            byte_index,
            mask,
            value,
        ];

        self.i2c
            .write(self.address, &buf)
            .map_err(|_| Ntag5Error::Bus)?;
        self.delay.delay_ms(WRITE_SETTLE_MS);

        Ok(())
    }

    /// Read one byte of a volatile session register
    pub fn read_session_reg(&mut self, addr: u16, byte_index: u8) -> Result<u8, Ntag5Error> {
        if Partition::containing(addr) != Some(Partition::Session)
            || byte_index > mem::REG_BYTE_3
        {
            return Err(Ntag5Error::InvalidAddress);
        }

        let buf = [(addr >> 8) as u8, (addr & 0xFF) as u8, byte_index];
        let mut out = [0u8; 1];

        self.i2c
            .write_read(self.address, &buf, &mut out)
            .map_err(|_| Ntag5Error::Bus)?;

        Ok(out[0])
    }

    /// Apply the power-up configuration
    ///
    /// Enables energy harvesting, the SRAM mailbox in pass-through mode, the
    /// ED line for NFC-to-I2C pass-through events and the watchdog, then
    /// leaves the transfer direction at NFC-to-I2C so the mailbox is ready
    /// to receive.
    pub fn configure(&mut self) -> Result<(), Ntag5Error> {
        self.write_session_reg(
            mem::SESSION_REG_CONFIG,
            mem::REG_BYTE_1,
            mem::PT_DIR_MASK,
            mem::PT_DIR_I2C_TO_NFC,
        )?;

        // 1.8V energy harvesting, ED event: NFC-to-I2C pass-through
        self.write_blocks(mem::CONFIG_EH_AND_ED_CONFIG, &[[0x21, 0x00, 0x04, 0x00]])?;

        self.write_blocks(
            mem::CONFIG_WDT_CFG_AND_SRAM_COPY,
            &[[0x08, 0x48, 0x01, 0x3F]],
        )?;

        self.write_blocks(mem::CONFIG_SYNC_DATA_BLOCK, &[[0x3F, 0x00, 0x00, 0x00]])?;

        let config = [
            mem::CONFIG_0_SRAM_COPY_ENABLE | mem::CONFIG_0_EH_LOW_FIELD_STR,
            mem::CONFIG_1_EH_ARBITER_MODE_EN
                | mem::CONFIG_1_ARBITER_SRAM_PT
                | mem::CONFIG_1_SRAM_ENABLE
                | mem::CONFIG_1_PT_TRANSFER_NFC_I2C,
            mem::CONFIG_2_GPIO1_IN_ENABLE
                | mem::CONFIG_2_GPIO1_IN_PULL_UP
                | mem::CONFIG_2_EXT_CMD_SUPPORT
                | mem::CONFIG_2_LOCK_BLK_CMD_SUPPORT
                | mem::CONFIG_2_GPIO1_HIGH_SLEW_RATE
                | mem::CONFIG_2_GPIO0_HIGH_SLEW_RATE,
            0x00,
        ];
        self.write_blocks(mem::CONFIG_CONFIG, &[config])?;

        self.write_session_reg(
            mem::SESSION_REG_CONFIG,
            mem::REG_BYTE_1,
            mem::PT_DIR_MASK,
            mem::PT_DIR_NFC_TO_I2C,
        )
    }

    /// Zero-fill the entire user memory
    pub fn format_user_memory(&mut self) -> Result<(), Ntag5Error> {
        for addr in mem::USER_MEMORY_START..=mem::USER_MEMORY_END {
            self.write_blocks(addr, &[[0u8; BLOCK_SIZE]])?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::BTreeMap;
    use std::vec::Vec;

    use embedded_hal::delay::DelayNs;
    use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

    /// In-memory NTAG 5 bus model
    ///
    /// Understands the four wire shapes the driver produces: 6-byte block
    /// write, 5-byte masked session write, 2+4 block read, 3+1 session read.
    pub struct FakeBus {
        pub mem: BTreeMap<u16, [u8; 4]>,
        pub transactions: usize,
        pub reads: Vec<u16>,
        pub fail_after: Option<usize>,
    }

    impl FakeBus {
        pub fn new() -> Self {
            Self {
                mem: BTreeMap::new(),
                transactions: 0,
                reads: Vec::new(),
                fail_after: None,
            }
        }

        pub fn block(&self, addr: u16) -> [u8; 4] {
            self.mem.get(&addr).copied().unwrap_or_default()
        }

        pub fn set_block(&mut self, addr: u16, block: [u8; 4]) {
            self.mem.insert(addr, block);
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            self.transactions += 1;
            if let Some(limit) = self.fail_after {
                if self.transactions > limit {
                    return Err(ErrorKind::Other);
                }
            }

            match operations {
                [Operation::Write(buf)] => {
                    let addr = u16::from_be_bytes([buf[0], buf[1]]);
                    match buf.len() {
                        6 => {
                            self.mem.insert(addr, [buf[2], buf[3], buf[4], buf[5]]);
                        }
                        5 => {
                            let (byte_index, mask, value) =
                                (buf[2] as usize, buf[3], buf[4]);
                            let mut block = self.block(addr);
                            block[byte_index] =
                                (block[byte_index] & !mask) | (value & mask);
                            self.mem.insert(addr, block);
                        }
                        n => panic!("unexpected write length {n}"),
                    }
                }
                [Operation::Write(wbuf), Operation::Read(rbuf)] => {
                    let addr = u16::from_be_bytes([wbuf[0], wbuf[1]]);
                    self.reads.push(addr);
                    match (wbuf.len(), rbuf.len()) {
                        (2, 4) => rbuf.copy_from_slice(&self.block(addr)),
                        (3, 1) => rbuf[0] = self.block(addr)[wbuf[2] as usize],
                        shape => panic!("unexpected write_read shape {shape:?}"),
                    }
                }
                _ => panic!("unexpected transaction shape"),
            }

            Ok(())
        }
    }

    /// Delay that just counts the requested time
    pub struct FakeDelay {
        pub total_ns: u64,
    }

    impl FakeDelay {
        pub fn new() -> Self {
            Self { total_ns: 0 }
        }
    }

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns as u64;
        }
    }

    pub fn tag() -> super::Ntag5<FakeBus, FakeDelay> {
        super::Ntag5::new(FakeBus::new(), FakeDelay::new())
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::tag;
    use super::*;

    fn bus_of<'a>(
        tag: &'a Ntag5<testutil::FakeBus, testutil::FakeDelay>,
    ) -> &'a testutil::FakeBus {
        &tag.i2c
    }

    #[test]
    fn test_partition_lookup() {
        assert_eq!(Partition::containing(0x0000), Some(Partition::User));
        assert_eq!(Partition::containing(0x01FF), Some(Partition::User));
        assert_eq!(Partition::containing(0x0200), None);
        assert_eq!(Partition::containing(0x1000), Some(Partition::Config));
        assert_eq!(Partition::containing(0x10A0), Some(Partition::Session));
        assert_eq!(Partition::containing(0x10B0), None);
        assert_eq!(Partition::containing(0x2000), Some(Partition::Sram));
        assert_eq!(Partition::containing(0x2040), None);
    }

    #[test]
    fn test_write_read_roundtrip() {
        let mut tag = tag();
        let blocks = [[1, 2, 3, 4], [5, 6, 7, 8]];
        tag.write_blocks(0x0010, &blocks).unwrap();

        let mut out = [[0u8; 4]; 2];
        tag.read_blocks(0x0010, &mut out).unwrap();
        assert_eq!(out, blocks);
    }

    #[test]
    fn test_partition_crossing_performs_no_io() {
        let mut tag = tag();

        // User memory ends at 0x01FF; writing 4 blocks from 0x01FE crosses out
        let blocks = [[0u8; 4]; 4];
        assert_eq!(
            tag.write_blocks(0x01FE, &blocks),
            Err(Ntag5Error::InvalidAddress)
        );

        // Config memory ends at 0x109F; reading into the session registers
        let mut out = [[0u8; 4]; 3];
        assert_eq!(
            tag.read_blocks(0x109E, &mut out),
            Err(Ntag5Error::InvalidAddress)
        );

        // Unmapped address
        assert_eq!(
            tag.write_blocks(0x0300, &[[0u8; 4]]),
            Err(Ntag5Error::InvalidAddress)
        );

        assert_eq!(bus_of(&tag).transactions, 0);
    }

    #[test]
    fn test_bus_failure_aborts_remaining_blocks() {
        let mut tag = tag();
        tag.i2c.fail_after = Some(1);

        let blocks = [[0xAAu8; 4]; 3];
        assert_eq!(tag.write_blocks(0x0000, &blocks), Err(Ntag5Error::Bus));

        // First write went through, second failed, third never attempted
        assert_eq!(bus_of(&tag).transactions, 2);
        assert_eq!(bus_of(&tag).block(0x0000), [0xAA; 4]);
        assert_eq!(bus_of(&tag).block(0x0002), [0x00; 4]);
    }

    #[test]
    fn test_session_reg_masked_write() {
        let mut tag = tag();
        tag.i2c.set_block(mem::SESSION_REG_CONFIG, [0x00, 0xF5, 0x00, 0x00]);

        tag.write_session_reg(mem::SESSION_REG_CONFIG, mem::REG_BYTE_1, 0x0F, 0xAA)
            .unwrap();

        // Only the masked low nibble changes
        assert_eq!(bus_of(&tag).block(mem::SESSION_REG_CONFIG)[1], 0xFA);

        let byte = tag
            .read_session_reg(mem::SESSION_REG_CONFIG, mem::REG_BYTE_1)
            .unwrap();
        assert_eq!(byte, 0xFA);
    }

    #[test]
    fn test_session_reg_bounds() {
        let mut tag = tag();

        assert_eq!(
            tag.write_session_reg(mem::SESSION_REG_CONFIG, 4, 0xFF, 0x00),
            Err(Ntag5Error::InvalidAddress)
        );
        assert_eq!(
            tag.write_session_reg(0x109F, mem::REG_BYTE_0, 0xFF, 0x00),
            Err(Ntag5Error::InvalidAddress)
        );
        assert_eq!(
            tag.read_session_reg(0x10B0, mem::REG_BYTE_0),
            Err(Ntag5Error::InvalidAddress)
        );

        assert_eq!(bus_of(&tag).transactions, 0);
    }

    #[test]
    fn test_write_settle_delay() {
        let mut tag = tag();
        tag.write_blocks(0x0000, &[[0u8; 4]; 3]).unwrap();
        // 5 ms after each of the three block writes
        assert_eq!(tag.delay.total_ns, 3 * 5_000_000);
    }

    #[test]
    fn test_configure_leaves_mailbox_receiving() {
        let mut tag = tag();
        tag.configure().unwrap();

        let config = bus_of(&tag).block(mem::CONFIG_CONFIG);
        assert_ne!(config[0] & mem::CONFIG_0_SRAM_COPY_ENABLE, 0);
        assert_ne!(config[1] & mem::CONFIG_1_SRAM_ENABLE, 0);

        // Transfer direction must end at NFC-to-I2C
        let dir = tag
            .read_session_reg(mem::SESSION_REG_CONFIG, mem::REG_BYTE_1)
            .unwrap();
        assert_eq!(dir & mem::PT_DIR_MASK, mem::PT_DIR_NFC_TO_I2C);
    }

    #[test]
    fn test_format_user_memory() {
        let mut tag = tag();
        tag.i2c.set_block(0x0042, [1, 2, 3, 4]);

        tag.format_user_memory().unwrap();

        assert_eq!(bus_of(&tag).block(0x0042), [0; 4]);
        assert_eq!(bus_of(&tag).transactions, 512);
    }
}
