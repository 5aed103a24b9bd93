//! qca7k-dummy - In-memory QCA7000 emulator for testing
//!
//! This crate provides a dummy chip that speaks the QCA7000 SPI protocol
//! entirely in memory: command words, the register file, and the framed
//! byte stream. It's useful for testing and development without real
//! hardware, and it is what the driver's behavior tests run against.
//!
//! The emulator is deliberately strict: reads or writes outside a
//! transaction, unbalanced chip-select brackets, and buffer overruns all
//! surface as [`Error::SpiTransferFailed`], so a driver bug fails tests
//! loudly instead of producing plausible garbage.

#![cfg_attr(not(feature = "std"), no_std)]

use heapless::{Deque, Vec};

use qca7k_core::error::{Error, Result};
use qca7k_core::regs::{
    Interrupts, Register, CMD_ADDR_MASK, CMD_INTERNAL, CMD_READ, CONFIG_SLAVE_RESET, SIGNATURE,
};
use qca7k_core::SpiBus;

/// Transmit capture capacity; one maximum envelope is 1532 bytes.
const TX_CAPACITY: usize = 2048;
/// Receive FIFO capacity; enough for a couple of maximum frames.
const RX_CAPACITY: usize = 4096;
/// How many `BfrSize` writes the emulator remembers for assertions.
const BFR_SIZE_LOG: usize = 16;

/// What the emulator returns for a signature read still in warm-up.
const SIGNATURE_JUNK: u16 = 0xFFFF;

/// Configuration for the dummy chip
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Write buffer capacity the chip advertises through `WrbufSpcAva`
    pub write_capacity: u16,
    /// How many signature reads return junk before the real value
    /// (models the unreliable first read after power-up)
    pub warmup_reads: u8,
    /// Value the signature register settles on
    pub signature: u16,
    /// Initial contents of the configuration register
    pub spi_config: u16,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            // Write buffer size of the real chip
            write_capacity: 3163,
            warmup_reads: 1,
            signature: SIGNATURE,
            spi_config: 0,
        }
    }
}

/// Where the current transaction stands in the command protocol.
#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Collecting the command word, high byte first.
    Cmd { hi: Option<u8> },
    /// Serving a register value, big-endian.
    RegOut { bytes: [u8; 2], sent: usize },
    /// Collecting a register value, big-endian.
    RegIn { reg: Option<Register>, hi: Option<u8> },
    /// External read: streaming the receive FIFO out.
    FrameOut,
    /// External write: capturing frame bytes.
    FrameIn,
    /// Register transfer complete; any further byte is a protocol bug.
    Done,
}

/// Emulated QCA7000 chip
///
/// Implements [`SpiBus`], so a [`qca7k_core::Qca7000`] drives it exactly
/// like real hardware. Frames the driver sends land in a transmit
/// capture; [`push_rx`](Self::push_rx) injects raw wire bytes (valid or
/// corrupted) for the driver to receive, and
/// [`loopback`](Self::loopback) feeds the capture back as input.
#[derive(Debug)]
pub struct DummyChip {
    config: DummyConfig,

    spi_config: u16,
    intr_cause: u16,
    intr_enable: u16,
    sig_warmup_left: u8,

    tx: Vec<u8, TX_CAPACITY>,
    rx: Deque<u8, RX_CAPACITY>,

    in_txn: bool,
    phase: Phase,

    // Instrumentation for protocol assertions
    begins: usize,
    ends: usize,
    cause_reads: usize,
    last_ack: Option<u16>,
    bfr_sizes: Vec<u16, BFR_SIZE_LOG>,
}

impl DummyChip {
    /// Create a new dummy chip with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            sig_warmup_left: config.warmup_reads,
            spi_config: config.spi_config,
            // The chip raises CPU_ON once it has booted
            intr_cause: Interrupts::CPU_ON.bits(),
            intr_enable: 0,
            config,
            tx: Vec::new(),
            rx: Deque::new(),
            in_txn: false,
            phase: Phase::Done,
            begins: 0,
            ends: 0,
            cause_reads: 0,
            last_ack: None,
            bfr_sizes: Vec::new(),
        }
    }

    /// Create a new dummy chip with the default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Everything the driver streamed as external-write frame data
    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx
    }

    /// Drop the transmit capture
    pub fn clear_tx(&mut self) {
        self.tx.clear();
    }

    /// Queue raw wire bytes for the driver to receive
    ///
    /// The bytes go in verbatim, so corrupted envelopes and inter-frame
    /// garbage are fair game. Raises the packet-available interrupt.
    pub fn push_rx(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.rx.push_back(b).is_err() {
                panic!("dummy receive FIFO overflow");
            }
        }
        if !bytes.is_empty() {
            self.intr_cause |= Interrupts::PKT_AVLBL.bits();
        }
    }

    /// Move the transmit capture into the receive FIFO
    pub fn loopback(&mut self) {
        let Self { tx, rx, .. } = self;
        for &b in tx.iter() {
            if rx.push_back(b).is_err() {
                panic!("dummy receive FIFO overflow");
            }
        }
        let moved = !tx.is_empty();
        tx.clear();
        if moved {
            self.intr_cause |= Interrupts::PKT_AVLBL.bits();
        }
    }

    /// Transactions opened so far
    pub fn begins(&self) -> usize {
        self.begins
    }

    /// Transactions closed so far
    pub fn ends(&self) -> usize {
        self.ends
    }

    /// How many times the cause register has been read
    pub fn cause_reads(&self) -> usize {
        self.cause_reads
    }

    /// Last value written to the cause register, i.e. the last acknowledge
    pub fn last_ack(&self) -> Option<u16> {
        self.last_ack
    }

    /// Every value written to `BfrSize`, in order
    pub fn bfr_size_writes(&self) -> &[u16] {
        &self.bfr_sizes
    }

    /// Current contents of the configuration register
    pub fn spi_config(&self) -> u16 {
        self.spi_config
    }

    /// Currently pending interrupt causes
    pub fn interrupt_cause(&self) -> u16 {
        self.intr_cause
    }

    /// Current interrupt enable mask
    pub fn interrupt_enable(&self) -> u16 {
        self.intr_enable
    }

    fn read_reg(&mut self, reg: Option<Register>) -> u16 {
        match reg {
            Some(Register::WrbufSpcAva) => {
                self.config.write_capacity.saturating_sub(self.tx.len() as u16)
            }
            Some(Register::RdbufByteAva) => self.rx.len() as u16,
            Some(Register::SpiConfig) => self.spi_config,
            Some(Register::IntrCause) => {
                self.cause_reads += 1;
                self.intr_cause
            }
            Some(Register::IntrEnable) => self.intr_enable,
            Some(Register::Signature) => {
                if self.sig_warmup_left > 0 {
                    self.sig_warmup_left -= 1;
                    SIGNATURE_JUNK
                } else {
                    self.config.signature
                }
            }
            // BfrSize is write-only, unknown addresses read as zero
            _ => 0,
        }
    }

    fn write_reg(&mut self, reg: Option<Register>, value: u16) {
        match reg {
            Some(Register::BfrSize) => {
                let _ = self.bfr_sizes.push(value);
            }
            Some(Register::SpiConfig) => {
                if value & CONFIG_SLAVE_RESET != 0 {
                    log::trace!("dummy chip: soft reset");
                    // The reset bit self-clears; everything else sticks.
                    self.spi_config = value & !CONFIG_SLAVE_RESET;
                    self.tx.clear();
                    self.rx.clear();
                    self.sig_warmup_left = self.config.warmup_reads;
                    self.intr_cause |= Interrupts::CPU_ON.bits();
                } else {
                    self.spi_config = value;
                }
            }
            Some(Register::IntrCause) => {
                // Write-to-acknowledge: exactly the written bits clear.
                self.last_ack = Some(value);
                self.intr_cause &= !value;
            }
            Some(Register::IntrEnable) => self.intr_enable = value,
            // Writes to read-only registers are dropped on the floor
            _ => {}
        }
    }
}

impl SpiBus for DummyChip {
    fn begin(&mut self) -> Result<()> {
        if self.in_txn {
            return Err(Error::SpiTransferFailed);
        }
        self.in_txn = true;
        self.begins += 1;
        self.phase = Phase::Cmd { hi: None };
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if !self.in_txn {
            return Err(Error::SpiTransferFailed);
        }
        self.in_txn = false;
        self.ends += 1;
        self.phase = Phase::Done;
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        if !self.in_txn {
            return Err(Error::SpiTransferFailed);
        }
        match self.phase {
            Phase::Cmd { hi: None } => {
                self.phase = Phase::Cmd { hi: Some(byte) };
            }
            Phase::Cmd { hi: Some(hi) } => {
                let cmd = u16::from_be_bytes([hi, byte]);
                let read = cmd & CMD_READ != 0;
                let internal = cmd & CMD_INTERNAL != 0;
                let reg = Register::from_addr(cmd & CMD_ADDR_MASK);
                self.phase = match (read, internal) {
                    (true, true) => Phase::RegOut {
                        bytes: self.read_reg(reg).to_be_bytes(),
                        sent: 0,
                    },
                    (false, true) => Phase::RegIn { reg, hi: None },
                    (true, false) => Phase::FrameOut,
                    (false, false) => Phase::FrameIn,
                };
            }
            Phase::RegIn { reg, hi: None } => {
                self.phase = Phase::RegIn {
                    reg,
                    hi: Some(byte),
                };
            }
            Phase::RegIn { reg, hi: Some(hi) } => {
                self.write_reg(reg, u16::from_be_bytes([hi, byte]));
                self.phase = Phase::Done;
            }
            Phase::FrameIn => {
                if self.tx.len() >= self.config.write_capacity as usize
                    || self.tx.push(byte).is_err()
                {
                    return Err(Error::SpiTransferFailed);
                }
            }
            // Writing during a read phase or past a finished register
            // transfer is a driver bug.
            _ => return Err(Error::SpiTransferFailed),
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8> {
        if !self.in_txn {
            return Err(Error::SpiTransferFailed);
        }
        match self.phase {
            Phase::RegOut { bytes, sent } if sent < 2 => {
                self.phase = Phase::RegOut {
                    bytes,
                    sent: sent + 1,
                };
                Ok(bytes[sent])
            }
            Phase::FrameOut => self.rx.pop_front().ok_or(Error::SpiTransferFailed),
            _ => Err(Error::SpiTransferFailed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qca7k_core::framing::{FRAME_MAX, FRAME_MIN, FRAME_OVERHEAD};
    use qca7k_core::{Qca7000, RecvState, RecvStatus};

    /// Builds a well-formed wire envelope for `payload`.
    fn wire(payload: &[u8]) -> std::vec::Vec<u8> {
        let padded = payload.len().max(FRAME_MIN);
        let mut out = std::vec::Vec::with_capacity(padded + FRAME_OVERHEAD);
        out.extend_from_slice(&[0xAA; 4]);
        out.extend_from_slice(&(padded as u16).to_le_bytes());
        out.extend_from_slice(&[0x00; 2]);
        out.extend_from_slice(payload);
        out.resize(8 + padded, 0x00);
        out.extend_from_slice(&[0x55; 2]);
        out
    }

    fn pattern(len: usize) -> std::vec::Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Drives `recv` until a frame completes.
    fn recv_frame(chip: &mut Qca7000<DummyChip>, buf: &mut [u8]) -> usize {
        for _ in 0..32 {
            match chip.recv(buf).unwrap() {
                RecvStatus::Frame(len) => return len,
                RecvStatus::InProgress(_) => {}
            }
        }
        panic!("no frame after 32 recv calls");
    }

    #[test]
    fn test_round_trip_pads_short_payload() {
        let mut chip = Qca7000::new(DummyChip::new_default());
        let payload = pattern(10);
        chip.send(&payload).unwrap();

        chip.bus_mut().loopback();

        let mut buf = [0u8; FRAME_MAX];
        let len = recv_frame(&mut chip, &mut buf);
        assert_eq!(len, FRAME_MIN);
        assert_eq!(&buf[..10], &payload[..]);
        assert!(buf[10..FRAME_MIN].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_round_trip_min_and_max_payloads() {
        for len in [FRAME_MIN, 100, FRAME_MAX] {
            let mut chip = Qca7000::new(DummyChip::new_default());
            let payload = pattern(len);
            chip.send(&payload).unwrap();
            chip.bus_mut().loopback();

            let mut buf = [0u8; FRAME_MAX];
            assert_eq!(recv_frame(&mut chip, &mut buf), len);
            assert_eq!(&buf[..len], &payload[..]);
        }
    }

    #[test]
    fn test_second_frame_waits_for_next_call() {
        let first = pattern(80);
        let second: std::vec::Vec<u8> = (0..70).map(|i| 255 - i as u8).collect();

        let mut bus = DummyChip::new_default();
        bus.push_rx(&wire(&first));
        bus.push_rx(&wire(&second));
        let mut chip = Qca7000::new(bus);

        // Both frames are advertised at once, but recv stops at the first
        // completed envelope and leaves the rest buffered.
        let mut buf = [0u8; FRAME_MAX];
        assert_eq!(recv_frame(&mut chip, &mut buf), 80);
        assert_eq!(&buf[..80], &first[..]);

        assert_eq!(recv_frame(&mut chip, &mut buf), 70);
        assert_eq!(&buf[..70], &second[..]);
    }

    #[test]
    fn test_resync_after_corrupted_eof() {
        let lost = pattern(64);
        let good = pattern(90);

        let mut corrupted = wire(&lost);
        let eof_at = corrupted.len() - 2;
        corrupted[eof_at] = 0x13;

        let mut bus = DummyChip::new_default();
        bus.push_rx(&corrupted);
        bus.push_rx(&wire(&good));
        let mut chip = Qca7000::new(bus);

        let mut buf = [0u8; FRAME_MAX];
        assert_eq!(recv_frame(&mut chip, &mut buf), 90);
        assert_eq!(&buf[..90], &good[..]);
    }

    #[test]
    fn test_resync_after_corrupted_reserved() {
        let lost = pattern(64);
        let good = pattern(90);

        let mut corrupted = wire(&lost);
        corrupted[6] = 0xFE; // first reserved byte

        let mut bus = DummyChip::new_default();
        bus.push_rx(&corrupted);
        bus.push_rx(&wire(&good));
        let mut chip = Qca7000::new(bus);

        let mut buf = [0u8; FRAME_MAX];
        assert_eq!(recv_frame(&mut chip, &mut buf), 90);
        assert_eq!(&buf[..90], &good[..]);
    }

    #[test]
    fn test_missing_eof_reexamines_next_sof() {
        // The first envelope loses its EOF entirely; the next frame's SOF
        // run starts right where 0x55 was expected. The rejected byte is
        // itself the first 0xAA and must not be swallowed.
        let lost = pattern(64);
        let good = pattern(90);

        let mut stream = wire(&lost);
        stream.truncate(stream.len() - 2);
        stream.extend_from_slice(&wire(&good));

        let mut bus = DummyChip::new_default();
        bus.push_rx(&stream);
        let mut chip = Qca7000::new(bus);

        let mut buf = [0u8; FRAME_MAX];
        assert_eq!(recv_frame(&mut chip, &mut buf), 90);
        assert_eq!(&buf[..90], &good[..]);
    }

    #[test]
    fn test_buffer_switch_discards_partial_frame() {
        let payload = pattern(100);
        let envelope = wire(&payload);

        let mut bus = DummyChip::new_default();
        // Only the header so far; the payload is still in flight.
        bus.push_rx(&envelope[..8]);
        let mut chip = Qca7000::new(bus);

        let mut buf_a = [0u8; FRAME_MAX];
        assert_eq!(
            chip.recv(&mut buf_a).unwrap(),
            RecvStatus::InProgress(RecvState::Payload)
        );

        // A different buffer abandons the partial frame; a fresh envelope
        // then parses from scratch on the same driver.
        chip.bus_mut().push_rx(&envelope);
        let mut buf_b = [0u8; FRAME_MAX];
        assert_eq!(recv_frame(&mut chip, &mut buf_b), 100);
        assert_eq!(&buf_b[..100], &payload[..]);
    }

    #[test]
    fn test_recv_after_success_starts_fresh() {
        let payload = pattern(FRAME_MIN);

        let mut bus = DummyChip::new_default();
        bus.push_rx(&wire(&payload));
        bus.push_rx(&wire(&payload));
        let mut chip = Qca7000::new(bus);

        let mut buf = [0u8; FRAME_MAX];
        assert_eq!(recv_frame(&mut chip, &mut buf), FRAME_MIN);
        // Same buffer again: the terminal state resets instead of
        // continuing stale progress.
        assert_eq!(recv_frame(&mut chip, &mut buf), FRAME_MIN);
        assert_eq!(&buf[..FRAME_MIN], &payload[..]);
    }

    #[test]
    fn test_recv_empty_read_buffer() {
        let mut chip = Qca7000::new(DummyChip::new_default());
        let mut buf = [0u8; FRAME_MAX];
        assert_eq!(chip.recv(&mut buf), Err(Error::EmptyReadBuffer));

        let bus = chip.into_inner();
        // Only the byte-available query ran, and it closed its transaction.
        assert_eq!(bus.begins(), 1);
        assert_eq!(bus.ends(), 1);
    }

    #[test]
    fn test_admission_control_leaves_wire_untouched() {
        let mut chip = Qca7000::new(DummyChip::new(DummyConfig {
            write_capacity: 10,
            ..DummyConfig::default()
        }));

        assert_eq!(
            chip.send(&pattern(10)),
            Err(Error::WriteBufferInsufficient {
                needed: 70,
                available: 10
            })
        );

        let bus = chip.into_inner();
        assert!(bus.tx_bytes().is_empty());
        assert!(bus.bfr_size_writes().is_empty());
        assert_eq!(bus.begins(), bus.ends());
    }

    #[test]
    fn test_end_to_end_wire_bytes() {
        let mut chip = Qca7000::new(DummyChip::new_default());
        let payload: std::vec::Vec<u8> = (1..=10).collect();
        chip.send(&payload).unwrap();

        let bus = chip.into_inner();
        assert_eq!(bus.bfr_size_writes(), &[70]);

        let mut expected = std::vec::Vec::new();
        expected.extend_from_slice(&[0xAA, 0xAA, 0xAA, 0xAA]);
        expected.extend_from_slice(&[0x3C, 0x00]); // 60, little-endian
        expected.extend_from_slice(&[0x00, 0x00]);
        expected.extend_from_slice(&payload);
        expected.extend_from_slice(&[0x00; 50]);
        expected.extend_from_slice(&[0x55, 0x55]);
        assert_eq!(bus.tx_bytes(), &expected[..]);
    }

    #[test]
    fn test_ack_protocol() {
        let mut bus = DummyChip::new_default();
        bus.push_rx(&wire(&pattern(FRAME_MIN)));
        let mut chip = Qca7000::new(bus);

        let reasons = chip.interrupt_reasons().unwrap();
        assert_eq!(reasons, Interrupts::CPU_ON | Interrupts::PKT_AVLBL);

        let bus = chip.into_inner();
        assert_eq!(bus.cause_reads(), 1);
        assert_eq!(bus.last_ack(), Some(reasons.bits()));
        // Acknowledge cleared exactly the reported causes...
        assert_eq!(bus.interrupt_cause(), 0);
        // ...and interrupts stay disabled until the caller re-arms.
        assert_eq!(bus.interrupt_enable(), 0);
    }

    #[test]
    fn test_startup_tolerates_one_junk_signature_read() {
        let mut chip = Qca7000::new(DummyChip::new_default());
        chip.startup().unwrap();
        assert_eq!(
            chip.into_inner().interrupt_enable(),
            Interrupts::all().bits()
        );
    }

    #[test]
    fn test_startup_rejects_wrong_signature() {
        let mut chip = Qca7000::new(DummyChip::new(DummyConfig {
            signature: 0xBEEF,
            ..DummyConfig::default()
        }));
        assert_eq!(chip.startup(), Err(Error::BadSignature { found: 0xBEEF }));
        assert_eq!(chip.into_inner().interrupt_enable(), 0);
    }

    #[test]
    fn test_soft_reset_preserves_config_and_restarts_chip() {
        let mut bus = DummyChip::new(DummyConfig {
            spi_config: 0x0123,
            ..DummyConfig::default()
        });
        bus.push_rx(&wire(&pattern(FRAME_MIN)));
        let mut chip = Qca7000::new(bus);
        chip.startup().unwrap();
        chip.interrupt_reasons().unwrap();

        chip.soft_reset().unwrap();

        // Undocumented bits survive the read-modify-write.
        assert_eq!(chip.bus_mut().spi_config(), 0x0123);
        // The chip came back: FIFOs empty, CPU_ON raised, signature
        // warm-up starts over, so a fresh startup still succeeds.
        assert_eq!(chip.bus_mut().interrupt_cause(), Interrupts::CPU_ON.bits());
        let mut buf = [0u8; FRAME_MAX];
        assert_eq!(chip.recv(&mut buf), Err(Error::EmptyReadBuffer));
        chip.startup().unwrap();
    }

    #[test]
    fn test_interrupt_mask_ops_preserve_unknown_bits() {
        let mut chip = Qca7000::new(DummyChip::new_default());

        chip.set_interrupt_mask(Interrupts::from_bits_retain(0x8000))
            .unwrap();
        chip.enable_interrupts(Interrupts::PKT_AVLBL).unwrap();
        assert_eq!(chip.interrupt_mask().unwrap().bits(), 0x8001);

        chip.disable_interrupts(Interrupts::PKT_AVLBL).unwrap();
        assert_eq!(chip.interrupt_mask().unwrap().bits(), 0x8000);
    }

    /// Delegates to a [`DummyChip`] but fails `read_byte` after a budget
    /// of successful reads, for exercising error paths mid-transfer.
    struct FailingBus {
        chip: DummyChip,
        reads_left: usize,
    }

    impl SpiBus for FailingBus {
        fn begin(&mut self) -> Result<()> {
            self.chip.begin()
        }

        fn end(&mut self) -> Result<()> {
            self.chip.end()
        }

        fn write_byte(&mut self, byte: u8) -> Result<()> {
            self.chip.write_byte(byte)
        }

        fn read_byte(&mut self) -> Result<u8> {
            if self.reads_left == 0 {
                return Err(Error::SpiTransferFailed);
            }
            self.reads_left -= 1;
            self.chip.read_byte()
        }
    }

    #[test]
    fn test_chip_select_released_after_midframe_bus_error() {
        let mut inner = DummyChip::new_default();
        inner.push_rx(&wire(&pattern(FRAME_MIN)));
        // Budget covers the byte-available register and two frame bytes,
        // then the bus dies mid-stream.
        let mut chip = Qca7000::new(FailingBus {
            chip: inner,
            reads_left: 4,
        });

        let mut buf = [0u8; FRAME_MAX];
        assert_eq!(chip.recv(&mut buf), Err(Error::SpiTransferFailed));

        let bus = chip.into_inner();
        assert_eq!(bus.chip.begins(), bus.chip.ends());
    }
}
