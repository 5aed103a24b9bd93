//! Frame envelope and receive state machine
//!
//! Frames cross the SPI link wrapped in a sentinel-delimited envelope:
//!
//! ```text
//! AA AA AA AA | len_lo len_hi | 00 00 | payload ... | 55 55
//! ```
//!
//! The length field counts the payload after zero-padding to [`FRAME_MIN`]
//! and is little-endian, unlike register values. The receiver is an
//! incremental state machine: it consumes whatever bytes the chip has
//! buffered, suspends mid-frame when they run out, and resumes on the next
//! call. A byte that breaks the expected envelope throws the machine back
//! to hunting for start-of-frame sentinels, so corrupted input costs at
//! most the damaged frame.

/// Start-of-frame sentinel byte; four in a row open an envelope.
pub const SOF: u8 = 0xAA;
/// Filler byte of the reserved header field.
pub const RESERVED: u8 = 0x00;
/// End-of-frame sentinel byte; two close an envelope.
pub const EOF: u8 = 0x55;

/// Minimum payload length; shorter payloads go out zero-padded to this.
pub const FRAME_MIN: usize = 60;
/// Maximum payload length accepted in either direction.
pub const FRAME_MAX: usize = 1522;
/// Envelope bytes around the payload: SOF (4) + length (2) + reserved (2) + EOF (2).
pub const FRAME_OVERHEAD: usize = SOF_LEN + LEN_FIELD_LEN + RESERVED_LEN + EOF_LEN;

pub(crate) const SOF_LEN: usize = 4;
pub(crate) const LEN_FIELD_LEN: usize = 2;
pub(crate) const RESERVED_LEN: usize = 2;
pub(crate) const EOF_LEN: usize = 2;

/// Total bytes a payload occupies on the wire, padding and envelope
/// included. Also the value the transmit path writes to the transfer-size
/// register.
pub const fn wire_len(payload_len: usize) -> usize {
    let padded = if payload_len < FRAME_MIN {
        FRAME_MIN
    } else {
        payload_len
    };
    FRAME_OVERHEAD + padded
}

/// Stage the receiver is parked in while a frame is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvState {
    /// Hunting for the four start-of-frame sentinel bytes.
    Sof,
    /// Collecting the two length bytes.
    Len,
    /// Collecting the two reserved bytes.
    Reserved,
    /// Copying payload into the caller's buffer.
    Payload,
    /// Expecting the two end-of-frame sentinel bytes.
    Eof,
}

/// Outcome of a receive call that found bytes to work on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStatus {
    /// A whole frame landed in the buffer; the payload is this many bytes.
    Frame(usize),
    /// The chip ran out of bytes mid-frame; the next call resumes here.
    InProgress(RecvState),
}

/// What feeding one byte did to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Byte consumed, frame still incomplete.
    More,
    /// Byte completed a frame of this payload length.
    Frame(usize),
    /// The machine was fed past a terminal state.
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Sof,
    Len,
    Reserved,
    Payload,
    Eof,
    /// A frame just completed; rebind before feeding again.
    Done,
    /// Fed past a terminal state; driver bug.
    Fault,
}

/// Incremental receive state machine.
///
/// One lives inside each driver value; all parser state sits here rather
/// than in statics, so drivers for several chips never clobber each
/// other's progress.
#[derive(Debug)]
pub(crate) struct FrameDecoder {
    state: State,
    /// Bytes still owed to the current state.
    remaining: usize,
    /// Sentinel the current state expects; meaningful in Sof/Reserved/Eof.
    expect: u8,
    /// Raw wire bytes of the length field.
    len_bytes: [u8; LEN_FIELD_LEN],
    /// Decoded payload length, valid once the Len state completes.
    frame_len: u16,
    /// Write cursor into the bound buffer.
    written: usize,
    /// Identity of the bound destination buffer; None before first use.
    bound: Option<usize>,
    /// A rejected byte waiting to be re-examined as a SOF candidate.
    pending: Option<u8>,
}

impl FrameDecoder {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Sof,
            remaining: SOF_LEN,
            expect: SOF,
            len_bytes: [0; LEN_FIELD_LEN],
            frame_len: 0,
            written: 0,
            bound: None,
            pending: None,
        }
    }

    /// Points the machine at the buffer identified by `buf_id`.
    ///
    /// Parsing restarts from scratch on first use, when the caller hands
    /// in a different buffer than last time, and on the first call after a
    /// terminal state; otherwise an in-flight frame keeps its progress.
    pub(crate) fn bind(&mut self, buf_id: usize) {
        let stale =
            self.bound != Some(buf_id) || matches!(self.state, State::Done | State::Fault);
        if stale {
            self.bound = Some(buf_id);
            self.pending = None;
            self.restart();
        }
    }

    /// Takes the parked lookahead byte, if any.
    ///
    /// Callers drain this before clocking fresh bytes; a parked byte never
    /// counts against the chip's advertised byte total.
    pub(crate) fn take_pending(&mut self) -> Option<u8> {
        self.pending.take()
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Public name of the current stage. Terminal states report `Sof`
    /// since that is where the next call restarts.
    pub(crate) fn stage(&self) -> RecvState {
        match self.state {
            State::Sof | State::Done | State::Fault => RecvState::Sof,
            State::Len => RecvState::Len,
            State::Reserved => RecvState::Reserved,
            State::Payload => RecvState::Payload,
            State::Eof => RecvState::Eof,
        }
    }

    /// Feeds one byte through the machine, copying payload into `buf`.
    ///
    /// `buf` must hold [`FRAME_MAX`] bytes; the cursor never moves past
    /// that (oversized length fields are rejected before the payload
    /// stage).
    pub(crate) fn feed(&mut self, byte: u8, buf: &mut [u8]) -> Step {
        match self.state {
            State::Sof | State::Reserved | State::Eof => {
                if byte != self.expect {
                    let hunting = self.state == State::Sof;
                    if !hunting {
                        log::debug!(
                            "frame resync: got 0x{:02X} in {:?}, expected 0x{:02X}",
                            byte,
                            self.state,
                            self.expect
                        );
                    }
                    self.restart();
                    if !hunting {
                        // A mid-envelope mismatch may itself be the first
                        // SOF byte of a real frame; look at it again.
                        self.pending = Some(byte);
                    }
                    return Step::More;
                }
            }
            State::Len => {
                self.len_bytes[LEN_FIELD_LEN - self.remaining] = byte;
            }
            State::Payload => {
                buf[self.written] = byte;
                self.written += 1;
            }
            State::Done | State::Fault => {
                // Feeding a terminal machine means the driver skipped the
                // rebind; refuse to touch the buffer again.
                self.bound = None;
                self.pending = None;
                self.restart();
                self.state = State::Fault;
                return Step::Fault;
            }
        }

        self.remaining -= 1;
        if self.remaining > 0 {
            return Step::More;
        }
        self.advance()
    }

    /// Moves to the next stage once the current one is paid off.
    fn advance(&mut self) -> Step {
        match self.state {
            State::Sof => {
                self.state = State::Len;
                self.remaining = LEN_FIELD_LEN;
            }
            State::Len => {
                self.frame_len = u16::from_le_bytes(self.len_bytes);
                if self.frame_len as usize > FRAME_MAX {
                    // Not a real frame; back to hunting before the cursor
                    // can run off the buffer.
                    log::debug!(
                        "frame resync: length field {} exceeds the maximum",
                        self.frame_len
                    );
                    self.restart();
                    return Step::More;
                }
                self.state = State::Reserved;
                self.remaining = RESERVED_LEN;
                self.expect = RESERVED;
            }
            State::Reserved => {
                self.written = 0;
                if self.frame_len == 0 {
                    // Nothing to copy; the closing sentinel comes next.
                    self.state = State::Eof;
                    self.remaining = EOF_LEN;
                    self.expect = EOF;
                } else {
                    self.state = State::Payload;
                    self.remaining = self.frame_len as usize;
                }
            }
            State::Payload => {
                self.state = State::Eof;
                self.remaining = EOF_LEN;
                self.expect = EOF;
            }
            State::Eof => {
                let len = self.written;
                self.restart();
                self.state = State::Done;
                return Step::Frame(len);
            }
            // Terminal states return from feed() before reaching here.
            State::Done | State::Fault => {}
        }
        Step::More
    }

    /// Back to hunting start-of-frame, keeping the buffer binding.
    fn restart(&mut self) {
        self.state = State::Sof;
        self.remaining = SOF_LEN;
        self.expect = SOF;
        self.len_bytes = [0; LEN_FIELD_LEN];
        self.frame_len = 0;
        self.written = 0;
    }
}
