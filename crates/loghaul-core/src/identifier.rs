//! Time-sortable record identifiers
//!
//! Records are stamped with an [xid](https://github.com/rs/xid): 12 bytes rendered as 20
//! lower-case base32hex characters.
//!
//! ```text
//! +-------------------+--------------+-------------+---------------+
//! | Unix seconds (4)  | machine (3)  | pid (2)     | counter (3)   |
//! +-------------------+--------------+-------------+---------------+
//!   big-endian                                       big-endian
//! ```
//!
//! The leading timestamp is all the finder needs: it says which segment the record was
//! written into without consulting any index.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::{Error, Result};

/// Length of the raw identifier.
pub const RAW_LEN: usize = 12;

/// Length of the textual form.
pub const ENCODED_LEN: usize = 20;

const ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

/// Decoding table, `0xff` marks characters outside the alphabet.
const DECODE: [u8; 256] = {
    let mut table = [0xffu8; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// A 12-byte globally unique identifier whose first four bytes are its creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier([u8; RAW_LEN]);

struct Generator {
    machine: [u8; 3],
    pid: u16,
    counter: AtomicU32,
}

fn generator() -> &'static Generator {
    static GENERATOR: OnceLock<Generator> = OnceLock::new();
    GENERATOR.get_or_init(|| {
        let mut rng = rand::thread_rng();
        Generator {
            machine: rng.gen(),
            pid: std::process::id() as u16,
            counter: AtomicU32::new(rng.gen()),
        }
    })
}

impl Identifier {
    /// Generate a fresh identifier stamped with the current time.
    pub fn new() -> Self {
        Self::with_time(Utc::now())
    }

    /// Generate a fresh identifier stamped with `time` (truncated to whole seconds).
    pub fn with_time(time: DateTime<Utc>) -> Self {
        let gen = generator();
        let counter = gen.counter.fetch_add(1, Ordering::Relaxed);
        Self::from_parts(time.timestamp() as u32, gen.machine, gen.pid, counter)
    }

    /// Build an identifier from its components. Only the low 24 bits of `counter` are kept.
    pub fn from_parts(unix_secs: u32, machine: [u8; 3], pid: u16, counter: u32) -> Self {
        let mut raw = [0u8; RAW_LEN];
        raw[0..4].copy_from_slice(&unix_secs.to_be_bytes());
        raw[4..7].copy_from_slice(&machine);
        raw[7..9].copy_from_slice(&pid.to_be_bytes());
        raw[9..12].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(raw)
    }

    pub fn from_bytes(raw: [u8; RAW_LEN]) -> Self {
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; RAW_LEN] {
        &self.0
    }

    /// Parse the 20-character textual form.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidIdentifier {
            id: s.to_string(),
            reason,
        };

        if s.len() != ENCODED_LEN {
            return Err(invalid("expected 20 characters"));
        }

        let mut raw = [0u8; RAW_LEN];
        let mut acc: u32 = 0;
        let mut bits = 0u32;
        let mut out = 0usize;
        for &c in s.as_bytes() {
            let value = DECODE[c as usize];
            if value == 0xff {
                return Err(invalid("character outside base32hex alphabet"));
            }
            acc = (acc << 5) | u32::from(value);
            bits += 5;
            if bits >= 8 {
                bits -= 8;
                raw[out] = (acc >> bits) as u8;
                out += 1;
                acc &= (1 << bits) - 1;
            }
        }

        // 20 * 5 = 100 bits, 96 used; the 4 leftover bits are padding.
        if acc != 0 {
            return Err(invalid("non-zero trailing bits"));
        }

        Ok(Self(raw))
    }

    /// Creation time in whole seconds.
    pub fn unix_secs(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Creation time as a UTC timestamp.
    pub fn time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(i64::from(self.unix_secs()), 0).unwrap_or_default()
    }

    pub fn machine(&self) -> [u8; 3] {
        [self.0[4], self.0[5], self.0[6]]
    }

    pub fn pid(&self) -> u16 {
        u16::from_be_bytes([self.0[7], self.0[8]])
    }

    pub fn counter(&self) -> u32 {
        u32::from_be_bytes([0, self.0[9], self.0[10], self.0[11]])
    }

    fn encode(&self) -> [u8; ENCODED_LEN] {
        let mut out = [0u8; ENCODED_LEN];
        let mut acc: u32 = 0;
        let mut bits = 0u32;
        let mut idx = 0usize;
        for &b in &self.0 {
            acc = (acc << 8) | u32::from(b);
            bits += 8;
            while bits >= 5 {
                bits -= 5;
                out[idx] = ALPHABET[((acc >> bits) & 0x1f) as usize];
                idx += 1;
            }
            acc &= (1 << bits) - 1;
        }
        // 96 bits leave 1 bit over, shifted into the top of the last character.
        out[idx] = ALPHABET[((acc << (5 - bits)) & 0x1f) as usize];
        out
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.encode();
        // ALPHABET is ASCII
        f.write_str(std::str::from_utf8(&encoded).map_err(|_| fmt::Error)?)
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
