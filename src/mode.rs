use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::BlowfishError;

/// Block cipher mode of operation. The numeric ids are stable.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Ecb = 1,
    Cbc = 2,
    Cfb = 3,
    Ofb = 4,
    Ctr = 5,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Ecb, Mode::Cbc, Mode::Cfb, Mode::Ofb, Mode::Ctr];

    /// ECB and CBC operate on whole blocks; the others produce a keystream.
    pub fn requires_full_blocks(self) -> bool {
        matches!(self, Mode::Ecb | Mode::Cbc)
    }

    pub fn requires_iv(self) -> bool {
        self != Mode::Ecb
    }

    /// Blocks can be processed independently given only their offset in the stream.
    pub fn is_parallel_safe(self) -> bool {
        matches!(self, Mode::Ecb | Mode::Ctr)
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Ecb => "ECB",
            Mode::Cbc => "CBC",
            Mode::Cfb => "CFB",
            Mode::Ofb => "OFB",
            Mode::Ctr => "CTR",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Mode::Ecb => "Electronic codebook",
            Mode::Cbc => "Cipher block chaining",
            Mode::Cfb => "Cipher feedback",
            Mode::Ofb => "Output feedback",
            Mode::Ctr => "Counter",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Mode {
    type Error = BlowfishError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Mode::ALL
            .into_iter()
            .find(|m| *m as u8 == id)
            .ok_or(BlowfishError::InvalidMode)
    }
}

impl FromStr for Mode {
    type Err = BlowfishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or(BlowfishError::InvalidMode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mode_ids() {
        for mode in Mode::ALL {
            assert_eq!(Mode::try_from(mode as u8), Ok(mode));
        }
        assert_eq!(Mode::try_from(0), Err(BlowfishError::InvalidMode));
        assert_eq!(Mode::try_from(6), Err(BlowfishError::InvalidMode));
    }

    #[test]
    fn test_mode_names() {
        assert_eq!("ctr".parse::<Mode>(), Ok(Mode::Ctr));
        assert_eq!("CbC".parse::<Mode>(), Ok(Mode::Cbc));
        assert_eq!("gcm".parse::<Mode>(), Err(BlowfishError::InvalidMode));
        assert_eq!(Mode::Ofb.to_string(), "OFB");
    }

    #[test]
    fn test_mode_properties() {
        let parallel: Vec<Mode> = Mode::ALL
            .into_iter()
            .filter(|m| m.is_parallel_safe())
            .collect();
        assert_eq!(parallel, vec![Mode::Ecb, Mode::Ctr]);
        assert!(Mode::Cbc.requires_full_blocks());
        assert!(!Mode::Cfb.requires_full_blocks());
        assert!(!Mode::Ecb.requires_iv());
    }
}
