//! Error types and the stable numeric return codes mirrored by the binary's exit status.

use thiserror::Error;

/// Errors produced by the Blowfish library.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlowfishError {
    /// The context has been torn down, or a required argument is absent.
    #[error("invalid parameter")]
    InvalidParameter,

    /// Key length is outside [4, 56] bytes.
    #[error("invalid key length {len}, expected 4 to 56 bytes")]
    InvalidKey { len: usize },

    /// The key schedule produced a degenerate S-box.
    #[error("weak key")]
    WeakKey,

    /// Buffer or IV length does not fit the mode.
    #[error("bad buffer length {len}")]
    BadBufferLength { len: usize },

    /// Mode identifier is not one of ECB, CBC, CFB, OFB, CTR.
    #[error("invalid mode")]
    InvalidMode,

    /// A known-answer vector did not reproduce.
    #[error("self-test failed at vector {index}")]
    TestFailed { index: usize },
}

/// Closed set of outcomes. Discriminants are stable and double as process exit codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Success = 0,
    InvalidParameter = 1,
    InvalidKey = 2,
    WeakKey = 3,
    BadBufferLength = 4,
    InvalidMode = 5,
    TestFailed = 6,
}

impl ReturnCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == ReturnCode::Success
    }
}

impl From<&BlowfishError> for ReturnCode {
    fn from(err: &BlowfishError) -> Self {
        match err {
            BlowfishError::InvalidParameter => ReturnCode::InvalidParameter,
            BlowfishError::InvalidKey { .. } => ReturnCode::InvalidKey,
            BlowfishError::WeakKey => ReturnCode::WeakKey,
            BlowfishError::BadBufferLength { .. } => ReturnCode::BadBufferLength,
            BlowfishError::InvalidMode => ReturnCode::InvalidMode,
            BlowfishError::TestFailed { .. } => ReturnCode::TestFailed,
        }
    }
}

impl From<BlowfishError> for ReturnCode {
    fn from(err: BlowfishError) -> Self {
        ReturnCode::from(&err)
    }
}

impl<T> From<&Result<T, BlowfishError>> for ReturnCode {
    fn from(res: &Result<T, BlowfishError>) -> Self {
        match res {
            Ok(_) => ReturnCode::Success,
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ReturnCode::Success.code(), 0);
        assert_eq!(ReturnCode::InvalidParameter.code(), 1);
        assert_eq!(ReturnCode::InvalidKey.code(), 2);
        assert_eq!(ReturnCode::WeakKey.code(), 3);
        assert_eq!(ReturnCode::BadBufferLength.code(), 4);
        assert_eq!(ReturnCode::InvalidMode.code(), 5);
        assert_eq!(ReturnCode::TestFailed.code(), 6);
    }

    #[test]
    fn test_error_to_code() {
        assert_eq!(
            ReturnCode::from(BlowfishError::InvalidKey { len: 2 }),
            ReturnCode::InvalidKey
        );
        assert_eq!(
            ReturnCode::from(&BlowfishError::TestFailed { index: 4 }),
            ReturnCode::TestFailed
        );

        let ok: Result<(), BlowfishError> = Ok(());
        assert!(ReturnCode::from(&ok).is_success());
        let err: Result<(), BlowfishError> = Err(BlowfishError::BadBufferLength { len: 7 });
        assert_eq!(ReturnCode::from(&err), ReturnCode::BadBufferLength);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            BlowfishError::InvalidKey { len: 60 }.to_string(),
            "invalid key length 60, expected 4 to 56 bytes"
        );
        assert_eq!(
            BlowfishError::TestFailed { index: 3 }.to_string(),
            "self-test failed at vector 3"
        );
    }
}
