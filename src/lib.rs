//! Blowfish with ECB, CBC, CFB64, OFB64 and CTR modes of operation.
//!
//! A [`Context`] binds a key schedule to one mode and one stream. Buffers are transformed in
//! place; consecutive calls continue the same stream, so a message can be fed in pieces of any
//! size under the stream modes.
//!
//! ```
//! use blowfish_modes::{Context, Direction, Mode};
//!
//! let key = b"0123456789abcdef";
//! let iv = [0u8; 8];
//! let mut msg = b"attack at dawn".to_vec();
//!
//! let mut enc = Context::new(key, Mode::Ctr, Some(&iv)).unwrap();
//! enc.process(&mut msg, Direction::Encrypt).unwrap();
//!
//! let mut dec = Context::new(key, Mode::Ctr, Some(&iv)).unwrap();
//! dec.process(&mut msg, Direction::Decrypt).unwrap();
//! assert_eq!(msg, b"attack at dawn");
//! ```
//!
//! The [`selftest`] module replays published known answers and [`bench`] measures throughput,
//! using the rayon pool for the modes whose blocks are independent.

mod blowfish_consts;

pub mod bench;
pub mod blowfish;
pub mod context;
pub mod error;
pub mod mode;
pub mod report;
pub mod selftest;

pub use blowfish::{Blowfish, BLOCK_SIZE};
pub use context::Context;
pub use error::{BlowfishError, ReturnCode};
pub use mode::{Direction, Mode};
