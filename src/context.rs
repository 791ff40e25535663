//! Mode layer: a keyed [`Blowfish`] schedule plus the chaining or keystream state of one stream.
//!
//! The schedule is shared behind an [`Arc`] and never mutated after construction, so a
//! [`Context`] can be cloned or forked cheaply for use on another thread. Feedback state
//! (CBC register, CFB/OFB shift register, CTR counter) is always private to one `Context`.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;
use zeroize::Zeroize;

use crate::blowfish::{Blowfish, BLOCK_SIZE};
use crate::error::BlowfishError;
use crate::mode::{Direction, Mode};

/// Bytes handed to each rayon task by [`Context::process_par`].
const PAR_CHUNK_LEN: usize = 4096;

/// Below this size [`Context::process_auto`] stays on the calling thread.
const AUTO_PAR_THRESHOLD: usize = 32_768;

#[derive(Clone, Zeroize)]
struct Feedback {
    /// CBC: previous ciphertext block. CFB: ciphertext block being assembled. OFB: last keystream.
    register: [u8; BLOCK_SIZE],
    keystream: [u8; BLOCK_SIZE],
    counter: u64,
    /// Bytes of `keystream` already consumed; 0 means the next byte starts a new block.
    pos: usize,
}

impl Feedback {
    fn new(iv: &[u8; BLOCK_SIZE]) -> Self {
        Feedback {
            register: *iv,
            keystream: [0; BLOCK_SIZE],
            counter: u64::from_be_bytes(*iv),
            pos: 0,
        }
    }
}

/// A keyed cipher bound to one mode of operation and its stream state.
#[derive(Clone)]
pub struct Context {
    cipher: Option<Arc<Blowfish>>,
    key_len: usize,
    mode: Mode,
    iv: [u8; BLOCK_SIZE],
    state: Feedback,
}

impl Context {
    /// Builds the key schedule and binds it to `mode`.
    ///
    /// Every mode except ECB needs an 8-byte `iv`; ECB ignores it. A weak key is not an
    /// error here, check [`is_weak`](Self::is_weak) or call
    /// [`ensure_strong_key`](Self::ensure_strong_key) to reject it.
    ///
    /// # Errors
    /// - [`BlowfishError::InvalidKey`] if the key is not 4 to 56 bytes.
    /// - [`BlowfishError::BadBufferLength`] if the mode needs an IV and `iv` is absent or
    ///   not 8 bytes long.
    pub fn new(key: &[u8], mode: Mode, iv: Option<&[u8]>) -> Result<Self, BlowfishError> {
        let iv = checked_iv(mode, iv)?;
        let cipher = Blowfish::new_shared(key)?;
        debug!(%mode, key_len = key.len(), "context initialised");

        Ok(Context {
            cipher: Some(cipher),
            key_len: key.len(),
            mode,
            iv,
            state: Feedback::new(&iv),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Length in bytes of the key the current schedule was built from. 0 after `exit`.
    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn is_weak(&self) -> bool {
        self.cipher.as_ref().is_some_and(|c| c.is_weak())
    }

    pub fn ensure_strong_key(&self) -> Result<(), BlowfishError> {
        if self.cipher()?.is_weak() {
            return Err(BlowfishError::WeakKey);
        }
        Ok(())
    }

    /// False once [`exit`](Self::exit) has run.
    pub fn is_live(&self) -> bool {
        self.cipher.is_some()
    }

    fn cipher(&self) -> Result<&Arc<Blowfish>, BlowfishError> {
        self.cipher.as_ref().ok_or(BlowfishError::InvalidParameter)
    }

    /// Enciphers one block held as its left and right halves. Ignores the mode.
    pub fn encipher(&self, l: &mut u32, r: &mut u32) -> Result<(), BlowfishError> {
        self.cipher()?.encrypt_lr(l, r);
        Ok(())
    }

    /// Exact inverse of [`encipher`](Self::encipher).
    pub fn decipher(&self, l: &mut u32, r: &mut u32) -> Result<(), BlowfishError> {
        self.cipher()?.decrypt_lr(l, r);
        Ok(())
    }

    pub fn encrypt(&mut self, buf: &mut [u8]) -> Result<(), BlowfishError> {
        self.process(buf, Direction::Encrypt)
    }

    pub fn decrypt(&mut self, buf: &mut [u8]) -> Result<(), BlowfishError> {
        self.process(buf, Direction::Decrypt)
    }

    /// Transforms `buf` in place under the configured mode, continuing the current stream.
    ///
    /// # Errors
    /// - [`BlowfishError::InvalidParameter`] after [`exit`](Self::exit).
    /// - [`BlowfishError::BadBufferLength`] for ECB and CBC when `buf.len()` is not a
    ///   multiple of 8. Nothing is written in that case.
    pub fn process(
        &mut self,
        buf: &mut [u8],
        direction: Direction,
    ) -> Result<(), BlowfishError> {
        let cipher = Arc::clone(self.cipher()?);
        self.check_len(buf.len())?;

        match self.mode {
            Mode::Ecb => ecb(&cipher, buf, direction),
            Mode::Cbc => self.cbc(&cipher, buf, direction),
            Mode::Cfb | Mode::Ofb | Mode::Ctr => self.stream(&cipher, buf, direction),
        }
        Ok(())
    }

    /// Like [`process`](Self::process), but splits ECB and CTR work across the rayon pool.
    ///
    /// The output is byte-identical to [`process`](Self::process). Chaining modes run
    /// serially.
    pub fn process_par(
        &mut self,
        buf: &mut [u8],
        direction: Direction,
    ) -> Result<(), BlowfishError> {
        let cipher = Arc::clone(self.cipher()?);
        self.check_len(buf.len())?;

        match self.mode {
            Mode::Ecb => buf
                .par_chunks_mut(PAR_CHUNK_LEN)
                .for_each(|chunk| ecb(&cipher, chunk, direction)),
            Mode::Ctr => {
                let head_len = self.partial_block_remaining().min(buf.len());
                let (head, rest) = buf.split_at_mut(head_len);
                self.stream(&cipher, head, direction);

                let body_len = rest.len() - rest.len() % BLOCK_SIZE;
                let (body, tail) = rest.split_at_mut(body_len);
                let base = self.state.counter;

                body.par_chunks_mut(PAR_CHUNK_LEN)
                    .enumerate()
                    .for_each(|(i, chunk)| {
                        let offset = (i * PAR_CHUNK_LEN / BLOCK_SIZE) as u64;
                        ctr_blocks(&cipher, base.wrapping_add(offset), chunk);
                    });

                self.state.counter = base.wrapping_add((body_len / BLOCK_SIZE) as u64);
                self.stream(&cipher, tail, direction);
            }
            Mode::Cbc | Mode::Cfb | Mode::Ofb => return self.process(buf, direction),
        }
        Ok(())
    }

    /// Picks [`process_par`](Self::process_par) for large buffers on a multi-threaded pool.
    pub fn process_auto(
        &mut self,
        buf: &mut [u8],
        direction: Direction,
    ) -> Result<(), BlowfishError> {
        if buf.len() >= AUTO_PAR_THRESHOLD && rayon::current_num_threads() > 1 {
            self.process_par(buf, direction)
        } else {
            self.process(buf, direction)
        }
    }

    /// A context positioned `blocks_ahead` whole blocks past this one's next block boundary.
    ///
    /// Only ECB and CTR can be split this way. The fork shares the key schedule and owns its
    /// counter, so it can run on another thread without touching this context.
    pub fn fork_at(&self, blocks_ahead: u64) -> Result<Context, BlowfishError> {
        self.cipher()?;
        if !self.mode.is_parallel_safe() {
            return Err(BlowfishError::InvalidMode);
        }

        let mut fork = self.clone();
        fork.state.keystream.zeroize();
        fork.state.pos = 0;
        fork.state.counter = self.state.counter.wrapping_add(blocks_ahead);
        Ok(fork)
    }

    /// Rewinds the stream to the original IV, keeping the key schedule.
    pub fn reset(&mut self) -> Result<(), BlowfishError> {
        self.cipher()?;
        self.state.zeroize();
        self.state = Feedback::new(&self.iv);
        Ok(())
    }

    /// Replaces the key schedule, keeping mode and IV, and rewinds the stream.
    ///
    /// On error the context is left as it was.
    pub fn rekey(&mut self, key: &[u8]) -> Result<(), BlowfishError> {
        self.cipher()?;
        let cipher = Blowfish::new_shared(key)?;
        self.cipher = Some(cipher);
        self.key_len = key.len();
        self.reset()
    }

    /// Drops this context's hold on the key schedule and wipes IV and feedback state.
    ///
    /// The schedule itself is wiped when the last clone or fork releases it. Every later
    /// call except `exit` fails with [`BlowfishError::InvalidParameter`].
    pub fn exit(&mut self) {
        if self.cipher.take().is_some() {
            debug!(mode = %self.mode, "context torn down");
        }
        self.key_len = 0;
        self.iv.zeroize();
        self.state.zeroize();
    }

    fn check_len(&self, len: usize) -> Result<(), BlowfishError> {
        if self.mode.requires_full_blocks() && len % BLOCK_SIZE != 0 {
            return Err(BlowfishError::BadBufferLength { len });
        }
        Ok(())
    }

    fn partial_block_remaining(&self) -> usize {
        match self.state.pos {
            0 => 0,
            pos => BLOCK_SIZE - pos,
        }
    }

    fn cbc(&mut self, cipher: &Blowfish, buf: &mut [u8], direction: Direction) {
        let register = &mut self.state.register;

        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block: &mut [u8; BLOCK_SIZE] =
                chunk.try_into().expect("chunks_exact yields whole blocks");
            match direction {
                Direction::Encrypt => {
                    xor_in_place(block, register);
                    cipher.encrypt_block(block);
                    *register = *block;
                }
                Direction::Decrypt => {
                    let ciphertext = *block;
                    cipher.decrypt_block(block);
                    xor_in_place(block, register);
                    *register = ciphertext;
                }
            }
        }
    }

    fn stream(&mut self, cipher: &Blowfish, buf: &mut [u8], direction: Direction) {
        for byte in buf.iter_mut() {
            if self.state.pos == 0 {
                self.refill(cipher);
            }
            let pos = self.state.pos;
            let input = *byte;
            *byte ^= self.state.keystream[pos];

            if self.mode == Mode::Cfb {
                self.state.register[pos] = match direction {
                    Direction::Encrypt => *byte,
                    Direction::Decrypt => input,
                };
            }
            self.state.pos = (pos + 1) % BLOCK_SIZE;
        }
    }

    fn refill(&mut self, cipher: &Blowfish) {
        let state = &mut self.state;
        match self.mode {
            Mode::Cfb => {
                state.keystream = state.register;
                cipher.encrypt_block(&mut state.keystream);
            }
            Mode::Ofb => {
                cipher.encrypt_block(&mut state.register);
                state.keystream = state.register;
            }
            Mode::Ctr => {
                state.keystream = state.counter.to_be_bytes();
                cipher.encrypt_block(&mut state.keystream);
                state.counter = state.counter.wrapping_add(1);
            }
            Mode::Ecb | Mode::Cbc => unreachable!("{} has no keystream", self.mode),
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.exit();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("mode", &self.mode)
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}

fn checked_iv(mode: Mode, iv: Option<&[u8]>) -> Result<[u8; BLOCK_SIZE], BlowfishError> {
    if !mode.requires_iv() {
        return Ok([0; BLOCK_SIZE]);
    }
    let iv = iv.ok_or(BlowfishError::BadBufferLength { len: 0 })?;
    iv.try_into()
        .map_err(|_| BlowfishError::BadBufferLength { len: iv.len() })
}

fn ecb(cipher: &Blowfish, buf: &mut [u8], direction: Direction) {
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        let block: &mut [u8; BLOCK_SIZE] =
            chunk.try_into().expect("chunks_exact yields whole blocks");
        match direction {
            Direction::Encrypt => cipher.encrypt_block(block),
            Direction::Decrypt => cipher.decrypt_block(block),
        }
    }
}

/// CTR over whole blocks starting at `counter`. Encryption and decryption are the same.
fn ctr_blocks(cipher: &Blowfish, mut counter: u64, buf: &mut [u8]) {
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        let mut keystream = counter.to_be_bytes();
        cipher.encrypt_block(&mut keystream);
        chunk
            .iter_mut()
            .zip(keystream.iter())
            .for_each(|(b, k)| *b ^= k);
        counter = counter.wrapping_add(1);
    }
}

#[inline(always)]
fn xor_in_place(block: &mut [u8; BLOCK_SIZE], other: &[u8; BLOCK_SIZE]) {
    block.iter_mut().zip(other.iter()).for_each(|(b, o)| *b ^= o);
}
