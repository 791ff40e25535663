use std::mem;
use std::sync::Arc;

use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::blowfish_consts;
use crate::error::BlowfishError;

pub const BLOCK_SIZE: usize = 8;
pub const MIN_KEY_LEN: usize = 4;
pub const MAX_KEY_LEN: usize = 56;

const SUBKEYS: usize = 18;
const SBOX_ENTRIES: usize = 256;

/// Expanded Blowfish key: the 18-word P-array and the four S-boxes.
///
/// The schedule is immutable once built. Key material is wiped when the value is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Blowfish {
    pbox: [u32; SUBKEYS],
    sbox: [[u32; SBOX_ENTRIES]; 4],
    #[zeroize(skip)]
    weak: bool,
}

impl Blowfish {
    pub fn new(key: &[u8]) -> Result<Self, BlowfishError> {
        check_key_len(key)?;
        let mut bf = Blowfish::initial();
        bf.key_schedule(key);
        Ok(bf)
    }

    /// Like [`new`](Self::new), but expands the key directly inside the shared allocation so
    /// no keyed copy of the schedule is left behind on the stack.
    pub fn new_shared(key: &[u8]) -> Result<Arc<Self>, BlowfishError> {
        check_key_len(key)?;
        let mut shared = Arc::new(Blowfish::initial());
        match Arc::get_mut(&mut shared) {
            Some(bf) => bf.key_schedule(key),
            None => return Err(BlowfishError::InvalidParameter),
        }
        Ok(shared)
    }

    fn initial() -> Self {
        Blowfish {
            pbox: blowfish_consts::PBOX,
            sbox: [
                blowfish_consts::SBOX0,
                blowfish_consts::SBOX1,
                blowfish_consts::SBOX2,
                blowfish_consts::SBOX3,
            ],
            weak: false,
        }
    }

    /// Whether the schedule produced a degenerate S-box. Advisory only: the cipher still works.
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    #[inline(always)]
    fn round(&self, x: u32) -> u32 {
        let x: [u8; 4] = x.to_le_bytes();

        let a = self.sbox[0][x[3] as usize];
        let b = self.sbox[1][x[2] as usize];
        let c = self.sbox[2][x[1] as usize];
        let d = self.sbox[3][x[0] as usize];

        d.wrapping_add(c ^ (b.wrapping_add(a)))
    }

    #[inline(always)]
    pub fn encrypt_lr(&self, l: &mut u32, r: &mut u32) {
        self.pbox[..16].chunks_exact(2).for_each(|pair| {
            *l ^= pair[0];
            *r ^= self.round(*l);
            *r ^= pair[1];
            *l ^= self.round(*r);
        });

        *l ^= self.pbox[16];
        *r ^= self.pbox[17];

        mem::swap(l, r);
    }

    #[inline(always)]
    pub fn decrypt_lr(&self, l: &mut u32, r: &mut u32) {
        self.pbox[2..].chunks_exact(2).rev().for_each(|pair| {
            *l ^= pair[1];
            *r ^= self.round(*l);
            *r ^= pair[0];
            *l ^= self.round(*r);
        });

        *l ^= self.pbox[1];
        *r ^= self.pbox[0];

        mem::swap(l, r);
    }

    pub fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let (mut l, mut r) = split_block(block);
        self.encrypt_lr(&mut l, &mut r);
        join_block(block, l, r);
    }

    pub fn decrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let (mut l, mut r) = split_block(block);
        self.decrypt_lr(&mut l, &mut r);
        join_block(block, l, r);
    }

    fn key_schedule(&mut self, key: &[u8]) {
        let mut rolling_key = std::iter::repeat(key).flatten().copied();

        self.pbox.iter_mut().for_each(|pb| {
            // Parse cycling key bytes as big endian u32
            let subkey = (&mut rolling_key)
                .take(4)
                .fold(0, |prev, curr| prev << 8 | curr as u32);
            *pb ^= subkey;
        });

        let mut l = 0;
        let mut r = 0;

        for i in (0..SUBKEYS).step_by(2) {
            self.encrypt_lr(&mut l, &mut r);
            self.pbox[i] = l;
            self.pbox[i + 1] = r;
        }

        for i in 0..4 {
            for j in (0..SBOX_ENTRIES).step_by(2) {
                self.encrypt_lr(&mut l, &mut r);
                self.sbox[i][j] = l;
                self.sbox[i][j + 1] = r;
            }
        }

        self.scan_weak();
        debug!(key_len = key.len(), weak = self.weak, "key schedule ready");
    }

    fn scan_weak(&mut self) {
        self.weak = self.sbox.iter().any(has_collision);
        if self.weak {
            warn!("key produced an S-box collision");
        }
    }

    /// Plants a repeated S-box entry and rescans, giving a schedule flagged as weak.
    #[cfg(test)]
    pub(crate) fn make_weak(&mut self) {
        self.sbox[2][200] = self.sbox[2][17];
        self.scan_weak();
    }
}

fn check_key_len(key: &[u8]) -> Result<(), BlowfishError> {
    if key.len() < MIN_KEY_LEN || key.len() > MAX_KEY_LEN {
        return Err(BlowfishError::InvalidKey { len: key.len() });
    }
    Ok(())
}

/// An S-box with two equal entries makes the round function lose injectivity in that byte.
/// Any repeat counts, which includes two adjacent words written by the same encipherment.
fn has_collision(sbox: &[u32; SBOX_ENTRIES]) -> bool {
    let mut sorted = *sbox;
    sorted.sort_unstable();
    let found = sorted.windows(2).any(|w| w[0] == w[1]);
    sorted.zeroize();
    found
}

#[inline(always)]
pub(crate) fn split_block(block: &[u8; BLOCK_SIZE]) -> (u32, u32) {
    let l = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
    let r = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
    (l, r)
}

#[inline(always)]
pub(crate) fn join_block(block: &mut [u8; BLOCK_SIZE], l: u32, r: u32) {
    block[..4].copy_from_slice(&l.to_be_bytes());
    block[4..].copy_from_slice(&r.to_be_bytes());
}

#[cfg(test)]
mod test {
    use super::*;

    const KEY16: [u8; 16] = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];

    #[test]
    fn test_roundtrip_single_block_lr() {
        let bf = Blowfish::new(&KEY16).unwrap();

        let l_orig = 0x6518a1f5;
        let r_orig = 0xc8d9b63c;

        let mut l = l_orig;
        let mut r = r_orig;
        bf.encrypt_lr(&mut l, &mut r);

        assert_eq!(l, 0xdac63686);
        assert_eq!(r, 0x1d70bd8a);

        bf.decrypt_lr(&mut l, &mut r);

        assert_eq!(l, l_orig);
        assert_eq!(r, r_orig);
    }

    #[test]
    fn test_roundtrip_single_block() {
        let bf = Blowfish::new(&KEY16).unwrap();

        let plaintext_orig = [0x65, 0x18, 0xa1, 0xf5, 0xc8, 0xd9, 0xb6, 0x3c];

        let mut ciphertext = plaintext_orig;
        bf.encrypt_block(&mut ciphertext);

        assert_eq!(ciphertext, [0xda, 0xc6, 0x36, 0x86, 0x1d, 0x70, 0xbd, 0x8a]);

        bf.decrypt_block(&mut ciphertext);

        assert_eq!(ciphertext, plaintext_orig);
    }

    #[test]
    fn test_key_length_bounds() {
        for len in [0, 1, 3, 57, 64] {
            let key = vec![0x5a; len];
            assert_eq!(
                Blowfish::new(&key).err(),
                Some(BlowfishError::InvalidKey { len })
            );
        }
        for len in MIN_KEY_LEN..=MAX_KEY_LEN {
            let key: Vec<u8> = (0..len as u8).collect();
            assert!(Blowfish::new(&key).is_ok(), "key length {len}");
        }
    }

    #[test]
    fn test_roundtrip_many_blocks() {
        let bf = Blowfish::new(b"roundtrip key").unwrap();
        let mut x: u64 = 0x9e37_79b9_7f4a_7c15;
        for _ in 0..1000 {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let orig = x.to_be_bytes();
            let mut block = orig;
            bf.encrypt_block(&mut block);
            bf.decrypt_block(&mut block);
            assert_eq!(block, orig);
        }
    }

    #[test]
    fn test_collision_detection() {
        let mut sbox = blowfish_consts::SBOX1;
        assert!(!has_collision(&sbox));
        sbox[200] = sbox[17];
        assert!(has_collision(&sbox));
    }

    #[test]
    fn test_weak_schedule_still_works() {
        let mut bf = Blowfish::new(&KEY16).unwrap();
        assert!(!bf.is_weak());
        bf.make_weak();
        assert!(bf.is_weak());

        let orig = [0x65, 0x18, 0xa1, 0xf5, 0xc8, 0xd9, 0xb6, 0x3c];
        let mut block = orig;
        bf.encrypt_block(&mut block);
        assert_ne!(block, orig);
        bf.decrypt_block(&mut block);
        assert_eq!(block, orig);
    }

    #[test]
    fn test_shared_schedule_matches_owned() {
        let shared = Blowfish::new_shared(&KEY16).unwrap();
        let owned = Blowfish::new(&KEY16).unwrap();
        assert_eq!(shared.pbox, owned.pbox);
        assert_eq!(shared.sbox, owned.sbox);
        assert_eq!(
            Blowfish::new_shared(b"abc").err(),
            Some(BlowfishError::InvalidKey { len: 3 })
        );
    }

    #[test]
    fn test_published_keys_are_not_weak() {
        assert!(!Blowfish::new(&[0u8; 8]).unwrap().is_weak());
        assert!(!Blowfish::new(&[0xffu8; 8]).unwrap().is_weak());
        assert!(!Blowfish::new(&KEY16).unwrap().is_weak());
    }
}
