//! Known-answer self-test.
//!
//! ECB vectors are Eric Young's published set. The chaining-mode vectors use the classic
//! 16-byte key and IV over `"7654321 Now is the time for \0"`.

use tracing::{debug, info, instrument, warn};

use crate::blowfish::BLOCK_SIZE;
use crate::context::Context;
use crate::error::{BlowfishError, ReturnCode};
use crate::mode::{Direction, Mode};

/// One ECB known answer: `ciphertext = E(key, plaintext)`, blocks as (left, right) words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestVector {
    pub key: [u8; 8],
    pub plaintext: [u32; 2],
    pub ciphertext: [u32; 2],
}

/// A known answer for a buffer processed under a chaining or keystream mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainVector {
    pub mode: Mode,
    pub key: &'static [u8],
    pub iv: [u8; BLOCK_SIZE],
    pub plaintext: &'static [u8],
    pub ciphertext: &'static [u8],
}

const fn tv(key: [u8; 8], plaintext: [u32; 2], ciphertext: [u32; 2]) -> TestVector {
    TestVector {
        key,
        plaintext,
        ciphertext,
    }
}

static ECB_VECTORS: [TestVector; 33] = [
    tv([0x00; 8], [0x00000000, 0x00000000], [0x4ef99745, 0x6198dd78]),
    tv([0xff; 8], [0xffffffff, 0xffffffff], [0x51866fd5, 0xb85ecb8a]),
    tv([0xff; 8], [0x00000000, 0x00000000], [0xf21e9a77, 0xb71c49bc]),
    tv([0x11; 8], [0x01234567, 0x89abcdef], [0x7d0cc630, 0xafda1ec7]),
    tv([0x11; 8], [0x11111111, 0x11111111], [0x2466dd87, 0x8b963c9d]),
    tv([0x00; 8], [0xffffffff, 0xffffffff], [0x014933e0, 0xcdaff6e4]),
    tv([0x01; 8], [0x01234567, 0x89abcdef], [0xfa34ec48, 0x47b268b2]),
    tv(
        [0x1f, 0x1f, 0x1f, 0x1f, 0x0e, 0x0e, 0x0e, 0x0e],
        [0x01234567, 0x89abcdef],
        [0xa7907951, 0x08ea3cae],
    ),
    tv(
        [0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        [0x10000000, 0x00000001],
        [0x7d856f9a, 0x613063f2],
    ),
    tv(
        [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef],
        [0x11111111, 0x11111111],
        [0x61f9c380, 0x2281b096],
    ),
    tv(
        [0xfe, 0xdc, 0xba, 0x98, 0x76, 0x54, 0x32, 0x10],
        [0x01234567, 0x89abcdef],
        [0x0aceab0f, 0xc6a0a28d],
    ),
    tv(
        [0x7c, 0xa1, 0x10, 0x45, 0x4a, 0x1a, 0x6e, 0x57],
        [0x01a1d6d0, 0x39776742],
        [0x59c68245, 0xeb05282b],
    ),
    tv(
        [0x01, 0x31, 0xd9, 0x61, 0x9d, 0xc1, 0x37, 0x6e],
        [0x5cd54ca8, 0x3def57da],
        [0xb1b8cc0b, 0x250f09a0],
    ),
    tv(
        [0x07, 0xa1, 0x13, 0x3e, 0x4a, 0x0b, 0x26, 0x86],
        [0x0248d438, 0x06f67172],
        [0x1730e577, 0x8bea1da4],
    ),
    tv(
        [0x38, 0x49, 0x67, 0x4c, 0x26, 0x02, 0x31, 0x9e],
        [0x51454b58, 0x2ddf440a],
        [0xa25e7856, 0xcf2651eb],
    ),
    tv(
        [0x04, 0xb9, 0x15, 0xba, 0x43, 0xfe, 0xb5, 0xb6],
        [0x42fd4430, 0x59577fa2],
        [0x353882b1, 0x09ce8f1a],
    ),
    tv(
        [0x01, 0x13, 0xb9, 0x70, 0xfd, 0x34, 0xf2, 0xce],
        [0x059b5e08, 0x51cf143a],
        [0x48f4d088, 0x4c379918],
    ),
    tv(
        [0x01, 0x70, 0xf1, 0x75, 0x46, 0x8f, 0xb5, 0xe6],
        [0x0756d8e0, 0x774761d2],
        [0x432193b7, 0x8951fc98],
    ),
    tv(
        [0x43, 0x29, 0x7f, 0xad, 0x38, 0xe3, 0x73, 0xfe],
        [0x762514b8, 0x29bf486a],
        [0x13f04154, 0xd69d1ae5],
    ),
    tv(
        [0x07, 0xa7, 0x13, 0x70, 0x45, 0xda, 0x2a, 0x16],
        [0x3bdd1190, 0x49372802],
        [0x2eedda93, 0xffd39c79],
    ),
    tv(
        [0x04, 0x68, 0x91, 0x04, 0xc2, 0xfd, 0x3b, 0x2f],
        [0x26955f68, 0x35af609a],
        [0xd887e039, 0x3c2da6e3],
    ),
    tv(
        [0x37, 0xd0, 0x6b, 0xb5, 0x16, 0xcb, 0x75, 0x46],
        [0x164d5e40, 0x4f275232],
        [0x5f99d04f, 0x5b163969],
    ),
    tv(
        [0x1f, 0x08, 0x26, 0x0d, 0x1a, 0xc2, 0x46, 0x5e],
        [0x6b056e18, 0x759f5cca],
        [0x4a057a3b, 0x24d3977b],
    ),
    tv(
        [0x58, 0x40, 0x23, 0x64, 0x1a, 0xba, 0x61, 0x76],
        [0x004bd6ef, 0x09176062],
        [0x452031c1, 0xe4fada8e],
    ),
    tv(
        [0x02, 0x58, 0x16, 0x16, 0x46, 0x29, 0xb0, 0x07],
        [0x480d3900, 0x6ee762f2],
        [0x7555ae39, 0xf59b87bd],
    ),
    tv(
        [0x49, 0x79, 0x3e, 0xbc, 0x79, 0xb3, 0x25, 0x8f],
        [0x437540c8, 0x698f3cfa],
        [0x53c55f9c, 0xb49fc019],
    ),
    tv(
        [0x4f, 0xb0, 0x5e, 0x15, 0x15, 0xab, 0x73, 0xa7],
        [0x072d43a0, 0x77075292],
        [0x7a8e7bfa, 0x937e89a3],
    ),
    tv(
        [0x49, 0xe9, 0x5d, 0x6d, 0x4c, 0xa2, 0x29, 0xbf],
        [0x02fe5577, 0x8117f12a],
        [0xcf9c5d7a, 0x4986adb5],
    ),
    tv(
        [0x01, 0x83, 0x10, 0xdc, 0x40, 0x9b, 0x26, 0xd6],
        [0x1d9d5c50, 0x18f728c2],
        [0xd1abb290, 0x658bc778],
    ),
    tv(
        [0x1c, 0x58, 0x7f, 0x1c, 0x13, 0x92, 0x4f, 0xef],
        [0x30553228, 0x6d6f295a],
        [0x55cb3774, 0xd13ef201],
    ),
    tv(
        [0xe0, 0xfe, 0xe0, 0xfe, 0xf1, 0xfe, 0xf1, 0xfe],
        [0x01234567, 0x89abcdef],
        [0xc39e072d, 0x9fac631d],
    ),
    tv(
        [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef],
        [0x00000000, 0x00000000],
        [0x24594688, 0x5754369a],
    ),
    tv(
        [0xfe, 0xdc, 0xba, 0x98, 0x76, 0x54, 0x32, 0x10],
        [0xffffffff, 0xffffffff],
        [0x6b5c5a9c, 0x5d9e0a5a],
    ),
];

const CHAIN_KEY: [u8; 16] = [
    0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0xf0, 0xe1, 0xd2, 0xc3, 0xb4, 0xa5, 0x96, 0x87,
];
const CHAIN_IV: [u8; BLOCK_SIZE] = [0xfe, 0xdc, 0xba, 0x98, 0x76, 0x54, 0x32, 0x10];

/// The 28 characters plus the trailing NUL; CBC pads with zeros to 32 bytes.
const CHAIN_TEXT: &[u8; 29] = b"7654321 Now is the time for \0";
const CHAIN_TEXT_PADDED: &[u8; 32] = b"7654321 Now is the time for \0\0\0\0";

const CBC_CIPHERTEXT: [u8; 32] = [
    0x6b, 0x77, 0xb4, 0xd6, 0x30, 0x06, 0xde, 0xe6, 0x05, 0xb1, 0x56, 0xe2, 0x74, 0x03, 0x97, 0x93,
    0x58, 0xde, 0xb9, 0xe7, 0x15, 0x46, 0x16, 0xd9, 0x59, 0xf1, 0x65, 0x2b, 0xd5, 0xff, 0x92, 0xcc,
];
const CFB_CIPHERTEXT: [u8; 29] = [
    0xe7, 0x32, 0x14, 0xa2, 0x82, 0x21, 0x39, 0xca, 0xf2, 0x6e, 0xcf, 0x6d, 0x2e, 0xb9, 0xe7, 0x6e,
    0x3d, 0xa3, 0xde, 0x04, 0xd1, 0x51, 0x72, 0x00, 0x51, 0x9d, 0x57, 0xa6, 0xc3,
];
const OFB_CIPHERTEXT: [u8; 29] = [
    0xe7, 0x32, 0x14, 0xa2, 0x82, 0x21, 0x39, 0xca, 0x62, 0xb3, 0x43, 0xcc, 0x5b, 0x65, 0x58, 0x73,
    0x10, 0xdd, 0x90, 0x8d, 0x0c, 0x24, 0x1b, 0x22, 0x63, 0xc2, 0xcf, 0x80, 0xda,
];
const CTR_CIPHERTEXT: [u8; 29] = [
    0xe7, 0x32, 0x14, 0xa2, 0x82, 0x21, 0x39, 0xca, 0x60, 0x25, 0x47, 0x40, 0xdd, 0x8c, 0x5b, 0x8a,
    0xcf, 0x5e, 0x95, 0x69, 0xc4, 0xaf, 0xfe, 0xb9, 0x44, 0xb8, 0xfc, 0x02, 0x0e,
];

static CHAIN_VECTORS: [ChainVector; 4] = [
    ChainVector {
        mode: Mode::Cbc,
        key: &CHAIN_KEY,
        iv: CHAIN_IV,
        plaintext: CHAIN_TEXT_PADDED,
        ciphertext: &CBC_CIPHERTEXT,
    },
    ChainVector {
        mode: Mode::Cfb,
        key: &CHAIN_KEY,
        iv: CHAIN_IV,
        plaintext: CHAIN_TEXT,
        ciphertext: &CFB_CIPHERTEXT,
    },
    ChainVector {
        mode: Mode::Ofb,
        key: &CHAIN_KEY,
        iv: CHAIN_IV,
        plaintext: CHAIN_TEXT,
        ciphertext: &OFB_CIPHERTEXT,
    },
    ChainVector {
        mode: Mode::Ctr,
        key: &CHAIN_KEY,
        iv: CHAIN_IV,
        plaintext: CHAIN_TEXT,
        ciphertext: &CTR_CIPHERTEXT,
    },
];

impl TestVector {
    /// The 33 published ECB vectors.
    pub fn standard() -> &'static [TestVector] {
        &ECB_VECTORS
    }
}

impl ChainVector {
    /// CBC, CFB64, OFB64 and CTR vectors over the same key, IV and message.
    pub fn standard() -> &'static [ChainVector] {
        &CHAIN_VECTORS
    }
}

/// Which step of a vector check went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init(BlowfishError),
    Encipher,
    Decipher,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorFailure {
    pub index: usize,
    pub stage: Stage,
    pub expected: Vec<u8>,
    pub actual: Vec<u8>,
}

/// Outcome of replaying one vector table. Every vector is always evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    pub suite: &'static str,
    pub total: usize,
    pub failures: Vec<VectorFailure>,
}

impl SelfTestReport {
    fn new(suite: &'static str, total: usize) -> Self {
        SelfTestReport {
            suite,
            total,
            failures: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.total > 0 && self.failures.is_empty()
    }

    pub fn failed_vectors(&self) -> usize {
        let mut indices: Vec<usize> = self.failures.iter().map(|f| f.index).collect();
        indices.dedup();
        indices.len()
    }

    pub fn first_failure(&self) -> Option<&VectorFailure> {
        self.failures.first()
    }

    /// `TestFailed` carrying the index of the first failing vector. An empty table fails
    /// with `InvalidParameter`.
    pub fn result(&self) -> Result<(), BlowfishError> {
        if self.total == 0 {
            return Err(BlowfishError::InvalidParameter);
        }
        match self.first_failure() {
            Some(f) => Err(BlowfishError::TestFailed { index: f.index }),
            None => Ok(()),
        }
    }

    pub fn return_code(&self) -> ReturnCode {
        ReturnCode::from(&self.result())
    }

    fn record(&mut self, index: usize, stage: Stage, expected: &[u8], actual: &[u8]) {
        warn!(suite = self.suite, index, ?stage, "vector mismatch");
        self.failures.push(VectorFailure {
            index,
            stage,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
}

fn words_to_bytes(words: [u32; 2]) -> [u8; BLOCK_SIZE] {
    let mut out = [0; BLOCK_SIZE];
    out[..4].copy_from_slice(&words[0].to_be_bytes());
    out[4..].copy_from_slice(&words[1].to_be_bytes());
    out
}

/// Enciphers each vector's plaintext with a fresh ECB context, then deciphers the result.
#[instrument(skip_all, fields(vectors = vectors.len()))]
pub fn run_ecb(vectors: &[TestVector]) -> SelfTestReport {
    let mut report = SelfTestReport::new("ECB", vectors.len());

    for (index, v) in vectors.iter().enumerate() {
        let mut ctx = match Context::new(&v.key, Mode::Ecb, None) {
            Ok(ctx) => ctx,
            Err(err) => {
                report.record(index, Stage::Init(err), &[], &[]);
                continue;
            }
        };

        let [mut l, mut r] = v.plaintext;
        let enciphered = ctx.encipher(&mut l, &mut r);
        if enciphered.is_err() || [l, r] != v.ciphertext {
            report.record(
                index,
                Stage::Encipher,
                &words_to_bytes(v.ciphertext),
                &words_to_bytes([l, r]),
            );
        }

        let deciphered = ctx.decipher(&mut l, &mut r);
        if deciphered.is_err() || [l, r] != v.plaintext {
            report.record(
                index,
                Stage::Decipher,
                &words_to_bytes(v.plaintext),
                &words_to_bytes([l, r]),
            );
        }

        ctx.exit();
        debug!(index, "vector checked");
    }

    info!(
        failed = report.failed_vectors(),
        total = report.total,
        "ECB self-test finished"
    );
    report
}

/// Encrypts each vector's message as one stream, then decrypts the expected ciphertext.
#[instrument(skip_all, fields(vectors = vectors.len()))]
pub fn run_chain(vectors: &[ChainVector]) -> SelfTestReport {
    let mut report = SelfTestReport::new("chaining modes", vectors.len());

    for (index, v) in vectors.iter().enumerate() {
        let mut ctx = match Context::new(v.key, v.mode, Some(&v.iv)) {
            Ok(ctx) => ctx,
            Err(err) => {
                report.record(index, Stage::Init(err), &[], &[]);
                continue;
            }
        };

        let mut buf = v.plaintext.to_vec();
        let encrypted = ctx.process(&mut buf, Direction::Encrypt);
        if encrypted.is_err() || buf != v.ciphertext {
            report.record(index, Stage::Encipher, v.ciphertext, &buf);
        }

        let mut buf = v.ciphertext.to_vec();
        let decrypted = ctx
            .reset()
            .and_then(|()| ctx.process(&mut buf, Direction::Decrypt));
        if decrypted.is_err() || buf != v.plaintext {
            report.record(index, Stage::Decipher, v.plaintext, &buf);
        }

        ctx.exit();
        debug!(index, mode = %v.mode, "vector checked");
    }

    info!(
        failed = report.failed_vectors(),
        total = report.total,
        "chaining-mode self-test finished"
    );
    report
}
