use std::time::Duration;

use blowfish_modes::bench::{self, BenchConfig};
use blowfish_modes::selftest::{self, ChainVector, TestVector};
use blowfish_modes::{Blowfish, BlowfishError, Context, Direction, Mode, ReturnCode};

static KEY16: [u8; 16] = [
    0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0xF0, 0xE1, 0xD2, 0xC3, 0xB4, 0xA5, 0x96, 0x87,
];
static IV: [u8; 8] = [0xFE, 0xDC, 0xBA, 0x98, 0x76, 0x54, 0x32, 0x10];
static TEXT: &[u8; 29] = b"7654321 Now is the time for \0";

static CBC_CIPHER_TEXT: &str = "6b77b4d63006dee605b156e27403979358deb9e7154616d959f1652bd5ff92cc";
static CFB_CIPHER_TEXT: &str = "e73214a2822139caf26ecf6d2eb9e76e3da3de04d1517200519d57a6c3";
static OFB_CIPHER_TEXT: &str = "e73214a2822139ca62b343cc5b65587310dd908d0c241b2263c2cf80da";

fn encrypt_hex(mode: Mode, key: &[u8], iv: Option<&[u8]>, text: &[u8]) -> String {
    let mut ctx = Context::new(key, mode, iv).unwrap();
    let mut data = text.to_vec();
    ctx.process(&mut data, Direction::Encrypt).unwrap();
    hex::encode(data)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

#[test]
fn encipher_zero_key() {
    let ctx = Context::new(&[0; 8], Mode::Ecb, None).unwrap();
    let (mut l, mut r) = (0, 0);
    ctx.encipher(&mut l, &mut r).unwrap();
    assert_eq!((l, r), (0x4EF99745, 0x6198DD78));
    ctx.decipher(&mut l, &mut r).unwrap();
    assert_eq!((l, r), (0, 0));
}

#[test]
fn encrypt_ecb_blocks() {
    assert_eq!(
        encrypt_hex(Mode::Ecb, &[0xFF; 8], None, &[0xFF; 8]),
        "51866fd5b85ecb8a"
    );
    assert_eq!(
        encrypt_hex(Mode::Ecb, &KEY16[..8], None, &[0; 8]),
        "245946885754369a"
    );
}

#[test]
fn ecb_ignores_iv() {
    let with_iv = encrypt_hex(Mode::Ecb, &KEY16, Some(&IV), &pattern(64));
    let without = encrypt_hex(Mode::Ecb, &KEY16, None, &pattern(64));
    assert_eq!(with_iv, without);
}

#[test]
fn encrypt_chaining_modes() {
    let mut padded = TEXT.to_vec();
    padded.resize(32, 0);
    assert_eq!(
        encrypt_hex(Mode::Cbc, &KEY16, Some(&IV), &padded),
        CBC_CIPHER_TEXT
    );
    assert_eq!(
        encrypt_hex(Mode::Cfb, &KEY16, Some(&IV), TEXT),
        CFB_CIPHER_TEXT
    );
    assert_eq!(
        encrypt_hex(Mode::Ofb, &KEY16, Some(&IV), TEXT),
        OFB_CIPHER_TEXT
    );
}

#[test]
fn decrypt_chaining_modes() {
    for (mode, cipher_text) in [
        (Mode::Cfb, CFB_CIPHER_TEXT),
        (Mode::Ofb, OFB_CIPHER_TEXT),
    ] {
        let mut ctx = Context::new(&KEY16, mode, Some(&IV)).unwrap();
        let mut data = hex::decode(cipher_text).unwrap();
        ctx.decrypt(&mut data).unwrap();
        assert_eq!(data, TEXT);
    }
}

#[test]
fn block_modes_need_whole_blocks() {
    for mode in Mode::ALL {
        let mut ctx = Context::new(&KEY16, mode, Some(&IV)).unwrap();
        let mut data = pattern(13);
        let result = ctx.encrypt(&mut data);
        if mode.requires_full_blocks() {
            assert_eq!(result, Err(BlowfishError::BadBufferLength { len: 13 }));
            assert_eq!(data, pattern(13));
        } else {
            assert_eq!(result, Ok(()));
            assert_ne!(data, pattern(13));
        }
    }
}

#[test]
fn empty_buffer_is_a_no_op() {
    for mode in Mode::ALL {
        let mut ctx = Context::new(&KEY16, mode, Some(&IV)).unwrap();
        let mut data = Vec::new();
        assert_eq!(ctx.encrypt(&mut data), Ok(()));
    }
}

#[test]
fn invalid_init() {
    assert_eq!(
        Context::new(&[1, 2, 3], Mode::Ecb, None).unwrap_err(),
        BlowfishError::InvalidKey { len: 3 }
    );
    assert_eq!(
        Context::new(&[0; 57], Mode::Ecb, None).unwrap_err(),
        BlowfishError::InvalidKey { len: 57 }
    );
    assert_eq!(
        Context::new(&KEY16, Mode::Cbc, None).unwrap_err(),
        BlowfishError::BadBufferLength { len: 0 }
    );
    assert_eq!(
        Context::new(&KEY16, Mode::Ctr, Some(&IV[..7])).unwrap_err(),
        BlowfishError::BadBufferLength { len: 7 }
    );
    assert_eq!(Mode::try_from(9), Err(BlowfishError::InvalidMode));
    assert!(Context::new(&[0x5A; 4], Mode::Ofb, Some(&IV)).is_ok());
    assert!(Context::new(&[0x5A; 56], Mode::Ofb, Some(&IV)).is_ok());
}

#[test]
fn roundtrip_every_mode() {
    for mode in Mode::ALL {
        let plain = pattern(1000);
        let mut enc = Context::new(&KEY16, mode, Some(&IV)).unwrap();
        let mut dec = Context::new(&KEY16, mode, Some(&IV)).unwrap();

        let mut data = plain.clone();
        enc.encrypt(&mut data).unwrap();
        assert_ne!(data, plain, "{mode} left the data unchanged");
        dec.decrypt(&mut data).unwrap();
        assert_eq!(data, plain, "{mode} did not roundtrip");
    }
}

#[test]
fn parallel_matches_serial() {
    let plain = pattern(100_000);
    for mode in [Mode::Ecb, Mode::Ctr] {
        let mut serial = plain.clone();
        Context::new(&KEY16, mode, Some(&IV))
            .unwrap()
            .process(&mut serial, Direction::Encrypt)
            .unwrap();

        let mut parallel = plain.clone();
        Context::new(&KEY16, mode, Some(&IV))
            .unwrap()
            .process_par(&mut parallel, Direction::Encrypt)
            .unwrap();

        let mut auto = plain.clone();
        Context::new(&KEY16, mode, Some(&IV))
            .unwrap()
            .process_auto(&mut auto, Direction::Encrypt)
            .unwrap();

        assert_eq!(serial, parallel);
        assert_eq!(serial, auto);
    }
}

#[test]
fn ctr_counter_advances_per_block() {
    let mut a = vec![0; 8];
    let mut b = vec![0; 16];
    Context::new(&KEY16, Mode::Ctr, Some(&IV))
        .unwrap()
        .encrypt(&mut a)
        .unwrap();
    Context::new(&KEY16, Mode::Ctr, Some(&IV))
        .unwrap()
        .encrypt(&mut b)
        .unwrap();
    assert_eq!(a, b[..8]);
    assert_ne!(b[..8], b[8..]);

    // The second keystream block is E(IV + 1).
    let bf = Blowfish::new(&KEY16).unwrap();
    let mut block = (u64::from_be_bytes(IV) + 1).to_be_bytes();
    bf.encrypt_block(&mut block);
    assert_eq!(b[8..], block);
}

#[test]
fn exit_disables_context() {
    let mut ctx = Context::new(&KEY16, Mode::Cbc, Some(&IV)).unwrap();
    let copy = ctx.clone();
    ctx.exit();
    ctx.exit();

    let mut data = vec![0; 8];
    assert_eq!(ctx.encrypt(&mut data), Err(BlowfishError::InvalidParameter));
    assert_eq!(ctx.reset(), Err(BlowfishError::InvalidParameter));
    assert_eq!(ctx.rekey(&KEY16), Err(BlowfishError::InvalidParameter));
    let (mut l, mut r) = (0, 0);
    assert_eq!(ctx.encipher(&mut l, &mut r), Err(BlowfishError::InvalidParameter));
    assert_eq!(data, vec![0; 8]);

    // A clone keeps its own hold on the key schedule.
    let mut copy = copy;
    assert!(copy.encrypt(&mut data).is_ok());
}

#[test]
fn published_vectors_pass() {
    let ecb = selftest::run_ecb(TestVector::standard());
    let chain = selftest::run_chain(ChainVector::standard());
    assert_eq!(ecb.return_code(), ReturnCode::Success);
    assert_eq!(chain.return_code(), ReturnCode::Success);
}

#[test]
fn benchmark_reports_throughput() {
    let config = BenchConfig {
        duration: Duration::from_secs(1),
        chunk_len: 64 * 1024,
        parallel: true,
    };
    let results = bench::run_suite(&[Mode::Ctr, Mode::Cbc], &config).unwrap();
    assert_eq!(results.len(), 3);
    for r in results {
        assert!(r.elapsed() >= Duration::from_secs(1));
        assert!(r.bytes() > 0);
        assert!(r.bytes_per_sec() > 0.0);
    }
}
