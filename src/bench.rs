//! Wall-clock throughput measurement over a synthetic buffer.
//!
//! ECB and CTR chunks are split across the rayon pool through [`Context::process_par`];
//! chaining modes always run on the calling thread. The deadline is only checked between
//! chunks, so the byte count never includes a partially processed chunk.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::blowfish::BLOCK_SIZE;
use crate::context::Context;
use crate::error::BlowfishError;
use crate::mode::{Direction, Mode};

pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_CHUNK_LEN: usize = 128 * 1024;

const BENCH_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";
const BENCH_IV: [u8; BLOCK_SIZE] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// How long each run keeps processing chunks.
    pub duration: Duration,
    /// Bytes per chunk. ECB and CBC need a multiple of 8.
    pub chunk_len: usize,
    /// Allow the parallel path for modes that support it.
    pub parallel: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            duration: DEFAULT_DURATION,
            chunk_len: DEFAULT_CHUNK_LEN,
            parallel: true,
        }
    }
}

/// Outcome of one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    mode: Mode,
    parallel: bool,
    bytes: u64,
    chunks: u64,
    elapsed: Duration,
    bytes_per_sec: f64,
}

impl BenchmarkResult {
    fn new(mode: Mode, parallel: bool, bytes: u64, chunks: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let bytes_per_sec = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };
        BenchmarkResult {
            mode,
            parallel,
            bytes,
            chunks,
            elapsed,
            bytes_per_sec,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn bytes_per_sec(&self) -> f64 {
        self.bytes_per_sec
    }
}

fn synthetic(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(0x1d) ^ 0xa5).collect()
}

fn process(
    ctx: &mut Context,
    parallel: bool,
    buf: &mut [u8],
    direction: Direction,
) -> Result<(), BlowfishError> {
    if parallel {
        ctx.process_par(buf, direction)
    } else {
        ctx.process(buf, direction)
    }
}

/// Encrypts one chunk on the chosen path and on the serial path, then decrypts it again.
///
/// Fails with `TestFailed { index: 0 }` if the paths disagree or the plaintext does not
/// come back.
fn verify(ctx: &mut Context, parallel: bool, plain: &[u8]) -> Result<(), BlowfishError> {
    let mut timed = plain.to_vec();
    ctx.reset()?;
    process(ctx, parallel, &mut timed, Direction::Encrypt)?;

    let mut serial = plain.to_vec();
    ctx.reset()?;
    ctx.process(&mut serial, Direction::Encrypt)?;

    let mut roundtrip = timed.clone();
    ctx.reset()?;
    process(ctx, parallel, &mut roundtrip, Direction::Decrypt)?;

    if timed.as_slice() == plain || timed != serial || roundtrip.as_slice() != plain {
        return Err(BlowfishError::TestFailed { index: 0 });
    }
    Ok(())
}

/// Encrypts chunks of a synthetic buffer under `mode` until `config.duration` has elapsed.
///
/// `parallel` is honoured only for ECB and CTR; the returned result records which path ran.
///
/// # Errors
/// - [`BlowfishError::InvalidParameter`] for a zero duration or an empty chunk.
/// - [`BlowfishError::BadBufferLength`] if ECB or CBC gets a chunk that is not whole blocks.
/// - [`BlowfishError::TestFailed`] if the integrity check after the run fails.
#[instrument(skip(config), fields(duration = ?config.duration, chunk_len = config.chunk_len))]
pub fn run(
    mode: Mode,
    parallel: bool,
    config: &BenchConfig,
) -> Result<BenchmarkResult, BlowfishError> {
    if config.duration.is_zero() || config.chunk_len == 0 {
        return Err(BlowfishError::InvalidParameter);
    }
    if mode.requires_full_blocks() && config.chunk_len % BLOCK_SIZE != 0 {
        return Err(BlowfishError::BadBufferLength {
            len: config.chunk_len,
        });
    }

    let parallel = parallel && mode.is_parallel_safe();
    let mut ctx = Context::new(BENCH_KEY, mode, Some(&BENCH_IV))?;
    let plain = synthetic(config.chunk_len);
    let mut buf = plain.clone();

    let mut bytes = 0u64;
    let mut chunks = 0u64;
    let start = Instant::now();
    let elapsed = loop {
        process(&mut ctx, parallel, &mut buf, Direction::Encrypt)?;
        bytes += config.chunk_len as u64;
        chunks += 1;

        let elapsed = start.elapsed();
        if elapsed >= config.duration {
            break elapsed;
        }
    };

    verify(&mut ctx, parallel, &plain)?;
    ctx.exit();

    let result = BenchmarkResult::new(mode, parallel, bytes, chunks, elapsed);
    info!(
        %mode,
        parallel,
        bytes,
        bytes_per_sec = result.bytes_per_sec(),
        "benchmark finished"
    );
    Ok(result)
}

/// Runs every mode serially, and again in parallel where the mode allows it and
/// `config.parallel` is set.
pub fn run_suite(
    modes: &[Mode],
    config: &BenchConfig,
) -> Result<Vec<BenchmarkResult>, BlowfishError> {
    let mut results = Vec::new();
    for &mode in modes {
        if config.parallel && mode.is_parallel_safe() {
            results.push(run(mode, true, config)?);
        } else {
            debug!(%mode, "parallel run skipped");
        }
        results.push(run(mode, false, config)?);
    }
    Ok(results)
}

#[cfg(test)]
mod test {
    use super::*;

    fn quick() -> BenchConfig {
        BenchConfig {
            duration: Duration::from_millis(30),
            chunk_len: 4096,
            parallel: true,
        }
    }

    #[test]
    fn test_default_config() {
        let config = BenchConfig::default();
        assert_eq!(config.duration, Duration::from_secs(10));
        assert_eq!(config.chunk_len, 128 * 1024);
        assert!(config.parallel);
    }

    #[test]
    fn test_run_counts_whole_chunks() {
        for mode in Mode::ALL {
            let result = run(mode, true, &quick()).unwrap();
            assert_eq!(result.mode(), mode);
            assert_eq!(result.parallel(), mode.is_parallel_safe());
            assert!(result.chunks() >= 1);
            assert_eq!(result.bytes(), result.chunks() * 4096);
            assert!(result.elapsed() >= Duration::from_millis(30));
            assert!(result.bytes_per_sec() > 0.0);
        }
    }

    #[test]
    fn test_chaining_modes_never_run_parallel() {
        for mode in [Mode::Cbc, Mode::Cfb, Mode::Ofb] {
            assert!(!run(mode, true, &quick()).unwrap().parallel());
        }
    }

    #[test]
    fn test_invalid_config() {
        let mut config = quick();
        config.chunk_len = 100;
        assert_eq!(
            run(Mode::Cbc, false, &config),
            Err(BlowfishError::BadBufferLength { len: 100 })
        );
        assert!(run(Mode::Ofb, false, &config).is_ok());

        config.chunk_len = 0;
        assert_eq!(
            run(Mode::Ctr, false, &config),
            Err(BlowfishError::InvalidParameter)
        );

        let config = BenchConfig {
            duration: Duration::ZERO,
            ..quick()
        };
        assert_eq!(
            run(Mode::Ecb, false, &config),
            Err(BlowfishError::InvalidParameter)
        );
    }

    #[test]
    fn test_suite_layout() {
        let results = run_suite(&[Mode::Ecb, Mode::Cbc, Mode::Ctr], &quick()).unwrap();
        let layout: Vec<(Mode, bool)> = results
            .iter()
            .map(|r| (r.mode(), r.parallel()))
            .collect();
        assert_eq!(
            layout,
            vec![
                (Mode::Ecb, true),
                (Mode::Ecb, false),
                (Mode::Cbc, false),
                (Mode::Ctr, true),
                (Mode::Ctr, false),
            ]
        );

        let serial_only = BenchConfig {
            parallel: false,
            ..quick()
        };
        let results = run_suite(&[Mode::Ecb], &serial_only).unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].parallel());
    }

    #[test]
    fn test_zero_elapsed_has_zero_rate() {
        let result = BenchmarkResult::new(Mode::Ecb, false, 0, 0, Duration::ZERO);
        assert_eq!(result.bytes_per_sec(), 0.0);
    }
}
