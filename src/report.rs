//! Text rendering of structured results. Nothing in here does any cryptography.

use std::fmt::Write;

use crate::bench::BenchmarkResult;
use crate::error::ReturnCode;
use crate::mode::Mode;
use crate::selftest::{SelfTestReport, Stage};

/// `Name=0x0011.. (n bytes)`
pub fn hex_buffer(name: &str, buf: &[u8]) -> String {
    format!("{name}=0x{} ({} bytes)", hex::encode(buf), buf.len())
}

pub fn mode_line(mode: Mode) -> String {
    format!("Mode={} ({})", mode.description(), mode.name())
}

pub fn return_code_line(operation: &str, code: ReturnCode) -> String {
    let text = match code {
        ReturnCode::Success => "Success",
        ReturnCode::InvalidParameter => "Invalid parameter!",
        ReturnCode::InvalidKey => "Invalid key!",
        ReturnCode::WeakKey => "Weak key!",
        ReturnCode::BadBufferLength => "Invalid buffer length!",
        ReturnCode::InvalidMode => "Invalid mode!",
        ReturnCode::TestFailed => "Self-test failed!",
    };
    format!("{operation}()={text}")
}

/// Scales a byte rate to the largest binary unit that keeps it above 1.
pub fn rate(bytes_per_sec: f64) -> String {
    const UNITS: [&str; 4] = ["B/s", "KiB/s", "MiB/s", "GiB/s"];
    let mut value = bytes_per_sec;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

pub fn selftest(report: &SelfTestReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} vectors: {}/{} passed",
        report.suite,
        report.total - report.failed_vectors(),
        report.total
    );
    for failure in &report.failures {
        let stage = match failure.stage {
            Stage::Init(err) => format!("init ({err})"),
            Stage::Encipher => "encipher".to_string(),
            Stage::Decipher => "decipher".to_string(),
        };
        let _ = writeln!(out, "  vector {} failed at {stage}", failure.index);
        if !failure.expected.is_empty() {
            let _ = writeln!(out, "    {}", hex_buffer("Expected", &failure.expected));
            let _ = writeln!(out, "    {}", hex_buffer("Actual", &failure.actual));
        }
    }
    out
}

pub fn benchmark(result: &BenchmarkResult) -> String {
    format!(
        "{:<4}{:<9}{:>12} bytes in {:>7.3}s  {}",
        result.mode().name(),
        if result.parallel() { "parallel" } else { "serial" },
        result.bytes(),
        result.elapsed().as_secs_f64(),
        rate(result.bytes_per_sec()),
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::selftest::{run_ecb, TestVector};

    #[test]
    fn test_hex_buffer() {
        assert_eq!(
            hex_buffer("Key", &[0x01, 0x23, 0xab]),
            "Key=0x0123ab (3 bytes)"
        );
    }

    #[test]
    fn test_mode_line() {
        assert_eq!(mode_line(Mode::Cbc), "Mode=Cipher block chaining (CBC)");
    }

    #[test]
    fn test_return_code_line() {
        assert_eq!(
            return_code_line("init", ReturnCode::WeakKey),
            "init()=Weak key!"
        );
    }

    #[test]
    fn test_rate() {
        assert_eq!(rate(512.0), "512.00 B/s");
        assert_eq!(rate(1536.0), "1.50 KiB/s");
        assert_eq!(rate(3.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0), "3072.00 GiB/s");
    }

    #[test]
    fn test_selftest_rendering() {
        let mut vectors = TestVector::standard()[..3].to_vec();
        vectors[1].ciphertext = [0, 0];
        let text = selftest(&run_ecb(&vectors));
        assert!(text.starts_with("ECB vectors: 2/3 passed\n"));
        assert!(text.contains("vector 1 failed at encipher"));
        assert!(text.contains("Expected=0x0000000000000000 (8 bytes)"));
        assert!(text.contains("Actual=0x51866fd5b85ecb8a (8 bytes)"));
    }
}
