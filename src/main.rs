use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use blowfish_modes::bench::{self, BenchConfig};
use blowfish_modes::selftest::{self, ChainVector, TestVector};
use blowfish_modes::{report, BlowfishError, Context, Direction, Mode, ReturnCode};

#[derive(Parser)]
#[clap(name = "blowfish", about = "Blowfish known-answer tests, throughput and modes")]
struct Cli {
    /// Log level; overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<LevelFilter>,

    /// Size of the rayon pool. Defaults to one thread per core.
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the published ECB vectors and the chaining-mode vectors.
    Selftest,
    /// Measure throughput per mode.
    Bench(BenchArgs),
    /// Encrypt hex data and print the ciphertext as hex.
    Encrypt(CryptArgs),
    /// Decrypt hex data and print the plaintext as hex.
    Decrypt(CryptArgs),
}

#[derive(Args)]
struct BenchArgs {
    /// Mode to measure, by name or numeric id. Repeatable; defaults to all five.
    #[arg(long = "mode", value_parser = parse_mode)]
    modes: Vec<Mode>,

    #[arg(long, default_value_t = bench::DEFAULT_DURATION.as_secs())]
    duration_secs: u64,

    #[arg(long, default_value_t = bench::DEFAULT_CHUNK_LEN)]
    chunk_len: usize,

    /// Skip the parallel runs for ECB and CTR.
    #[arg(long)]
    serial: bool,
}

#[derive(Args)]
struct CryptArgs {
    /// 4 to 56 key bytes as hex.
    #[arg(long)]
    key: HexBytes,

    #[arg(long, value_parser = parse_mode)]
    mode: Mode,

    /// 8 IV bytes as hex. Required by every mode except ECB.
    #[arg(long)]
    iv: Option<HexBytes>,

    /// Refuse keys that produce a degenerate S-box.
    #[arg(long)]
    reject_weak: bool,

    /// Print only the output bytes.
    #[arg(long)]
    raw: bool,

    data: HexBytes,
}

/// Hex input with an optional `0x` prefix.
#[derive(Clone, Debug)]
struct HexBytes(Vec<u8>);

impl FromStr for HexBytes {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(s).map(HexBytes)
    }
}

fn parse_mode(s: &str) -> Result<Mode, BlowfishError> {
    match s.parse::<u8>() {
        Ok(id) => Mode::try_from(id),
        Err(_) => s.parse(),
    }
}

fn init_tracing(level: Option<LevelFilter>) {
    let filter = match level {
        Some(level) => EnvFilter::default().add_directive(level.into()),
        None => EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_selftest() -> ReturnCode {
    let reports = [
        selftest::run_ecb(TestVector::standard()),
        selftest::run_chain(ChainVector::standard()),
    ];
    for r in &reports {
        print!("{}", report::selftest(r));
    }

    let code = reports
        .iter()
        .map(|r| r.return_code())
        .find(|code| !code.is_success())
        .unwrap_or(ReturnCode::Success);
    println!("{}", report::return_code_line("selftest", code));
    code
}

fn run_bench(args: BenchArgs) -> Result<(), BlowfishError> {
    let modes = if args.modes.is_empty() {
        Mode::ALL.to_vec()
    } else {
        args.modes
    };
    let config = BenchConfig {
        duration: Duration::from_secs(args.duration_secs),
        chunk_len: args.chunk_len,
        parallel: !args.serial,
    };
    info!(
        threads = rayon::current_num_threads(),
        ?config,
        "starting benchmark"
    );

    for mode in modes {
        println!("{}", report::mode_line(mode));
        for result in bench::run_suite(&[mode], &config)? {
            println!("  {}", report::benchmark(&result));
        }
    }
    Ok(())
}

fn run_crypt(args: CryptArgs, direction: Direction) -> Result<(), BlowfishError> {
    let iv = args.iv.as_ref().map(|iv| iv.0.as_slice());
    let mut ctx = Context::new(&args.key.0, args.mode, iv)?;
    if args.reject_weak {
        ctx.ensure_strong_key()?;
    }

    let mut buf = args.data.0;
    ctx.process_auto(&mut buf, direction)?;
    ctx.exit();

    if args.raw {
        println!("{}", hex::encode(&buf));
    } else {
        println!("{}", report::mode_line(args.mode));
        println!("{}", report::hex_buffer("Key", &args.key.0));
        if let Some(iv) = iv {
            println!("{}", report::hex_buffer("IV", iv));
        }
        println!("{}", report::hex_buffer("Output", &buf));
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    if let Some(threads) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            error!("could not size thread pool: {e}");
            return ExitCode::from(ReturnCode::InvalidParameter.code());
        }
    }

    let (operation, result) = match cli.command {
        Commands::Selftest => return ExitCode::from(run_selftest().code()),
        Commands::Bench(args) => ("bench", run_bench(args)),
        Commands::Encrypt(args) => ("encrypt", run_crypt(args, Direction::Encrypt)),
        Commands::Decrypt(args) => ("decrypt", run_crypt(args, Direction::Decrypt)),
    };

    let code = ReturnCode::from(&result);
    if let Err(e) = result {
        error!("{operation} failed: {e}");
        eprintln!("{}", report::return_code_line(operation, code));
    }
    ExitCode::from(code.code())
}
