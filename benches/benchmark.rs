use blowfish_modes::{Blowfish, Context, Direction, Mode};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";
const IV: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
const MIB: usize = 1024 * 1024;

fn key_setup(c: &mut Criterion) {
    c.bench_function("Blowfish key setup", |b| {
        b.iter(|| {
            let _bf = black_box(Blowfish::new(black_box(KEY))).unwrap();
        })
    });
}

fn ecb_1m(c: &mut Criterion) {
    c.bench_function("Blowfish encrypt 1M (ECB)", |b| {
        let bf = Blowfish::new(KEY).unwrap();
        let mut buff = vec![0_u8; MIB];
        b.iter(|| {
            buff.chunks_exact_mut(8).for_each(|chunk| {
                bf.encrypt_block(chunk.try_into().unwrap());
            });
        })
    });
}

fn modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("encrypt 1M");
    group.throughput(Throughput::Bytes(MIB as u64));

    for mode in Mode::ALL {
        let mut ctx = Context::new(KEY, mode, Some(&IV)).unwrap();
        let mut buff = vec![0_u8; MIB];
        group.bench_function(BenchmarkId::new("serial", mode), |b| {
            b.iter(|| ctx.process(black_box(&mut buff), Direction::Encrypt).unwrap())
        });

        if mode.is_parallel_safe() {
            group.bench_function(BenchmarkId::new("parallel", mode), |b| {
                b.iter(|| {
                    ctx.process_par(black_box(&mut buff), Direction::Encrypt)
                        .unwrap()
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, key_setup, ecb_1m, modes);
criterion_main!(benches);
