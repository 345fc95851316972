use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use wirepack::{Packer, Unpacker};

fn scalar_batch(buf: &mut [u8]) -> usize {
    let mut packer = Packer::new(buf);
    packer.pack_array_size(320).unwrap();
    for i in 0..256u64 {
        packer.pack_unsigned(i * 0x0123_4567).unwrap();
        // interleave a few other scalar shapes
        if i % 8 == 0 {
            packer.pack_double(i as f64 * 0.5).unwrap();
            packer.pack_signed(-(i as i64)).unwrap();
        }
    }
    packer.written().len()
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");

    let mut buf = vec![0u8; 64 * 1024];
    let batch_len = scalar_batch(&mut buf);
    group.throughput(Throughput::Bytes(batch_len as u64));
    group.bench_function("scalar_batch", |b| {
        b.iter(|| {
            black_box(scalar_batch(&mut buf));
        });
    });

    for size in [64usize, 1024, 64 * 1024] {
        let payload = vec![0u8; size];
        let mut buf = vec![0u8; size + 16];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("bin_{size}b"), |b| {
            b.iter(|| {
                let mut packer = Packer::new(&mut buf);
                packer.pack_bin(black_box(&payload)).unwrap();
                black_box(packer.written().len());
            });
        });
    }

    group.finish();
}

fn bench_unpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack");

    let mut buf = vec![0u8; 64 * 1024];
    let batch_len = scalar_batch(&mut buf);
    let encoded = buf[..batch_len].to_vec();
    group.throughput(Throughput::Bytes(batch_len as u64));
    group.bench_function("scalar_batch", |b| {
        b.iter(|| {
            let mut unpacker = Unpacker::new(black_box(&encoded));
            while unpacker.next_item().is_ok() {}
            black_box(unpacker.position());
        });
    });
    group.bench_function("scalar_batch_skip", |b| {
        b.iter(|| {
            let mut unpacker = Unpacker::new(black_box(&encoded));
            unpacker.skip_items(1).unwrap();
            black_box(unpacker.position());
        });
    });

    for size in [64usize, 1024, 64 * 1024] {
        let payload = vec![0u8; size];
        let mut buf = vec![0u8; size + 16];
        let mut packer = Packer::new(&mut buf);
        packer.pack_bin(&payload).unwrap();
        let encoded = packer.written().to_vec();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("bin_{size}b"), |b| {
            b.iter(|| {
                let mut unpacker = Unpacker::new(black_box(&encoded));
                black_box(unpacker.next_item().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pack, bench_unpack);
criterion_main!(benches);
