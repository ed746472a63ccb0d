use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bowtie_rust::align::{Backtracker, HitSink, RawHit, SearchPolicy};
use bowtie_rust::index::fm::Ebwt;
use bowtie_rust::index::reference::{write_ref_image, BitPackedReference};
use bowtie_rust::index::sa;
use bowtie_rust::util::dna;

struct NullSink;

impl HitSink for NullSink {
    fn report_chase_one(&mut self, _hit: &RawHit<'_>) -> bool {
        true
    }
}

fn make_reference(len: usize) -> Vec<u8> {
    let mut seq = Vec::with_capacity(len);
    let mut x: u32 = 42;
    for _ in 0..len {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        seq.push(((x >> 16) % 4) as u8);
    }
    seq
}

fn build_ebwt(codes: &[u8]) -> Ebwt {
    let seqs = vec![("bench".to_string(), codes.to_vec())];
    Ebwt::build_reversed(&seqs, 128, 5)
}

fn bench_backtrack_exact(c: &mut Criterion) {
    let reference = make_reference(10_000);
    let ebwt = build_ebwt(&reference);
    let read: Vec<u8> = reference[500..532].iter().rev().copied().collect();
    let policy = SearchPolicy { unrev_off: 32, one_rev_off: 32, two_rev_off: 32, qual_thresh: 0, ..SearchPolicy::default() };
    let mut bt = Backtracker::new(&ebwt, policy);

    c.bench_function("backtrack_exact_32bp", |b| {
        b.iter(|| {
            bt.set_query(black_box(&read), &[], "bench", &[]);
            black_box(bt.backtrack(0, &mut NullSink));
        })
    });
}

fn bench_backtrack_one_mismatch(c: &mut Criterion) {
    let reference = make_reference(10_000);
    let ebwt = build_ebwt(&reference);
    let mut read: Vec<u8> = reference[500..532].iter().rev().copied().collect();
    read[10] = (read[10] + 1) % 4;
    let policy = SearchPolicy { unrev_off: 0, one_rev_off: 32, two_rev_off: 32, qual_thresh: 40, ..SearchPolicy::default() };
    let mut bt = Backtracker::new(&ebwt, policy);

    c.bench_function("backtrack_one_mismatch_32bp", |b| {
        b.iter(|| {
            bt.set_query(black_box(&read), &[], "bench", &[]);
            black_box(bt.backtrack(0, &mut NullSink));
        })
    });
}

fn bench_reference_access(c: &mut Criterion) {
    // N 段与明确碱基密集交替，逼出记录扫描的最坏情形
    let mut codes = Vec::with_capacity(30_000);
    let plain = make_reference(30_000);
    for (i, &b) in plain.iter().enumerate() {
        codes.push(b);
        if i % 7 == 0 {
            codes.push(dna::BASE_AMBIG);
        }
    }
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("bench").to_str().unwrap().to_string();
    write_ref_image(&prefix, &[codes.clone()]).unwrap();
    let bpr = BitPackedReference::load(&prefix).unwrap();
    let n = bpr.approx_len(0);

    c.bench_function("get_base_scattered", |b| {
        let mut off = 1u32;
        b.iter(|| {
            off = (off.wrapping_mul(2_654_435_761)) % n;
            black_box(bpr.get_base(0, black_box(off)));
        })
    });

    c.bench_function("get_stretch_100bp", |b| {
        let mut dest = vec![0u8; 100];
        let mut off = 1u32;
        b.iter(|| {
            off = (off.wrapping_mul(2_654_435_761)) % (n - 100);
            bpr.get_stretch(black_box(&mut dest), 0, off, 100);
            black_box(dest[0]);
        })
    });
}

fn bench_build_sa(c: &mut Criterion) {
    let text: Vec<u8> = make_reference(10_000)
        .into_iter()
        .map(dna::code_to_letter)
        .chain(std::iter::once(0u8))
        .collect();

    c.bench_function("build_sa_10k", |b| {
        b.iter(|| {
            black_box(sa::build_sa(black_box(&text)));
        })
    });
}

criterion_group!(
    benches,
    bench_backtrack_exact,
    bench_backtrack_one_mismatch,
    bench_reference_access,
    bench_build_sa
);
criterion_main!(benches);
