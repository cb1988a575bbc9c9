use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::{constants::DIFFICULTY, pow::find_proof, Block, Transaction};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;

fn bench_pow(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let txs: Vec<Transaction> = (0..10)
        .map(|i| {
            let mut tx = Transaction::new();
            tx.insert("author".into(), json!(format!("alice-{i}")));
            tx.insert("content".into(), json!(rng.gen_range(1..1_000)));
            tx
        })
        .collect();
    let block = Block::new(1, txs, 1_600_000_000.0, Block::genesis().hash_str());

    c.bench_function("find_proof_difficulty_2", |b| {
        b.iter(|| {
            let mut candidate = block.clone();
            find_proof(&mut candidate, DIFFICULTY)
        });
    });

    c.bench_function("find_proof_difficulty_4", |b| {
        b.iter(|| {
            let mut candidate = block.clone();
            find_proof(&mut candidate, 4)
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
