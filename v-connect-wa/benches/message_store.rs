//! 消息存储基准测试 / Message store benchmark
//!
//! 满容量时的插入（含批量淘汰）与回查
//! Inserts at capacity (with bulk eviction) and lookups

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use v_connect_wa::cache::{MessageStore, StoredMessage};
use v_connect_wa::domain::MessageContent;

fn message(n: usize) -> StoredMessage {
    StoredMessage {
        id: format!("3EB0{:08X}", n),
        remote_jid: format!("55119{:08}@s.whatsapp.net", n % 200),
        from_me: n % 3 == 0,
        timestamp: 1_700_000_000 + n as i64,
        content: MessageContent::Text {
            text: "Olá, tudo bem? Segue o orçamento combinado.".to_string(),
        },
    }
}

fn benchmark_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for &(capacity, batch) in &[(5_000usize, 500usize), (5_000, 1)] {
        group.bench_function(BenchmarkId::new("at_capacity", format!("{}/{}", capacity, batch)), |b| {
            let store = MessageStore::new(capacity, batch);
            for n in 0..capacity {
                store.insert(message(n));
            }
            let mut n = capacity;
            b.iter(|| {
                n += 1;
                black_box(store.insert(message(n)))
            });
        });
    }
    group.finish();
}

fn benchmark_lookup(c: &mut Criterion) {
    let store = MessageStore::new(5_000, 500);
    for n in 0..5_000 {
        store.insert(message(n));
    }
    let hit = message(4_321);
    let mut group = c.benchmark_group("lookup");
    group.bench_function("hit", |b| {
        b.iter(|| black_box(store.get(&hit.id, &hit.remote_jid)))
    });
    group.bench_function("miss", |b| {
        b.iter(|| black_box(store.get("3EB0FFFFFFFF", "0@s.whatsapp.net")))
    });
    group.finish();
}

criterion_group!(benches, benchmark_insert, benchmark_lookup);
criterion_main!(benches);
