//! Performance benchmarks for the path codec and subtree moves.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use stowage_core::db::{MemoryStore, PathCodec};
use stowage_core::models::{MovePosition, NewNode, NodeType, SiblingOrder, TreeConfig};
use stowage_core::services::TreeService;
use tokio::runtime::Runtime;

fn bench_path_codec(c: &mut Criterion) {
    c.bench_function("path_codec_round_trip_1k", |b| {
        b.iter(|| {
            for ordinal in 0..1000u32 {
                let segment = PathCodec::encode(ordinal).unwrap();
                black_box(PathCodec::decode(&segment).unwrap());
            }
        })
    });
}

fn bench_move_subtree(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("move_subtree_of_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = Arc::new(MemoryStore::new());
                let tree = TreeService::new(
                    store,
                    TreeConfig {
                        sibling_order: SiblingOrder::Insertion,
                    },
                );

                let source = tree
                    .create_root(NewNode::new("Source", NodeType::House))
                    .await
                    .unwrap();
                let target = tree
                    .create_root(NewNode::new("Target", NodeType::House))
                    .await
                    .unwrap();
                let hub = tree
                    .create_child(&source.id, NewNode::new("Hub", NodeType::Room))
                    .await
                    .unwrap();
                for i in 0..100 {
                    tree.create_child(
                        &hub.id,
                        NewNode::new(format!("box {}", i), NodeType::Box),
                    )
                    .await
                    .unwrap();
                }

                tree.move_node(&hub.id, Some(&target.id), MovePosition::LastChild)
                    .await
                    .unwrap();
            })
        })
    });
}

criterion_group!(benches, bench_path_codec, bench_move_subtree);
criterion_main!(benches);
