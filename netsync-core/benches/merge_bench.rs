//! Benchmarks for the ordered merge over large snapshots.
//!
//! Measures a network-sized diff where half the keys overlap, and a full
//! engine pass against in-memory collaborators with nothing to change.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

use netsync_core::agent::{AgentRegistry, LoopbackConnector};
use netsync_core::controller::{InMemoryController, MutationGateway};
use netsync_core::model::ReservedNames;
use netsync_core::platform::{IpPool, PlatformVm, PortGroup, PrivateVlan, StaticInventory};
use netsync_core::reconcile::{merge, MergeStep};
use netsync_core::ReconcileEngine;

fn keyed(range: std::ops::Range<u128>) -> BTreeMap<Uuid, u128> {
    range.map(|n| (Uuid::from_u128(n * 7919), n)).collect()
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    for size in [100u128, 1_000, 10_000] {
        let source = keyed(0..size);
        let current = keyed(size / 2..size + size / 2);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut matched = 0usize;
                for step in merge(black_box(&source), black_box(&current)) {
                    if let MergeStep::Matched(..) = step {
                        matched += 1;
                    }
                }
                matched
            })
        });
    }
    group.finish();
}

fn bench_steady_pass(c: &mut Criterion) {
    let inventory = StaticInventory::new();
    inventory.set_agent("esx-1", Ipv4Addr::new(172, 16, 0, 10));
    for net in 0..20u8 {
        let key = format!("dvpg-{}", net);
        inventory.add_port_group(PortGroup {
            key: key.clone(),
            name: format!("vn-{}", net),
            private_vlan: Some(PrivateVlan {
                primary: 100,
                isolated: 200 + net as u16,
            }),
            ip_pool: Some(IpPool {
                subnet: Ipv4Addr::new(10, net, 0, 0),
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: Ipv4Addr::new(10, net, 0, 1),
            }),
        });
        for vm in 0..20u8 {
            let _ = inventory.add_vm(
                &key,
                PlatformVm {
                    instance_uuid: Some(Uuid::from_u128(((net as u128) << 8) | vm as u128).to_string()),
                    name: format!("vm-{}-{}", net, vm),
                    mac: Some(format!("00:50:56:00:{:02x}:{:02x}", net, vm)),
                    host: "esx-1".to_string(),
                },
            );
        }
    }

    let gateway = MutationGateway::new(
        InMemoryController::new(),
        vec!["default-domain".to_string(), "vCenter".to_string()],
        "vCenter-ipam",
    );
    let mut engine = ReconcileEngine::new(
        inventory,
        gateway,
        AgentRegistry::new(LoopbackConnector::new()),
        ReservedNames::default(),
        "ContrailVM",
    );
    let _ = engine.run_pass();

    c.bench_function("steady_pass_400_vms", |b| {
        b.iter(|| black_box(engine.run_pass().map(|r| r.actions())))
    });
}

criterion_group!(benches, bench_merge, bench_steady_pass);
criterion_main!(benches);
