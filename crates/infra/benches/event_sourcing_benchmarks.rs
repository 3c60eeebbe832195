use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::NaiveDate;
use splitledger_core::{GroupId, MemberId, Money};
use splitledger_groups::AGGREGATE_TYPE;
use splitledger_infra::command_dispatcher::AggregateRepository;
use splitledger_infra::event_store::EventStore;
use splitledger_infra::{GroupLedger, InMemoryGroupLedger, LedgerConfig, NewExpense};

fn expense(paid_by: MemberId, split_among: &[MemberId], minor: i64) -> NewExpense {
    NewExpense {
        title: "Bench".to_string(),
        amount: Money::from_minor(minor),
        paid_by,
        split_among: split_among.to_vec(),
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    }
}

/// Ledger with one group of `members` members and `expenses` recorded expenses.
fn seeded(members: usize, expenses: usize) -> (InMemoryGroupLedger, GroupId, Vec<MemberId>) {
    let ledger = GroupLedger::in_memory(LedgerConfig::default());
    let founder = ledger.register_member("Founder", "founder@example.com").unwrap();
    let invited: Vec<String> = (1..members).map(|i| format!("m{i}@example.com")).collect();
    let group = ledger
        .create_group("Bench", "Benchmark group", founder, invited)
        .unwrap();
    let ids: Vec<MemberId> = group.members().iter().map(|m| m.id).collect();
    let gid = group.id_typed();

    for i in 0..expenses {
        let payer = ids[i % ids.len()];
        ledger
            .add_expense(gid, expense(payer, &ids, 1_000 + i as i64))
            .unwrap();
    }
    (ledger, gid, ids)
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");

    group.bench_function("create_group_fresh", |b| {
        let ledger = GroupLedger::in_memory(LedgerConfig::default());
        let founder = ledger.register_member("Founder", "founder@example.com").unwrap();
        b.iter(|| {
            ledger
                .create_group(
                    black_box("Trip"),
                    "Weekend",
                    founder.clone(),
                    vec!["friend@example.com".to_string()],
                )
                .unwrap();
        });
    });

    for history in [0usize, 100, 1_000] {
        group.bench_with_input(
            BenchmarkId::new("add_expense_with_history", history),
            &history,
            |b, &history| {
                let (ledger, gid, ids) = seeded(4, history);
                b.iter(|| {
                    ledger
                        .add_expense(gid, expense(ids[0], black_box(&ids), 999))
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_group_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_replay");

    for events in [10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(events as u64));
        group.bench_with_input(BenchmarkId::from_parameter(events), &events, |b, &events| {
            let (ledger, gid, _) = seeded(6, events);
            b.iter(|| {
                let loaded = ledger.repository().load(black_box(gid.into())).unwrap();
                black_box(loaded);
            });
        });
    }

    group.finish();
}

fn bench_directory_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_directory_rebuild");
    group.sample_size(20);

    for expenses in [100usize, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(expenses),
            &expenses,
            |b, &expenses| {
                let (ledger, _, _) = seeded(6, expenses);
                let streams = ledger
                    .repository()
                    .store()
                    .stream_ids(AGGREGATE_TYPE)
                    .unwrap()
                    .len();
                assert_eq!(streams, 1);
                b.iter(|| ledger.rebuild_read_models().unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_group_replay,
    bench_directory_rebuild
);
criterion_main!(benches);
