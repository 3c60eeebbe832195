use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{NaiveDate, Utc};
use splitledger_core::{ExpenseId, GroupId, MemberId, Money};
use splitledger_events::execute;
use splitledger_groups::{
    AddExpense, CreateGroup, Group, GroupCommand, Identity, Member, MemberBalance,
    minimal_transfers, split_equally,
};

fn roster(size: usize) -> Vec<Member> {
    (0..size)
        .map(|i| {
            Identity {
                id: MemberId::new(),
                name: format!("member{i}"),
                email: format!("member{i}@example.com"),
            }
            .into_member()
        })
        .collect()
}

/// Zero-sum balances alternating creditors and debtors of uneven size.
fn balances(size: usize) -> Vec<MemberBalance> {
    let mut out: Vec<MemberBalance> = (0..size.saturating_sub(1))
        .map(|i| {
            let magnitude = 1_000 + (i as i64 * 137) % 9_000;
            MemberBalance {
                member_id: MemberId::new(),
                balance: Money::from_minor(if i % 2 == 0 { magnitude } else { -magnitude }),
            }
        })
        .collect();
    let total: Money = out.iter().map(|b| b.balance).sum();
    out.push(MemberBalance {
        member_id: MemberId::new(),
        balance: -total,
    });
    out
}

fn bench_minimal_transfers(c: &mut Criterion) {
    let mut group = c.benchmark_group("minimal_transfers");

    for size in [4usize, 16, 64, 256].iter() {
        let sheet = balances(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("members", size), &sheet, |b, sheet| {
            b.iter(|| minimal_transfers(black_box(sheet)).unwrap());
        });
    }

    group.finish();
}

fn bench_equal_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("equal_split");

    for size in [3usize, 12, 48].iter() {
        let members: Vec<MemberId> = (0..*size).map(|_| MemberId::new()).collect();
        let payer = members[0];
        group.bench_with_input(BenchmarkId::new("participants", size), &members, |b, members| {
            b.iter(|| split_equally(black_box(Money::from_minor(100_001)), payer, members).unwrap());
        });
    }

    group.finish();
}

fn bench_record_expense_with_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_expense_with_history");

    for history in [10usize, 100, 1000].iter() {
        let members = roster(6);
        let ids: Vec<MemberId> = members.iter().map(|m| m.id).collect();
        let group_id = GroupId::new();
        let mut aggregate = Group::empty(group_id);
        execute(
            &mut aggregate,
            &GroupCommand::CreateGroup(CreateGroup {
                group_id,
                name: "Bench".to_string(),
                description: "Benchmark group".to_string(),
                founder: members[0].clone(),
                invited: members[1..].to_vec(),
                allow_solo_group: false,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let expense = |i: usize| {
            GroupCommand::AddExpense(AddExpense {
                group_id,
                expense_id: ExpenseId::new(),
                title: format!("expense {i}"),
                amount: Money::from_minor(1_000 + i as i64),
                paid_by: ids[i % ids.len()],
                split_among: ids.clone(),
                date,
                occurred_at: Utc::now(),
            })
        };
        for i in 0..*history {
            execute(&mut aggregate, &expense(i)).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("history", history), &aggregate, |b, aggregate| {
            let cmd = expense(0);
            b.iter(|| {
                let mut g = aggregate.clone();
                execute(&mut g, black_box(&cmd)).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_minimal_transfers,
    bench_equal_split,
    bench_record_expense_with_history
);
criterion_main!(benches);
