//! Benchmarks for registry notification and binding fan-out.
//!
//! Run with: cargo bench -p ftui-connect --bench notify_bench

use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ftui_connect::{
    BindingTable, Connect, ConnectOptions, DeriveFn, Dispatch, FactoryOptions, ListenerRegistry,
    MapToProps, NodeId, NodeInit, PlainObject, PropsUpdate, ReducerStore, Store, connect_advanced,
};

#[derive(Debug)]
struct Board {
    cells: Vec<u32>,
    tick: u64,
}

enum Action {
    Tick,
    Set(usize, u32),
}

type BoardStore = ReducerStore<Board, Action>;

fn board_store(size: usize) -> Rc<BoardStore> {
    Rc::new(ReducerStore::new(
        Board {
            cells: vec![0; size],
            tick: 0,
        },
        |s: &Rc<Board>, a: &Action| match a {
            Action::Tick => Rc::new(Board {
                cells: s.cells.clone(),
                tick: s.tick + 1,
            }),
            Action::Set(i, v) => {
                let mut cells = s.cells.clone();
                cells[*i] = *v;
                Rc::new(Board { cells, tick: s.tick })
            }
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Default)]
struct CellProps {
    value: u32,
}

impl PlainObject for CellProps {}

fn bench_registry_notify(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry/notify");

    for n in [16usize, 256, 4096] {
        group.throughput(Throughput::Elements(n as u64));
        let registry = ListenerRegistry::new();
        let hits = Rc::new(Cell::new(0u64));
        for _ in 0..n {
            let hits = Rc::clone(&hits);
            registry.subscribe(Rc::new(move || {
                hits.set(hits.get() + 1);
                Ok(())
            }));
        }
        group.bench_with_input(BenchmarkId::new("pass", n), &(), |b, _| {
            b.iter(|| black_box(registry.notify()))
        });
    }

    group.finish();
}

/// Raw derivation memoized on state identity.
fn tick_factory(
    _dispatch: Dispatch<Action>,
    _options: &FactoryOptions,
) -> DeriveFn<Board, usize, u64> {
    Box::new(|state: &Rc<Board>, _: &usize| Ok(Rc::new(state.tick)))
}

fn bench_flat_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("binding/flat_fanout");

    for n in [16usize, 256, 1024] {
        group.throughput(Throughput::Elements(n as u64));
        let store = board_store(n);
        let connected = connect_advanced(
            Some(Rc::clone(&store)),
            tick_factory,
            ConnectOptions::default(),
        )
        .wrap("Tick");
        let table = BindingTable::new();
        for i in 0..n {
            let id = table
                .initialize(&connected, NodeInit::new(NodeId(i as u64), i, |u: PropsUpdate<u64>| {
                    black_box(u.props);
                }))
                .unwrap();
            table.activate(id).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("dispatch_all_render", n), &(), |b, _| {
            b.iter(|| black_box(store.dispatch(Action::Tick)))
        });
    }

    group.finish();
}

fn bench_connect_skip(c: &mut Criterion) {
    let mut group = c.benchmark_group("connect/skip_unrelated");

    for n in [16usize, 256, 1024] {
        group.throughput(Throughput::Elements(n as u64));
        let store = board_store(n);
        let connected = Connect::new(
            MapToProps::from_state_and_props(|s: &Board, own: &usize| CellProps {
                value: s.cells[*own],
            }),
            MapToProps::dispatch_only(),
        )
        .connect_to(Some(Rc::clone(&store)))
        .wrap("Cell");
        let table = BindingTable::new();
        for i in 0..n {
            let id = table
                .initialize(&connected, NodeInit::new(NodeId(i as u64), i, |u: PropsUpdate<_>| {
                    black_box(u.props);
                }))
                .unwrap();
            table.activate(id).unwrap();
        }
        let mut next = 0u32;
        group.bench_with_input(BenchmarkId::new("dispatch_one_changes", n), &(), |b, _| {
            b.iter(|| {
                next = next.wrapping_add(1);
                black_box(store.dispatch(Action::Set(0, next)))
            })
        });
    }

    group.finish();
}

fn bench_nested_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("binding/nested_chain");

    for depth in [4usize, 32, 128] {
        group.throughput(Throughput::Elements(depth as u64));
        let store = board_store(1);
        let connected = connect_advanced(
            Some(Rc::clone(&store)),
            tick_factory,
            ConnectOptions::default(),
        )
        .wrap("Tick");
        let table = BindingTable::new();
        let mut parent = None;
        let mut ids = Vec::with_capacity(depth);
        for i in 0..depth {
            let mut init = NodeInit::new(NodeId(i as u64), i, |u: PropsUpdate<u64>| {
                black_box(u.props);
            });
            if let Some(sub) = parent.take() {
                init = init.with_parent(sub);
            }
            let id = table.initialize(&connected, init).unwrap();
            parent = table.subscription(id);
            ids.push(id);
        }
        for id in ids.iter().rev() {
            table.activate(*id).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("dispatch", depth), &(), |b, _| {
            b.iter(|| black_box(store.dispatch(Action::Tick)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_registry_notify,
    bench_flat_fanout,
    bench_connect_skip,
    bench_nested_chain,
);

criterion_main!(benches);
