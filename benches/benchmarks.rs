use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use cube_algebra::{Bindings, Query};
use serde_json::json;

fn wide_query(cubes: usize) -> Query {
    let mut query = Query::from_json(&json!({"exchange_id": 0, "price": [0, 100]})).unwrap();
    for i in 1..cubes {
        let next = Query::from_json(&json!({
            "exchange_id": i,
            "price": [i as i64, (i as i64) + 100],
            "country": "CA"
        }))
        .unwrap();
        query = query.or(&next).unwrap();
    }
    query
}

pub fn compose_or(c: &mut Criterion) {
    c.bench_function("or_with_absorption", |b| {
        b.iter_batched(
            || {
                (
                    wide_query(50),
                    Query::from_json(&json!({"exchange_id": 25, "price": [30, 40]})).unwrap(),
                )
            },
            |(query, incoming)| {
                let _ = std::hint::black_box(query.or(&incoming));
            },
            BatchSize::SmallInput,
        )
    });
}

pub fn compose_and(c: &mut Criterion) {
    let left = wide_query(20);
    let right = Query::from_json(&json!({"country": "CA", "price": [10, 90]})).unwrap();
    c.bench_function("and_distribution", |b| {
        b.iter(|| {
            let _ = std::hint::black_box(left.and(&right));
        })
    });
}

pub fn factor_and_render(c: &mut Criterion) {
    let query = wide_query(30);
    c.bench_function("factor_and_render", |b| {
        b.iter(|| {
            let _ = std::hint::black_box(query.to_expression_default());
        })
    });
}

pub fn match_items(c: &mut Criterion) {
    let query = wide_query(30);
    let items: Vec<_> = (0..100)
        .map(|i| json!({"exchange_id": i % 40, "price": (i * 3) % 120, "country": "CA"}))
        .collect();
    let matches = query.predicate();
    c.bench_function("match_items", |b| {
        b.iter(|| {
            for item in &items {
                let _ = std::hint::black_box(matches(item));
            }
        })
    });
}

pub fn bind_parameters(c: &mut Criterion) {
    let query = Query::from_json(&json!({
        "price": [{"$": "floor"}, {"$": "ceiling"}],
        "country": {"$": "country"}
    }))
    .unwrap();
    let env = Bindings::new()
        .with_integer("floor", 10)
        .with_integer("ceiling", 90)
        .with_string("country", "CA");
    c.bench_function("bind_parameters", |b| {
        b.iter(|| {
            let _ = std::hint::black_box(query.bind(&env));
        })
    });
}

criterion_group!(
    benches,
    compose_or,
    compose_and,
    factor_and_render,
    match_items,
    bind_parameters
);
criterion_main!(benches);
