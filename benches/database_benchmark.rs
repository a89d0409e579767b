use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;

use quarrydb::analysis::analyzer::AnalyzerRegistry;
use quarrydb::collection::CollectionManager;
use quarrydb::core::types::{FieldValue, InsertMode};
use quarrydb::schema::{FieldDefinition, FieldType, Schema};
use quarrydb::search::executor::{FieldSpec, SearchRequest};
use quarrydb::storage::StorageLayout;
use quarrydb::store::{KvStore, MemKvStore};

fn words(n: usize) -> String {
    let mut rng = rand::thread_rng();
    let pool = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];
    (0..n).map(|_| pool[rng.gen_range(0..pool.len())]).collect::<Vec<_>>().join(" ")
}

fn open_manager() -> (tempfile::TempDir, CollectionManager) {
    let tmp = tempfile::tempdir().unwrap();
    let storage = Arc::new(StorageLayout::new(tmp.path().to_path_buf()).unwrap());
    let kv: Arc<dyn KvStore> = Arc::new(MemKvStore::new());
    let analyzers = Arc::new(AnalyzerRegistry::new());
    let manager = CollectionManager::open(storage, kv, analyzers).unwrap();

    let schema = Schema::new()
        .add_field(FieldDefinition::new("title", FieldType::String))
        .unwrap()
        .add_field(FieldDefinition::new("content", FieldType::String).infix())
        .unwrap()
        .add_field(FieldDefinition::new("category", FieldType::String).faceted())
        .unwrap()
        .add_field(FieldDefinition::new("score", FieldType::Float).sortable())
        .unwrap();
    manager.create("docs", schema).unwrap();
    (tmp, manager)
}

fn fields_for(id: u64) -> HashMap<String, FieldValue> {
    let mut rng = rand::thread_rng();
    let mut fields = HashMap::new();
    fields.insert("title".to_string(), FieldValue::Text(format!("Document {id}")));
    fields.insert("content".to_string(), FieldValue::Text(words(100)));
    fields.insert("category".to_string(), FieldValue::Text(format!("category_{}", id % 10)));
    fields.insert("score".to_string(), FieldValue::Float(rng.gen_range(0.0..100.0)));
    fields
}

fn bench_single_insert(c: &mut Criterion) {
    let (_tmp, manager) = open_manager();
    let mut id = 0u64;
    c.bench_function("single_document_insert", |b| {
        b.iter(|| {
            manager.add("docs", Some(id.to_string()), fields_for(id), InsertMode::Reject, false).unwrap();
            id += 1;
        });
    });
}

fn bench_batch_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_insert");

    for batch_size in [10, 50, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), batch_size, |b, &batch_size| {
            let (_tmp, manager) = open_manager();
            let mut id_counter = 0u64;

            b.iter(|| {
                for _ in 0..batch_size {
                    manager.add("docs", Some(id_counter.to_string()), fields_for(id_counter), InsertMode::Reject, false).unwrap();
                    id_counter += 1;
                }
                manager.flush("docs").unwrap();
            });
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let (_tmp, manager) = open_manager();
    for i in 0..1000u64 {
        manager.add("docs", Some(i.to_string()), fields_for(i), InsertMode::Reject, false).unwrap();
    }
    manager.flush("docs").unwrap();

    let mut group = c.benchmark_group("search");

    let run = |query: &str, fields: Vec<FieldSpec>| {
        let mut request = SearchRequest { query: query.to_string(), ..SearchRequest::default() };
        request.query_by = fields;
        request
    };

    group.bench_function("simple_term_search", |b| {
        let request = run("fox", vec![FieldSpec::new("content")]);
        b.iter(|| black_box(manager.search("docs", &request).unwrap()));
    });

    group.bench_function("prefix_search", |b| {
        let mut spec = FieldSpec::new("title");
        spec.prefix = true;
        let request = run("Doc", vec![spec]);
        b.iter(|| black_box(manager.search("docs", &request).unwrap()));
    });

    group.bench_function("category_facet_search", |b| {
        let request = SearchRequest {
            query: "*".to_string(),
            facet_by: vec!["category".to_string()],
            filter_by: Some("category:=category_5".to_string()),
            ..SearchRequest::default()
        };
        b.iter(|| black_box(manager.search("docs", &request).unwrap()));
    });

    group.bench_function("numeric_range_filter", |b| {
        let request =
            SearchRequest { query: "*".to_string(), filter_by: Some("score>=25 && score<=75".to_string()), ..SearchRequest::default() };
        b.iter(|| black_box(manager.search("docs", &request).unwrap()));
    });

    group.bench_function("fuzzy_search_distance_1", |b| {
        let mut spec = FieldSpec::new("content");
        spec.typo_budget = 1;
        let request = run("quik", vec![spec]);
        b.iter(|| black_box(manager.search("docs", &request).unwrap()));
    });

    group.finish();
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    group.sample_size(10);

    group.bench_function("index_throughput", |b| {
        b.iter_custom(|iters| {
            let (_tmp, manager) = open_manager();
            let mut id = 0u64;

            let start = Instant::now();
            for _ in 0..iters {
                for _ in 0..100 {
                    manager.add("docs", Some(id.to_string()), fields_for(id), InsertMode::Reject, false).unwrap();
                    id += 1;
                }
                if id % 1000 == 0 {
                    manager.flush("docs").unwrap();
                }
            }
            manager.flush("docs").unwrap();
            start.elapsed()
        });
    });

    group.bench_function("query_throughput", |b| {
        let (_tmp, manager) = open_manager();
        for i in 0..5000u64 {
            manager.add("docs", Some(i.to_string()), fields_for(i), InsertMode::Reject, false).unwrap();
        }
        manager.flush("docs").unwrap();
        manager.commit("docs").unwrap();

        let request = SearchRequest { query: "fox".to_string(), query_by: vec![FieldSpec::new("content")], ..SearchRequest::default() };

        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for _ in 0..100 {
                    black_box(manager.search("docs", &request).unwrap());
                }
            }
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_single_insert, bench_batch_insert, bench_search, bench_throughput);
criterion_main!(benches);
