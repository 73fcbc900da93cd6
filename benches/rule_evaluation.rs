use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use formwright::domain::{
    FieldDefinition, FieldType, FormDefinition, ValidationRules, VisibilityCondition,
};
use formwright::persistence::DatabaseBackend;
use formwright::schema::{evaluate_entry, DdlGenerator, EntryValues, FieldSchemaBuilder, Formula};

/// A form with `width` number fields, a running total over them and a
/// visibility chain hanging off a boolean switch
fn wide_form(width: usize) -> FormDefinition {
    let mut fields = vec![FieldDefinition::new("enabled", "Enabled", 0, FieldType::Boolean)];
    for i in 0..width {
        let mut field = FieldDefinition::new(
            format!("amount_{}", i),
            format!("Amount {}", i),
            i + 1,
            FieldType::Number,
        )
        .with_rules(ValidationRules::required().with_range(Some(0.0), Some(10_000.0)));
        if i % 2 == 1 {
            field = field.with_visibility(VisibilityCondition::equals("enabled", "yes"));
        }
        fields.push(field);
    }

    let total = (0..width)
        .map(|i| format!("amount_{}", i))
        .collect::<Vec<_>>()
        .join(" + ");
    fields.push(
        FieldDefinition::new("total", "Total", width + 1, FieldType::Number).with_formula(total),
    );

    FormDefinition {
        id: None,
        table_name: "bench_form".to_string(),
        label: "Bench".to_string(),
        fields,
        navigation_entry_id: None,
        dashboard_entry_id: "dash".to_string(),
        district_id: None,
        created_by: "bench".to_string(),
        created_at: Utc::now(),
    }
}

fn entry(width: usize) -> EntryValues {
    let mut values: EntryValues = (0..width)
        .map(|i| (format!("amount_{}", i), (i * 7).to_string()))
        .collect();
    values.insert("enabled".to_string(), "yes".to_string());
    values
}

fn benchmark_evaluate_entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_entry");

    for width in [5usize, 25, 100] {
        let definition = wide_form(width);
        let values = entry(width);
        group.throughput(Throughput::Elements(definition.fields.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| black_box(evaluate_entry(black_box(&definition), black_box(&values))));
        });
    }

    group.finish();
}

fn benchmark_formula_parse(c: &mut Criterion) {
    let source = "(amount_0 + amount_1) * 2 - amount_2 / 4 + amount_3";
    c.bench_function("formula_parse", |b| {
        b.iter(|| black_box(Formula::parse(black_box(source))))
    });
}

fn benchmark_schema_build(c: &mut Criterion) {
    let mut grid = vec![(0..40).map(|i| format!("Column Header {}", i % 10)).collect::<Vec<_>>()];
    for row in 0..50 {
        grid.push((0..40).map(|i| (row * i).to_string()).collect());
    }
    let builder = FieldSchemaBuilder::new();

    c.bench_function("field_schema_build", |b| {
        b.iter(|| black_box(builder.build(black_box(&grid))))
    });
}

fn benchmark_create_statement(c: &mut Criterion) {
    let definition = wide_form(100);
    let generator = DdlGenerator::new(DatabaseBackend::Postgres);

    c.bench_function("build_create_statement", |b| {
        b.iter(|| black_box(generator.build_create_statement(black_box(&definition))))
    });
}

criterion_group!(
    benches,
    benchmark_evaluate_entry,
    benchmark_formula_parse,
    benchmark_schema_build,
    benchmark_create_statement
);
criterion_main!(benches);
