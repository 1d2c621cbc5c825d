use criterion::{criterion_group, criterion_main, Criterion};
use fandex_core::tokenizer::tokenize;

const PAGE: &str = "Natasha Alianovna Romanoff, also known as the Black Widow, is a former \
KGB agent turned S.H.I.E.L.D. operative. Trained in the Red Room from childhood, she is an \
expert in espionage, infiltration and hand-to-hand combat, and a founding member of the Avengers.";

fn bench_tokenize(c: &mut Criterion) {
    let text = PAGE.repeat(64);
    c.bench_function("tokenize_wiki_page", |b| b.iter(|| tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
