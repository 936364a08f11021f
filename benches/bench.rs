// Criterion benchmarks for Cast Scout

use cast_scout::core::{
    build_filter_plan, matches_filter, rank_candidates,
    vocabulary::{LocationCode, SkillCategory},
    CandidateRetriever, KeywordInterpreter, RetrieverSettings,
};
use cast_scout::models::{CandidateProfile, CompletenessWeights, ParsedQuery, Skill};
use cast_scout::services::InMemoryCandidateStore;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

const SKILLS: &[&str] = &["Boxing", "Precision Driving", "High Falls", "Ballet", "Horse Riding"];
const LOCATIONS: &[&str] = &["atlanta-ga", "los-angeles-ca", "new-york-ny", "vancouver-bc"];

fn create_candidate(id: usize) -> CandidateProfile {
    CandidateProfile {
        id: id.to_string(),
        first_name: format!("Performer {}", id),
        bio: (id % 2 == 0).then(|| "Stunt performer".to_string()),
        gender: Some(if id % 2 == 0 { "female" } else { "male" }.to_string()),
        height_inches: Some(60 + (id % 16) as u16),
        weight_lbs: Some(120 + (id % 80) as u16),
        location: Some(LOCATIONS[id % LOCATIONS.len()].to_string()),
        travel_radius: Some("national".to_string()),
        skills: vec![Skill {
            name: SKILLS[id % SKILLS.len()].to_string(),
            level: None,
        }],
        photo_urls: if id % 3 == 0 { vec![format!("https://img.example.com/{}.jpg", id)] } else { vec![] },
        is_visible: true,
        ..Default::default()
    }
}

fn create_query() -> ParsedQuery {
    ParsedQuery {
        location: Some(LocationCode::AtlantaGa),
        height_min: Some(66),
        height_max: Some(70),
        skills: vec![SkillCategory::Fight],
        ..Default::default()
    }
}

fn bench_keyword_interpreter(c: &mut Criterion) {
    let interpreter = KeywordInterpreter::new();
    c.bench_function("keyword_interpret", |b| {
        b.iter(|| interpreter.parse(black_box("I need a 5'8 female martial artist in Atlanta, SAG-AFTRA")))
    });
}

fn bench_filtering_pipeline(c: &mut Criterion) {
    let query = create_query();
    let plan = build_filter_plan(&query, None);
    let candidates: Vec<CandidateProfile> = (0..1000).map(create_candidate).collect();

    c.bench_function("filtering_pipeline_1000_candidates", |b| {
        b.iter(|| {
            let filtered: Vec<_> = candidates
                .iter()
                .filter(|p| matches_filter(p, &plan.filter))
                .collect();

            black_box(filtered)
        });
    });
}

fn bench_ranking(c: &mut Criterion) {
    let weights = CompletenessWeights::default();
    let mut group = c.benchmark_group("ranking");

    for candidate_count in [10, 50, 200, 1000].iter() {
        let candidates: Vec<CandidateProfile> = (0..*candidate_count).map(create_candidate).collect();

        group.bench_with_input(
            BenchmarkId::new("rank_candidates", candidate_count),
            candidate_count,
            |b, _| {
                let mut rng = StdRng::seed_from_u64(42);
                b.iter(|| rank_candidates(black_box(candidates.clone()), &weights, &mut rng));
            },
        );
    }

    group.finish();
}

fn bench_retrieval(c: &mut Criterion) {
    let store = InMemoryCandidateStore::new((0..1000).map(create_candidate).collect());
    let retriever = CandidateRetriever::new(
        Arc::new(store),
        CompletenessWeights::default(),
        RetrieverSettings::default(),
    )
    .with_seed(Some(7));
    let query = create_query();

    c.bench_function("retrieve_1000_candidates", |b| {
        b.iter(|| tokio_test::block_on(retriever.retrieve(black_box(&query), None)));
    });
}

criterion_group!(
    benches,
    bench_keyword_interpreter,
    bench_filtering_pipeline,
    bench_ranking,
    bench_retrieval
);

criterion_main!(benches);
