use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use secret_santa_core::{
    assign_seeded, assign_with_retries, Participant, DEFAULT_HISTORY_WINDOW,
};

fn mk_participant(index: usize, total: usize) -> Participant {
    let name = |offset: usize| format!("participant-{:04}", (index + offset) % total);
    // Households of four plus three prior receivers per person.
    let household = index - index % 4;
    let family = (household..household + 4)
        .filter(|member| *member != index && *member < total)
        .map(|member| format!("participant-{member:04}"));

    Participant::new(name(0)).with_family(family).with_history([name(5), name(9), name(13)])
}

fn mk_roster(total: usize) -> Vec<Participant> {
    (0..total).map(|index| mk_participant(index, total)).collect()
}

fn bench_single_pass(c: &mut Criterion) {
    let participants = mk_roster(1_000);
    let mut seed = 0_u64;

    c.bench_function("assign_single_pass_1000_participants", |b| {
        b.iter(|| {
            seed = seed.wrapping_add(1);
            let result = assign_seeded(&participants, DEFAULT_HISTORY_WINDOW, seed);
            if result.status() == "invalid_input" {
                panic!("benchmark roster was rejected: {result:?}");
            }
        });
    });
}

fn bench_with_retries(c: &mut Criterion) {
    let participants = mk_roster(200);
    let mut rng = StdRng::seed_from_u64(42);

    c.bench_function("assign_with_retries_200_participants", |b| {
        b.iter(|| {
            let outcome =
                assign_with_retries(&participants, DEFAULT_HISTORY_WINDOW, 25, &mut rng);
            if outcome.attempts == 0 {
                panic!("retry loop must run at least once");
            }
        });
    });
}

criterion_group!(assign_benches, bench_single_pass, bench_with_retries);
criterion_main!(assign_benches);
