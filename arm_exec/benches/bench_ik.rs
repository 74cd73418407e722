//! # Inverse Kinematics Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use arm_lib::arm_ctrl::{desired_pose, JointTable, Params, Solver};
use nalgebra::Vector3;

fn ik_benchmark(c: &mut Criterion) {
    // ---- Build the solver from the shipped parameters ----

    let params: Params = util::params::from_str(include_str!("../../params/arm_ctrl.toml"))
        .expect("Could not parse arm_ctrl.toml");
    let table = JointTable::from_params(&params).expect("Invalid joint table");
    let solver = Solver::from_params(&params, table).expect("Invalid solver parameters");

    // Converges from the first seed
    let centre = Vector3::new(0.25, 0.0, 0.1);

    // Only converges from the second seed
    let side = Vector3::new(0.15, -0.1, 0.03);

    // Never converges, every seed runs to the iteration limit
    let far = Vector3::new(1.0, 0.0, 0.1);

    c.bench_function("ik_first_seed", |b| {
        b.iter(|| solver.solve(&desired_pose(black_box(&centre)), centre.y))
    });
    c.bench_function("ik_second_seed", |b| {
        b.iter(|| solver.solve(&desired_pose(black_box(&side)), side.y))
    });
    c.bench_function("ik_unreachable", |b| {
        b.iter(|| solver.solve(&desired_pose(black_box(&far)), far.y))
    });
}

criterion_group!(benches, ik_benchmark);
criterion_main!(benches);
