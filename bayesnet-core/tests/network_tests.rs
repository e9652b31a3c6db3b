//! End-to-end tests for Gaussian Bayes networks.
//!
//! Each test builds its own network through a fixture function. Results of
//! the block algorithms are checked against the assembled sparse system.

use bayesnet_core::{
    BayesNetError, GaussianBayesNet, GaussianConditional, Key, NetworkSettings, NoiseScale,
    VectorValues,
};
use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const TOL: f64 = 1e-9;

fn m(rows: usize, cols: usize, data: &[f64]) -> DMatrix<f64> {
    DMatrix::from_row_slice(rows, cols, data)
}

fn v(data: &[f64]) -> DVector<f64> {
    DVector::from_column_slice(data)
}

/// Conditional with unit noise.
fn unit(
    key: Key,
    d: DVector<f64>,
    r: DMatrix<f64>,
    parents: Vec<(Key, DMatrix<f64>)>,
) -> GaussianConditional {
    GaussianConditional::single(key, d, r, parents, NoiseScale::Unit).unwrap()
}

fn scalar_values(pairs: &[(Key, f64)]) -> VectorValues {
    pairs.iter().map(|&(k, x)| (k, v(&[x]))).collect()
}

/// Largest difference relative to the size of the expected values.
fn rel_diff(actual: &VectorValues, expected: &VectorValues) -> f64 {
    let scale = expected.iter().map(|(_, x)| x.amax()).fold(1.0, f64::max);
    actual
        .max_abs_diff(expected)
        .expect("assignments have different structure")
        / scale
}

// ============================================================================
// Fixtures
// ============================================================================

/// x + y = 9, y = 5
fn small_net() -> GaussianBayesNet {
    GaussianBayesNet::new(vec![
        unit(0, v(&[9.0]), m(1, 1, &[1.0]), vec![(1, m(1, 1, &[1.0]))]),
        unit(1, v(&[5.0]), m(1, 1, &[1.0]), vec![]),
    ])
    .unwrap()
}

/// Chain 0 <- 1 <- 2 of 2-d variables, sigma 2 on every row.
fn chain_net() -> GaussianBayesNet {
    let noise = NoiseScale::Isotropic(2.0);
    GaussianBayesNet::new(vec![
        GaussianConditional::single(
            0,
            v(&[3.0, 4.0]),
            m(2, 2, &[1.0, 3.0, 0.0, 4.0]),
            vec![(1, m(2, 2, &[2.0, 1.0, 2.0, 3.0]))],
            noise.clone(),
        )
        .unwrap(),
        GaussianConditional::single(
            1,
            v(&[5.0, 6.0]),
            m(2, 2, &[1.0, 1.0, 0.0, 3.0]),
            vec![(2, m(2, 2, &[1.0, 0.0, 5.0, 2.0]))],
            noise.clone(),
        )
        .unwrap(),
        GaussianConditional::single(
            2,
            v(&[7.0, 8.0]),
            m(2, 2, &[1.0, 1.0, 0.0, 5.0]),
            vec![],
            noise,
        )
        .unwrap(),
    ])
    .unwrap()
}

/// Five 2-d variables with several parents per conditional.
fn five_var_net() -> GaussianBayesNet {
    let c = |key, d: [f64; 2], r: [f64; 4], parents: Vec<(Key, [f64; 4])>| {
        GaussianConditional::single(
            key,
            v(&d),
            m(2, 2, &r),
            parents.into_iter().map(|(p, s)| (p, m(2, 2, &s))).collect(),
            NoiseScale::Unit,
        )
        .unwrap()
    };
    GaussianBayesNet::new(vec![
        c(
            0,
            [1.0, 2.0],
            [3.0, 4.0, 0.0, 6.0],
            vec![(3, [7.0, 8.0, 9.0, 10.0]), (4, [11.0, 12.0, 13.0, 14.0])],
        ),
        c(
            1,
            [15.0, 16.0],
            [17.0, 18.0, 0.0, 20.0],
            vec![(2, [21.0, 22.0, 23.0, 24.0]), (4, [25.0, 26.0, 27.0, 28.0])],
        ),
        c(2, [29.0, 30.0], [31.0, 32.0, 0.0, 34.0], vec![(3, [35.0, 36.0, 37.0, 38.0])]),
        c(3, [39.0, 40.0], [41.0, 42.0, 0.0, 44.0], vec![(4, [45.0, 46.0, 47.0, 48.0])]),
        c(4, [49.0, 50.0], [51.0, 52.0, 0.0, 54.0], vec![]),
    ])
    .unwrap()
}

/// A conditional over two frontal variables (1-d and 2-d) plus one parent.
fn multi_frontal_net() -> GaussianBayesNet {
    GaussianBayesNet::new(vec![
        GaussianConditional::new(
            vec![(10, 1), (11, 2)],
            m(3, 3, &[2.0, 0.5, -1.0, 0.0, 1.5, 0.25, 0.0, 0.0, 3.0]),
            vec![(12, m(3, 1, &[1.0, -2.0, 0.5]))],
            v(&[1.0, 2.0, 3.0]),
            NoiseScale::Diagonal(v(&[0.5, 1.0, 2.0])),
        )
        .unwrap(),
        GaussianConditional::single(
            12,
            v(&[4.0]),
            m(1, 1, &[-2.0]),
            vec![],
            NoiseScale::Isotropic(0.1),
        )
        .unwrap(),
    ])
    .unwrap()
}

/// Random valid network: parents drawn from later variables only.
fn random_net(rng: &mut ChaCha8Rng, num_vars: usize, unit_noise: bool) -> GaussianBayesNet {
    let dims: Vec<usize> = (0..num_vars).map(|_| rng.gen_range(1..=3)).collect();
    // Keys are not positions, so the index is exercised
    let keys: Vec<Key> = (0..num_vars).map(|i| 100 + 7 * i).collect();

    let conditionals = (0..num_vars)
        .map(|i| {
            let n = dims[i];
            let r = DMatrix::from_fn(n, n, |row, col| {
                if row == col {
                    let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                    sign * rng.gen_range(0.5..2.0)
                } else if row < col {
                    rng.gen_range(-1.0..1.0)
                } else {
                    0.0
                }
            });
            let later: Vec<usize> = (i + 1..num_vars).filter(|_| rng.gen_bool(0.5)).collect();
            let parents = later
                .into_iter()
                .map(|j| (keys[j], DMatrix::from_fn(n, dims[j], |_, _| rng.gen_range(-0.5..0.5))))
                .collect();
            let d = DVector::from_fn(n, |_, _| rng.gen_range(-5.0..5.0));
            let noise = if unit_noise {
                NoiseScale::Unit
            } else {
                NoiseScale::Diagonal(DVector::from_fn(n, |_, _| rng.gen_range(0.5..2.0)))
            };
            GaussianConditional::single(keys[i], d, r, parents, noise).unwrap()
        })
        .collect();

    GaussianBayesNet::new(conditionals).unwrap()
}

fn random_values(rng: &mut ChaCha8Rng, net: &GaussianBayesNet) -> VectorValues {
    net.dims()
        .into_iter()
        .map(|(k, n)| (k, DVector::from_fn(n, |_, _| rng.gen_range(-1.0..1.0))))
        .collect()
}

// ============================================================================
// Running example
// ============================================================================

#[test]
fn test_small_net_matrix() {
    let sys = small_net().assemble().unwrap();
    assert_eq!(sys.to_dense_r(), m(2, 2, &[1.0, 1.0, 0.0, 1.0]));
    assert_eq!(sys.d, v(&[9.0, 5.0]));
}

#[test]
fn test_small_net_optimize() {
    let actual = small_net().optimize().unwrap();
    assert_eq!(actual, scalar_values(&[(0, 4.0), (1, 5.0)]));
}

#[test]
fn test_small_net_back_substitute_new_rhs() {
    let rhs = scalar_values(&[(0, 4.0), (1, 5.0)]);
    let actual = small_net().back_substitute(&rhs).unwrap();
    assert_eq!(actual, scalar_values(&[(0, -1.0), (1, 5.0)]));
}

#[test]
fn test_small_net_back_substitute_transpose() {
    let x = scalar_values(&[(0, 2.0), (1, 5.0)]);
    let actual = small_net().back_substitute_transpose(&x).unwrap();
    assert_eq!(actual, scalar_values(&[(0, 2.0), (1, 3.0)]));
}

#[test]
fn test_optimize_is_idempotent() {
    let net = five_var_net();
    let first = net.optimize().unwrap();
    for _ in 0..5 {
        assert_eq!(net.optimize().unwrap(), first);
    }
}

// ============================================================================
// Determinant
// ============================================================================

#[test]
fn test_chain_determinant() {
    let net = chain_net();
    let expected: f64 = 60.0 / 64.0;
    assert!((net.determinant().unwrap() - expected).abs() < TOL);
    assert!((net.log_determinant().unwrap() - expected.ln()).abs() < TOL);
}

#[test]
fn test_determinant_matches_assembled_matrix() {
    let mut rng = ChaCha8Rng::seed_from_u64(31337);
    for _ in 0..10 {
        let net = random_net(&mut rng, 5, false);
        let dense = net.assemble().unwrap().to_dense_r();
        let expected = dense.determinant().abs();
        let actual = net.determinant().unwrap();
        assert!(
            (actual - expected).abs() <= TOL * expected.max(1.0),
            "determinant {} vs dense {}",
            actual,
            expected
        );
    }
}

#[test]
fn test_dangling_parent_rejected() {
    // Parent 2 is never defined by a later conditional
    let err = GaussianBayesNet::new(vec![
        unit(1, v(&[5.0]), m(1, 1, &[1.0]), vec![(2, m(1, 1, &[1.0]))]),
        unit(3, v(&[7.0]), m(1, 1, &[1.0]), vec![]),
    ])
    .unwrap_err();
    assert_eq!(err, BayesNetError::MissingParent { parent: 2, child: 1 });
}

#[test]
fn test_zero_pivot_is_degenerate() {
    let net = GaussianBayesNet::new(vec![
        // Parent 1 is 2-d, so S is 1x2
        unit(0, v(&[1.0]), m(1, 1, &[1.0]), vec![(1, m(1, 2, &[1.0, 0.0]))]),
        unit(1, v(&[1.0, 1.0]), m(2, 2, &[2.0, 1.0, 0.0, 0.0]), vec![]),
    ])
    .unwrap();
    let expected = BayesNetError::DegenerateSystem { key: 1, row: 1, pivot: 0.0 };
    assert_eq!(net.optimize().unwrap_err(), expected);
    assert_eq!(net.determinant().unwrap_err(), expected);
    assert_eq!(
        net.back_substitute_transpose(&net.zero()).unwrap_err(),
        expected
    );
    assert_eq!(net.assemble().unwrap().solve_dense().unwrap_err(), expected);
}

#[test]
fn test_subnormal_pivot_is_degenerate() {
    // 1e-320 is nonzero but subnormal; 1 / 1e-320 overflows
    let net = GaussianBayesNet::new(vec![
        unit(0, v(&[1.0]), m(1, 1, &[1.0]), vec![(1, m(1, 1, &[1.0]))]),
        unit(1, v(&[1.0]), m(1, 1, &[1e-320]), vec![]),
    ])
    .unwrap();
    let expected = BayesNetError::DegenerateSystem { key: 1, row: 0, pivot: 1e-320 };
    assert_eq!(net.optimize().unwrap_err(), expected);
    assert_eq!(net.determinant().unwrap_err(), expected);
    assert_eq!(net.log_determinant().unwrap_err(), expected);
    assert_eq!(
        net.back_substitute(&scalar_values(&[(0, 1.0), (1, 1.0)])).unwrap_err(),
        expected
    );
}

#[test]
fn test_zero_gradient_rejected() {
    // d = 0 everywhere: the origin is already optimal and the step is 0/0
    let net = GaussianBayesNet::new(vec![
        unit(0, v(&[0.0]), m(1, 1, &[2.0]), vec![(1, m(1, 1, &[1.0]))]),
        unit(1, v(&[0.0]), m(1, 1, &[1.0]), vec![]),
    ])
    .unwrap();
    assert_eq!(
        net.optimize_gradient_search(),
        Err(BayesNetError::DegenerateGradient { denominator: 0.0 })
    );
    assert_eq!(net.optimize().unwrap(), net.zero());
}

#[test]
fn test_pivot_tolerance_from_settings() {
    let settings = NetworkSettings {
        pivot_tol: 1e-3,
        ..Default::default()
    };
    let net = GaussianBayesNet::with_settings(
        vec![unit(0, v(&[1.0]), m(1, 1, &[1e-4]), vec![])],
        settings,
    )
    .unwrap();
    assert!(matches!(
        net.optimize(),
        Err(BayesNetError::DegenerateSystem { key: 0, row: 0, .. })
    ));
}

// ============================================================================
// Assembly equivalence
// ============================================================================

#[test]
fn test_assembled_solve_matches_optimize() {
    for net in [small_net(), chain_net(), five_var_net(), multi_frontal_net()] {
        let block = net.optimize().unwrap();
        let dense = net.assemble().unwrap().solve_dense().unwrap();
        assert!(rel_diff(&block, &dense) < TOL);
    }
}

#[test]
fn test_random_assembled_solve_matches_optimize() {
    let mut rng = ChaCha8Rng::seed_from_u64(12345);
    for num_vars in 1..8 {
        let net = random_net(&mut rng, num_vars, false);
        let sys = net.assemble().unwrap();

        // Elimination-order columns make R upper triangular
        let r = sys.to_dense_r();
        assert_eq!(r.nrows(), net.total_dim());
        for col in 0..r.ncols() {
            for row in col + 1..r.nrows() {
                assert_eq!(r[(row, col)], 0.0);
            }
        }

        let block = net.optimize().unwrap();
        let dense = sys.solve_dense().unwrap();
        assert!(rel_diff(&block, &dense) < TOL, "num_vars={}", num_vars);
        assert!(sys.error(&block).unwrap() < 1e-16);
    }
}

#[test]
fn test_multi_frontal_solution_zeroes_residual() {
    let net = multi_frontal_net();
    let x = net.optimize().unwrap();
    assert_eq!(x.get(11).unwrap().len(), 2);
    assert!(net.residual(&x).unwrap().norm() < TOL);

    // Diagonal of whitened R: 2/0.5, 1.5/1, 3/2, -2/0.1
    let expected: f64 = 4.0 * 1.5 * 1.5 * 20.0;
    assert!((net.determinant().unwrap() - expected).abs() < TOL * expected);
}

// ============================================================================
// Adjoint identities
// ============================================================================

#[test]
fn test_transpose_solve_adjoint() {
    let mut rng = ChaCha8Rng::seed_from_u64(54321);
    for _ in 0..20 {
        let net = random_net(&mut rng, 6, false);
        let u = random_values(&mut rng, &net);
        let w = random_values(&mut rng, &net);

        // y = R_w^-T u  =>  <y, R_w w> = <u, w>
        let y = net.back_substitute_transpose(&u).unwrap();
        let rw = net.multiply(&w).unwrap();
        let lhs = y.dot(&rw).unwrap();
        let rhs = u.dot(&w).unwrap();
        assert!((lhs - rhs).abs() < TOL * rhs.abs().max(1.0), "{} vs {}", lhs, rhs);

        // Same statement on the assembled matrix
        let sys = net.assemble().unwrap();
        let y_vec = sys.layout.stack(&y).unwrap();
        let u_vec = sys.layout.stack(&u).unwrap();
        let rt_y = sys.to_dense_r().transpose() * y_vec;
        assert!((rt_y - u_vec).amax() < TOL * 100.0);
    }
}

#[test]
fn test_multiply_transpose_multiply_adjoint() {
    let mut rng = ChaCha8Rng::seed_from_u64(11111);
    for _ in 0..20 {
        let net = random_net(&mut rng, 6, false);
        let x = random_values(&mut rng, &net);
        let e = random_values(&mut rng, &net);

        let lhs = net.transpose_multiply(&e).unwrap().dot(&x).unwrap();
        let rhs = e.dot(&net.multiply(&x).unwrap()).unwrap();
        assert!((lhs - rhs).abs() < 1e-12 * rhs.abs().max(1.0));
    }
}

#[test]
fn test_back_substitute_pairs_with_transpose() {
    let mut rng = ChaCha8Rng::seed_from_u64(22222);
    for _ in 0..20 {
        let net = random_net(&mut rng, 5, true);
        let u = random_values(&mut rng, &net);
        let w = random_values(&mut rng, &net);

        // <R^-T u, w> = <u, R^-1 w>
        let lhs = net.back_substitute_transpose(&u).unwrap().dot(&w).unwrap();
        let rhs = u.dot(&net.back_substitute(&w).unwrap()).unwrap();
        assert!((lhs - rhs).abs() < TOL * rhs.abs().max(1.0), "{} vs {}", lhs, rhs);
    }
}

// ============================================================================
// Gradient and steepest descent
// ============================================================================

#[test]
fn test_gradient_matches_assembled_system() {
    let mut rng = ChaCha8Rng::seed_from_u64(98765);
    for _ in 0..10 {
        let net = random_net(&mut rng, 6, false);
        let sys = net.assemble().unwrap();
        let x = random_values(&mut rng, &net);

        assert!((net.error(&x).unwrap() - sys.error(&x).unwrap()).abs() < TOL);
        let g = net.gradient(&x).unwrap();
        assert!(rel_diff(&g, &sys.gradient(&x).unwrap()) < TOL);
    }
}

#[test]
fn test_gradient_at_zero_matches_finite_differences() {
    let net = five_var_net();
    let sys = net.assemble().unwrap();
    let g = net.gradient_at_zero().unwrap();
    let g_vec = sys.layout.stack(&g).unwrap();

    let n = sys.layout.total_dim();
    let h = 1e-3;
    let error_at = |x: &DVector<f64>| sys.error(&sys.layout.split(x).unwrap()).unwrap();
    for i in 0..n {
        let mut plus = DVector::zeros(n);
        plus[i] = h;
        let minus = -plus.clone();
        let fd = (error_at(&plus) - error_at(&minus)) / (2.0 * h);
        assert!(
            (fd - g_vec[i]).abs() < 1e-5 * g_vec[i].abs().max(1.0),
            "component {}: fd {} vs {}",
            i,
            fd,
            g_vec[i]
        );
    }
}

#[test]
fn test_steepest_descent_point_matches_dense() {
    let net = five_var_net();
    let sys = net.assemble().unwrap();
    let r = sys.to_dense_r();

    let gradient = -(r.transpose() * &sys.d);
    let hessian = r.transpose() * &r;
    let curvature = (gradient.transpose() * &hessian * &gradient)[(0, 0)];
    let step = -gradient.norm_squared() / curvature;
    let expected = sys.layout.split(&(gradient * step)).unwrap();

    let actual = net.optimize_gradient_search().unwrap();
    assert!(rel_diff(&actual, &expected) < 1e-9);

    let orig_error = sys.error(&net.zero()).unwrap();
    let new_error = sys.error(&actual).unwrap();
    assert!(new_error < orig_error);
}

#[test]
fn test_random_steepest_descent_decreases_error() {
    let mut rng = ChaCha8Rng::seed_from_u64(424242);
    for _ in 0..20 {
        let net = random_net(&mut rng, 6, false);
        let sys = net.assemble().unwrap();
        let point = net.optimize_gradient_search().unwrap();
        assert!(sys.error(&point).unwrap() < sys.error(&net.zero()).unwrap());

        // Cauchy point: the gradient at it is orthogonal to the search direction
        let g0 = net.gradient_at_zero().unwrap();
        let g1 = net.gradient(&point).unwrap();
        let overlap = g0.dot(&g1).unwrap();
        assert!(overlap.abs() < 1e-9 * g0.squared_norm(), "g0.g1 = {}", overlap);
    }
}

// ============================================================================
// Shared read-only use
// ============================================================================

#[test]
fn test_concurrent_back_substitution() {
    let net = five_var_net();
    let constant_rhs = |c: f64| -> VectorValues {
        net.dims()
            .into_iter()
            .map(|(k, n)| (k, DVector::from_element(n, c)))
            .collect()
    };
    let expected: Vec<VectorValues> = (0..4)
        .map(|i| net.back_substitute(&constant_rhs(i as f64)).unwrap())
        .collect();
    let optimum = net.optimize().unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let net = &net;
                let rhs = constant_rhs(i as f64);
                scope.spawn(move || (net.back_substitute(&rhs).unwrap(), net.optimize().unwrap()))
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let (solved, opt) = handle.join().unwrap();
            assert_eq!(solved, expected[i]);
            assert_eq!(opt, optimum);
        }
    });
}
