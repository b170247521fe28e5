use fenris_dg::fad::{self, Fad, Real};
use fenris_dg::physics::{
    flux_dot_normal, BoundaryConditions, Burgers, ConvectionDiffusion, Euler, EulerBoundaryCondition,
    ManufacturedSolution, NavierStokes, NavierStokesBoundaryCondition, Physics, ScalarBoundaryCondition, ViscosityLaw,
};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Matrix4, Point2, Vector2, Vector3};
use proptest::prelude::*;

fn manufactured_2d() -> ManufacturedSolution<2, 1> {
    ManufacturedSolution::new(Vector2::new(1.3, 0.7), Vector2::new(0.2, -0.4))
        .with_base([0.5])
        .with_amplitude([2.0])
}

#[test]
fn manufactured_solution_derivatives_match_finite_differences() {
    let solution = manufactured_2d();
    let x = Point2::new(0.3, -0.8);
    let h = 1e-5;
    let gradient = solution.gradient(&x)[0];
    let [hessian] = solution.hessian(&x);

    for d in 0..2 {
        let mut x_plus = x;
        let mut x_minus = x;
        x_plus[d] += h;
        x_minus[d] -= h;
        let derivative = (solution.value(&x_plus)[0] - solution.value(&x_minus)[0]) / (2.0 * h);
        assert_scalar_eq!(gradient[d], derivative, comp = abs, tol = 1e-8);

        for e in 0..2 {
            let second_derivative = (solution.gradient(&x_plus)[0][e] - solution.gradient(&x_minus)[0][e]) / (2.0 * h);
            assert_scalar_eq!(hessian[(d, e)], second_derivative, comp = abs, tol = 1e-8);
        }
    }
}

#[test]
fn manufactured_solution_applies_base_and_amplitude() {
    let solution = ManufacturedSolution::<1, 2>::new([2.0].into(), [0.0].into())
        .with_base([1.0, -1.0])
        .with_amplitude([0.5, 3.0]);
    let x = [std::f64::consts::FRAC_PI_4].into();
    let value = solution.value(&x);
    assert_scalar_eq!(value[0], 1.5, comp = abs, tol = 1e-14);
    assert_scalar_eq!(value[1], 2.0, comp = abs, tol = 1e-14);
}

#[test]
fn convection_diffusion_source_balances_manufactured_solution() {
    let velocity = Vector2::new(0.8, -0.3);
    let kappa = 0.05;
    let physics = ConvectionDiffusion::new(velocity, kappa).with_manufactured_solution(manufactured_2d());
    let solution = physics.manufactured_solution().clone();
    let x = Point2::new(0.4, 0.1);
    let h = 1e-4;

    let u = |x: Point2<f64>| solution.value(&x)[0];
    let mut convection = 0.0;
    let mut laplacian = 0.0;
    for d in 0..2 {
        let mut x_plus = x;
        let mut x_minus = x;
        x_plus[d] += h;
        x_minus[d] -= h;
        convection += velocity[d] * (u(x_plus) - u(x_minus)) / (2.0 * h);
        laplacian += (u(x_plus) - 2.0 * u(x) + u(x_minus)) / (h * h);
    }

    let [source] = physics.source_term(&x, &[0.0]);
    assert_scalar_eq!(source, convection - kappa * laplacian, comp = abs, tol = 1e-6);
}

#[test]
fn burgers_source_balances_manufactured_solution() {
    let nu = 0.1;
    let physics = Burgers::viscous(nu).with_manufactured_solution(manufactured_2d());
    let solution = physics.manufactured_solution().clone();
    let x = Point2::new(-0.2, 0.9);
    let h = 1e-4;

    let u = |x: Point2<f64>| solution.value(&x)[0];
    let mut divergence = 0.0;
    let mut laplacian = 0.0;
    for d in 0..2 {
        let mut x_plus = x;
        let mut x_minus = x;
        x_plus[d] += h;
        x_minus[d] -= h;
        divergence += (0.5 * u(x_plus).powi(2) - 0.5 * u(x_minus).powi(2)) / (2.0 * h);
        laplacian += (u(x_plus) - 2.0 * u(x) + u(x_minus)) / (h * h);
    }

    let [source] = physics.source_term(&x, &[0.0]);
    assert_scalar_eq!(source, divergence - nu * laplacian, comp = abs, tol = 1e-6);
}

#[test]
fn euler_source_is_divergence_of_manufactured_flux() {
    let euler = Euler::<2, 4>::new(1.4, 0.5, 0.0).unwrap();
    let solution = euler.manufactured_solution().clone();
    let x = Point2::new(0.3, 0.6);
    let h = 1e-5;

    let mut divergence = [0.0; 4];
    for d in 0..2 {
        let mut x_plus = x;
        let mut x_minus = x;
        x_plus[d] += h;
        x_minus[d] -= h;
        let flux_plus = euler.convective_flux(&solution.value(&x_plus));
        let flux_minus = euler.convective_flux(&solution.value(&x_minus));
        for s in 0..4 {
            divergence[s] += (flux_plus[s][d] - flux_minus[s][d]) / (2.0 * h);
        }
    }

    let source = euler.source_term(&x, &[0.0; 4]);
    for s in 0..4 {
        assert_scalar_eq!(source[s], divergence[s], comp = abs, tol = 1e-7);
    }
}

#[test]
fn euler_rejects_invalid_parameters() {
    assert!(Euler::<2, 3>::new(1.4, 0.5, 0.0).is_err());
    assert!(Euler::<2, 4>::new(1.0, 0.5, 0.0).is_err());
    assert!(Euler::<2, 4>::new(1.4, 0.0, 0.0).is_err());
    assert!(Euler::<1, 3>::new(1.4, 2.0, 0.0).is_ok());
}

#[test]
fn euler_freestream() {
    let (gamma, mach) = (1.4, 0.5);
    let angle: f64 = 0.3;
    let euler = Euler::<2, 4>::new(gamma, mach, angle).unwrap();
    let u = euler.freestream();

    assert_scalar_eq!(u[0], 1.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(u[1], angle.cos(), comp = abs, tol = 1e-15);
    assert_scalar_eq!(u[2], angle.sin(), comp = abs, tol = 1e-15);
    assert_scalar_eq!(euler.pressure(u), 1.0 / (gamma * mach * mach), comp = abs, tol = 1e-13);
    assert_scalar_eq!(euler.sound_speed(u), 1.0 / mach, comp = abs, tol = 1e-13);
    assert_scalar_eq!(euler.max_convective_eigenvalue(u), 1.0 + 1.0 / mach, comp = abs, tol = 1e-13);
}

#[test]
fn euler_primitive_conversion() {
    let euler = Euler::<3, 5>::new(1.4, 0.8, 0.0).unwrap();
    let primitive = [1.2, 0.3, -0.4, 0.1, 2.0];
    let u = euler.primitive_to_conservative(&primitive);

    assert_scalar_eq!(u[1], 0.36, comp = abs, tol = 1e-15);
    let kinetic = 0.5 * 1.2 * (0.09 + 0.16 + 0.01);
    assert_scalar_eq!(u[4], 2.0 / 0.4 + kinetic, comp = abs, tol = 1e-13);
    assert_scalar_eq!(euler.total_enthalpy(&u), (u[4] + 2.0) / 1.2, comp = abs, tol = 1e-13);

    let recovered = euler.conservative_to_primitive(&u);
    for (a, b) in recovered.iter().zip(&primitive) {
        assert_scalar_eq!(*a, *b, comp = abs, tol = 1e-13);
    }
}

#[test]
fn euler_flux_of_state_at_rest_is_pressure() {
    let euler = Euler::<2, 4>::new(1.4, 0.5, 0.0).unwrap();
    let u = euler.primitive_to_conservative(&[1.3, 0.0, 0.0, 2.5]);
    let flux = euler.convective_flux(&u);
    let expected = [[0.0, 0.0], [2.5, 0.0], [0.0, 2.5], [0.0, 0.0]];
    for s in 0..4 {
        for d in 0..2 {
            assert_scalar_eq!(flux[s][d], expected[s][d], comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn unknown_boundary_id_is_an_error() {
    let physics = ConvectionDiffusion::linear_advection(Vector2::new(1.0, 0.0))
        .with_boundary_condition(0, ScalarBoundaryCondition::Extrapolation);
    let x = Point2::new(0.0, 0.0);
    let normal = Vector2::new(-1.0, 0.0);
    assert!(physics
        .boundary_face_values(0, &x, &normal, &[1.0], &[[0.0, 0.0]])
        .is_ok());

    let error = physics
        .boundary_face_values(7, &x, &normal, &[1.0], &[[0.0, 0.0]])
        .unwrap_err();
    assert!(error.to_string().contains("boundary id 7"));
    assert!(physics.has_boundary(0));
    assert!(!physics.has_boundary(7));

    let euler = Euler::<2, 4>::new(1.4, 0.5, 0.0).unwrap();
    assert!(euler
        .boundary_face_values(0, &x, &normal, &[1.0, 0.0, 0.0, 2.0], &[[0.0; 2]; 4])
        .is_err());
}

#[test]
fn dirichlet_is_imposed_on_inflow_only_for_pure_convection() {
    let physics = ConvectionDiffusion::linear_advection(Vector2::new(1.0, 0.5))
        .with_boundary_conditions(0..4, ScalarBoundaryCondition::Dirichlet(3.0));
    let x = Point2::new(0.0, 0.0);
    let u_int = [1.0];
    let gradient_int = [[0.2, -0.1]];

    let (inflow, inflow_gradient) = physics
        .boundary_face_values(0, &x, &Vector2::new(-1.0, 0.0), &u_int, &gradient_int)
        .unwrap();
    assert_eq!(inflow, [3.0]);
    assert_eq!(inflow_gradient, gradient_int);

    let (outflow, _) = physics
        .boundary_face_values(1, &x, &Vector2::new(1.0, 0.0), &u_int, &gradient_int)
        .unwrap();
    assert_eq!(outflow, u_int);

    let diffusive = ConvectionDiffusion::new(Vector2::new(1.0, 0.5), 0.1)
        .with_boundary_conditions(0..4, ScalarBoundaryCondition::Dirichlet(3.0));
    let (imposed, _) = diffusive
        .boundary_face_values(1, &x, &Vector2::new(1.0, 0.0), &u_int, &gradient_int)
        .unwrap();
    assert_eq!(imposed, [3.0]);
}

#[test]
fn manufactured_boundary_value_is_evaluated_at_the_face_point() {
    let physics = Burgers::viscous(0.1)
        .with_manufactured_solution(manufactured_2d())
        .with_boundary_condition(2, ScalarBoundaryCondition::ManufacturedSolution);
    let x = Point2::new(0.25, 0.0);
    let (u_ext, _) = physics
        .boundary_face_values(2, &x, &Vector2::new(0.0, -1.0), &[0.0], &[[0.0, 0.0]])
        .unwrap();
    assert_eq!(u_ext, manufactured_2d().value(&x));
}

#[test]
fn slip_wall_mirrors_normal_momentum() {
    let euler = Euler::<2, 4>::new(1.4, 0.5, 0.0)
        .unwrap()
        .with_boundary_condition(2, EulerBoundaryCondition::SlipWall)
        .with_boundary_condition(3, EulerBoundaryCondition::Farfield);
    let x = Point2::new(0.5, 0.0);
    let normal = Vector2::new(0.0, -1.0);
    let u_int = [1.1, 0.5, 0.2, 3.0];
    let gradient_int = [[0.0; 2]; 4];

    let (u_ext, _) = euler
        .boundary_face_values(2, &x, &normal, &u_int, &gradient_int)
        .unwrap();
    assert_scalar_eq!(u_ext[0], 1.1, comp = abs, tol = 0.0);
    assert_scalar_eq!(u_ext[1], 0.5, comp = abs, tol = 1e-15);
    assert_scalar_eq!(u_ext[2], -0.2, comp = abs, tol = 1e-15);
    assert_scalar_eq!(u_ext[3], 3.0, comp = abs, tol = 0.0);
    assert_scalar_eq!(euler.pressure(&u_ext), euler.pressure(&u_int), comp = abs, tol = 1e-14);

    let (farfield, _) = euler
        .boundary_face_values(3, &x, &normal, &u_int, &gradient_int)
        .unwrap();
    assert_eq!(&farfield, euler.freestream());
}

#[test]
fn boundary_condition_registry() {
    let mut conditions = BoundaryConditions::default();
    assert!(conditions.is_empty());
    conditions.insert(3, ScalarBoundaryCondition::Extrapolation);
    conditions.insert(3, ScalarBoundaryCondition::Dirichlet(1.0));
    assert_eq!(conditions.len(), 1);
    assert!(conditions.contains(3));
    assert_eq!(conditions.get(3).unwrap(), &ScalarBoundaryCondition::Dirichlet(1.0));
    assert!(conditions.get(0).is_err());
}

#[test]
fn linear_advection_roe_dissipation_is_upwind() {
    let physics = ConvectionDiffusion::linear_advection(Vector3::new(1.0, -2.0, 0.5));
    let normal = Vector3::new(0.0, 1.0, 0.0);
    let [dissipation] = physics.roe_dissipation(&[1.0], &[4.0], &normal);
    assert_scalar_eq!(dissipation, 6.0, comp = abs, tol = 1e-14);
    let [flux] = flux_dot_normal(&physics.convective_flux(&[1.5]), &normal);
    assert_scalar_eq!(flux, -3.0, comp = abs, tol = 1e-14);
}

fn euler_2d_state() -> impl Strategy<Value = [f64; 4]> {
    (0.5..2.0, -1.0..1.0, -1.0..1.0, 0.5..3.0).prop_map(|(rho, vx, vy, p): (f64, f64, f64, f64)| {
        let energy = p / 0.4 + 0.5 * rho * (vx * vx + vy * vy);
        [rho, rho * vx, rho * vy, energy]
    })
}

proptest! {
    #[test]
    fn euler_roe_dissipation_vanishes_for_equal_states(u in euler_2d_state(), angle in 0.0..6.3) {
        let euler = Euler::<2, 4>::new(1.4, 0.5, 0.0).unwrap();
        let angle: f64 = angle;
        let normal = Vector2::new(angle.cos(), angle.sin());
        let dissipation = euler.roe_dissipation(&u, &u, &normal);
        for value in dissipation {
            prop_assert!(value.abs() < 1e-12);
        }
    }

    #[test]
    fn euler_roe_dissipation_is_odd(a in euler_2d_state(), b in euler_2d_state(), angle in 0.0..6.3) {
        let euler = Euler::<2, 4>::new(1.4, 0.5, 0.0).unwrap();
        let angle: f64 = angle;
        let normal = Vector2::new(angle.cos(), angle.sin());
        let forward = euler.roe_dissipation(&a, &b, &normal);
        let backward = euler.roe_dissipation(&b, &a, &(-normal));
        for s in 0..4 {
            prop_assert!((forward[s] + backward[s]).abs() <= 1e-11 * (1.0 + forward[s].abs()));
        }
    }
}

#[test]
fn euler_convective_eigenvalues_are_those_of_the_normal_flux_jacobian() {
    let euler = Euler::<2, 4>::new(1.4, 0.5, 0.0).unwrap();
    let u = [1.2, 0.6, -0.3, 3.1];
    let normal = Vector2::new(0.6, 0.8);

    let velocity = euler.velocity(&u);
    let normal_velocity = velocity[0] * normal[0] + velocity[1] * normal[1];
    let sound_speed = euler.sound_speed(&u);
    let eigenvalues = euler.convective_eigenvalues(&u, &normal);
    let expected = [normal_velocity - sound_speed, normal_velocity, normal_velocity, normal_velocity + sound_speed];
    for s in 0..4 {
        assert_scalar_eq!(eigenvalues[s], expected[s], comp = abs, tol = 1e-14);
    }

    let u_fad: [Fad<4>; 4] = std::array::from_fn(|s| fad::variable(u[s], s));
    let normal_flux = flux_dot_normal(&euler.convective_flux(&u_fad), &normal);
    let jacobian = Matrix4::from_fn(|i, j| fad::derivatives(&normal_flux[i])[j]);
    assert_scalar_eq!(jacobian.trace(), eigenvalues.iter().sum::<f64>(), comp = abs, tol = 1e-12);
    for lambda in eigenvalues {
        let shifted = jacobian - Matrix4::identity() * lambda;
        assert!(shifted.determinant().abs() < 1e-10);
    }
    assert_scalar_eq!(
        euler.max_convective_eigenvalue(&u),
        velocity[0].hypot(velocity[1]) + sound_speed,
        comp = abs,
        tol = 1e-14
    );
}

#[test]
fn scalar_convective_eigenvalues() {
    let normal = Vector2::new(0.0, -1.0);
    let physics = ConvectionDiffusion::<2, 2>::with_components(Vector2::new(0.5, 2.0), 0.1);
    assert_eq!(physics.convective_eigenvalues(&[3.0, -1.0], &normal), [-2.0, -2.0]);

    let burgers = Burgers::<2>::inviscid();
    let normal = Vector2::new(0.6, 0.8);
    let [eigenvalue] = burgers.convective_eigenvalues(&[2.0], &normal);
    assert_scalar_eq!(eigenvalue, 2.8, comp = abs, tol = 1e-14);
}

#[test]
fn two_component_convection_diffusion_source_balances_each_component() {
    let velocity = Vector2::new(-0.4, 0.9);
    let kappa = 0.2;
    let solution = ManufacturedSolution::<2, 2>::new(Vector2::new(1.3, 0.7), Vector2::new(0.2, -0.4))
        .with_base([0.5, -1.0])
        .with_amplitude([2.0, 0.3]);
    let physics = ConvectionDiffusion::<2, 2>::with_components(velocity, kappa).with_manufactured_solution(solution.clone());
    let x = Point2::new(0.7, -0.2);
    let h = 1e-4;

    let source = physics.source_term(&x, &[0.0; 2]);
    for s in 0..2 {
        let u = |x: Point2<f64>| solution.value(&x)[s];
        let mut convection = 0.0;
        let mut laplacian = 0.0;
        for d in 0..2 {
            let mut x_plus = x;
            let mut x_minus = x;
            x_plus[d] += h;
            x_minus[d] -= h;
            convection += velocity[d] * (u(x_plus) - u(x_minus)) / (2.0 * h);
            laplacian += (u(x_plus) - 2.0 * u(x) + u(x_minus)) / (h * h);
        }
        assert_scalar_eq!(source[s], convection - kappa * laplacian, comp = abs, tol = 1e-6);
    }

    // Components are decoupled
    let flux = physics.convective_flux(&[1.0, 0.0]);
    assert_eq!(flux[1], [0.0, 0.0]);
}

#[test]
fn euler_roe_dissipation_is_finite_for_pressureless_states() {
    let euler = Euler::<2, 4>::new(1.4, 0.5, 0.0).unwrap();
    let u_int = [1.0, 0.5, 0.0, 0.125];
    let u_ext = [2.0, 1.0, 0.0, 0.25];
    assert_eq!(euler.pressure(&u_int), 0.0);
    assert_eq!(euler.pressure(&u_ext), 0.0);

    let normal = Vector2::new(1.0, 0.0);
    for (a, b) in [(u_int, u_ext), (u_int, u_int)] {
        let dissipation = euler.roe_dissipation(&a, &b, &normal);
        assert!(dissipation.iter().all(|value| value.is_finite()));

        let a_fad: [Fad<8>; 4] = std::array::from_fn(|s| fad::variable(a[s], s));
        let b_fad: [Fad<8>; 4] = std::array::from_fn(|s| fad::variable(b[s], 4 + s));
        for value in euler.roe_dissipation(&a_fad, &b_fad, &normal) {
            assert!(value.value().is_finite());
            assert!(fad::derivatives(&value).iter().all(|d| d.is_finite()));
        }
    }
}

fn navier_stokes() -> NavierStokes<2, 4> {
    NavierStokes::new(Euler::<2, 4>::new(1.4, 0.5, 0.0).unwrap(), 0.72, 20.0).unwrap()
}

#[test]
fn navier_stokes_rejects_invalid_parameters() {
    let euler = Euler::<2, 4>::new(1.4, 0.5, 0.0).unwrap();
    assert!(NavierStokes::new(euler.clone(), 0.0, 10.0).is_err());
    assert!(NavierStokes::new(euler.clone(), 0.72, -1.0).is_err());
    assert!(NavierStokes::new(euler, 0.72, 10.0).is_ok());
}

#[test]
fn navier_stokes_uniform_state_has_no_dissipative_flux() {
    let physics = navier_stokes();
    let u = *physics.euler().freestream();
    let flux = physics.dissipative_flux(&u, &[[0.0; 2]; 4]);
    assert_eq!(flux, [[0.0; 2]; 4]);
    assert_scalar_eq!(physics.temperature(&u), 1.0, comp = abs, tol = 1e-13);
    // Sutherland's law is normalized by the free-stream state
    assert_scalar_eq!(physics.scaled_viscosity(&u), 1.0 / 20.0, comp = abs, tol = 1e-13);
}

#[test]
fn navier_stokes_simple_shear_flow() {
    let physics = navier_stokes().with_viscosity_law(ViscosityLaw::Constant);
    // ρ = 1, v = (0, 0) at the evaluation point, ∂v_x/∂y = a
    let a = 0.3;
    let u = [1.0, 0.0, 0.0, 2.5];
    let mut gradient = [[0.0; 2]; 4];
    gradient[1][1] = a;

    let flux = physics.dissipative_flux(&u, &gradient);
    let mu = 1.0 / 20.0;
    assert_scalar_eq!(flux[1][1], -mu * a, comp = abs, tol = 1e-14);
    assert_scalar_eq!(flux[2][0], -mu * a, comp = abs, tol = 1e-14);
    assert_scalar_eq!(flux[1][0], 0.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(flux[0][0], 0.0, comp = exact);
    assert_scalar_eq!(flux[0][1], 0.0, comp = exact);
}

#[test]
fn navier_stokes_heat_flux_follows_temperature_gradient() {
    let physics = navier_stokes().with_viscosity_law(ViscosityLaw::Constant);
    let euler = physics.euler();
    let u = [1.0, 0.0, 0.0, 2.0];
    // Increasing the energy along x at fixed density raises the temperature along x
    let mut gradient = [[0.0; 2]; 4];
    gradient[3][0] = 1.0;

    let flux = physics.dissipative_flux(&u, &gradient);
    let mach_inf: f64 = euler.mach_inf();
    let gamma = euler.gamma();
    let temperature_derivative = gamma * mach_inf * mach_inf * (gamma - 1.0);
    let conductivity = (1.0 / 20.0) / ((gamma - 1.0) * mach_inf * mach_inf * 0.72);
    assert_scalar_eq!(flux[3][0], -conductivity * temperature_derivative, comp = abs, tol = 1e-12);
    assert_scalar_eq!(flux[3][1], 0.0, comp = exact);
}

#[test]
fn navier_stokes_source_is_divergence_of_manufactured_flux() {
    let physics = navier_stokes();
    let solution = physics.euler().manufactured_solution().clone();
    let x = Point2::new(0.3, 0.6);
    let h = 1e-5;

    let total_flux = |x: Point2<f64>| {
        let convective = physics.convective_flux(&solution.value(&x));
        let dissipative = physics.dissipative_flux(&solution.value(&x), &solution.gradient(&x));
        std::array::from_fn::<_, 4, _>(|s| [convective[s][0] + dissipative[s][0], convective[s][1] + dissipative[s][1]])
    };
    let mut divergence = [0.0; 4];
    for d in 0..2 {
        let mut x_plus = x;
        let mut x_minus = x;
        x_plus[d] += h;
        x_minus[d] -= h;
        let (flux_plus, flux_minus) = (total_flux(x_plus), total_flux(x_minus));
        for s in 0..4 {
            divergence[s] += (flux_plus[s][d] - flux_minus[s][d]) / (2.0 * h);
        }
    }

    let source = physics.source_term(&x, &[0.0; 4]);
    for s in 0..4 {
        assert_scalar_eq!(source[s], divergence[s], comp = abs, tol = 1e-7);
    }
}

#[test]
fn navier_stokes_boundary_states() {
    let euler = Euler::<2, 4>::new(1.4, 0.5, 0.0).unwrap();
    let physics = NavierStokes::new(euler, 0.72, 20.0)
        .unwrap()
        .with_boundary_condition(0, NavierStokesBoundaryCondition::AdiabaticWall)
        .with_boundary_condition(1, NavierStokesBoundaryCondition::IsothermalWall(1.5))
        .with_boundary_condition(2, NavierStokesBoundaryCondition::Farfield)
        .with_boundary_condition(3, NavierStokesBoundaryCondition::ManufacturedSolution);
    let x = Point2::new(0.2, 0.4);
    let normal = Vector2::new(0.0, 1.0);
    let u_int = [1.3, 0.4, -0.2, 3.0];
    let gradient_int = [[0.1, 0.2], [0.3, 0.4], [0.5, 0.6], [0.7, 0.8]];

    let (wall, wall_gradient) = physics
        .boundary_face_values(0, &x, &normal, &u_int, &gradient_int)
        .unwrap();
    assert_eq!(wall[1..3], [0.0, 0.0]);
    assert_scalar_eq!(wall[0], u_int[0], comp = exact);
    assert_scalar_eq!(physics.temperature(&wall), physics.temperature(&u_int), comp = abs, tol = 1e-13);
    assert_eq!(wall_gradient, gradient_int);

    let (isothermal, _) = physics
        .boundary_face_values(1, &x, &normal, &u_int, &gradient_int)
        .unwrap();
    assert_eq!(isothermal[1..3], [0.0, 0.0]);
    assert_scalar_eq!(physics.temperature(&isothermal), 1.5, comp = abs, tol = 1e-13);

    let (farfield, farfield_gradient) = physics
        .boundary_face_values(2, &x, &normal, &u_int, &gradient_int)
        .unwrap();
    assert_eq!(&farfield, physics.euler().freestream());
    assert_eq!(farfield_gradient, gradient_int);

    let (manufactured, manufactured_gradient) = physics
        .boundary_face_values(3, &x, &normal, &u_int, &gradient_int)
        .unwrap();
    let solution = physics.euler().manufactured_solution();
    assert_eq!(manufactured, solution.value(&x));
    assert_eq!(manufactured_gradient, solution.gradient(&x));

    assert!(physics
        .boundary_face_values(4, &x, &normal, &u_int, &gradient_int)
        .is_err());
}

proptest! {
    #[test]
    fn navier_stokes_dissipative_flux_is_linear_in_gradient(
        u in euler_2d_state(),
        g in prop::array::uniform8(-1.0..1.0f64),
        h in prop::array::uniform8(-1.0..1.0f64),
        alpha in -2.0..2.0f64,
    ) {
        let physics = navier_stokes();
        let as_gradient = |v: [f64; 8]| -> [[f64; 2]; 4] { std::array::from_fn(|s| [v[2 * s], v[2 * s + 1]]) };
        let combined: [f64; 8] = std::array::from_fn(|i| g[i] + alpha * h[i]);

        let flux_g = physics.dissipative_flux(&u, &as_gradient(g));
        let flux_h = physics.dissipative_flux(&u, &as_gradient(h));
        let flux_combined = physics.dissipative_flux(&u, &as_gradient(combined));
        for s in 0..4 {
            for d in 0..2 {
                let expected = flux_g[s][d] + alpha * flux_h[s][d];
                prop_assert!((flux_combined[s][d] - expected).abs() <= 1e-12 * (1.0 + expected.abs()));
            }
        }
    }
}
