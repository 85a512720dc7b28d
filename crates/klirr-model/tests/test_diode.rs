use faer::Mat;
use klirr_circuit::circuit::Circuit;
use klirr_circuit::constants::THERMAL_VOLTAGE;
use klirr_circuit::elements::{
    capacitor, diode, resistor, voltage_input, voltage_probe, voltage_source,
};
use klirr_model::{DiscreteModel, ModelRunner, steadystate, steadystate_install};

fn clipper() -> Circuit {
    let mut circ = Circuit::new();
    let input = circ.add(voltage_input());
    let r = circ.add(resistor(1e3));
    let c = circ.add(capacitor(47e-9));
    let d1 = circ.add(diode(1e-15, 1.0));
    let d2 = circ.add(diode(1e-15, 1.0));
    let probe = circ.add(voltage_probe());
    circ.connect(&[(input, "+"), (r, "+")]).unwrap();
    circ.connect(&[(r, "-"), (c, "+"), (d1, "+"), (d2, "-"), (probe, "+")])
        .unwrap();
    circ.connect(&[(input, "-"), (c, "-"), (d1, "-"), (d2, "+"), (probe, "-")])
        .unwrap();
    circ
}

#[test]
fn series_diode_drop_matches_shockley() {
    // drive with exactly V = I·R + η·V_T·ln(I/I_s + 1); the diode then
    // carries I and the probe must read the logarithmic term
    let (i_set, r0, i_s, eta): (f64, f64, f64, f64) = (1e-3, 2.2e3, 1e-12, 1.4);
    let v_d = eta * THERMAL_VOLTAGE * (i_set / i_s + 1.0).ln();
    let v_in = i_set * r0 + v_d;

    let mut circ = Circuit::new();
    let src = circ.add(voltage_source(v_in));
    let r = circ.add(resistor(r0));
    let d = circ.add(diode(i_s, eta));
    let probe = circ.add(voltage_probe());
    circ.connect(&[(src, "+"), (r, "+")]).unwrap();
    circ.connect(&[(r, "-"), (d, "+"), (probe, "+")]).unwrap();
    circ.connect(&[(src, "-"), (d, "-"), (probe, "-")]).unwrap();

    let mut model = DiscreteModel::new(&circ, 44100).unwrap();
    // the whole circuit is static, so the nonlinearity folds into a constant
    assert_eq!(model.nx(), 0);
    let mut runner = ModelRunner::new(&mut model, false);
    let y = runner.run(&Mat::zeros(0, 3)).unwrap();
    for s in 0..3 {
        assert!(
            (y[(0, s)] - v_d).abs() < 1e-8,
            "probe {} vs {v_d}",
            y[(0, s)]
        );
    }
}

#[test]
fn clipper_limits_and_reaches_steady_state() {
    let mut model = DiscreteModel::new(&clipper(), 44100).unwrap();
    // two diode unknowns couple through one node: a single sub-problem with
    // a reduced parameter
    assert_eq!(model.subproblems().len(), 1);
    let sub = &model.subproblems()[0];
    assert_eq!(sub.nn(), 2);
    assert!(sub.np() >= 1 && sub.np() < sub.nq());

    let n = 44100;
    let mut u = Mat::zeros(1, n);
    for s in 0..n {
        u[(0, s)] = (2.0 * std::f64::consts::PI * 1000.0 * s as f64 / 44100.0).sin();
    }
    let mut runner = ModelRunner::new(&mut model, false);
    let y = runner.run(&u).unwrap();
    assert_eq!((y.nrows(), y.ncols()), (1, n));

    // hard limiting well below the 1 V drive
    let peak = (0..n).fold(0.0f64, |m, s| m.max(y[(0, s)].abs()));
    assert!(peak < 0.95, "peak {peak}");
    assert!(peak > 0.3, "clipper output suspiciously small: {peak}");

    // periodic steady state: the last two 10-period windows agree in rms
    let rms = |lo: usize, hi: usize| -> f64 {
        let acc: f64 = (lo..hi).map(|s| y[(0, s)] * y[(0, s)]).sum();
        (acc / (hi - lo) as f64).sqrt()
    };
    let a = rms(n - 2 * 441, n - 441);
    let b = rms(n - 441, n);
    assert!((a - b).abs() < 1e-3, "rms drift {a} vs {b}");
}

#[test]
fn steady_state_is_a_fixed_point_of_the_runtime() {
    let mut model = DiscreteModel::new(&clipper(), 44100).unwrap();
    let xstar = steadystate_install(&mut model, &[0.7]).unwrap();
    assert_eq!(xstar.len(), model.nx());

    let mut u = Mat::zeros(1, 1);
    u[(0, 0)] = 0.7;
    let mut runner = ModelRunner::new(&mut model, false);
    runner.run(&u).unwrap();
    for i in 0..model.nx() {
        assert!(
            (model.state()[i] - xstar[i]).abs() < 1e-10,
            "state drifted: {} vs {}",
            model.state()[i],
            xstar[i]
        );
    }
}

#[test]
fn quiescent_point_survives_a_zero_sample() {
    let mut model = DiscreteModel::new(&clipper(), 44100).unwrap();
    // with zero drive the quiescent point is the origin
    let x = steadystate(&model, &[0.0]).unwrap();
    for v in &x {
        assert!(v.abs() < 1e-12);
    }
    let xstar = steadystate_install(&mut model, &[0.0]).unwrap();
    let mut runner = ModelRunner::new(&mut model, false);
    runner.run(&Mat::zeros(1, 1)).unwrap();
    for i in 0..model.nx() {
        assert!((model.state()[i] - xstar[i]).abs() < 1e-10);
    }
}
