use faer::Mat;
use klirr_circuit::circuit::Circuit;
use klirr_circuit::elements::{
    capacitor, current_source, inductor, resistor, voltage_input, voltage_probe,
};
use klirr_model::{DiscreteModel, ModelRunner};

#[test]
fn empty_circuit_produces_empty_output() {
    let circ = Circuit::new();
    let mut model = DiscreteModel::new(&circ, 44100).unwrap();
    assert_eq!((model.nu(), model.ny(), model.nx()), (0, 0, 0));
    let mut runner = ModelRunner::new(&mut model, false);
    let y = runner.run(&Mat::zeros(0, 128)).unwrap();
    assert_eq!((y.nrows(), y.ncols()), (0, 128));
}

#[test]
fn resistor_across_current_source_reads_ohms_law() {
    let (i0, r0) = (2e-3, 4.7e3);
    let mut circ = Circuit::new();
    let src = circ.add(current_source(i0));
    let r = circ.add(resistor(r0));
    let probe = circ.add(voltage_probe());
    circ.connect(&[(src, "-"), (r, "+"), (probe, "+")]).unwrap();
    circ.connect(&[(src, "+"), (r, "-"), (probe, "-")]).unwrap();

    let mut model = DiscreteModel::new(&circ, 48000).unwrap();
    assert_eq!((model.nu(), model.ny()), (0, 1));
    let mut runner = ModelRunner::new(&mut model, false);
    let y = runner.run(&Mat::zeros(0, 4)).unwrap();
    for s in 0..4 {
        assert!((y[(0, s)] - i0 * r0).abs() < 1e-9);
    }
}

#[test]
fn input_row_mismatch_is_a_usage_error() {
    let mut circ = Circuit::new();
    let src = circ.add(voltage_input());
    let r = circ.add(resistor(1e3));
    circ.connect(&[(src, "+"), (r, "+")]).unwrap();
    circ.connect(&[(src, "-"), (r, "-")]).unwrap();
    let mut model = DiscreteModel::new(&circ, 48000).unwrap();
    let mut runner = ModelRunner::new(&mut model, false);
    assert!(runner.run(&Mat::zeros(2, 16)).is_err());
}

#[test]
fn rc_lowpass_follows_the_trapezoidal_step_response() {
    let (r0, c0) = (1e3, 1e-6); // τ = 1 ms
    let mut circ = Circuit::new();
    let src = circ.add(voltage_input());
    let r = circ.add(resistor(r0));
    let c = circ.add(capacitor(c0));
    let probe = circ.add(voltage_probe());
    circ.connect(&[(src, "+"), (r, "+")]).unwrap();
    circ.connect(&[(r, "-"), (c, "+"), (probe, "+")]).unwrap();
    circ.connect(&[(src, "-"), (c, "-"), (probe, "-")]).unwrap();

    let fs = 20_000; // T = 50 µs
    let mut model = DiscreteModel::new(&circ, fs).unwrap();
    assert_eq!(model.nx(), 1);
    let mut runner = ModelRunner::new(&mut model, false);
    let n = 400; // 20 ms
    let mut u = Mat::zeros(1, n);
    for s in 0..n {
        u[(0, s)] = 1.0;
    }
    let y = runner.run(&u).unwrap();

    // the solved branch quantities sit at the trapezoidal midpoint
    let tau = r0 * c0;
    let t_mid = (42.0 + 0.5) * 50e-6;
    let expected = 1.0 - (-t_mid / tau).exp();
    assert!((y[(0, 42)] - expected).abs() < 1e-3);
    assert!((y[(0, n - 1)] - 1.0).abs() < 1e-3);
    assert!(y[(0, 0)].abs() < 0.1);
}

#[test]
fn rl_divider_settles_to_the_drive() {
    let mut circ = Circuit::new();
    let src = circ.add(voltage_input());
    let l = circ.add(inductor(1e-3));
    let r = circ.add(resistor(100.0));
    let probe = circ.add(voltage_probe());
    circ.connect(&[(src, "+"), (l, "+")]).unwrap();
    circ.connect(&[(l, "-"), (r, "+"), (probe, "+")]).unwrap();
    circ.connect(&[(src, "-"), (r, "-"), (probe, "-")]).unwrap();

    let mut model = DiscreteModel::new(&circ, 100_000).unwrap();
    let mut runner = ModelRunner::new(&mut model, false);
    let n = 200; // 2 ms = 200 · τ/10 with τ = L/R = 10 µs
    let mut u = Mat::zeros(1, n);
    for s in 0..n {
        u[(0, s)] = 1.0;
    }
    let y = runner.run(&u).unwrap();
    assert!((y[(0, n - 1)] - 1.0).abs() < 1e-3);
}
