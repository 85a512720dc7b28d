use clap::Parser;
use faer::Mat;
use klirr_circuit::circuit::Circuit;
use klirr_circuit::elements::{capacitor, diode, resistor, voltage_input, voltage_probe};
use klirr_model::{DiscreteModel, ModelRunner, steadystate_install};

/// Klirr compiles analog circuits into state-space simulators; this demo
/// runs the diode clipper over a sine.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sample rate in Hz.
    #[arg(short, long, default_value_t = 44100)]
    sample_rate: u32,

    /// Sine frequency in Hz.
    #[arg(short, long, default_value_t = 1000.0)]
    frequency: f64,

    /// Input amplitude in volts.
    #[arg(short, long, default_value_t = 2.0)]
    amplitude: f64,

    /// Duration in seconds.
    #[arg(short, long, default_value_t = 1.0)]
    duration: f64,

    /// Log simulation progress.
    #[arg(long, default_value_t = false)]
    progress: bool,
}

/// Series resistor into a capacitor with two antiparallel diodes to ground.
fn diode_clipper() -> Circuit {
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

fn main() {
    env_logger::init();
    let args = Args::parse();

    let circ = diode_clipper();
    let mut model = DiscreteModel::new(&circ, args.sample_rate).unwrap_or_else(|e| {
        eprintln!("Error compiling the clipper: {e}");
        std::process::exit(1);
    });

    if let Err(e) = steadystate_install(&mut model, &[0.0]) {
        eprintln!("Error finding the quiescent point: {e}");
        std::process::exit(1);
    }

    let n = (args.duration * f64::from(args.sample_rate)) as usize;
    let mut u = Mat::zeros(1, n);
    let w = 2.0 * std::f64::consts::PI * args.frequency / f64::from(args.sample_rate);
    for s in 0..n {
        u[(0, s)] = args.amplitude * (w * s as f64).sin();
    }

    println!(
        "Running {} samples at {} Hz through the diode clipper...",
        n, args.sample_rate
    );
    let start = std::time::Instant::now();
    let mut runner = ModelRunner::new(&mut model, args.progress);
    let y = runner.run(&u).unwrap_or_else(|e| {
        eprintln!("Error during simulation: {e}");
        std::process::exit(1);
    });
    let elapsed = start.elapsed();

    let (mut lo, mut hi, mut sum_sq) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
    for s in 0..n {
        let v = y[(0, s)];
        lo = lo.min(v);
        hi = hi.max(v);
        sum_sq += v * v;
    }
    println!(
        "out: min {:.4} V, max {:.4} V, rms {:.4} V",
        lo,
        hi,
        (sum_sq / n as f64).sqrt()
    );
    println!(
        "{} samples in {:.1} ms ({:.1}x real time)",
        n,
        elapsed.as_secs_f64() * 1e3,
        args.duration / elapsed.as_secs_f64()
    );
}
