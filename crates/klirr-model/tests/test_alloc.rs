use faer::Mat;
use klirr_circuit::circuit::Circuit;
use klirr_circuit::elements::{capacitor, diode, resistor, voltage_input, voltage_probe};
use klirr_model::{DiscreteModel, ModelRunner};
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

struct CountingAlloc;

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

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
fn warm_inner_loop_allocates_nothing() {
    let mut model = DiscreteModel::new(&clipper(), 44100).unwrap();
    let n = 4410;
    let mut u = Mat::zeros(1, n);
    for s in 0..n {
        u[(0, s)] = 0.8 * (2.0 * std::f64::consts::PI * 440.0 * s as f64 / 44100.0).sin();
    }
    let mut y = Mat::zeros(1, n);

    // warmup run populates the solver caches along the whole trajectory
    {
        let mut runner = ModelRunner::new(&mut model, false);
        runner.run_into(&mut y, &u).unwrap();
    }
    // an identical trajectory must be served entirely from pre-sized
    // buffers and the existing cache
    model.reset_state();
    let mut runner = ModelRunner::new(&mut model, false);
    let before = ALLOCATIONS.load(Ordering::Relaxed);
    runner.run_into(&mut y, &u).unwrap();
    let after = ALLOCATIONS.load(Ordering::Relaxed);
    assert_eq!(after - before, 0, "inner loop allocated {}", after - before);
}
