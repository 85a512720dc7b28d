use crate::prelude::*;

/// Linear resistor: `v − R·i = 0`.
pub fn resistor(r: f64) -> Element {
    ElementBuilder::new()
        .mv(RatMat::from_rows(&[vec![rat(1)]]))
        .mi(RatMat::from_rows(&[vec![-rat_from_f64(r)]]))
        .pin("+", 0, 1)
        .pin("-", 0, -1)
        .build()
        .expect("resistor matrices are consistent")
}

/// Capacitor with charge state: `C·v − x = 0`, `i − ẋ = 0`.
pub fn capacitor(c: f64) -> Element {
    ElementBuilder::new()
        .mv(RatMat::from_rows(&[vec![rat_from_f64(c)], vec![rat(0)]]))
        .mi(RatMat::from_rows(&[vec![rat(0)], vec![rat(1)]]))
        .mx(RatMat::from_rows(&[vec![rat(-1)], vec![rat(0)]]))
        .mxd(RatMat::from_rows(&[vec![rat(0)], vec![rat(-1)]]))
        .pin("+", 0, 1)
        .pin("-", 0, -1)
        .build()
        .expect("capacitor matrices are consistent")
}

/// Inductor with flux state: `L·i − x = 0`, `v − ẋ = 0`.
pub fn inductor(l: f64) -> Element {
    ElementBuilder::new()
        .mi(RatMat::from_rows(&[vec![rat_from_f64(l)], vec![rat(0)]]))
        .mv(RatMat::from_rows(&[vec![rat(0)], vec![rat(1)]]))
        .mx(RatMat::from_rows(&[vec![rat(-1)], vec![rat(0)]]))
        .mxd(RatMat::from_rows(&[vec![rat(0)], vec![rat(-1)]]))
        .pin("+", 0, 1)
        .pin("-", 0, -1)
        .build()
        .expect("inductor matrices are consistent")
}
