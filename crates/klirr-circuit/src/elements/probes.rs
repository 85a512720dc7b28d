use crate::prelude::*;

/// Open-circuit probe reporting its branch voltage: `i = 0`, `y = v`.
pub fn voltage_probe() -> Element {
    ElementBuilder::new()
        .mi(RatMat::from_rows(&[vec![rat(1)]]))
        .pv(RatMat::from_rows(&[vec![rat(1)]]))
        .pin("+", 0, 1)
        .pin("-", 0, -1)
        .build()
        .expect("voltage probe matrices are consistent")
}

/// Short-circuit probe reporting its branch current: `v = 0`, `y = i`.
pub fn current_probe() -> Element {
    ElementBuilder::new()
        .mv(RatMat::from_rows(&[vec![rat(1)]]))
        .pi(RatMat::from_rows(&[vec![rat(1)]]))
        .pin("+", 0, 1)
        .pin("-", 0, -1)
        .build()
        .expect("current probe matrices are consistent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probes_define_one_output_each() {
        assert_eq!(voltage_probe().ny(), 1);
        assert_eq!(current_probe().ny(), 1);
        assert_eq!(voltage_probe().nn(), 0);
    }
}
