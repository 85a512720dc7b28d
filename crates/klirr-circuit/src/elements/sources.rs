use crate::prelude::*;

/// Ideal voltage source of fixed value: `v = V`.
pub fn voltage_source(v: f64) -> Element {
    ElementBuilder::new()
        .mv(RatMat::from_rows(&[vec![rat(1)]]))
        .u0(RatMat::from_rows(&[vec![rat_from_f64(v)]]))
        .pin("+", 0, 1)
        .pin("-", 0, -1)
        .build()
        .expect("voltage source matrices are consistent")
}

/// Voltage source driven by one input channel: `v = u`.
pub fn voltage_input() -> Element {
    ElementBuilder::new()
        .mv(RatMat::from_rows(&[vec![rat(1)]]))
        .mu(RatMat::from_rows(&[vec![rat(1)]]))
        .pin("+", 0, 1)
        .pin("-", 0, -1)
        .build()
        .expect("voltage input matrices are consistent")
}

/// Ideal current source of fixed value: `i = I`, flowing from the positive
/// pin to the negative pin through the element.
pub fn current_source(i: f64) -> Element {
    ElementBuilder::new()
        .mi(RatMat::from_rows(&[vec![rat(1)]]))
        .u0(RatMat::from_rows(&[vec![rat_from_f64(i)]]))
        .pin("+", 0, 1)
        .pin("-", 0, -1)
        .build()
        .expect("current source matrices are consistent")
}

/// Current source driven by one input channel: `i = u`.
pub fn current_input() -> Element {
    ElementBuilder::new()
        .mi(RatMat::from_rows(&[vec![rat(1)]]))
        .mu(RatMat::from_rows(&[vec![rat(1)]]))
        .pin("+", 0, 1)
        .pin("-", 0, -1)
        .build()
        .expect("current input matrices are consistent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_contribute_one_channel() {
        assert_eq!(voltage_input().nu(), 1);
        assert_eq!(current_input().nu(), 1);
        assert_eq!(voltage_source(9.0).nu(), 0);
        assert_eq!(current_source(1e-3).nu(), 0);
    }
}
