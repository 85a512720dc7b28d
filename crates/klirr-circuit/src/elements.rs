pub mod bjt;
pub mod diode;
pub mod passive;
pub mod probes;
pub mod sources;

pub use bjt::{BjtKind, BjtParams, bjt};
pub use diode::diode;
pub use passive::{capacitor, inductor, resistor};
pub use probes::{current_probe, voltage_probe};
pub use sources::{current_input, current_source, voltage_input, voltage_source};
