//! Sensor subsystem. The feeder has a single analog input, the supply
//! voltage sense line.

pub mod vcc;
