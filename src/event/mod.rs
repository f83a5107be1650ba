mod event;
mod generator;

pub use event::RoundEvent;
pub use generator::{event_for_draw, EventGenerator, RngSource, UniformSource};

#[cfg(test)]
pub use generator::MockUniformSource;
