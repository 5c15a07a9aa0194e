//! Signal processing for the echo engine
//!
//! - [`DelayLine`]: circular history of past output samples
//! - [`EchoUnit`]: per-block delay-and-decay mix driven by [`EchoControl`](crate::params::EchoControl)

mod delay_line;
mod echo;

pub use delay_line::DelayLine;
pub use echo::EchoUnit;
