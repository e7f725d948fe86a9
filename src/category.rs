//! Per-component log categories.
//!
//! Every component picks its category at construction and logs under the
//! matching `log` target, so verbosity is tuned per component through the
//! logger filter, e.g. `RUST_LOG=warn,shadectl::device=debug`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Plain cached values with no wait policy.
    Signal,
    /// Periodically pushing sensors.
    Sensor,
    /// Status inputs of a bus-connected device.
    Device,
    /// Actuator gate checks and commands.
    Gate,
    /// Automation rules.
    Rule,
    /// The serial rule worker.
    Worker,
    /// Inbound message routing.
    Dispatch,
    /// Automation events written by the log sink.
    Event,
    /// The broker connection.
    Transport,
}

impl LogCategory {
    /// The `log` target string for this category.
    pub const fn target(self) -> &'static str {
        match self {
            Self::Signal => "shadectl::signal",
            Self::Sensor => "shadectl::sensor",
            Self::Device => "shadectl::device",
            Self::Gate => "shadectl::gate",
            Self::Rule => "shadectl::rule",
            Self::Worker => "shadectl::worker",
            Self::Dispatch => "shadectl::dispatch",
            Self::Event => "shadectl::event",
            Self::Transport => "shadectl::transport",
        }
    }
}
