use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    Blocking,
    Sleeping,
    Yielding,
    BusySpin,
    TimeoutBlocking,
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Blocking
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerMode {
    Single,
    Multi,
}

impl Default for ProducerMode {
    fn default() -> Self {
        ProducerMode::Single
    }
}
