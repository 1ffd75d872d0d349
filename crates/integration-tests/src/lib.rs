//! Test harness for the agent functions: a mock OpenAI-compatible upstream
//! and helpers shared by the integration tests.

mod upstream;

pub use upstream::{MockUpstream, MockUpstreamBuilder, ReceivedRequest};
