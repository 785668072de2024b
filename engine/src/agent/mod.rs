//! Participant agents
//!
//! A [`ChatAgent`] is one team member: a model client, instructions and a
//! tool set. [`factory::setup_agents`] turns the agent configurations of a
//! session into participants.

pub mod core;
pub mod factory;
pub mod working_memory;

pub use core::{ChatAgent, TranscriptEntry, MAX_ITERATIONS, MAX_RESULT_SIZE};
pub use factory::{setup_agents, AgentContext};
pub use working_memory::WorkingMemory;
