//! hadroplan — staged elicitation of lattice QCD measurement jobs.
//!
//! A free-text request goes in; a fully cross-referenced Grid/Hadrons job
//! description comes out. In between, a fixed sequence of stages each
//! extracts one kind of entity from the conversation with an LLM,
//! validates it structurally, holds it at an approval gate, and commits it
//! to a checkpointed state that the renderer finally projects to XML.

pub mod config;
pub mod console;
pub mod llm;
pub mod pipeline;
pub mod render;
pub mod schema;
pub mod stages;
pub mod state;
