//! # Tabsync Engine
//!
//! Conversion registry, dependency batch scheduler, and reconciliation
//! pass drivers for the tabsync cache.
//!
//! This crate provides:
//! - Typed, immutable conversion descriptors validated at registration
//! - An explicit registry mapping entity types to their converters
//! - Tier scheduling over the prerequisite graph, with a fatal diagnostic
//!   for cyclic or unsatisfiable declarations
//! - Receive/send pass drivers with per-object failure aggregation
//! - The external collaborator traits (tabular binding, graph store) and
//!   mock implementations for tests
//!
//! ## Key Invariants
//!
//! - Tiers are strictly sequential; a type never runs before its
//!   prerequisites
//! - Per-object indices are resolved before any conversion writes begin,
//!   so intra-tier workers never race on a slot
//! - A failing object is excluded and counted, never fatal to its batch
//! - An unsatisfiable prerequisite graph aborts the pass with the stuck
//!   types named

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod descriptor;
mod error;
mod pass;
mod registry;
mod scheduler;

pub use client::{GraphClient, MockGraph, MockObject, MockTabular, TabularClient};
pub use descriptor::TypeDescriptor;
pub use error::{EngineError, EngineResult};
pub use pass::{EngineConfig, PassReport, ReconcilePass};
pub use registry::{Converter, ConverterRegistry, RecordDraft};
pub use scheduler::BatchScheduler;
