//! This crate contains a set of helpers to build static analysis tools based
//! on [monotone dataflow frameworks](https://en.wikipedia.org/wiki/Data-flow_analysis).
//! The building blocks include helpers for
//! [control flow graphs](https://en.wikipedia.org/wiki/Control-flow_graph),
//! creating [lattice](https://en.wikipedia.org/wiki/Lattice_(order)) domains,
//! and a worklist solver that works for both forward and backward problems
//! over intra- and inter-procedural flow graphs.
//! There are also a set of concrete lattice implementations like the bitset
//! lattice, the map lattice, and the constant propagation lattice.
//!
//! Look at the oir-lib crate for an example how to define analyses using
//! the helpers in this crate.
//!
//! Some resources to learn more about dataflow analysis:
//! * [Static Program Analysis, Anders Møller and Michael I. Schwartzbach](https://cs.au.dk/~amoeller/spa/)
//! * [Data Flow Analysis: Theory and Practice](https://www.amazon.com/Data-Flow-Analysis-Theory-Practice/dp/0849328802)
//! * [Data flow analysis: an informal introduction](https://clang.llvm.org/docs/DataFlowAnalysisIntro.html)
//!
//! Frameworks:
//! * [SPARTA](https://github.com/facebook/SPARTA)
//! * [PHASAR](https://phasar.org/)
//! * [Tai-e](https://github.com/pascal-lab/Tai-e)

/// Trait for defining a control flow graph, and some algorithms and data
/// structures to make it easier to work with them.
pub mod cfg;

/// A curated collection of semi-lattices and lattices, including some
/// transformers to help building larger lattices from smaller ones.
pub mod domains;

/// Implementations of fixed-point iteration algorithms using worklists.
pub mod solvers;

#[cfg(test)]
mod cfg_tests;

#[cfg(test)]
mod solvers_tests;
