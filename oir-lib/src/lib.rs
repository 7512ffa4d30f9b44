//! An object-oriented three-address IR and the analyses that run on it:
//! intra- and inter-procedural dataflow analyses, class hierarchy call
//! graphs, context-insensitive and context-sensitive pointer analyses, and
//! a taint analysis built on top of them.

pub mod callgraph;
pub mod cfg;
pub mod cha;
pub mod dataflow;
pub mod heap;
pub mod hierarchy;
pub mod icfg;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod pta;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod lexer_tests;

#[cfg(test)]
mod parser_tests;


#[cfg(test)]
mod cha_tests;

#[cfg(test)]
mod icfg_tests;
