//! # The genfsm compiler
//!
//! This crate plumbs together the genfsm crates and provides the
//! command-line interface of the compiler. Libraries should depend on
//! [`genfsm_frontend`], [`genfsm_ir`], [`genfsm_opt`] and [`genfsm_backend`]
//! directly.
pub mod cmdline;
pub mod driver;
