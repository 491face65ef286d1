#![doc = "s3-deploy-core: core logic library for s3-deploy."]

//! This crate contains the pure parts of a deployment run: turning raw
//! environment input into a validated [`config::Config`], reading the
//! transcript of an `s3 sync`, and deciding which CDN paths to invalidate.
//! The external tools are reached only through the traits in [`contract`].
//!
//! # Usage
//! The CLI crate (`s3-deploy`) wires real `aws` CLI collaborators into
//! [`deploy::deploy`]; tests wire the generated mocks.

pub mod config;
pub mod contract;
pub mod deploy;
pub mod invalidation;
pub mod sync_output;
