//! Cloud resource services.
//!
//! Each service owns one kind of cloud resource and exposes a `reconcile`
//! and a `delete` entry point. Both are idempotent: they look the desired
//! resource up before mutating anything, so a pass over an already-converged
//! cluster performs no writes.

pub mod instance;
#[cfg(test)]
mod instance_test;
pub mod loadbalancer;
pub mod private_network;
pub mod public_gateway;
pub mod security_group;
