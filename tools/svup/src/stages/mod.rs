//! The bring up, split into stages which each leave vSphere in a state the next one builds on.

pub mod argocd;
pub mod cluster;
pub mod network;
pub mod preconditions;
pub mod storage;
pub mod supervisor;

use std::fmt::Display;

use crate::backend::Outcome;

fn report(what: impl Display, outcome: Outcome) {
    println!("{what}: {outcome}");
}
