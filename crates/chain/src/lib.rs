//! Closed-form pose-chain optimization.
//!
//! Optimizes a chain of sequential poses subject to loop-closure
//! constraints. Instead of iterating a nonlinear solver over the full
//! graph, each loop-closure correction is distributed along its chain
//! segment in closed form, weighted by the information carried by the
//! relative measurements, which makes every update linear in the
//! segment length.
//!
//! Supported solution spaces: SE(3) rigid motions, Sim(3) rigid motions
//! with drifting scale, and RxT(3) decoupled rotation/translation.

mod driver;
mod integrate;
mod interpolate;
mod store;
mod update;

pub use driver::{Method, OptimizeConfig};
pub use store::{
    identity_covariance, ChainError, LoopClosure, PoseChain, RelativeEdge, SolutionSpace,
};
