//! Field-resolution and navigation engine.
//!
//! Leaf-first: [`oracle`] decides answers, [`classifier`] derives questions,
//! [`filler`] applies answers, [`resolution`] loops over one form step,
//! [`application`] drives one listing, [`pagination`] moves through result pages,
//! and [`run`] ties them into the outer job loop.
//!
//! Everything runs sequentially on one task: the browser session is a single stateful
//! resource and is never touched concurrently.

pub mod application;
pub mod classifier;
pub mod filler;
pub mod models;
pub mod oracle;
pub mod pagination;
pub mod prompts;
pub mod resolution;
pub mod run;

pub use run::{RunController, RunSummary};
