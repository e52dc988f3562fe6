//! Wayfinder: assistive navigation backend.
//!
//! A thin HTTP gateway over four pipeline stages — voice intent
//! classification, place resolution, route computation, and camera
//! obstacle analysis. External model and map providers sit behind
//! capability traits so every stage is testable with fakes.

pub mod config;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod obstacle;
pub mod place;
pub mod providers;
pub mod response;
pub mod route;
pub mod types;
