//! Core traits for the learned link
//!
//! Each trait represents one orthogonal axis of link configuration.

mod feedback;

pub use feedback::FeedbackLink;
