//! Messaging between the detection loop and its consumers

pub mod messages;

pub use messages::DetectionEvent;
