//! Transport adapters: capture plumbing, the outbound feature socket and
//! the inbound command socket

pub mod capture;
pub mod listener;
pub mod transmitter;
