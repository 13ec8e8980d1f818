//! Input conditioning: channel downmix and the rolling analysis window

pub mod channel_mixer;
pub mod window;
