pub mod accounts;
pub mod autorun;
pub mod calendar;
pub mod delay;
pub mod error;
pub mod events;
pub mod jobs;
pub mod lifecycle;
pub mod remote;
pub mod textgen;
