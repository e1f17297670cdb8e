pub mod accounts;
pub mod autorun;
pub mod jobs;
pub mod schedules;
