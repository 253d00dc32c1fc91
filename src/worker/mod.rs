mod reminder;

pub use reminder::{reminder_process, sweep_overdue};
