pub mod calendar;
pub mod domain;
pub mod history;
pub mod window;
