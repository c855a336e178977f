pub mod hours;
pub mod lifecycle;
pub mod model;
pub mod overdue;
pub mod rollover;
