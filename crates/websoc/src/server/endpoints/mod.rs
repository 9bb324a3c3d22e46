pub mod status;
pub mod websoc;
