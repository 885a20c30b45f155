pub mod user;
pub mod patient;
pub mod appointment;
pub mod system_control;

pub use user::User;
pub use patient::Patient;
pub use appointment::Appointment;
pub use system_control::SystemControl;
