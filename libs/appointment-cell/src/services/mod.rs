pub mod booking;
pub mod consistency;
pub mod lifecycle;

pub use booking::AppointmentBookingService;
pub use consistency::SlotReconciler;
