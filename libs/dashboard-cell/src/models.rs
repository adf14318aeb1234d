use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use appointment_cell::Appointment;
use shared_models::auth::User;

/// Appointment counts keyed by status name. Every status is present, zero included.
pub type StatusCounts = BTreeMap<String, usize>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDashboard {
    pub message: String,
    pub user: User,
    pub upcoming_appointments: Vec<Appointment>,
    pub appointment_counts: StatusCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorDashboard {
    pub message: String,
    pub user: User,
    pub has_profile: bool,
    pub todays_appointments: Vec<Appointment>,
    pub pending_appointments: usize,
    pub upcoming_available_slots: usize,
    pub total_patients: usize,
    pub earnings: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_users: usize,
    pub doctors: usize,
    pub patients: usize,
    pub admins: usize,
    pub total_appointments: usize,
    pub appointments_by_status: StatusCounts,
    pub total_slots: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDashboard {
    pub message: String,
    pub user: User,
    pub stats: PlatformStats,
}
