use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use appointment_cell::{Appointment, AppointmentStatus};
use doctor_cell::{DoctorService, SlotStatus};
use shared_database::{collections, from_documents, DocumentStore, Filter, FindOptions};
use shared_models::auth::{User, UserRole};
use shared_utils::{authorize, AppState};

use crate::error::DashboardError;
use crate::models::{AdminDashboard, DoctorDashboard, PatientDashboard, PlatformStats, StatusCounts};

pub struct DashboardService {
    store: Arc<dyn DocumentStore>,
    doctors: DoctorService,
}

impl DashboardService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            doctors: DoctorService::new(state),
        }
    }

    pub async fn patient_dashboard(&self, patient: &User) -> Result<PatientDashboard, DashboardError> {
        authorize(patient, &[UserRole::Patient])?;
        debug!("Building patient dashboard for {}", patient.id);

        let today = Utc::now().date_naive();
        let own = Filter::new().eq("patient_id", patient.id.as_str());

        let upcoming_appointments: Vec<Appointment> = from_documents(
            self.store
                .find(
                    collections::APPOINTMENTS,
                    &own
                        .clone()
                        .in_list("status", AppointmentStatus::ACTIVE.iter().map(|s| s.as_str()))
                        .gte("appointment_date", today.to_string()),
                    &FindOptions::new()
                        .sort_asc("appointment_date")
                        .sort_asc("start_time"),
                )
                .await?,
        )?;

        Ok(PatientDashboard {
            message: format!("Welcome to patient dashboard, {}!", patient.name),
            user: patient.clone(),
            upcoming_appointments,
            appointment_counts: self.status_counts(&own).await?,
        })
    }

    pub async fn doctor_dashboard(&self, doctor: &User) -> Result<DoctorDashboard, DashboardError> {
        authorize(doctor, &[UserRole::Doctor])?;
        debug!("Building doctor dashboard for {}", doctor.id);

        let today = Utc::now().date_naive().to_string();
        let profile = self.doctors.find_profile(&doctor.id).await?;

        let appointments: Vec<Appointment> = from_documents(
            self.store
                .find(
                    collections::APPOINTMENTS,
                    &Filter::new().eq("doctor_id", doctor.id.as_str()),
                    &FindOptions::new()
                        .sort_asc("appointment_date")
                        .sort_asc("start_time"),
                )
                .await?,
        )?;

        let total_patients = appointments
            .iter()
            .map(|appointment| appointment.patient_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        let pending_appointments = appointments
            .iter()
            .filter(|appointment| appointment.status == AppointmentStatus::Pending)
            .count();

        // Without a profile there are no fees to earn.
        let earnings = profile.as_ref().map_or(0.0, |profile| {
            appointments
                .iter()
                .filter(|appointment| appointment.status == AppointmentStatus::Completed)
                .map(|appointment| profile.fee_for(appointment.consultation_type))
                .sum()
        });

        let upcoming_available_slots = self
            .store
            .count(
                collections::AVAILABILITY_SLOTS,
                &Filter::new()
                    .eq("doctor_id", doctor.id.as_str())
                    .eq("status", SlotStatus::Available.as_str())
                    .gte("date", today.as_str()),
            )
            .await?;

        let todays_appointments = appointments
            .into_iter()
            .filter(|appointment| appointment.appointment_date.to_string() == today)
            .collect();

        Ok(DoctorDashboard {
            message: format!("Welcome to doctor dashboard, {}!", doctor.name),
            user: doctor.clone(),
            has_profile: profile.is_some(),
            todays_appointments,
            pending_appointments,
            upcoming_available_slots,
            total_patients,
            earnings,
        })
    }

    pub async fn admin_dashboard(&self, admin: &User) -> Result<AdminDashboard, DashboardError> {
        authorize(admin, &[UserRole::Admin])?;
        debug!("Building admin dashboard for {}", admin.id);

        let users = Filter::new();
        let by_role = |role: UserRole| Filter::new().eq("role", role.as_str());

        let stats = PlatformStats {
            total_users: self.store.count(collections::USERS, &users).await?,
            doctors: self.store.count(collections::USERS, &by_role(UserRole::Doctor)).await?,
            patients: self.store.count(collections::USERS, &by_role(UserRole::Patient)).await?,
            admins: self.store.count(collections::USERS, &by_role(UserRole::Admin)).await?,
            total_appointments: self.store.count(collections::APPOINTMENTS, &Filter::new()).await?,
            appointments_by_status: self.status_counts(&Filter::new()).await?,
            total_slots: self
                .store
                .count(collections::AVAILABILITY_SLOTS, &Filter::new())
                .await?,
        };

        Ok(AdminDashboard {
            message: format!("Welcome to admin dashboard, {}!", admin.name),
            user: admin.clone(),
            stats,
        })
    }

    async fn status_counts(&self, scope: &Filter) -> Result<StatusCounts, DashboardError> {
        let mut counts = StatusCounts::new();
        for status in AppointmentStatus::ALL {
            let count = self
                .store
                .count(
                    collections::APPOINTMENTS,
                    &scope.clone().eq("status", status.as_str()),
                )
                .await?;
            counts.insert(status.as_str().to_string(), count);
        }
        Ok(counts)
    }
}
