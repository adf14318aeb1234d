use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==============================================================================
// CONSULTATION TYPES AND CLOCK TIMES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationType {
    Online,
    Clinic,
    Both,
}

impl ConsultationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationType::Online => "online",
            ConsultationType::Clinic => "clinic",
            ConsultationType::Both => "both",
        }
    }
}

impl fmt::Display for ConsultationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A wall-clock time of day in 24-hour "HH:MM" form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl FromStr for ClockTime {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("'{}' is not a valid HH:MM time", value);

        let bytes = value.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        let (hour, minute) = (&value[..2], &value[3..]);
        if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;
        ClockTime::new(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Parses a calendar date in strict "YYYY-MM-DD" form.
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let well_formed = value.len() == 10
        && value
            .bytes()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { b == b'-' } else { b.is_ascii_digit() });

    if !well_formed {
        return Err(format!("'{}' is not a valid YYYY-MM-DD date", value));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a valid YYYY-MM-DD date", value))
}

// ==============================================================================
// DOCTOR PROFILES
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicInfo {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: String,
    pub user_id: String,
    pub bio: Option<String>,
    pub specializations: Vec<String>,
    pub qualifications: Vec<String>,
    pub experience_years: u32,
    pub license_number: Option<String>,
    pub consultation_fee_online: f64,
    pub consultation_fee_clinic: f64,
    pub consultation_types: Vec<ConsultationType>,
    pub profile_image: Option<String>,
    pub clinic_info: Option<ClinicInfo>,
    pub rating: f64,
    pub total_reviews: u32,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorProfile {
    /// The fee charged for a consultation of the given type. A "both" booking is
    /// charged the lower of the two fees.
    pub fn fee_for(&self, consultation_type: ConsultationType) -> f64 {
        match consultation_type {
            ConsultationType::Online => self.consultation_fee_online,
            ConsultationType::Clinic => self.consultation_fee_clinic,
            ConsultationType::Both => self.consultation_fee_online.min(self.consultation_fee_clinic),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDoctorProfileRequest {
    pub bio: Option<String>,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    #[serde(default)]
    pub experience_years: u32,
    pub license_number: Option<String>,
    #[serde(default)]
    pub consultation_fee_online: f64,
    #[serde(default)]
    pub consultation_fee_clinic: f64,
    #[serde(default)]
    pub consultation_types: Vec<ConsultationType>,
    pub profile_image: Option<String>,
    pub clinic_info: Option<ClinicInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorProfileRequest {
    pub bio: Option<String>,
    pub specializations: Option<Vec<String>>,
    pub qualifications: Option<Vec<String>>,
    pub experience_years: Option<u32>,
    pub license_number: Option<String>,
    pub consultation_fee_online: Option<f64>,
    pub consultation_fee_clinic: Option<f64>,
    pub consultation_types: Option<Vec<ConsultationType>>,
    pub profile_image: Option<String>,
    pub clinic_info: Option<ClinicInfo>,
}

/// A profile joined with the owning user's contact details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfileResponse {
    #[serde(flatten)]
    pub profile: DoctorProfile,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialization: Option<String>,
    pub city: Option<String>,
    pub consultation_type: Option<ConsultationType>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

// ==============================================================================
// AVAILABILITY SLOTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
    Break,
    Unavailable,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
            SlotStatus::Break => "break",
            SlotStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: String,
    pub doctor_id: String,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub consultation_type: ConsultationType,
    pub status: SlotStatus,
    /// When the slot was last claimed by a booking; cleared on release.
    #[serde(default)]
    pub booked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Dates and times arrive as strings so malformed values surface as domain errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub consultation_type: ConsultationType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}
