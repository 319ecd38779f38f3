use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::user::UserRole;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "announcement_audience", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    All,
    HouseOwners,
    Technicians,
}

impl Audience {
    pub fn covers(self, role: UserRole) -> bool {
        match self {
            Audience::All => true,
            Audience::HouseOwners => matches!(role, UserRole::HouseOwner | UserRole::Admin),
            Audience::Technicians => matches!(role, UserRole::Technician | UserRole::Admin),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct Announcement {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub audience: Audience,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub created_by: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Announcement {
    /// Active means inside the display window: started, and either open-ended
    /// or not yet past end_date.
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        self.start_date <= now && self.end_date.map_or(true, |end| end > now)
    }

    /// Still active but ending within the next two days.
    pub fn is_expiring_soon(&self, now: NaiveDateTime) -> bool {
        match self.end_date {
            Some(end) => self.is_active(now) && end <= now + Duration::days(2),
            None => false,
        }
    }
}

/// Announcement plus the derived window flags, the shape listings return.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnnouncementView {
    #[serde(flatten)]
    pub announcement: Announcement,
    pub is_active: bool,
    pub is_expiring_soon: bool,
}

impl AnnouncementView {
    pub fn at(announcement: Announcement, now: NaiveDateTime) -> Self {
        let is_active = announcement.is_active(now);
        let is_expiring_soon = announcement.is_expiring_soon(now);
        AnnouncementView {
            announcement,
            is_active,
            is_expiring_soon,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewAnnouncement {
    pub title: String,
    pub body: String,
    pub audience: Option<Audience>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAnnouncement {
    pub title: Option<String>,
    pub body: Option<String>,
    pub audience: Option<Audience>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<Option<NaiveDateTime>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn announcement(start: NaiveDateTime, end: Option<NaiveDateTime>) -> Announcement {
        Announcement {
            id: 1,
            title: "Maintenance window".into(),
            body: "Scheduled downtime".into(),
            audience: Audience::All,
            start_date: start,
            end_date: end,
            created_by: 1,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn past_end_date_is_inactive() {
        let a = announcement(at(2025, 1, 1), Some(at(2025, 1, 10)));
        assert!(!a.is_active(at(2025, 1, 11)));
    }

    #[test]
    fn open_ended_is_always_active_once_started() {
        let a = announcement(at(2025, 1, 1), None);
        assert!(a.is_active(at(2030, 6, 1)));
        assert!(!a.is_expiring_soon(at(2030, 6, 1)));
    }

    #[test]
    fn not_yet_started_is_inactive() {
        let a = announcement(at(2025, 3, 1), None);
        assert!(!a.is_active(at(2025, 2, 28)));
    }

    #[test]
    fn ending_in_two_days_is_expiring_soon() {
        let a = announcement(at(2025, 1, 1), Some(at(2025, 1, 10)));
        assert!(a.is_expiring_soon(at(2025, 1, 8)));
        assert!(!a.is_expiring_soon(at(2025, 1, 5)));
    }

    #[test]
    fn audience_coverage_per_role() {
        assert!(Audience::All.covers(UserRole::HouseOwner));
        assert!(Audience::HouseOwners.covers(UserRole::HouseOwner));
        assert!(!Audience::HouseOwners.covers(UserRole::Technician));
        assert!(Audience::Technicians.covers(UserRole::Technician));
        assert!(!Audience::Technicians.covers(UserRole::HouseOwner));
        // admins see everything
        assert!(Audience::HouseOwners.covers(UserRole::Admin));
        assert!(Audience::Technicians.covers(UserRole::Admin));
    }
}
