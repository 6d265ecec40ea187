//! Student profile kept under `students/{uid}/profile`.
//!
//! Name and email belong to the student record and are only mirrored here;
//! the rest is edited by the student.

use std::sync::Arc;

use chrono::Datelike;
use quiz_core::Clock;
use quiz_core::model::UserId;
use storage::RealtimeStore;
use storage::paths;
use storage::records::{ProfileDoc, StudentDoc, get_doc, set_doc};

use crate::error::ProfileError;

pub const INTERESTS: &[&str] = &[
    "Web Development",
    "Mobile Development",
    "Cloud Computing",
    "DevOps",
    "Artificial Intelligence",
    "Data Science",
    "Cybersecurity",
    "Networking",
    "Linux",
    "Programming Languages",
];

const EARLIEST_YEAR: u32 = 1950;
/// Expected graduation years may lie this far ahead.
const YEARS_AHEAD: u32 = 10;

/// Editable fields. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub phone: Option<String>,
    pub institution: Option<String>,
    pub qualification: Option<String>,
    pub year_of_passing: Option<u32>,
    pub education: Option<String>,
    pub interests: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn RealtimeStore>,
    clock: Clock,
}

impl ProfileService {
    #[must_use]
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self {
            store,
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The stored profile over the student's name and email. A student with
    /// no profile yet gets blank fields.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Storage` if either read fails.
    pub async fn get_profile(&self, uid: &UserId) -> Result<ProfileDoc, ProfileError> {
        let student: Option<StudentDoc> =
            get_doc(self.store.as_ref(), &paths::student(uid)).await?;
        let stored: Option<ProfileDoc> = get_doc(self.store.as_ref(), &paths::profile(uid)).await?;

        let mut profile = stored.unwrap_or_default();
        if let Some(student) = student {
            if profile.name.is_empty() {
                profile.name = student.name;
            }
            if profile.email.is_empty() {
                profile.email = student.email.unwrap_or_default();
            }
        }
        Ok(profile)
    }

    /// Applies `update` and writes the whole profile back.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::UnknownInterest` or `ProfileError::InvalidYear`
    /// before anything is written, `ProfileError::Storage` if a read or the
    /// write fails.
    pub async fn update_profile(
        &self,
        uid: &UserId,
        update: ProfileUpdate,
    ) -> Result<ProfileDoc, ProfileError> {
        let mut profile = self.get_profile(uid).await?;

        if let Some(year) = update.year_of_passing {
            let latest = u32::try_from(self.clock.now().year()).unwrap_or(0) + YEARS_AHEAD;
            if !(EARLIEST_YEAR..=latest).contains(&year) {
                return Err(ProfileError::InvalidYear(year));
            }
            profile.year_of_passing = Some(year);
        }
        if let Some(interests) = update.interests {
            profile.interests = normalize_interests(interests)?;
        }
        for (field, value) in [
            (&mut profile.phone, update.phone),
            (&mut profile.institution, update.institution),
            (&mut profile.qualification, update.qualification),
            (&mut profile.education, update.education),
        ] {
            if let Some(value) = value {
                *field = value.trim().to_string();
            }
        }

        self.save(uid, &profile).await?;
        Ok(profile)
    }

    /// Adds `interest` if absent, removes it if present.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::UnknownInterest` for a name outside
    /// `INTERESTS`, `ProfileError::Storage` if a read or the write fails.
    pub async fn toggle_interest(
        &self,
        uid: &UserId,
        interest: &str,
    ) -> Result<ProfileDoc, ProfileError> {
        let interest = canonical_interest(interest)?;
        let mut profile = self.get_profile(uid).await?;
        if let Some(pos) = profile.interests.iter().position(|i| i == interest) {
            profile.interests.remove(pos);
        } else {
            profile.interests.push(interest.to_string());
        }
        self.save(uid, &profile).await?;
        Ok(profile)
    }

    async fn save(&self, uid: &UserId, profile: &ProfileDoc) -> Result<(), ProfileError> {
        set_doc(self.store.as_ref(), &paths::profile(uid), profile).await?;
        log::info!("saved profile for {uid}");
        Ok(())
    }
}

/// Matches case-insensitively and returns the listed spelling.
fn canonical_interest(name: &str) -> Result<&'static str, ProfileError> {
    let name = name.trim();
    INTERESTS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(name))
        .ok_or_else(|| ProfileError::UnknownInterest(name.to_string()))
}

fn normalize_interests(interests: Vec<String>) -> Result<Vec<String>, ProfileError> {
    let mut out: Vec<String> = Vec::with_capacity(interests.len());
    for interest in interests {
        let canonical = canonical_interest(&interest)?;
        if !out.iter().any(|i| i == canonical) {
            out.push(canonical.to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_clock;
    use serde_json::json;
    use storage::InMemoryStore;

    async fn service_with_student() -> (Arc<InMemoryStore>, ProfileService) {
        let store = Arc::new(InMemoryStore::new());
        store
            .set(
                "students/u1",
                json!({ "name": "Ada", "email": "ada@example.com", "points": 40 }),
            )
            .await
            .unwrap();
        let service = ProfileService::new(store.clone()).with_clock(fixed_clock());
        (store, service)
    }

    #[tokio::test]
    async fn fresh_profile_mirrors_the_student() {
        let (_, service) = service_with_student().await;
        let profile = service.get_profile(&UserId::new("u1")).await.unwrap();
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.email, "ada@example.com");
        assert!(profile.interests.is_empty());
        assert_eq!(profile.year_of_passing, None);
    }

    #[tokio::test]
    async fn update_writes_the_whole_profile_and_keeps_points() {
        let (store, service) = service_with_student().await;
        let uid = UserId::new("u1");
        service
            .update_profile(
                &uid,
                ProfileUpdate {
                    phone: Some(" 555-0100 ".into()),
                    institution: Some("Open University".into()),
                    year_of_passing: Some(2020),
                    interests: Some(vec!["linux".into(), "DevOps".into(), "Linux".into()]),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        let stored = store.get("students/u1/profile").await.unwrap().unwrap();
        assert_eq!(stored["name"], "Ada");
        assert_eq!(stored["phone"], "555-0100");
        assert_eq!(stored["yearOfPassing"], 2020);
        assert_eq!(stored["interests"], json!(["Linux", "DevOps"]));

        let student = store.get("students/u1/points").await.unwrap();
        assert_eq!(student, Some(json!(40)));

        // A later partial update leaves the other fields alone.
        let profile = service
            .update_profile(
                &uid,
                ProfileUpdate {
                    education: Some("BSc".into()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(profile.institution, "Open University");
        assert_eq!(profile.education, "BSc");
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_writing() {
        let (store, service) = service_with_student().await;
        let uid = UserId::new("u1");

        let err = service
            .update_profile(
                &uid,
                ProfileUpdate {
                    interests: Some(vec!["Basket Weaving".into()]),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::UnknownInterest(ref name) if name == "Basket Weaving"));

        let err = service
            .update_profile(
                &uid,
                ProfileUpdate {
                    year_of_passing: Some(1900),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::InvalidYear(1900)));

        assert_eq!(store.get("students/u1/profile").await.unwrap(), None);
    }

    #[tokio::test]
    async fn toggling_adds_then_removes() {
        let (_, service) = service_with_student().await;
        let uid = UserId::new("u1");

        let profile = service.toggle_interest(&uid, "data science").await.unwrap();
        assert_eq!(profile.interests, ["Data Science"]);

        let profile = service.toggle_interest(&uid, "Data Science").await.unwrap();
        assert!(profile.interests.is_empty());
        assert_eq!(service.get_profile(&uid).await.unwrap().interests.len(), 0);
    }

    #[tokio::test]
    async fn stored_fields_win_over_the_student_record() {
        let (store, service) = service_with_student().await;
        store
            .set(
                "students/u1/profile",
                json!({ "name": "Ada L.", "yearOfPassing": "2018", "interests": ["Linux"] }),
            )
            .await
            .unwrap();
        let profile = service.get_profile(&UserId::new("u1")).await.unwrap();
        assert_eq!(profile.name, "Ada L.");
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.year_of_passing, Some(2018));
    }
}
