//! Authorization and state rules for the marketplace.
//!
//! Every rule is a pure function over the acting identity and a snapshot of
//! the resource. Services resolve existence first (404), then consult these
//! rules (403), then apply the business preconditions (400) before writing.

use crate::error::Error;
use crate::models::application::{Application, ApplicationStatus};
use crate::models::cv_file::CvFile;
use crate::models::job_offer::{JobOffer, OfferStatus};
use crate::models::user::Role;

/// The authenticated identity performing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_company(&self) -> bool {
        self.role == Role::Company
    }

    pub fn is_candidate(&self) -> bool {
        self.role == Role::Candidate
    }

    fn is_company_owning(&self, company_id: i64) -> bool {
        self.is_company() && self.id == company_id
    }

    fn is_candidate_owning(&self, candidate_id: i64) -> bool {
        self.is_candidate() && self.id == candidate_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("You have already applied to this job offer")]
    DuplicateApplication,
    #[error("This job offer is no longer available")]
    OfferNotActive,
    #[error("You are not allowed to use this CV")]
    CvNotOwned,
    #[error("The selected status is invalid: {0}")]
    InvalidStatus(String),
}

impl From<PolicyViolation> for Error {
    fn from(value: PolicyViolation) -> Self {
        match value {
            PolicyViolation::DuplicateApplication | PolicyViolation::OfferNotActive => {
                Error::BadRequest(value.to_string())
            }
            PolicyViolation::CvNotOwned => Error::Forbidden(value.to_string()),
            PolicyViolation::InvalidStatus(_) => {
                Error::Validation(crate::utils::validation::field_error(
                    "status",
                    "in",
                    "The selected status is invalid.",
                ))
            }
        }
    }
}

// ---- job offers -----------------------------------------------------------

/// Active offers are public; anything else is visible to its owner and admins.
pub fn can_view_job_offer(actor: Option<&Actor>, offer: &JobOffer) -> bool {
    if offer.status == OfferStatus::Active {
        return true;
    }
    match actor {
        Some(actor) => actor.is_admin() || actor.id == offer.company_id,
        None => false,
    }
}

/// Governs both update and delete.
pub fn can_mutate_job_offer(actor: &Actor, offer: &JobOffer) -> bool {
    actor.is_admin() || actor.is_company_owning(offer.company_id)
}

/// Admins may edit and delete offers but never post them.
pub fn can_create_job_offer(actor: &Actor) -> bool {
    actor.is_company()
}

// ---- applications ---------------------------------------------------------

pub fn can_view_application(actor: &Actor, application: &Application, offer: &JobOffer) -> bool {
    actor.is_admin()
        || actor.is_candidate_owning(application.candidate_id)
        || actor.is_company_owning(offer.company_id)
}

pub fn can_create_application(actor: &Actor) -> bool {
    actor.is_candidate()
}

/// A candidate's submission before it is persisted.
#[derive(Debug, Clone)]
pub struct ApplicationDraft {
    pub candidate_id: i64,
    pub job_offer_id: i64,
    pub cv_file_id: Option<i64>,
    pub message: Option<String>,
}

/// Business preconditions for a new application, checked in order: the offer
/// must be active, the pair must be new, and a referenced CV must belong to
/// the applicant. The storage unique constraint still backs the second rule.
pub fn application_creation_preconditions(
    draft: &ApplicationDraft,
    target_offer: &JobOffer,
    existing_applications: &[Application],
    cv: Option<&CvFile>,
) -> Result<(), PolicyViolation> {
    if target_offer.status != OfferStatus::Active {
        return Err(PolicyViolation::OfferNotActive);
    }
    let duplicate = existing_applications
        .iter()
        .any(|a| a.candidate_id == draft.candidate_id && a.job_offer_id == draft.job_offer_id);
    if duplicate {
        return Err(PolicyViolation::DuplicateApplication);
    }
    if let (Some(_), Some(cv)) = (draft.cv_file_id, cv) {
        if cv.candidate_id != draft.candidate_id {
            return Err(PolicyViolation::CvNotOwned);
        }
    }
    Ok(())
}

/// Candidates never change the status of their own applications.
pub fn can_mutate_application_status(
    actor: &Actor,
    _application: &Application,
    offer: &JobOffer,
) -> bool {
    actor.is_admin() || actor.is_company_owning(offer.company_id)
}

/// Companies never delete applications, even on their own offers.
pub fn can_delete_application(actor: &Actor, application: &Application) -> bool {
    actor.is_admin() || actor.is_candidate_owning(application.candidate_id)
}

/// The status set is flat: any member may follow any other, including itself.
pub fn application_status_transition(
    _current: ApplicationStatus,
    requested: &str,
) -> Result<ApplicationStatus, PolicyViolation> {
    requested
        .parse::<ApplicationStatus>()
        .map_err(|_| PolicyViolation::InvalidStatus(requested.to_string()))
}

// ---- cv files -------------------------------------------------------------

pub fn can_upload_cv_file(actor: &Actor) -> bool {
    actor.is_candidate()
}

/// `related_offer_owners` holds the `company_id` of every offer that an
/// application referencing this CV targets.
pub fn can_view_cv_file(actor: &Actor, cv: &CvFile, related_offer_owners: &[i64]) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Candidate => actor.id == cv.candidate_id,
        Role::Company => related_offer_owners.iter().any(|owner| *owner == actor.id),
    }
}

pub fn can_delete_cv_file(actor: &Actor, cv: &CvFile) -> bool {
    actor.is_admin() || actor.id == cv.candidate_id
}

// ---- users ----------------------------------------------------------------

pub fn can_manage_users(actor: &Actor) -> bool {
    actor.is_admin()
}

/// Reading and editing a profile is open to its owner and admins.
pub fn can_access_user(actor: &Actor, user_id: i64) -> bool {
    actor.is_admin() || actor.id == user_id
}

// ---- listings -------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// The public offer board; `status_requested` is true when the caller
    /// supplied an explicit status filter.
    JobOffers { status_requested: bool },
    MyJobOffers,
    Applications,
    CvFiles,
    Users,
}

/// Row-level filter a listing query must apply. For offers, `Company(id)`
/// keeps `company_id = id`; for applications it keeps rows whose offer is
/// owned by `id`. `Candidate(id)` keeps rows with `candidate_id = id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingScope {
    All,
    ActiveOnly,
    ActiveOrCompany(i64),
    Company(i64),
    Candidate(i64),
}

/// `None` means the actor may not use this listing at all.
pub fn listing_scope(actor: Option<&Actor>, listing: Listing) -> Option<ListingScope> {
    match listing {
        Listing::JobOffers { status_requested } => Some(match actor {
            Some(a) if a.is_admin() && status_requested => ListingScope::All,
            Some(a) if a.is_company() && status_requested => ListingScope::ActiveOrCompany(a.id),
            _ => ListingScope::ActiveOnly,
        }),
        Listing::MyJobOffers => match actor? {
            a if a.is_admin() => Some(ListingScope::All),
            a if a.is_company() => Some(ListingScope::Company(a.id)),
            _ => None,
        },
        Listing::Applications => {
            let a = actor?;
            Some(match a.role {
                Role::Admin => ListingScope::All,
                Role::Company => ListingScope::Company(a.id),
                Role::Candidate => ListingScope::Candidate(a.id),
            })
        }
        Listing::CvFiles => match actor? {
            a if a.is_admin() => Some(ListingScope::All),
            a if a.is_candidate() => Some(ListingScope::Candidate(a.id)),
            _ => None,
        },
        Listing::Users => match actor? {
            a if a.is_admin() => Some(ListingScope::All),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const ADMIN: Actor = Actor { id: 1, role: Role::Admin };
    const COMPANY_X: Actor = Actor { id: 10, role: Role::Company };
    const COMPANY_Y: Actor = Actor { id: 11, role: Role::Company };
    const CANDIDATE_C: Actor = Actor { id: 20, role: Role::Candidate };
    const CANDIDATE_D: Actor = Actor { id: 21, role: Role::Candidate };

    fn offer(status: OfferStatus, company_id: i64) -> JobOffer {
        JobOffer {
            id: 100,
            title: "Backend engineer".into(),
            description: "Rust services".into(),
            requirements: None,
            salary_min: None,
            salary_max: None,
            location: Some("Lyon".into()),
            contract_type: None,
            status,
            company_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn application(candidate_id: i64, job_offer_id: i64) -> Application {
        Application {
            id: 500,
            candidate_id,
            job_offer_id,
            cv_file_id: None,
            status: ApplicationStatus::Pending,
            message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn cv(candidate_id: i64) -> CvFile {
        CvFile {
            id: 1,
            candidate_id,
            file_name: "resume.pdf".into(),
            storage_key: "cv_files/20/abc.pdf".into(),
            file_size: 1024,
            mime_type: "application/pdf".into(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn draft(candidate_id: i64, cv_file_id: Option<i64>) -> ApplicationDraft {
        ApplicationDraft {
            candidate_id,
            job_offer_id: 100,
            cv_file_id,
            message: Some("Hello".into()),
        }
    }

    #[test]
    fn anonymous_sees_offer_iff_active() {
        for status in OfferStatus::ALL {
            let o = offer(status, COMPANY_X.id);
            assert_eq!(can_view_job_offer(None, &o), status == OfferStatus::Active);
        }
    }

    #[test]
    fn hidden_offers_visible_to_owner_and_admin_only() {
        let o = offer(OfferStatus::Inactive, COMPANY_X.id);
        assert!(can_view_job_offer(Some(&ADMIN), &o));
        assert!(can_view_job_offer(Some(&COMPANY_X), &o));
        assert!(!can_view_job_offer(Some(&COMPANY_Y), &o));
        assert!(!can_view_job_offer(Some(&CANDIDATE_C), &o));
    }

    #[test]
    fn only_owner_company_or_admin_mutates_offer() {
        let o = offer(OfferStatus::Active, COMPANY_X.id);
        assert!(can_mutate_job_offer(&ADMIN, &o));
        assert!(can_mutate_job_offer(&COMPANY_X, &o));
        assert!(!can_mutate_job_offer(&COMPANY_Y, &o));
        // a candidate whose id happens to equal the owner id still may not
        let impostor = Actor { id: COMPANY_X.id, role: Role::Candidate };
        assert!(!can_mutate_job_offer(&impostor, &o));
    }

    #[test]
    fn only_companies_create_offers() {
        assert!(can_create_job_offer(&COMPANY_X));
        assert!(!can_create_job_offer(&ADMIN));
        assert!(!can_create_job_offer(&CANDIDATE_C));
    }

    #[test]
    fn application_visibility_matrix() {
        let o = offer(OfferStatus::Active, COMPANY_X.id);
        let a = application(CANDIDATE_C.id, o.id);
        assert!(can_view_application(&ADMIN, &a, &o));
        assert!(can_view_application(&CANDIDATE_C, &a, &o));
        assert!(can_view_application(&COMPANY_X, &a, &o));
        assert!(!can_view_application(&CANDIDATE_D, &a, &o));
        assert!(!can_view_application(&COMPANY_Y, &a, &o));
    }

    #[test]
    fn only_candidates_apply() {
        assert!(can_create_application(&CANDIDATE_C));
        assert!(!can_create_application(&COMPANY_X));
        assert!(!can_create_application(&ADMIN));
    }

    #[test]
    fn preconditions_accept_fresh_application() {
        let o = offer(OfferStatus::Active, COMPANY_X.id);
        let own_cv = cv(CANDIDATE_C.id);
        assert_eq!(
            application_creation_preconditions(&draft(CANDIDATE_C.id, Some(1)), &o, &[], Some(&own_cv)),
            Ok(())
        );
        assert_eq!(
            application_creation_preconditions(&draft(CANDIDATE_C.id, None), &o, &[], None),
            Ok(())
        );
    }

    #[test]
    fn preconditions_reject_inactive_offer_for_everyone() {
        for status in [OfferStatus::Inactive, OfferStatus::Closed] {
            let o = offer(status, COMPANY_X.id);
            assert_eq!(
                application_creation_preconditions(&draft(CANDIDATE_C.id, None), &o, &[], None),
                Err(PolicyViolation::OfferNotActive)
            );
        }
    }

    #[test]
    fn preconditions_reject_duplicate_pair() {
        let o = offer(OfferStatus::Active, COMPANY_X.id);
        let existing = vec![application(CANDIDATE_C.id, o.id)];
        assert_eq!(
            application_creation_preconditions(&draft(CANDIDATE_C.id, None), &o, &existing, None),
            Err(PolicyViolation::DuplicateApplication)
        );
        // another candidate's application to the same offer is not a duplicate
        assert_eq!(
            application_creation_preconditions(&draft(CANDIDATE_D.id, None), &o, &existing, None),
            Ok(())
        );
    }

    #[test]
    fn preconditions_reject_foreign_cv() {
        let o = offer(OfferStatus::Active, COMPANY_X.id);
        let foreign = cv(CANDIDATE_D.id);
        let err = application_creation_preconditions(
            &draft(CANDIDATE_C.id, Some(1)),
            &o,
            &[],
            Some(&foreign),
        )
        .unwrap_err();
        assert_eq!(err, PolicyViolation::CvNotOwned);
        assert!(matches!(Error::from(err), Error::Forbidden(_)));
    }

    #[test]
    fn status_updates_by_owner_company_or_admin_only() {
        let o = offer(OfferStatus::Active, COMPANY_X.id);
        let a = application(CANDIDATE_C.id, o.id);
        assert!(can_mutate_application_status(&ADMIN, &a, &o));
        assert!(can_mutate_application_status(&COMPANY_X, &a, &o));
        assert!(!can_mutate_application_status(&COMPANY_Y, &a, &o));
        assert!(!can_mutate_application_status(&CANDIDATE_C, &a, &o));
    }

    #[test]
    fn deletion_by_owner_candidate_or_admin_only() {
        let a = application(CANDIDATE_C.id, 100);
        assert!(can_delete_application(&ADMIN, &a));
        assert!(can_delete_application(&CANDIDATE_C, &a));
        assert!(!can_delete_application(&CANDIDATE_D, &a));
        assert!(!can_delete_application(&COMPANY_X, &a));
    }

    #[test]
    fn every_status_reachable_from_every_status() {
        for current in ApplicationStatus::ALL {
            for requested in ApplicationStatus::ALL {
                assert_eq!(
                    application_status_transition(current, requested.as_str()),
                    Ok(requested)
                );
            }
        }
        assert_eq!(
            application_status_transition(ApplicationStatus::Pending, "hired"),
            Err(PolicyViolation::InvalidStatus("hired".into()))
        );
    }

    #[test]
    fn cv_visibility_follows_applications() {
        let file = cv(CANDIDATE_C.id);
        assert!(can_view_cv_file(&ADMIN, &file, &[]));
        assert!(can_view_cv_file(&CANDIDATE_C, &file, &[]));
        assert!(!can_view_cv_file(&CANDIDATE_D, &file, &[COMPANY_X.id]));
        assert!(!can_view_cv_file(&COMPANY_X, &file, &[]));
        assert!(can_view_cv_file(&COMPANY_X, &file, &[COMPANY_Y.id, COMPANY_X.id]));
        assert!(!can_view_cv_file(&COMPANY_Y, &file, &[COMPANY_X.id]));
    }

    #[test]
    fn cv_deletion_by_owner_or_admin() {
        let file = cv(CANDIDATE_C.id);
        assert!(can_delete_cv_file(&ADMIN, &file));
        assert!(can_delete_cv_file(&CANDIDATE_C, &file));
        assert!(!can_delete_cv_file(&CANDIDATE_D, &file));
        assert!(!can_delete_cv_file(&COMPANY_X, &file));
        assert!(can_upload_cv_file(&CANDIDATE_C));
        assert!(!can_upload_cv_file(&COMPANY_X));
    }

    #[test]
    fn public_offer_listing_scopes() {
        let plain = Listing::JobOffers { status_requested: false };
        let filtered = Listing::JobOffers { status_requested: true };
        assert_eq!(listing_scope(None, plain), Some(ListingScope::ActiveOnly));
        assert_eq!(listing_scope(None, filtered), Some(ListingScope::ActiveOnly));
        assert_eq!(listing_scope(Some(&CANDIDATE_C), filtered), Some(ListingScope::ActiveOnly));
        assert_eq!(listing_scope(Some(&ADMIN), plain), Some(ListingScope::ActiveOnly));
        assert_eq!(listing_scope(Some(&ADMIN), filtered), Some(ListingScope::All));
        assert_eq!(
            listing_scope(Some(&COMPANY_X), filtered),
            Some(ListingScope::ActiveOrCompany(COMPANY_X.id))
        );
    }

    #[test]
    fn private_listing_scopes() {
        assert_eq!(listing_scope(Some(&COMPANY_X), Listing::MyJobOffers), Some(ListingScope::Company(10)));
        assert_eq!(listing_scope(Some(&ADMIN), Listing::MyJobOffers), Some(ListingScope::All));
        assert_eq!(listing_scope(Some(&CANDIDATE_C), Listing::MyJobOffers), None);
        assert_eq!(listing_scope(None, Listing::MyJobOffers), None);

        assert_eq!(listing_scope(Some(&ADMIN), Listing::Applications), Some(ListingScope::All));
        assert_eq!(listing_scope(Some(&COMPANY_X), Listing::Applications), Some(ListingScope::Company(10)));
        assert_eq!(listing_scope(Some(&CANDIDATE_C), Listing::Applications), Some(ListingScope::Candidate(20)));
        assert_eq!(listing_scope(None, Listing::Applications), None);

        assert_eq!(listing_scope(Some(&CANDIDATE_C), Listing::CvFiles), Some(ListingScope::Candidate(20)));
        assert_eq!(listing_scope(Some(&ADMIN), Listing::CvFiles), Some(ListingScope::All));
        assert_eq!(listing_scope(Some(&COMPANY_X), Listing::CvFiles), None);

        assert_eq!(listing_scope(Some(&ADMIN), Listing::Users), Some(ListingScope::All));
        assert_eq!(listing_scope(Some(&COMPANY_X), Listing::Users), None);
    }

    #[test]
    fn user_access_rules() {
        assert!(can_manage_users(&ADMIN));
        assert!(!can_manage_users(&COMPANY_X));
        assert!(can_access_user(&CANDIDATE_C, CANDIDATE_C.id));
        assert!(!can_access_user(&CANDIDATE_C, CANDIDATE_D.id));
        assert!(can_access_user(&ADMIN, CANDIDATE_D.id));
    }
}
