//! Participant enrollment

use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::credential::CredentialIssuer;
use crate::db::{participants, NewParticipant, ParticipantRow, Store};
use crate::error::{StudyError, StudyResult};
use crate::study::{end_date_for, Condition};

/// Default number of credential draws before giving up
pub const DEFAULT_CREDENTIAL_ATTEMPTS: u32 = 5;

/// Creates participants anchored to today's date in the reference timezone
pub struct Enrollment {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    issuer: Arc<dyn CredentialIssuer>,
    max_attempts: u32,
}

impl Enrollment {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>, issuer: Arc<dyn CredentialIssuer>) -> Self {
        Self {
            store,
            clock,
            issuer,
            max_attempts: DEFAULT_CREDENTIAL_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Enroll a new participant from a raw condition value
    pub fn enroll_raw(&self, name: Option<String>, condition: &str) -> StudyResult<ParticipantRow> {
        let condition = condition.parse::<Condition>()?;
        self.enroll(name, condition)
    }

    /// Enroll a new participant. Every call creates a distinct participant;
    /// a credential collision at insert time draws a fresh credential.
    pub fn enroll(&self, name: Option<String>, condition: Condition) -> StudyResult<ParticipantRow> {
        let start_date = self.clock.today();
        let end_date = end_date_for(start_date);
        let display_name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        for attempt in 1..=self.max_attempts {
            let issued = self.issuer.issue();
            let input = NewParticipant {
                external_id: issued.external_id,
                credential: issued.credential,
                display_name: display_name.clone(),
                condition,
                start_date,
                end_date,
            };

            match self
                .store
                .with_conn(|conn| participants::insert_participant(conn, &input))
            {
                Ok(participant) => {
                    info!(
                        external_id = %participant.external_id,
                        %condition,
                        %start_date,
                        "Enrolled participant"
                    );
                    return Ok(participant);
                }
                Err(e) if e.is_unique_violation() => {
                    warn!(attempt, error = %e, "Credential collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StudyError::CredentialExhausted(self.max_attempts))
    }
}
