use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use prost::Message;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::services::core::client::{CoreClient, CoreError};
use crate::services::core::proto::{GenericAuthorization, GrantAuthorization};
use crate::services::keyring::signer::AUTHORIZED_MSG_TYPES;

pub const GENERIC_AUTHORIZATION_TYPE_URL: &str = "/cosmos.authz.v1beta1.GenericAuthorization";

/// Attempt ladder for the grants query. The exact values are inherited
/// operational tuning; the second, longer attempt covers a chain that is
/// briefly catching up.
pub const GRANT_QUERY_TIMEOUTS: [Duration; 2] =
    [Duration::from_secs(15), Duration::from_secs(30)];
const GRANT_RETRY_SLEEP: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum GrantsError {
    #[error("failed to query grants: {0}")]
    Query(#[source] CoreError),
    #[error("grants query timed out after {0} attempts")]
    Timeout(usize),
    #[error(
        "missing authorization grants for message types [{}]; grant them with: \
         ucd tx authz grant {} generic --msg-type <type> --from <operator-key> (one per type)",
        .missing.join(", "),
        .grantee
    )]
    MissingGrants {
        grantee: String,
        missing: Vec<String>,
    },
}

/// Authorization summary for the hot key: who granted, and which message
/// types are covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantSummary {
    pub granter: String,
    pub msg_types: Vec<String>,
}

/// Confirm that the operator has granted every required message type to the
/// hot key.
///
/// Two attempts with timeouts of 15 s and 30 s, sleeping 2 s in between;
/// only deadline-shaped errors are retried, everything else surfaces
/// immediately.
pub async fn verify_grants(
    client: &CoreClient,
    grantee: &str,
) -> Result<GrantSummary, GrantsError> {
    let attempts = GRANT_QUERY_TIMEOUTS.len();
    for (attempt, timeout) in GRANT_QUERY_TIMEOUTS.iter().enumerate() {
        let last_attempt = attempt + 1 == attempts;
        match tokio::time::timeout(*timeout, client.grantee_grants(grantee)).await {
            Ok(Ok(grants)) => {
                let summary =
                    summarize_grants(&grants, Utc::now(), &AUTHORIZED_MSG_TYPES, grantee)?;
                info!(
                    grantee,
                    granter = %summary.granter,
                    msg_types = summary.msg_types.len(),
                    "authorization grants verified"
                );
                return Ok(summary);
            }
            Ok(Err(e)) if is_deadline_error(&e) && !last_attempt => {
                warn!(grantee, error = %e, "grants query hit a deadline, retrying");
            }
            Ok(Err(e)) => return Err(GrantsError::Query(e)),
            Err(_) if !last_attempt => {
                warn!(grantee, timeout_s = timeout.as_secs(), "grants query timed out, retrying");
            }
            Err(_) => return Err(GrantsError::Timeout(attempts)),
        }
        tokio::time::sleep(GRANT_RETRY_SLEEP).await;
    }
    Err(GrantsError::Timeout(attempts))
}

fn is_deadline_error(error: &CoreError) -> bool {
    match error {
        CoreError::Status(status) => {
            status.code() == tonic::Code::DeadlineExceeded
                || status.message().to_lowercase().contains("deadline exceeded")
        }
        CoreError::RetriesExhausted { source, .. } => is_deadline_error(source),
        _ => false,
    }
}

/// Reduce raw grants to a [`GrantSummary`] against the required set.
///
/// Non-generic authorizations are skipped, expired grants are discarded,
/// message types outside the required set are ignored and duplicates
/// collapse. Any required type left uncovered fails with an error that
/// names each missing type once.
pub fn summarize_grants(
    grants: &[GrantAuthorization],
    now: DateTime<Utc>,
    required: &[&str],
    grantee: &str,
) -> Result<GrantSummary, GrantsError> {
    let mut granter = String::new();
    let mut authorized: BTreeSet<String> = BTreeSet::new();

    for grant in grants {
        let Some(authorization) = &grant.authorization else {
            continue;
        };
        if authorization.type_url != GENERIC_AUTHORIZATION_TYPE_URL {
            debug!(
                type_url = %authorization.type_url,
                "skipping non-generic authorization"
            );
            continue;
        }
        let generic = match GenericAuthorization::decode(authorization.value.as_slice()) {
            Ok(generic) => generic,
            Err(e) => {
                debug!(error = %e, "skipping undecodable generic authorization");
                continue;
            }
        };
        if let Some(expiration) = &grant.expiration {
            let expires =
                DateTime::from_timestamp(expiration.seconds, expiration.nanos.max(0) as u32);
            if matches!(expires, Some(ts) if ts < now) {
                debug!(msg_type = %generic.msg, "discarding expired grant");
                continue;
            }
        }
        if required.contains(&generic.msg.as_str()) {
            granter = grant.granter.clone();
            authorized.insert(generic.msg);
        }
    }

    let missing: Vec<String> = required
        .iter()
        .filter(|msg_type| !authorized.contains(**msg_type))
        .map(|msg_type| msg_type.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(GrantsError::MissingGrants {
            grantee: grantee.to_string(),
            missing,
        });
    }

    Ok(GrantSummary {
        granter,
        msg_types: authorized.into_iter().collect(),
    })
}
