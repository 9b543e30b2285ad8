//! Activities are server-side macros ("watch a movie") spanning several devices.

use futures::future::join_all;
use serde::Serialize;
use shared::{
    domain::{Activity, ActivityId},
    error::ClickerError,
    protocol::{Method, Value},
};
use tracing::{info, warn};

use crate::{call_list, call_method, is_configured, Partial, RemoteCall};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityCatalog {
    activities: Vec<Activity>,
    current: Option<ActivityId>,
}

impl ActivityCatalog {
    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn current(&self) -> Option<&ActivityId> {
        self.current.as_ref()
    }

    pub fn current_index(&self) -> Option<usize> {
        let current = self.current.as_ref()?;
        self.activities
            .iter()
            .position(|activity| &activity.id == current)
    }

    pub fn get(&self, id: &str) -> Option<&Activity> {
        self.activities
            .iter()
            .find(|activity| activity.id.as_str() == id)
    }
}

/// Loads the activity list, the running activity and every description.
///
/// An activity whose description cannot be fetched is kept, described by its id.
pub async fn fetch_activities(remote: &dyn RemoteCall) -> Partial<ActivityCatalog> {
    if !is_configured(remote) {
        return Partial::failed(ActivityCatalog::default(), ClickerError::config_missing());
    }

    let ids = match call_list(remote, Method::ActivityList, Vec::new()).await {
        Ok(ids) => ids,
        Err(err) => {
            warn!(error = %err, "failed to list activities");
            return Partial::failed(ActivityCatalog::default(), err);
        }
    };

    let mut outcome = Partial::complete(ActivityCatalog::default());
    match call_method(remote, Method::ActivityCurrent, Vec::new()).await {
        Ok(value) => {
            let current = value.to_string();
            if !current.is_empty() {
                outcome.value.current = Some(ActivityId::from(current));
            }
        }
        Err(err) => {
            warn!(error = %err, "failed to fetch current activity");
            outcome.record(err);
        }
    }

    let descriptions = join_all(
        ids.iter()
            .map(|id| call_method(remote, Method::ActivityInfo, vec![Value::from(id.as_str())])),
    )
    .await;

    for (id, description) in ids.into_iter().zip(descriptions) {
        let description = match description {
            Ok(value) => value.to_string(),
            Err(err) => {
                warn!(activity = %id, error = %err, "failed to fetch activity description");
                outcome.record(err);
                id.clone()
            }
        };
        outcome.value.activities.push(Activity {
            id: ActivityId::from(id),
            description,
        });
    }

    info!(
        activities = outcome.value.activities.len(),
        current = outcome.value.current.as_ref().map(ActivityId::as_str),
        "activities loaded"
    );
    outcome
}

#[cfg(test)]
#[path = "tests/activity_tests.rs"]
mod tests;
