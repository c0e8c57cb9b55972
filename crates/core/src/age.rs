use chrono::{DateTime, Duration, Utc};

use crate::model::{BackupSetDescriptor, Severity, ValidationIssue};

/// Age bounds for the freshness check. The default is the fixed heuristic of
/// one hour (possibly still in progress) and ninety days (stale).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgePolicy {
    pub min_age: Duration,
    pub max_age: Duration,
}

impl Default for AgePolicy {
    fn default() -> Self {
        Self {
            min_age: Duration::hours(1),
            max_age: Duration::days(90),
        }
    }
}

pub fn validate_age(
    set: &BackupSetDescriptor,
    policy: &AgePolicy,
    now: DateTime<Utc>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let Some(modified) = set.modified else {
        return issues;
    };

    let age = now.signed_duration_since(modified);
    if age < policy.min_age {
        issues.push(ValidationIssue::at_path(
            Severity::Info,
            format!("backup is very recent ({} old)", format_age(age)),
            &set.path,
            "backup might still be in progress",
        ));
    }
    if age > policy.max_age {
        issues.push(ValidationIssue::at_path(
            Severity::Warning,
            format!("backup is quite old ({})", format_age(age)),
            &set.path,
            "consider creating more recent backups",
        ));
    }

    issues
}

fn format_age(age: Duration) -> String {
    let age = age.max(Duration::zero());
    if age.num_days() > 0 {
        format!("{}d {}h", age.num_days(), age.num_hours() % 24)
    } else if age.num_hours() > 0 {
        format!("{}h {}m", age.num_hours(), age.num_minutes() % 60)
    } else {
        format!("{}m {}s", age.num_minutes(), age.num_seconds() % 60)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{Duration, Utc};

    use super::{validate_age, AgePolicy};
    use crate::model::{BackupSetDescriptor, Severity};

    fn set_aged(age: Option<Duration>) -> BackupSetDescriptor {
        let now = Utc::now();
        BackupSetDescriptor {
            path: PathBuf::from("/b/PC/Set"),
            modified: age.map(|age| now - age),
            ..BackupSetDescriptor::default()
        }
    }

    #[test]
    fn default_policy_matches_fixed_heuristic() {
        let policy = AgePolicy::default();
        assert_eq!(policy.min_age, Duration::hours(1));
        assert_eq!(policy.max_age, Duration::days(90));
    }

    #[test]
    fn fresh_and_stale_sets_are_flagged() {
        let now = Utc::now();
        let policy = AgePolicy::default();

        let fresh = validate_age(&set_aged(Some(Duration::minutes(5))), &policy, now);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].severity, Severity::Info);
        assert!(fresh[0].message.contains("very recent"));

        let stale = validate_age(&set_aged(Some(Duration::days(120))), &policy, now);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].severity, Severity::Warning);

        let normal = validate_age(&set_aged(Some(Duration::days(10))), &policy, now);
        assert!(normal.is_empty());
    }

    #[test]
    fn unknown_modification_time_is_skipped() {
        let issues = validate_age(&set_aged(None), &AgePolicy::default(), Utc::now());
        assert!(issues.is_empty());
    }

    #[test]
    fn configured_bounds_replace_defaults() {
        let policy = AgePolicy {
            min_age: Duration::hours(24),
            max_age: Duration::days(7),
        };
        let now = Utc::now();

        let young = validate_age(&set_aged(Some(Duration::hours(3))), &policy, now);
        assert_eq!(young[0].severity, Severity::Info);

        let old = validate_age(&set_aged(Some(Duration::days(10))), &policy, now);
        assert_eq!(old[0].severity, Severity::Warning);
    }
}
