//! Post rules: title validation, permissions, and vote aggregation.

use serde::Serialize;

use super::entities::{PostRecord, PostStatisticsRecord};
use super::error::DomainError;
use super::users::SUPERADMIN;

/// Titles that collide with fixed routes.
const RESERVED_TITLES: &[&str] = &["new", "frontpage"];

pub fn validate_title(title: &str) -> Result<(), DomainError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("title must not be blank"));
    }
    if RESERVED_TITLES
        .iter()
        .any(|reserved| trimmed.eq_ignore_ascii_case(reserved))
    {
        return Err(DomainError::validation(format!(
            "title `{trimmed}` is reserved"
        )));
    }
    Ok(())
}

/// What a user may do with one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub view: bool,
    pub edit: bool,
    pub delete: bool,
}

impl Permissions {
    pub const NONE: Self = Self {
        view: false,
        edit: false,
        delete: false,
    };
}

/// Permissions for creating a new post (no record yet).
pub fn creation_permissions(username: &str) -> Permissions {
    Permissions {
        edit: username != SUPERADMIN,
        ..Permissions::NONE
    }
}

/// Permissions on an existing post.
///
/// The superadmin moderates but does not edit; authors edit their own posts.
pub fn post_permissions(username: &str, post: &PostRecord) -> Permissions {
    if username == SUPERADMIN {
        return Permissions {
            view: true,
            delete: true,
            ..Permissions::NONE
        };
    }

    Permissions {
        view: true,
        edit: username == post.author,
        delete: false,
    }
}

/// Rounded average and per-star share of the votes on a post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteSummary {
    pub average: u8,
    pub total: i64,
    pub shares: [f64; 5],
}

impl PostStatisticsRecord {
    pub fn tallies(&self) -> [i64; 5] {
        [self.star1, self.star2, self.star3, self.star4, self.star5]
    }

    pub fn summary(&self) -> VoteSummary {
        let tallies = self.tallies();
        let total: i64 = tallies.iter().sum();
        if total <= 0 {
            return VoteSummary {
                average: 0,
                total: 0,
                shares: [0.0; 5],
            };
        }

        let weighted: i64 = tallies
            .iter()
            .zip(1_i64..)
            .map(|(count, stars)| count * stars)
            .sum();
        let average = (weighted as f64 / total as f64).round() as u8;
        let shares = tallies.map(|count| count as f64 / total as f64);

        VoteSummary {
            average,
            total,
            shares,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn post_by(author: &str) -> PostRecord {
        let now = OffsetDateTime::UNIX_EPOCH;
        PostRecord {
            id: 1,
            title: "Hello".to_string(),
            author: author.to_string(),
            created_at: now,
            updated_at: now,
            body: String::new(),
        }
    }

    #[test]
    fn reserved_and_blank_titles_are_rejected() {
        assert!(validate_title("   ").is_err());
        assert!(validate_title("New").is_err());
        assert!(validate_title("FrontPage").is_err());
        assert!(validate_title("New things").is_ok());
    }

    #[test]
    fn authors_edit_their_own_posts() {
        let post = post_by("Lucy");
        let own = post_permissions("Lucy", &post);
        assert!(own.view && own.edit && !own.delete);

        let other = post_permissions("bob", &post);
        assert!(other.view && !other.edit && !other.delete);
    }

    #[test]
    fn superadmin_moderates_but_does_not_author() {
        let perms = post_permissions(SUPERADMIN, &post_by("Lucy"));
        assert!(perms.view && perms.delete && !perms.edit);
        assert!(!creation_permissions(SUPERADMIN).edit);
        assert!(creation_permissions("Lucy").edit);
    }

    #[test]
    fn summary_rounds_average_and_splits_shares() {
        let stats = PostStatisticsRecord {
            star1: 1,
            star2: 0,
            star3: 0,
            star4: 1,
            star5: 2,
        };
        let summary = stats.summary();
        assert_eq!(summary.total, 4);
        // (1 + 4 + 10) / 4 = 3.75
        assert_eq!(summary.average, 4);
        assert_eq!(summary.shares, [0.25, 0.0, 0.0, 0.25, 0.5]);
    }

    #[test]
    fn summary_of_unvoted_post_is_zero() {
        let summary = PostStatisticsRecord::default().summary();
        assert_eq!(summary.average, 0);
        assert_eq!(summary.shares, [0.0; 5]);
    }
}
