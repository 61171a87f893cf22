use super::{Intent, IntentSpec, Taxonomy};
use crate::error::TaxonomyError;

const ALIASES: &[(&str, &str)] = &[
    ("general_query", "general"),
    ("counts", "student_counts"),
    ("enrollment", "student_counts"),
    ("staff", "staff_directory"),
    ("directory", "staff_directory"),
    ("teachers", "staff_directory"),
    ("resources", "materials"),
    ("permissions", "roles"),
    ("courses", "subjects"),
    ("labels", "tags"),
    ("ballots", "votes"),
    ("polls", "votes"),
    ("consent_forms", "waivers"),
    ("permission_slips", "waivers"),
];

pub(super) fn taxonomy() -> Result<Taxonomy, TaxonomyError> {
    let mut builder = Taxonomy::builder()
        .spec(
            Intent::General,
            IntentSpec::new("Open-ended questions with no specific report behind them")
                .with_examples(["what can you do?", "help"]),
        )
        .spec(
            Intent::StudentCounts,
            IntentSpec::new("Enrollment totals broken down by grade and campus")
                .with_examples([
                    "show student counts by grade",
                    "how many students are enrolled this year?",
                ])
                .with_keywords(["student count", "enrollment numbers", "class sizes"]),
        )
        .spec(
            Intent::StaffDirectory,
            IntentSpec::new("Staff members with their positions and contact details")
                .with_examples(["list the staff directory", "who teaches chemistry?"])
                .with_keywords(["staff", "teacher", "employee"]),
        )
        .spec(
            Intent::Materials,
            IntentSpec::new("Teaching materials, textbooks and supplies on record")
                .with_examples(["which materials are checked out?", "list textbooks"])
                .with_keywords(["materials", "supplies", "textbook"]),
        )
        .spec(
            Intent::Roles,
            IntentSpec::new("Account roles and what each role may do")
                .with_examples(["what roles exist?", "show user permissions"])
                .with_keywords(["role"]),
        )
        .spec(
            Intent::Subjects,
            IntentSpec::new("Subjects and courses offered")
                .with_examples(["list all subjects", "what courses do we offer?"])
                .with_keywords(["subject", "course"]),
        )
        .spec(
            Intent::Tags,
            IntentSpec::new("Tags used to categorise records")
                .with_examples(["show all tags", "which labels are in use?"])
                .with_keywords(["tag"]),
        )
        .spec(
            Intent::Votes,
            IntentSpec::new("Votes and poll results")
                .with_examples(["show the latest vote results", "list open polls"])
                .with_keywords(["vote", "ballot"]),
        )
        .spec(
            Intent::Waivers,
            IntentSpec::new("Signed and outstanding waivers")
                .with_examples(["which waivers are missing?", "list signed consent forms"])
                .with_keywords(["waiver"]),
        );

    for (alias, target) in ALIASES {
        builder = builder.alias(*alias, *target);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_taxonomy_is_consistent() {
        let taxonomy = taxonomy().expect("built-in taxonomy validates");
        assert_eq!(taxonomy.specs().count(), Intent::ALL.len());
        for (alias, target) in ALIASES {
            assert_eq!(
                taxonomy.resolve(alias).map(Intent::as_str),
                Ok(*target),
                "alias {alias}"
            );
        }
    }

    #[test]
    fn every_spec_defaults_to_read() {
        let taxonomy = taxonomy().expect("built-in taxonomy validates");
        assert!(taxonomy
            .specs()
            .all(|(_, spec)| spec.default_action == "read"));
    }
}
