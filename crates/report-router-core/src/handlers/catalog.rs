use std::sync::Arc;

use tracing::info;

use super::{QueryHandler, ResourceHandler};
use crate::{registry::HandlerRegistry, taxonomy::Intent};

/// Reporting handlers shipped with the router, in registration order.
#[must_use]
pub fn builtin_handlers() -> Vec<ResourceHandler> {
    vec![
        ResourceHandler::new(Intent::StudentCounts.mode(), "student-counts")
            .with_source_label("Student information system (enrollment counts)")
            .with_keywords(["grade level totals", "students per grade"])
            .with_columns(["grade", "campus", "count"]),
        ResourceHandler::new(Intent::StaffDirectory.mode(), "staff")
            .with_source_label("Staff directory")
            .with_keywords(["staff directory", "faculty"])
            .with_columns(["last_name", "first_name", "position", "email", "phone"])
            .sorted_by("last_name"),
        ResourceHandler::new(Intent::Materials.mode(), "materials")
            .with_source_label("Materials inventory")
            .with_keywords(["inventory"])
            .with_columns(["title", "kind", "quantity", "location"]),
        ResourceHandler::new(Intent::Roles.mode(), "roles")
            .with_source_label("Access roles")
            .with_keywords(["access level"])
            .with_columns(["name", "description"]),
        ResourceHandler::new(Intent::Subjects.mode(), "subjects")
            .with_source_label("Course catalog")
            .with_keywords(["course catalog", "curriculum"])
            .with_columns(["code", "title", "department"]),
        ResourceHandler::new(Intent::Tags.mode(), "tags")
            .with_source_label("Record tags")
            .with_keywords(["labels"])
            .with_columns(["name", "color"]),
        ResourceHandler::new(Intent::Votes.mode(), "votes")
            .with_source_label("Voting records")
            .with_keywords(["poll", "election"])
            .with_columns(["topic", "choice", "voter", "cast_at"]),
        ResourceHandler::new(Intent::Waivers.mode(), "waivers")
            .with_source_label("Waiver tracking")
            .with_keywords(["permission slip", "consent form"])
            .with_columns(["student", "kind", "status", "signed_at"]),
    ]
}

/// Registers every built-in handler into `registry`, returning how many were added.
pub fn register_builtin(registry: &HandlerRegistry) -> usize {
    let handlers = builtin_handlers();
    let count = handlers.len();
    for handler in handlers {
        registry.register(Arc::new(handler) as Arc<dyn QueryHandler>);
    }
    info!(target: "report_router_core", handlers = count, "built-in handlers registered");
    count
}
