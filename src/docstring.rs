//! Command docstrings.
//!
//! Command documentation is shared between resources and written as a template over the resource
//! kind, e.g. `Retrieve a list of all {{ kind }} resources.` These helpers render it for one
//! resource and pull out the summary paragraph.

use minijinja::{Environment, context};

/// Renders a docstring template with `kind` bound to the resource name.
///
/// Text that is not a valid template is returned unchanged.
///
/// ```
/// use duplocloud_mcp::docstring::render;
///
/// assert_eq!(render("List all {{ kind }} resources", "service"), "List all service resources");
/// assert_eq!(render("No placeholders", "tenant"), "No placeholders");
/// ```
pub fn render(template: &str, kind: &str) -> String {
    if !template.contains("{{") && !template.contains("{%") {
        return template.to_string();
    }
    let environment = Environment::new();
    match environment.render_str(template, context! { kind => kind }) {
        Ok(rendered) => rendered,
        Err(e) => {
            logwise::warn_sync!(
                "docstring for {kind} is not a valid template: {error}",
                kind = logwise::privacy::LogIt(&kind),
                error = logwise::privacy::LogIt(&e)
            );
            template.to_string()
        }
    }
}

/// The first paragraph of a docstring, on one line.
///
/// ```
/// use duplocloud_mcp::docstring::summary;
///
/// let doc = "Create a tenant.\nIt takes a while.\n\nArgs:\n  body: the request";
/// assert_eq!(summary(doc), "Create a tenant. It takes a while.");
/// assert_eq!(summary(""), "");
/// ```
pub fn summary(doc: &str) -> String {
    let first = doc.trim().split("\n\n").next().unwrap_or_default();
    first
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
