use crate::fragment::Fragment;
use crate::scan;

/// The two halves of a model request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    pub system: String,
    pub prompt: String,
}

/// Concatenates the tagged regions of every resolved fragment, in fragment
/// order.
///
/// Per fragment, the first `<system>` region feeds the system accumulator and
/// the first `<prompt>` region feeds the prompt accumulator; a `<context>`
/// region also ends up in the system text, after all system regions. A
/// `<system>` region nested inside a matched prompt region is stripped before
/// appending. Fragments with no tags contribute nothing. Matching is
/// case-insensitive, first-match only.
pub fn extract_sections(fragments: &[Fragment]) -> Sections {
    let mut system = String::new();
    let mut context = String::new();
    let mut prompt = String::new();

    for fragment in fragments {
        let Some(text) = fragment.content() else {
            continue;
        };
        if let Some(inner) = scan::first_tagged_inner(text, "system") {
            system.push_str(inner.trim());
            system.push('\n');
        }
        if let Some(inner) = scan::first_tagged_inner(text, "context") {
            context.push_str(inner.trim());
            context.push('\n');
        }
        if let Some(inner) = scan::first_tagged_inner(text, "prompt") {
            let cleaned = scan::strip_first_tagged(inner, "system");
            prompt.push_str(cleaned.trim());
            prompt.push('\n');
        }
    }

    let full_system = format!("{system}\n{context}").trim().to_string();
    Sections {
        system: full_system,
        prompt: prompt.trim().to_string(),
    }
}
