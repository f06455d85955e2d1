//! Text replacement primitives used by the reconciler.

use qstudio_source::{Section, locate, parse};

/// Which section an input-region replacement targets.
#[derive(Debug, Clone, Copy)]
pub struct SectionTarget<'a> {
    /// Section index captured at template load.
    pub index: Option<usize>,
    /// Section name captured at template load.
    pub section_name: Option<&'a str>,
    /// Current node label, used when the captured section is gone.
    pub display_name: &'a str,
}

/// Replaces pieces of a program source.
///
/// Implementations must leave text outside the replaced range untouched
/// and return `None` instead of guessing when the target is not found.
pub trait Splicer: Send + Sync + std::fmt::Debug {
    /// Replace the first exact occurrence of `baseline` with `replacement`.
    ///
    /// A baseline ending in a newline keeps ending in one, so the next
    /// marker stays at the start of its line.
    fn replace_fragment(&self, text: &str, baseline: &str, replacement: &str) -> Option<String>;

    /// Replace the interior of the target section's input region.
    fn replace_input(
        &self,
        text: &str,
        target: &SectionTarget<'_>,
        replacement: &str,
    ) -> Option<String>;
}

/// Substring-based splicing over the marker grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextualSplicer;

impl Splicer for TextualSplicer {
    fn replace_fragment(&self, text: &str, baseline: &str, replacement: &str) -> Option<String> {
        if baseline.trim().is_empty() {
            return None;
        }
        let start = text.find(baseline)?;

        let mut out = String::with_capacity(text.len() + replacement.len() + 1);
        out.push_str(&text[..start]);
        out.push_str(replacement);
        if baseline.ends_with('\n') && !replacement.is_empty() && !replacement.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&text[start + baseline.len()..]);
        Some(out)
    }

    fn replace_input(
        &self,
        text: &str,
        target: &SectionTarget<'_>,
        replacement: &str,
    ) -> Option<String> {
        let parsed = parse(text);
        let section = find_target(parsed.effective_sections(), target)?;
        let span = section.input_span.clone()?;

        let mut out = String::with_capacity(text.len() + replacement.len());
        out.push_str(&text[..span.start]);
        out.push_str(replacement);
        if !replacement.is_empty() && !replacement.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&text[span.end..]);
        Some(out)
    }
}

fn find_target<'a>(sections: &'a [Section], target: &SectionTarget<'_>) -> Option<&'a Section> {
    let by_index = target
        .index
        .and_then(|i| sections.get(i))
        .filter(|s| target.section_name.is_none_or(|name| s.name == name));

    by_index
        .or_else(|| target.section_name.and_then(|name| locate(name, sections)))
        .or_else(|| locate(target.display_name, sections))
}
