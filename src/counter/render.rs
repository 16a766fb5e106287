//! Rendering
//!
//! The counter is drawn into a [`PageSurface`], a narrow view of the page
//! document: a few well-known anchors, a head for styles, and the ability to
//! insert or remove the counter fragment.

use std::fmt;

/// Element id of the rendered counter
pub const COUNTER_ELEMENT_ID: &str = "page-counter";

/// Element id of the injected stylesheet
pub const COUNTER_STYLE_ID: &str = "page-counter-styles";

/// Stylesheet injected once per page
pub const COUNTER_STYLES: &str = r#".page-counter-container {
    display: inline-flex;
    align-items: center;
    gap: 0.5rem;
    font-size: 0.875rem;
    color: var(--md-default-fg-color--light);
    margin-top: 1rem;
    padding: 0.5rem 0.75rem;
    background: var(--md-default-bg-color);
    border: 1px solid var(--md-default-fg-color--lightest);
    border-radius: 0.25rem;
    transition: all 0.2s ease;
}

.page-counter-container:hover {
    color: var(--md-default-fg-color);
    border-color: var(--md-default-fg-color--light);
}

.page-counter-icon {
    opacity: 0.7;
}

.page-counter-text {
    font-weight: 500;
}

@media (max-width: 768px) {
    .page-counter-container {
        font-size: 0.8rem;
        padding: 0.4rem 0.6rem;
    }
}
"#;

/// Places in the page where the counter may be inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// The primary `h1`; the counter goes right after it
    Heading,
    /// `.md-content__inner`; the counter becomes its first child
    ContentInner,
    /// `main`
    Main,
    /// `article`
    Article,
}

impl Anchor {
    /// Lookup order, most preferred first
    pub const PREFERENCE: [Anchor; 4] = [
        Anchor::Heading,
        Anchor::ContentInner,
        Anchor::Main,
        Anchor::Article,
    ];

    pub fn selector(self) -> &'static str {
        match self {
            Anchor::Heading => "h1",
            Anchor::ContentInner => ".md-content__inner",
            Anchor::Main => "main",
            Anchor::Article => "article",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

/// The counter's UI fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterFragment {
    pub count: u64,
}

impl CounterFragment {
    pub fn new(count: u64) -> Self {
        Self { count }
    }

    /// "1 view", "0 views", "12,345 views"
    pub fn label(&self) -> String {
        let noun = if self.count == 1 { "view" } else { "views" };
        format!("{} {}", format_count(self.count), noun)
    }

    pub fn to_html(&self) -> String {
        format!(
            concat!(
                "<div id=\"{id}\">",
                "<div class=\"page-counter-container\">",
                "<span class=\"page-counter-icon\">\u{1F441}\u{FE0F}</span>",
                "<span class=\"page-counter-text\">{label}</span>",
                "</div>",
                "</div>"
            ),
            id = COUNTER_ELEMENT_ID,
            label = self.label()
        )
    }
}

/// Format a count with comma thousands separators
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// The part of a page document the counter touches
pub trait PageSurface: Send {
    fn has_anchor(&self, anchor: Anchor) -> bool;

    /// Insert after the heading, or as the first child of a content region
    fn insert_fragment(&mut self, anchor: Anchor, fragment: &CounterFragment);

    /// Remove the element with `id`, returning whether one existed
    fn remove_element(&mut self, id: &str) -> bool;

    fn has_style(&self, id: &str) -> bool;

    fn inject_style(&mut self, id: &str, css: &str);
}

/// Draw the counter. Returns the anchor it was placed at, if any.
pub fn render_counter(
    surface: &mut dyn PageSurface,
    fragment: &CounterFragment,
    show_counter: bool,
) -> Option<Anchor> {
    if !show_counter {
        return None;
    }

    if !surface.has_style(COUNTER_STYLE_ID) {
        surface.inject_style(COUNTER_STYLE_ID, COUNTER_STYLES);
    }

    let anchor = Anchor::PREFERENCE
        .into_iter()
        .find(|a| surface.has_anchor(*a))?;

    surface.insert_fragment(anchor, fragment);
    Some(anchor)
}

/// In-memory page document
#[derive(Debug, Clone, Default)]
pub struct PageModel {
    anchors: Vec<Anchor>,
    styles: Vec<(String, String)>,
    fragments: Vec<(Anchor, CounterFragment)>,
}

impl PageModel {
    /// Empty page without any anchors
    pub fn new() -> Self {
        Self::default()
    }

    /// A typical documentation page: heading inside the content region
    pub fn documentation_page() -> Self {
        Self::with_anchors(&[Anchor::Heading, Anchor::ContentInner, Anchor::Main])
    }

    pub fn with_anchors(anchors: &[Anchor]) -> Self {
        Self {
            anchors: anchors.to_vec(),
            ..Self::default()
        }
    }

    /// Rendered counter fragments with their placement
    pub fn fragments(&self) -> &[(Anchor, CounterFragment)] {
        &self.fragments
    }

    /// The counter currently shown, if any
    pub fn counter(&self) -> Option<&CounterFragment> {
        self.fragments.last().map(|(_, f)| f)
    }

    pub fn style_count(&self) -> usize {
        self.styles.len()
    }
}

impl PageSurface for PageModel {
    fn has_anchor(&self, anchor: Anchor) -> bool {
        self.anchors.contains(&anchor)
    }

    fn insert_fragment(&mut self, anchor: Anchor, fragment: &CounterFragment) {
        self.fragments.push((anchor, fragment.clone()));
    }

    fn remove_element(&mut self, id: &str) -> bool {
        if id != COUNTER_ELEMENT_ID || self.fragments.is_empty() {
            return false;
        }
        // getElementById removes the first match
        self.fragments.remove(0);
        true
    }

    fn has_style(&self, id: &str) -> bool {
        self.styles.iter().any(|(style_id, _)| style_id == id)
    }

    fn inject_style(&mut self, id: &str, css: &str) {
        self.styles.push((id.to_string(), css.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
        assert_eq!(format_count(100000), "100,000");
    }

    #[test]
    fn test_label_pluralization() {
        assert_eq!(CounterFragment::new(0).label(), "0 views");
        assert_eq!(CounterFragment::new(1).label(), "1 view");
        assert_eq!(CounterFragment::new(2).label(), "2 views");
        assert_eq!(CounterFragment::new(4321).label(), "4,321 views");
    }

    #[test]
    fn test_html_fragment() {
        let html = CounterFragment::new(1).to_html();
        assert!(html.starts_with("<div id=\"page-counter\">"));
        assert!(html.contains("page-counter-icon"));
        assert!(html.contains(">1 view</span>"));
    }

    #[test]
    fn test_hidden_counter_is_noop() {
        let mut page = PageModel::documentation_page();
        assert_eq!(render_counter(&mut page, &CounterFragment::new(3), false), None);
        assert!(page.fragments().is_empty());
        assert_eq!(page.style_count(), 0);
    }

    #[test]
    fn test_heading_preferred() {
        let mut page = PageModel::documentation_page();
        let placed = render_counter(&mut page, &CounterFragment::new(3), true);
        assert_eq!(placed, Some(Anchor::Heading));
        assert_eq!(page.counter(), Some(&CounterFragment::new(3)));
    }

    #[test]
    fn test_content_region_fallback_order() {
        let mut page = PageModel::with_anchors(&[Anchor::Article, Anchor::Main]);
        let placed = render_counter(&mut page, &CounterFragment::new(1), true);
        assert_eq!(placed, Some(Anchor::Main));

        let mut page = PageModel::with_anchors(&[Anchor::Article]);
        let placed = render_counter(&mut page, &CounterFragment::new(1), true);
        assert_eq!(placed, Some(Anchor::Article));
    }

    #[test]
    fn test_missing_anchor_is_silent() {
        let mut page = PageModel::new();
        assert_eq!(render_counter(&mut page, &CounterFragment::new(1), true), None);
        assert!(page.fragments().is_empty());
    }

    #[test]
    fn test_styles_injected_once() {
        let mut page = PageModel::documentation_page();
        render_counter(&mut page, &CounterFragment::new(1), true);
        page.remove_element(COUNTER_ELEMENT_ID);
        render_counter(&mut page, &CounterFragment::new(2), true);
        assert_eq!(page.style_count(), 1);
        assert_eq!(page.fragments().len(), 1);
    }
}
