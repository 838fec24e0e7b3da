//! Minimal document tree capability used by content extraction
//!
//! Extraction only ever needs to look elements up by id, list descendants by
//! tag and marker class, walk forward in document order, and read text and
//! attributes. `DocumentTree` captures exactly that, so extraction can run
//! against any tree implementation. `HtmlDocument` is the implementation backed
//! by `scraper`.

use scraper::{ElementRef, Html};

/// Read-only view of a parsed document
pub trait DocumentTree {
    /// Handle to an element of the tree
    type Node<'a>: Copy
    where
        Self: 'a;

    /// The outermost element of the document
    fn root(&self) -> Self::Node<'_>;

    /// First element carrying the given id attribute
    fn find_by_id(&self, id: &str) -> Option<Self::Node<'_>>;

    /// All descendants of `scope` whose tag is one of `tags`, in document
    /// order, optionally restricted to elements carrying the marker `class`
    fn find_all<'a>(
        &'a self,
        scope: Self::Node<'a>,
        tags: &[&str],
        class: Option<&str>,
    ) -> Vec<Self::Node<'a>>;

    /// First element with the given tag that follows `node` in document order
    fn find_next<'a>(&'a self, node: Self::Node<'a>, tag: &str) -> Option<Self::Node<'a>>;

    /// Lowercase tag name of the element
    fn tag_name<'a>(&'a self, node: Self::Node<'a>) -> &'a str;

    /// All text below the element, concatenated and trimmed
    fn text<'a>(&'a self, node: Self::Node<'a>) -> String;

    /// Value of an attribute
    fn attr<'a>(&'a self, node: Self::Node<'a>, name: &str) -> Option<&'a str>;
}

/// A parsed HTML page
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    /// Parse a full HTML document
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// Parse raw response bytes, replacing invalid UTF-8
    pub fn parse_bytes(body: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(body))
    }
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

impl DocumentTree for HtmlDocument {
    type Node<'a> = ElementRef<'a>;

    fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    fn find_by_id(&self, id: &str) -> Option<ElementRef<'_>> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().id() == Some(id))
    }

    fn find_all<'a>(
        &'a self,
        scope: ElementRef<'a>,
        tags: &[&str],
        class: Option<&str>,
    ) -> Vec<ElementRef<'a>> {
        scope
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|el| tags.contains(&el.value().name()))
            .filter(|el| class.is_none_or(|class| has_class(*el, class)))
            .collect()
    }

    fn find_next<'a>(&'a self, node: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
        let target = node.id();
        self.html
            .root_element()
            .descendants()
            .skip_while(|n| n.id() != target)
            .skip(1)
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == tag)
    }

    fn tag_name<'a>(&'a self, node: ElementRef<'a>) -> &'a str {
        node.value().name()
    }

    fn text<'a>(&'a self, node: ElementRef<'a>) -> String {
        node.text().collect::<String>().trim().to_string()
    }

    fn attr<'a>(&'a self, node: ElementRef<'a>, name: &str) -> Option<&'a str> {
        node.value().attr(name)
    }
}
