//! The extracted element model the classifier consumes
//!
//! An [`ElementSet`] is everything the content extractor could pull out of
//! one loaded page: anchors with their structural context, plus embedded
//! object references. The classifier never touches raw HTML.

/// All extractable elements from one loaded page
#[derive(Debug, Clone, Default)]
pub struct ElementSet {
    /// Normalized target of the page these elements came from
    pub page: String,
    pub links: Vec<PageLink>,
    pub embeds: Vec<EmbedRef>,
}

/// One anchor element with its structural context
#[derive(Debug, Clone, Default)]
pub struct PageLink {
    /// Raw href attribute, possibly relative
    pub href: String,
    /// Collapsed anchor text
    pub text: String,
    /// The element's class attribute, when present
    pub class_attr: Option<String>,
    /// Id of the nearest ancestor element carrying an id attribute
    pub container: Option<String>,
    /// Numeric identifier the element carries (`data-id`)
    pub item_id: Option<u64>,
    /// Content-type marker (`data-content-type` or the anchor `type` hint)
    pub content_kind: Option<String>,
    /// Whether the anchor carries a `download` attribute
    pub download_attr: bool,
}

/// An embedded object reference (iframe, embed, object)
#[derive(Debug, Clone)]
pub struct EmbedRef {
    /// Raw src/data attribute, possibly relative
    pub src: String,
    /// Title attribute, when present
    pub title: Option<String>,
}
