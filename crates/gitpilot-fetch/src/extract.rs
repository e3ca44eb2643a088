use scraper::{Html, Node, Selector};

const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Parses `body` and serializes the resulting document back to markup.
pub fn render_html(body: &str) -> String {
    Html::parse_document(body).html()
}

/// Returns the visible text of `body` with whitespace collapsed to single spaces.
pub fn visible_text(body: &str) -> String {
    let document = Html::parse_document(body);
    let mut pieces = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| HIDDEN_ELEMENTS.contains(&element.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            pieces.push(trimmed);
        }
    }
    pieces
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collects every non-empty `<img src>` in document order, unmodified.
pub fn extract_img_sources(body: &str) -> Vec<String> {
    let document = Html::parse_document(body);
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|image| image.value().attr("src"))
        .filter(|src| !src.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
